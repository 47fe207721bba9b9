use serde_json::Value;
use steve_core::{join_id, parse_revision, resource_id, Revision, SteveError, SteveResult};
use url::form_urlencoded::byte_serialize;

use crate::LabelSelector;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        }
    }
}

/// Options for the `find*` family.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FindOpts {
    /// Refetch even when cached.
    pub force: bool,
    /// Watch what was fetched.
    pub watch: bool,
    pub filter: Vec<(String, String)>,
    pub limit: Option<usize>,
    pub sort: Option<String>,
    pub order: Option<SortOrder>,
}

impl Default for FindOpts {
    fn default() -> Self {
        Self { force: false, watch: true, filter: Vec::new(), limit: None, sort: None, order: None }
    }
}

fn enc(s: &str) -> String { byte_serialize(s.as_bytes()).collect() }

impl FindOpts {
    pub fn force(mut self) -> Self { self.force = true; self }
    pub fn no_watch(mut self) -> Self { self.watch = false; self }
    pub fn filter(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.filter.push((field.into(), value.into()));
        self
    }
    pub fn limit(mut self, n: usize) -> Self { self.limit = Some(n); self }
    pub fn sort(mut self, field: impl Into<String>, order: SortOrder) -> Self {
        self.sort = Some(field.into());
        self.order = Some(order);
        self
    }

    /// A filtered or limited page does not represent the full scope.
    pub fn is_partial(&self) -> bool { !self.filter.is_empty() || self.limit.is_some() }

    /// `filter[field]=value&limit=N&sort=f&order=asc`, empty when nothing is set.
    pub fn query(&self) -> String {
        let mut parts: Vec<String> = self.filter.iter().map(|(k, v)| format!("filter[{}]={}", k, enc(v))).collect();
        if let Some(n) = self.limit {
            parts.push(format!("limit={}", n));
        }
        if let Some(s) = &self.sort {
            parts.push(format!("sort={}", enc(s)));
        }
        if let Some(o) = self.order {
            parts.push(format!("order={}", o.as_str()));
        }
        parts.join("&")
    }
}

/// A collection query scope. Drives both fetches and resync pruning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scope {
    All,
    Namespace(String),
    Selector { selector: String, namespace: Option<String> },
}

impl Scope {
    pub fn namespace(&self) -> Option<&str> {
        match self {
            Scope::All => None,
            Scope::Namespace(ns) => Some(ns),
            Scope::Selector { namespace, .. } => namespace.as_deref(),
        }
    }

    /// Whether a cached raw resource falls within this scope.
    pub fn contains(&self, raw: &Value) -> bool {
        let in_ns = |ns: &str| namespace_of(raw).as_deref() == Some(ns);
        match self {
            Scope::All => true,
            Scope::Namespace(ns) => in_ns(ns),
            Scope::Selector { selector, namespace } => {
                namespace.as_deref().map_or(true, in_ns)
                    && LabelSelector::parse(selector).map(|s| s.matches_resource(raw)).unwrap_or(false)
            }
        }
    }

    /// Key under which the completeness flag for this scope is recorded.
    pub fn flag_key(&self) -> String {
        match self {
            Scope::All => String::new(),
            Scope::Namespace(ns) => ns.clone(),
            Scope::Selector { selector, namespace } => join_id(namespace.as_deref(), selector),
        }
    }
}

/// `metadata.namespace`, else the prefix of a composite id.
pub(crate) fn namespace_of(raw: &Value) -> Option<String> {
    if let Some(ns) = raw.get("metadata").and_then(|m| m.get("namespace")).and_then(Value::as_str) {
        return Some(ns.to_string());
    }
    let id = resource_id(raw)?;
    id.split_once('/').map(|(ns, _)| ns.to_string()).filter(|ns| !ns.is_empty())
}

/// Build the URL of a collection fetch.
pub(crate) fn collection_url(base: &str, namespaced: bool, scope: &Scope, opts: &FindOpts) -> String {
    let base = base.trim_end_matches('/');
    let mut url = match scope.namespace() {
        Some(ns) if namespaced => format!("{}/{}", base, ns),
        _ => base.to_string(),
    };
    let mut query = opts.query();
    if let Scope::Selector { selector, .. } = scope {
        let sel = format!("labelSelector={}", enc(selector));
        query = if query.is_empty() { sel } else { format!("{}&{}", sel, query) };
    }
    if !query.is_empty() {
        url.push(if url.contains('?') { '&' } else { '?' });
        url.push_str(&query);
    }
    url
}

/// One page of a collection response.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Collection {
    pub data: Vec<Value>,
    pub revision: Option<Revision>,
}

impl Collection {
    /// Accepts `{data: [...], revision}` or a bare array.
    pub fn from_body(body: Value) -> SteveResult<Collection> {
        match body {
            Value::Array(data) => Ok(Collection { data, revision: None }),
            Value::Object(mut m) => {
                let revision = m.get("revision").and_then(parse_revision);
                match m.remove("data") {
                    Some(Value::Array(data)) => Ok(Collection { data, revision }),
                    Some(Value::Null) | None => Ok(Collection { data: Vec::new(), revision }),
                    Some(other) => Err(SteveError::Decode(format!("collection data is not a list: {}", other))),
                }
            }
            other => Err(SteveError::Decode(format!("unexpected collection body: {}", other))),
        }
    }
}
