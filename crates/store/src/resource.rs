use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use metrics::counter;
use serde_json::{Map, Value};
use steve_changeset::three_way_merge;
use steve_core::{
    resource_id, resource_version, split_id, Method, RequestOpts, Revision, SteveError, SteveResult,
};
use tracing::{debug, info, warn};

use crate::{FindOpts, TypeStore};

/// Derived lifecycle state of a resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceState {
    pub name: String,
    pub transitioning: bool,
    pub error: bool,
    pub message: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateColor {
    Success,
    Info,
    Warning,
    Error,
}

/// `removing` once a deletion timestamp is set, else `metadata.state`, else `unknown`.
pub fn state_of(raw: &Value) -> ResourceState {
    let meta = raw.get("metadata");
    let st = meta.and_then(|m| m.get("state"));
    let flag = |k: &str| st.and_then(|s| s.get(k)).and_then(Value::as_bool).unwrap_or(false);
    let deleting = meta.and_then(|m| m.get("deletionTimestamp")).map_or(false, |v| !v.is_null());
    let name = if deleting {
        "removing".to_string()
    } else {
        st.and_then(|s| s.get("name"))
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .unwrap_or("unknown")
            .to_string()
    };
    ResourceState {
        name,
        transitioning: flag("transitioning"),
        error: flag("error"),
        message: st.and_then(|s| s.get("message")).and_then(Value::as_str).map(str::to_string),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SaveOpts {
    /// Conflict merge-and-retry budget.
    pub retries: u32,
}

impl Default for SaveOpts {
    fn default() -> Self { Self { retries: 1 } }
}

/// A raw server resource bound to its type store.
///
/// Cloning deep-copies the data; the store binding is shared.
#[derive(Clone)]
pub struct Resource {
    store: Arc<TypeStore>,
    data: Value,
    original: Option<Value>,
}

impl fmt::Debug for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resource").field("type", &self.store.ty()).field("data", &self.data).finish()
    }
}

impl PartialEq for Resource {
    fn eq(&self, other: &Self) -> bool { Arc::ptr_eq(&self.store, &other.store) && self.data == other.data }
}

fn str_at<'a>(v: &'a Value, a: &str, b: &str) -> Option<&'a str> {
    v.get(a).and_then(|x| x.get(b)).and_then(Value::as_str)
}

impl Resource {
    /// Decorate data already known to the server.
    pub fn new(store: Arc<TypeStore>, data: Value) -> Self {
        Self { store, original: Some(data.clone()), data }
    }

    /// Decorate a local object that has never been saved.
    pub fn unsaved(store: Arc<TypeStore>, data: Value) -> Self { Self { store, data, original: None } }

    pub fn store(&self) -> &Arc<TypeStore> { &self.store }
    pub fn data(&self) -> &Value { &self.data }
    pub fn data_mut(&mut self) -> &mut Value { &mut self.data }
    pub fn into_data(self) -> Value { self.data }
    /// Last server copy this resource was built from.
    pub fn original(&self) -> Option<&Value> { self.original.as_ref() }

    pub fn id(&self) -> Option<String> { resource_id(&self.data) }

    pub fn ty(&self) -> &str { self.data.get("type").and_then(Value::as_str).unwrap_or_else(|| self.store.ty()) }

    pub fn name(&self) -> Option<String> {
        str_at(&self.data, "metadata", "name")
            .map(str::to_string)
            .or_else(|| self.id().map(|id| split_id(&id).1.to_string()))
    }

    pub fn namespace(&self) -> Option<String> {
        str_at(&self.data, "metadata", "namespace")
            .map(str::to_string)
            .or_else(|| self.id().and_then(|id| split_id(&id).0.map(str::to_string)))
    }

    pub fn resource_version(&self) -> Option<Revision> { resource_version(&self.data) }

    pub fn creation_timestamp(&self) -> Option<DateTime<Utc>> {
        str_at(&self.data, "metadata", "creationTimestamp")
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc))
    }

    fn string_map(&self, key: &str) -> BTreeMap<String, String> {
        self.data
            .get("metadata")
            .and_then(|m| m.get(key))
            .and_then(Value::as_object)
            .map(|m| m.iter().filter_map(|(k, v)| v.as_str().map(|v| (k.clone(), v.to_string()))).collect())
            .unwrap_or_default()
    }

    pub fn labels(&self) -> BTreeMap<String, String> { self.string_map("labels") }
    pub fn annotations(&self) -> BTreeMap<String, String> { self.string_map("annotations") }

    fn set_metadata_entry(&mut self, key: &str, k: String, v: String) {
        if !self.data.is_object() {
            self.data = Value::Object(Map::new());
        }
        let Some(obj) = self.data.as_object_mut() else { return };
        let meta = obj.entry("metadata").or_insert_with(|| Value::Object(Map::new()));
        if !meta.is_object() {
            *meta = Value::Object(Map::new());
        }
        let Some(meta) = meta.as_object_mut() else { return };
        let map = meta.entry(key).or_insert_with(|| Value::Object(Map::new()));
        if !map.is_object() {
            *map = Value::Object(Map::new());
        }
        if let Some(map) = map.as_object_mut() {
            map.insert(k, Value::String(v));
        }
    }

    pub fn set_label(&mut self, k: impl Into<String>, v: impl Into<String>) {
        self.set_metadata_entry("labels", k.into(), v.into());
    }

    pub fn set_annotation(&mut self, k: impl Into<String>, v: impl Into<String>) {
        self.set_metadata_entry("annotations", k.into(), v.into());
    }

    pub fn state(&self) -> ResourceState { state_of(&self.data) }

    pub fn is_removing(&self) -> bool { self.state().name == "removing" }

    pub fn state_display(&self) -> String {
        let name = self.state().name;
        let mut chars = name.chars();
        match chars.next() {
            Some(c) => c.to_uppercase().chain(chars).collect(),
            None => name,
        }
    }

    pub fn state_color(&self) -> StateColor {
        let st = self.state();
        if st.error {
            StateColor::Error
        } else if st.transitioning {
            StateColor::Info
        } else if st.name == "removing" || st.name == "unknown" {
            StateColor::Warning
        } else {
            StateColor::Success
        }
    }

    /// `spec.displayName`, else the name, else the id.
    pub fn name_display(&self) -> String {
        str_at(&self.data, "spec", "displayName")
            .map(str::to_string)
            .or_else(|| self.name())
            .or_else(|| self.id())
            .unwrap_or_default()
    }

    pub fn has_link(&self, name: &str) -> bool { str_at(&self.data, "links", name).is_some() }

    pub fn link_for(&self, name: &str) -> SteveResult<String> {
        str_at(&self.data, "links", name).map(str::to_string).ok_or_else(|| SteveError::UnknownLink(name.to_string()))
    }

    pub fn action_link_for(&self, name: &str) -> SteveResult<String> {
        str_at(&self.data, "actions", name)
            .map(str::to_string)
            .ok_or_else(|| SteveError::UnknownAction(name.to_string()))
    }

    /// GET a named link.
    pub async fn follow_link(&self, name: &str) -> SteveResult<Value> {
        let url = self.link_for(name)?;
        let backend = self.store.backend()?;
        Ok(backend.request(RequestOpts::get(url)).await?.body)
    }

    /// POST to a named action.
    pub async fn server_action(&self, name: &str, body: Option<Value>) -> SteveResult<Value> {
        let url = self.action_link_for(name)?;
        let backend = self.store.backend()?;
        let mut opts = RequestOpts::new(Method::Post, url);
        opts.body = body;
        Ok(backend.request(opts).await?.body)
    }

    /// Wholesale replace with a server copy; it also becomes the merge ancestor.
    pub fn update(&mut self, server: Value) {
        self.original = Some(server.clone());
        self.data = server;
    }

    fn is_new(&self) -> bool { self.data.get("id").and_then(Value::as_str).map_or(true, str::is_empty) }

    /// Create or update on the server. A 409 triggers a refetch and three-way
    /// merge; disjoint changes are retried while the budget lasts.
    pub async fn save(&mut self, opts: SaveOpts) -> SteveResult<()> {
        let mut retries = opts.retries;
        loop {
            let err = match self.save_once().await {
                Ok(()) => return Ok(()),
                Err(e) if e.is_conflict_status() => e,
                Err(e) => return Err(e),
            };
            let (Some(ancestor), Some(id)) = (self.original.clone(), self.id()) else { return Err(err) };
            if retries == 0 {
                return Err(err);
            }
            retries -= 1;
            counter!("steve_save_conflicts_total", 1u64);
            let server = self.store.find(&id, FindOpts::default().force().no_watch()).await?;
            match three_way_merge(&ancestor, &self.data, server.data()) {
                Ok(mut merged) => {
                    if let Some(rv) = server.data().get("metadata").and_then(|m| m.get("resourceVersion")) {
                        if let Some(meta) = merged.get_mut("metadata").and_then(Value::as_object_mut) {
                            meta.insert("resourceVersion".into(), rv.clone());
                        }
                    }
                    info!(ty = %self.ty(), id = %id, "save conflict merged; retrying");
                    self.data = merged;
                    self.original = Some(server.into_data());
                }
                Err(paths) => {
                    warn!(ty = %self.ty(), id = %id, paths = ?paths, "save conflict not mergeable");
                    return Err(SteveError::Conflict { paths });
                }
            }
        }
    }

    async fn save_once(&mut self) -> SteveResult<()> {
        let backend = self.store.backend()?;
        let create = self.is_new();
        let (method, url) = if create {
            let schema = self.store.schema()?;
            let base = schema
                .collection_link()
                .ok_or_else(|| SteveError::UnknownLink("collection".into()))?
                .trim_end_matches('/')
                .to_string();
            let url = match self.namespace() {
                Some(ns) if schema.is_namespaced() => format!("{}/{}", base, ns),
                _ => base,
            };
            (Method::Post, url)
        } else {
            let url = self.link_for("update").or_else(|_| self.link_for("self"))?;
            (Method::Put, url)
        };
        debug!(ty = %self.ty(), method = %method, url = %url, "saving resource");
        let resp = backend.request(RequestOpts::new(method, url).body(self.data.clone())).await?;
        let fresh = if resp.body.is_object() { resp.body } else { self.data.clone() };
        self.update(fresh.clone());
        self.store.load(fresh)?;
        Ok(())
    }

    /// DELETE the `self` link; a 204 also drops the resource from the store.
    pub async fn remove(&self) -> SteveResult<()> {
        let url = self.link_for("self")?;
        let backend = self.store.backend()?;
        let resp = backend.request(RequestOpts::new(Method::Delete, url)).await?;
        if resp.status == 204 {
            if let Some(id) = self.id() {
                self.store.remove(&id);
            }
        }
        Ok(())
    }

    /// Force-refetch this resource and adopt the server copy.
    pub async fn refresh(&mut self) -> SteveResult<()> {
        let id = self.id().ok_or_else(|| SteveError::Validation("resource has no id".into()))?;
        let fresh = self.store.find(&id, FindOpts::default().force()).await?;
        self.update(fresh.into_data());
        Ok(())
    }

    /// Raise a change notification for this resource on its store.
    pub fn notify(&self, event: &str) {
        if let Some(id) = self.id() {
            self.store.notify(&id, event);
        }
    }
}
