use std::str::FromStr;

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use steve_core::{SteveError, SteveResult};

/// Optional DNS-subdomain prefix, then a name of alphanumerics, `-`, `_` and `.`.
static LABEL_KEY: Lazy<Option<Regex>> = Lazy::new(|| {
    Regex::new(r"^([a-z0-9]([-a-z0-9]*[a-z0-9])?(\.[a-z0-9]([-a-z0-9]*[a-z0-9])?)*/)?[A-Za-z0-9]([-A-Za-z0-9_.]*[A-Za-z0-9])?$").ok()
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Requirement {
    Eq(String, String),
    NotEq(String, String),
    Exists(String),
    NotExists(String),
}

/// Equality-based label selector: `k=v`, `k==v`, `k!=v`, `k`, `!k`, comma-joined.
/// An empty selector matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelSelector(Vec<Requirement>);

impl LabelSelector {
    pub fn parse(s: &str) -> SteveResult<Self> {
        let mut reqs = Vec::new();
        for part in s.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let req = if let Some((k, v)) = part.split_once("!=") {
                Requirement::NotEq(key(k, part)?, v.trim().to_string())
            } else if let Some((k, v)) = part.split_once("==").or_else(|| part.split_once('=')) {
                Requirement::Eq(key(k, part)?, v.trim().to_string())
            } else if let Some(k) = part.strip_prefix('!') {
                Requirement::NotExists(key(k, part)?)
            } else {
                Requirement::Exists(key(part, part)?)
            };
            reqs.push(req);
        }
        Ok(Self(reqs))
    }

    pub fn requirements(&self) -> &[Requirement] { &self.0 }

    /// Match against a `metadata.labels` object; missing labels count as empty.
    pub fn matches(&self, labels: Option<&Value>) -> bool {
        let get = |k: &str| labels.and_then(|l| l.get(k)).and_then(Value::as_str);
        self.0.iter().all(|r| match r {
            Requirement::Eq(k, v) => get(k) == Some(v.as_str()),
            Requirement::NotEq(k, v) => get(k) != Some(v.as_str()),
            Requirement::Exists(k) => get(k).is_some(),
            Requirement::NotExists(k) => get(k).is_none(),
        })
    }

    /// Match a raw resource by its labels.
    pub fn matches_resource(&self, raw: &Value) -> bool {
        self.matches(raw.get("metadata").and_then(|m| m.get("labels")))
    }
}

fn key(k: &str, part: &str) -> SteveResult<String> {
    let k = k.trim();
    let valid = match LABEL_KEY.as_ref() {
        Some(re) => re.is_match(k),
        None => !k.is_empty() && !k.contains(char::is_whitespace),
    };
    if !valid {
        return Err(SteveError::Validation(format!("bad selector term: {}", part)));
    }
    Ok(k.to_string())
}

impl FromStr for LabelSelector {
    type Err = SteveError;
    fn from_str(s: &str) -> Result<Self, Self::Err> { Self::parse(s) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_all_term_forms() {
        let sel: LabelSelector = "app=web, tier==front,env!=prod,canary,!legacy".parse().unwrap();
        assert_eq!(
            sel.requirements(),
            &[
                Requirement::Eq("app".into(), "web".into()),
                Requirement::Eq("tier".into(), "front".into()),
                Requirement::NotEq("env".into(), "prod".into()),
                Requirement::Exists("canary".into()),
                Requirement::NotExists("legacy".into()),
            ]
        );
        assert!(LabelSelector::parse("=x").is_err());
        assert!(LabelSelector::parse("bad key=x").is_err());
        assert!(LabelSelector::parse("-app=x").is_err());
        let qualified = LabelSelector::parse("app.kubernetes.io/name=web").unwrap();
        assert_eq!(qualified.requirements(), &[Requirement::Eq("app.kubernetes.io/name".into(), "web".into())]);
        assert!(LabelSelector::parse("").unwrap().requirements().is_empty());
    }

    #[test]
    fn matches_labels() {
        let sel = LabelSelector::parse("app=web,!legacy").unwrap();
        assert!(sel.matches_resource(&json!({ "metadata": { "labels": { "app": "web" } } })));
        assert!(!sel.matches_resource(&json!({ "metadata": { "labels": { "app": "web", "legacy": "1" } } })));
        assert!(!sel.matches_resource(&json!({ "metadata": {} })));
        let ne = LabelSelector::parse("env!=prod").unwrap();
        assert!(ne.matches_resource(&json!({ "metadata": {} })));
        assert!(LabelSelector::default().matches(None));
    }
}
