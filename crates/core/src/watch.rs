use serde::{Deserialize, Serialize};

use crate::Revision;

/// A request to watch a type, optionally narrowed by namespace, id or label selector.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WatchDescriptor {
    pub resource_type: String,
    pub namespace: Option<String>,
    pub id: Option<String>,
    pub selector: Option<String>,
    pub revision: Option<Revision>,
    /// Bypass de-duplication and error gating.
    pub force: bool,
    pub stop: bool,
}

impl WatchDescriptor {
    pub fn new(resource_type: impl Into<String>) -> Self {
        Self { resource_type: resource_type.into(), ..Default::default() }
    }

    pub fn namespace(mut self, ns: impl Into<String>) -> Self { self.namespace = Some(ns.into()); self }
    pub fn id(mut self, id: impl Into<String>) -> Self { self.id = Some(id.into()); self }
    pub fn selector(mut self, sel: impl Into<String>) -> Self { self.selector = Some(sel.into()); self }
    pub fn revision(mut self, rev: Revision) -> Self { self.revision = Some(rev); self }
    pub fn force(mut self) -> Self { self.force = true; self }

    pub fn key(&self) -> WatchKey {
        WatchKey {
            resource_type: self.resource_type.clone(),
            namespace: self.namespace.clone(),
            id: self.id.clone(),
            selector: self.selector.clone(),
        }
    }

    /// Equivalence ignores revision and the force/stop flags.
    pub fn equivalent(&self, other: &WatchDescriptor) -> bool { self.key() == other.key() }

    pub fn frame(&self) -> WatchFrame {
        WatchFrame {
            resource_type: self.resource_type.clone(),
            resource_version: self.revision.map(|r| r.to_string()),
            namespace: self.namespace.clone(),
            id: self.id.clone(),
            selector: self.selector.clone(),
            stop: self.stop.then_some(true),
        }
    }
}

/// Identity of a watch: `{type, namespace, id, selector}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WatchKey {
    pub resource_type: String,
    pub namespace: Option<String>,
    pub id: Option<String>,
    pub selector: Option<String>,
}

impl WatchKey {
    /// Deterministic string form used to key error state.
    pub fn subscribe_key(&self) -> String {
        format!(
            "type={},namespace={},id={},selector={}",
            self.resource_type,
            self.namespace.as_deref().unwrap_or(""),
            self.id.as_deref().unwrap_or(""),
            self.selector.as_deref().unwrap_or(""),
        )
    }

    pub fn descriptor(&self) -> WatchDescriptor {
        WatchDescriptor {
            resource_type: self.resource_type.clone(),
            namespace: self.namespace.clone(),
            id: self.id.clone(),
            selector: self.selector.clone(),
            ..Default::default()
        }
    }
}

/// Client -> server subscription frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchFrame {
    pub resource_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop: Option<bool>,
}
