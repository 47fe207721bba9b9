use serde_json::Value;

/// Monotonic resume marker parsed from `resourceVersion`/`revision` fields.
pub type Revision = u64;

/// Id of a raw resource: the `id` field, else `namespace/name` from metadata.
pub fn resource_id(raw: &Value) -> Option<String> {
    if let Some(id) = raw.get("id").and_then(|v| v.as_str()).filter(|s| !s.is_empty()) {
        return Some(id.to_string());
    }
    let meta = raw.get("metadata")?;
    let name = meta.get("name").and_then(|v| v.as_str()).filter(|s| !s.is_empty())?;
    let ns = meta.get("namespace").and_then(|v| v.as_str()).filter(|s| !s.is_empty());
    Some(join_id(ns, name))
}

/// Split a composite `namespace/name` id. Ids without a slash have no namespace.
pub fn split_id(id: &str) -> (Option<&str>, &str) {
    match id.split_once('/') {
        Some((ns, name)) if !ns.is_empty() => (Some(ns), name),
        _ => (None, id),
    }
}

pub fn join_id(namespace: Option<&str>, name: &str) -> String {
    match namespace {
        Some(ns) if !ns.is_empty() => format!("{}/{}", ns, name),
        _ => name.to_string(),
    }
}

/// `metadata.resourceVersion` of a raw resource, if numeric.
pub fn resource_version(raw: &Value) -> Option<Revision> {
    raw.get("metadata").and_then(|m| m.get("resourceVersion")).and_then(parse_revision)
}

/// Revisions arrive as strings (`"123"`) or integers.
pub fn parse_revision(v: &Value) -> Option<Revision> {
    match v {
        Value::String(s) => s.trim().parse().ok(),
        Value::Number(n) => n.as_u64(),
        _ => None,
    }
}
