use serde_json::Value;

/// Follow a minimal json-path-like grammar: dot fields and a single `[index]`
/// per segment, e.g. `spec.containers[0].image`.
pub fn lookup<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    let mut cur = root;
    for seg in path.split('.') {
        if seg.is_empty() { return None; }
        let (key, idx_opt) = if let Some(brk) = seg.find('[') {
            let end = seg.get(brk + 1..)?.find(']')? + brk + 1;
            let idx: usize = seg[brk + 1..end].parse().ok()?;
            (&seg[..brk], Some(idx))
        } else {
            (seg, None)
        };
        cur = cur.as_object()?.get(key)?;
        if let Some(i) = idx_opt {
            cur = cur.as_array()?.get(i)?;
        }
    }
    Some(cur)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_walks_fields_and_indexes() {
        let v = serde_json::json!({
            "metadata": { "name": "a" },
            "spec": { "containers": [ { "image": "nginx" } ], "replicas": 3 }
        });
        assert_eq!(lookup(&v, "metadata.name").and_then(|v| v.as_str()), Some("a"));
        assert_eq!(lookup(&v, "spec.containers[0].image").and_then(|v| v.as_str()), Some("nginx"));
        assert_eq!(lookup(&v, "spec.replicas").and_then(|v| v.as_u64()), Some(3));
        assert!(lookup(&v, "spec.containers[1]").is_none());
        assert!(lookup(&v, "spec..replicas").is_none());
        assert!(lookup(&v, "metadata.name.x").is_none());
    }
}
