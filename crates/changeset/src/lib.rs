//! Steve changeset engine: path-keyed diffs between JSON trees, conflict
//! detection between two changesets over a common ancestor, and application of
//! a changeset back onto an object.

#![forbid(unsafe_code)]

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as Json};
use smallvec::SmallVec;

/// Key segments from the root to a value.
pub type Path = SmallVec<[String; 4]>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Op {
    Add,
    Change,
    Remove,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Change {
    pub op: Op,
    #[serde(skip)]
    pub path: Path,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<Json>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<Json>,
}

/// Mapping of rendered path -> change. Ordered, so parents precede children.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Changeset(BTreeMap<String, Change>);

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffSummary { pub adds: usize, pub updates: usize, pub removes: usize }

impl Changeset {
    pub fn len(&self) -> usize { self.0.len() }
    pub fn is_empty(&self) -> bool { self.0.is_empty() }
    pub fn get(&self, path: &str) -> Option<&Change> { self.0.get(path) }
    pub fn paths(&self) -> impl Iterator<Item = &str> { self.0.keys().map(|k| k.as_str()) }
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Change)> { self.0.iter().map(|(k, v)| (k.as_str(), v)) }

    pub fn summary(&self) -> DiffSummary {
        let mut s = DiffSummary::default();
        for c in self.0.values() {
            match c.op {
                Op::Add => s.adds += 1,
                Op::Change => s.updates += 1,
                Op::Remove => s.removes += 1,
            }
        }
        s
    }

    fn insert(&mut self, path: &Path, op: Op, from: Option<&Json>, value: Option<&Json>) {
        self.0.insert(
            render_path(path),
            Change { op, path: path.clone(), from: from.cloned(), value: value.cloned() },
        );
    }
}

/// Dot-joined path; segments containing a dot are quoted.
pub fn render_path(path: &[String]) -> String {
    path.iter()
        .map(|seg| if seg.contains('.') { format!("\"{}\"", seg) } else { seg.clone() })
        .collect::<Vec<_>>()
        .join(".")
}

/// Compute the changeset turning `from` into `to`. Objects recurse; arrays and
/// scalars are compared as whole values.
pub fn changeset(from: &Json, to: &Json) -> Changeset {
    fn walk(a: &Json, b: &Json, path: &mut Path, out: &mut Changeset) {
        match (a, b) {
            (Json::Object(ao), Json::Object(bo)) => {
                for (k, av) in ao.iter() {
                    path.push(k.clone());
                    match bo.get(k) {
                        Some(bv) => {
                            if av != bv { walk(av, bv, path, out); }
                        }
                        None => out.insert(path, Op::Remove, Some(av), None),
                    }
                    path.pop();
                }
                for (k, bv) in bo.iter() {
                    if !ao.contains_key(k) {
                        path.push(k.clone());
                        out.insert(path, Op::Add, None, Some(bv));
                        path.pop();
                    }
                }
            }
            (av, bv) => {
                if av != bv { out.insert(path, Op::Change, Some(av), Some(bv)); }
            }
        }
    }
    let mut out = Changeset::default();
    walk(from, to, &mut Path::new(), &mut out);
    out
}

/// Object containing only the keys of `to` that differ from `from`; removed keys map to null.
pub fn diff(from: &Json, to: &Json) -> Json {
    match (from, to) {
        (Json::Object(ao), Json::Object(bo)) => {
            let mut out = Map::new();
            for (k, bv) in bo.iter() {
                match ao.get(k) {
                    Some(av) if av == bv => {}
                    Some(av @ Json::Object(_)) if bv.is_object() => {
                        out.insert(k.clone(), diff(av, bv));
                    }
                    _ => {
                        out.insert(k.clone(), bv.clone());
                    }
                }
            }
            for k in ao.keys() {
                if !bo.contains_key(k) { out.insert(k.clone(), Json::Null); }
            }
            Json::Object(out)
        }
        (_, b) => b.clone(),
    }
}

fn is_prefix(short: &[String], long: &[String]) -> bool {
    short.len() < long.len() && long[..short.len()] == *short
}

/// Paths of `a` that collide with `b`. Identical outcomes on the same path are
/// compatible; any parent/child relation between two changed paths is not.
pub fn changeset_conflicts(a: &Changeset, b: &Changeset) -> Vec<String> {
    let mut out = BTreeSet::new();
    for (ka, ca) in a.0.iter() {
        for cb in b.0.values() {
            let clash = if ca.path == cb.path {
                ca.op != cb.op || ca.value != cb.value
            } else {
                is_prefix(&ca.path, &cb.path) || is_prefix(&cb.path, &ca.path)
            };
            if clash {
                out.insert(ka.clone());
                break;
            }
        }
    }
    out.into_iter().collect()
}

/// Apply a changeset in path order, creating intermediate objects as needed.
pub fn apply_changeset(target: &mut Json, cs: &Changeset) {
    for change in cs.0.values() {
        match change.op {
            Op::Add | Op::Change => {
                let value = change.value.clone().unwrap_or(Json::Null);
                set_path(target, &change.path, value);
            }
            Op::Remove => remove_path(target, &change.path),
        }
    }
}

fn set_path(target: &mut Json, path: &[String], value: Json) {
    let Some((last, parents)) = path.split_last() else {
        *target = value;
        return;
    };
    let mut cur = target;
    for seg in parents {
        if !cur.is_object() { *cur = Json::Object(Map::new()); }
        let Some(map) = cur.as_object_mut() else { return };
        cur = map.entry(seg.clone()).or_insert_with(|| Json::Object(Map::new()));
    }
    if !cur.is_object() { *cur = Json::Object(Map::new()); }
    if let Some(map) = cur.as_object_mut() {
        map.insert(last.clone(), value);
    }
}

fn remove_path(target: &mut Json, path: &[String]) {
    let Some((last, parents)) = path.split_last() else { return };
    let mut cur = target;
    for seg in parents {
        match cur.get_mut(seg.as_str()) {
            Some(next) => cur = next,
            None => return,
        }
    }
    if let Some(map) = cur.as_object_mut() {
        map.remove(last);
    }
}

/// Three-way merge: replay the server's changes (relative to `ancestor`) onto
/// `local`. Fails with the colliding paths when both sides touched overlapping paths.
pub fn three_way_merge(ancestor: &Json, local: &Json, server: &Json) -> Result<Json, Vec<String>> {
    let mine = changeset(ancestor, local);
    let theirs = changeset(ancestor, server);
    let conflicts = changeset_conflicts(&mine, &theirs);
    if !conflicts.is_empty() {
        return Err(conflicts);
    }
    let mut merged = local.clone();
    apply_changeset(&mut merged, &theirs);
    Ok(merged)
}
