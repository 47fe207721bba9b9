//! Steve schema registry: the decorated set of server schemas, readable without
//! locks, plus default population for new resources.

#![forbid(unsafe_code)]

use std::sync::Arc;

use arc_swap::ArcSwap;
use rustc_hash::FxHashMap;
use serde_json::{Map, Value};
use steve_core::{FieldType, Schema, SteveError, SteveResult};
use tracing::{debug, warn};

/// Nesting bound for reference fields when populating defaults.
const MAX_DEFAULT_DEPTH: usize = 8;

/// Canonical form of a type name; lookups and watch keys use it.
pub fn normalize_type(ty: &str) -> String { ty.trim().to_ascii_lowercase() }

#[derive(Default)]
pub struct SchemaRegistry {
    inner: ArcSwap<FxHashMap<String, Arc<Schema>>>,
}

impl SchemaRegistry {
    pub fn new() -> Self { Self::default() }

    pub fn len(&self) -> usize { self.inner.load().len() }
    pub fn is_empty(&self) -> bool { self.inner.load().is_empty() }

    pub fn get(&self, ty: &str) -> Option<Arc<Schema>> { self.inner.load().get(&normalize_type(ty)).cloned() }

    pub fn contains(&self, ty: &str) -> bool { self.inner.load().contains_key(&normalize_type(ty)) }

    /// All schemas ordered by id.
    pub fn all(&self) -> Vec<Arc<Schema>> {
        let mut out: Vec<Arc<Schema>> = self.inner.load().values().cloned().collect();
        out.sort_by(|a, b| a.id.cmp(&b.id));
        out
    }

    /// Replace the registry with a freshly fetched collection. Entries that do
    /// not decode are skipped.
    pub fn load_all(&self, data: &[Value]) -> usize {
        let mut next = FxHashMap::default();
        for raw in data {
            match Schema::from_value(raw.clone()) {
                Ok(s) => {
                    next.insert(normalize_type(&s.id), Arc::new(s));
                }
                Err(e) => warn!(error = %e, id = ?raw.get("id"), "schema skipped"),
            }
        }
        let n = next.len();
        self.inner.store(Arc::new(next));
        debug!(count = n, "schemas loaded");
        n
    }

    /// Insert a schema, or merge into the existing copy when present.
    pub fn upsert(&self, raw: &Value) -> SteveResult<Arc<Schema>> {
        let id = raw
            .get("id")
            .and_then(Value::as_str)
            .map(normalize_type)
            .ok_or_else(|| SteveError::Validation("schema without id".into()))?;
        let next = match self.get(&id) {
            Some(cur) => {
                let mut s = (*cur).clone();
                s.update(raw)?;
                s
            }
            None => Schema::from_value(raw.clone())?,
        };
        let next = Arc::new(next);
        self.inner.rcu(|m| {
            let mut m = (**m).clone();
            m.insert(id.clone(), Arc::clone(&next));
            m
        });
        Ok(next)
    }

    pub fn remove(&self, ty: &str) -> bool {
        let key = normalize_type(ty);
        if !self.inner.load().contains_key(&key) {
            return false;
        }
        self.inner.rcu(|m| {
            let mut m = (**m).clone();
            m.remove(&key);
            m
        });
        true
    }

    /// Fill schema defaults into `partial` without overwriting provided values.
    /// Reference fields whose schema is known are populated recursively. The
    /// `type` key is always set.
    pub fn populate_defaults(&self, ty: &str, partial: Value) -> SteveResult<Value> {
        let schema = self.get(ty).ok_or_else(|| SteveError::UnknownSchema(ty.to_string()))?;
        let mut obj = match partial {
            Value::Object(m) => m,
            Value::Null => Map::new(),
            other => return Err(SteveError::Validation(format!("expected object, got {}", other))),
        };
        self.fill(&schema, &mut obj, 0);
        obj.insert("type".into(), Value::String(schema.id.clone()));
        Ok(Value::Object(obj))
    }

    fn fill(&self, schema: &Schema, obj: &mut Map<String, Value>, depth: usize) {
        for (name, field) in &schema.resource_fields {
            let sub = match field.field_type() {
                FieldType::Reference(r) if depth < MAX_DEFAULT_DEPTH => self.get(&r),
                _ => None,
            };
            match obj.get_mut(name) {
                Some(Value::Object(inner)) => {
                    if let Some(sub) = sub {
                        self.fill(&sub, inner, depth + 1);
                    }
                }
                Some(_) => {}
                None => {
                    if let Some(def) = &field.default {
                        obj.insert(name.clone(), def.clone());
                    } else if let Some(sub) = sub {
                        let mut inner = Map::new();
                        self.fill(&sub, &mut inner, depth + 1);
                        if !inner.is_empty() {
                            obj.insert(name.clone(), Value::Object(inner));
                        }
                    }
                }
            }
        }
    }
}
