use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::SteveResult;

/// Server-declared description of one resource type.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Schema {
    pub id: String,
    #[serde(default)]
    pub resource_fields: BTreeMap<String, FieldSpec>,
    #[serde(default)]
    pub attributes: SchemaAttributes,
    #[serde(default)]
    pub links: BTreeMap<String, String>,
    #[serde(default)]
    pub actions: BTreeMap<String, String>,
    #[serde(default)]
    pub collection_methods: Vec<String>,
    #[serde(default)]
    pub resource_methods: Vec<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SchemaAttributes {
    #[serde(default)]
    pub namespaced: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    #[serde(rename = "type", default)]
    pub ty: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(default)]
    pub nullable: bool,
    #[serde(default)]
    pub required: bool,
}

/// Parsed form of a field's `type` tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldType {
    Scalar(String),
    Map(Box<FieldType>),
    Array(Box<FieldType>),
    Reference(String),
}

const SCALARS: &[&str] = &[
    "string", "int", "float", "boolean", "date", "json", "password", "dnsLabel", "hostname",
    "enum", "intOrString", "base64", "blob", "multiline", "masked", "cidr", "ipAddress", "",
];

impl FieldType {
    pub fn parse(tag: &str) -> FieldType {
        fn inner<'a>(tag: &'a str, prefix: &str) -> Option<&'a str> {
            tag.strip_prefix(prefix)?.strip_prefix('[')?.strip_suffix(']')
        }
        if let Some(t) = inner(tag, "array") {
            return FieldType::Array(Box::new(FieldType::parse(t)));
        }
        if let Some(t) = inner(tag, "map") {
            return FieldType::Map(Box::new(FieldType::parse(t)));
        }
        if let Some(t) = inner(tag, "reference") {
            return FieldType::Reference(t.to_string());
        }
        if SCALARS.contains(&tag) {
            FieldType::Scalar(tag.to_string())
        } else {
            FieldType::Reference(tag.to_string())
        }
    }
}

impl FieldSpec {
    pub fn field_type(&self) -> FieldType { FieldType::parse(&self.ty) }
}

impl Schema {
    pub fn from_value(v: Value) -> SteveResult<Schema> { Ok(serde_json::from_value(v)?) }

    pub fn is_namespaced(&self) -> bool { self.attributes.namespaced }

    pub fn link_for(&self, name: &str) -> Option<&str> { self.links.get(name).map(|s| s.as_str()) }

    pub fn action_link_for(&self, name: &str) -> Option<&str> { self.actions.get(name).map(|s| s.as_str()) }

    pub fn collection_link(&self) -> Option<&str> { self.link_for("collection") }

    /// Merge a newer server copy: keys present in `newer` replace ours, the rest survive.
    pub fn update(&mut self, newer: &Value) -> SteveResult<()> {
        let mut cur = serde_json::to_value(&*self)?;
        if let (Some(dst), Some(src)) = (cur.as_object_mut(), newer.as_object()) {
            for (k, v) in src {
                dst.insert(k.clone(), v.clone());
            }
        }
        *self = serde_json::from_value(cur)?;
        Ok(())
    }
}
