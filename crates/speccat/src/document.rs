//! Typed views over a dereferenced specification tree.
//!
//! Documents are kept as an order-preserving `serde_json::Value` so renderers
//! can reach every detail, while catalog extraction reads them through the
//! narrow [`MethodMap`] and [`OperationInfo`] views defined here. Malformed
//! nodes are classified explicitly instead of being probed ad hoc.

use std::fmt;
use std::str::FromStr;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::locator::SpecIdentifier;

/// HTTP methods that count as operations, in canonical catalog order.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum HttpMethod {
    Get,
    Post,
    Patch,
    Delete,
    Head,
    Put,
}

impl HttpMethod {
    pub const CANONICAL_ORDER: [HttpMethod; 6] = [
        HttpMethod::Get,
        HttpMethod::Post,
        HttpMethod::Patch,
        HttpMethod::Delete,
        HttpMethod::Head,
        HttpMethod::Put,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            HttpMethod::Get => "get",
            HttpMethod::Post => "post",
            HttpMethod::Patch => "patch",
            HttpMethod::Delete => "delete",
            HttpMethod::Head => "head",
            HttpMethod::Put => "put",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HttpMethod {
    type Err = String;

    /// Method tokens are matched exactly; `GET` or `options` are not operations.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        HttpMethod::CANONICAL_ORDER
            .into_iter()
            .find(|method| method.as_str() == s)
            .ok_or_else(|| format!("unsupported method token {s}"))
    }
}

/// The detail of one operation that the catalog keeps.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct OperationInfo {
    pub tags: Option<Vec<String>>,
}

impl OperationInfo {
    /// Reads an operation node. Absent or falsy values yield `None`; truthy
    /// values that are not objects are operations without tags.
    pub fn from_value(value: &Value) -> Option<Self> {
        if !is_truthy(value) {
            return None;
        }
        let tags = value
            .get("tags")
            .and_then(Value::as_array)
            .map(|tags| {
                tags.iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            });
        Some(Self { tags })
    }
}

/// Recognized operations of one path item or webhook, in canonical order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MethodMap {
    entries: Vec<(HttpMethod, OperationInfo)>,
}

impl MethodMap {
    /// Reads a path item. Non-object nodes hold no operations and keys outside
    /// the six method tokens are ignored.
    pub fn from_value(value: &Value) -> Self {
        let Some(object) = value.as_object() else {
            return Self::default();
        };
        let entries = HttpMethod::CANONICAL_ORDER
            .into_iter()
            .filter_map(|method| {
                object
                    .get(method.as_str())
                    .and_then(OperationInfo::from_value)
                    .map(|info| (method, info))
            })
            .collect();
        Self { entries }
    }

    pub fn get(&self, method: HttpMethod) -> Option<&OperationInfo> {
        self.entries
            .iter()
            .find(|(candidate, _)| *candidate == method)
            .map(|(_, info)| info)
    }

    pub fn iter(&self) -> impl Iterator<Item = (HttpMethod, &OperationInfo)> {
        self.entries.iter().map(|(method, info)| (*method, info))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Shape of a top-level table such as `paths` or `webhooks`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SectionShape {
    Absent,
    Mapping,
    Malformed,
}

/// A specification with every reference expanded inline.
///
/// Serializes as the bare document tree.
#[derive(Clone, Debug, PartialEq)]
pub struct DereferencedDocument {
    identifier: SpecIdentifier,
    root: Value,
}

impl Serialize for DereferencedDocument {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.root.serialize(serializer)
    }
}

impl DereferencedDocument {
    pub fn new(identifier: SpecIdentifier, root: Value) -> Self {
        Self { identifier, root }
    }

    pub fn identifier(&self) -> &SpecIdentifier {
        &self.identifier
    }

    /// The full dereferenced tree, for detail rendering.
    pub fn root(&self) -> &Value {
        &self.root
    }

    pub fn into_root(self) -> Value {
        self.root
    }

    pub fn section_shape(&self, name: &str) -> SectionShape {
        match self.root.get(name) {
            None | Some(Value::Null) => SectionShape::Absent,
            Some(Value::Object(_)) => SectionShape::Mapping,
            Some(_) => SectionShape::Malformed,
        }
    }

    /// `paths` entries in document order.
    pub fn paths(&self) -> Vec<(&str, MethodMap)> {
        self.section("paths")
    }

    /// `webhooks` entries in document order.
    pub fn webhooks(&self) -> Vec<(&str, MethodMap)> {
        self.section("webhooks")
    }

    fn section(&self, name: &str) -> Vec<(&str, MethodMap)> {
        match self.root.get(name).and_then(Value::as_object) {
            Some(table) => table
                .iter()
                .map(|(key, item)| (key.as_str(), MethodMap::from_value(item)))
                .collect(),
            None => {
                if self.section_shape(name) == SectionShape::Malformed {
                    tracing::debug!(
                        identifier = %self.identifier,
                        section = name,
                        "section is not a mapping; treating as empty"
                    );
                }
                Vec::new()
            }
        }
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0 && !f.is_nan()).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn method_map_uses_canonical_order() {
        let map = MethodMap::from_value(&json!({
            "put": {},
            "parameters": [],
            "get": {"tags": ["a"]},
            "options": {},
            "delete": {}
        }));
        let methods: Vec<HttpMethod> = map.iter().map(|(method, _)| method).collect();
        assert_eq!(methods, [HttpMethod::Get, HttpMethod::Delete, HttpMethod::Put]);
        assert_eq!(
            map.get(HttpMethod::Get).unwrap().tags,
            Some(vec!["a".to_string()])
        );
    }

    #[test]
    fn falsy_operations_are_skipped() {
        let map = MethodMap::from_value(&json!({
            "get": null,
            "post": false,
            "patch": 0,
            "delete": "",
            "head": true
        }));
        assert_eq!(map.len(), 1);
        assert_eq!(map.get(HttpMethod::Head), Some(&OperationInfo { tags: None }));
    }

    #[test]
    fn non_array_tags_are_absent() {
        let info = OperationInfo::from_value(&json!({"tags": "quotes"})).unwrap();
        assert_eq!(info.tags, None);
    }

    #[test]
    fn method_tokens_are_case_sensitive() {
        assert_eq!("patch".parse::<HttpMethod>(), Ok(HttpMethod::Patch));
        assert!("GET".parse::<HttpMethod>().is_err());
        assert!("options".parse::<HttpMethod>().is_err());
    }

    #[test]
    fn section_shape_classifies_nodes() {
        let doc = DereferencedDocument::new(
            SpecIdentifier::new("inline"),
            json!({"paths": [], "webhooks": null}),
        );
        assert_eq!(doc.section_shape("paths"), SectionShape::Malformed);
        assert_eq!(doc.section_shape("webhooks"), SectionShape::Absent);
        assert_eq!(doc.section_shape("components"), SectionShape::Absent);
        assert!(doc.paths().is_empty());
    }
}
