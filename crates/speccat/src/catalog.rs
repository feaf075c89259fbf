use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::document::{DereferencedDocument, HttpMethod};

/// One method-and-path combination.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Operation {
    pub method: HttpMethod,
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
}

/// One method of a named webhook.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Webhook {
    pub method: HttpMethod,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
}

/// Index of the operations and webhooks a document describes.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Catalog {
    pub operations: Vec<Operation>,
    pub webhooks: Vec<Webhook>,
}

/// Operations sharing a tag, for navigation listings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TagGroup<'a> {
    pub tag: Option<&'a str>,
    pub operations: Vec<&'a Operation>,
}

impl Catalog {
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty() && self.webhooks.is_empty()
    }

    /// Groups operations by tag in first-seen order. An operation with several
    /// tags appears in each group; untagged operations share the `None` group.
    pub fn by_tag(&self) -> Vec<TagGroup<'_>> {
        let mut groups: Vec<TagGroup<'_>> = Vec::new();
        for operation in &self.operations {
            let tags: Vec<Option<&str>> = match operation.tags.as_deref() {
                Some(tags) if !tags.is_empty() => tags.iter().map(|t| Some(t.as_str())).collect(),
                _ => vec![None],
            };
            for tag in tags {
                match groups.iter_mut().find(|group| group.tag == tag) {
                    Some(group) => group.operations.push(operation),
                    None => groups.push(TagGroup {
                        tag,
                        operations: vec![operation],
                    }),
                }
            }
        }
        groups
    }
}

/// Builds the catalog of `document`: document order across paths and
/// webhooks, canonical method order within each entry. Never fails; absent or
/// malformed sections contribute nothing.
pub fn extract(document: &DereferencedDocument) -> Catalog {
    let operations = document
        .paths()
        .into_iter()
        .flat_map(|(path, methods)| {
            methods
                .iter()
                .map(|(method, info)| Operation {
                    method,
                    path: path.to_string(),
                    tags: info.tags.clone(),
                })
                .collect::<Vec<_>>()
        })
        .collect();

    let webhooks = document
        .webhooks()
        .into_iter()
        .flat_map(|(name, methods)| {
            methods
                .iter()
                .map(|(method, info)| Webhook {
                    method,
                    name: name.to_string(),
                    tags: info.tags.clone(),
                })
                .collect::<Vec<_>>()
        })
        .collect();

    Catalog {
        operations,
        webhooks,
    }
}

/// JSON Schema of the catalog payload handed to renderers.
pub fn catalog_schema() -> schemars::Schema {
    schemars::schema_for!(Catalog)
}
