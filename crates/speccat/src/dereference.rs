//! Reference expansion.
//!
//! Every `{"$ref": ..}` node is replaced by the value it names. Targets may
//! live in the same document (`#/components/schemas/Pet`), in a sibling file
//! (`common.yaml#/Error`) or behind an `http(s)` URL fetched through a
//! [`ReferenceFetcher`]. The chain of references being expanded is tracked as
//! a stack; meeting a stacked reference again is a cycle, which the
//! configured [`CyclePolicy`] terminates.

use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde_json::{Map, Value, json};
use url::Url;

use crate::config::{CyclePolicy, SpeccatConfig};
use crate::document::DereferencedDocument;
use crate::error::SpeccatError;
use crate::fetch::ReferenceFetcher;
use crate::format::{SpecFormat, parse_document};
use crate::locator::{SpecIdentifier, SpecSource};

const REF_KEY: &str = "$ref";

/// Key set on the terminal node that replaces a cyclic reference.
pub const CIRCULAR_MARKER_KEY: &str = "x-circular-ref";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DereferenceOptions {
    pub cycles: CyclePolicy,
    pub max_depth: usize,
    pub max_nodes: usize,
}

impl Default for DereferenceOptions {
    fn default() -> Self {
        Self::from(&SpeccatConfig::default())
    }
}

impl From<&SpeccatConfig> for DereferenceOptions {
    fn from(config: &SpeccatConfig) -> Self {
        Self {
            cycles: config.cycles,
            max_depth: config.max_depth,
            max_nodes: config.max_nodes,
        }
    }
}

/// Shared flag that stops a dereference pass at its next node.
#[derive(Clone, Debug, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Loads the document behind `source` and expands every reference in it.
pub fn dereference(
    identifier: &SpecIdentifier,
    source: &SpecSource,
    fetcher: &dyn ReferenceFetcher,
    options: DereferenceOptions,
) -> Result<DereferencedDocument, SpeccatError> {
    dereference_cancellable(identifier, source, fetcher, options, &CancelFlag::default())
}

/// Like [`dereference`], but gives up with a reference error once `cancel`
/// is raised.
pub fn dereference_cancellable(
    identifier: &SpecIdentifier,
    source: &SpecSource,
    fetcher: &dyn ReferenceFetcher,
    options: DereferenceOptions,
    cancel: &CancelFlag,
) -> Result<DereferencedDocument, SpeccatError> {
    let (locator, raw) = match source {
        SpecSource::File(path) => {
            let content = fs::read_to_string(path).map_err(|err| match err.kind() {
                ErrorKind::NotFound => SpeccatError::NotFound(identifier.to_string()),
                _ => SpeccatError::io(path, err),
            })?;
            let root = parse_document(&content, SpecFormat::from_path(path), identifier)?;
            (DocumentLocator::File(normalize_path(path)), root)
        }
        SpecSource::Bundled(content) => {
            let root = parse_document(content, SpecFormat::Yaml, identifier)?;
            (DocumentLocator::Bundled(identifier.to_string()), root)
        }
    };

    let mut traversal = Traversal::new(fetcher, options, cancel);
    let root = Arc::new(raw);
    traversal.documents.insert(locator.key(), root.clone());
    let expanded = traversal
        .expand_root(&root, &locator)
        .map_err(|err| err.context(identifier))?;
    Ok(DereferencedDocument::new(identifier.clone(), expanded))
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum DocumentLocator {
    File(PathBuf),
    Url(Url),
    Bundled(String),
}

impl DocumentLocator {
    fn key(&self) -> String {
        match self {
            DocumentLocator::File(path) => format!("file://{}", path.display()),
            DocumentLocator::Url(url) => {
                let mut url = url.clone();
                url.set_fragment(None);
                url.to_string()
            }
            DocumentLocator::Bundled(name) => format!("bundled:{name}"),
        }
    }

    fn describe(&self) -> String {
        match self {
            DocumentLocator::File(path) => path.display().to_string(),
            DocumentLocator::Url(url) => url.as_str().to_string(),
            DocumentLocator::Bundled(name) => name.clone(),
        }
    }

    /// Locates the document named by the part of a reference before `#`.
    fn join(&self, location: &str) -> Result<DocumentLocator, SpeccatError> {
        if let Ok(url) = Url::parse(location) {
            return match url.scheme() {
                "http" | "https" => Ok(DocumentLocator::Url(url)),
                "file" => url
                    .to_file_path()
                    .map(|path| DocumentLocator::File(normalize_path(&path)))
                    .map_err(|_| {
                        SpeccatError::Reference(format!("invalid file reference {location}"))
                    }),
                scheme => Err(SpeccatError::Reference(format!(
                    "unsupported reference scheme {scheme} in {location}"
                ))),
            };
        }

        match self {
            DocumentLocator::File(path) => {
                let base = path.parent().unwrap_or_else(|| Path::new(""));
                Ok(DocumentLocator::File(normalize_path(&base.join(location))))
            }
            DocumentLocator::Url(url) => url.join(location).map(DocumentLocator::Url).map_err(|err| {
                SpeccatError::Reference(format!("invalid reference {location} from {url}: {err}"))
            }),
            DocumentLocator::Bundled(name) => Err(SpeccatError::Reference(format!(
                "relative reference {location} cannot be resolved from bundled document {name}"
            ))),
        }
    }

    fn load(&self, fetcher: &dyn ReferenceFetcher) -> Result<Value, SpeccatError> {
        match self {
            DocumentLocator::File(path) => {
                let content = fs::read_to_string(path).map_err(|err| {
                    SpeccatError::Reference(format!("cannot read {}: {err}", path.display()))
                })?;
                parse_document(&content, SpecFormat::from_path(path), path.display())
            }
            DocumentLocator::Url(url) => {
                let content = fetcher.fetch(url)?;
                parse_document(&content, SpecFormat::from_url_path(url.path()), url)
            }
            DocumentLocator::Bundled(name) => Err(SpeccatError::Reference(format!(
                "bundled document {name} is not loadable by reference"
            ))),
        }
    }
}

/// A memoized expansion and the number of nodes it produced.
struct Expansion {
    value: Value,
    nodes: usize,
}

struct Traversal<'a> {
    fetcher: &'a dyn ReferenceFetcher,
    options: DereferenceOptions,
    cancel: &'a CancelFlag,
    documents: HashMap<String, Arc<Value>>,
    expanded: HashMap<String, Expansion>,
    stack: Vec<String>,
    depth: usize,
    nodes: usize,
}

impl<'a> Traversal<'a> {
    fn new(
        fetcher: &'a dyn ReferenceFetcher,
        options: DereferenceOptions,
        cancel: &'a CancelFlag,
    ) -> Self {
        Self {
            fetcher,
            options,
            cancel,
            documents: HashMap::new(),
            expanded: HashMap::new(),
            stack: Vec::new(),
            depth: 0,
            nodes: 0,
        }
    }

    /// Accounts for `count` more nodes in the output tree.
    fn charge(&mut self, count: usize) -> Result<(), SpeccatError> {
        self.nodes = self.nodes.saturating_add(count);
        if self.nodes > self.options.max_nodes {
            return Err(SpeccatError::Reference(format!(
                "expansion exceeded node budget {} while resolving {}",
                self.options.max_nodes,
                self.stack.last().map(String::as_str).unwrap_or("document")
            )));
        }
        Ok(())
    }

    fn expand_root(
        &mut self,
        root: &Value,
        locator: &DocumentLocator,
    ) -> Result<Value, SpeccatError> {
        // `$ref: "#"` names the root itself, so the root sits on the stack.
        self.stack.push(format!("{}#", locator.key()));
        let expanded = self.expand(root, locator);
        self.stack.pop();
        expanded
    }

    fn expand(&mut self, node: &Value, base: &DocumentLocator) -> Result<Value, SpeccatError> {
        if self.cancel.is_cancelled() {
            return Err(SpeccatError::Reference("dereferencing cancelled".into()));
        }
        self.charge(1)?;
        if self.depth >= self.options.max_depth {
            return Err(SpeccatError::Reference(format!(
                "expansion exceeded maximum depth {} while resolving {}",
                self.options.max_depth,
                self.stack.last().map(String::as_str).unwrap_or("document")
            )));
        }
        self.depth += 1;
        let result = self.expand_node(node, base);
        self.depth -= 1;
        result
    }

    fn expand_node(&mut self, node: &Value, base: &DocumentLocator) -> Result<Value, SpeccatError> {
        match node {
            Value::Object(map) => {
                if let Some(Value::String(reference)) = map.get(REF_KEY) {
                    return self.expand_reference(reference, map, base);
                }
                let mut out = Map::with_capacity(map.len());
                for (key, value) in map {
                    out.insert(key.clone(), self.expand(value, base)?);
                }
                Ok(Value::Object(out))
            }
            Value::Array(items) => items
                .iter()
                .map(|item| self.expand(item, base))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
            other => Ok(other.clone()),
        }
    }

    fn expand_reference(
        &mut self,
        reference: &str,
        node: &Map<String, Value>,
        base: &DocumentLocator,
    ) -> Result<Value, SpeccatError> {
        let (location, pointer) = reference.split_once('#').unwrap_or((reference, ""));
        let target = if location.is_empty() {
            base.clone()
        } else {
            base.join(location)?
        };
        let key = format!("{}#{}", target.key(), pointer);

        if self.stack.contains(&key) {
            return match self.options.cycles {
                CyclePolicy::Marker => {
                    tracing::trace!(reference, "terminating reference cycle");
                    Ok(json!({ REF_KEY: reference, CIRCULAR_MARKER_KEY: true }))
                }
                CyclePolicy::Error => {
                    let cycle = self
                        .stack
                        .iter()
                        .chain(std::iter::once(&key))
                        .cloned()
                        .collect::<Vec<_>>()
                        .join(" -> ");
                    Err(SpeccatError::Reference(format!(
                        "reference cycle detected: {cycle}"
                    )))
                }
            };
        }

        // Expansions are memoized per pass; one that met a cycle keeps its
        // terminal marker wherever it is reused. Every reuse is a full copy,
        // so it is charged against the node budget before cloning.
        let memoized = self.expanded.get(&key).map(|expansion| expansion.nodes);
        let resolved = match memoized {
            Some(nodes) => {
                self.charge(nodes)?;
                self.expanded[&key].value.clone()
            }
            None => {
                let document = self.document(&target)?;
                let value = resolve_pointer(&document, pointer)
                    .ok_or_else(|| {
                        SpeccatError::Reference(format!(
                            "target of {reference} not found in {}",
                            target.describe()
                        ))
                    })?
                    .clone();

                let before = self.nodes;
                self.stack.push(key.clone());
                let expanded = self.expand(&value, &target);
                self.stack.pop();
                let expanded = expanded?;
                self.expanded.insert(
                    key,
                    Expansion {
                        value: expanded.clone(),
                        nodes: self.nodes - before,
                    },
                );
                expanded
            }
        };

        self.merge_siblings(resolved, node, base)
    }

    /// Overlays keys written next to `$ref` onto an object target.
    fn merge_siblings(
        &mut self,
        resolved: Value,
        node: &Map<String, Value>,
        base: &DocumentLocator,
    ) -> Result<Value, SpeccatError> {
        if node.len() == 1 {
            return Ok(resolved);
        }
        match resolved {
            Value::Object(mut target) => {
                for (key, value) in node {
                    if key != REF_KEY {
                        target.insert(key.clone(), self.expand(value, base)?);
                    }
                }
                Ok(Value::Object(target))
            }
            other => Ok(other),
        }
    }

    fn document(&mut self, locator: &DocumentLocator) -> Result<Arc<Value>, SpeccatError> {
        let key = locator.key();
        if let Some(document) = self.documents.get(&key) {
            return Ok(document.clone());
        }
        tracing::debug!(document = %locator.describe(), "loading referenced document");
        let document = Arc::new(locator.load(self.fetcher)?);
        self.documents.insert(key, document.clone());
        Ok(document)
    }
}

/// Resolves a JSON pointer fragment (`/a/b~1c/%7Bid%7D`) against `document`.
fn resolve_pointer<'v>(document: &'v Value, pointer: &str) -> Option<&'v Value> {
    if pointer.is_empty() || pointer == "/" {
        return Some(document);
    }
    let tokens = pointer.strip_prefix('/')?;
    tokens.split('/').try_fold(document, |current, token| {
        let decoded = urlencoding::decode(token)
            .map(|cow| cow.into_owned())
            .unwrap_or_else(|_| token.to_string());
        let token = decoded.replace("~1", "/").replace("~0", "~");
        match current {
            Value::Object(map) => map.get(&token),
            Value::Array(items) => token.parse::<usize>().ok().and_then(|idx| items.get(idx)),
            _ => None,
        }
    })
}

/// Lexically folds `.` and `..` so one file always maps to one key.
fn normalize_path(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                let popped = matches!(
                    normalized.components().next_back(),
                    Some(Component::Normal(_))
                ) && normalized.pop();
                if !popped {
                    normalized.push(component.as_os_str());
                }
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}
