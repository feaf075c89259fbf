use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::config::SpeccatConfig;
use crate::error::SpeccatError;
use crate::format::{SpecFormat, parse_document};

/// Identifier of the placeholder specification compiled into the library.
pub const DEFAULT_SPEC_IDENTIFIER: &str = "./openapi/speccat-default.yaml";

pub(crate) const BUNDLED_DEFAULT_SPEC: &str = include_str!("../assets/speccat-default.yaml");

static SPEC_FILE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\.(json|ya?ml)$").expect("specification file pattern is valid")
});

/// Opaque name of a specification document, e.g. `./openapi/pets.yaml`.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SpecIdentifier(String);

impl SpecIdentifier {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Builds the identifier for `file_name` inside `spec_dir`, marked as relative.
    pub fn for_file(spec_dir: &Path, file_name: &str) -> Self {
        let path = Path::new(".").join(spec_dir).join(file_name);
        Self(path.to_string_lossy().into_owned())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Location of the identified file under `root`.
    pub fn to_path(&self, root: &Path) -> PathBuf {
        root.join(&self.0)
    }
}

impl fmt::Display for SpecIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SpecIdentifier {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for SpecIdentifier {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Where the raw content behind an identifier lives.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SpecSource {
    File(PathBuf),
    Bundled(&'static str),
}

/// Returns true when `name` carries a specification extension (json, yaml, yml).
pub fn is_spec_file_name(name: &str) -> bool {
    SPEC_FILE_PATTERN.is_match(name)
}

/// Lists the specification files directly inside `root/spec_dir`.
///
/// A missing directory is the empty result, not an error. Entries are
/// returned sorted by file name so repeated scans agree.
pub fn discover(root: &Path, spec_dir: &Path) -> Result<Vec<SpecIdentifier>, SpeccatError> {
    let dir = root.join(spec_dir);
    let entries = match fs::read_dir(&dir) {
        Ok(entries) => entries,
        Err(err) if matches!(err.kind(), ErrorKind::NotFound | ErrorKind::NotADirectory) => {
            tracing::debug!(dir = %dir.display(), "specification directory absent");
            return Ok(Vec::new());
        }
        Err(err) => return Err(SpeccatError::io(dir, err)),
    };

    let mut names = Vec::new();
    for entry in entries.flatten() {
        let file_name = entry.file_name();
        let Some(name) = file_name.to_str() else {
            tracing::debug!(entry = ?file_name, "skipping non-utf8 entry");
            continue;
        };
        if !is_spec_file_name(name) {
            continue;
        }
        // Follows symlinks so linked specification files are kept.
        let is_file = fs::metadata(entry.path())
            .map(|meta| meta.is_file())
            .unwrap_or(false);
        if is_file {
            names.push(name.to_string());
        }
    }
    names.sort();

    let identifiers: Vec<SpecIdentifier> = names
        .iter()
        .map(|name| SpecIdentifier::for_file(spec_dir, name))
        .collect();
    tracing::debug!(dir = %dir.display(), count = identifiers.len(), "discovered specifications");
    Ok(identifiers)
}

/// Result of one discovery pass, with the fallback applied.
#[derive(Clone, Debug)]
pub struct Discovery {
    root: PathBuf,
    entries: Vec<(SpecIdentifier, SpecSource)>,
    used_fallback: bool,
}

impl Discovery {
    /// Runs discovery under `root` and selects the configured fallback when it
    /// finds nothing. A fallback that cannot be resolved fails here.
    pub fn scan(root: impl Into<PathBuf>, config: &SpeccatConfig) -> Result<Self, SpeccatError> {
        let root = root.into();
        let identifiers = discover(&root, &config.spec_dir)?;
        let entries = identifiers
            .into_iter()
            .map(|id| {
                let path = id.to_path(&root);
                (id, SpecSource::File(path))
            })
            .collect();
        Self::from_entries(root, entries).with_fallback(&config.fallback)
    }

    /// Builds a discovery result from explicit entries.
    pub fn from_entries(root: impl Into<PathBuf>, entries: Vec<(SpecIdentifier, SpecSource)>) -> Self {
        Self {
            root: root.into(),
            entries,
            used_fallback: false,
        }
    }

    /// Applies the fallback policy: when no entries exist, `fallback` becomes the
    /// sole identifier. The fallback must parse, otherwise this fails loudly.
    pub fn with_fallback(mut self, fallback: &str) -> Result<Self, SpeccatError> {
        if !self.entries.is_empty() {
            return Ok(self);
        }

        let identifier = SpecIdentifier::new(fallback);
        let source = if fallback == DEFAULT_SPEC_IDENTIFIER {
            SpecSource::Bundled(BUNDLED_DEFAULT_SPEC)
        } else {
            SpecSource::File(identifier.to_path(&self.root))
        };
        verify_fallback(&identifier, &source)?;

        tracing::info!(identifier = %identifier, "no specifications discovered; using fallback");
        self.entries.push((identifier, source));
        self.used_fallback = true;
        Ok(self)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn identifiers(&self) -> Vec<SpecIdentifier> {
        self.entries.iter().map(|(id, _)| id.clone()).collect()
    }

    /// First identifier in discovery order; the fallback when nothing was found.
    pub fn default_identifier(&self) -> Option<&SpecIdentifier> {
        self.entries.first().map(|(id, _)| id)
    }

    pub fn used_fallback(&self) -> bool {
        self.used_fallback
    }

    pub fn source(&self, identifier: &SpecIdentifier) -> Option<&SpecSource> {
        self.entries
            .iter()
            .find(|(id, _)| id == identifier)
            .map(|(_, source)| source)
    }

    pub fn contains(&self, identifier: &SpecIdentifier) -> bool {
        self.source(identifier).is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

fn verify_fallback(identifier: &SpecIdentifier, source: &SpecSource) -> Result<(), SpeccatError> {
    let fail = |reason: String| {
        SpeccatError::Config(format!(
            "fallback specification {identifier} cannot be resolved: {reason}"
        ))
    };
    match source {
        SpecSource::Bundled(content) => parse_document(content, SpecFormat::Yaml, identifier)
            .map(|_| ())
            .map_err(|err| fail(err.to_string())),
        SpecSource::File(path) => {
            let content = fs::read_to_string(path)
                .map_err(|err| fail(format!("{}: {err}", path.display())))?;
            parse_document(&content, SpecFormat::from_path(path), identifier)
                .map(|_| ())
                .map_err(|err| fail(err.to_string()))
        }
    }
}
