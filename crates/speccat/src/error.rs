use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

/// High-level error type shared across speccat components.
///
/// The type is `Clone` so that a single in-flight resolution can hand the
/// same failure to every caller waiting on it.
#[derive(Clone, Debug, Error)]
pub enum SpeccatError {
    #[error("specification not found: {0}")]
    NotFound(String),
    #[error("parse error in {origin}: {message}")]
    Parse { origin: String, message: String },
    #[error("reference error: {0}")]
    Reference(String),
    #[error("resolution of {identifier} timed out after {after:?}")]
    Timeout { identifier: String, after: Duration },
    #[error("configuration error: {0}")]
    Config(String),
    #[error("io error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: Arc<std::io::Error>,
    },
}

impl SpeccatError {
    pub fn parse(origin: impl fmt::Display, message: impl fmt::Display) -> Self {
        Self::Parse {
            origin: origin.to_string(),
            message: message.to_string(),
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source: Arc::new(source),
        }
    }

    pub fn context<T: fmt::Display>(self, ctx: T) -> Self {
        match self {
            SpeccatError::NotFound(msg) => SpeccatError::NotFound(format!("{ctx}: {msg}")),
            SpeccatError::Parse { origin, message } => SpeccatError::Parse {
                origin,
                message: format!("{ctx}: {message}"),
            },
            SpeccatError::Reference(msg) => SpeccatError::Reference(format!("{ctx}: {msg}")),
            SpeccatError::Config(msg) => SpeccatError::Config(format!("{ctx}: {msg}")),
            err @ (SpeccatError::Timeout { .. } | SpeccatError::Io { .. }) => err,
        }
    }
}

pub type Result<T, E = SpeccatError> = std::result::Result<T, E>;
