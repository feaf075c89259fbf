use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::SpeccatError;
use crate::locator::DEFAULT_SPEC_IDENTIFIER;

/// Optional configuration file looked up at the root directory.
pub const CONFIG_FILE_NAME: &str = "speccat.yaml";

const DEFAULT_SPEC_DIR: &str = "openapi";
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_MAX_DEPTH: usize = 512;
const DEFAULT_MAX_NODES: usize = 1_000_000;

/// How a reference cycle is terminated during dereferencing.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CyclePolicy {
    /// Substitute a terminal `{"$ref": .., "x-circular-ref": true}` node.
    #[default]
    Marker,
    /// Fail the resolution with a reference error.
    Error,
}

/// Settings shared by discovery and resolution.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SpeccatConfig {
    /// Directory scanned for specification files, relative to the root.
    pub spec_dir: PathBuf,
    /// Identifier used when discovery finds nothing.
    pub fallback: String,
    pub resolve_timeout_secs: u64,
    /// Permit `http(s)` references to be fetched.
    pub allow_remote: bool,
    pub cycles: CyclePolicy,
    pub max_depth: usize,
    /// Upper bound on nodes produced by one dereference pass, reused
    /// expansions included.
    pub max_nodes: usize,
}

impl Default for SpeccatConfig {
    fn default() -> Self {
        Self {
            spec_dir: PathBuf::from(DEFAULT_SPEC_DIR),
            fallback: DEFAULT_SPEC_IDENTIFIER.to_string(),
            resolve_timeout_secs: DEFAULT_TIMEOUT_SECS,
            allow_remote: true,
            cycles: CyclePolicy::default(),
            max_depth: DEFAULT_MAX_DEPTH,
            max_nodes: DEFAULT_MAX_NODES,
        }
    }
}

impl SpeccatConfig {
    /// Loads `speccat.yaml` from `root` when present, otherwise returns defaults.
    pub fn load(root: impl AsRef<Path>) -> Result<Self, SpeccatError> {
        let path = root.as_ref().join(CONFIG_FILE_NAME);
        if !path.is_file() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(&path).map_err(|err| SpeccatError::io(&path, err))?;
        Self::from_yaml(&content).map_err(|err| err.context(path.display()))
    }

    pub fn from_yaml(content: &str) -> Result<Self, SpeccatError> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Self = serde_yaml::from_str(content)
            .map_err(|err| SpeccatError::Config(format!("invalid configuration: {err}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn resolve_timeout(&self) -> Duration {
        Duration::from_secs(self.resolve_timeout_secs)
    }

    /// Rejects settings that cannot drive discovery or resolution.
    pub fn validate(&self) -> Result<(), SpeccatError> {
        if self.spec_dir.is_absolute() {
            return Err(SpeccatError::Config(format!(
                "spec_dir {} must be relative to the root",
                self.spec_dir.display()
            )));
        }
        if self.resolve_timeout_secs == 0 {
            return Err(SpeccatError::Config(
                "resolve_timeout_secs must be greater than zero".into(),
            ));
        }
        if self.max_depth == 0 {
            return Err(SpeccatError::Config(
                "max_depth must be greater than zero".into(),
            ));
        }
        if self.max_nodes == 0 {
            return Err(SpeccatError::Config(
                "max_nodes must be greater than zero".into(),
            ));
        }
        if self.fallback.trim().is_empty() {
            return Err(SpeccatError::Config("fallback must not be empty".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_file_yields_defaults() {
        let temp = tempdir().unwrap();
        let config = SpeccatConfig::load(temp.path()).unwrap();
        assert_eq!(config, SpeccatConfig::default());
        assert_eq!(config.resolve_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn partial_file_overrides_only_named_keys() {
        let temp = tempdir().unwrap();
        fs::write(
            temp.path().join(CONFIG_FILE_NAME),
            "spec_dir: specs\ncycles: error\nallow_remote: false\n",
        )
        .unwrap();

        let config = SpeccatConfig::load(temp.path()).unwrap();
        assert_eq!(config.spec_dir, PathBuf::from("specs"));
        assert_eq!(config.cycles, CyclePolicy::Error);
        assert!(!config.allow_remote);
        assert_eq!(config.fallback, DEFAULT_SPEC_IDENTIFIER);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = SpeccatConfig::from_yaml("spec_directory: specs\n").unwrap_err();
        assert!(matches!(err, SpeccatError::Config(_)));
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let err = SpeccatConfig::from_yaml("resolve_timeout_secs: 0\n").unwrap_err();
        assert!(err.to_string().contains("resolve_timeout_secs"));
    }

    #[test]
    fn node_budget_is_configurable_and_must_be_positive() {
        let config = SpeccatConfig::from_yaml("max_nodes: 2000\n").unwrap();
        assert_eq!(config.max_nodes, 2000);

        let err = SpeccatConfig::from_yaml("max_nodes: 0\n").unwrap_err();
        assert!(err.to_string().contains("max_nodes"));
    }
}
