use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;

use speccat::{CatalogService, DocumentResolver, SpecIdentifier, SpeccatConfig};
use tokio::runtime::Runtime;

use crate::error::{CliError, ExitStatus};
use crate::util::Verbosity;

const SHUTDOWN_GRACE: Duration = Duration::from_millis(250);

/// Command-line settings layered over `speccat.yaml`.
#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub spec_dir: Option<PathBuf>,
    pub local: bool,
    pub timeout_secs: Option<u64>,
}

impl ConfigOverrides {
    fn apply(&self, mut config: SpeccatConfig) -> SpeccatConfig {
        if let Some(spec_dir) = &self.spec_dir {
            config.spec_dir = spec_dir.clone();
        }
        if self.local {
            config.allow_remote = false;
        }
        if let Some(secs) = self.timeout_secs {
            config.resolve_timeout_secs = secs;
        }
        config
    }
}

pub struct CliSession {
    pub root: PathBuf,
    pub config: SpeccatConfig,
    pub service: CatalogService,
    pub verbosity: Verbosity,
    runtime: Runtime,
}

impl CliSession {
    pub fn bootstrap(
        root_override: Option<String>,
        overrides: ConfigOverrides,
        verbosity: Verbosity,
    ) -> Result<Self, CliError> {
        let root = match root_override {
            Some(path) => PathBuf::from(path),
            None => std::env::current_dir()?,
        };
        if !root.is_dir() {
            return Err(CliError::new(
                format!("root {} is not a directory", root.display()),
                ExitStatus::Usage,
            ));
        }

        let config = overrides.apply(SpeccatConfig::load(&root)?);
        config.validate()?;

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()?;
        let resolver = DocumentResolver::open(root.clone(), config.clone())?;

        Ok(Self {
            root,
            config,
            service: CatalogService::new(resolver),
            verbosity,
            runtime,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn block_on<F: Future>(&self, future: F) -> F::Output {
        self.runtime.block_on(future)
    }

    /// Stops the runtime without waiting on passes that outlived their
    /// command; timed-out passes are already cancelled.
    pub fn shutdown(self) {
        self.runtime.shutdown_timeout(SHUTDOWN_GRACE);
    }

    /// The identifier named on the command line, or the first discovered one.
    pub fn identifier_or_default(&self, requested: Option<&String>) -> Result<SpecIdentifier, CliError> {
        match requested {
            Some(value) => Ok(SpecIdentifier::new(value.as_str())),
            None => self.service.default_identifier().ok_or_else(|| {
                CliError::new("no specifications available", ExitStatus::Usage)
            }),
        }
    }
}
