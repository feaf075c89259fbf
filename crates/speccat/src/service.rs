use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;

use crate::catalog::{Operation, Webhook};
use crate::config::SpeccatConfig;
use crate::document::DereferencedDocument;
use crate::error::SpeccatError;
use crate::locator::SpecIdentifier;
use crate::resolver::DocumentResolver;

/// What a renderer receives for one specification: the catalog as an index
/// plus the full document for operation detail.
#[derive(Clone, Debug, Serialize)]
pub struct CatalogView {
    pub operations: Vec<Operation>,
    pub webhooks: Vec<Webhook>,
    pub document: Arc<DereferencedDocument>,
}

/// Entry point used by rendering surfaces.
#[derive(Clone)]
pub struct CatalogService {
    resolver: DocumentResolver,
}

impl CatalogService {
    pub fn new(resolver: DocumentResolver) -> Self {
        Self { resolver }
    }

    /// Discovers specifications under `root` using `speccat.yaml` when present.
    pub fn from_root(root: impl Into<PathBuf>) -> Result<Self, SpeccatError> {
        let root = root.into();
        let config = SpeccatConfig::load(&root)?;
        Ok(Self::new(DocumentResolver::open(root, config)?))
    }

    pub fn resolver(&self) -> &DocumentResolver {
        &self.resolver
    }

    /// Identifiers a renderer may request; never empty once constructed.
    pub fn identifiers(&self) -> Vec<SpecIdentifier> {
        self.resolver.identifiers()
    }

    pub fn default_identifier(&self) -> Option<SpecIdentifier> {
        self.resolver.discovery().default_identifier().cloned()
    }

    pub async fn get_catalog(&self, identifier: &SpecIdentifier) -> Result<CatalogView, SpeccatError> {
        let resolved = self.resolver.resolve_spec(identifier).await?;
        Ok(CatalogView {
            operations: resolved.catalog.operations.clone(),
            webhooks: resolved.catalog.webhooks.clone(),
            document: resolved.document.clone(),
        })
    }

    pub async fn resolve(
        &self,
        identifier: &SpecIdentifier,
    ) -> Result<Arc<DereferencedDocument>, SpeccatError> {
        self.resolver.resolve(identifier).await
    }
}
