//! Discovery, dereferencing, and catalog extraction for API specification
//! documents.
//!
//! [`discover`] lists the specification files of a directory,
//! [`DocumentResolver`] turns an identifier into a cached, fully dereferenced
//! document, [`extract`] indexes its operations and webhooks, and
//! [`CatalogService::get_catalog`] composes the two for renderers.

pub mod catalog;
pub mod config;
pub mod dereference;
pub mod document;
pub mod error;
pub mod fetch;
pub mod format;
pub mod locator;
pub mod resolver;
pub mod service;

pub use catalog::{Catalog, Operation, TagGroup, Webhook, catalog_schema, extract};
pub use config::{CONFIG_FILE_NAME, CyclePolicy, SpeccatConfig};
pub use dereference::{
    CIRCULAR_MARKER_KEY, CancelFlag, DereferenceOptions, dereference, dereference_cancellable,
};
pub use document::{DereferencedDocument, HttpMethod, MethodMap, OperationInfo, SectionShape};
pub use error::SpeccatError;
pub use fetch::{HttpFetcher, OfflineFetcher, ReferenceFetcher};
pub use format::{SpecFormat, parse_document};
pub use locator::{
    DEFAULT_SPEC_IDENTIFIER, Discovery, SpecIdentifier, SpecSource, discover, is_spec_file_name,
};
pub use resolver::{DocumentResolver, ResolvedSpec, ResolverStats};
pub use service::{CatalogService, CatalogView};
