//! # Booster Catalog
//!
//! In-memory catalog over a tree of declarative booster descriptors:
//! reusable starter-project templates with inheritance, environment
//! overlays, a mission/runtime/version taxonomy and on-demand content
//! fetching.
//!
//! ## Pipeline
//!
//! ```text
//! DescriptorSource
//!     │
//!     ├──> Descriptor Indexer (common.yaml inheritance, overlays)
//!     │      └─> candidate entries
//!     │
//!     ├──> Taxonomy Resolver (mission / runtime / version)
//!     │      └─> classified snapshot, published atomically
//!     │
//!     └──> Query Layer (composable predicates)
//!
//! any entry ──> Content Cache ──> ContentFetcher ──> cached path
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use booster_catalog::{BoosterCatalog, LocalDescriptorSource};
//! # use booster_catalog::{Booster, ContentFetcher};
//! # use std::path::PathBuf;
//! # struct NoFetch;
//! # #[async_trait::async_trait]
//! # impl ContentFetcher for NoFetch {
//! #     async fn fetch(&self, _: &Booster) -> booster_catalog::Result<PathBuf> {
//! #         unimplemented!()
//! #     }
//! # }
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let catalog = BoosterCatalog::builder()
//!         .source(LocalDescriptorSource::new("/path/to/catalog"))
//!         .fetcher(NoFetch)
//!         .build()?;
//!
//!     catalog.index().await.map_err(|e| anyhow::anyhow!(e))?;
//!     for booster in catalog.boosters() {
//!         println!("{}: {}", booster.id(), booster.name());
//!     }
//!     Ok(())
//! }
//! ```

mod booster;
mod catalog;
pub mod config;
mod content;
pub mod data;
mod error;
mod files;
mod indexer;
pub mod predicates;
mod spi;
mod taxonomy;

use std::collections::BTreeMap;

/// One complete indexing result: entries keyed (and ordered) by id.
pub type Snapshot = BTreeMap<String, booster::Booster>;

pub use booster::{Booster, Descriptor};
pub use catalog::{BoosterCatalog, Builder, IndexFilter, IndexHandle, Listener};
pub use content::ContentHandle;
pub use error::{CatalogError, Result, SharedResult};
pub use files::EXCLUDED_PROJECT_FILES;
pub use indexer::Transformer;
pub use predicates::ScriptPredicate;
pub use spi::{
    ContentFetcher, DescriptorSource, LocalDescriptorSource, LocalMetadataSource, MetadataSource,
};
pub use taxonomy::{
    process_metadata, ClassificationSource, Mission, Runtime, TaxonomyMaps, Version,
};
