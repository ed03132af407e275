//! Service-provider interfaces: the seams where transports plug in.
//!
//! The catalog itself never talks to the network. Descriptor trees,
//! booster content and classification metadata all arrive through
//! these traits; implementations may clone repositories, unpack
//! archives or read local fixtures.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::booster::Booster;
use crate::error::{CatalogError, Result};

/// Supplies the root of a descriptor tree as a local path.
///
/// May perform network I/O (clone, download, unpack). Must be
/// idempotent per call; failures abort the indexing pass.
#[async_trait]
pub trait DescriptorSource: Send + Sync {
    async fn provide(&self) -> Result<PathBuf>;
}

/// Fetches the source content for one booster and returns the local
/// path it was materialized at. Failures are cached per entry and
/// retried on the next request; they never affect other entries.
#[async_trait]
pub trait ContentFetcher: Send + Sync {
    async fn fetch(&self, booster: &Booster) -> Result<PathBuf>;
}

/// Supplies the `{missions: [...], runtimes: [...]}` classification
/// document. Absence of a metadata source is tolerated: every entry
/// then resolves via placeholder categories.
#[async_trait]
pub trait MetadataSource: Send + Sync {
    async fn provide(&self) -> Result<Value>;
}

// Shared implementations pass through, so callers can hand the same
// `Arc`-held source to the catalog and keep a handle themselves.

#[async_trait]
impl<T: DescriptorSource + ?Sized> DescriptorSource for Arc<T> {
    async fn provide(&self) -> Result<PathBuf> {
        (**self).provide().await
    }
}

#[async_trait]
impl<T: ContentFetcher + ?Sized> ContentFetcher for Arc<T> {
    async fn fetch(&self, booster: &Booster) -> Result<PathBuf> {
        (**self).fetch(booster).await
    }
}

#[async_trait]
impl<T: MetadataSource + ?Sized> MetadataSource for Arc<T> {
    async fn provide(&self) -> Result<Value> {
        (**self).provide().await
    }
}

/// Descriptor source backed by a pre-existing local directory.
pub struct LocalDescriptorSource {
    root: PathBuf,
}

impl LocalDescriptorSource {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }
}

#[async_trait]
impl DescriptorSource for LocalDescriptorSource {
    async fn provide(&self) -> Result<PathBuf> {
        if !self.root.is_dir() {
            return Err(CatalogError::InvalidPath(format!(
                "Catalog path does not exist: {}",
                self.root.display()
            )));
        }
        Ok(self.root.clone())
    }
}

/// Metadata source backed by a local JSON document.
pub struct LocalMetadataSource {
    path: PathBuf,
}

impl LocalMetadataSource {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

#[async_trait]
impl MetadataSource for LocalMetadataSource {
    async fn provide(&self) -> Result<Value> {
        let raw = tokio::fs::read_to_string(&self.path).await?;
        serde_json::from_str(&raw)
            .map_err(|e| CatalogError::Metadata(format!("{}: {e}", self.path.display())))
    }
}
