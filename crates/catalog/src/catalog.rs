//! The catalog service: owns the published snapshot, coordinates
//! index/reindex passes and serves queries.
//!
//! The snapshot is a single atomically-swapped immutable reference;
//! readers never lock. One mutex guards only the start-a-new-pass
//! decision, so concurrent `index()` callers share one in-flight
//! handle.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use arc_swap::ArcSwap;
use futures::future::{BoxFuture, Shared};
use futures::FutureExt;

use crate::booster::Booster;
use crate::content::{ContentCache, ContentHandle};
use crate::error::{CatalogError, Result, SharedResult};
use crate::indexer::{self, IndexOptions, Transformer};
use crate::spi::{ContentFetcher, DescriptorSource, MetadataSource};
use crate::taxonomy::{self, ClassificationSource, Mission, Runtime, Version};
use crate::{files, Snapshot};

/// Cloneable handle to an in-flight (or finished) indexing pass.
pub type IndexHandle = Shared<BoxFuture<'static, SharedResult<Arc<Snapshot>>>>;

/// Called for every non-ignored, filter-passing entry after a pass.
pub type Listener = Arc<dyn Fn(&Booster) + Send + Sync>;

/// Global inclusion filter applied before any query predicate.
pub type IndexFilter = Arc<dyn Fn(&Booster) -> bool + Send + Sync>;

pub struct BoosterCatalog {
    inner: Arc<Inner>,
}

struct Inner {
    source: Arc<dyn DescriptorSource>,
    metadata_source: Option<Arc<dyn MetadataSource>>,
    content: ContentCache,
    snapshot: ArcSwap<Snapshot>,
    index_task: Mutex<Option<IndexHandle>>,
    prefetch_task: Mutex<Option<IndexHandle>>,
    index_filter: Option<IndexFilter>,
    listener: Option<Listener>,
    transformer: Transformer,
    environment: Option<String>,
    classification: ClassificationSource,
    cancel: AtomicBool,
}

impl BoosterCatalog {
    pub fn builder() -> Builder {
        Builder::default()
    }

    /// Starts the first indexing pass, or returns the handle of the
    /// pass already started. Running this multiple times has no
    /// effect; call [`reindex`](Self::reindex) to force a new pass.
    pub fn index(&self) -> IndexHandle {
        self.start_index(false)
    }

    /// Starts a fresh indexing pass unless one is already in flight,
    /// in which case that pass's handle is returned unchanged.
    pub fn reindex(&self) -> IndexHandle {
        self.start_index(true)
    }

    fn start_index(&self, reindex: bool) -> IndexHandle {
        let mut task = self.inner.index_task.lock().expect("index task lock poisoned");

        let start_new = match task.as_ref() {
            None => true,
            // A finished pass can be superseded; an in-flight one is
            // always shared, even by reindex() callers.
            Some(handle) => reindex && handle.peek().is_some(),
        };
        if !start_new {
            return task.as_ref().expect("checked above").clone();
        }

        // Only the very first pass publishes incrementally.
        let first_pass = task.is_none() && !reindex;
        let inner = Arc::clone(&self.inner);
        let handle = async move { inner.run_index(first_pass).await }
            .boxed()
            .shared();
        // Run the pass even if no caller ever awaits the handle.
        tokio::spawn(handle.clone().map(|_| ()));
        *task = Some(handle.clone());
        handle
    }

    /// Pre-fetches the content of every indexed booster. Not required
    /// (content is fetched on demand) but avoids first-use latency.
    /// Individual failures are logged and skipped.
    pub fn prefetch_all(&self) -> IndexHandle {
        let mut task = self
            .inner
            .prefetch_task
            .lock()
            .expect("prefetch task lock poisoned");
        if let Some(handle) = task.as_ref() {
            return handle.clone();
        }
        let inner = Arc::clone(&self.inner);
        let handle = async move {
            log::info!("Pre-fetching boosters...");
            let snapshot = inner.snapshot.load_full();
            for booster in snapshot.values() {
                if let Err(err) = inner.content.content(booster).await {
                    log::error!("Error while fetching booster '{}': {err}", booster.name());
                }
            }
            log::info!("Finished prefetching boosters");
            Ok(snapshot)
        }
        .boxed()
        .shared();
        tokio::spawn(handle.clone().map(|_| ()));
        *task = Some(handle.clone());
        handle
    }

    /// Signals the in-flight indexing pass to abort at the next
    /// directory-walk step.
    pub fn cancel_indexing(&self) {
        self.inner.cancel.store(true, Ordering::Relaxed);
    }

    /// The last fully published snapshot. Never blocks on in-flight
    /// indexing.
    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.inner.snapshot.load_full()
    }

    /// All entries passing the global filter and not marked ignored,
    /// in ascending id order.
    pub fn boosters(&self) -> Vec<Booster> {
        self.boosters_matching(|_| true)
    }

    /// Entries passing the prefilter and the given predicate, in
    /// ascending id order.
    pub fn boosters_matching(&self, filter: impl Fn(&Booster) -> bool) -> Vec<Booster> {
        let snapshot = self.inner.snapshot.load();
        snapshot
            .values()
            .filter(|b| self.inner.prefiltered(b))
            .filter(|b| filter(b))
            .cloned()
            .collect()
    }

    /// First entry (in id order) passing the prefilter and predicate.
    pub fn booster(&self, filter: impl Fn(&Booster) -> bool) -> Option<Booster> {
        let snapshot = self.inner.snapshot.load();
        snapshot
            .values()
            .find(|b| self.inner.prefiltered(b) && filter(b))
            .cloned()
    }

    /// Entry matching the given taxonomy triple exactly.
    pub fn find_booster(
        &self,
        mission: &Mission,
        runtime: &Runtime,
        version: Option<&Version>,
    ) -> Option<Booster> {
        self.booster(|b| {
            b.mission() == Some(mission)
                && b.runtime() == Some(runtime)
                && version.map_or(true, |v| b.version() == Some(v))
        })
    }

    /// Distinct missions among the prefiltered entries, ordered by
    /// display name.
    pub fn missions(&self) -> Vec<Mission> {
        self.collect_categories(|b| b.mission().cloned())
    }

    /// Distinct runtimes among the prefiltered entries, ordered by
    /// display name.
    pub fn runtimes(&self) -> Vec<Runtime> {
        self.collect_categories(|b| b.runtime().cloned())
    }

    /// Distinct versions offered for a mission/runtime pair, ordered
    /// by display name.
    pub fn versions(&self, mission: &Mission, runtime: &Runtime) -> Vec<Version> {
        let snapshot = self.inner.snapshot.load();
        let mut versions: Vec<Version> = Vec::new();
        for b in snapshot.values().filter(|b| self.inner.prefiltered(b)) {
            if b.mission() == Some(mission) && b.runtime() == Some(runtime) {
                if let Some(v) = b.version() {
                    if !versions.contains(v) {
                        versions.push(v.clone());
                    }
                }
            }
        }
        versions.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        versions
    }

    fn collect_categories<C: Clone + PartialEq + CategoryName>(
        &self,
        extract: impl Fn(&Booster) -> Option<C>,
    ) -> Vec<C> {
        let snapshot = self.inner.snapshot.load();
        let mut out: Vec<C> = Vec::new();
        for b in snapshot.values().filter(|b| self.inner.prefiltered(b)) {
            if let Some(category) = extract(b) {
                if !out.contains(&category) {
                    out.push(category);
                }
            }
        }
        out.sort_by(|a, b| a.name().cmp(b.name()).then_with(|| a.id().cmp(b.id())));
        out
    }

    /// Content handle for one entry; see [`crate::content`] for the
    /// dedup and retry semantics.
    pub fn content(&self, booster: &Booster) -> ContentHandle {
        self.inner.content.content(booster)
    }

    /// Materializes the booster's content into `project_root`,
    /// fetching it first if needed and skipping the excluded file
    /// list.
    pub async fn copy_to(&self, booster: &Booster, project_root: &Path) -> Result<PathBuf> {
        let content = self
            .inner
            .content
            .content(booster)
            .await
            .map_err(|err| CatalogError::Fetch(err.to_string()))?;
        let target = project_root.to_path_buf();
        tokio::task::spawn_blocking(move || {
            files::copy_excluding(&content, &target)?;
            Ok::<_, CatalogError>(target)
        })
        .await
        .map_err(|e| CatalogError::Task(e.to_string()))?
    }
}

// Name/id accessors shared by the three category types, used only for
// the sorted distinct-category queries above.
trait CategoryName {
    fn name(&self) -> &str;
    fn id(&self) -> &str;
}

macro_rules! category_name {
    ($ty:ty) => {
        impl CategoryName for $ty {
            fn name(&self) -> &str {
                &self.name
            }
            fn id(&self) -> &str {
                &self.id
            }
        }
    };
}

category_name!(Mission);
category_name!(Runtime);
category_name!(Version);

impl Inner {
    fn prefiltered(&self, booster: &Booster) -> bool {
        !booster.is_ignore()
            && self
                .index_filter
                .as_ref()
                .map_or(true, |filter| filter(booster))
    }

    async fn run_index(self: Arc<Self>, first_pass: bool) -> SharedResult<Arc<Snapshot>> {
        self.cancel.store(false, Ordering::Relaxed);

        let root = self.source.provide().await.map_err(Arc::new)?;

        // The walk is blocking filesystem work; keep it off the
        // async workers.
        let options = IndexOptions {
            environment: self.environment.clone(),
            transformer: Arc::clone(&self.transformer),
        };
        let walker = Arc::clone(&self);
        let walk_root = root.clone();
        let mut working = tokio::task::spawn_blocking(move || {
            let mut working = Snapshot::new();
            indexer::index_catalog(&walk_root, &options, &walker.cancel, &mut |booster| {
                working.insert(booster.id().to_string(), booster);
                if first_pass {
                    // First pass only: publish after every entry so
                    // readers watch the catalog grow from empty.
                    walker.snapshot.store(Arc::new(working.clone()));
                }
            })?;
            Ok::<_, CatalogError>(working)
        })
        .await
        .map_err(|e| Arc::new(CatalogError::Task(e.to_string())))?
        .map_err(|err| {
            log::error!("Error while indexing: {err}");
            Arc::new(err)
        })?;

        // Second pass: classification. A failing metadata source is
        // logged and degrades to placeholder categories.
        let doc = match &self.metadata_source {
            Some(source) => match source.provide().await {
                Ok(doc) => Some(doc),
                Err(err) => {
                    log::error!("Error while processing metadata: {err}");
                    None
                }
            },
            None => None,
        };
        taxonomy::resolve(&mut working, doc.as_ref(), self.classification);

        // Atomic publication: readers switch wholesale from the old
        // snapshot to the new one.
        let snapshot = Arc::new(working);
        self.snapshot.store(Arc::clone(&snapshot));

        if let Some(listener) = &self.listener {
            for booster in snapshot.values().filter(|b| self.prefiltered(b)) {
                listener(booster);
            }
        }

        log::info!("Finished content indexing ({} boosters)", snapshot.len());
        Ok(snapshot)
    }
}

/// Builder for [`BoosterCatalog`].
#[derive(Default)]
pub struct Builder {
    source: Option<Arc<dyn DescriptorSource>>,
    fetcher: Option<Arc<dyn ContentFetcher>>,
    metadata_source: Option<Arc<dyn MetadataSource>>,
    index_filter: Option<IndexFilter>,
    listener: Option<Listener>,
    transformer: Option<Transformer>,
    environment: Option<String>,
    classification: ClassificationSource,
}

impl Builder {
    pub fn source(mut self, source: impl DescriptorSource + 'static) -> Self {
        self.source = Some(Arc::new(source));
        self
    }

    pub fn fetcher(mut self, fetcher: impl ContentFetcher + 'static) -> Self {
        self.fetcher = Some(Arc::new(fetcher));
        self
    }

    pub fn metadata_source(mut self, source: impl MetadataSource + 'static) -> Self {
        self.metadata_source = Some(Arc::new(source));
        self
    }

    /// Global inclusion filter applied (with the ignore gate) before
    /// every query predicate and listener notification.
    pub fn filter(mut self, filter: impl Fn(&Booster) -> bool + Send + Sync + 'static) -> Self {
        self.index_filter = Some(Arc::new(filter));
        self
    }

    pub fn listener(mut self, listener: impl Fn(&Booster) + Send + Sync + 'static) -> Self {
        self.listener = Some(Arc::new(listener));
        self
    }

    /// Rewrites every parsed descriptor data map before the entry is
    /// built.
    pub fn transformer(
        mut self,
        transformer: impl Fn(crate::data::DataMap) -> crate::data::DataMap + Send + Sync + 'static,
    ) -> Self {
        self.transformer = Some(Arc::new(transformer));
        self
    }

    /// Comma-separated environment names folded over every entry.
    pub fn environment(mut self, environment: impl Into<String>) -> Self {
        self.environment = Some(environment.into());
        self
    }

    pub fn classification(mut self, classification: ClassificationSource) -> Self {
        self.classification = classification;
        self
    }

    pub fn build(self) -> Result<BoosterCatalog> {
        let source = self
            .source
            .ok_or_else(|| CatalogError::InvalidPath("no descriptor source configured".into()))?;
        let fetcher = self
            .fetcher
            .ok_or_else(|| CatalogError::Fetch("no content fetcher configured".into()))?;
        Ok(BoosterCatalog {
            inner: Arc::new(Inner {
                source,
                metadata_source: self.metadata_source,
                content: ContentCache::new(fetcher),
                snapshot: ArcSwap::from_pointee(Snapshot::new()),
                index_task: Mutex::new(None),
                prefetch_task: Mutex::new(None),
                index_filter: self.index_filter,
                listener: self.listener,
                transformer: self.transformer.unwrap_or_else(|| Arc::new(|data| data)),
                environment: self.environment,
                classification: self.classification,
                cancel: AtomicBool::new(false),
            }),
        })
    }
}
