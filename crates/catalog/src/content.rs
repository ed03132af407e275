//! Per-entry content cache.
//!
//! Each entry's source content is fetched lazily, at most once at a
//! time, and cached by entry id. A failed fetch is remembered but not
//! sticky: the next request discards the failure and starts a fresh
//! attempt. The map mutex is only held for bookkeeping; fetches run
//! in spawned tasks so different entries download concurrently.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use futures::future::{BoxFuture, Shared};
use futures::FutureExt;

use crate::booster::Booster;
use crate::error::SharedResult;
use crate::spi::ContentFetcher;

/// Cloneable handle to an entry's (pending or resolved) content path.
pub type ContentHandle = Shared<BoxFuture<'static, SharedResult<PathBuf>>>;

pub(crate) struct ContentCache {
    fetcher: Arc<dyn ContentFetcher>,
    entries: Mutex<HashMap<String, ContentHandle>>,
}

impl ContentCache {
    pub fn new(fetcher: Arc<dyn ContentFetcher>) -> Self {
        Self {
            fetcher,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the content handle for `booster`, starting a fetch if
    /// none is in flight and no successful result is cached.
    ///
    /// Concurrent callers for the same entry share one handle, so at
    /// most one fetch per entry runs at any time.
    pub fn content(&self, booster: &Booster) -> ContentHandle {
        let mut entries = self.entries.lock().expect("content cache lock poisoned");
        if let Some(handle) = entries.get(booster.id()) {
            // Pending or successful handles are shared; only a
            // resolved failure is discarded and retried.
            if !matches!(handle.peek(), Some(Err(_))) {
                return handle.clone();
            }
        }
        let handle = self.start_fetch(booster);
        entries.insert(booster.id().to_string(), handle.clone());
        handle
    }

    fn start_fetch(&self, booster: &Booster) -> ContentHandle {
        let fetcher = Arc::clone(&self.fetcher);
        let booster = booster.clone();
        let handle = async move {
            let content_path = booster.content_path().map(PathBuf::from);
            // Content already on disk needs no fetch at all.
            if let Some(path) = &content_path {
                if tokio::fs::try_exists(path).await.unwrap_or(false) {
                    return Ok(path.clone());
                }
            }
            match fetcher.fetch(&booster).await {
                Ok(path) => Ok(path),
                Err(err) => {
                    // Drop whatever was partially materialized so the
                    // next attempt starts from a clean slate.
                    if let Some(path) = content_path {
                        let _ = tokio::fs::remove_dir_all(&path).await;
                    }
                    Err(Arc::new(err))
                }
            }
        }
        .boxed()
        .shared();

        // Drive the fetch even if every caller drops its handle.
        tokio::spawn(handle.clone().map(|_| ()));
        handle
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{CatalogError, Result};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Notify;

    /// Fetcher that blocks until released and counts invocations.
    struct GatedFetcher {
        calls: AtomicUsize,
        gate: Notify,
        fail: AtomicUsize,
    }

    impl GatedFetcher {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                gate: Notify::new(),
                fail: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl ContentFetcher for GatedFetcher {
        async fn fetch(&self, booster: &Booster) -> Result<PathBuf> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.gate.notified().await;
            if self.fail.load(Ordering::SeqCst) > 0 {
                self.fail.fetch_sub(1, Ordering::SeqCst);
                return Err(CatalogError::Fetch("boom".to_string()));
            }
            Ok(PathBuf::from(format!("/content/{}", booster.id())))
        }
    }

    fn booster(id: &str) -> Booster {
        let mut b = Booster::from_data(crate::data::DataMap::new());
        b.set_id(id);
        b
    }

    #[tokio::test]
    async fn concurrent_requests_share_one_fetch() {
        let fetcher = GatedFetcher::new();
        let cache = ContentCache::new(fetcher.clone());
        let b = booster("foo");

        let first = cache.content(&b);
        let second = cache.content(&b);
        // Let the single in-flight fetch finish.
        tokio::task::yield_now().await;
        fetcher.gate.notify_waiters();

        let (a, b) = tokio::join!(first, second);
        assert_eq!(a.unwrap(), PathBuf::from("/content/foo"));
        assert_eq!(b.unwrap(), PathBuf::from("/content/foo"));
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failed_fetch_is_retried_on_next_request() {
        let fetcher = GatedFetcher::new();
        fetcher.fail.store(1, Ordering::SeqCst);
        let cache = ContentCache::new(fetcher.clone());
        let b = booster("foo");

        let first = cache.content(&b);
        tokio::task::yield_now().await;
        fetcher.gate.notify_waiters();
        assert!(first.await.is_err());

        // The cached failure is discarded; a new fetch starts.
        let second = cache.content(&b);
        tokio::task::yield_now().await;
        fetcher.gate.notify_waiters();
        assert_eq!(second.await.unwrap(), PathBuf::from("/content/foo"));
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn successful_result_is_cached() {
        let fetcher = GatedFetcher::new();
        let cache = ContentCache::new(fetcher.clone());
        let b = booster("foo");

        let first = cache.content(&b);
        tokio::task::yield_now().await;
        fetcher.gate.notify_waiters();
        first.await.unwrap();

        let again = cache.content(&b).await.unwrap();
        assert_eq!(again, PathBuf::from("/content/foo"));
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn existing_content_path_resolves_without_fetching() {
        let temp = tempfile::tempdir().unwrap();
        let fetcher = GatedFetcher::new();
        let cache = ContentCache::new(fetcher.clone());
        let mut b = booster("foo");
        b.set_content_path(temp.path().to_path_buf());

        let path = cache.content(&b).await.unwrap();

        assert_eq!(path, temp.path());
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 0);
    }
}
