//! # Media Cache Gateway
//!
//! Resolves a track URL to the cheapest available byte source: a bounded
//! in-memory hot tier, then a content-addressed file on disk, then the
//! network. On a full miss the remote URL is returned immediately so
//! playback can start streaming while a background task fetches and
//! persists the bytes for next time.
//!
//! Disk entries are keyed by the SHA-256 of the stream URL and never
//! invalidated: remote content is assumed immutable per URL.

use crate::error::{EngineError, Result};
use bridge_traits::{MediaFetcher, MediaSource};
use bytes::Bytes;
use lru::LruCache;
use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Media payloads kept in the in-memory hot tier.
const HOT_TIER_ENTRIES: NonZeroUsize = match NonZeroUsize::new(16) {
    Some(n) => n,
    None => unreachable!(),
};

/// Two-tier (memory + disk) cache in front of the network.
pub struct MediaCacheGateway {
    root: PathBuf,
    fetcher: Arc<dyn MediaFetcher>,
    hot: Mutex<LruCache<String, Bytes>>,
}

impl MediaCacheGateway {
    /// Create a gateway rooted at `root`. Call [`initialize`](Self::initialize)
    /// before first use to create the directory.
    pub fn new(root: impl Into<PathBuf>, fetcher: Arc<dyn MediaFetcher>) -> Self {
        Self {
            root: root.into(),
            fetcher,
            hot: Mutex::new(LruCache::new(HOT_TIER_ENTRIES)),
        }
    }

    /// Create the on-disk cache directory.
    pub async fn initialize(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.root).await?;
        debug!(root = %self.root.display(), "media cache initialized");
        Ok(())
    }

    /// Path a cached copy of `url` lives at, whether or not it exists yet.
    pub fn entry_path(&self, url: &str) -> PathBuf {
        let digest = Sha256::digest(url.as_bytes());
        self.root.join(format!("{digest:x}.media"))
    }

    /// Returns the cached file path if `url` has a completed disk entry.
    pub async fn lookup(&self, url: &str) -> Option<PathBuf> {
        let path = self.entry_path(url);
        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() && meta.len() > 0 => Some(path),
            _ => None,
        }
    }

    /// Returns `true` if either tier holds `url`.
    pub async fn contains(&self, url: &str) -> bool {
        if self.hot.lock().contains(url) {
            return true;
        }
        self.lookup(url).await.is_some()
    }

    /// Resolve `url` to the cheapest available source.
    ///
    /// A full miss returns [`MediaSource::RemoteStream`] right away; callers
    /// that want the bytes persisted for next time follow up with
    /// [`fetch_and_store`](Self::fetch_and_store) in a background task.
    pub async fn resolve(&self, url: &str) -> MediaSource {
        if let Some(data) = self.hot.lock().get(url).cloned() {
            debug!(url, "cache hit (memory)");
            return MediaSource::Memory { data };
        }
        if let Some(path) = self.lookup(url).await {
            debug!(url, path = %path.display(), "cache hit (disk)");
            return MediaSource::LocalFile { path };
        }
        debug!(url, "cache miss, streaming from network");
        MediaSource::RemoteStream {
            url: url.to_string(),
        }
    }

    /// Fetch `url` and persist it into both tiers.
    ///
    /// Used as a fire-and-forget follow-up after a cache miss; `cancel`
    /// aborts the work when the track changes or playback stops before the
    /// fetch completes. Cancellation is not an error.
    ///
    /// # Errors
    ///
    /// Fails if the network fetch fails or the entry cannot be written.
    pub async fn fetch_and_store(&self, url: &str, cancel: CancellationToken) -> Result<()> {
        let fetched = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!(url, "background cache fill cancelled");
                return Ok(());
            }
            fetched = self.fetcher.fetch(url) => fetched,
        };
        let data = fetched.map_err(|e| EngineError::FetchFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

        self.write_entry(url, &data).await?;
        self.hot.lock().put(url.to_string(), data);
        info!(url, "media cached");
        Ok(())
    }

    /// Write bytes to the disk tier via a temp file and rename, so a
    /// concurrent `lookup` never observes a partial entry.
    async fn write_entry(&self, url: &str, data: &[u8]) -> Result<()> {
        let path = self.entry_path(url);
        let tmp = path.with_extension("part");
        tokio::fs::create_dir_all(&self.root).await?;
        tokio::fs::write(&tmp, data).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }
}
