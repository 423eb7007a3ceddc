//! Response cache for rendered syndication documents.
//!
//! Entries are keyed by the exact request parameter string. An entry is
//! served while younger than the freshness window; entries older than the
//! eviction window are dropped by a sweep that runs after cache writes.
//! At most one sweep is in flight at a time.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use tracing::{debug, warn};

/// Age under which a cached document is served as-is.
pub const FRESHNESS_WINDOW: Duration = Duration::from_secs(10 * 60);

/// Age past which a cached document is removed by the next sweep.
pub const EVICTION_WINDOW: Duration = Duration::from_secs(60 * 60);

#[derive(Debug, Clone)]
struct CacheEntry {
    content: Arc<str>,
    created_at: Instant,
}

#[derive(Debug)]
struct Inner {
    entries: RwLock<HashMap<String, CacheEntry>>,
    freshness: Duration,
    eviction: Duration,
    sweeping: AtomicBool,
}

/// Shared, thread-safe cache. Clones share the same entries.
#[derive(Debug, Clone)]
pub struct ResponseCache {
    inner: Arc<Inner>,
}

impl Default for ResponseCache {
    fn default() -> Self {
        Self::new()
    }
}

impl ResponseCache {
    pub fn new() -> Self {
        Self::with_windows(FRESHNESS_WINDOW, EVICTION_WINDOW)
    }

    pub fn with_windows(freshness: Duration, eviction: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                entries: RwLock::new(HashMap::new()),
                freshness,
                eviction,
                sweeping: AtomicBool::new(false),
            }),
        }
    }

    /// Fresh cached content for `key`, if any.
    pub fn get(&self, key: &str) -> Option<Arc<str>> {
        let entries = self.inner.entries.read();
        entries
            .get(key)
            .filter(|e| e.created_at.elapsed() < self.inner.freshness)
            .map(|e| Arc::clone(&e.content))
    }

    /// Return fresh content for `key`, rendering and storing it on a miss.
    ///
    /// `render` runs without any lock held, so concurrent misses for the same
    /// key may both render; the later write wins.
    pub fn get_or_render(&self, key: &str, render: impl FnOnce() -> String) -> Arc<str> {
        if let Some(hit) = self.get(key) {
            debug!(key, "response cache hit");
            return hit;
        }

        let content: Arc<str> = Arc::from(render());
        self.inner.entries.write().insert(
            key.to_string(),
            CacheEntry {
                content: Arc::clone(&content),
                created_at: Instant::now(),
            },
        );
        self.schedule_sweep();
        content
    }

    /// Remove entries older than the eviction window. Returns how many went.
    pub fn sweep(&self) -> usize {
        self.inner.sweep()
    }

    pub fn len(&self) -> usize {
        self.inner.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn schedule_sweep(&self) {
        if self.inner.sweeping.swap(true, Ordering::AcqRel) {
            return;
        }
        let inner = Arc::clone(&self.inner);
        let spawned = std::thread::Builder::new()
            .name("cache-sweep".into())
            .spawn(move || {
                inner.sweep();
                inner.sweeping.store(false, Ordering::Release);
            });
        if let Err(err) = spawned {
            warn!(error = %err, "could not spawn cache sweep");
            self.inner.sweeping.store(false, Ordering::Release);
        }
    }
}

impl Inner {
    fn sweep(&self) -> usize {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|_, e| e.created_at.elapsed() <= self.eviction);
        let removed = before - entries.len();
        if removed > 0 {
            debug!(removed, remaining = entries.len(), "response cache swept");
        }
        removed
    }
}
