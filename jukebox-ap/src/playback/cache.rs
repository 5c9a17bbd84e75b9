//! Stream URL cache
//!
//! Bounded LRU map from [`TrackId`] to a resolved, directly playable media
//! URL, plus the set of tracks whose resolution is currently in flight.
//!
//! Stream URLs are short-lived, so the queue scanner claims them with
//! [`StreamUrlCache::take`] (get-and-remove) rather than reading them. The
//! lock is held only for the map operation itself; no resolution work ever
//! happens under it.

use jukebox_common::TrackId;
use lru::LruCache;
use std::collections::HashSet;
use std::num::NonZeroUsize;
use std::sync::Mutex;
use tracing::trace;

struct Inner {
    urls: LruCache<TrackId, String>,
    in_flight: HashSet<TrackId>,
}

/// LRU cache of resolved stream URLs with in-flight de-duplication
pub struct StreamUrlCache {
    inner: Mutex<Inner>,
}

impl StreamUrlCache {
    /// Create a cache holding at most `capacity` URLs (a zero capacity is raised to 1)
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: Mutex::new(Inner {
                urls: LruCache::new(capacity),
                in_flight: HashSet::new(),
            }),
        }
    }

    /// Look up a URL, refreshing its recency
    pub fn try_get(&self, id: &TrackId) -> Option<String> {
        self.lock().urls.get(id).cloned()
    }

    /// Insert or refresh a URL, evicting the least recently used entry when full
    pub fn put(&self, id: TrackId, url: String) {
        let mut inner = self.lock();
        if let Some((evicted, _)) = inner.urls.push(id.clone(), url) {
            if evicted != id {
                trace!("Evicted cached stream URL for {}", evicted);
            }
        }
    }

    /// Claim a URL for immediate playback, removing it from the cache
    pub fn take(&self, id: &TrackId) -> Option<String> {
        self.lock().urls.pop(id)
    }

    /// Whether a URL is cached, without touching recency
    pub fn contains(&self, id: &TrackId) -> bool {
        self.lock().urls.contains(id)
    }

    /// Mark a track as being resolved.
    ///
    /// Returns true if newly marked, false if a resolution is already running.
    pub fn mark_in_flight(&self, id: TrackId) -> bool {
        self.lock().in_flight.insert(id)
    }

    pub fn clear_in_flight(&self, id: &TrackId) {
        self.lock().in_flight.remove(id);
    }

    pub fn is_in_flight(&self, id: &TrackId) -> bool {
        self.lock().in_flight.contains(id)
    }

    /// Number of cached URLs
    pub fn len(&self) -> usize {
        self.lock().urls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.lock().urls.cap().get()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().expect("stream URL cache lock poisoned")
    }
}
