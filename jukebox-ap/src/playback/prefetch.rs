//! Stream URL prefetcher
//!
//! Background loop that keeps the [`StreamUrlCache`] warm for the tracks at
//! the head of the [`PlaybackQueue`]. Each cycle peeks the first K entries
//! (K = cache capacity), skips anything already cached or already being
//! resolved, and resolves the rest with bounded concurrency.
//!
//! Purely an accelerator: the queue scanner falls back to resolving inline on
//! a cache miss, so nothing breaks if a prefetch fails or never runs.

use crate::config::PlaybackSettings;
use crate::playback::{PlaybackQueue, StreamUrlCache};
use crate::resolver::TrackResolver;
use futures::stream::{self, StreamExt};
use jukebox_common::{Track, TrackId};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Clears an in-flight mark when the resolution finishes or is cancelled
struct InFlightGuard<'a> {
    cache: &'a StreamUrlCache,
    id: TrackId,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.cache.clear_in_flight(&self.id);
    }
}

/// Background prefetcher for queued tracks
pub struct Prefetcher {
    queue: Arc<PlaybackQueue>,
    cache: Arc<StreamUrlCache>,
    resolver: Arc<dyn TrackResolver>,
    settings: PlaybackSettings,
}

impl Prefetcher {
    pub fn new(
        queue: Arc<PlaybackQueue>,
        cache: Arc<StreamUrlCache>,
        resolver: Arc<dyn TrackResolver>,
        settings: PlaybackSettings,
    ) -> Self {
        Self {
            queue,
            cache,
            resolver,
            settings,
        }
    }

    /// Spawn the prefetch loop. Runs until the returned task is aborted.
    pub fn run(self: Arc<Self>) -> JoinHandle<()> {
        info!(
            "Starting prefetcher (interval: {}ms, workers: {}, look-ahead: {})",
            self.settings.prefetch_interval_ms,
            self.settings.prefetch_workers,
            self.cache.capacity()
        );

        tokio::spawn(async move {
            let mut timer = interval(self.settings.prefetch_interval());
            timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                timer.tick().await;
                self.prefetch_once().await;
            }
        })
    }

    /// Run one prefetch cycle. Returns how many resolutions were attempted.
    pub async fn prefetch_once(&self) -> usize {
        let candidates: Vec<Track> = self
            .queue
            .peek_front(self.cache.capacity())
            .into_iter()
            .filter(|track| {
                let id = track.id();
                !self.cache.contains(&id) && self.cache.mark_in_flight(id)
            })
            .collect();

        if candidates.is_empty() {
            return 0;
        }

        let count = candidates.len();
        debug!("Prefetching {} stream URL(s)", count);

        let batch = stream::iter(candidates)
            .map(|track| self.prefetch_one(track))
            .buffer_unordered(self.settings.prefetch_workers.max(1))
            .collect::<Vec<()>>();

        if tokio::time::timeout(self.settings.prefetch_batch_timeout(), batch)
            .await
            .is_err()
        {
            // Unfinished resolutions are cancelled; their guards clear the
            // in-flight marks so the next cycle can retry them.
            warn!(
                "Prefetch batch exceeded {:?}; abandoning unfinished resolutions",
                self.settings.prefetch_batch_timeout()
            );
        }

        count
    }

    async fn prefetch_one(&self, track: Track) {
        let _guard = InFlightGuard {
            cache: &self.cache,
            id: track.id(),
        };

        match self.resolver.stream_url(&track).await {
            Ok(url) => {
                debug!(track = %track, "Prefetched stream URL");
                self.cache.put(track.id(), url);
            }
            Err(e) => {
                warn!(track = %track, "Prefetch failed: {}", e);
            }
        }
    }
}
