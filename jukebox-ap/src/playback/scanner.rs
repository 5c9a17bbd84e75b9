//! Queue scanner
//!
//! The single consumer of the [`PlaybackQueue`] and the driver of the playback
//! state machine:
//!
//! ```text
//! Idle ──dequeue──▶ Preparing ──player accepted URL──▶ Playing ◀─▶ Paused
//!  ▲                    │                                 │
//!  └── drop / requeue ──┘◀──── elapsed, skip or crash ────┘
//! ```
//!
//! The player gives no "track ended" signal, so completion is inferred from
//! elapsed time against the track's duration plus a safety buffer. Pause and
//! skip never message this loop; they mutate [`SharedState`] directly and the
//! loop observes the result on its next step.
//!
//! Transitions that pair a player command with a state change take the
//! transport lock shared with [`crate::Jukebox`], so a skip cannot interleave
//! between "player told to play" and "state says playing".

use crate::config::PlaybackSettings;
use crate::playback::{PlaybackQueue, PlayerSupervisor, QueueEntry, StreamUrlCache};
use crate::resolver::TrackResolver;
use crate::state::{ActiveProgress, PlaybackTicket, SharedState};
use chrono::Utc;
use jukebox_common::{JukeboxEvent, Track};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// What one scanner step did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanOutcome {
    /// Active track still within its play window (slept one poll interval)
    Playing,
    /// Active track ran past its play window and was stopped
    Finished,
    /// Player process died under the active track
    PlayerLost,
    /// Queue stayed empty for the idle wait
    Idle,
    /// Track handed to the player
    Started,
    /// Player could not be started; track put back at the head of the queue
    Requeued,
    /// Track could not be resolved or commanded and was discarded
    Dropped,
    /// Track was skipped while it was being prepared
    Abandoned,
}

/// Queue consumer and playback state machine
pub struct QueueScanner {
    queue: Arc<PlaybackQueue>,
    cache: Arc<StreamUrlCache>,
    resolver: Arc<dyn TrackResolver>,
    supervisor: Arc<PlayerSupervisor>,
    state: Arc<SharedState>,
    transport: Arc<Mutex<()>>,
    settings: PlaybackSettings,
}

impl QueueScanner {
    pub fn new(
        queue: Arc<PlaybackQueue>,
        cache: Arc<StreamUrlCache>,
        resolver: Arc<dyn TrackResolver>,
        supervisor: Arc<PlayerSupervisor>,
        state: Arc<SharedState>,
        transport: Arc<Mutex<()>>,
        settings: PlaybackSettings,
    ) -> Self {
        Self {
            queue,
            cache,
            resolver,
            supervisor,
            state,
            transport,
            settings,
        }
    }

    /// Spawn the scanner loop. Runs until the returned task is aborted.
    pub fn run(self: Arc<Self>) -> JoinHandle<()> {
        info!(
            "Starting queue scanner (poll: {}ms, safety buffer: {}s)",
            self.settings.poll_interval_ms, self.settings.safety_buffer_secs
        );

        tokio::spawn(async move {
            loop {
                let outcome = self.step().await;
                debug!("Scanner step: {:?}", outcome);
            }
        })
    }

    /// Advance the state machine by one step.
    ///
    /// Every path either waits (poll interval, idle wait, spawn backoff) or
    /// makes progress, so calling this in a loop never spins hot.
    pub async fn step(&self) -> ScanOutcome {
        if let Some(progress) = self.state.active_progress() {
            return self.watch_active(progress).await;
        }

        match self.queue.dequeue_timeout(self.settings.idle_wait()).await {
            Some(entry) => self.start_next(entry).await,
            None => ScanOutcome::Idle,
        }
    }

    async fn watch_active(&self, progress: ActiveProgress) -> ScanOutcome {
        let ActiveProgress {
            ticket,
            track,
            elapsed,
            player_instance,
        } = progress;

        // A respawned process never holds this track's stream
        if !self.supervisor.is_alive().await || self.supervisor.instance() != player_instance {
            let _transport = self.transport.lock().await;
            if self.state.clear_if_current(ticket, true).is_some() {
                warn!(track = %track, "Player process exited during playback");
            }
            return ScanOutcome::PlayerLost;
        }

        if elapsed <= self.settings.play_window(track.duration_secs()) {
            tokio::time::sleep(self.settings.poll_interval()).await;
            return ScanOutcome::Playing;
        }

        let _transport = self.transport.lock().await;
        if !self.state.is_current(ticket) {
            // Skipped between the progress read and taking the lock
            return ScanOutcome::Finished;
        }
        if !self.supervisor.stop().await {
            debug!("Stop command not delivered at end of track");
        }
        if self.state.clear_if_current(ticket, false).is_some() {
            info!(track = %track, "Track finished after {:?}", elapsed);
        }
        ScanOutcome::Finished
    }

    async fn start_next(&self, entry: QueueEntry) -> ScanOutcome {
        let track = entry.track.clone();
        let ticket = self.state.begin_preparing(track.clone());
        info!(track = %track, "Preparing next track");

        if !self.supervisor.ensure_running().await {
            warn!(
                track = %track,
                "Player unavailable; requeueing at head and retrying in {:?}",
                self.settings.spawn_backoff()
            );
            self.queue.requeue_front(entry);
            self.state.clear_if_current(ticket, false);
            tokio::time::sleep(self.settings.spawn_backoff()).await;
            return ScanOutcome::Requeued;
        }

        let url = match self.cache.take(&track.id()) {
            Some(url) => {
                debug!(track = %track, "Using prefetched stream URL");
                url
            }
            None => match self.resolver.stream_url(&track).await {
                Ok(url) => url,
                Err(e) => {
                    warn!(track = %track, "Dropping track, stream URL resolution failed: {}", e);
                    self.drop_track(ticket, track, format!("resolution failed: {}", e));
                    return ScanOutcome::Dropped;
                }
            },
        };

        let transport = self.transport.lock().await;
        if !self.state.is_current(ticket) {
            info!(track = %track, "Track skipped while preparing; not starting it");
            return ScanOutcome::Abandoned;
        }

        let Some(player_instance) = self.supervisor.play_url(&url).await else {
            warn!(track = %track, "Player rejected play command; dropping track");
            self.drop_track(ticket, track, "player rejected play command".to_string());
            return ScanOutcome::Dropped;
        };

        self.state.begin_playing(ticket, player_instance);
        drop(transport);

        info!(track = %track, "Now playing");
        if self.supervisor.restore_default_volume().await.is_none() {
            debug!("Default volume not applied");
        }
        ScanOutcome::Started
    }

    fn drop_track(&self, ticket: PlaybackTicket, track: Track, reason: String) {
        self.state.clear_if_current(ticket, false);
        self.state.broadcast_event(JukeboxEvent::TrackDropped {
            track,
            reason,
            timestamp: Utc::now(),
        });
    }
}
