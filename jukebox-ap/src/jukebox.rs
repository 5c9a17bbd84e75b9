//! Jukebox coordinator
//!
//! Constructed once at startup and shared by reference (`Arc<Jukebox>`). Owns
//! the playback queue, stream URL cache, player supervisor and published
//! state, and spawns the two background loops (queue scanner and prefetcher).
//!
//! The request-facing operations here run on caller tasks. They never call
//! into the scanner; they synchronize with it through [`SharedState`] and the
//! transport lock, which serializes every "player command + state change"
//! pair (pause, skip, track start, track finish).

use crate::config::{Config, PlaybackSettings};
use crate::error::{Error, Result};
use crate::playback::{
    PlaybackQueue, PlayerLauncher, PlayerSupervisor, Prefetcher, QueueEntry, QueueScanner,
    StreamUrlCache,
};
use crate::resolver::TrackResolver;
use crate::state::{PlaybackState, SharedState};
use chrono::Utc;
use jukebox_common::{JukeboxEvent, Track};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Coordinator for queueing and playback
pub struct Jukebox {
    queue: Arc<PlaybackQueue>,
    cache: Arc<StreamUrlCache>,
    resolver: Arc<dyn TrackResolver>,
    supervisor: Arc<PlayerSupervisor>,
    state: Arc<SharedState>,
    /// Serializes player commands with the state transitions they imply
    transport: Arc<Mutex<()>>,
    clean_mode: AtomicBool,
    settings: PlaybackSettings,
    tasks: std::sync::Mutex<Vec<JoinHandle<()>>>,
}

impl Jukebox {
    pub fn new(
        config: &Config,
        resolver: Arc<dyn TrackResolver>,
        launcher: Arc<dyn PlayerLauncher>,
    ) -> Self {
        Self {
            queue: Arc::new(PlaybackQueue::new()),
            cache: Arc::new(StreamUrlCache::new(config.playback.cache_capacity)),
            resolver,
            supervisor: Arc::new(PlayerSupervisor::new(launcher, config.player.clone())),
            state: Arc::new(SharedState::new()),
            transport: Arc::new(Mutex::new(())),
            clean_mode: AtomicBool::new(config.clean_mode),
            settings: config.playback.clone(),
            tasks: std::sync::Mutex::new(Vec::new()),
        }
    }

    /// Build a queue scanner over this jukebox's components
    pub fn scanner(&self) -> QueueScanner {
        QueueScanner::new(
            Arc::clone(&self.queue),
            Arc::clone(&self.cache),
            Arc::clone(&self.resolver),
            Arc::clone(&self.supervisor),
            Arc::clone(&self.state),
            Arc::clone(&self.transport),
            self.settings.clone(),
        )
    }

    /// Build a prefetcher over this jukebox's queue and cache
    pub fn prefetcher(&self) -> Prefetcher {
        Prefetcher::new(
            Arc::clone(&self.queue),
            Arc::clone(&self.cache),
            Arc::clone(&self.resolver),
            self.settings.clone(),
        )
    }

    /// Spawn the queue scanner and prefetcher loops
    pub fn start(&self) {
        let mut tasks = self.lock_tasks();
        if !tasks.is_empty() {
            warn!("Jukebox already started");
            return;
        }

        tasks.push(Arc::new(self.prefetcher()).run());
        tasks.push(Arc::new(self.scanner()).run());
        info!("Jukebox started");
    }

    /// Search for `prompt` (honouring clean mode) and queue the best match
    pub async fn request(&self, prompt: &str) -> Result<QueueEntry> {
        let prompt = prompt.trim();
        if prompt.is_empty() {
            return Err(Error::BadRequest("prompt must not be empty".to_string()));
        }

        let restricted = self.clean_mode();
        match self.resolver.search(prompt, restricted).await {
            Ok(Some(track)) => Ok(self.enqueue(track, prompt)),
            Ok(None) => Err(Error::NotFound("Song not found".to_string())),
            Err(e) => {
                warn!(prompt, "Track search failed: {}", e);
                Err(Error::NotFound("Song not found".to_string()))
            }
        }
    }

    /// Append a track to the queue; visible to the scanner and prefetcher at once
    pub fn enqueue(&self, track: Track, prompt: &str) -> QueueEntry {
        let entry = QueueEntry::new(track, prompt);
        info!(
            track = %entry.track,
            "Queued (duration {})",
            jukebox_common::time::format_track_length(entry.track.duration_secs())
        );

        self.queue.enqueue(entry.clone());
        self.state.broadcast_event(JukeboxEvent::TrackQueued {
            entry_id: entry.entry_id,
            track: entry.track.clone(),
            prompt: entry.prompt.clone(),
            timestamp: entry.queued_at,
        });
        entry
    }

    /// Read-only snapshot; never waits on the player
    pub fn current_playback_state(&self) -> PlaybackState {
        self.state.snapshot()
    }

    /// Pending entries in play order (the current track is not included)
    pub fn queue_snapshot(&self) -> Vec<QueueEntry> {
        self.queue.snapshot()
    }

    /// Toggle pause of the active track. Returns the new paused flag; with no
    /// active track nothing is sent and the result is false.
    pub async fn pause(&self) -> Result<bool> {
        let _transport = self.transport.lock().await;
        self.require_player().await?;

        if !self.state.is_active() {
            debug!("Pause ignored, no active track");
            return Ok(false);
        }
        if !self.supervisor.pause().await {
            return Err(Error::PlayerCommand("pause".to_string()));
        }
        let paused = self.state.toggle_paused().unwrap_or(false);
        info!("Playback {}", if paused { "paused" } else { "resumed" });
        Ok(paused)
    }

    /// Stop the current track. State is cleared even if the stop command fails.
    pub async fn skip(&self) -> Result<()> {
        let _transport = self.transport.lock().await;
        self.require_player().await?;

        let stopped = self.supervisor.stop().await;
        if let Some(track) = self.state.clear(true) {
            info!(track = %track, "Skipped");
        }

        if stopped {
            Ok(())
        } else {
            Err(Error::PlayerCommand("stop".to_string()))
        }
    }

    /// Set player volume (clamped to the configured maximum). Returns the applied level.
    pub async fn set_volume(&self, level: u32) -> Result<u32> {
        let applied = self.supervisor.set_volume(level).await.ok_or_else(|| {
            Error::PlayerUnavailable("player not running".to_string())
        })?;

        self.state.broadcast_event(JukeboxEvent::VolumeChanged {
            volume: applied,
            timestamp: Utc::now(),
        });
        Ok(applied)
    }

    pub fn volume(&self) -> u32 {
        self.supervisor.volume()
    }

    pub fn max_volume(&self) -> u32 {
        self.supervisor.max_volume()
    }

    pub fn clean_mode(&self) -> bool {
        self.clean_mode.load(Ordering::SeqCst)
    }

    pub fn set_clean_mode(&self, enabled: bool) {
        self.clean_mode.store(enabled, Ordering::SeqCst);
        info!("Clean mode {}", if enabled { "enabled" } else { "disabled" });
        self.state.broadcast_event(JukeboxEvent::CleanModeChanged {
            clean_mode: enabled,
            timestamp: Utc::now(),
        });
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<JukeboxEvent> {
        self.state.subscribe_events()
    }

    pub fn state(&self) -> &Arc<SharedState> {
        &self.state
    }

    /// Stop the background loops and the player process
    pub async fn shutdown(&self) {
        let tasks: Vec<JoinHandle<()>> = self.lock_tasks().drain(..).collect();
        for task in tasks {
            task.abort();
        }
        self.supervisor.shutdown().await;
        info!("Jukebox stopped");
    }

    async fn require_player(&self) -> Result<()> {
        if self.supervisor.is_alive().await {
            Ok(())
        } else {
            Err(Error::PlayerUnavailable("player not running".to_string()))
        }
    }

    fn lock_tasks(&self) -> std::sync::MutexGuard<'_, Vec<JoinHandle<()>>> {
        self.tasks.lock().expect("task list lock poisoned")
    }
}
