//! Shared playback state
//!
//! Thread-safe published playback state shared between the queue scanner, the
//! pause/skip entry points and the HTTP layer.
//!
//! All fields (current track, active flag, paused flag, elapsed baseline) live
//! behind one `std::sync::Mutex` so a reader can never observe a mixed
//! combination such as `active = true` with a stale track. The lock is never
//! held across an await point, so snapshot queries never wait on the player.
//!
//! Every transition that changes the published state also broadcasts a
//! [`JukeboxEvent::CurrentTrackChanged`] while still holding the lock, which
//! keeps event order identical to state order.

use chrono::{DateTime, Utc};
use jukebox_common::{JukeboxEvent, Track};
use serde::Serialize;
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::Instant;

/// Event channel capacity (slow subscribers lag and skip, they never block)
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Coarse playback phase derived from the published state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackPhase {
    Idle,
    Preparing,
    Playing,
    Paused,
}

/// Snapshot of the published playback state
#[derive(Debug, Clone, Serialize)]
pub struct PlaybackState {
    pub track: Option<Track>,
    /// true once the player accepted the stream
    pub active: bool,
    pub paused: bool,
    pub started_at: Option<DateTime<Utc>>,
    /// Tracked play time, frozen while paused
    pub elapsed_ms: u64,
}

impl PlaybackState {
    pub fn phase(&self) -> PlaybackPhase {
        match (&self.track, self.active, self.paused) {
            (None, _, _) => PlaybackPhase::Idle,
            (Some(_), false, _) => PlaybackPhase::Preparing,
            (Some(_), true, false) => PlaybackPhase::Playing,
            (Some(_), true, true) => PlaybackPhase::Paused,
        }
    }

    pub fn is_idle(&self) -> bool {
        self.track.is_none()
    }
}

/// Identifies one preparing/playing cycle.
///
/// Issued when a track enters Preparing; any clear (skip, finish, crash)
/// invalidates it, so a stale scanner step cannot resurrect a skipped track.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaybackTicket(u64);

/// Progress of the current active track, as seen by the scanner
#[derive(Debug, Clone)]
pub struct ActiveProgress {
    pub ticket: PlaybackTicket,
    pub track: Track,
    pub elapsed: Duration,
    /// Player instance that accepted the stream
    pub player_instance: u64,
}

#[derive(Debug)]
struct Inner {
    current: Option<Track>,
    active: bool,
    paused: bool,
    started_at: Option<DateTime<Utc>>,
    /// Elapsed time accumulated before the last pause
    elapsed_before_pause: Duration,
    /// Start of the current unpaused stretch (None while paused or inactive)
    resumed_at: Option<Instant>,
    player_instance: u64,
    generation: u64,
}

impl Inner {
    fn elapsed(&self) -> Duration {
        self.elapsed_before_pause + self.resumed_at.map(|t| t.elapsed()).unwrap_or_default()
    }

    fn snapshot(&self) -> PlaybackState {
        PlaybackState {
            track: self.current.clone(),
            active: self.active,
            paused: self.paused,
            started_at: self.started_at,
            elapsed_ms: self.elapsed().as_millis() as u64,
        }
    }

    fn changed_event(&self) -> JukeboxEvent {
        JukeboxEvent::CurrentTrackChanged {
            track: self.current.clone(),
            active: self.active,
            paused: self.paused,
            timestamp: Utc::now(),
        }
    }
}

/// Shared state accessible by all components
pub struct SharedState {
    inner: Mutex<Inner>,

    /// Event broadcaster for the event log and SSE
    event_tx: broadcast::Sender<JukeboxEvent>,
}

impl SharedState {
    /// Create new shared state in the Idle phase
    pub fn new() -> Self {
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            inner: Mutex::new(Inner {
                current: None,
                active: false,
                paused: false,
                started_at: None,
                elapsed_before_pause: Duration::ZERO,
                resumed_at: None,
                player_instance: 0,
                generation: 0,
            }),
            event_tx,
        }
    }

    /// Broadcast an event to all listeners
    pub fn broadcast_event(&self, event: JukeboxEvent) {
        // No receivers is OK
        let _ = self.event_tx.send(event);
    }

    /// Subscribe to the event stream
    pub fn subscribe_events(&self) -> broadcast::Receiver<JukeboxEvent> {
        self.event_tx.subscribe()
    }

    /// Current published state
    pub fn snapshot(&self) -> PlaybackState {
        self.lock().snapshot()
    }

    /// Enter Preparing for a freshly dequeued track
    pub fn begin_preparing(&self, track: Track) -> PlaybackTicket {
        let mut inner = self.lock();
        inner.generation += 1;
        inner.current = Some(track);
        inner.active = false;
        inner.paused = false;
        inner.started_at = None;
        inner.elapsed_before_pause = Duration::ZERO;
        inner.resumed_at = None;
        self.broadcast_event(inner.changed_event());
        PlaybackTicket(inner.generation)
    }

    /// Promote a preparing track to Playing and start elapsed-time tracking.
    /// `player_instance` identifies the player process that took the stream.
    ///
    /// Returns false when the ticket is stale (the track was skipped or
    /// cleared while it was being prepared).
    pub fn begin_playing(&self, ticket: PlaybackTicket, player_instance: u64) -> bool {
        let mut inner = self.lock();
        if inner.generation != ticket.0 || inner.current.is_none() {
            return false;
        }

        let now = Utc::now();
        inner.active = true;
        inner.paused = false;
        inner.started_at = Some(now);
        inner.elapsed_before_pause = Duration::ZERO;
        inner.resumed_at = Some(Instant::now());
        inner.player_instance = player_instance;

        if let Some(track) = inner.current.clone() {
            self.broadcast_event(JukeboxEvent::TrackStarted {
                track,
                timestamp: now,
            });
        }
        self.broadcast_event(inner.changed_event());
        true
    }

    /// Progress of the active track (None while idle or preparing)
    pub fn active_progress(&self) -> Option<ActiveProgress> {
        let inner = self.lock();
        if !inner.active {
            return None;
        }
        inner.current.as_ref().map(|track| ActiveProgress {
            ticket: PlaybackTicket(inner.generation),
            track: track.clone(),
            elapsed: inner.elapsed(),
            player_instance: inner.player_instance,
        })
    }

    /// Whether `ticket` still identifies the current cycle
    pub fn is_current(&self, ticket: PlaybackTicket) -> bool {
        let inner = self.lock();
        inner.generation == ticket.0 && inner.current.is_some()
    }

    /// Clear to Idle if `ticket` is still current. Returns the cleared track.
    pub fn clear_if_current(&self, ticket: PlaybackTicket, interrupted: bool) -> Option<Track> {
        let mut inner = self.lock();
        if inner.generation != ticket.0 {
            return None;
        }
        self.clear_locked(&mut inner, interrupted)
    }

    /// Unconditionally clear to Idle (skip). Returns the cleared track.
    pub fn clear(&self, interrupted: bool) -> Option<Track> {
        let mut inner = self.lock();
        self.clear_locked(&mut inner, interrupted)
    }

    /// Flip the paused flag of the active track, freezing or resuming
    /// elapsed-time tracking. Returns the new paused value, or None when no
    /// track is active.
    pub fn toggle_paused(&self) -> Option<bool> {
        let mut inner = self.lock();
        if !inner.active {
            return None;
        }

        inner.paused = !inner.paused;
        if inner.paused {
            if let Some(resumed_at) = inner.resumed_at.take() {
                inner.elapsed_before_pause += resumed_at.elapsed();
            }
        } else {
            inner.resumed_at = Some(Instant::now());
        }

        self.broadcast_event(inner.changed_event());
        Some(inner.paused)
    }

    /// Whether a track is active (Playing or Paused)
    pub fn is_active(&self) -> bool {
        self.lock().active
    }

    fn clear_locked(&self, inner: &mut Inner, interrupted: bool) -> Option<Track> {
        let cleared = inner.current.take();
        let was_active = inner.active;

        inner.generation += 1;
        inner.active = false;
        inner.paused = false;
        inner.started_at = None;
        inner.elapsed_before_pause = Duration::ZERO;
        inner.resumed_at = None;
        inner.player_instance = 0;

        if let Some(track) = &cleared {
            if was_active {
                self.broadcast_event(JukeboxEvent::TrackFinished {
                    track: track.clone(),
                    interrupted,
                    timestamp: Utc::now(),
                });
            }
            self.broadcast_event(inner.changed_event());
        }
        cleared
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().expect("playback state lock poisoned")
    }
}

impl Default for SharedState {
    fn default() -> Self {
        Self::new()
    }
}
