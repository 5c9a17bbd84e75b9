//! Event types for the jukebox event system
//!
//! Events are fire-and-forget notifications emitted by the playback core.
//! They feed the append-only event log and the SSE stream; nothing in the core
//! reads them back to make decisions.

use crate::track::Track;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Jukebox event types
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum JukeboxEvent {
    /// Track appended to the playback queue
    TrackQueued {
        entry_id: Uuid,
        track: Track,
        /// Search prompt the track was resolved from
        prompt: String,
        timestamp: DateTime<Utc>,
    },

    /// Published playback state changed (preparing, playing, paused or idle)
    CurrentTrackChanged {
        track: Option<Track>,
        active: bool,
        paused: bool,
        timestamp: DateTime<Utc>,
    },

    /// Player accepted the stream and elapsed-time tracking started
    TrackStarted {
        track: Track,
        timestamp: DateTime<Utc>,
    },

    /// Track left the player
    TrackFinished {
        track: Track,
        /// true when ended by skip or player exit rather than elapsed time
        interrupted: bool,
        timestamp: DateTime<Utc>,
    },

    /// Track was dequeued but could not be played and will not be retried
    TrackDropped {
        track: Track,
        reason: String,
        timestamp: DateTime<Utc>,
    },

    /// Content restriction mode toggled
    CleanModeChanged {
        clean_mode: bool,
        timestamp: DateTime<Utc>,
    },

    /// Player volume changed
    VolumeChanged {
        volume: u32,
        timestamp: DateTime<Utc>,
    },
}

impl JukeboxEvent {
    /// Event name used for the SSE `event:` field
    pub fn event_type(&self) -> &'static str {
        match self {
            JukeboxEvent::TrackQueued { .. } => "TrackQueued",
            JukeboxEvent::CurrentTrackChanged { .. } => "CurrentTrackChanged",
            JukeboxEvent::TrackStarted { .. } => "TrackStarted",
            JukeboxEvent::TrackFinished { .. } => "TrackFinished",
            JukeboxEvent::TrackDropped { .. } => "TrackDropped",
            JukeboxEvent::CleanModeChanged { .. } => "CleanModeChanged",
            JukeboxEvent::VolumeChanged { .. } => "VolumeChanged",
        }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            JukeboxEvent::TrackQueued { timestamp, .. }
            | JukeboxEvent::CurrentTrackChanged { timestamp, .. }
            | JukeboxEvent::TrackStarted { timestamp, .. }
            | JukeboxEvent::TrackFinished { timestamp, .. }
            | JukeboxEvent::TrackDropped { timestamp, .. }
            | JukeboxEvent::CleanModeChanged { timestamp, .. }
            | JukeboxEvent::VolumeChanged { timestamp, .. } => *timestamp,
        }
    }
}
