//! Event log sink
//!
//! Subscribes to the jukebox event stream and persists a human-readable trail
//! in the log directory:
//!
//! - `queued_tracks.jsonl` - one line per queued track, with its search prompt
//! - `played_tracks.jsonl` - one line per track that actually started
//! - `currently_playing.json` - rewritten on every current-track change
//! - `clean_mode.json` - rewritten whenever clean mode is toggled
//!
//! Runs as its own task on a broadcast receiver, so slow disk I/O can only make
//! this writer lag; it never holds up the playback core. Write failures are
//! logged and skipped.

use crate::error::Result;
use chrono::{DateTime, Utc};
use jukebox_common::{JukeboxEvent, Track};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

pub const QUEUED_TRACKS_FILE: &str = "queued_tracks.jsonl";
pub const PLAYED_TRACKS_FILE: &str = "played_tracks.jsonl";
pub const CURRENTLY_PLAYING_FILE: &str = "currently_playing.json";
pub const CLEAN_MODE_FILE: &str = "clean_mode.json";

#[derive(Serialize)]
struct QueuedRecord<'a> {
    name: &'a str,
    author: &'a str,
    duration: u64,
    url: &'a str,
    search_prompt: &'a str,
    timestamp: DateTime<Utc>,
}

#[derive(Serialize)]
struct PlayedRecord<'a> {
    name: &'a str,
    author: &'a str,
    duration: u64,
    url: &'a str,
    timestamp: DateTime<Utc>,
}

#[derive(Serialize)]
struct CurrentRecord<'a> {
    name: &'a str,
    author: &'a str,
    duration: u64,
    url: &'a str,
    played_at: DateTime<Utc>,
    active: bool,
    paused: bool,
}

/// Writer for the on-disk event trail
pub struct EventLog {
    dir: PathBuf,
}

impl EventLog {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Spawn the writer task; it ends when the event channel closes
    pub fn spawn(self, mut rx: broadcast::Receiver<JukeboxEvent>) -> JoinHandle<()> {
        info!("Event log writing to {}", self.dir.display());

        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) => {
                        if let Err(e) = self.record(&event).await {
                            warn!("Event log write failed for {}: {}", event.event_type(), e);
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!("Event log lagged; {} events not recorded", skipped);
                    }
                    Err(RecvError::Closed) => {
                        debug!("Event channel closed; event log stopping");
                        break;
                    }
                }
            }
        })
    }

    /// Persist one event (events without a file mapping are ignored)
    pub async fn record(&self, event: &JukeboxEvent) -> Result<()> {
        match event {
            JukeboxEvent::TrackQueued {
                track,
                prompt,
                timestamp,
                ..
            } => {
                let record = QueuedRecord {
                    name: track.name(),
                    author: track.author(),
                    duration: track.duration_secs(),
                    url: track.locator(),
                    search_prompt: prompt,
                    timestamp: *timestamp,
                };
                self.append_line(QUEUED_TRACKS_FILE, &serde_json::to_string(&record)?)
                    .await
            }
            JukeboxEvent::TrackStarted { track, timestamp } => {
                let record = PlayedRecord {
                    name: track.name(),
                    author: track.author(),
                    duration: track.duration_secs(),
                    url: track.locator(),
                    timestamp: *timestamp,
                };
                self.append_line(PLAYED_TRACKS_FILE, &serde_json::to_string(&record)?)
                    .await
            }
            JukeboxEvent::CurrentTrackChanged {
                track,
                active,
                paused,
                timestamp,
            } => {
                let json = match track {
                    Some(track) => serde_json::to_string_pretty(&current_record(
                        track, *active, *paused, *timestamp,
                    ))?,
                    None => "null".to_string(),
                };
                self.replace_file(CURRENTLY_PLAYING_FILE, &json).await
            }
            JukeboxEvent::CleanModeChanged { clean_mode, .. } => {
                let json = serde_json::json!({ "clean_mode": clean_mode }).to_string();
                self.replace_file(CLEAN_MODE_FILE, &json).await
            }
            _ => Ok(()),
        }
    }

    async fn append_line(&self, file: &str, line: &str) -> Result<()> {
        fs::create_dir_all(&self.dir).await?;
        let mut handle = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.dir.join(file))
            .await?;
        handle.write_all(format!("{}\n", line).as_bytes()).await?;
        handle.flush().await?;
        Ok(())
    }

    /// Write via a temporary file and rename so readers never see a torn file
    async fn replace_file(&self, file: &str, contents: &str) -> Result<()> {
        fs::create_dir_all(&self.dir).await?;
        let target = self.dir.join(file);
        let tmp = self.dir.join(format!(".{}.tmp", file));
        fs::write(&tmp, contents).await?;
        fs::rename(&tmp, &target).await?;
        Ok(())
    }
}

fn current_record(
    track: &Track,
    active: bool,
    paused: bool,
    played_at: DateTime<Utc>,
) -> CurrentRecord<'_> {
    CurrentRecord {
        name: track.name(),
        author: track.author(),
        duration: track.duration_secs(),
        url: track.locator(),
        played_at,
        active,
        paused,
    }
}
