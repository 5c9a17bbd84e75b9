//! Configuration for jukebox-ap
//!
//! Bootstrap configuration is read once at startup from a TOML file (see
//! `jukebox_common::config` for file resolution). Every field has a built-in
//! default, so an absent file or a partial file is valid. Command-line
//! arguments override file values in `main.rs`.

use jukebox_common::config::{default_data_dir, LoggingConfig};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Top-level TOML configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// HTTP server port
    pub port: u16,

    /// HTTP bind address
    pub bind_address: String,

    /// Directory for the append-only event logs
    pub log_dir: PathBuf,

    /// Start with content restriction enabled
    pub clean_mode: bool,

    pub logging: LoggingConfig,
    pub playback: PlaybackSettings,
    pub player: PlayerSettings,
    pub resolver: ResolverSettings,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8000,
            bind_address: "0.0.0.0".to_string(),
            log_dir: default_data_dir().join("logs"),
            clean_mode: false,
            logging: LoggingConfig::default(),
            playback: PlaybackSettings::default(),
            player: PlayerSettings::default(),
            resolver: ResolverSettings::default(),
        }
    }
}

/// Queue scanner, cache and prefetcher tuning
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PlaybackSettings {
    /// Stream URL cache capacity; also how far ahead the prefetcher looks
    pub cache_capacity: usize,
    pub prefetch_interval_ms: u64,
    /// Maximum parallel prefetch resolutions
    pub prefetch_workers: usize,
    /// Upper bound on waiting for one prefetch batch
    pub prefetch_batch_timeout_ms: u64,
    /// Elapsed-time poll interval while a track is playing
    pub poll_interval_ms: u64,
    /// How long the scanner waits on an empty queue before re-checking
    pub idle_wait_ms: u64,
    /// Added to the track duration before a track counts as finished
    pub safety_buffer_secs: u64,
    /// Used in place of a missing (zero) track duration
    pub fallback_duration_secs: u64,
    /// Delay before retrying after the player failed to start
    pub spawn_backoff_ms: u64,
}

impl Default for PlaybackSettings {
    fn default() -> Self {
        Self {
            cache_capacity: 5,
            prefetch_interval_ms: 1000,
            prefetch_workers: 3,
            prefetch_batch_timeout_ms: 30_000,
            poll_interval_ms: 500,
            idle_wait_ms: 1000,
            safety_buffer_secs: 3,
            fallback_duration_secs: 10,
            spawn_backoff_ms: 5000,
        }
    }
}

impl PlaybackSettings {
    pub fn prefetch_interval(&self) -> Duration {
        Duration::from_millis(self.prefetch_interval_ms)
    }

    pub fn prefetch_batch_timeout(&self) -> Duration {
        Duration::from_millis(self.prefetch_batch_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn idle_wait(&self) -> Duration {
        Duration::from_millis(self.idle_wait_ms)
    }

    pub fn spawn_backoff(&self) -> Duration {
        Duration::from_millis(self.spawn_backoff_ms)
    }

    /// Time after which a track of `duration_secs` counts as finished
    pub fn play_window(&self, duration_secs: u64) -> Duration {
        let duration = if duration_secs == 0 {
            self.fallback_duration_secs
        } else {
            duration_secs
        };
        Duration::from_secs(duration.saturating_add(self.safety_buffer_secs))
    }
}

/// External player process settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PlayerSettings {
    /// Explicit player executable; searched on PATH when unset
    pub binary: Option<PathBuf>,
    /// Extra command-line arguments appended after the built-in ones
    pub extra_args: Vec<String>,
    /// Wait after spawn before the first command is sent
    pub startup_delay_ms: u64,
    /// Volume applied on spawn and at the start of every track
    pub default_volume: u32,
    /// Upper clamp for volume commands
    pub max_volume: u32,
}

impl Default for PlayerSettings {
    fn default() -> Self {
        Self {
            binary: None,
            extra_args: Vec::new(),
            startup_delay_ms: 1000,
            default_volume: 256,
            max_volume: 512,
        }
    }
}

impl PlayerSettings {
    pub fn startup_delay(&self) -> Duration {
        Duration::from_millis(self.startup_delay_ms)
    }
}

/// Track resolver (yt-dlp) settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ResolverSettings {
    pub binary: PathBuf,
    /// Attempts per resolution before giving up
    pub attempts: u32,
    pub attempt_timeout_secs: u64,
    /// Base delay between attempts (multiplied by the attempt number)
    pub backoff_ms: u64,
    /// yt-dlp format selector for stream URLs
    pub audio_format: String,
}

impl Default for ResolverSettings {
    fn default() -> Self {
        Self {
            binary: PathBuf::from("yt-dlp"),
            attempts: 3,
            attempt_timeout_secs: 20,
            backoff_ms: 750,
            audio_format: "bestaudio[ext=m4a]/bestaudio/best".to_string(),
        }
    }
}

impl ResolverSettings {
    pub fn attempt_timeout(&self) -> Duration {
        Duration::from_secs(self.attempt_timeout_secs)
    }

    pub fn backoff(&self) -> Duration {
        Duration::from_millis(self.backoff_ms)
    }
}
