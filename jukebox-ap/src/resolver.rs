//! Track resolution
//!
//! Turns a free-text search prompt into a [`Track`] and a track into a
//! directly playable stream URL. The production implementation shells out to
//! `yt-dlp`; tests substitute their own [`TrackResolver`].
//!
//! Every call runs under a retry budget: each attempt has its own timeout and
//! the child process is killed when an attempt times out.

use crate::config::ResolverSettings;
use crate::error::{Error, Result};
use async_trait::async_trait;
use jukebox_common::Track;
use serde::Deserialize;
use std::future::Future;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, warn};

/// yt-dlp age limit applied in clean mode
const CLEAN_MODE_AGE_LIMIT: u32 = 13;

/// Source of track metadata and stream URLs
#[async_trait]
pub trait TrackResolver: Send + Sync {
    /// Find the best match for `prompt`. `restricted` enables content
    /// restriction (clean mode). `Ok(None)` means nothing matched.
    async fn search(&self, prompt: &str, restricted: bool) -> Result<Option<Track>>;

    /// Resolve a short-lived, directly playable media URL for `track`
    async fn stream_url(&self, track: &Track) -> Result<String>;
}

/// One entry of `yt-dlp --dump-json --flat-playlist` output
#[derive(Debug, Deserialize)]
struct SearchEntry {
    id: Option<String>,
    title: Option<String>,
    channel: Option<String>,
    uploader: Option<String>,
    duration: Option<f64>,
    url: Option<String>,
    webpage_url: Option<String>,
}

impl SearchEntry {
    fn into_track(self) -> Option<Track> {
        let locator = self
            .webpage_url
            .or(self.url)
            .or_else(|| {
                self.id
                    .map(|id| format!("https://www.youtube.com/watch?v={}", id))
            })?;

        let duration = self
            .duration
            .filter(|d| d.is_finite() && *d > 0.0)
            .map(|d| d.round() as u64)
            .unwrap_or(0);

        Some(Track::new(
            self.title.unwrap_or_else(|| "Unknown title".to_string()),
            self.channel
                .or(self.uploader)
                .unwrap_or_else(|| "Unknown artist".to_string()),
            duration,
            locator,
        ))
    }
}

/// Parse the first search result out of yt-dlp's JSON-lines output
fn parse_search_output(stdout: &str) -> Result<Option<Track>> {
    let Some(line) = stdout.lines().map(str::trim).find(|l| !l.is_empty()) else {
        return Ok(None);
    };
    let entry: SearchEntry = serde_json::from_str(line)?;
    Ok(entry.into_track())
}

/// Parse the stream URL out of `yt-dlp -g` output (first non-empty line)
fn parse_stream_output(stdout: &str) -> Option<String> {
    stdout
        .lines()
        .map(str::trim)
        .find(|l| l.starts_with("http"))
        .map(str::to_string)
}

/// Run `attempt` up to `attempts` times with a per-attempt timeout and
/// linear backoff, returning the first success or the last error.
pub(crate) async fn with_retry<T, F, Fut>(
    what: &str,
    attempts: u32,
    attempt_timeout: Duration,
    backoff: Duration,
    mut attempt: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let attempts = attempts.max(1);
    let mut last_error = Error::Resolve(format!("{}: no attempts made", what));

    for n in 1..=attempts {
        match tokio::time::timeout(attempt_timeout, attempt()).await {
            Ok(Ok(value)) => return Ok(value),
            Ok(Err(e)) => {
                warn!(attempt = n, attempts, "{} failed: {}", what, e);
                last_error = e;
            }
            Err(_) => {
                warn!(attempt = n, attempts, "{} timed out after {:?}", what, attempt_timeout);
                last_error = Error::Timeout(attempt_timeout);
            }
        }

        if n < attempts {
            tokio::time::sleep(backoff * n).await;
        }
    }

    Err(last_error)
}

/// yt-dlp backed resolver
pub struct YtDlpResolver {
    settings: ResolverSettings,
}

impl YtDlpResolver {
    pub fn new(settings: ResolverSettings) -> Self {
        Self { settings }
    }

    /// Run yt-dlp with `args` and return its stdout.
    /// The child is killed if the returned future is dropped (attempt timeout).
    async fn run(&self, args: &[String]) -> Result<String> {
        debug!(binary = %self.settings.binary.display(), ?args, "Running yt-dlp");

        let output = Command::new(&self.settings.binary)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| {
                Error::Resolve(format!(
                    "failed to run {}: {}",
                    self.settings.binary.display(),
                    e
                ))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::Resolve(format!(
                "yt-dlp exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    fn search_args(&self, prompt: &str, restricted: bool) -> Vec<String> {
        let mut args = vec![
            "--dump-json".to_string(),
            "--flat-playlist".to_string(),
            "--no-warnings".to_string(),
            "--quiet".to_string(),
        ];
        if restricted {
            args.push("--age-limit".to_string());
            args.push(CLEAN_MODE_AGE_LIMIT.to_string());
        }
        args.push(format!("ytsearch1:{}", prompt));
        args
    }

    fn stream_args(&self, locator: &str) -> Vec<String> {
        vec![
            "-f".to_string(),
            self.settings.audio_format.clone(),
            "-g".to_string(),
            "--no-playlist".to_string(),
            "--no-warnings".to_string(),
            "--quiet".to_string(),
            locator.to_string(),
        ]
    }
}

#[async_trait]
impl TrackResolver for YtDlpResolver {
    async fn search(&self, prompt: &str, restricted: bool) -> Result<Option<Track>> {
        let args = &self.search_args(prompt, restricted);
        let settings = &self.settings;

        with_retry(
            "Track search",
            settings.attempts,
            settings.attempt_timeout(),
            settings.backoff(),
            move || async move {
                let stdout = self.run(args).await?;
                parse_search_output(&stdout)
            },
        )
        .await
    }

    async fn stream_url(&self, track: &Track) -> Result<String> {
        let args = &self.stream_args(track.locator());
        let settings = &self.settings;

        with_retry(
            "Stream URL resolution",
            settings.attempts,
            settings.attempt_timeout(),
            settings.backoff(),
            move || async move {
                let stdout = self.run(args).await?;
                parse_stream_output(&stdout).ok_or_else(|| {
                    Error::Resolve(format!("no stream URL for {}", track.locator()))
                })
            },
        )
        .await
    }
}
