//! HTTP request handlers
//!
//! Paths and JSON field names match the existing jukebox web client.

use crate::api::server::AppContext;
use crate::error::Result;
use axum::{extract::State, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    status: String,
    module: String,
    version: String,
}

#[derive(Debug, Deserialize)]
pub struct SongRequest {
    prompt: String,
}

#[derive(Debug, Serialize)]
pub struct SongResponse {
    status: String,
    song: String,
    author: String,
}

#[derive(Debug, Deserialize)]
pub struct ToggleCleanModeRequest {
    /// Desired clean mode (field name kept for client compatibility)
    prompt: bool,
}

#[derive(Debug, Serialize)]
pub struct ToggleCleanModeResponse {
    status: String,
    clean_mode: bool,
}

#[derive(Debug, Serialize)]
pub struct QueueSong {
    name: String,
    author: String,
    duration: u64,
    url: String,
    search_prompt: String,
    /// Always false: only pending entries are listed
    active: bool,
}

#[derive(Debug, Serialize)]
pub struct CurrentlyPlayingResponse {
    name: Option<String>,
    author: Option<String>,
    duration: Option<u64>,
    url: Option<String>,
    played_at: Option<DateTime<Utc>>,
    active: bool,
    paused: bool,
}

#[derive(Debug, Serialize)]
pub struct PauseResponse {
    status: String,
    paused: bool,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    status: String,
}

#[derive(Debug, Deserialize)]
pub struct VolumeRequest {
    /// Player volume units (256 = 100%)
    volume: u32,
}

#[derive(Debug, Serialize)]
pub struct VolumeResponse {
    volume: u32,
    max_volume: u32,
}

// ============================================================================
// Health Endpoint
// ============================================================================

/// GET /health - Health check endpoint
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        module: "jukebox-ap".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============================================================================
// Request & Queue Endpoints
// ============================================================================

/// POST /request_song - Search for a song and queue it
pub async fn request_song(
    State(ctx): State<AppContext>,
    Json(req): Json<SongRequest>,
) -> Result<Json<SongResponse>> {
    let entry = ctx.jukebox.request(&req.prompt).await?;

    Ok(Json(SongResponse {
        status: "added".to_string(),
        song: entry.track.name().to_string(),
        author: entry.track.author().to_string(),
    }))
}

/// POST /toggle_clean_mode - Set content restriction for future searches
pub async fn toggle_clean_mode(
    State(ctx): State<AppContext>,
    Json(req): Json<ToggleCleanModeRequest>,
) -> Json<ToggleCleanModeResponse> {
    ctx.jukebox.set_clean_mode(req.prompt);

    Json(ToggleCleanModeResponse {
        status: "Toggled".to_string(),
        clean_mode: req.prompt,
    })
}

/// GET /queue - Pending tracks in play order
pub async fn get_queue(State(ctx): State<AppContext>) -> Json<Vec<QueueSong>> {
    let songs = ctx
        .jukebox
        .queue_snapshot()
        .into_iter()
        .map(|entry| QueueSong {
            name: entry.track.name().to_string(),
            author: entry.track.author().to_string(),
            duration: entry.track.duration_secs(),
            url: entry.track.locator().to_string(),
            search_prompt: entry.prompt,
            active: false,
        })
        .collect();

    Json(songs)
}

// ============================================================================
// Playback Control Endpoints
// ============================================================================

/// GET /currentlyPlayingSong - Published playback state
pub async fn currently_playing(State(ctx): State<AppContext>) -> Json<CurrentlyPlayingResponse> {
    let state = ctx.jukebox.current_playback_state();

    let response = match &state.track {
        Some(track) => CurrentlyPlayingResponse {
            name: Some(track.name().to_string()),
            author: Some(track.author().to_string()),
            duration: Some(track.duration_secs()),
            url: Some(track.locator().to_string()),
            played_at: state.started_at,
            active: state.active,
            paused: state.paused,
        },
        None => CurrentlyPlayingResponse {
            name: None,
            author: None,
            duration: None,
            url: None,
            played_at: None,
            active: false,
            paused: state.paused,
        },
    };

    Json(response)
}

/// POST /pauseToggle - Toggle pause/resume
pub async fn pause_toggle(State(ctx): State<AppContext>) -> Result<Json<PauseResponse>> {
    let paused = ctx.jukebox.pause().await?;

    Ok(Json(PauseResponse {
        status: "toggled pause/play".to_string(),
        paused,
    }))
}

/// POST /skip - Stop the current track; the scanner moves on to the next one
pub async fn skip(State(ctx): State<AppContext>) -> Result<Json<StatusResponse>> {
    ctx.jukebox.skip().await?;
    info!("Skip requested via API");

    Ok(Json(StatusResponse {
        status: "skipped current song".to_string(),
    }))
}

/// GET /volume - Current volume level
pub async fn get_volume(State(ctx): State<AppContext>) -> Json<VolumeResponse> {
    Json(VolumeResponse {
        volume: ctx.jukebox.volume(),
        max_volume: ctx.jukebox.max_volume(),
    })
}

/// POST /volume - Set volume (clamped to the maximum)
pub async fn set_volume(
    State(ctx): State<AppContext>,
    Json(req): Json<VolumeRequest>,
) -> Result<Json<VolumeResponse>> {
    let volume = ctx.jukebox.set_volume(req.volume).await?;

    Ok(Json(VolumeResponse {
        volume,
        max_volume: ctx.jukebox.max_volume(),
    }))
}
