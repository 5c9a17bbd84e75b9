//! # Jukebox Audio Player Library (jukebox-ap)
//!
//! Queue and playback coordinator for a single-player streaming jukebox.
//!
//! **Purpose:** Accept song requests, keep them in a FIFO queue, resolve
//! playable stream URLs (prefetching ahead of need), drive an external player
//! process over its text command protocol, and publish what is playing.
//!
//! **Architecture:** One coordinator ([`Jukebox`]) owning the queue, stream URL
//! cache and player supervisor, with two background loops (queue scanner and
//! prefetcher) and an HTTP/SSE control surface.

pub mod api;
pub mod config;
pub mod error;
pub mod event_log;
pub mod jukebox;
pub mod playback;
pub mod resolver;
pub mod state;

pub use config::Config;
pub use error::{Error, Result};
pub use jukebox::Jukebox;
pub use state::{PlaybackPhase, PlaybackState, SharedState};
