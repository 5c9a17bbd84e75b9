//! # Jukebox Common Library
//!
//! Shared code for the jukebox workspace including:
//! - Track data model and identity key
//! - Event types (JukeboxEvent enum)
//! - Configuration file resolution and loading
//! - Time utilities

pub mod config;
pub mod error;
pub mod events;
pub mod time;
pub mod track;

pub use error::{Error, Result};
pub use events::JukeboxEvent;
pub use track::{Track, TrackId};
