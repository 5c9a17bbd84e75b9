//! Track data model
//!
//! A [`Track`] is the unit of playback: display metadata plus an opaque source
//! locator. Two tracks with the same locator are the same track for caching and
//! de-duplication purposes, regardless of display name; [`TrackId`] is the key
//! type used for every identity-based lookup.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};

/// Identity key of a track (its source locator)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrackId(String);

impl TrackId {
    pub fn new(locator: impl Into<String>) -> Self {
        Self(locator.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TrackId {
    fn from(locator: &str) -> Self {
        Self::new(locator)
    }
}

/// Immutable track descriptor returned by the resolver
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Track {
    name: String,
    author: String,
    /// Reported duration in whole seconds (0 when unknown)
    duration: u64,
    /// Source locator, serialized as `url` for API compatibility
    #[serde(rename = "url")]
    locator: String,
}

impl Track {
    pub fn new(
        name: impl Into<String>,
        author: impl Into<String>,
        duration: u64,
        locator: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            author: author.into(),
            duration,
            locator: locator.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn author(&self) -> &str {
        &self.author
    }

    /// Reported duration in seconds
    pub fn duration_secs(&self) -> u64 {
        self.duration
    }

    pub fn locator(&self) -> &str {
        &self.locator
    }

    /// Identity key (locator only)
    pub fn id(&self) -> TrackId {
        TrackId::new(self.locator.clone())
    }
}

impl PartialEq for Track {
    fn eq(&self, other: &Self) -> bool {
        self.locator == other.locator
    }
}

impl Eq for Track {}

impl Hash for Track {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.locator.hash(state);
    }
}

impl fmt::Display for Track {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} by {}", self.name, self.author)
    }
}
