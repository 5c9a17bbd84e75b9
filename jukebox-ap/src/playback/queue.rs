//! Playback queue
//!
//! In-memory FIFO of tracks waiting to be played. Many producers (request
//! handlers) append; exactly one consumer (the queue scanner) removes from the
//! head. The prefetcher only peeks.
//!
//! The entry list sits behind a `std::sync::Mutex` that is held only for the
//! duration of a `VecDeque` operation, so peeking never waits on anything but
//! another peek or push. Waiting for work uses a `tokio::sync::Notify`.

use chrono::{DateTime, Utc};
use jukebox_common::Track;
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::Notify;
use uuid::Uuid;

/// One pending queue entry
#[derive(Debug, Clone, Serialize)]
pub struct QueueEntry {
    /// Queue entry UUID
    pub entry_id: Uuid,

    pub track: Track,

    /// Search prompt the track was resolved from
    pub prompt: String,

    pub queued_at: DateTime<Utc>,
}

impl QueueEntry {
    pub fn new(track: Track, prompt: impl Into<String>) -> Self {
        Self {
            entry_id: Uuid::new_v4(),
            track,
            prompt: prompt.into(),
            queued_at: Utc::now(),
        }
    }
}

/// Thread-safe FIFO of pending tracks
pub struct PlaybackQueue {
    entries: Mutex<VecDeque<QueueEntry>>,
    available: Notify,
}

impl PlaybackQueue {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(VecDeque::new()),
            available: Notify::new(),
        }
    }

    /// Append an entry; never blocks beyond the list lock and wakes the consumer
    pub fn enqueue(&self, entry: QueueEntry) {
        self.lock().push_back(entry);
        self.available.notify_one();
    }

    /// Reinsert an entry at the head (player start failure only)
    pub fn requeue_front(&self, entry: QueueEntry) {
        self.lock().push_front(entry);
        self.available.notify_one();
    }

    /// Remove the head entry, waiting until one is available
    pub async fn dequeue(&self) -> QueueEntry {
        loop {
            if let Some(entry) = self.try_dequeue() {
                return entry;
            }
            // notify_one stores a permit when nobody is waiting, so an
            // enqueue between the check above and this await is not lost.
            self.available.notified().await;
        }
    }

    /// Like [`dequeue`](Self::dequeue) but gives up after `wait`
    pub async fn dequeue_timeout(&self, wait: Duration) -> Option<QueueEntry> {
        tokio::time::timeout(wait, self.dequeue()).await.ok()
    }

    /// Remove the head entry if there is one
    pub fn try_dequeue(&self) -> Option<QueueEntry> {
        self.lock().pop_front()
    }

    /// Up to `n` tracks from the head, without removing them
    pub fn peek_front(&self, n: usize) -> Vec<Track> {
        self.lock()
            .iter()
            .take(n)
            .map(|entry| entry.track.clone())
            .collect()
    }

    /// All pending entries in play order
    pub fn snapshot(&self) -> Vec<QueueEntry> {
        self.lock().iter().cloned().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<QueueEntry>> {
        self.entries.lock().expect("playback queue lock poisoned")
    }
}

impl Default for PlaybackQueue {
    fn default() -> Self {
        Self::new()
    }
}
