//! Playback core: queue, stream URL cache, prefetcher, player supervisor and
//! the queue scanner that ties them together

pub mod cache;
pub mod prefetch;
pub mod queue;
pub mod scanner;
pub mod supervisor;

pub use cache::StreamUrlCache;
pub use prefetch::Prefetcher;
pub use queue::{PlaybackQueue, QueueEntry};
pub use scanner::{QueueScanner, ScanOutcome};
pub use supervisor::{PlayerLauncher, PlayerProcess, PlayerSupervisor, VlcLauncher};
