//! HTTP control API
//!
//! Song requests, queue and now-playing queries, pause/skip/volume control and
//! an SSE event stream.

pub mod handlers;
pub mod server;
pub mod sse;

pub use server::{build_router, run, AppContext};
