//! Test helpers for jukebox-ap integration tests
//!
//! Provides scriptable stand-ins for the external collaborators:
//! - FakeResolver: canned search results, per-track failures and delays
//! - FakeLauncher: records player commands, injects spawn failures and crashes
//! - fast_config: millisecond-scale timings so scenarios finish quickly

#![allow(dead_code)]

use async_trait::async_trait;
use jukebox_ap::config::Config;
use jukebox_ap::playback::{PlayerLauncher, PlayerProcess};
use jukebox_ap::resolver::TrackResolver;
use jukebox_ap::{Error, Jukebox, Result};
use jukebox_common::Track;
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Config with short intervals, no safety buffer and no startup delay
pub fn fast_config() -> Config {
    let mut config = Config::default();
    config.playback.prefetch_interval_ms = 10;
    config.playback.prefetch_batch_timeout_ms = 500;
    config.playback.poll_interval_ms = 10;
    config.playback.idle_wait_ms = 20;
    config.playback.safety_buffer_secs = 0;
    config.playback.fallback_duration_secs = 1;
    config.playback.spawn_backoff_ms = 10;
    config.player.startup_delay_ms = 0;
    config
}

/// Track whose locator doubles as its identity
pub fn track(name: &str, duration: u64) -> Track {
    Track::new(name, format!("{} Artist", name), duration, format!("url-{}", name))
}

/// Stream URL the fake resolver hands out for `track`
pub fn stream_url_for(track: &Track) -> String {
    format!("http://stream.test/{}", track.locator())
}

/// Jukebox wired to fresh fakes
pub fn test_jukebox(config: &Config) -> (Arc<Jukebox>, Arc<FakeResolver>, Arc<FakeLauncher>) {
    let resolver = Arc::new(FakeResolver::new());
    let launcher = Arc::new(FakeLauncher::new());
    let jukebox = Arc::new(Jukebox::new(
        config,
        Arc::clone(&resolver) as Arc<dyn TrackResolver>,
        Arc::clone(&launcher) as Arc<dyn PlayerLauncher>,
    ));
    (jukebox, resolver, launcher)
}

/// Poll `check` until it returns true or `timeout` elapses
pub async fn wait_until<F, Fut>(timeout: Duration, mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if check().await {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

// ============================================================================
// FakeResolver
// ============================================================================

/// Scriptable track resolver
pub struct FakeResolver {
    catalog: Mutex<HashMap<String, Track>>,
    failing: Mutex<HashSet<String>>,
    delay: Mutex<Duration>,
    stream_calls: Mutex<HashMap<String, usize>>,
    searches: Mutex<Vec<(String, bool)>>,
    running: AtomicUsize,
    max_running: AtomicUsize,
}

impl FakeResolver {
    pub fn new() -> Self {
        Self {
            catalog: Mutex::new(HashMap::new()),
            failing: Mutex::new(HashSet::new()),
            delay: Mutex::new(Duration::ZERO),
            stream_calls: Mutex::new(HashMap::new()),
            searches: Mutex::new(Vec::new()),
            running: AtomicUsize::new(0),
            max_running: AtomicUsize::new(0),
        }
    }

    /// Make `prompt` resolve to `track`
    pub fn add_result(&self, prompt: &str, track: Track) {
        self.catalog.lock().unwrap().insert(prompt.to_string(), track);
    }

    /// Make stream URL resolution fail for `track`
    pub fn fail_stream(&self, track: &Track) {
        self.failing
            .lock()
            .unwrap()
            .insert(track.locator().to_string());
    }

    /// Delay every stream URL resolution
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = delay;
    }

    pub fn stream_calls(&self, track: &Track) -> usize {
        self.stream_calls
            .lock()
            .unwrap()
            .get(track.locator())
            .copied()
            .unwrap_or(0)
    }

    /// (prompt, restricted) for every search made
    pub fn searches(&self) -> Vec<(String, bool)> {
        self.searches.lock().unwrap().clone()
    }

    /// Highest number of concurrent stream URL resolutions observed
    pub fn max_concurrent(&self) -> usize {
        self.max_running.load(Ordering::SeqCst)
    }
}

/// Decrements the running counter even if the resolution is cancelled
struct RunningGuard<'a>(&'a AtomicUsize);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl TrackResolver for FakeResolver {
    async fn search(&self, prompt: &str, restricted: bool) -> Result<Option<Track>> {
        self.searches
            .lock()
            .unwrap()
            .push((prompt.to_string(), restricted));
        Ok(self.catalog.lock().unwrap().get(prompt).cloned())
    }

    async fn stream_url(&self, track: &Track) -> Result<String> {
        *self
            .stream_calls
            .lock()
            .unwrap()
            .entry(track.locator().to_string())
            .or_insert(0) += 1;

        let now_running = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        let _running = RunningGuard(&self.running);
        self.max_running.fetch_max(now_running, Ordering::SeqCst);

        let delay = *self.delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        if self.failing.lock().unwrap().contains(track.locator()) {
            return Err(Error::Resolve(format!("no stream for {}", track.locator())));
        }
        Ok(stream_url_for(track))
    }
}

// ============================================================================
// FakeLauncher
// ============================================================================

/// Player launcher that records commands instead of running VLC
pub struct FakeLauncher {
    commands: Arc<Mutex<Vec<String>>>,
    spawn_failures: AtomicU32,
    launches: AtomicU32,
    reject_commands: Arc<AtomicBool>,
    current: Mutex<Option<Arc<AtomicBool>>>,
}

impl FakeLauncher {
    pub fn new() -> Self {
        Self {
            commands: Arc::new(Mutex::new(Vec::new())),
            spawn_failures: AtomicU32::new(0),
            launches: AtomicU32::new(0),
            reject_commands: Arc::new(AtomicBool::new(false)),
            current: Mutex::new(None),
        }
    }

    /// Make the next `n` launches fail
    pub fn fail_next_spawns(&self, n: u32) {
        self.spawn_failures.store(n, Ordering::SeqCst);
    }

    /// Make every command write fail
    pub fn reject_commands(&self, reject: bool) {
        self.reject_commands.store(reject, Ordering::SeqCst);
    }

    /// Simulate the current player process exiting
    pub fn crash(&self) {
        if let Some(alive) = self.current.lock().unwrap().as_ref() {
            alive.store(false, Ordering::SeqCst);
        }
    }

    /// Launch attempts, including failed ones
    pub fn launches(&self) -> u32 {
        self.launches.load(Ordering::SeqCst)
    }

    pub fn commands(&self) -> Vec<String> {
        self.commands.lock().unwrap().clone()
    }

    pub fn count_commands(&self, prefix: &str) -> usize {
        self.commands()
            .iter()
            .filter(|c| c.starts_with(prefix))
            .count()
    }

    pub fn clear_commands(&self) {
        self.commands.lock().unwrap().clear();
    }
}

#[async_trait]
impl PlayerLauncher for FakeLauncher {
    async fn launch(&self) -> Result<Box<dyn PlayerProcess>> {
        self.launches.fetch_add(1, Ordering::SeqCst);

        let remaining = self.spawn_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.spawn_failures.store(remaining - 1, Ordering::SeqCst);
            return Err(Error::PlayerUnavailable("injected spawn failure".to_string()));
        }

        let alive = Arc::new(AtomicBool::new(true));
        *self.current.lock().unwrap() = Some(Arc::clone(&alive));

        Ok(Box::new(FakeProcess {
            commands: Arc::clone(&self.commands),
            alive,
            reject: Arc::clone(&self.reject_commands),
        }))
    }
}

struct FakeProcess {
    commands: Arc<Mutex<Vec<String>>>,
    alive: Arc<AtomicBool>,
    reject: Arc<AtomicBool>,
}

#[async_trait]
impl PlayerProcess for FakeProcess {
    async fn send_line(&mut self, line: &str) -> std::io::Result<()> {
        if self.reject.load(Ordering::SeqCst) {
            return Err(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "injected write failure",
            ));
        }
        self.commands.lock().unwrap().push(line.to_string());
        Ok(())
    }

    fn is_alive(&mut self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    async fn terminate(&mut self) {
        self.alive.store(false, Ordering::SeqCst);
    }
}
