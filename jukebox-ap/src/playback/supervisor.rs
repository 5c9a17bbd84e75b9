//! Player supervisor
//!
//! Owns the single external player process (VLC with its `rc` remote-control
//! interface) and its line-oriented command protocol on stdin.
//!
//! The process is spawned lazily by [`PlayerSupervisor::ensure_running`],
//! which also notices a process that has exited and replaces it. Commands are
//! fire-and-forget: the protocol offers no acknowledgement, so "accepted" means
//! only that the line reached the process's stdin.
//!
//! Process creation sits behind [`PlayerLauncher`] so the scanner can be
//! exercised without a real player.

use crate::config::PlayerSettings;
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::process::{Child, ChildStdin, Command};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// A running player process
#[async_trait]
pub trait PlayerProcess: Send {
    /// Write one command line to the process
    async fn send_line(&mut self, line: &str) -> std::io::Result<()>;

    /// Whether the process is still running
    fn is_alive(&mut self) -> bool;

    /// Stop the process and reap it
    async fn terminate(&mut self);
}

/// Creates player processes
#[async_trait]
pub trait PlayerLauncher: Send + Sync {
    async fn launch(&self) -> Result<Box<dyn PlayerProcess>>;
}

/// VLC process controlled through `--intf rc` on stdin
pub struct VlcProcess {
    child: Child,
    stdin: ChildStdin,
}

#[async_trait]
impl PlayerProcess for VlcProcess {
    async fn send_line(&mut self, line: &str) -> std::io::Result<()> {
        self.stdin.write_all(line.as_bytes()).await?;
        self.stdin.write_all(b"\n").await?;
        self.stdin.flush().await
    }

    fn is_alive(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(None))
    }

    async fn terminate(&mut self) {
        let _ = self.send_line("quit").await;
        if let Err(e) = self.child.kill().await {
            debug!("Player kill: {}", e);
        }
    }
}

/// Spawns VLC in headless remote-control mode
pub struct VlcLauncher {
    settings: PlayerSettings,
}

impl VlcLauncher {
    pub fn new(settings: PlayerSettings) -> Self {
        Self { settings }
    }

    fn locate_binary(&self) -> Option<PathBuf> {
        if let Some(binary) = &self.settings.binary {
            return Some(binary.clone());
        }
        locate_player_binary()
    }

    fn args(&self) -> Vec<String> {
        let mut args: Vec<String> = ["--intf", "rc", "--no-video", "--no-loop", "--no-repeat"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        if cfg!(unix) {
            args.push("--rc-fake-tty".to_string());
        }
        args.extend(self.settings.extra_args.iter().cloned());
        args
    }
}

#[async_trait]
impl PlayerLauncher for VlcLauncher {
    async fn launch(&self) -> Result<Box<dyn PlayerProcess>> {
        let binary = self.locate_binary().ok_or_else(|| {
            Error::PlayerUnavailable("no VLC executable found on PATH".to_string())
        })?;

        info!(binary = %binary.display(), "Spawning player process");

        let mut child = Command::new(&binary)
            .args(self.args())
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                Error::PlayerUnavailable(format!("failed to spawn {}: {}", binary.display(), e))
            })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| Error::PlayerUnavailable("player stdin not captured".to_string()))?;

        Ok(Box::new(VlcProcess { child, stdin }))
    }
}

/// Search the platform's usual places for a VLC executable
pub fn locate_player_binary() -> Option<PathBuf> {
    let names: &[&str] = if cfg!(windows) {
        &["vlc.exe"]
    } else if cfg!(target_os = "macos") {
        &["vlc"]
    } else {
        &["cvlc", "vlc"]
    };

    for name in names {
        if let Some(found) = find_on_path(name) {
            return Some(found);
        }
    }

    let fallbacks: &[&str] = if cfg!(windows) {
        &[
            r"C:\Program Files\VideoLAN\VLC\vlc.exe",
            r"C:\Program Files (x86)\VideoLAN\VLC\vlc.exe",
        ]
    } else if cfg!(target_os = "macos") {
        &["/Applications/VLC.app/Contents/MacOS/VLC"]
    } else {
        &[]
    };

    fallbacks.iter().map(PathBuf::from).find(|p| p.is_file())
}

fn find_on_path(name: &str) -> Option<PathBuf> {
    let path = std::env::var_os("PATH")?;
    std::env::split_paths(&path)
        .map(|dir| dir.join(name))
        .find(|candidate| is_executable(candidate))
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

/// Owner of the player process and its command protocol
pub struct PlayerSupervisor {
    launcher: Arc<dyn PlayerLauncher>,
    settings: PlayerSettings,
    process: Mutex<Option<Box<dyn PlayerProcess>>>,
    volume: AtomicU32,
    /// Bumped on every successful spawn
    instance: AtomicU64,
}

impl PlayerSupervisor {
    pub fn new(launcher: Arc<dyn PlayerLauncher>, settings: PlayerSettings) -> Self {
        let volume = settings.default_volume.min(settings.max_volume);
        Self {
            launcher,
            settings,
            process: Mutex::new(None),
            volume: AtomicU32::new(volume),
            instance: AtomicU64::new(0),
        }
    }

    /// Make sure a live player process exists, spawning (or respawning after
    /// an exit) as needed. Returns false if no process could be started.
    pub async fn ensure_running(&self) -> bool {
        let mut process = self.process.lock().await;

        if let Some(existing) = process.as_mut() {
            if existing.is_alive() {
                return true;
            }
            warn!("Player process exited unexpectedly; respawning");
            *process = None;
        }

        let mut spawned = match self.launcher.launch().await {
            Ok(spawned) => spawned,
            Err(e) => {
                warn!("Player start failed: {}", e);
                return false;
            }
        };

        tokio::time::sleep(self.settings.startup_delay()).await;

        let volume = self.volume.load(Ordering::SeqCst);
        let volume_command = format!("volume {}", volume);
        for line in ["loop off", "repeat off", volume_command.as_str()] {
            if let Err(e) = spawned.send_line(line).await {
                warn!("Player did not accept initial command '{}': {}", line, e);
                return false;
            }
        }

        let instance = self.instance.fetch_add(1, Ordering::SeqCst) + 1;
        info!("Player process running (instance {}, volume {})", instance, volume);
        *process = Some(spawned);
        true
    }

    /// Write one command line if (and only if) the process is alive
    pub async fn send_command(&self, command: &str) -> bool {
        let mut process = self.process.lock().await;
        write_command(&mut process, command).await
    }

    /// Send several commands in order to the same process, stopping at the
    /// first rejection. Returns the instance that accepted all of them.
    async fn send_commands(&self, commands: &[&str]) -> Option<u64> {
        let mut process = self.process.lock().await;
        for command in commands {
            if !write_command(&mut process, command).await {
                return None;
            }
        }
        Some(self.instance.load(Ordering::SeqCst))
    }

    /// Clamp and apply a volume level (256 = 100%). Returns the applied level,
    /// or None when the player could not be started or commanded.
    pub async fn set_volume(&self, level: u32) -> Option<u32> {
        let level = level.min(self.settings.max_volume);
        self.volume.store(level, Ordering::SeqCst);

        if !self.ensure_running().await {
            return None;
        }
        self.send_command(&format!("volume {}", level))
            .await
            .then_some(level)
    }

    pub async fn restore_default_volume(&self) -> Option<u32> {
        self.set_volume(self.settings.default_volume).await
    }

    /// Last requested volume level
    pub fn volume(&self) -> u32 {
        self.volume.load(Ordering::SeqCst)
    }

    pub fn max_volume(&self) -> u32 {
        self.settings.max_volume
    }

    /// Replace whatever the player holds with `url` and start it.
    ///
    /// Returns the instance number of the process that took the URL, which
    /// changes whenever the player is respawned.
    pub async fn play_url(&self, url: &str) -> Option<u64> {
        let add = format!("add {}", url);
        self.send_commands(&["clear", add.as_str()]).await
    }

    /// Instance number of the most recently spawned process (0 before the first)
    pub fn instance(&self) -> u64 {
        self.instance.load(Ordering::SeqCst)
    }

    /// Toggle pause (the protocol has no separate resume)
    pub async fn pause(&self) -> bool {
        self.send_command("pause").await
    }

    /// Halt audio and clear the player's playlist
    pub async fn stop(&self) -> bool {
        self.send_commands(&["stop", "clear"]).await.is_some()
    }

    /// Whether a live process exists (no respawn)
    pub async fn is_alive(&self) -> bool {
        let mut process = self.process.lock().await;
        process.as_mut().map(|p| p.is_alive()).unwrap_or(false)
    }

    /// Terminate the player process, if any
    pub async fn shutdown(&self) {
        if let Some(mut process) = self.process.lock().await.take() {
            info!("Stopping player process");
            process.terminate().await;
        }
    }
}

async fn write_command(process: &mut Option<Box<dyn PlayerProcess>>, command: &str) -> bool {
    let Some(p) = process.as_mut() else {
        warn!("Player not running; dropped command '{}'", command);
        return false;
    };
    if !p.is_alive() {
        warn!("Player not running; dropped command '{}'", command);
        return false;
    }

    match p.send_line(command).await {
        Ok(()) => {
            debug!("Player command: {}", command);
            true
        }
        Err(e) => {
            warn!("Player command '{}' failed: {}", command, e);
            false
        }
    }
}
