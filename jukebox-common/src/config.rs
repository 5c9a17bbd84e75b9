//! Configuration file resolution and loading
//!
//! Config file lookup follows this priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. User config directory (`<config_dir>/jukebox/config.toml`)
//! 4. System config file (`/etc/jukebox/config.toml`, Linux only)
//!
//! When no file is found the caller falls back to compiled defaults. A missing
//! file is never fatal; a malformed one is.

use crate::{Error, Result};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Application directory name under the platform config/data directories
pub const APP_DIR_NAME: &str = "jukebox";

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default tracing filter directive (overridden by RUST_LOG)
    pub level: String,

    /// Log file path (optional, logs to stderr if not specified)
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}

/// Locates the TOML config file for a module
#[derive(Debug, Clone)]
pub struct ConfigFileResolver {
    env_var_name: String,
}

impl ConfigFileResolver {
    /// Create a resolver consulting `env_var_name` at priority 2
    pub fn new(env_var_name: impl Into<String>) -> Self {
        Self {
            env_var_name: env_var_name.into(),
        }
    }

    /// Resolve the config file path.
    ///
    /// Explicit paths (CLI or environment) must exist; discovered paths are
    /// only returned when present. `Ok(None)` means "use compiled defaults".
    pub fn resolve(&self, cli_arg: Option<&Path>) -> Result<Option<PathBuf>> {
        // Priority 1: Command-line argument
        if let Some(path) = cli_arg {
            return Self::require_exists(path.to_path_buf());
        }

        // Priority 2: Environment variable
        if let Ok(path) = std::env::var(&self.env_var_name) {
            if !path.trim().is_empty() {
                return Self::require_exists(PathBuf::from(path));
            }
        }

        // Priority 3: User config directory
        if let Some(path) = dirs::config_dir().map(|d| d.join(APP_DIR_NAME).join("config.toml")) {
            if path.exists() {
                return Ok(Some(path));
            }
        }

        // Priority 4: System-wide config
        if cfg!(target_os = "linux") {
            let system_config = PathBuf::from("/etc").join(APP_DIR_NAME).join("config.toml");
            if system_config.exists() {
                return Ok(Some(system_config));
            }
        }

        Ok(None)
    }

    fn require_exists(path: PathBuf) -> Result<Option<PathBuf>> {
        if path.exists() {
            Ok(Some(path))
        } else {
            Err(Error::Config(format!(
                "Config file not found: {}",
                path.display()
            )))
        }
    }
}

/// Load a TOML config file, or compiled defaults when `path` is None.
///
/// Runs before tracing is initialised, so the caller reports the outcome.
pub fn load_toml<T>(path: Option<&Path>) -> Result<T>
where
    T: DeserializeOwned + Default,
{
    match path {
        Some(path) => {
            let content = std::fs::read_to_string(path)?;
            Ok(toml::from_str::<T>(&content)?)
        }
        None => Ok(T::default()),
    }
}

/// OS-dependent default data directory (event logs live below it)
pub fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join(APP_DIR_NAME))
        .unwrap_or_else(|| PathBuf::from("./jukebox_data"))
}
