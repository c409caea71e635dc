//! Sync layer configuration
//!
//! Configuration is loaded from:
//! 1. Default values
//! 2. Config file (~/.config/portal-sync/config.toml)
//! 3. Environment variables (PORTAL_SYNC_* prefix)
//!
//! Environment variables take precedence over config file values. The
//! merged result is validated before it is handed out: an enabled remote
//! needs a `ws://` or `wss://` URL and a non-zero timeout.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable prefix
const ENV_PREFIX: &str = "PORTAL_SYNC";

/// Default timeout for a single remote call
const DEFAULT_REMOTE_TIMEOUT_SECS: u64 = 10;

/// URL schemes the WebSocket remote can connect to
const REMOTE_SCHEMES: [&str; 2] = ["ws://", "wss://"];

/// Sync layer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Directory holding the persistent cache database
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Remote store WebSocket URL (optional)
    #[serde(default)]
    pub remote_url: Option<String>,

    /// Whether the remote store is used at all
    #[serde(default)]
    pub remote_enabled: bool,

    /// Seconds before a remote get/set is treated as unreachable
    #[serde(default = "default_remote_timeout_secs")]
    pub remote_timeout_secs: u64,

    /// Whether values are persisted across restarts.
    /// When false the cache is memory-only for the process.
    #[serde(default = "default_true")]
    pub persistent_cache: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            remote_url: None,
            remote_enabled: false,
            remote_timeout_secs: DEFAULT_REMOTE_TIMEOUT_SECS,
            persistent_cache: true,
        }
    }
}

impl Config {
    /// Load configuration from default location and environment
    ///
    /// Order of precedence (highest to lowest):
    /// 1. Environment variables (PORTAL_SYNC_DATA_DIR, PORTAL_SYNC_REMOTE_URL, ...)
    /// 2. Config file (~/.config/portal-sync/config.toml or PORTAL_SYNC_CONFIG)
    /// 3. Default values
    pub fn load() -> Result<Self> {
        Self::load_from_path(&Self::config_file_path())
    }

    /// Load configuration, preferring an explicit path (from `--config`)
    pub fn load_with_cli_override(path: Option<&PathBuf>) -> Result<Self> {
        match path {
            Some(path) => Self::load_from_path(path),
            None => Self::load(),
        }
    }

    /// Load configuration from a specific path
    ///
    /// Environment variables are still applied as overrides.
    /// If the file doesn't exist, defaults are used.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {:?}", path))?;
            toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {:?}", path))?
        } else {
            Self::default()
        };

        config.apply_env_overrides();
        config
            .validate()
            .with_context(|| format!("Invalid configuration in {:?}", path))?;
        config.ensure_data_dir()?;
        Ok(config)
    }

    /// Load configuration from a TOML string (useful for testing)
    pub fn load_from_str(toml_content: &str) -> Result<Self> {
        let mut config: Config =
            toml::from_str(toml_content).context("Failed to parse config TOML")?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Check that the remote settings can actually be used
    ///
    /// A URL without `remote_enabled` is allowed and ignored.
    pub fn validate(&self) -> Result<()> {
        if let Some(url) = &self.remote_url {
            if !REMOTE_SCHEMES.iter().any(|scheme| url.starts_with(scheme)) {
                bail!("remote_url must start with ws:// or wss://, got '{}'", url);
            }
        }

        if self.remote_enabled {
            if self.remote_url.is_none() {
                bail!("remote_enabled is true but remote_url is not set");
            }
            if self.remote_timeout_secs == 0 {
                bail!("remote_timeout_secs must be at least 1 when the remote is enabled");
            }
        }

        Ok(())
    }

    /// Apply environment variable overrides
    ///
    /// Unparseable numbers are ignored; flags accept `true` (any case) or `1`.
    fn apply_env_overrides(&mut self) {
        if let Some(val) = env_override("DATA_DIR") {
            self.data_dir = PathBuf::from(val);
        }
        if let Some(val) = env_override("REMOTE_URL") {
            self.remote_url = Some(val).filter(|url| !url.is_empty());
        }
        if let Some(val) = env_override("REMOTE_ENABLED") {
            self.remote_enabled = parse_flag(&val);
        }
        if let Some(secs) = env_override("REMOTE_TIMEOUT_SECS").and_then(|v| v.parse().ok()) {
            self.remote_timeout_secs = secs;
        }
        if let Some(val) = env_override("PERSISTENT_CACHE") {
            self.persistent_cache = parse_flag(&val);
        }
    }

    /// Ensure data directory exists
    fn ensure_data_dir(&self) -> Result<()> {
        if !self.data_dir.exists() {
            std::fs::create_dir_all(&self.data_dir)
                .with_context(|| format!("Failed to create data directory: {:?}", self.data_dir))?;
        }
        Ok(())
    }

    /// Save configuration to the default file
    pub fn save(&self) -> Result<()> {
        self.save_to_path(&Self::config_file_path())
    }

    /// Save configuration to a specific file
    pub fn save_to_path(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(config_path, content)
            .with_context(|| format!("Failed to write config file: {:?}", config_path))?;
        Ok(())
    }

    /// Get the config file path
    ///
    /// Can be overridden with PORTAL_SYNC_CONFIG environment variable
    pub fn config_file_path() -> PathBuf {
        if let Some(path) = env_override("CONFIG") {
            return PathBuf::from(path);
        }

        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("portal-sync")
            .join("config.toml")
    }

    /// Get the path to the persistent cache database
    pub fn cache_db_path(&self) -> PathBuf {
        self.data_dir.join("portal-cache.db")
    }

    /// Remote call timeout as a `Duration`
    pub fn remote_timeout(&self) -> Duration {
        Duration::from_secs(self.remote_timeout_secs)
    }

    /// The remote URL, if the remote store is enabled and configured
    pub fn active_remote_url(&self) -> Option<&str> {
        if self.remote_enabled {
            self.remote_url.as_deref()
        } else {
            None
        }
    }
}

/// `PORTAL_SYNC_{name}`, if set
fn env_override(name: &str) -> Option<String> {
    std::env::var(format!("{}_{}", ENV_PREFIX, name)).ok()
}

fn parse_flag(val: &str) -> bool {
    val.eq_ignore_ascii_case("true") || val == "1"
}

fn default_true() -> bool {
    true
}

fn default_remote_timeout_secs() -> u64 {
    DEFAULT_REMOTE_TIMEOUT_SECS
}

/// Get the default data directory
fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("portal-sync")
}
