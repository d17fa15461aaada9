//! src/config.rs
//! ============================================================================
//! # Config: Browser Configuration Loader and Saver
//!
//! Loads and saves settings as TOML from the platform config path using the
//! [`directories`](https://docs.rs/directories) crate. Every section falls
//! back to its defaults when missing, so partial files are fine.
//!
//! ## Example
//! ```rust,ignore
//! let config = Config::load().await?;
//! config.save().await?;
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use compact_str::CompactString;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use tokio::fs as TokioFs;
use tracing::info;

use crate::error::{DocError, DocResult};

/// Where documents come from and how long a single fetch may take.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Directory (or base locator) every document path is resolved against
    pub root: PathBuf,

    /// Locator of the newline-separated manifest, relative to `root`
    pub manifest: CompactString,

    /// Document served for the `/` route
    pub root_document: CompactString,

    /// Upper bound for a single fetch; zero disables the timeout
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("./markdown"),
            manifest: CompactString::const_new("manifest.txt"),
            root_document: CompactString::const_new("README.md"),
            timeout: Duration::from_secs(10),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Maximum number of ranked results
    pub limit: usize,

    /// Drop candidates farther than this edit distance (unset keeps all)
    pub max_distance: Option<usize>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            limit: 10,
            max_distance: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Buffered snapshots per subscriber before it starts lagging. Each one
    /// keeps a whole copy of the map alive until it is overwritten.
    pub channel_capacity: usize,

    /// Track dispatch counters and load times
    pub enable_stats: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 64,
            enable_stats: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogRotation {
    Never,

    #[default]
    Daily,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub log_dir: PathBuf,

    pub file_prefix: CompactString,

    /// `EnvFilter` directive, e.g. `info` or `docbrowse_core=debug`
    pub level: CompactString,

    pub rotation: LogRotation,

    /// Mirror events to stderr
    pub stderr: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_dir: PathBuf::from("./logs"),
            file_prefix: CompactString::const_new("docbrowse"),
            level: CompactString::const_new("info"),
            rotation: LogRotation::Daily,
            stderr: false,
        }
    }
}

/// Main configuration struct for the browser.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub fetch: FetchConfig,

    pub search: SearchConfig,

    pub store: StoreConfig,

    pub logging: LoggingConfig,
}

impl Config {
    /// Loads config from the platform config dir, or writes and returns defaults.
    ///
    /// The config is expected at `$XDG_CONFIG_HOME/docbrowse/config.toml`
    /// (Linux), or equivalent on Windows/macOS.
    pub async fn load() -> anyhow::Result<Self> {
        let path = Self::config_path()?;
        if path.exists() {
            Self::load_from(&path).await
        } else {
            info!(
                "No config file found at {}, using default configuration. Creating it now.",
                path.display()
            );

            let default_config = Self::default();
            default_config.save().await?;

            Ok(default_config)
        }
    }

    /// Loads config from an explicit TOML file.
    pub async fn load_from(path: &Path) -> anyhow::Result<Self> {
        info!("Loading config from {}", path.display());
        let text = TokioFs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        Ok(Self::from_toml_str(&text)?)
    }

    /// Parses and validates a TOML document.
    pub fn from_toml_str(text: &str) -> DocResult<Self> {
        let cfg: Self = toml::from_str(text)?;
        cfg.validate()?;

        Ok(cfg)
    }

    pub fn validate(&self) -> DocResult<()> {
        if self.search.limit == 0 {
            return Err(DocError::invalid_input(
                "search.limit",
                "must be greater than 0",
            ));
        }

        if self.store.channel_capacity == 0 {
            return Err(DocError::invalid_input(
                "store.channel_capacity",
                "must be greater than 0",
            ));
        }

        if self.fetch.manifest.trim().is_empty() {
            return Err(DocError::invalid_input("fetch.manifest", "must not be empty"));
        }

        Ok(())
    }

    /// Saves config to the platform config dir.
    pub async fn save(&self) -> anyhow::Result<()> {
        let path = Self::config_path()?;

        info!("Saving config to {}", path.display());

        if let Some(parent) = path.parent() {
            TokioFs::create_dir_all(parent).await?;
        }

        let toml_str = toml::to_string_pretty(self)?;
        TokioFs::write(&path, toml_str).await?;

        Ok(())
    }

    /// Returns the canonical config file path using `directories::ProjectDirs`.
    pub fn config_path() -> anyhow::Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    pub fn config_dir() -> anyhow::Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("org", "example", "docbrowse")
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory."))?;
        Ok(proj_dirs.config_dir().to_path_buf())
    }
}
