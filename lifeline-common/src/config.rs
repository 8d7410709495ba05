//! Configuration loading and root folder resolution
//!
//! Bootstrap settings come from a small TOML file. The root folder (where the
//! database lives) is resolved in priority order:
//! 1. Command-line argument (highest priority)
//! 2. `LIFELINE_ROOT_FOLDER` environment variable
//! 3. `root_folder` in the TOML config file
//! 4. OS-dependent compiled default (fallback)

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable overriding the root folder
pub const ROOT_FOLDER_ENV: &str = "LIFELINE_ROOT_FOLDER";

/// Database file name inside the root folder
pub const DATABASE_FILE: &str = "lifeline.db";

/// Bootstrap configuration loaded from TOML
///
/// Every field is optional in the file; missing fields take built-in defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TomlConfig {
    /// Root folder holding the database
    #[serde(default)]
    pub root_folder: Option<PathBuf>,

    /// HTTP bind address
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// HTTP server port
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default)]
    pub logging: LoggingConfig,

    /// Change-notification buffer per subscriber
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,

    /// Sessions with no SSE client are closed after this long without requests
    #[serde(default = "default_session_idle_secs")]
    pub session_idle_secs: u64,

    /// Replaces the built-in canonical question list when set
    #[serde(default)]
    pub canonical_questions: Option<Vec<String>>,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    5740
}

fn default_event_capacity() -> usize {
    1000
}

fn default_session_idle_secs() -> u64 {
    300
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            root_folder: None,
            bind_address: default_bind_address(),
            port: default_port(),
            logging: LoggingConfig::default(),
            event_capacity: default_event_capacity(),
            session_idle_secs: default_session_idle_secs(),
            canonical_questions: None,
        }
    }
}

impl TomlConfig {
    /// Parse a config file; a missing or malformed file is an error
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {}: {}", path.display(), e)))?;
        toml::from_str(&content)
            .map_err(|e| Error::Config(format!("invalid config {}: {}", path.display(), e)))
    }

    /// Load the explicit config file, or the default one if it exists
    ///
    /// An explicitly named file must exist. A missing default file is not an
    /// error: built-in defaults are used and a warning is logged.
    pub fn load_or_default(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            let config = Self::load(path)?;
            info!("Loaded configuration from {}", path.display());
            return Ok(config);
        }

        match Self::default_path() {
            Some(path) if path.exists() => {
                let config = Self::load(&path)?;
                info!("Loaded configuration from {}", path.display());
                Ok(config)
            }
            _ => {
                warn!("No config file found, using built-in defaults");
                Ok(Self::default())
            }
        }
    }

    /// `<config dir>/lifeline/config.toml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("lifeline").join("config.toml"))
    }
}

/// OS-dependent compiled defaults
#[derive(Debug, Clone)]
pub struct CompiledDefaults {
    pub root_folder: PathBuf,
    pub log_level: String,
}

impl CompiledDefaults {
    pub fn for_current_platform() -> Self {
        let root_folder = if cfg!(target_os = "windows") {
            dirs::data_local_dir()
                .map(|d| d.join("lifeline"))
                .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\lifeline"))
        } else if cfg!(target_os = "macos") {
            dirs::data_dir()
                .map(|d| d.join("lifeline"))
                .unwrap_or_else(|| PathBuf::from("/Library/Application Support/lifeline"))
        } else {
            dirs::data_local_dir()
                .map(|d| d.join("lifeline"))
                .unwrap_or_else(|| PathBuf::from("./lifeline_data"))
        };

        Self {
            root_folder,
            log_level: default_log_level(),
        }
    }
}

/// Resolves the root folder from CLI, environment, TOML and defaults
#[derive(Debug, Clone, Default)]
pub struct RootFolderResolver {
    cli_arg: Option<PathBuf>,
    toml_root: Option<PathBuf>,
}

impl RootFolderResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cli_arg(mut self, cli_arg: Option<PathBuf>) -> Self {
        self.cli_arg = cli_arg;
        self
    }

    pub fn with_toml(mut self, config: &TomlConfig) -> Self {
        self.toml_root = config.root_folder.clone();
        self
    }

    pub fn resolve(&self) -> PathBuf {
        if let Some(path) = &self.cli_arg {
            return path.clone();
        }

        if let Ok(path) = std::env::var(ROOT_FOLDER_ENV) {
            if !path.trim().is_empty() {
                return PathBuf::from(path);
            }
        }

        if let Some(path) = &self.toml_root {
            return path.clone();
        }

        CompiledDefaults::for_current_platform().root_folder
    }
}

/// Prepares the resolved root folder for use
#[derive(Debug, Clone)]
pub struct RootFolderInitializer {
    root: PathBuf,
}

impl RootFolderInitializer {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// Create the root folder if needed (idempotent)
    pub fn ensure_directory_exists(&self) -> Result<()> {
        if !self.root.exists() {
            std::fs::create_dir_all(&self.root)?;
            info!("Created root folder: {}", self.root.display());
        }
        Ok(())
    }

    pub fn database_path(&self) -> PathBuf {
        self.root.join(DATABASE_FILE)
    }

    pub fn database_exists(&self) -> bool {
        self.database_path().exists()
    }
}
