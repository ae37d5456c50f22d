//! Configuration management.
//!
//! ```toml
//! data_dir = "/home/me/.local/share/cortex"
//! registry_path = "/home/me/.config/cortex/stores.yml"
//! default_store = "default"
//! memory_extension = ".md"
//! index_extension = ".yml"
//!
//! [logging]
//! level = "info"
//! format = "json"
//! file = "/tmp/cortex.log"
//! ```

use crate::storage::filesystem::{DEFAULT_INDEX_EXTENSION, DEFAULT_MEMORY_EXTENSION};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Environment variable pointing at a config file.
pub const CONFIG_PATH_ENV: &str = "CORTEX_CONFIG_PATH";

/// Environment variable overriding the data directory.
pub const DATA_DIR_ENV: &str = "CORTEX_DATA_DIR";

/// Environment variable overriding the default store name.
pub const STORE_ENV: &str = "CORTEX_STORE";

const APP_DIR: &str = "cortex";
const CONFIG_FILE: &str = "config.toml";
const REGISTRY_FILE: &str = "stores.yml";
const DEFAULT_STORE: &str = "default";

/// Main configuration for cortex.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CortexConfig {
    /// Directory holding store roots created without an explicit path.
    pub data_dir: PathBuf,
    /// Path of the store registry file.
    pub registry_path: PathBuf,
    /// Store used when a command does not name one.
    pub default_store: String,
    /// Memory file extension, including the leading dot.
    pub memory_extension: String,
    /// Index file extension, including the leading dot.
    pub index_extension: String,
    /// Logging settings from the config file.
    pub logging: LoggingSettings,
}

/// Logging section of the config file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct LoggingSettings {
    /// Filter directive (`warn`, `info`, `cortex=debug`, ...).
    pub level: Option<String>,
    /// `pretty` or `json`.
    pub format: Option<String>,
    /// Append-mode log file.
    pub file: Option<PathBuf>,
}

/// Configuration file structure (for TOML parsing).
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    /// Data directory.
    pub data_dir: Option<PathBuf>,
    /// Registry file path.
    pub registry_path: Option<PathBuf>,
    /// Default store name.
    pub default_store: Option<String>,
    /// Memory file extension.
    pub memory_extension: Option<String>,
    /// Index file extension.
    pub index_extension: Option<String>,
    /// Logging section.
    pub logging: Option<LoggingSettings>,
}

impl Default for CortexConfig {
    fn default() -> Self {
        let base_dirs = directories::BaseDirs::new();
        let data_dir = base_dirs.as_ref().map_or_else(
            || PathBuf::from(".cortex"),
            |dirs| dirs.data_local_dir().join(APP_DIR),
        );
        let registry_path = base_dirs.as_ref().map_or_else(
            || data_dir.join(REGISTRY_FILE),
            |dirs| dirs.config_dir().join(APP_DIR).join(REGISTRY_FILE),
        );

        Self {
            data_dir,
            registry_path,
            default_store: DEFAULT_STORE.to_string(),
            memory_extension: DEFAULT_MEMORY_EXTENSION.to_string(),
            index_extension: DEFAULT_INDEX_EXTENSION.to_string(),
            logging: LoggingSettings::default(),
        }
    }
}

impl CortexConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_from_file(path: &Path) -> crate::Result<Self> {
        let contents =
            std::fs::read_to_string(path).map_err(|e| crate::Error::OperationFailed {
                operation: "read_config_file".to_string(),
                cause: format!("{}: {e}", path.display()),
            })?;

        Self::from_toml(&contents)
    }

    /// Parses configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not a valid config file.
    pub fn from_toml(contents: &str) -> crate::Result<Self> {
        let file: ConfigFile =
            toml::from_str(contents).map_err(|e| crate::Error::OperationFailed {
                operation: "parse_config_file".to_string(),
                cause: e.to_string(),
            })?;

        Ok(Self::from_config_file(file))
    }

    /// Loads configuration from the default location.
    ///
    /// Checks `<config dir>/cortex/config.toml` (platform config dir, e.g.
    /// `~/.config/cortex/` on Linux). Returns defaults if no file is found or
    /// it fails to parse.
    #[must_use]
    pub fn load_default() -> Self {
        let Some(base_dirs) = directories::BaseDirs::new() else {
            return Self::default();
        };

        let platform_config = base_dirs.config_dir().join(APP_DIR).join(CONFIG_FILE);
        if platform_config.exists() {
            match Self::load_from_file(&platform_config) {
                Ok(config) => return config,
                Err(e) => tracing::warn!(error = %e, "Ignoring unreadable config file"),
            }
        }

        Self::default()
    }

    /// Loads configuration following the search order: an explicit path,
    /// `CORTEX_CONFIG_PATH`, then the default location. Environment overrides
    /// are applied last.
    ///
    /// # Errors
    ///
    /// Returns an error if an explicitly named file cannot be loaded.
    pub fn load(path: Option<&Path>) -> crate::Result<Self> {
        let config = if let Some(path) = path {
            Self::load_from_file(path)?
        } else if let Some(env_path) = env_value(CONFIG_PATH_ENV) {
            Self::load_from_file(Path::new(&env_path))?
        } else {
            Self::load_default()
        };

        Ok(config.with_env_overrides())
    }

    /// Applies `CORTEX_DATA_DIR` and `CORTEX_STORE`.
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(data_dir) = env_value(DATA_DIR_ENV) {
            self.data_dir = PathBuf::from(data_dir);
        }
        if let Some(store) = env_value(STORE_ENV) {
            self.default_store = store;
        }
        self
    }

    /// Converts a `ConfigFile` to `CortexConfig`.
    fn from_config_file(file: ConfigFile) -> Self {
        let mut config = Self::default();

        if let Some(data_dir) = file.data_dir {
            config.data_dir = data_dir;
        }
        if let Some(registry_path) = file.registry_path {
            config.registry_path = registry_path;
        }
        if let Some(store) = file.default_store.filter(|s| !s.trim().is_empty()) {
            config.default_store = store;
        }
        if let Some(extension) = file.memory_extension {
            config.memory_extension = extension;
        }
        if let Some(extension) = file.index_extension {
            config.index_extension = extension;
        }
        if let Some(logging) = file.logging {
            config.logging = logging;
        }

        config
    }

    /// Sets the data directory.
    #[must_use]
    pub fn with_data_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.data_dir = path.into();
        self
    }

    /// Sets the registry path.
    #[must_use]
    pub fn with_registry_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.registry_path = path.into();
        self
    }

    /// Default root directory for a store named `name`.
    #[must_use]
    pub fn default_store_root(&self, name: &str) -> PathBuf {
        self.data_dir.join(name)
    }
}

fn env_value(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
