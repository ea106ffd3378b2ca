use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::BridgeResult;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    pub routes: RoutesConfig,
    pub session: SessionConfig,
    pub search: SearchConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutesConfig {
    /// Compile route patterns case-insensitively.
    pub case_insensitive: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Name given to session worker threads.
    pub thread_name: String,
    /// Worker stack size in bytes; the platform default when unset.
    pub stack_size: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Node under a search model that receives the search classes.
    pub container: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default `tracing` filter directive when `RUST_LOG` is unset.
    pub filter: String,
}

impl Default for RoutesConfig {
    fn default() -> Self {
        Self {
            case_insensitive: true,
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            thread_name: "pagemodel".to_string(),
            stack_size: None,
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            container: "nodes".to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "pagebridge=info".to_string(),
        }
    }
}

/// Smallest stack a session thread may be given.
const MIN_STACK_SIZE: usize = 64 * 1024;

impl BridgeConfig {
    /// Get the config file path
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| {
                dirs::home_dir()
                    .map(|h| h.join(".config"))
                    .unwrap_or_else(|| PathBuf::from("/tmp"))
            })
            .join("pagebridge")
            .join("config.toml")
    }

    /// Load config from the default path, or return defaults if missing or
    /// unreadable
    pub fn load() -> Self {
        let path = Self::config_path();
        if !path.exists() {
            return Self::default();
        }
        match Self::load_from(&path) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to load config, using defaults"
                );
                Self::default()
            }
        }
    }

    /// Load and validate config from `path`, surfacing errors
    pub fn load_from(path: &Path) -> BridgeResult<Self> {
        let content = fs::read_to_string(path)?;
        let mut config: Self = toml::from_str(&content)?;
        config.validate();
        Ok(config)
    }

    /// Validate and clamp config values to acceptable ranges
    fn validate(&mut self) {
        if self.session.thread_name.trim().is_empty() {
            self.session.thread_name = SessionConfig::default().thread_name;
        }

        if let Some(size) = self.session.stack_size.as_mut() {
            *size = (*size).max(MIN_STACK_SIZE);
        }

        if self.search.container.trim().is_empty() {
            self.search.container = SearchConfig::default().container;
        }
    }

    /// Save config to `path`, creating parent directories
    pub fn save_to(&self, path: &Path) -> BridgeResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }
}
