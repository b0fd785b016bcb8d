//! Application configuration: a JSON file with every field defaulted, then env overrides.

use chrono::Weekday;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::catalog::BannerConfig;
use crate::error::ConfigError;
use crate::grid::Slot;
use crate::time;
use crate::workflow::WorkflowConfig;

pub const ENV_CONFIG_PATH: &str = "CLASSGRID_CONFIG";
pub const ENV_ADDRESS: &str = "CLASSGRID_ADDRESS";
pub const ENV_PORT: &str = "CLASSGRID_PORT";
pub const ENV_DATABASE: &str = "CLASSGRID_DATABASE";
pub const ENV_TERM: &str = "CLASSGRID_TERM";

/// Top-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    /// SQLite file holding the catalog and saved schedules
    pub database_path: String,
    pub grid: GridConfig,
    pub workflow: WorkflowConfig,
    pub banner: BannerConfig,
    pub catalog: CatalogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub address: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1".to_string(),
            port: 5000,
        }
    }
}

/// Display window of the weekly grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    pub days: Vec<Weekday>,
    /// Minutes since midnight
    pub start_minute: i32,
    pub end_minute: i32,
    pub slot_minutes: i32,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            days: time::school_week(),
            start_minute: 8 * 60,
            end_minute: 22 * 60,
            slot_minutes: 30,
        }
    }
}

impl GridConfig {
    pub fn slots(&self) -> Vec<Slot> {
        Slot::span(self.start_minute, self.end_minute, self.slot_minutes)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.slot_minutes <= 0 {
            return Err(ConfigError::Invalid {
                message: format!("grid.slot_minutes must be positive, got {}", self.slot_minutes),
            });
        }
        if !(0..self.end_minute).contains(&self.start_minute) || self.end_minute > 24 * 60 {
            return Err(ConfigError::Invalid {
                message: format!(
                    "grid window {}..{} is not within one day",
                    self.start_minute, self.end_minute
                ),
            });
        }
        if self.slot_minutes > self.end_minute - self.start_minute {
            return Err(ConfigError::Invalid {
                message: format!(
                    "grid.slot_minutes {} is wider than the grid window",
                    self.slot_minutes
                ),
            });
        }
        if self.days.is_empty() {
            return Err(ConfigError::Invalid {
                message: "grid.days is empty".to_string(),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    /// Cap on search hits
    pub search_limit: usize,
    /// Serve searches from another classgrid instance instead of the local database
    pub remote_url: Option<String>,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            search_limit: crate::catalog::DEFAULT_SEARCH_LIMIT,
            remote_url: None,
        }
    }
}

impl AppConfig {
    /// Loads `path` if given (otherwise defaults) and applies env overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(|name| std::env::var(name).ok())?;
        config.grid.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Applies overrides from `lookup`, normally `std::env::var`.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(address) = lookup(ENV_ADDRESS) {
            self.server.address = address;
        }
        if let Some(port) = lookup(ENV_PORT) {
            self.server.port = port.trim().parse().map_err(|_| ConfigError::InvalidEnv {
                name: ENV_PORT.to_string(),
                value: port.clone(),
            })?;
        }
        if let Some(path) = lookup(ENV_DATABASE) {
            self.database_path = path;
        }
        if let Some(term) = lookup(ENV_TERM) {
            self.banner.term = term;
        }
        Ok(())
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.address, self.server.port)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            database_path: "classgrid.db".to_string(),
            grid: GridConfig::default(),
            workflow: WorkflowConfig::default(),
            banner: BannerConfig::default(),
            catalog: CatalogConfig::default(),
        }
    }
}
