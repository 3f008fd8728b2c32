//! Configuration management for the Auto Advisor MCP Server
//!
//! Handles the resource root, the data file location, and environment overrides.

use std::path::{Path, PathBuf};

use crate::error::{AdvisorError, ConfigError, Result};

/// File name of the vehicle sales table
pub const DATA_FILE_NAME: &str = "Updated_Car_Sales_Data.csv";

/// Configuration for the Auto Advisor MCP Server
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory holding the server's resources
    pub resource_root: PathBuf,

    /// Path to the vehicle sales CSV
    pub data_path: PathBuf,
}

impl Config {
    /// Create a new configuration from the environment and default paths
    pub fn new() -> Self {
        let resource_root = std::env::var("AUTO_ADVISOR_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| Self::default_resource_root());

        let data_path = std::env::var("AUTO_ADVISOR_DATA_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| Self::default_data_path(&resource_root));

        Self {
            resource_root,
            data_path,
        }
    }

    /// Override the data path (e.g. from the command line)
    pub fn with_data_path(mut self, data_path: impl Into<PathBuf>) -> Self {
        self.data_path = data_path.into();
        self
    }

    /// `~/.auto-advisor`, or the working directory when there is no home
    fn default_resource_root() -> PathBuf {
        dirs::home_dir()
            .map(|home| home.join(".auto-advisor"))
            .unwrap_or_else(|| PathBuf::from("."))
    }

    /// Prefer `./data/<file>` in the working directory, then the resource root
    fn default_data_path(resource_root: &Path) -> PathBuf {
        let local = PathBuf::from("data").join(DATA_FILE_NAME);
        if local.exists() {
            return local;
        }
        resource_root.join("data").join(DATA_FILE_NAME)
    }

    /// Check if the data file exists
    pub fn data_file_exists(&self) -> bool {
        self.data_path.is_file()
    }

    /// Fail early when the data file is absent
    pub fn require_data_file(&self) -> Result<()> {
        if self.data_file_exists() {
            Ok(())
        } else {
            Err(AdvisorError::Config(ConfigError::DataFileNotFound {
                path: self.data_path.display().to_string(),
            }))
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}
