use crate::domain::{config::MuxConfig, error::{MuxError, MuxResult}};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Configuration manager
pub struct ConfigManager {
    global_config_path: PathBuf,
}

impl ConfigManager {
    /// Create new configuration manager
    pub fn new() -> MuxResult<Self> {
        Ok(Self {
            global_config_path: Self::get_global_config_path()?,
        })
    }

    /// Manager rooted at an explicit config file
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            global_config_path: path.into(),
        }
    }

    /// Load configuration, falling back to defaults when no file exists
    pub fn load_config(&self) -> MuxResult<MuxConfig> {
        if self.global_config_path.exists() {
            debug!("Loading configuration from {}", self.global_config_path.display());
            self.load_config_from_path(&self.global_config_path)
        } else {
            Ok(MuxConfig::default())
        }
    }

    /// Get global configuration path
    fn get_global_config_path() -> MuxResult<PathBuf> {
        let config_dir = dirs::config_dir()
            .or_else(|| dirs::home_dir().map(|home| home.join(".config")))
            .ok_or_else(|| MuxError::Config {
                message: "Could not determine configuration directory".to_string(),
            })?;

        Ok(config_dir.join("sermux").join("config.toml"))
    }

    /// Load configuration from specific path
    pub fn load_config_from_path(&self, path: &Path) -> MuxResult<MuxConfig> {
        let content = fs::read_to_string(path).map_err(|e| MuxError::Config {
            message: format!("Failed to read config file {}: {}", path.display(), e),
        })?;

        let config: MuxConfig = toml::from_str(&content).map_err(|e| MuxError::Config {
            message: format!("Failed to parse config file {}: {}", path.display(), e),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to specific path
    pub fn save_config_to_path(&self, path: &Path, config: &MuxConfig) -> MuxResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| MuxError::Config {
                message: format!("Failed to create config directory: {}", e),
            })?;
        }

        let content = toml::to_string_pretty(config).map_err(|e| MuxError::Config {
            message: format!("Failed to serialize config: {}", e),
        })?;

        fs::write(path, content).map_err(|e| MuxError::Config {
            message: format!("Failed to write config file {}: {}", path.display(), e),
        })
    }

    /// Write a default configuration file, refusing to replace an existing one
    /// unless `force` is set. Returns the path written.
    pub fn init_config(&self, path: Option<&Path>, force: bool) -> MuxResult<PathBuf> {
        let target = path.unwrap_or(self.global_config_path.as_path()).to_path_buf();
        if target.exists() && !force {
            return Err(MuxError::Config {
                message: format!("Configuration already exists at {}", target.display()),
            });
        }

        self.save_config_to_path(&target, &MuxConfig::default())?;
        Ok(target)
    }

    /// Get the global config path
    pub fn get_global_config_path_ref(&self) -> &PathBuf {
        &self.global_config_path
    }
}
