//! Configuration management for voltray
//!
//! Handles the mixer card/channel selection, feedback sound settings and
//! logging defaults. Configuration is TOML; a system-wide file under
//! [`CONFIG_DIR`] is overlaid with the user's file, and every field has a
//! default so partial files are fine.

mod feedback_config;
mod mixer_config;

pub use feedback_config::{DEFAULT_SOUND, FeedbackConfig};
pub use mixer_config::MixerConfig;

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    NotFound(PathBuf),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

/// System-wide configuration directory
pub const CONFIG_DIR: &str = "/etc/voltray";

/// File name inside each configuration directory
pub const CONFIG_FILE: &str = "config.toml";

/// Main voltray configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoltrayConfig {
    /// Default log filter when RUST_LOG is unset
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub mixer: MixerConfig,

    #[serde(default)]
    pub feedback: FeedbackConfig,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for VoltrayConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            mixer: MixerConfig::default(),
            feedback: FeedbackConfig::default(),
        }
    }
}

impl VoltrayConfig {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }
        let contents = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Load the system file overlaid with the user file
    ///
    /// Missing files are skipped; with neither present the defaults are
    /// returned.
    pub fn load_default() -> Result<Self, ConfigError> {
        let mut paths = vec![Path::new(CONFIG_DIR).join(CONFIG_FILE)];
        if let Some(user) = user_config_path() {
            paths.push(user);
        }
        Self::load_layered(&paths)
    }

    /// Merge every existing file in `paths`, later files winning
    pub fn load_layered(paths: &[PathBuf]) -> Result<Self, ConfigError> {
        let mut merged: Option<toml::Value> = None;

        for path in paths.iter().filter(|p| p.exists()) {
            let contents = std::fs::read_to_string(path)?;
            let layer: toml::Value = toml::from_str(&contents)?;
            tracing::debug!("Loaded configuration layer {}", path.display());

            match merged.as_mut() {
                Some(base) => merge_toml(base, layer),
                None => merged = Some(layer),
            }
        }

        match merged {
            Some(value) => Ok(value.try_into()?),
            None => {
                tracing::warn!("No configuration file found, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let contents = toml::to_string_pretty(self)?;

        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(path, contents)?;
        tracing::info!("Configuration saved to {}", path.display());
        Ok(())
    }

    /// Reject values the mixer can't use
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.mixer.card.trim().is_empty() {
            return Err(ConfigError::Invalid("mixer.card is empty".to_string()));
        }
        if self.mixer.step == 0 || self.mixer.step > 100 {
            return Err(ConfigError::Invalid(format!(
                "mixer.step must be 1-100, got {}",
                self.mixer.step
            )));
        }
        if self.mixer.channel.as_deref().is_some_and(|c| c.is_empty()) {
            return Err(ConfigError::Invalid("mixer.channel is empty".to_string()));
        }
        Ok(())
    }
}

/// `$XDG_CONFIG_HOME/voltray/config.toml`, else `~/.config/voltray/config.toml`
pub fn user_config_path() -> Option<PathBuf> {
    let base = std::env::var_os("XDG_CONFIG_HOME")
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
        .or_else(|| std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".config")))?;
    Some(base.join("voltray").join(CONFIG_FILE))
}

/// Helper function to merge TOML values
pub fn merge_toml(base: &mut toml::Value, overlay: toml::Value) {
    match (base, overlay) {
        (toml::Value::Table(base_table), toml::Value::Table(overlay_table)) => {
            for (key, value) in overlay_table {
                if let Some(base_value) = base_table.get_mut(&key) {
                    merge_toml(base_value, value);
                } else {
                    base_table.insert(key, value);
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}
