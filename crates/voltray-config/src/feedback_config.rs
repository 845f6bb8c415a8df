//! Feedback sound settings

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Bundled sample location, matching the installed data directory
pub const DEFAULT_SOUND: &str = "/usr/share/voltray/sounds/beep.wav";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedbackConfig {
    /// Play the sample after volume changes
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    #[serde(default = "default_sound")]
    pub sound: PathBuf,

    /// PCM output device
    #[serde(default = "default_device")]
    pub device: String,
}

fn default_enabled() -> bool {
    true
}

fn default_sound() -> PathBuf {
    PathBuf::from(DEFAULT_SOUND)
}

fn default_device() -> String {
    "default".to_string()
}

impl Default for FeedbackConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            sound: default_sound(),
            device: default_device(),
        }
    }
}
