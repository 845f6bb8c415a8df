//! Mixer settings

use serde::{Deserialize, Serialize};

/// Which card and channel to control
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MixerConfig {
    /// Mixer device identifier, e.g. "default" or "hw:0"
    #[serde(default = "default_card")]
    pub card: String,

    /// Channel to bind at startup; the card's first channel when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,

    /// Volume step (percent) for volume up/down
    #[serde(default = "default_step")]
    pub step: u8,
}

fn default_card() -> String {
    "default".to_string()
}

fn default_step() -> u8 {
    5
}

impl Default for MixerConfig {
    fn default() -> Self {
        Self {
            card: default_card(),
            channel: None,
            step: default_step(),
        }
    }
}
