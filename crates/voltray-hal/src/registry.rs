//! Playback channel registry
//!
//! Names of the card's elements that have a playback volume control,
//! captured once when the session opens.

use crate::MixerError;
use crate::mixer::MixerBackend;

/// Ordered channel names, in hardware enumeration order
///
/// Names are kept exactly as the card reports them, duplicates included.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChannelRegistry {
    names: Vec<String>,
}

impl ChannelRegistry {
    /// Walk every element and keep the ones with playback volume
    pub fn enumerate<M: MixerBackend + ?Sized>(backend: &M) -> Result<Self, MixerError> {
        let names: Vec<String> = backend
            .elements()?
            .into_iter()
            .filter(|info| info.has_playback_volume)
            .map(|info| info.id.name)
            .collect();

        tracing::debug!("Found {} playback channels: {:?}", names.len(), names);

        Ok(Self { names })
    }

    /// Membership test (linear scan, channel counts are small)
    pub fn exists(&self, name: &str) -> bool {
        self.names.iter().any(|n| n == name)
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn first(&self) -> Option<&str> {
        self.names.first().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}
