//! Mixer hardware interface
//!
//! The simple-mixer operations the volume core needs from a sound card.
//! [`crate::alsa_hw::AlsaMixer`] talks to real hardware, [`crate::mock::MockMixer`]
//! simulates a card in memory.

use crate::MixerError;
use std::fmt;
use std::os::fd::RawFd;

/// Identifies a simple mixer element (name + index, like an ALSA selem id)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ElementId {
    pub name: String,
    pub index: u32,
}

impl ElementId {
    pub fn new(name: impl Into<String>, index: u32) -> Self {
        Self {
            name: name.into(),
            index,
        }
    }
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'{}',{}", self.name, self.index)
    }
}

/// An element as reported by card enumeration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementInfo {
    pub id: ElementId,
    pub has_playback_volume: bool,
}

/// Access to one sound card's simple mixer
///
/// Volume reads use the first sub-channel (front left / mono); writes apply
/// to every sub-channel of the element.
pub trait MixerBackend {
    /// Attach to the card and load its elements. Called once per backend.
    fn attach(&mut self, card: &str) -> Result<(), MixerError>;

    /// Every element on the card, in hardware enumeration order.
    fn elements(&self) -> Result<Vec<ElementInfo>, MixerError>;

    /// Look up an element by name (index 0).
    fn find_element(&self, name: &str) -> Option<ElementId>;

    fn playback_volume_range(&self, elem: &ElementId) -> Result<(i64, i64), MixerError>;

    fn playback_volume(&self, elem: &ElementId) -> Result<i64, MixerError>;

    fn set_playback_volume_all(&mut self, elem: &ElementId, value: i64) -> Result<(), MixerError>;

    fn has_playback_switch(&self, elem: &ElementId) -> bool;

    /// `true` when the switch is on (signal passes through).
    fn playback_switch(&self, elem: &ElementId) -> Result<bool, MixerError>;

    fn set_playback_switch_all(&mut self, elem: &ElementId, on: bool) -> Result<(), MixerError>;

    /// Route change notifications for `elem` out of [`MixerBackend::handle_events`].
    ///
    /// `None` detaches the current watch. At most one element is watched.
    fn watch(&mut self, elem: Option<&ElementId>);

    /// Descriptors that become readable when the card has pending events.
    fn poll_descriptors(&self) -> Result<Vec<RawFd>, MixerError>;

    /// Process all pending events; returns the watched elements that changed.
    fn handle_events(&mut self) -> Result<Vec<ElementId>, MixerError>;
}
