//! Mixer device session
//!
//! Owns the attached backend for one card together with its channel
//! registry. A session lives until its owner drops it.

use crate::MixerError;
use crate::mixer::{ElementId, MixerBackend};
use crate::registry::ChannelRegistry;
use std::os::fd::RawFd;

pub struct DeviceSession<M: MixerBackend> {
    card: String,
    backend: M,
    channels: ChannelRegistry,
}

impl<M: MixerBackend> DeviceSession<M> {
    /// Attach `backend` to `card` and enumerate its playback channels
    ///
    /// Opening an already attached backend is a contract violation and fails
    /// with [`MixerError::AlreadyOpen`].
    pub fn open(mut backend: M, card: &str) -> Result<Self, MixerError> {
        backend.attach(card)?;
        tracing::info!("Attached mixer on card {}", card);

        let channels = ChannelRegistry::enumerate(&backend)?;

        Ok(Self {
            card: card.to_string(),
            backend,
            channels,
        })
    }

    pub fn card(&self) -> &str {
        &self.card
    }

    pub fn channels(&self) -> &ChannelRegistry {
        &self.channels
    }

    pub fn backend(&self) -> &M {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut M {
        &mut self.backend
    }

    /// Descriptors the host loop should watch for readability
    pub fn poll_descriptors(&self) -> Result<Vec<RawFd>, MixerError> {
        self.backend.poll_descriptors()
    }

    /// Drain pending hardware events
    pub fn drain(&mut self) -> Result<Vec<ElementId>, MixerError> {
        self.backend.handle_events()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockElement, MockMixer};

    #[test]
    fn test_open_enumerates_channels() {
        let mock = MockMixer::new()
            .with_element(MockElement::new("Master"))
            .with_element(MockElement::new("PCM"));
        let state = mock.state();

        let session = DeviceSession::open(mock, "hw:0").unwrap();
        assert_eq!(session.card(), "hw:0");
        assert_eq!(session.channels().names(), ["Master", "PCM"]);
        assert_eq!(state.read().unwrap().card.as_deref(), Some("hw:0"));
    }

    #[test]
    fn test_open_unavailable_card() {
        let mock = MockMixer::new().with_cards(&["hw:0"]);
        match DeviceSession::open(mock, "hw:7") {
            Err(MixerError::DeviceUnavailable { card, .. }) => assert_eq!(card, "hw:7"),
            Err(e) => panic!("unexpected error: {}", e),
            Ok(_) => panic!("attach to a missing card succeeded"),
        }
    }

    #[test]
    fn test_open_twice_is_contract_violation() {
        let mut mock = MockMixer::new();
        mock.attach("default").unwrap();

        let err = DeviceSession::open(mock, "default").err().unwrap();
        assert!(err.is_contract_violation());
    }

    #[test]
    fn test_poll_descriptors_passthrough() {
        let session = DeviceSession::open(MockMixer::new().with_descriptors(&[7]), "default").unwrap();
        assert_eq!(session.poll_descriptors().unwrap(), vec![7]);
    }
}
