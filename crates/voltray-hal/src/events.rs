//! Event loop integration
//!
//! The mixer signals hardware-initiated changes (volume keys, other
//! applications) by making its descriptor readable. The host loop watches
//! that descriptor through [`ReadinessHost`] and calls
//! [`EventBridge::on_ready`] when it wakes; the bridge drains the session,
//! which notifies the active channel's listener synchronously.

use crate::control::VolumeControl;
use crate::mixer::MixerBackend;
use crate::session::DeviceSession;
use std::io;
use std::os::fd::RawFd;

/// What the host loop should do with a watch after a wakeup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchAction {
    Continue,
    /// Remove the watch; the descriptor is no longer usable
    Stop,
}

/// Handle for a registered readiness watch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WatchId(pub u64);

/// A host event loop that can wake us when a descriptor is readable
pub trait ReadinessHost {
    fn watch_readable(&mut self, fd: RawFd) -> io::Result<WatchId>;
}

/// The session's registration with the host loop
#[derive(Debug, Default)]
pub struct EventBridge {
    watch: Option<(RawFd, WatchId)>,
}

impl EventBridge {
    /// Register the session's event descriptor with `host`
    ///
    /// A session without descriptors has no event transport; integration is
    /// skipped and the bridge stays uninstalled.
    pub fn install<M, H>(session: &DeviceSession<M>, host: &mut H) -> Self
    where
        M: MixerBackend,
        H: ReadinessHost + ?Sized,
    {
        let descriptors = match session.poll_descriptors() {
            Ok(fds) => fds,
            Err(e) => {
                tracing::warn!("Can't query mixer poll descriptors: {}", e);
                return Self::default();
            }
        };

        let Some(&fd) = descriptors.first() else {
            tracing::debug!("Mixer on {} has no poll descriptors, not watching events", session.card());
            return Self::default();
        };
        if descriptors.len() > 1 {
            tracing::debug!("Mixer exposes {} descriptors, watching the first", descriptors.len());
        }

        match host.watch_readable(fd) {
            Ok(id) => {
                tracing::debug!("Watching mixer descriptor {}", fd);
                Self {
                    watch: Some((fd, id)),
                }
            }
            Err(e) => {
                tracing::warn!("Can't watch mixer descriptor {}: {}", fd, e);
                Self::default()
            }
        }
    }

    pub fn is_installed(&self) -> bool {
        self.watch.is_some()
    }

    pub fn descriptor(&self) -> Option<RawFd> {
        self.watch.map(|(fd, _)| fd)
    }

    pub fn watch_id(&self) -> Option<WatchId> {
        self.watch.map(|(_, id)| id)
    }

    /// Called by the host loop when the descriptor is readable
    pub fn on_ready<M: MixerBackend>(&self, control: &mut VolumeControl<M>) -> WatchAction {
        control.dispatch_events()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockElement, MockMixer};

    #[derive(Default)]
    struct RecordingHost {
        watched: Vec<RawFd>,
        refuse: bool,
    }

    impl ReadinessHost for RecordingHost {
        fn watch_readable(&mut self, fd: RawFd) -> io::Result<WatchId> {
            if self.refuse {
                return Err(io::Error::other("refused"));
            }
            self.watched.push(fd);
            Ok(WatchId(self.watched.len() as u64))
        }
    }

    fn session(mock: MockMixer) -> DeviceSession<MockMixer> {
        DeviceSession::open(mock.with_element(MockElement::new("Master")), "default").unwrap()
    }

    #[test]
    fn test_install_single_descriptor() {
        let session = session(MockMixer::new().with_descriptors(&[11]));
        let mut host = RecordingHost::default();

        let bridge = EventBridge::install(&session, &mut host);
        assert!(bridge.is_installed());
        assert_eq!(bridge.descriptor(), Some(11));
        assert_eq!(bridge.watch_id(), Some(WatchId(1)));
        assert_eq!(host.watched, vec![11]);
    }

    #[test]
    fn test_install_without_descriptors_is_skipped() {
        let session = session(MockMixer::new());
        let mut host = RecordingHost::default();

        let bridge = EventBridge::install(&session, &mut host);
        assert!(!bridge.is_installed());
        assert!(host.watched.is_empty());
    }

    #[test]
    fn test_install_watches_first_of_many() {
        let session = session(MockMixer::new().with_descriptors(&[4, 5]));
        let mut host = RecordingHost::default();

        let bridge = EventBridge::install(&session, &mut host);
        assert_eq!(bridge.descriptor(), Some(4));
        assert_eq!(host.watched, vec![4]);
    }

    #[test]
    fn test_install_host_refusal() {
        let session = session(MockMixer::new().with_descriptors(&[3]));
        let mut host = RecordingHost {
            refuse: true,
            ..Default::default()
        };

        let bridge = EventBridge::install(&session, &mut host);
        assert!(!bridge.is_installed());
    }
}
