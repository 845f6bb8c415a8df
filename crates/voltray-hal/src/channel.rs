//! Active channel binding
//!
//! Exactly one channel of the session is active at a time. Volume and mute
//! are read and written on that channel, and hardware change notifications
//! for it are forwarded to the registered [`VolumeListener`].
//!
//! Volume is exposed on a fixed 0-100 scale. The element's native playback
//! range is mapped linearly onto it, truncating toward the lower value in
//! both directions:
//!
//! ```text
//! normalized = 100 * (raw - min) / (max - min)
//! raw        = min + (max - min) * normalized / 100
//! ```

use crate::MixerError;
use crate::mixer::{ElementId, MixerBackend};
use crate::session::DeviceSession;

/// Upper end of the public volume scale
pub const VOLUME_MAX: u8 = 100;

/// Map a native volume onto 0-100
///
/// Degenerate ranges (`max <= min`) report 0. Raw values outside the range
/// are clamped.
pub fn normalize(raw: i64, min: i64, max: i64) -> u8 {
    if max <= min {
        return 0;
    }
    let scaled = 100 * (raw - min) / (max - min);
    scaled.clamp(0, VOLUME_MAX as i64) as u8
}

/// Map a 0-100 volume onto the native range
pub fn denormalize(volume: u8, min: i64, max: i64) -> i64 {
    if max <= min {
        return min;
    }
    min + (max - min) * volume as i64 / 100
}

/// Receives the full (volume, muted) state after a hardware change
pub trait VolumeListener {
    fn volume_changed(&mut self, volume: u8, muted: bool);
}

impl<F> VolumeListener for F
where
    F: FnMut(u8, bool),
{
    fn volume_changed(&mut self, volume: u8, muted: bool) {
        self(volume, muted)
    }
}

/// Result of a channel switch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindOutcome {
    /// The channel was already active; nothing changed
    Unchanged,
    /// The named element was found and is now watched
    Bound,
    /// No element with that name; the binding is left empty
    NotFound,
}

pub struct ActiveChannel {
    name: Option<String>,
    element: Option<ElementId>,
    listener: Box<dyn VolumeListener>,
}

impl ActiveChannel {
    /// An empty binding that reports changes to `listener` once bound
    pub fn new(listener: Box<dyn VolumeListener>) -> Self {
        Self {
            name: None,
            element: None,
            listener,
        }
    }

    /// Name of the requested channel, even when no element matched it
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn element(&self) -> Option<&ElementId> {
        self.element.as_ref()
    }

    pub fn is_bound(&self) -> bool {
        self.element.is_some()
    }

    /// Make `name` the active channel
    ///
    /// The previous element's watch is detached before the lookup, so a
    /// failed lookup leaves nothing bound.
    pub fn bind<M: MixerBackend>(&mut self, session: &mut DeviceSession<M>, name: &str) -> BindOutcome {
        if self.name.as_deref() == Some(name) {
            return BindOutcome::Unchanged;
        }

        self.name = Some(name.to_string());
        if let Some(previous) = self.element.take() {
            tracing::debug!("Unbinding mixer element {}", previous);
            session.backend_mut().watch(None);
        }

        match session.backend().find_element(name) {
            Some(id) => {
                session.backend_mut().watch(Some(&id));
                tracing::info!("Active channel set to {}", id);
                self.element = Some(id);
                BindOutcome::Bound
            }
            None => {
                tracing::warn!("Channel {} not found on card {}", name, session.card());
                BindOutcome::NotFound
            }
        }
    }

    fn require_element(&self) -> Result<&ElementId, MixerError> {
        self.element.as_ref().ok_or(MixerError::NoChannelBound)
    }

    /// Current volume (0-100)
    pub fn volume<M: MixerBackend>(&self, session: &DeviceSession<M>) -> Result<u8, MixerError> {
        let elem = self.require_element()?;
        let backend = session.backend();

        let (min, max) = backend.playback_volume_range(elem)?;
        let raw = backend.playback_volume(elem)?;
        Ok(normalize(raw, min, max))
    }

    /// Set volume (0-100) on every sub-channel of the element
    pub fn set_volume<M: MixerBackend>(
        &self,
        session: &mut DeviceSession<M>,
        volume: u8,
    ) -> Result<(), MixerError> {
        let elem = self.require_element()?;
        if volume > VOLUME_MAX {
            return Err(MixerError::VolumeOutOfRange(volume));
        }

        let backend = session.backend_mut();
        let (min, max) = backend.playback_volume_range(elem)?;
        let raw = denormalize(volume, min, max);
        backend.set_playback_volume_all(elem, raw)?;

        tracing::debug!("Volume set to {}% (raw {} in {}..={})", volume, raw, min, max);
        Ok(())
    }

    /// Muted iff the element has a playback switch and it is off
    pub fn muted<M: MixerBackend>(&self, session: &DeviceSession<M>) -> Result<bool, MixerError> {
        let elem = self.require_element()?;
        let backend = session.backend();

        if backend.has_playback_switch(elem) {
            Ok(!backend.playback_switch(elem)?)
        } else {
            Ok(false)
        }
    }

    /// Mute or unmute
    ///
    /// Without a playback switch, muting forces the volume to 0 and
    /// unmuting does nothing: the previous volume is not restored.
    pub fn set_muted<M: MixerBackend>(
        &self,
        session: &mut DeviceSession<M>,
        muted: bool,
    ) -> Result<(), MixerError> {
        let elem = self.require_element()?;

        if session.backend().has_playback_switch(elem) {
            session.backend_mut().set_playback_switch_all(elem, !muted)?;
            tracing::debug!("Playback switch set {}", if muted { "off" } else { "on" });
        } else if muted {
            tracing::debug!("No playback switch on {}, muting by volume", elem);
            self.set_volume(session, 0)?;
        }
        Ok(())
    }

    /// Hardware change notification for `changed`
    ///
    /// Re-reads the full state and hands it to the listener. Returns `false`
    /// when the event was not for the bound element.
    pub fn handle_event<M: MixerBackend>(
        &mut self,
        session: &DeviceSession<M>,
        changed: &ElementId,
    ) -> Result<bool, MixerError> {
        if self.element.as_ref() != Some(changed) {
            tracing::debug!("Ignoring event for unbound element {}", changed);
            return Ok(false);
        }

        let volume = self.volume(session)?;
        let muted = self.muted(session)?;
        tracing::debug!("Hardware change on {}: {}% muted={}", changed, volume, muted);

        self.listener.volume_changed(volume, muted);
        Ok(true)
    }
}
