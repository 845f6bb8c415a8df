//! Volume control context
//!
//! [`VolumeControl`] ties a [`DeviceSession`] to its [`ActiveChannel`] and is
//! the surface a tray frontend talks to. It is owned by the application's
//! composition root and must only be used from the event loop thread.

use crate::MixerError;
use crate::channel::{ActiveChannel, BindOutcome, VOLUME_MAX, VolumeListener};
use crate::events::WatchAction;
use crate::mixer::MixerBackend;
use crate::session::DeviceSession;

pub struct VolumeControl<M: MixerBackend> {
    session: DeviceSession<M>,
    channel: ActiveChannel,
}

impl<M: MixerBackend> VolumeControl<M> {
    /// Open `card` on `backend` and bind the initial channel
    ///
    /// `initial_channel` is used when the card has it; otherwise the first
    /// playback channel is bound. A card with no playback channels leaves
    /// nothing bound. `listener` receives every hardware change on the
    /// active channel.
    pub fn setup<L>(
        backend: M,
        card: &str,
        initial_channel: Option<&str>,
        listener: L,
    ) -> Result<Self, MixerError>
    where
        L: VolumeListener + 'static,
    {
        let mut session = DeviceSession::open(backend, card)?;
        let mut channel = ActiveChannel::new(Box::new(listener));

        let initial = match initial_channel {
            Some(name) if session.channels().exists(name) => Some(name.to_string()),
            requested => {
                if let Some(name) = requested {
                    tracing::warn!("Configured channel {} not on card {}, using first channel", name, card);
                }
                session.channels().first().map(str::to_string)
            }
        };

        match initial {
            Some(name) => {
                channel.bind(&mut session, &name);
            }
            None => tracing::warn!("Card {} has no playback channels", card),
        }

        Ok(Self { session, channel })
    }

    pub fn session(&self) -> &DeviceSession<M> {
        &self.session
    }

    /// Name of the active channel
    pub fn channel(&self) -> Option<&str> {
        self.channel.name()
    }

    pub fn channel_names(&self) -> &[String] {
        self.session.channels().names()
    }

    /// Current volume (0-100) of the active channel
    pub fn volume(&self) -> Result<u8, MixerError> {
        self.channel.volume(&self.session)
    }

    pub fn muted(&self) -> Result<bool, MixerError> {
        self.channel.muted(&self.session)
    }

    /// Switch the active channel
    ///
    /// An unknown name leaves nothing bound; volume and mute access then
    /// fail with [`MixerError::NoChannelBound`] until a valid channel is set.
    pub fn set_channel(&mut self, name: &str) -> BindOutcome {
        self.channel.bind(&mut self.session, name)
    }

    pub fn set_volume(&mut self, volume: u8) -> Result<(), MixerError> {
        self.channel.set_volume(&mut self.session, volume)
    }

    pub fn set_muted(&mut self, muted: bool) -> Result<(), MixerError> {
        self.channel.set_muted(&mut self.session, muted)
    }

    /// Raise volume by `step`, saturating at 100; returns the new volume
    pub fn volume_up(&mut self, step: u8) -> Result<u8, MixerError> {
        let volume = self.volume()?.saturating_add(step).min(VOLUME_MAX);
        self.set_volume(volume)?;
        Ok(volume)
    }

    /// Lower volume by `step`, saturating at 0; returns the new volume
    pub fn volume_down(&mut self, step: u8) -> Result<u8, MixerError> {
        let volume = self.volume()?.saturating_sub(step);
        self.set_volume(volume)?;
        Ok(volume)
    }

    /// Flip the mute state; returns the requested state
    pub fn toggle_mute(&mut self) -> Result<bool, MixerError> {
        let muted = !self.muted()?;
        self.set_muted(muted)?;
        Ok(muted)
    }

    /// Drain pending hardware events and notify the listener
    ///
    /// Returns [`WatchAction::Stop`] when the mixer transport fails, in which
    /// case the host loop should stop watching the descriptor.
    pub fn dispatch_events(&mut self) -> WatchAction {
        let changed = match self.session.drain() {
            Ok(changed) => changed,
            Err(e) => {
                tracing::error!("Failed to handle mixer events: {}", e);
                return WatchAction::Stop;
            }
        };

        for elem in &changed {
            if let Err(e) = self.channel.handle_event(&self.session, elem) {
                tracing::warn!("Can't read state of {} after change: {}", elem, e);
            }
        }
        WatchAction::Continue
    }
}
