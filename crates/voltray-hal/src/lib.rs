//! Hardware volume control
//!
//! Attaches to a sound card's mixer, exposes the active channel's volume on
//! a 0-100 scale together with its mute state, and forwards
//! hardware-initiated changes (volume keys, other mixer applications) to a
//! listener through the host's event loop. A small feedback player plays a
//! confirmation sample on the default output device.
//!
//! # Example
//!
//! ```no_run
//! use voltray_hal::mock::MockMixer;
//! use voltray_hal::VolumeControl;
//!
//! fn main() -> anyhow::Result<()> {
//!     let mut control = VolumeControl::setup(MockMixer::desktop(), "default", Some("Master"), |volume: u8, muted: bool| {
//!         println!("Volume {}% muted={}", volume, muted);
//!     })?;
//!
//!     control.set_volume(40)?;
//!     println!("{:?}: {}%", control.channel(), control.volume()?);
//!     Ok(())
//! }
//! ```

#[cfg(feature = "alsa")]
pub mod alsa_hw;
pub mod channel;
pub mod control;
pub mod error;
pub mod events;
pub mod feedback;
pub mod mixer;
pub mod mock;
pub mod registry;
pub mod session;

#[cfg(feature = "alsa")]
pub use alsa_hw::{AlsaMixer, AlsaPcm};
pub use channel::{ActiveChannel, BindOutcome, VolumeListener, denormalize, normalize};
pub use control::VolumeControl;
pub use error::{FeedbackError, MixerError};
pub use events::{EventBridge, ReadinessHost, WatchAction, WatchId};
pub use feedback::{FeedbackPlayer, PcmBackend, PcmStream, PlaybackReport, default_sound_path};
pub use mixer::{ElementId, ElementInfo, MixerBackend};
pub use registry::ChannelRegistry;
pub use session::DeviceSession;

/// HAL Result type
pub type Result<T> = std::result::Result<T, MixerError>;
