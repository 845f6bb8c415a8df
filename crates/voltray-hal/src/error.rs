//! Error types for mixer control and feedback playback

use crate::feedback::NegotiationStep;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MixerError {
    #[error("Mixer device unavailable: {card}: {reason}")]
    DeviceUnavailable { card: String, reason: String },

    #[error("Mixer session already open on {0}")]
    AlreadyOpen(String),

    #[error("No mixer channel is bound")]
    NoChannelBound,

    #[error("Volume out of range: {0} (expected 0-100)")]
    VolumeOutOfRange(u8),

    #[error("Mixer transport error: {0}")]
    Transport(String),
}

impl MixerError {
    /// Caller bugs rather than runtime conditions.
    ///
    /// These are never produced by legitimate user interaction; a frontend
    /// that sees one has violated the call contract of [`crate::VolumeControl`].
    pub fn is_contract_violation(&self) -> bool {
        matches!(
            self,
            MixerError::AlreadyOpen(_) | MixerError::NoChannelBound | MixerError::VolumeOutOfRange(_)
        )
    }
}

#[derive(Debug, Error)]
pub enum FeedbackError {
    #[error("Feedback sound unavailable: {}: {source}", path.display())]
    FileUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Playback device unavailable: {0}")]
    DeviceUnavailable(String),

    #[error("Can't set {step}: {reason}")]
    ParameterNegotiationFailed { step: NegotiationStep, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
