//! Audio feedback playback
//!
//! Plays a short bundled sample on the default output device to confirm a
//! volume change is audible. Playback is synchronous and blocks for about
//! [`FEEDBACK_DURATION_US`]; it uses its own device handle and shares no
//! state with the mixer session.

use crate::FeedbackError;
use std::fmt;
use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

/// Where bundled resources are installed
pub const DEFAULT_DATA_DIR: &str = "/usr/share/voltray";

/// How much audio to play, in microseconds
pub const FEEDBACK_DURATION_US: u64 = 200_000;

/// 2 channels of 16-bit samples
pub const BYTES_PER_FRAME: usize = 4;

/// Default location of the feedback sample
pub fn default_sound_path() -> PathBuf {
    Path::new(DEFAULT_DATA_DIR).join("sounds").join("beep.wav")
}

/// Requested stream shape. Access is always interleaved and the sample
/// format always S16_LE.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamParams {
    pub channels: u32,
    /// Requested rate; the device may settle on the nearest it supports
    pub rate: u32,
}

impl StreamParams {
    pub const FEEDBACK: StreamParams = StreamParams {
        channels: 2,
        rate: 44100,
    };
}

/// Configuration the device settled on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HwConfig {
    pub rate: u32,
    /// Frames per period
    pub period_size: usize,
}

impl HwConfig {
    /// Duration of one period in microseconds
    pub fn period_time_us(&self) -> u64 {
        if self.rate == 0 {
            return 0;
        }
        self.period_size as u64 * 1_000_000 / self.rate as u64
    }

    /// Time for `frames` queued frames to play out; negative delays count as none
    pub fn drain_wait(&self, frames: i64) -> Duration {
        if frames <= 0 || self.period_size == 0 {
            return Duration::ZERO;
        }
        Duration::from_micros(frames as u64 * self.period_time_us() / self.period_size as u64)
    }
}

/// Hardware parameter negotiation steps, in the order they are applied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NegotiationStep {
    Access,
    Format,
    Channels,
    Rate,
    Apply,
    PeriodSize,
}

impl NegotiationStep {
    pub const ALL: [NegotiationStep; 6] = [
        NegotiationStep::Access,
        NegotiationStep::Format,
        NegotiationStep::Channels,
        NegotiationStep::Rate,
        NegotiationStep::Apply,
        NegotiationStep::PeriodSize,
    ];
}

impl fmt::Display for NegotiationStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NegotiationStep::Access => "interleaved mode",
            NegotiationStep::Format => "format",
            NegotiationStep::Channels => "channels number",
            NegotiationStep::Rate => "rate",
            NegotiationStep::Apply => "hardware parameters",
            NegotiationStep::PeriodSize => "period size",
        };
        f.write_str(name)
    }
}

/// Outcome of a failed period write
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteError {
    /// The device ran out of queued audio; prepare and keep going
    Underrun,
    Failed(String),
}

/// A device that can open playback streams
pub trait PcmBackend {
    type Stream: PcmStream;

    /// Open a non-blocking playback stream on `device`
    fn open_playback(&self, device: &str) -> Result<Self::Stream, FeedbackError>;
}

/// An open playback stream; closed on drop
pub trait PcmStream {
    /// Apply hardware parameters, stopping at the first step that fails
    fn negotiate(&mut self, params: &StreamParams) -> Result<HwConfig, FeedbackError>;

    /// Write interleaved frames; returns the number of frames written
    fn write_frames(&mut self, buf: &[u8]) -> Result<usize, WriteError>;

    fn prepare(&mut self) -> Result<(), FeedbackError>;

    /// Frames queued but not yet played
    fn delay(&mut self) -> Result<i64, FeedbackError>;

    fn drain(&mut self) -> Result<(), FeedbackError>;
}

/// What a playback run did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlaybackReport {
    pub periods: u64,
    pub underruns: u32,
    pub write_errors: u32,
}

/// Plays the feedback sample through a [`PcmBackend`]
#[derive(Debug, Clone)]
pub struct FeedbackPlayer<P: PcmBackend> {
    backend: P,
    sound: PathBuf,
    device: String,
}

impl<P: PcmBackend> FeedbackPlayer<P> {
    pub fn new(backend: P, sound: impl Into<PathBuf>) -> Self {
        Self {
            backend,
            sound: sound.into(),
            device: "default".to_string(),
        }
    }

    /// Output device name (defaults to "default")
    pub fn with_device(mut self, device: &str) -> Self {
        self.device = device.to_string();
        self
    }

    pub fn sound(&self) -> &Path {
        &self.sound
    }

    pub fn device(&self) -> &str {
        &self.device
    }

    /// Play the sample, reporting success as a bool
    pub fn play_feedback(&self) -> bool {
        match self.play() {
            Ok(report) => {
                tracing::debug!(
                    "Feedback played: {} periods, {} underruns",
                    report.periods,
                    report.underruns
                );
                true
            }
            Err(e) => {
                tracing::error!("Feedback playback failed: {}", e);
                false
            }
        }
    }

    /// Play the sample
    ///
    /// The file is opened before the device, so a missing sample never
    /// touches the audio hardware. Any configuration failure ends the run.
    pub fn play(&self) -> Result<PlaybackReport, FeedbackError> {
        let mut sample = File::open(&self.sound).map_err(|source| FeedbackError::FileUnavailable {
            path: self.sound.clone(),
            source,
        })?;

        let mut stream = self.backend.open_playback(&self.device)?;
        let hw = stream.negotiate(&StreamParams::FEEDBACK)?;

        let period_time = hw.period_time_us();
        if period_time == 0 {
            return Err(FeedbackError::ParameterNegotiationFailed {
                step: NegotiationStep::PeriodSize,
                reason: format!("{} frames at {} Hz", hw.period_size, hw.rate),
            });
        }

        let periods = FEEDBACK_DURATION_US / period_time;
        tracing::debug!(
            "Feedback stream: {} Hz, {} frames per period ({} us), {} periods",
            hw.rate,
            hw.period_size,
            period_time,
            periods
        );

        let mut buffer = vec![0u8; hw.period_size * BYTES_PER_FRAME];
        let mut report = PlaybackReport::default();

        for _ in 0..periods {
            fill_period(&mut sample, &mut buffer)?;

            match stream.write_frames(&buffer) {
                Ok(_) => {}
                Err(WriteError::Underrun) => {
                    report.underruns += 1;
                    tracing::warn!("Underrun during feedback playback");
                    if let Err(e) = stream.prepare() {
                        tracing::warn!("Can't prepare playback stream: {}", e);
                    }
                }
                Err(WriteError::Failed(reason)) => {
                    report.write_errors += 1;
                    tracing::warn!("Can't write to playback device: {}", reason);
                }
            }
            report.periods += 1;
        }

        // Let the queued tail play out before closing
        let delay = match stream.delay() {
            Ok(frames) => frames,
            Err(e) => {
                tracing::debug!("Can't query playback delay: {}", e);
                0
            }
        };
        let wait = hw.drain_wait(delay);
        if !wait.is_zero() {
            thread::sleep(wait);
        }
        if let Err(e) = stream.drain() {
            tracing::debug!("Can't drain playback stream: {}", e);
        }

        Ok(report)
    }
}

/// Read one period from `reader`, zero-padding after end of file
fn fill_period<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    buf[filled..].fill(0);
    Ok(filled)
}
