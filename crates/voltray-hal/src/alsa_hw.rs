//! ALSA backends
//!
//! [`AlsaMixer`] drives a card's simple mixer and [`AlsaPcm`] opens playback
//! streams, both through alsa-lib.

use crate::feedback::{HwConfig, NegotiationStep, PcmBackend, PcmStream, StreamParams, WriteError};
use crate::mixer::{ElementId, ElementInfo, MixerBackend};
use crate::{FeedbackError, MixerError};
use alsa::mixer::{Mixer, Selem, SelemChannelId, SelemId};
use alsa::pcm::{Access, Format, HwParams, PCM};
use alsa::poll::Descriptors;
use alsa::{Direction, ValueOr};
use std::ffi::CString;
use std::os::fd::RawFd;

/// Volume and switch of the watched element when last seen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ElementState {
    volume: i64,
    switch: Option<bool>,
}

#[derive(Debug)]
struct Watched {
    id: ElementId,
    last: Option<ElementState>,
}

/// Simple mixer on one ALSA card
#[derive(Debug, Default)]
pub struct AlsaMixer {
    mixer: Option<Mixer>,
    watched: Option<Watched>,
}

fn transport(e: alsa::Error) -> MixerError {
    MixerError::Transport(e.to_string())
}

impl AlsaMixer {
    pub fn new() -> Self {
        Self::default()
    }

    fn mixer(&self) -> Result<&Mixer, MixerError> {
        self.mixer
            .as_ref()
            .ok_or_else(|| MixerError::Transport("mixer not attached".to_string()))
    }

    fn selem(&self, id: &ElementId) -> Result<Selem<'_>, MixerError> {
        let sid = SelemId::new(&id.name, id.index);
        self.mixer()?
            .find_selem(&sid)
            .ok_or_else(|| MixerError::Transport(format!("element {} disappeared", id)))
    }

    fn read_state(&self, id: &ElementId) -> Result<ElementState, MixerError> {
        let selem = self.selem(id)?;
        let volume = selem.get_playback_volume(SelemChannelId::mono()).map_err(transport)?;
        let switch = if selem.has_playback_switch() {
            Some(selem.get_playback_switch(SelemChannelId::mono()).map_err(transport)? != 0)
        } else {
            None
        };
        Ok(ElementState { volume, switch })
    }
}

impl MixerBackend for AlsaMixer {
    fn attach(&mut self, card: &str) -> Result<(), MixerError> {
        if self.mixer.is_some() {
            return Err(MixerError::AlreadyOpen(card.to_string()));
        }

        let unavailable = |e: alsa::Error| MixerError::DeviceUnavailable {
            card: card.to_string(),
            reason: e.to_string(),
        };
        let name = CString::new(card).map_err(|_| MixerError::DeviceUnavailable {
            card: card.to_string(),
            reason: "card name contains a NUL byte".to_string(),
        })?;

        let mut mixer = Mixer::open(false).map_err(unavailable)?;
        mixer.attach(&name).map_err(unavailable)?;
        Selem::register(&mut mixer).map_err(unavailable)?;
        mixer.load().map_err(unavailable)?;

        self.mixer = Some(mixer);
        Ok(())
    }

    fn elements(&self) -> Result<Vec<ElementInfo>, MixerError> {
        let mut elements = Vec::new();
        for elem in self.mixer()?.iter() {
            let Some(selem) = Selem::new(elem) else {
                continue;
            };
            let sid = selem.get_id();
            let name = sid.get_name().map_err(transport)?;
            elements.push(ElementInfo {
                id: ElementId::new(name, sid.get_index()),
                has_playback_volume: selem.has_playback_volume(),
            });
        }
        Ok(elements)
    }

    fn find_element(&self, name: &str) -> Option<ElementId> {
        let mixer = self.mixer.as_ref()?;
        mixer
            .find_selem(&SelemId::new(name, 0))
            .map(|_| ElementId::new(name, 0))
    }

    fn playback_volume_range(&self, elem: &ElementId) -> Result<(i64, i64), MixerError> {
        Ok(self.selem(elem)?.get_playback_volume_range())
    }

    fn playback_volume(&self, elem: &ElementId) -> Result<i64, MixerError> {
        self.selem(elem)?
            .get_playback_volume(SelemChannelId::mono())
            .map_err(transport)
    }

    fn set_playback_volume_all(&mut self, elem: &ElementId, value: i64) -> Result<(), MixerError> {
        self.selem(elem)?.set_playback_volume_all(value).map_err(transport)
    }

    fn has_playback_switch(&self, elem: &ElementId) -> bool {
        self.selem(elem).map(|s| s.has_playback_switch()).unwrap_or(false)
    }

    fn playback_switch(&self, elem: &ElementId) -> Result<bool, MixerError> {
        self.selem(elem)?
            .get_playback_switch(SelemChannelId::mono())
            .map(|s| s != 0)
            .map_err(transport)
    }

    fn set_playback_switch_all(&mut self, elem: &ElementId, on: bool) -> Result<(), MixerError> {
        self.selem(elem)?
            .set_playback_switch_all(on as i32)
            .map_err(transport)
    }

    fn watch(&mut self, elem: Option<&ElementId>) {
        self.watched = elem.map(|id| Watched {
            id: id.clone(),
            last: self.read_state(id).ok(),
        });
    }

    fn poll_descriptors(&self) -> Result<Vec<RawFd>, MixerError> {
        let fds = self.mixer()?.get().map_err(transport)?;
        Ok(fds.into_iter().map(|p| p.fd).collect())
    }

    fn handle_events(&mut self) -> Result<Vec<ElementId>, MixerError> {
        self.mixer()?.handle_events().map_err(transport)?;

        // alsa-rs has no per-element callbacks; compare against the last
        // state seen for the watched element instead.
        let Some(id) = self.watched.as_ref().map(|w| w.id.clone()) else {
            return Ok(Vec::new());
        };
        let current = self.read_state(&id).ok();
        let Some(watched) = self.watched.as_mut() else {
            return Ok(Vec::new());
        };
        if current == watched.last {
            return Ok(Vec::new());
        }
        watched.last = current;
        Ok(vec![id])
    }
}

/// Opens playback streams through alsa-lib
#[derive(Debug, Clone, Copy, Default)]
pub struct AlsaPcm;

impl PcmBackend for AlsaPcm {
    type Stream = AlsaStream;

    fn open_playback(&self, device: &str) -> Result<AlsaStream, FeedbackError> {
        PCM::new(device, Direction::Playback, true)
            .map(|pcm| AlsaStream { pcm })
            .map_err(|e| FeedbackError::DeviceUnavailable(format!("{}: {}", device, e)))
    }
}

pub struct AlsaStream {
    pcm: PCM,
}

fn negotiation(step: NegotiationStep) -> impl Fn(alsa::Error) -> FeedbackError {
    move |e| FeedbackError::ParameterNegotiationFailed {
        step,
        reason: e.to_string(),
    }
}

impl PcmStream for AlsaStream {
    fn negotiate(&mut self, params: &StreamParams) -> Result<HwConfig, FeedbackError> {
        let hwp = HwParams::any(&self.pcm).map_err(negotiation(NegotiationStep::Apply))?;

        hwp.set_access(Access::RWInterleaved)
            .map_err(negotiation(NegotiationStep::Access))?;
        hwp.set_format(Format::S16LE)
            .map_err(negotiation(NegotiationStep::Format))?;
        hwp.set_channels(params.channels)
            .map_err(negotiation(NegotiationStep::Channels))?;
        let rate = hwp
            .set_rate_near(params.rate, ValueOr::Nearest)
            .map_err(negotiation(NegotiationStep::Rate))?;
        self.pcm
            .hw_params(&hwp)
            .map_err(negotiation(NegotiationStep::Apply))?;

        let period_size = hwp
            .get_period_size()
            .map_err(negotiation(NegotiationStep::PeriodSize))?;

        Ok(HwConfig {
            rate,
            period_size: period_size.max(0) as usize,
        })
    }

    fn write_frames(&mut self, buf: &[u8]) -> Result<usize, WriteError> {
        self.pcm.io_bytes().writei(buf).map_err(|e| {
            if e.errno() == libc::EPIPE {
                WriteError::Underrun
            } else {
                WriteError::Failed(e.to_string())
            }
        })
    }

    fn prepare(&mut self) -> Result<(), FeedbackError> {
        self.pcm
            .prepare()
            .map_err(|e| FeedbackError::DeviceUnavailable(e.to_string()))
    }

    fn delay(&mut self) -> Result<i64, FeedbackError> {
        self.pcm
            .delay()
            .map(|frames| frames as i64)
            .map_err(|e| FeedbackError::DeviceUnavailable(e.to_string()))
    }

    fn drain(&mut self) -> Result<(), FeedbackError> {
        self.pcm
            .drain()
            .map_err(|e| FeedbackError::DeviceUnavailable(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Streams on alsa-lib's "null" device, when the host configuration has it
    fn null_stream() -> Option<AlsaStream> {
        AlsaPcm.open_playback("null").ok()
    }

    #[test]
    fn test_null_device_accepts_repeated_writes() {
        let Some(mut stream) = null_stream() else {
            return;
        };
        let Ok(hw) = stream.negotiate(&StreamParams::FEEDBACK) else {
            return;
        };
        assert!(hw.period_size > 0);

        let period = vec![0u8; hw.period_size * crate::feedback::BYTES_PER_FRAME];
        // Each write takes and releases its own IO handle
        for _ in 0..3 {
            let _ = stream.write_frames(&period);
        }
        stream.drain().ok();
    }

    #[test]
    fn test_open_unknown_device() {
        assert!(matches!(
            AlsaPcm.open_playback("voltray_no_such_device"),
            Err(FeedbackError::DeviceUnavailable(_))
        ));
    }
}
