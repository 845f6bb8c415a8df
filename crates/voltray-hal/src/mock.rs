//! Mock implementations for testing without real hardware
//!
//! Simulated mixer cards and playback devices, so the volume core can be
//! developed and tested on machines without ALSA.
//!
//! Mocks share their state through `Arc<RwLock<_>>`: keep a clone (or the
//! [`MockMixer::state`] handle) to simulate external hardware changes and to
//! inspect what the code under test did.
//!
//! # Usage
//!
//! ```no_run
//! use voltray_hal::mock::{MockElement, MockMixer};
//! use voltray_hal::VolumeControl;
//!
//! let card = MockMixer::new()
//!     .with_element(MockElement::new("Master").range(0, 65536).with_switch())
//!     .with_element(MockElement::new("PCM").range(0, 255));
//! let handle = card.clone();
//!
//! let mut control = VolumeControl::setup(card, "default", None, |volume: u8, muted: bool| {
//!     println!("volume {} muted {}", volume, muted);
//! })
//! .unwrap();
//!
//! handle.simulate_volume("Master", 0);
//! control.dispatch_events();
//! ```

use crate::feedback::{HwConfig, NegotiationStep, PcmBackend, PcmStream, StreamParams, WriteError};
use crate::mixer::{ElementId, ElementInfo, MixerBackend};
use crate::{FeedbackError, MixerError};
use std::os::fd::RawFd;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// A simulated simple mixer element
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockElement {
    pub id: ElementId,
    pub has_playback_volume: bool,
    pub range: (i64, i64),
    /// Raw volume per sub-channel
    pub values: Vec<i64>,
    /// Playback switch per sub-channel, if the element has one
    pub switch: Option<Vec<bool>>,
    /// Changed since the last event drain
    pub dirty: bool,
}

impl MockElement {
    /// Mono element with playback volume 0-100, no switch, at its minimum
    pub fn new(name: &str) -> Self {
        Self {
            id: ElementId::new(name, 0),
            has_playback_volume: true,
            range: (0, 100),
            values: vec![0],
            switch: None,
            dirty: false,
        }
    }

    pub fn index(mut self, index: u32) -> Self {
        self.id.index = index;
        self
    }

    /// Native playback range; resets the volume to `min`
    pub fn range(mut self, min: i64, max: i64) -> Self {
        self.range = (min, max);
        self.values.iter_mut().for_each(|v| *v = min);
        self
    }

    /// Number of sub-channels (1 = mono)
    pub fn channels(mut self, count: usize) -> Self {
        let count = count.max(1);
        self.values = vec![self.range.0; count];
        if let Some(switch) = self.switch.as_mut() {
            *switch = vec![true; count];
        }
        self
    }

    /// Add a playback switch, initially on
    pub fn with_switch(mut self) -> Self {
        self.switch = Some(vec![true; self.values.len()]);
        self
    }

    pub fn without_playback_volume(mut self) -> Self {
        self.has_playback_volume = false;
        self
    }
}

/// Shared state behind a [`MockMixer`]
#[derive(Debug, Default)]
pub struct MockMixerState {
    /// Card the mixer is attached to
    pub card: Option<String>,
    /// Cards that can be attached; `None` accepts any name
    pub cards: Option<Vec<String>>,
    pub elements: Vec<MockElement>,
    pub watched: Option<ElementId>,
    /// Every watch/unwatch call, in order
    pub watch_log: Vec<Option<ElementId>>,
    pub descriptors: Vec<RawFd>,
    /// Make the next event drains fail at the transport level
    pub fail_events: bool,
    pub drains: usize,
}

impl MockMixerState {
    pub fn element(&self, name: &str) -> Option<&MockElement> {
        self.elements.iter().find(|e| e.id.name == name)
    }

    fn element_mut(&mut self, name: &str) -> Option<&mut MockElement> {
        self.elements.iter_mut().find(|e| e.id.name == name)
    }

    fn element_by_id(&self, id: &ElementId) -> Result<&MockElement, MixerError> {
        self.elements
            .iter()
            .find(|e| &e.id == id)
            .ok_or_else(|| MixerError::Transport(format!("no element {}", id)))
    }

    fn element_by_id_mut(&mut self, id: &ElementId) -> Result<&mut MockElement, MixerError> {
        self.elements
            .iter_mut()
            .find(|e| &e.id == id)
            .ok_or_else(|| MixerError::Transport(format!("no element {}", id)))
    }
}

/// Simulated mixer card
#[derive(Debug, Clone, Default)]
pub struct MockMixer {
    state: Arc<RwLock<MockMixerState>>,
}

impl MockMixer {
    pub fn new() -> Self {
        Self::default()
    }

    /// A typical laptop codec, for desktop development
    pub fn desktop() -> Self {
        Self::new()
            .with_element(MockElement::new("Master").range(0, 87).channels(2).with_switch())
            .with_element(MockElement::new("Headphone").range(0, 87).channels(2).with_switch())
            .with_element(MockElement::new("Speaker").range(0, 87).channels(2).with_switch())
            .with_element(MockElement::new("PCM").range(0, 255).channels(2))
            .with_element(MockElement::new("Capture").without_playback_volume())
    }

    pub fn with_element(self, element: MockElement) -> Self {
        self.write().elements.push(element);
        self
    }

    /// Restrict the cards `attach` accepts
    pub fn with_cards(self, cards: &[&str]) -> Self {
        self.write().cards = Some(cards.iter().map(|c| c.to_string()).collect());
        self
    }

    pub fn with_descriptors(self, fds: &[RawFd]) -> Self {
        self.write().descriptors = fds.to_vec();
        self
    }

    /// Shared state handle
    pub fn state(&self) -> Arc<RwLock<MockMixerState>> {
        Arc::clone(&self.state)
    }

    fn read(&self) -> RwLockReadGuard<'_, MockMixerState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, MockMixerState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Simulate an external volume change (volume keys, another mixer app)
    pub fn simulate_volume(&self, name: &str, raw: i64) {
        if let Some(elem) = self.write().element_mut(name) {
            elem.values.iter_mut().for_each(|v| *v = raw);
            elem.dirty = true;
        }
    }

    /// Simulate an external switch change
    pub fn simulate_switch(&self, name: &str, on: bool) {
        if let Some(elem) = self.write().element_mut(name) {
            if let Some(switch) = elem.switch.as_mut() {
                switch.iter_mut().for_each(|s| *s = on);
                elem.dirty = true;
            }
        }
    }

    pub fn raw_volume(&self, name: &str) -> Option<i64> {
        self.read().element(name).and_then(|e| e.values.first().copied())
    }
}

impl MixerBackend for MockMixer {
    fn attach(&mut self, card: &str) -> Result<(), MixerError> {
        let mut state = self.write();
        if let Some(current) = &state.card {
            return Err(MixerError::AlreadyOpen(current.clone()));
        }
        if let Some(cards) = &state.cards {
            if !cards.iter().any(|c| c == card) {
                return Err(MixerError::DeviceUnavailable {
                    card: card.to_string(),
                    reason: "No such device".to_string(),
                });
            }
        }

        tracing::debug!("[MOCK] Mixer attached to {}", card);
        state.card = Some(card.to_string());
        Ok(())
    }

    fn elements(&self) -> Result<Vec<ElementInfo>, MixerError> {
        Ok(self
            .read()
            .elements
            .iter()
            .map(|e| ElementInfo {
                id: e.id.clone(),
                has_playback_volume: e.has_playback_volume,
            })
            .collect())
    }

    fn find_element(&self, name: &str) -> Option<ElementId> {
        let id = ElementId::new(name, 0);
        self.read().elements.iter().find(|e| e.id == id).map(|e| e.id.clone())
    }

    fn playback_volume_range(&self, elem: &ElementId) -> Result<(i64, i64), MixerError> {
        self.read().element_by_id(elem).map(|e| e.range)
    }

    fn playback_volume(&self, elem: &ElementId) -> Result<i64, MixerError> {
        let state = self.read();
        let element = state.element_by_id(elem)?;
        element
            .values
            .first()
            .copied()
            .ok_or_else(|| MixerError::Transport(format!("{} has no channels", elem)))
    }

    fn set_playback_volume_all(&mut self, elem: &ElementId, value: i64) -> Result<(), MixerError> {
        let mut state = self.write();
        let element = state.element_by_id_mut(elem)?;
        let (min, max) = element.range;
        let value = value.clamp(min, max);
        element.values.iter_mut().for_each(|v| *v = value);
        element.dirty = true;
        Ok(())
    }

    fn has_playback_switch(&self, elem: &ElementId) -> bool {
        self.read()
            .element_by_id(elem)
            .map(|e| e.switch.is_some())
            .unwrap_or(false)
    }

    fn playback_switch(&self, elem: &ElementId) -> Result<bool, MixerError> {
        let state = self.read();
        let element = state.element_by_id(elem)?;
        element
            .switch
            .as_ref()
            .and_then(|s| s.first().copied())
            .ok_or_else(|| MixerError::Transport(format!("{} has no playback switch", elem)))
    }

    fn set_playback_switch_all(&mut self, elem: &ElementId, on: bool) -> Result<(), MixerError> {
        let mut state = self.write();
        let element = state.element_by_id_mut(elem)?;
        let switch = element
            .switch
            .as_mut()
            .ok_or_else(|| MixerError::Transport(format!("{} has no playback switch", elem)))?;
        switch.iter_mut().for_each(|s| *s = on);
        element.dirty = true;
        Ok(())
    }

    fn watch(&mut self, elem: Option<&ElementId>) {
        let mut state = self.write();
        state.watched = elem.cloned();
        state.watch_log.push(elem.cloned());
    }

    fn poll_descriptors(&self) -> Result<Vec<RawFd>, MixerError> {
        Ok(self.read().descriptors.clone())
    }

    fn handle_events(&mut self) -> Result<Vec<ElementId>, MixerError> {
        let mut state = self.write();
        state.drains += 1;
        if state.fail_events {
            return Err(MixerError::Transport("Input/output error".to_string()));
        }

        let watched = state.watched.clone();
        let mut changed = Vec::new();
        for elem in state.elements.iter_mut().filter(|e| e.dirty) {
            elem.dirty = false;
            if Some(&elem.id) == watched.as_ref() {
                changed.push(elem.id.clone());
            }
        }
        Ok(changed)
    }
}

/// Shared state behind a [`MockPcm`]
#[derive(Debug)]
pub struct MockPcmState {
    /// Devices opened, in order
    pub opened: Vec<String>,
    pub fail_open: bool,
    /// Negotiation step that fails, if any
    pub fail_step: Option<NegotiationStep>,
    /// Negotiation steps performed
    pub steps: Vec<NegotiationStep>,
    /// Rate the device settles on
    pub rate: u32,
    /// Period size in frames
    pub period_size: usize,
    /// Zero-based write calls that report an underrun
    pub underrun_writes: Vec<usize>,
    pub writes: usize,
    pub written: Vec<u8>,
    pub prepares: usize,
    /// Frames still queued when playback ends
    pub delay: i64,
    pub drained: bool,
}

impl Default for MockPcmState {
    fn default() -> Self {
        Self {
            opened: Vec::new(),
            fail_open: false,
            fail_step: None,
            steps: Vec::new(),
            rate: 44100,
            period_size: 441,
            underrun_writes: Vec::new(),
            writes: 0,
            written: Vec::new(),
            prepares: 0,
            delay: 0,
            drained: false,
        }
    }
}

/// Simulated playback device
#[derive(Debug, Clone, Default)]
pub struct MockPcm {
    state: Arc<RwLock<MockPcmState>>,
}

impl MockPcm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> Arc<RwLock<MockPcmState>> {
        Arc::clone(&self.state)
    }

    fn write(&self) -> RwLockWriteGuard<'_, MockPcmState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn with_period(self, rate: u32, period_size: usize) -> Self {
        {
            let mut state = self.write();
            state.rate = rate;
            state.period_size = period_size;
        }
        self
    }

    pub fn failing_at(self, step: NegotiationStep) -> Self {
        self.write().fail_step = Some(step);
        self
    }

    pub fn unavailable(self) -> Self {
        self.write().fail_open = true;
        self
    }

    /// Frames left queued when playback ends
    pub fn with_delay(self, frames: i64) -> Self {
        self.write().delay = frames;
        self
    }

    pub fn underrun_on(self, writes: &[usize]) -> Self {
        self.write().underrun_writes = writes.to_vec();
        self
    }
}

impl PcmBackend for MockPcm {
    type Stream = MockPcmStream;

    fn open_playback(&self, device: &str) -> Result<MockPcmStream, FeedbackError> {
        let mut state = self.write();
        if state.fail_open {
            return Err(FeedbackError::DeviceUnavailable(format!("{}: No such device", device)));
        }
        state.opened.push(device.to_string());
        tracing::debug!("[MOCK] Playback stream opened on {}", device);

        Ok(MockPcmStream {
            state: Arc::clone(&self.state),
        })
    }
}

/// Stream handed out by [`MockPcm`]
#[derive(Debug)]
pub struct MockPcmStream {
    state: Arc<RwLock<MockPcmState>>,
}

impl MockPcmStream {
    fn write(&self) -> RwLockWriteGuard<'_, MockPcmState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl PcmStream for MockPcmStream {
    fn negotiate(&mut self, params: &StreamParams) -> Result<HwConfig, FeedbackError> {
        let mut state = self.write();
        for step in NegotiationStep::ALL {
            state.steps.push(step);
            if state.fail_step == Some(step) {
                return Err(FeedbackError::ParameterNegotiationFailed {
                    step,
                    reason: "Invalid argument".to_string(),
                });
            }
        }

        tracing::debug!(
            "[MOCK] Negotiated {} channels at {} Hz (requested {} Hz)",
            params.channels,
            state.rate,
            params.rate
        );
        Ok(HwConfig {
            rate: state.rate,
            period_size: state.period_size,
        })
    }

    fn write_frames(&mut self, buf: &[u8]) -> Result<usize, WriteError> {
        let mut state = self.write();
        let call = state.writes;
        state.writes += 1;
        if state.underrun_writes.contains(&call) {
            return Err(WriteError::Underrun);
        }
        state.written.extend_from_slice(buf);
        Ok(buf.len() / crate::feedback::BYTES_PER_FRAME)
    }

    fn prepare(&mut self) -> Result<(), FeedbackError> {
        self.write().prepares += 1;
        Ok(())
    }

    fn delay(&mut self) -> Result<i64, FeedbackError> {
        Ok(self.write().delay)
    }

    fn drain(&mut self) -> Result<(), FeedbackError> {
        self.write().drained = true;
        Ok(())
    }
}
