//! Integration tests for volume control against simulated cards

use std::cell::RefCell;
use std::io::Write;
use std::os::fd::RawFd;
use std::rc::Rc;

use tempfile::NamedTempFile;
use voltray_hal::mock::{MockElement, MockMixer, MockPcm};
use voltray_hal::{
    BindOutcome, EventBridge, FeedbackPlayer, MixerError, ReadinessHost, VolumeControl, WatchAction,
    WatchId,
};

type Notifications = Rc<RefCell<Vec<(u8, bool)>>>;

/// Host loop stand-in that records registrations
#[derive(Default)]
struct TestLoop {
    watched: Vec<RawFd>,
}

impl ReadinessHost for TestLoop {
    fn watch_readable(&mut self, fd: RawFd) -> std::io::Result<WatchId> {
        self.watched.push(fd);
        Ok(WatchId(fd as u64))
    }
}

fn recorder() -> (Notifications, impl FnMut(u8, bool) + 'static) {
    let seen: Notifications = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&seen);
    (seen, move |volume: u8, muted: bool| sink.borrow_mut().push((volume, muted)))
}

fn within(expected: u8, actual: u8, tolerance: u8) -> bool {
    actual <= expected && expected - actual <= tolerance
}

#[test]
fn test_end_to_end_hardware_change() {
    let card = MockMixer::new()
        .with_element(MockElement::new("Master").range(0, 65536))
        .with_element(MockElement::new("PCM").range(0, 255))
        .with_descriptors(&[42]);
    let hardware = card.clone();
    let (seen, listener) = recorder();

    let mut control = VolumeControl::setup(card, "default", None, listener).unwrap();
    assert_eq!(control.channel(), Some("Master"));
    assert_eq!(control.channel_names(), ["Master", "PCM"]);

    let mut host = TestLoop::default();
    let bridge = EventBridge::install(control.session(), &mut host);
    assert_eq!(host.watched, vec![42]);

    control.set_volume(50).unwrap();
    assert_eq!(hardware.raw_volume("Master"), Some(32768));
    assert_eq!(control.volume().unwrap(), 50);

    hardware.simulate_volume("Master", 0);
    assert_eq!(bridge.on_ready(&mut control), WatchAction::Continue);
    assert_eq!(seen.borrow().last(), Some(&(0, false)));
    assert_eq!(seen.borrow().len(), 1);
}

#[test]
fn test_set_then_get_narrow_range() {
    // 31 steps: one native step is worth more than one percent
    let card = MockMixer::new().with_element(MockElement::new("Master").range(0, 31));
    let mut control = VolumeControl::setup(card, "default", None, |_: u8, _: bool| {}).unwrap();

    for v in [0u8, 1, 50, 99, 100] {
        control.set_volume(v).unwrap();
        let got = control.volume().unwrap();
        assert!(within(v, got, 4), "set {} got {}", v, got);
    }
    control.set_volume(100).unwrap();
    assert_eq!(control.volume().unwrap(), 100);
    control.set_volume(0).unwrap();
    assert_eq!(control.volume().unwrap(), 0);
}

#[test]
fn test_set_then_get_wide_range() {
    let card = MockMixer::new().with_element(MockElement::new("Master").range(0, 65536));
    let mut control = VolumeControl::setup(card, "default", None, |_: u8, _: bool| {}).unwrap();

    for v in [0u8, 1, 50, 99, 100] {
        control.set_volume(v).unwrap();
        let got = control.volume().unwrap();
        assert!(within(v, got, 1), "set {} got {}", v, got);
    }
}

#[test]
fn test_set_then_get_negative_range() {
    let card = MockMixer::new().with_element(MockElement::new("Digital").range(-10239, 400));
    let mut control = VolumeControl::setup(card, "default", None, |_: u8, _: bool| {}).unwrap();

    for v in [0u8, 1, 50, 99, 100] {
        control.set_volume(v).unwrap();
        assert!(within(v, control.volume().unwrap(), 1));
    }
}

#[test]
fn test_switch_to_current_channel_is_noop() {
    let card = MockMixer::new()
        .with_element(MockElement::new("Master"))
        .with_element(MockElement::new("PCM"));
    let state = card.state();
    let mut control = VolumeControl::setup(card, "default", Some("PCM"), |_: u8, _: bool| {}).unwrap();
    let watches = state.read().unwrap().watch_log.len();

    assert_eq!(control.set_channel("PCM"), BindOutcome::Unchanged);
    assert_eq!(state.read().unwrap().watch_log.len(), watches);
    assert_eq!(control.channel(), Some("PCM"));
}

#[test]
fn test_switch_to_unknown_channel() {
    let card = MockMixer::new()
        .with_element(MockElement::new("Master"))
        .with_element(MockElement::new("PCM"));
    let state = card.state();
    let mut control = VolumeControl::setup(card, "default", None, |_: u8, _: bool| {}).unwrap();

    assert_eq!(control.set_channel("Surround"), BindOutcome::NotFound);
    assert_eq!(control.channel(), Some("Surround"));
    assert_eq!(state.read().unwrap().watched, None);

    let err = control.volume().unwrap_err();
    assert!(matches!(err, MixerError::NoChannelBound));
    assert!(control.muted().unwrap_err().is_contract_violation());
    assert!(control.set_volume(10).unwrap_err().is_contract_violation());
    assert!(control.set_muted(true).unwrap_err().is_contract_violation());

    // A valid channel recovers the binding
    assert_eq!(control.set_channel("PCM"), BindOutcome::Bound);
    assert!(control.volume().is_ok());
}

#[test]
fn test_mute_without_switch_known_gap() {
    let card = MockMixer::new().with_element(MockElement::new("PCM").range(0, 255));
    let mut control = VolumeControl::setup(card, "default", None, |_: u8, _: bool| {}).unwrap();

    control.set_volume(60).unwrap();
    control.set_muted(true).unwrap();
    assert_eq!(control.volume().unwrap(), 0);
    assert!(!control.muted().unwrap());

    // Known gap: unmute cannot restore the volume without a switch
    control.set_muted(false).unwrap();
    assert_eq!(control.volume().unwrap(), 0);
}

#[test]
fn test_mute_with_switch_keeps_volume() {
    let card = MockMixer::new().with_element(MockElement::new("Master").range(0, 87).channels(2).with_switch());
    let hardware = card.clone();
    let (seen, listener) = recorder();
    let mut control = VolumeControl::setup(card, "default", None, listener).unwrap();

    control.set_volume(80).unwrap();
    control.set_muted(true).unwrap();
    assert!(control.muted().unwrap());

    control.dispatch_events();
    let volume = control.volume().unwrap();
    assert_eq!(*seen.borrow(), vec![(volume, true)]);

    control.set_muted(false).unwrap();
    assert_eq!(control.volume().unwrap(), volume);
    assert_eq!(
        hardware.state().read().unwrap().element("Master").unwrap().switch,
        Some(vec![true, true])
    );
}

#[test]
fn test_enumeration_order_with_duplicates() {
    let card = MockMixer::new()
        .with_element(MockElement::new("Speaker"))
        .with_element(MockElement::new("Mic").without_playback_volume())
        .with_element(MockElement::new("Headphone"))
        .with_element(MockElement::new("Speaker").index(1))
        .with_element(MockElement::new("Beep"));
    let control = VolumeControl::setup(card, "default", None, |_: u8, _: bool| {}).unwrap();

    assert_eq!(control.channel_names(), ["Speaker", "Headphone", "Speaker", "Beep"]);
}

#[test]
fn test_rebinding_moves_notifications() {
    let card = MockMixer::new()
        .with_element(MockElement::new("Master"))
        .with_element(MockElement::new("PCM"));
    let hardware = card.clone();
    let (seen, listener) = recorder();
    let mut control = VolumeControl::setup(card, "default", None, listener).unwrap();

    control.set_channel("PCM");
    hardware.simulate_volume("Master", 70);
    control.dispatch_events();
    assert!(seen.borrow().is_empty());

    hardware.simulate_volume("PCM", 25);
    control.dispatch_events();
    assert_eq!(*seen.borrow(), vec![(25, false)]);
}

#[test]
fn test_rapid_changes_are_coalesced() {
    let card = MockMixer::new().with_element(MockElement::new("Master"));
    let hardware = card.clone();
    let (seen, listener) = recorder();
    let mut control = VolumeControl::setup(card, "default", None, listener).unwrap();

    hardware.simulate_volume("Master", 10);
    hardware.simulate_volume("Master", 20);
    hardware.simulate_volume("Master", 30);
    control.dispatch_events();

    assert_eq!(*seen.borrow(), vec![(30, false)]);
}

#[test]
fn test_drain_failure_stops_watch() {
    let card = MockMixer::new()
        .with_element(MockElement::new("Master"))
        .with_descriptors(&[9]);
    let state = card.state();
    let (seen, listener) = recorder();
    let mut control = VolumeControl::setup(card, "default", None, listener).unwrap();
    let mut host = TestLoop::default();
    let bridge = EventBridge::install(control.session(), &mut host);

    state.write().unwrap().fail_events = true;
    assert_eq!(bridge.on_ready(&mut control), WatchAction::Stop);
    assert!(seen.borrow().is_empty());
}

#[test]
fn test_device_without_descriptors_skips_bridge() {
    let card = MockMixer::new().with_element(MockElement::new("Master"));
    let control = VolumeControl::setup(card, "default", None, |_: u8, _: bool| {}).unwrap();
    let mut host = TestLoop::default();

    let bridge = EventBridge::install(control.session(), &mut host);
    assert!(!bridge.is_installed());
    assert!(host.watched.is_empty());
}

#[test]
fn test_setup_on_missing_card() {
    let card = MockMixer::new().with_cards(&["hw:0"]);
    let result = VolumeControl::setup(card, "hw:3", None, |_: u8, _: bool| {});
    assert!(matches!(result, Err(MixerError::DeviceUnavailable { .. })));
}

#[test]
fn test_feedback_missing_sample() {
    let pcm = MockPcm::new();
    let player = FeedbackPlayer::new(pcm.clone(), "/nonexistent/sounds/beep.wav");

    assert!(!player.play_feedback());
    assert!(pcm.state().read().unwrap().opened.is_empty());
}

#[test]
fn test_feedback_independent_of_mixer() {
    let card = MockMixer::new().with_element(MockElement::new("Master"));
    let mut control = VolumeControl::setup(card, "default", None, |_: u8, _: bool| {}).unwrap();

    let mut sample = NamedTempFile::new().unwrap();
    sample.write_all(&[0x10; 4096]).unwrap();
    let player = FeedbackPlayer::new(MockPcm::new(), sample.path());

    control.set_volume(35).unwrap();
    assert!(player.play_feedback());
    assert_eq!(control.volume().unwrap(), 35);
}
