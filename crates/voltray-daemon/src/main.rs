//! voltray daemon
//!
//! Opens the configured mixer card, follows hardware volume changes on the
//! active channel and reacts to signals:
//!
//! - SIGUSR1 / SIGUSR2: volume up / down by the configured step
//! - SIGHUP: toggle mute
//! - SIGTERM / SIGINT: shut down
//!
//! Volume changes made through signals are followed by the feedback sound
//! when it is enabled.

mod host;

use anyhow::{Context, Result, bail};
use clap::Parser;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal::unix::{SignalKind, signal};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use voltray_config::VoltrayConfig;
use voltray_hal::{
    EventBridge, FeedbackPlayer, MixerBackend, PcmBackend, VolumeControl, WatchAction,
};

use crate::host::TokioHost;

#[derive(Parser, Debug, Default, PartialEq, Eq)]
#[command(author, version, about = "Follows the hardware mixer and plays volume feedback", long_about = None)]
struct Args {
    /// Read configuration from FILE
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Mixer card to open (overrides config)
    #[arg(long, value_name = "NAME")]
    card: Option<String>,

    /// Channel to control (overrides config)
    #[arg(long, value_name = "NAME")]
    channel: Option<String>,

    /// Print the current state as JSON and exit
    #[arg(long)]
    status: bool,

    /// Play the feedback sound once and exit
    #[arg(long)]
    feedback: bool,
}

/// Snapshot printed by `--status`
#[derive(Debug, Serialize)]
struct Status<'a> {
    card: &'a str,
    channel: Option<&'a str>,
    channels: &'a [String],
    volume: Option<u8>,
    muted: Option<bool>,
}

/// Requests delivered through signals
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    VolumeUp,
    VolumeDown,
    ToggleMute,
}

/// Outcome of one wait in the main loop
enum Turn {
    Shutdown(&'static str),
    Command(Command),
    Ready(voltray_hal::WatchId, std::io::Result<()>),
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();

    let loaded = match &args.config {
        Some(path) => VoltrayConfig::load(path)
            .with_context(|| format!("Failed to load {}", path.display())),
        None => VoltrayConfig::load_default().context("Failed to load configuration"),
    };

    setup_logging(loaded.as_ref().map(|c| c.log_level.as_str()).unwrap_or("info"));

    let mut config = loaded?;
    if let Some(card) = args.card.clone() {
        config.mixer.card = card;
    }
    if let Some(channel) = args.channel.clone() {
        config.mixer.channel = Some(channel);
    }
    config.validate()?;

    let (mixer, pcm) = backends();
    run(&args, config, mixer, pcm).await
}

/// Setup logging to the console
fn setup_logging(default_level: &str) {
    use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).with_ansi(false))
        .init();
}

#[cfg(feature = "alsa")]
fn backends() -> (voltray_hal::AlsaMixer, voltray_hal::AlsaPcm) {
    (voltray_hal::AlsaMixer::new(), voltray_hal::AlsaPcm)
}

#[cfg(not(feature = "alsa"))]
fn backends() -> (voltray_hal::mock::MockMixer, voltray_hal::mock::MockPcm) {
    warn!("Built without ALSA support, using a simulated mixer");
    (
        voltray_hal::mock::MockMixer::desktop(),
        voltray_hal::mock::MockPcm::new(),
    )
}

async fn run<M, P>(args: &Args, config: VoltrayConfig, mixer: M, pcm: P) -> Result<()>
where
    M: MixerBackend,
    P: PcmBackend + Send + Sync + 'static,
{
    let player = Arc::new(
        FeedbackPlayer::new(pcm, config.feedback.sound.clone()).with_device(&config.feedback.device),
    );

    if args.feedback {
        let handle = tokio::task::spawn_blocking(move || player.play_feedback());
        if !finish_feedback(handle).await {
            bail!("Feedback playback failed");
        }
        return Ok(());
    }

    let mut control = VolumeControl::setup(
        mixer,
        &config.mixer.card,
        config.mixer.channel.as_deref(),
        |volume: u8, muted: bool| {
            info!("Volume {}%{}", volume, if muted { " (muted)" } else { "" });
        },
    )?;

    if args.status {
        let status = Status {
            card: control.session().card(),
            channel: control.channel(),
            channels: control.channel_names(),
            volume: control.volume().ok(),
            muted: control.muted().ok(),
        };
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    let mut host = TokioHost::new();
    let bridge = EventBridge::install(control.session(), &mut host);
    if !bridge.is_installed() {
        warn!("Hardware volume changes will not be followed");
    }

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sighup = signal(SignalKind::hangup())?;
    let mut sigusr1 = signal(SignalKind::user_defined1())?;
    let mut sigusr2 = signal(SignalKind::user_defined2())?;

    let feedback = config.feedback.enabled.then_some(player);
    let mut playing: Option<JoinHandle<bool>> = None;

    info!(
        "voltray running on {} ({})",
        control.session().card(),
        control.channel().unwrap_or("no channel")
    );

    loop {
        let turn = tokio::select! {
            _ = sigterm.recv() => Turn::Shutdown("SIGTERM"),
            _ = sigint.recv() => Turn::Shutdown("SIGINT"),
            _ = sigusr1.recv() => Turn::Command(Command::VolumeUp),
            _ = sigusr2.recv() => Turn::Command(Command::VolumeDown),
            _ = sighup.recv() => Turn::Command(Command::ToggleMute),
            (id, ready) = host.next_ready() => Turn::Ready(id, ready),
        };

        match turn {
            Turn::Shutdown(name) => {
                info!("Received {}, shutting down", name);
                break;
            }
            Turn::Command(command) => {
                if apply(&mut control, command, config.mixer.step) {
                    if let Some(player) = &feedback {
                        start_feedback(player, &mut playing);
                    }
                }
            }
            Turn::Ready(id, Err(e)) => {
                error!("Mixer descriptor failed: {}", e);
                host.unwatch(id);
            }
            Turn::Ready(id, Ok(())) => {
                if bridge.watch_id() != Some(id) {
                    continue;
                }
                if bridge.on_ready(&mut control) == WatchAction::Stop {
                    host.unwatch(id);
                    if host.is_empty() {
                        warn!("Stopped following hardware volume changes");
                    }
                }
            }
        }
    }

    if let Some(handle) = playing.take() {
        finish_feedback(handle).await;
    }
    info!("voltray stopped");
    Ok(())
}

/// Apply a signal request; true when the volume or mute state changed
fn apply<M: MixerBackend>(control: &mut VolumeControl<M>, command: Command, step: u8) -> bool {
    let result = match command {
        Command::VolumeUp => control.volume_up(step).map(|v| debug!("Volume up to {}%", v)),
        Command::VolumeDown => control.volume_down(step).map(|v| debug!("Volume down to {}%", v)),
        Command::ToggleMute => control.toggle_mute().map(|m| debug!("Muted: {}", m)),
    };

    match result {
        Ok(()) => true,
        Err(e) => {
            warn!("Can't apply {:?}: {}", command, e);
            false
        }
    }
}

/// Start the feedback sound unless the previous one is still playing
fn start_feedback<P>(player: &Arc<FeedbackPlayer<P>>, playing: &mut Option<JoinHandle<bool>>)
where
    P: PcmBackend + Send + Sync + 'static,
{
    if playing.as_ref().is_some_and(|h| !h.is_finished()) {
        debug!("Feedback still playing, skipping");
        return;
    }

    let player = Arc::clone(player);
    *playing = Some(tokio::task::spawn_blocking(move || player.play_feedback()));
}

/// Wait for a feedback playback; false when it failed or its task panicked
async fn finish_feedback(handle: JoinHandle<bool>) -> bool {
    match handle.await {
        Ok(played) => played,
        Err(e) => {
            warn!("Feedback task failed: {}", e);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use voltray_hal::mock::{MockElement, MockMixer};

    fn args(list: &[&str]) -> Result<Args, clap::Error> {
        Args::try_parse_from(std::iter::once("voltrayd").chain(list.iter().copied()))
    }

    #[test]
    fn test_parse_args_defaults() {
        assert_eq!(args(&[]).unwrap(), Args::default());
    }

    #[test]
    fn test_parse_args_overrides() {
        let parsed = args(&["-c", "/tmp/v.toml", "--card", "hw:1", "--channel", "PCM", "--status"]).unwrap();
        assert_eq!(parsed.config, Some(PathBuf::from("/tmp/v.toml")));
        assert_eq!(parsed.card.as_deref(), Some("hw:1"));
        assert_eq!(parsed.channel.as_deref(), Some("PCM"));
        assert!(parsed.status);
        assert!(!parsed.feedback);
    }

    #[test]
    fn test_parse_args_help() {
        let err = args(&["--status", "-h"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayHelp);
    }

    #[test]
    fn test_parse_args_errors() {
        assert!(args(&["--card"]).is_err());
        assert!(args(&["--card", "--status"]).is_err());
        assert!(args(&["--volume"]).is_err());
    }

    #[test]
    fn test_args_definition() {
        use clap::CommandFactory;
        Args::command().debug_assert();
    }

    #[test]
    fn test_apply_commands() {
        let card = MockMixer::new().with_element(MockElement::new("Master").with_switch());
        let mut control = VolumeControl::setup(card, "default", None, |_: u8, _: bool| {}).unwrap();
        control.set_volume(50).unwrap();

        assert!(apply(&mut control, Command::VolumeUp, 5));
        assert_eq!(control.volume().unwrap(), 55);

        assert!(apply(&mut control, Command::VolumeDown, 10));
        assert_eq!(control.volume().unwrap(), 45);

        assert!(apply(&mut control, Command::ToggleMute, 5));
        assert!(control.muted().unwrap());
    }

    #[test]
    fn test_apply_without_channel() {
        let card = MockMixer::new().with_element(MockElement::new("Capture").without_playback_volume());
        let mut control = VolumeControl::setup(card, "default", None, |_: u8, _: bool| {}).unwrap();

        assert!(!apply(&mut control, Command::VolumeUp, 5));
    }

    #[test]
    fn test_status_json() {
        let card = MockMixer::new()
            .with_element(MockElement::new("Master").range(0, 100))
            .with_element(MockElement::new("PCM"));
        let mut control = VolumeControl::setup(card, "hw:0", None, |_: u8, _: bool| {}).unwrap();
        control.set_volume(40).unwrap();

        let status = Status {
            card: control.session().card(),
            channel: control.channel(),
            channels: control.channel_names(),
            volume: control.volume().ok(),
            muted: control.muted().ok(),
        };
        let json: serde_json::Value = serde_json::to_value(&status).unwrap();
        assert_eq!(json["card"], "hw:0");
        assert_eq!(json["channel"], "Master");
        assert_eq!(json["channels"], serde_json::json!(["Master", "PCM"]));
        assert_eq!(json["volume"], 40);
        assert_eq!(json["muted"], false);
    }

    #[tokio::test]
    async fn test_finish_feedback_reports_panicked_task() {
        let handle = tokio::task::spawn_blocking(|| -> bool { panic!("playback thread died") });
        assert!(!finish_feedback(handle).await);

        let handle = tokio::task::spawn_blocking(|| true);
        assert!(finish_feedback(handle).await);
    }
}
