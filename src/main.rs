//! `loop-audio`: play a WAV file (or a directory of them) to an output
//! device, looping gaplessly until interrupted.
//!
//! ```bash
//! loop-audio --file drums.wav --chunk-length 512 --format 16
//! loop-audio --list-devices
//! ```

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{bail, Context};
use clap::Parser;
use loop_audio::backend::CpalBackend;
use loop_audio::format::amplitude_to_db;
use loop_audio::source::{LoopingSource, Playlist, WavSource};
use loop_audio::{
    event_callback, list_output_devices, AudioDevice, CancelToken, DeviceConfig, DeviceSelection,
    Direction, EventCallback, FrameSource, PlaybackConfig, PlaybackEvent, PlaybackReport, Player,
    SampleEncoding, DEFAULT_CHUNK_FRAMES, DEFAULT_RING_CHUNKS,
};

/// Gapless WAV looper
#[derive(Parser, Debug)]
#[command(name = "loop-audio", version)]
#[command(about = "Loop a WAV file or directory of WAV files to an audio output device")]
struct Args {
    /// WAV file, or directory whose .wav files are played in order
    #[arg(short, long, value_name = "PATH", required_unless_present = "list_devices")]
    file: Option<PathBuf>,

    /// Output device index (see --list-devices); the system default if omitted
    #[arg(long, value_name = "INDEX")]
    output_device: Option<usize>,

    /// Frames per chunk
    #[arg(long, value_name = "FRAMES", default_value_t = DEFAULT_CHUNK_FRAMES)]
    chunk_length: usize,

    /// Ring buffer length in frames (default: 8 chunks; at least 2 chunks)
    #[arg(long, value_name = "FRAMES")]
    rb_length: Option<usize>,

    /// Device sample format: 8, 16, 32 or f32
    #[arg(long, default_value_t = SampleEncoding::Float32)]
    format: SampleEncoding,

    /// Output channels (clamped to what the device supports)
    #[arg(long, default_value_t = 2)]
    channels: u16,

    /// Play once instead of looping
    #[arg(long)]
    no_loop: bool,

    /// Open and describe the source, then exit without playing
    #[arg(long)]
    load_only: bool,

    /// List output devices and exit
    #[arg(long)]
    list_devices: bool,

    /// Debug-level logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Error: failed to start runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(args)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> anyhow::Result<()> {
    if args.list_devices {
        return print_devices();
    }

    let path = args.file.clone().context("--file is required")?;
    let source = open_source(&path)?;
    println!(
        "{}: {}Hz, {} channels, {:.1}s",
        path.display(),
        source.sample_rate(),
        source.channels(),
        source.duration().as_secs_f64()
    );
    if args.load_only {
        return Ok(());
    }

    let chunk_frames = args.chunk_length;
    let ring_frames = match args.rb_length {
        Some(frames) => frames,
        None => chunk_frames
            .checked_mul(DEFAULT_RING_CHUNKS)
            .context("--chunk-length is too large")?,
    };
    let device_config = DeviceConfig {
        sample_rate: source.sample_rate(),
        channels: args.channels,
        encoding: args.format,
        direction: Direction::Output,
        device: args
            .output_device
            .map_or(DeviceSelection::SystemDefault, DeviceSelection::Index),
        chunk_frames,
        ring_frames,
    };
    device_config.validate()?;
    let playback_config = PlaybackConfig {
        chunk_frames,
        no_loop: args.no_loop,
        ..Default::default()
    };

    let cancel = CancelToken::new();
    let signal_token = cancel.clone();
    tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            if !signal_token.is_cancelled() {
                eprintln!("\nStopping; press Ctrl+C again to skip draining");
            }
            signal_token.cancel();
        }
    });

    let report = tokio::task::spawn_blocking(move || {
        play(device_config, playback_config, source, &cancel)
    })
    .await
    .context("playback thread panicked")??;

    println!();
    println!(
        "{} frames written, {} loops, {} underrun frames{}",
        report.frames_written,
        report.loops,
        report.stats.underrun_frames,
        if report.interrupted { " (interrupted)" } else { "" }
    );
    Ok(())
}

fn open_source(path: &Path) -> anyhow::Result<Box<dyn FrameSource + Send>> {
    if path.is_dir() {
        let playlist = Playlist::from_dir(path)
            .with_context(|| format!("failed to load playlist {}", path.display()))?;
        Ok(Box::new(playlist))
    } else {
        let source = WavSource::open(path)
            .with_context(|| format!("failed to open {}", path.display()))?;
        Ok(Box::new(source))
    }
}

fn play(
    device_config: DeviceConfig,
    playback_config: PlaybackConfig,
    source: Box<dyn FrameSource + Send>,
    cancel: &CancelToken,
) -> anyhow::Result<PlaybackReport> {
    let mut device = AudioDevice::open(Box::new(CpalBackend::new()), device_config);
    if !device.is_device_available() {
        match device.status() {
            Some(e) => bail!("output device not available: {e}"),
            None => bail!("output device not available"),
        }
    }
    if device.channel_count() != device.requested_channels() {
        println!(
            "{} supports {} channels ({} requested)",
            device.name(),
            device.channel_count(),
            device.requested_channels()
        );
    }
    println!(
        "Playing on {} ({} encoding, {} frame chunks). Press Ctrl+C to stop.",
        device.name(),
        device.encoding(),
        device.chunk_frames()
    );

    let mut source = LoopingSource::new(source);
    let report = Player::new(playback_config)
        .with_event_callback(status_line())
        .run(&mut device, &mut source, cancel)?;
    Ok(report)
}

/// Prints a single, continuously overwritten status line.
fn status_line() -> EventCallback {
    event_callback(|event| {
        let mut out = std::io::stdout();
        match event {
            PlaybackEvent::Progress {
                buffered_frames,
                capacity_frames,
                callback_frames,
                position_frames,
                total_frames,
                peak,
                ..
            } => {
                let fill = buffered_frames * 20 / capacity_frames.max(1);
                let _ = write!(
                    out,
                    "\r[{:<20}] {:>9}/{:<9} peak {:>6.1} dBFS  cb {:>5}",
                    "#".repeat(fill),
                    position_frames,
                    total_frames,
                    amplitude_to_db(peak).max(-99.9),
                    callback_frames
                );
            }
            PlaybackEvent::Looped { count } => {
                tracing::debug!("Loop {}", count);
            }
            PlaybackEvent::WriteTimeout { waited } => {
                let _ = write!(out, "\rdevice stalled for {waited:?}");
            }
            PlaybackEvent::Draining { buffered_frames } => {
                let _ = write!(out, "\rdraining {buffered_frames} frames...");
            }
            _ => {}
        }
        let _ = out.flush();
    })
}

fn print_devices() -> anyhow::Result<()> {
    let devices = list_output_devices().context("failed to enumerate devices")?;
    if devices.is_empty() {
        println!("No output devices found");
        return Ok(());
    }
    for device in devices {
        let index = device
            .index
            .map_or_else(|| "-".to_string(), |i| i.to_string());
        let rate = device
            .default_sample_rate
            .map_or_else(|| "?".to_string(), |r| format!("{r}Hz"));
        let latency = device.latency.map_or_else(
            || "latency unknown".to_string(),
            |(low, high)| format!("latency {:.1}-{:.1}ms", low.as_secs_f64() * 1e3, high.as_secs_f64() * 1e3),
        );
        println!(
            "{index:>3}: {} ({} out / {} in, {rate}, {latency})",
            device.name, device.max_output_channels, device.max_input_channels
        );
    }
    Ok(())
}
