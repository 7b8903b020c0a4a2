//! Integration tests for loop-audio.
//!
//! The mock backend stands in for hardware: tests either run callbacks by
//! hand through a `MockHandle` or let its clock thread play the stream.
//! Tests that require actual audio hardware are marked with `#[ignore]` and
//! should be run manually.

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use loop_audio::backend::{CpalBackend, MockBackend};
use loop_audio::source::{LoopingSource, MockSource, Playlist, WavSource};
use loop_audio::{
    event_callback, AudioDevice, AudioError, CancelToken, DeviceConfig, DeviceState, Direction,
    FrameSource, PlaybackConfig, PlaybackEvent, Player, SampleEncoding,
};
use parking_lot::Mutex;

fn open(backend: MockBackend, config: DeviceConfig) -> AudioDevice {
    let device = AudioDevice::open(Box::new(backend), config);
    assert!(device.is_device_available(), "{:?}", device.status());
    device
}

fn config(chunk_frames: usize, ring_frames: usize) -> DeviceConfig {
    DeviceConfig {
        sample_rate: 1000,
        chunk_frames,
        ring_frames,
        ..Default::default()
    }
}

fn playback(chunk_frames: usize, no_loop: bool) -> PlaybackConfig {
    PlaybackConfig {
        chunk_frames,
        no_loop,
        write_timeout: Duration::from_millis(50),
        drain_poll: Duration::from_millis(5),
        prime_with_silence: true,
    }
}

fn write_wav(path: &Path, channels: u16, samples: &[i16]) {
    let spec = hound::WavSpec {
        channels,
        sample_rate: 1000,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec).unwrap();
    for &s in samples {
        writer.write_sample(s).unwrap();
    }
    writer.finalize().unwrap();
}

fn audible(samples: Vec<f32>) -> Vec<f32> {
    samples.into_iter().filter(|&s| s != 0.0).collect()
}

#[test]
fn test_ramp_plays_then_silence() {
    let backend = MockBackend::new();
    let hardware = backend.handle();
    let mut device = open(backend, config(512, 1024));
    device.start().unwrap();

    let ramp: Vec<f32> = (0..512)
        .flat_map(|i| {
            let v = i as f32 / 512.0;
            [v, v]
        })
        .collect();
    assert_eq!(device.write(&ramp).unwrap(), 512);
    assert_eq!(device.buffered_frames(), 512);

    let first = hardware.render::<f32>(512).unwrap();
    assert_eq!(first, ramp);
    assert_eq!(device.buffered_frames(), 0);

    let second = hardware.render::<f32>(512).unwrap();
    assert!(second.iter().all(|&s| s == 0.0));
    assert_eq!(device.buffered_frames(), 0);

    let stats = device.stats();
    assert_eq!(stats.frames_transferred, 512);
    assert_eq!(stats.underrun_frames, 512);
    assert_eq!(device.callback_frame_count(), 512);
}

#[test]
fn test_blocking_write_times_out_without_consumer() {
    let mut device = open(MockBackend::new(), config(50, 100));
    device.start().unwrap();
    assert_eq!(device.write(&[0.1; 100]).unwrap(), 50);
    assert_eq!(device.free_frames(), 50);

    let timeout = Duration::from_millis(10);
    let begun = Instant::now();
    let err = device.blocking_write(&[0.2; 200], timeout).unwrap_err();
    let elapsed = begun.elapsed();

    assert!(err.is_timeout(), "{err}");
    assert!(elapsed >= timeout, "returned after {elapsed:?}");
    assert!(elapsed < Duration::from_secs(1), "returned after {elapsed:?}");
    assert_eq!(device.buffered_frames(), 50);
}

#[test]
fn test_blocking_write_resumes_when_consumer_frees_room() {
    let backend = MockBackend::new();
    let hardware = backend.handle();
    let mut device = open(backend, config(50, 100));
    device.start().unwrap();
    device.write(&[0.1; 200]).unwrap();

    let consumer = std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(5));
        hardware.render::<f32>(60).unwrap()
    });
    let written = device
        .blocking_write(&[0.2; 100], Duration::from_secs(1))
        .unwrap();
    assert_eq!(written, 50);
    assert_eq!(device.buffered_frames(), 90);

    let played = consumer.join().unwrap();
    assert!(played.iter().all(|&s| s == 0.1));
}

#[test]
fn test_blocking_write_needs_more_room_than_the_chunk() {
    let backend = MockBackend::new();
    let hardware = backend.handle();
    let mut device = open(backend, config(4, 16));
    device.start().unwrap();
    assert_eq!(device.write(&[0.1; 24]).unwrap(), 12);
    assert_eq!(device.free_frames(), 4);

    let err = device
        .blocking_write(&[0.2; 8], Duration::from_millis(10))
        .unwrap_err();
    assert!(err.is_timeout(), "{err}");
    assert_eq!(device.buffered_frames(), 12);

    hardware.render::<f32>(1).unwrap();
    let written = device
        .blocking_write(&[0.2; 8], Duration::from_millis(10))
        .unwrap();
    assert_eq!(written, 4);
    assert_eq!(device.buffered_frames(), 15);
}

#[test]
fn test_pause_keeps_buffered_audio() {
    let backend = MockBackend::new();
    let hardware = backend.handle();
    let mut device = open(backend, config(4, 16));
    device.start().unwrap();
    device.write(&[0.5; 16]).unwrap();

    device.pause().unwrap();
    assert!(device.is_paused());
    let silent = hardware.render::<f32>(4).unwrap();
    assert!(silent.iter().all(|&s| s == 0.0));
    assert_eq!(device.buffered_frames(), 8);

    device.resume().unwrap();
    let out = hardware.render::<f32>(4).unwrap();
    assert_eq!(out, vec![0.5; 8]);
    assert_eq!(device.buffered_frames(), 4);
    assert_eq!(device.stats().underrun_frames, 0);
}

#[test]
fn test_lifecycle_calls_are_idempotent() {
    let backend = MockBackend::new();
    let hardware = backend.handle();
    let mut device = open(backend, config(4, 16));
    assert_eq!(device.state(), DeviceState::Opened);

    device.start().unwrap();
    device.start().unwrap();
    assert_eq!(hardware.start_count(), 1);

    device.pause().unwrap();
    device.pause().unwrap();
    assert_eq!(device.state(), DeviceState::Paused);
    device.resume().unwrap();
    device.resume().unwrap();
    assert_eq!(device.state(), DeviceState::Started);

    device.stop().unwrap();
    device.stop().unwrap();
    assert_eq!(hardware.stop_count(), 1);
    assert!(matches!(
        device.pause(),
        Err(AudioError::InvalidState { state: "stopped", .. })
    ));

    device.start().unwrap();
    assert_eq!(hardware.start_count(), 2);

    device.close().unwrap();
    device.close().unwrap();
    assert!(hardware.is_closed());
    assert!(matches!(device.start(), Err(AudioError::InvalidState { .. })));

    device.terminate().unwrap();
    device.terminate().unwrap();
    assert!(hardware.is_terminated());
    assert_eq!(device.state(), DeviceState::Terminated);
}

#[test]
fn test_drop_releases_stream() {
    let backend = MockBackend::new();
    let hardware = backend.handle();
    let mut device = open(backend, config(4, 16));
    device.start().unwrap();
    drop(device);

    assert!(!hardware.is_running());
    assert!(hardware.is_closed());
    assert!(hardware.is_terminated());
}

#[test]
fn test_channel_request_is_clamped() {
    let backend = MockBackend::new().with_max_channels(1);
    let hardware = backend.handle();
    let device = open(backend, config(4, 16));

    assert_eq!(device.requested_channels(), 2);
    assert_eq!(device.channel_count(), 1);
    assert_eq!(device.ring_capacity_cells(), 16);
    assert_eq!(hardware.params().unwrap().channels, 1);
}

#[test]
fn test_device_without_channels_is_unavailable() {
    let device = AudioDevice::open(
        Box::new(MockBackend::new().with_max_channels(0)),
        config(4, 16),
    );
    assert!(!device.is_device_available());
    assert!(matches!(
        device.status(),
        Some(AudioError::DeviceUnavailable { .. })
    ));
}

#[test]
fn test_int16_output_encoding() {
    let backend = MockBackend::new();
    let hardware = backend.handle();
    let mut device = open(
        backend,
        DeviceConfig {
            channels: 1,
            encoding: SampleEncoding::Int16,
            ..config(4, 16)
        },
    );
    device.start().unwrap();
    device.write(&[0.0, 1.0, -1.0, 2.0]).unwrap();

    let out = hardware.render::<i16>(6).unwrap();
    assert_eq!(out, vec![0, 32767, -32767, 32767, 0, 0]);
}

#[test]
fn test_input_capture_reads_back() {
    let backend = MockBackend::new();
    let hardware = backend.handle();
    let mut device = open(
        backend,
        DeviceConfig {
            encoding: SampleEncoding::Int16,
            direction: Direction::Input,
            ..config(4, 8)
        },
    );
    assert!(matches!(
        device.write(&[0.0; 2]),
        Err(AudioError::InvalidState { .. })
    ));

    device.start().unwrap();
    assert_eq!(hardware.capture(&[16384i16, -16384, 8192, -8192]), Some(2));
    assert_eq!(device.buffered_frames(), 2);

    let mut dst = [1.0f32; 6];
    assert_eq!(device.read(&mut dst).unwrap(), 2);
    assert_eq!(dst, [0.5, -0.5, 0.25, -0.25, 0.0, 0.0]);
    assert_eq!(device.buffered_frames(), 0);
}

#[test]
fn test_player_loops_gaplessly_until_cancelled() {
    let backend = MockBackend::new().with_clock(Duration::from_millis(1));
    let hardware = backend.handle();
    let mut device = open(backend, config(8, 32));

    let pattern: Vec<f32> = (1..=11).map(|i| i as f32 * 0.05).collect();
    let mut mock = MockSource::new(1000, 1);
    mock.add_samples(&pattern);
    let mut source = LoopingSource::new(mock);

    let cancel = CancelToken::new();
    let token = cancel.clone();
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&events);
    let player = Player::new(playback(8, false)).with_event_callback(event_callback(move |e| {
        if let PlaybackEvent::Looped { count } = e {
            if count >= 3 {
                token.cancel();
            }
        }
        sink.lock().push(e);
    }));

    let report = player.run(&mut device, &mut source, &cancel).unwrap();
    assert!(report.interrupted);
    assert!(report.loops >= 3);
    assert!(report.drained);
    assert_eq!(report.frames_written % 8, 0);

    // Mono source on a stereo device: both channels carry the pattern.
    let played = audible(hardware.played());
    assert_eq!(played.len() as u64, report.frames_written * 2);
    for (i, frame) in played.chunks(2).enumerate() {
        assert_eq!(frame[0], pattern[i % pattern.len()], "frame {i}");
        assert_eq!(frame[1], frame[0]);
    }

    let events = events.lock();
    assert!(events.iter().any(|e| matches!(e, PlaybackEvent::Progress { .. })));
    assert!(matches!(events.last(), Some(PlaybackEvent::Interrupted)));
}

#[test]
fn test_wav_file_plays_once() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tone.wav");
    let samples: Vec<i16> = (1..=30).map(|i| i * 512).collect();
    write_wav(&path, 2, &samples);

    let backend = MockBackend::new().with_clock(Duration::from_millis(1));
    let hardware = backend.handle();
    let mut device = open(backend, config(8, 32));
    let mut source = LoopingSource::new(WavSource::open(&path).unwrap());

    let report = Player::new(playback(8, true))
        .run(&mut device, &mut source, &CancelToken::new())
        .unwrap();
    assert_eq!(report.frames_written, 15);
    assert_eq!(report.loops, 0);
    assert!(!report.interrupted);

    let expected: Vec<f32> = samples.iter().map(|&s| f32::from(s) / 32768.0).collect();
    assert_eq!(audible(hardware.played()), expected);
    assert_eq!(device.state(), DeviceState::Terminated);
}

#[test]
fn test_playlist_plays_files_back_to_back() {
    let dir = tempfile::tempdir().unwrap();
    write_wav(&dir.path().join("01.wav"), 1, &[1024, 2048, 3072]);
    write_wav(&dir.path().join("02.wav"), 1, &[4096, 5120]);

    let backend = MockBackend::new().with_clock(Duration::from_millis(1));
    let hardware = backend.handle();
    let mut device = open(
        backend,
        DeviceConfig {
            channels: 1,
            ..config(4, 16)
        },
    );
    let playlist = Playlist::from_dir(dir.path()).unwrap();
    assert_eq!(playlist.total_frames(), 5);
    let mut source = LoopingSource::new(playlist);

    let report = Player::new(playback(4, true))
        .run(&mut device, &mut source, &CancelToken::new())
        .unwrap();
    assert_eq!(report.frames_written, 5);

    let expected: Vec<f32> = [1024i16, 2048, 3072, 4096, 5120]
        .iter()
        .map(|&s| f32::from(s) / 32768.0)
        .collect();
    assert_eq!(audible(hardware.played()), expected);
}

#[test]
#[ignore = "requires audio hardware"]
fn test_real_playback() {
    let mut mock = MockSource::new(44100, 2);
    mock.generate_sine(440.0, 500);

    let mut device = AudioDevice::open(
        Box::new(CpalBackend::new()),
        DeviceConfig {
            sample_rate: 44100,
            ..Default::default()
        },
    );
    assert!(device.is_device_available(), "{:?}", device.status());

    let report = Player::new(PlaybackConfig {
        no_loop: true,
        ..Default::default()
    })
    .run(&mut device, &mut LoopingSource::new(mock), &CancelToken::new())
    .unwrap();
    println!("Report: {:?}", report);
    assert_eq!(report.frames_written, 22050);
}
