//! The playback control loop.
//!
//! The player runs on the control thread. It decodes chunks from a
//! [`LoopingSource`], remaps channels to the device layout, and queues them
//! with [`AudioDevice::blocking_write()`]. The hardware callback drains the
//! queue concurrently.

use crate::cancel::CancelToken;
use crate::config::PlaybackConfig;
use crate::device::{AudioDevice, DeviceStats};
use crate::event::{EventCallback, PlaybackEvent};
use crate::format::{peak, GainMatrix};
use crate::source::{FrameSource, LoopingSource};
use crate::AudioError;

/// Summary of a finished playback run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlaybackReport {
    /// Frames of source audio queued to the device.
    pub frames_written: u64,
    /// Completed passes over the source.
    pub loops: u64,
    /// Playback was stopped by a cancellation request.
    pub interrupted: bool,
    /// The ring buffer emptied before the device was stopped.
    pub drained: bool,
    /// Device counters at the end of playback.
    pub stats: DeviceStats,
}

/// Streams a source to a device until the source ends or playback is
/// cancelled.
///
/// # Example
///
/// ```no_run
/// use loop_audio::backend::CpalBackend;
/// use loop_audio::source::{LoopingSource, WavSource};
/// use loop_audio::{AudioDevice, CancelToken, DeviceConfig, PlaybackConfig, Player};
///
/// let source = WavSource::open("loop.wav")?;
/// let mut device = AudioDevice::open(Box::new(CpalBackend::new()), DeviceConfig::default());
/// let mut source = LoopingSource::new(source);
///
/// let report = Player::new(PlaybackConfig::default())
///     .with_event_callback(loop_audio::event_callback(|e| println!("{e:?}")))
///     .run(&mut device, &mut source, &CancelToken::new())?;
/// println!("played {} frames", report.frames_written);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct Player {
    config: PlaybackConfig,
    event_callback: Option<EventCallback>,
}

impl Player {
    /// Creates a player.
    pub fn new(config: PlaybackConfig) -> Self {
        Self {
            config,
            event_callback: None,
        }
    }

    /// Registers a callback for [`PlaybackEvent`]s.
    #[must_use]
    pub fn with_event_callback(mut self, callback: EventCallback) -> Self {
        self.event_callback = Some(callback);
        self
    }

    /// Plays `source` on `device`, then stops, closes and terminates the
    /// device.
    ///
    /// The first cancellation request ends decoding; playback still drains
    /// what is queued. A further request aborts the drain.
    ///
    /// # Errors
    ///
    /// Returns `DeviceUnavailable` if the device is not open, `InvalidConfig`
    /// for a zero chunk length, and any device or source failure during
    /// playback. Write timeouts are retried, not returned.
    pub fn run<S: FrameSource>(
        &self,
        device: &mut AudioDevice,
        source: &mut LoopingSource<S>,
        cancel: &CancelToken,
    ) -> Result<PlaybackReport, AudioError> {
        if !device.is_device_available() {
            return Err(AudioError::DeviceUnavailable {
                name: device.name().to_string(),
                reason: device
                    .status()
                    .map_or_else(|| "not open".to_string(), ToString::to_string),
            });
        }
        let chunk = self.config.chunk_frames;
        if chunk == 0 {
            return Err(AudioError::invalid_config("chunk length must be non-zero"));
        }
        if source.sample_rate() != device.sample_rate() {
            tracing::warn!(
                "Source rate {}Hz differs from device rate {}Hz; playing without resampling",
                source.sample_rate(),
                device.sample_rate()
            );
        }

        let source_channels = usize::from(source.channels());
        let device_channels = usize::from(device.channel_count());
        let matrix = GainMatrix::for_channels(source_channels, device_channels);
        let mut decoded = vec![0.0f32; chunk * source_channels];
        let mut mixed = vec![0.0f32; chunk * device_channels];

        device.start()?;
        self.emit(PlaybackEvent::Started {
            sample_rate: device.sample_rate(),
            channels: device.channel_count(),
        });

        let mut report = PlaybackReport {
            loops: source.loops(),
            ..Default::default()
        };
        let result = self.play(device, source, cancel, &matrix, &mut decoded, &mut mixed, &mut report);

        report.interrupted = cancel.is_cancelled();
        if result.is_ok() {
            report.drained = self.drain(device, cancel);
        }
        report.stats = device.stats();
        if let Err(e) = device.terminate() {
            tracing::warn!("Error shutting down {}: {}", device.name(), e);
        }
        result?;

        if report.interrupted {
            self.emit(PlaybackEvent::Interrupted);
        } else {
            self.emit(PlaybackEvent::Finished {
                frames_written: report.frames_written,
            });
        }
        tracing::info!(
            "Playback ended: {} frames, {} loops, {} underrun frames",
            report.frames_written,
            report.loops,
            report.stats.underrun_frames
        );
        Ok(report)
    }

    #[allow(clippy::too_many_arguments)]
    fn play<S: FrameSource>(
        &self,
        device: &mut AudioDevice,
        source: &mut LoopingSource<S>,
        cancel: &CancelToken,
        matrix: &GainMatrix,
        decoded: &mut [f32],
        mixed: &mut [f32],
        report: &mut PlaybackReport,
    ) -> Result<(), AudioError> {
        let chunk = self.config.chunk_frames;
        let source_channels = matrix.inputs();
        let device_channels = matrix.outputs();

        if self.config.prime_with_silence {
            mixed.fill(0.0);
            if !self.write_chunk(device, mixed, cancel)? {
                return Ok(());
            }
        }

        while !cancel.is_cancelled() {
            let frames = source.prepare_chunk(decoded, chunk, self.config.no_loop)?;
            if source.loops() != report.loops {
                report.loops = source.loops();
                self.emit(PlaybackEvent::Looped { count: report.loops });
            }
            if frames == 0 {
                break;
            }

            let audio = &decoded[..frames * source_channels];
            let level = peak(audio);
            let out: &[f32] = if matrix.is_identity() {
                audio
            } else {
                matrix.mix_interleaved(audio, mixed, frames);
                &mixed[..frames * device_channels]
            };
            if !self.write_chunk(device, out, cancel)? {
                break;
            }
            report.frames_written += frames as u64;

            self.emit(PlaybackEvent::Progress {
                frames,
                buffered_frames: device.buffered_frames(),
                capacity_frames: device.ring_capacity_frames(),
                callback_frames: device.callback_frame_count(),
                position_frames: source.position_frames(),
                total_frames: source.total_frames(),
                peak: level,
            });

            if self.config.no_loop && frames < chunk {
                break;
            }
        }
        Ok(())
    }

    /// Writes one chunk, retrying on timeout. Returns `false` if cancelled
    /// before the chunk was queued.
    fn write_chunk(
        &self,
        device: &mut AudioDevice,
        samples: &[f32],
        cancel: &CancelToken,
    ) -> Result<bool, AudioError> {
        loop {
            match device.blocking_write(samples, self.config.write_timeout) {
                Ok(_) => return Ok(true),
                Err(AudioError::Timeout { waited }) => {
                    tracing::warn!("Device accepted no audio for {:?}", waited);
                    self.emit(PlaybackEvent::WriteTimeout { waited });
                    if cancel.is_cancelled() {
                        return Ok(false);
                    }
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Waits for the ring buffer to empty. Returns `true` once it has.
    fn drain(&self, device: &AudioDevice, cancel: &CancelToken) -> bool {
        let requests = cancel.requests();
        self.emit(PlaybackEvent::Draining {
            buffered_frames: device.buffered_frames(),
        });
        loop {
            match device.wait(self.config.drain_poll) {
                Ok(()) => return true,
                Err(e) if e.is_timeout() => {
                    if cancel.requests() > requests {
                        tracing::info!("Drain aborted");
                        return false;
                    }
                }
                Err(e) => {
                    tracing::warn!("Drain failed: {}", e);
                    return false;
                }
            }
        }
    }

    fn emit(&self, event: PlaybackEvent) {
        if let Some(callback) = &self.event_callback {
            callback(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use parking_lot::Mutex;

    use crate::backend::MockBackend;
    use crate::config::DeviceConfig;
    use crate::source::MockSource;
    use crate::event_callback;

    fn device(backend: MockBackend, channels: u16) -> AudioDevice {
        AudioDevice::open(
            Box::new(backend),
            DeviceConfig {
                sample_rate: 1000,
                channels,
                chunk_frames: 8,
                ring_frames: 32,
                ..Default::default()
            },
        )
    }

    fn config(no_loop: bool) -> PlaybackConfig {
        PlaybackConfig {
            chunk_frames: 8,
            no_loop,
            write_timeout: Duration::from_millis(20),
            drain_poll: Duration::from_millis(5),
            prime_with_silence: false,
        }
    }

    #[test]
    fn test_unavailable_device_is_rejected() {
        let mut device = device(MockBackend::new().failing_open(), 2);
        let mut source = LoopingSource::new(MockSource::new(1000, 2));
        let err = Player::new(config(true))
            .run(&mut device, &mut source, &CancelToken::new())
            .unwrap_err();
        assert!(matches!(err, AudioError::DeviceUnavailable { .. }));
    }

    #[test]
    fn test_plays_once_and_shuts_down() {
        let backend = MockBackend::new().with_clock(Duration::from_millis(1));
        let handle = backend.handle();
        let mut device = device(backend, 1);

        let mut mock = MockSource::new(1000, 1);
        mock.generate_ramp(20, 0.01);
        let mut source = LoopingSource::new(mock);

        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        let report = Player::new(config(true))
            .with_event_callback(event_callback(move |e| sink.lock().push(e)))
            .run(&mut device, &mut source, &CancelToken::new())
            .unwrap();

        assert_eq!(report.frames_written, 20);
        assert!(report.drained);
        assert!(!report.interrupted);
        assert!(handle.is_terminated());

        let played: Vec<f32> = handle.played().into_iter().filter(|&s| s != 0.0).collect();
        let expected: Vec<f32> = (1..20).map(|i| i as f32 * 0.01).collect();
        assert_eq!(played, expected);

        let events = events.lock();
        assert!(matches!(events.first(), Some(PlaybackEvent::Started { .. })));
        assert!(matches!(
            events.last(),
            Some(PlaybackEvent::Finished { frames_written: 20 })
        ));
    }

    #[test]
    fn test_mono_source_fans_out() {
        let backend = MockBackend::new().with_clock(Duration::from_millis(1));
        let handle = backend.handle();
        let mut device = device(backend, 2);

        let mut mock = MockSource::new(1000, 1);
        mock.add_samples(&[0.5; 8]);
        let mut source = LoopingSource::new(mock);

        Player::new(config(true))
            .run(&mut device, &mut source, &CancelToken::new())
            .unwrap();

        let played: Vec<f32> = handle.played().into_iter().filter(|&s| s != 0.0).collect();
        assert_eq!(played, vec![0.5; 16]);
    }

    #[test]
    fn test_cancel_before_start_interrupts() {
        let backend = MockBackend::new().with_clock(Duration::from_millis(1));
        let mut device = device(backend, 1);
        let mut mock = MockSource::new(1000, 1);
        mock.generate_sine(100.0, 100);
        let mut source = LoopingSource::new(mock);

        let cancel = CancelToken::new();
        cancel.cancel();
        let report = Player::new(config(false))
            .run(&mut device, &mut source, &cancel)
            .unwrap();
        assert!(report.interrupted);
        assert_eq!(report.frames_written, 0);
    }
}
