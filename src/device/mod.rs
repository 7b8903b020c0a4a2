//! The audio device: lifecycle state machine and control-thread transfer API.
//!
//! ```text
//! Uninitialized ──open──▶ Opened ──start──▶ Started ◀──resume── Paused
//!                            │                 │  └────pause────▶  │
//!                            │                 ▼                   │
//!                            └──────────────▶ Stopped ◀────────────┘
//!                                              │
//!                                   close ─▶ Closed ─▶ terminate ─▶ Terminated
//! ```
//!
//! Every hardware-boundary failure is recorded on the device (see
//! [`AudioDevice::status()`]) and, during open, leaves the device unavailable
//! instead of failing construction. Every lifecycle call is idempotent.

mod callback;

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crate::backend::{AudioBackend, HardwareStream, StreamParams};
use crate::config::{DeviceConfig, Direction};
use crate::format::{SampleEncoding, CELL_BYTES};
use crate::pipeline::{RingBuffer, ZeroFill};
use crate::AudioError;

pub use callback::{fill_output, store_input, CallbackState, DeviceStats};

/// Interval between fill-level checks in blocking operations.
const POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Where a device is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceState {
    /// Opening failed; the device cannot be used.
    Uninitialized,
    /// The stream is open but has never been started.
    Opened,
    /// The callback is running and draining the ring buffer.
    Started,
    /// The callback is running but outputs silence.
    Paused,
    /// The callback is not running.
    Stopped,
    /// The stream has been released.
    Closed,
    /// The audio subsystem has been released.
    Terminated,
}

impl DeviceState {
    /// Lowercase name, for messages.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Uninitialized => "uninitialized",
            Self::Opened => "opened",
            Self::Started => "started",
            Self::Paused => "paused",
            Self::Stopped => "stopped",
            Self::Closed => "closed",
            Self::Terminated => "terminated",
        }
    }
}

/// A hardware audio stream fed (or drained) through a ring buffer.
///
/// The control thread moves audio with [`write()`](Self::write),
/// [`blocking_write()`](Self::blocking_write) and [`read()`](Self::read); the
/// backend's callback services the other end of the ring buffer.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use loop_audio::backend::MockBackend;
/// use loop_audio::{AudioDevice, DeviceConfig};
///
/// let backend = MockBackend::new();
/// let hardware = backend.handle();
/// let config = DeviceConfig {
///     chunk_frames: 4,
///     ring_frames: 16,
///     ..Default::default()
/// };
/// let mut device = AudioDevice::open(Box::new(backend), config);
/// assert!(device.is_device_available());
///
/// device.start().unwrap();
/// device.write(&[0.5; 8]).unwrap();
///
/// let out = hardware.render::<f32>(4).unwrap();
/// assert_eq!(&out[..8], &[0.5; 8]);
/// assert!(device.wait(Duration::from_millis(10)).is_ok());
/// ```
pub struct AudioDevice {
    backend: Option<Box<dyn AudioBackend>>,
    stream: Option<Box<dyn HardwareStream>>,
    shared: Option<Arc<CallbackState>>,
    config: DeviceConfig,
    name: String,
    channels: u16,
    state: DeviceState,
    status: Option<AudioError>,
}

impl AudioDevice {
    /// Opens a stream on `backend`.
    ///
    /// Opening never fails outright. If the device cannot be used, the
    /// returned device reports `false` from
    /// [`is_device_available()`](Self::is_device_available) and the cause is
    /// available from [`status()`](Self::status). A channel request above
    /// the device maximum is clamped with a warning.
    pub fn open(backend: Box<dyn AudioBackend>, config: DeviceConfig) -> Self {
        let mut device = Self {
            backend: Some(backend),
            stream: None,
            shared: None,
            name: String::from("unknown"),
            channels: config.channels,
            config,
            state: DeviceState::Uninitialized,
            status: None,
        };

        match device.try_open() {
            Ok(()) => {
                device.state = DeviceState::Opened;
                tracing::info!(
                    "Opened {} device {}: {}Hz, {} channels, {} encoding",
                    device.config.direction,
                    device.name,
                    device.config.sample_rate,
                    device.channels,
                    device.config.encoding
                );
            }
            Err(e) => {
                tracing::error!("Failed to open {} device: {}", device.config.direction, e);
                device.status = Some(e);
            }
        }
        device
    }

    fn try_open(&mut self) -> Result<(), AudioError> {
        self.config.validate()?;
        let backend = self
            .backend
            .as_mut()
            .ok_or_else(|| AudioError::backend("no backend"))?;

        let direction = self.config.direction;
        let info = backend.probe(self.config.device, direction)?;
        self.name = info.name.clone();

        let max = info.max_channels(direction);
        if max == 0 {
            return Err(AudioError::DeviceUnavailable {
                name: info.name,
                reason: format!("device has no {direction} channels"),
            });
        }
        if self.config.channels > max {
            tracing::warn!(
                "{} supports at most {} {} channels; clamping request of {}",
                info.name,
                max,
                direction,
                self.config.channels
            );
            self.channels = max;
        }

        let channels = usize::from(self.channels);
        let cells = |frames: usize| {
            frames.checked_mul(channels).ok_or_else(|| {
                AudioError::invalid_config(format!("{frames} frames overflow the buffer size"))
            })
        };
        let ring = RingBuffer::new(cells(self.config.ring_frames)?)?;
        let silence = ZeroFill::new(cells(self.config.chunk_frames)?);
        let shared = Arc::new(CallbackState::new(ring, silence, self.channels, direction));

        let params = StreamParams {
            sample_rate: self.config.sample_rate,
            channels: self.channels,
            encoding: self.config.encoding,
            direction,
            device: self.config.device,
            chunk_frames: self.config.chunk_frames,
        };
        self.stream = Some(backend.open_stream(&params, Arc::clone(&shared))?);
        self.shared = Some(shared);
        Ok(())
    }

    /// Returns `true` if the stream opened successfully and is not closed.
    pub fn is_device_available(&self) -> bool {
        self.stream.is_some() && self.shared.is_some()
    }

    /// The most recent hardware-boundary failure, if any.
    pub fn status(&self) -> Option<&AudioError> {
        self.status.as_ref()
    }

    /// Current lifecycle state.
    pub fn state(&self) -> DeviceState {
        self.state
    }

    /// Starts the callback with an empty ring buffer.
    ///
    /// Starting a started device does nothing. Starting a paused device
    /// resumes it without discarding buffered audio.
    ///
    /// # Errors
    ///
    /// Returns `DeviceUnavailable` if the device never opened or the
    /// hardware refuses to start, `InvalidState` once closed.
    pub fn start(&mut self) -> Result<(), AudioError> {
        match self.state {
            DeviceState::Started => return Ok(()),
            DeviceState::Paused => return self.resume(),
            DeviceState::Opened | DeviceState::Stopped => {}
            state => return Err(self.unusable("start", state)),
        }

        let shared = self.callback_state()?;
        let Some(stream) = self.stream.as_mut() else {
            return Err(self.unavailable());
        };
        shared.ring().reset();
        shared.set_paused(false);
        if let Err(e) = stream.start() {
            shared.set_paused(true);
            return Err(self.record(e));
        }
        self.state = DeviceState::Started;
        tracing::debug!("Started {}", self.name);
        Ok(())
    }

    /// Stops the callback. Buffered audio is kept until the next start.
    ///
    /// # Errors
    ///
    /// Returns the backend's error if the hardware refuses to stop.
    pub fn stop(&mut self) -> Result<(), AudioError> {
        match self.state {
            DeviceState::Started | DeviceState::Paused => {}
            _ => return Ok(()),
        }

        let shared = self.callback_state()?;
        let Some(stream) = self.stream.as_mut() else {
            return Err(self.unavailable());
        };
        let was_paused = shared.is_paused();
        shared.set_paused(true);
        if let Err(e) = stream.stop() {
            shared.set_paused(was_paused);
            return Err(self.record(e));
        }
        self.state = DeviceState::Stopped;
        tracing::debug!("Stopped {}", self.name);
        Ok(())
    }

    /// Keeps the callback running but makes it output silence (or discard
    /// input) without touching the ring buffer.
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` unless the device is started or paused.
    pub fn pause(&mut self) -> Result<(), AudioError> {
        match self.state {
            DeviceState::Paused => Ok(()),
            DeviceState::Started => {
                self.callback_state()?.set_paused(true);
                self.state = DeviceState::Paused;
                Ok(())
            }
            state => Err(self.unusable("pause", state)),
        }
    }

    /// Lets a paused callback drain the ring buffer again.
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` unless the device is started or paused.
    pub fn resume(&mut self) -> Result<(), AudioError> {
        match self.state {
            DeviceState::Started => Ok(()),
            DeviceState::Paused => {
                self.callback_state()?.set_paused(false);
                self.state = DeviceState::Started;
                Ok(())
            }
            state => Err(self.unusable("resume", state)),
        }
    }

    /// Stops (if running) and releases the stream.
    ///
    /// # Errors
    ///
    /// Returns the backend's error if stopping or closing fails. The stream
    /// is released either way.
    pub fn close(&mut self) -> Result<(), AudioError> {
        let stopped = self.stop();
        let closed = match self.stream.take() {
            Some(stream) => stream.close(),
            None => Ok(()),
        };
        if matches!(
            self.state,
            DeviceState::Opened | DeviceState::Stopped | DeviceState::Started | DeviceState::Paused
        ) {
            self.state = DeviceState::Closed;
            tracing::debug!("Closed {}", self.name);
        }
        stopped?;
        closed.map_err(|e| self.record(e))
    }

    /// Closes the stream if needed and releases the audio subsystem.
    ///
    /// # Errors
    ///
    /// Returns the backend's error if termination fails.
    pub fn terminate(&mut self) -> Result<(), AudioError> {
        let closed = self.close();
        let terminated = match self.backend.take() {
            Some(mut backend) => {
                tracing::debug!("Terminating {} backend", backend.name());
                backend.terminate()
            }
            None => Ok(()),
        };
        self.state = DeviceState::Terminated;
        closed?;
        terminated.map_err(|e| self.record(e))
    }

    /// Appends whole frames of interleaved, normalized samples to the ring
    /// buffer without blocking. Frames beyond the free space are dropped.
    ///
    /// Returns the number of frames accepted.
    ///
    /// # Errors
    ///
    /// Returns `DeviceUnavailable` if the device is not open and
    /// `InvalidState` on an input device.
    pub fn write(&mut self, samples: &[f32]) -> Result<usize, AudioError> {
        let shared = self.output_state("write")?;
        let channels = shared.channels();
        let encoding = self.config.encoding;

        let frames = samples.len() / channels;
        let accepted = frames.min(shared.ring().free() / channels);
        shared
            .ring()
            .put_map(&samples[..accepted * channels], |&s| encoding.encode(s));
        if accepted < frames {
            shared.record_overflow(frames - accepted);
        }
        Ok(accepted)
    }

    /// Waits until the ring buffer has more free frames than `samples`
    /// holds, then writes them.
    ///
    /// # Errors
    ///
    /// Returns `Timeout` if room did not appear within `timeout` (nothing is
    /// written), `ChunkTooLarge` if the chunk is not smaller than the ring
    /// buffer, and the errors
    /// of [`write()`](Self::write).
    pub fn blocking_write(&mut self, samples: &[f32], timeout: Duration) -> Result<usize, AudioError> {
        let shared = self.output_state("write")?;
        let channels = shared.channels();
        let frames = samples.len() / channels;
        let capacity = shared.ring().capacity() / channels;
        if frames >= capacity {
            return Err(AudioError::ChunkTooLarge { frames, capacity });
        }

        let begun = Instant::now();
        let deadline = begun + timeout;
        while shared.ring().occupied() / channels >= capacity - frames {
            if Instant::now() >= deadline {
                return Err(AudioError::Timeout {
                    waited: begun.elapsed(),
                });
            }
            thread::sleep(POLL_INTERVAL);
        }
        self.write(samples)
    }

    /// Takes captured frames out of the ring buffer as normalized samples.
    /// Whatever part of `dst` is not filled is set to silence.
    ///
    /// Returns the number of frames read.
    ///
    /// # Errors
    ///
    /// Returns `DeviceUnavailable` if the device is not open and
    /// `InvalidState` on an output device.
    pub fn read(&mut self, dst: &mut [f32]) -> Result<usize, AudioError> {
        let shared = self.shared_state("read")?;
        if shared.direction() != Direction::Input {
            return Err(AudioError::InvalidState {
                operation: "read",
                state: "an output device",
            });
        }
        let channels = shared.channels();
        let encoding = self.config.encoding;

        let whole = dst.len() / channels * channels;
        let read = shared
            .ring()
            .get_map(&mut dst[..whole], |&cell| encoding.decode(cell));
        dst[read..].fill(0.0);
        Ok(read / channels)
    }

    /// Waits until the ring buffer is empty.
    ///
    /// # Errors
    ///
    /// Returns `Timeout` if data is still buffered after `timeout`, and
    /// `DeviceUnavailable` if the device is not open.
    pub fn wait(&self, timeout: Duration) -> Result<(), AudioError> {
        let shared = self.shared_state("wait")?;
        let begun = Instant::now();
        let deadline = begun + timeout;
        while !shared.ring().is_empty() {
            if Instant::now() >= deadline {
                return Err(AudioError::Timeout {
                    waited: begun.elapsed(),
                });
            }
            thread::sleep(POLL_INTERVAL);
        }
        Ok(())
    }

    /// Device name as reported by the backend.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Negotiated channel count.
    pub fn channel_count(&self) -> u16 {
        self.channels
    }

    /// Channel count that was asked for.
    pub fn requested_channels(&self) -> u16 {
        self.config.channels
    }

    /// Stream sample rate.
    pub fn sample_rate(&self) -> u32 {
        self.config.sample_rate
    }

    /// Hardware sample encoding.
    pub fn encoding(&self) -> SampleEncoding {
        self.config.encoding
    }

    /// Output or input.
    pub fn direction(&self) -> Direction {
        self.config.direction
    }

    /// Frames per chunk.
    pub fn chunk_frames(&self) -> usize {
        self.config.chunk_frames
    }

    /// Ring buffer capacity in frames.
    pub fn ring_capacity_frames(&self) -> usize {
        self.shared
            .as_ref()
            .map_or(0, |s| s.ring().capacity() / s.channels())
    }

    /// Ring buffer capacity in cells.
    pub fn ring_capacity_cells(&self) -> usize {
        self.shared.as_ref().map_or(0, |s| s.ring().capacity())
    }

    /// Ring buffer capacity in bytes of cell storage.
    pub fn ring_capacity_bytes(&self) -> usize {
        self.ring_capacity_cells() * CELL_BYTES
    }

    /// Frames currently buffered.
    pub fn buffered_frames(&self) -> usize {
        self.shared
            .as_ref()
            .map_or(0, |s| s.ring().occupied() / s.channels())
    }

    /// Frames that can be written without dropping any.
    pub fn free_frames(&self) -> usize {
        self.shared
            .as_ref()
            .map_or(0, |s| s.ring().free() / s.channels())
    }

    /// Frame count of the most recent hardware callback.
    pub fn callback_frame_count(&self) -> usize {
        self.stats().last_callback_frames
    }

    /// Returns `true` while the callback outputs silence.
    pub fn is_paused(&self) -> bool {
        self.shared.as_ref().map_or(true, |s| s.is_paused())
    }

    /// Snapshot of the transfer counters.
    pub fn stats(&self) -> DeviceStats {
        self.shared
            .as_ref()
            .map(|s| s.stats())
            .unwrap_or_default()
    }

    fn callback_state(&self) -> Result<Arc<CallbackState>, AudioError> {
        self.shared.clone().ok_or_else(|| self.unavailable())
    }

    fn shared_state(&self, operation: &'static str) -> Result<Arc<CallbackState>, AudioError> {
        match self.state {
            DeviceState::Uninitialized => Err(self.unavailable()),
            DeviceState::Closed | DeviceState::Terminated => Err(AudioError::InvalidState {
                operation,
                state: self.state.as_str(),
            }),
            _ => self.callback_state(),
        }
    }

    fn output_state(&self, operation: &'static str) -> Result<Arc<CallbackState>, AudioError> {
        let shared = self.shared_state(operation)?;
        if shared.direction() != Direction::Output {
            return Err(AudioError::InvalidState {
                operation,
                state: "an input device",
            });
        }
        Ok(shared)
    }

    fn unavailable(&self) -> AudioError {
        AudioError::DeviceUnavailable {
            name: self.name.clone(),
            reason: self
                .status
                .as_ref()
                .map_or_else(|| "not open".to_string(), ToString::to_string),
        }
    }

    fn unusable(&self, operation: &'static str, state: DeviceState) -> AudioError {
        match state {
            DeviceState::Uninitialized => self.unavailable(),
            _ => AudioError::InvalidState {
                operation,
                state: state.as_str(),
            },
        }
    }

    /// Logs a hardware failure, keeps a copy as the device status and
    /// returns it.
    fn record(&mut self, err: AudioError) -> AudioError {
        tracing::error!("{}: {}", self.name, err);
        self.status = Some(AudioError::backend(&err));
        err
    }
}

impl Drop for AudioDevice {
    fn drop(&mut self) {
        if self.state != DeviceState::Terminated {
            if let Err(e) = self.terminate() {
                tracing::warn!("Error releasing {}: {}", self.name, e);
            }
        }
    }
}
