//! Configuration types for devices and playback.

use std::fmt;
use std::time::Duration;

use crate::format::SampleEncoding;
use crate::AudioError;

/// Default frames per I/O chunk.
pub const DEFAULT_CHUNK_FRAMES: usize = 1024;

/// Default ring buffer length as a multiple of the chunk length.
pub const DEFAULT_RING_CHUNKS: usize = 8;

/// Which way audio flows through a device. Fixed when the device is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    /// Ring buffer → hardware.
    #[default]
    Output,
    /// Hardware → ring buffer.
    Input,
}

impl Direction {
    /// Lowercase name, for messages.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Output => "output",
            Self::Input => "input",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which hardware endpoint to open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeviceSelection {
    /// The host's default device for the direction.
    #[default]
    SystemDefault,
    /// A device by its position in the host's enumeration.
    Index(usize),
}

/// Parameters a device stream is opened with.
///
/// # Example
///
/// ```
/// use loop_audio::{DeviceConfig, SampleEncoding};
///
/// let config = DeviceConfig {
///     sample_rate: 48000,
///     encoding: SampleEncoding::Int16,
///     ..Default::default()
/// };
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone)]
pub struct DeviceConfig {
    /// Stream sample rate in Hz.
    pub sample_rate: u32,
    /// Requested channel count. Clamped down to the device maximum on open.
    pub channels: u16,
    /// Sample encoding on the hardware side.
    pub encoding: SampleEncoding,
    /// Output or input.
    pub direction: Direction,
    /// Endpoint to open.
    pub device: DeviceSelection,
    /// Frames per hardware period; also the size of the silence block.
    ///
    /// Default: 1024
    pub chunk_frames: usize,
    /// Ring buffer length in frames. Must be at least twice `chunk_frames`.
    ///
    /// Default: 8 chunks
    pub ring_frames: usize,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44100,
            channels: 2,
            encoding: SampleEncoding::Float32,
            direction: Direction::Output,
            device: DeviceSelection::SystemDefault,
            chunk_frames: DEFAULT_CHUNK_FRAMES,
            ring_frames: DEFAULT_CHUNK_FRAMES * DEFAULT_RING_CHUNKS,
        }
    }
}

impl DeviceConfig {
    /// Checks the configuration for values the engine cannot run with.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` describing the first problem found.
    pub fn validate(&self) -> Result<(), AudioError> {
        if self.sample_rate == 0 {
            return Err(AudioError::invalid_config("sample rate must be non-zero"));
        }
        if self.channels == 0 {
            return Err(AudioError::invalid_config("channel count must be non-zero"));
        }
        if self.chunk_frames == 0 {
            return Err(AudioError::invalid_config("chunk length must be non-zero"));
        }
        let min_ring = self.chunk_frames.checked_mul(2).ok_or_else(|| {
            AudioError::invalid_config(format!("chunk length ({}) is too large", self.chunk_frames))
        })?;
        if self.ring_frames < min_ring {
            return Err(AudioError::invalid_config(format!(
                "ring buffer length ({}) must be at least twice the chunk length ({})",
                self.ring_frames, self.chunk_frames
            )));
        }
        Ok(())
    }

    /// Duration of one hardware period: the callback's deadline.
    #[must_use]
    pub fn period(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.chunk_frames as f64 / f64::from(self.sample_rate))
    }
}

/// Behaviour of the playback control loop.
#[derive(Debug, Clone)]
pub struct PlaybackConfig {
    /// Frames decoded and written per iteration.
    ///
    /// Default: 1024
    pub chunk_frames: usize,
    /// Play the source once instead of looping it.
    pub no_loop: bool,
    /// How long one blocking write may wait for room.
    ///
    /// Default: 1 second
    pub write_timeout: Duration,
    /// How long each drain poll waits before checking for cancellation.
    ///
    /// Default: 50ms
    pub drain_poll: Duration,
    /// Write one chunk of silence before the first decoded chunk.
    ///
    /// Default: true
    pub prime_with_silence: bool,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            chunk_frames: DEFAULT_CHUNK_FRAMES,
            no_loop: false,
            write_timeout: Duration::from_secs(1),
            drain_poll: Duration::from_millis(50),
            prime_with_silence: true,
        }
    }
}
