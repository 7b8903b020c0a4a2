//! Hardware backends.
//!
//! An [`AudioBackend`] resolves a device, reports its capabilities and opens a
//! [`HardwareStream`] whose callback drives a shared
//! [`CallbackState`](crate::device::CallbackState). The production backend is
//! [`CpalBackend`]; [`MockBackend`] stands in for hardware in tests and lets
//! them run the callback by hand or on a clock thread.

mod cpal_backend;
mod mock;

use std::sync::Arc;
use std::time::Duration;

use crate::config::{DeviceSelection, Direction};
use crate::device::CallbackState;
use crate::format::SampleEncoding;
use crate::AudioError;

pub use cpal_backend::CpalBackend;
pub use mock::{MockBackend, MockHandle};

/// Negotiated parameters a stream is opened with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamParams {
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Channel count after clamping to the device maximum.
    pub channels: u16,
    /// Sample encoding on the hardware side.
    pub encoding: SampleEncoding,
    /// Output or input.
    pub direction: Direction,
    /// Endpoint to open.
    pub device: DeviceSelection,
    /// Suggested frames per callback.
    pub chunk_frames: usize,
}

/// Information about an audio endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceInfo {
    /// Position in the host's enumeration, when known.
    pub index: Option<usize>,
    /// Human-readable device name.
    pub name: String,
    /// Maximum input channels (0 if the device cannot capture).
    pub max_input_channels: u16,
    /// Maximum output channels (0 if the device cannot play).
    pub max_output_channels: u16,
    /// Default sample rate, if the device reports one.
    pub default_sample_rate: Option<u32>,
    /// Low and high latency bounds of the default configuration.
    pub latency: Option<(Duration, Duration)>,
}

impl DeviceInfo {
    /// Maximum channels for `direction`.
    #[must_use]
    pub fn max_channels(&self, direction: Direction) -> u16 {
        match direction {
            Direction::Output => self.max_output_channels,
            Direction::Input => self.max_input_channels,
        }
    }
}

/// A host audio API.
pub trait AudioBackend {
    /// Short backend name for logs.
    fn name(&self) -> &'static str;

    /// Resolves `selection` and reports what the device supports.
    fn probe(&self, selection: DeviceSelection, direction: Direction)
        -> Result<DeviceInfo, AudioError>;

    /// Enumerates every device the host knows about.
    fn devices(&self) -> Result<Vec<DeviceInfo>, AudioError>;

    /// Opens a stream whose callback services `state`. The stream must not
    /// run until [`HardwareStream::start`] is called.
    fn open_stream(
        &mut self,
        params: &StreamParams,
        state: Arc<CallbackState>,
    ) -> Result<Box<dyn HardwareStream>, AudioError>;

    /// Releases the audio subsystem. Called once, after every stream is closed.
    fn terminate(&mut self) -> Result<(), AudioError> {
        Ok(())
    }
}

/// An opened hardware stream.
pub trait HardwareStream {
    /// Begins invoking the callback.
    fn start(&mut self) -> Result<(), AudioError>;

    /// Stops invoking the callback. The stream can be started again.
    fn stop(&mut self) -> Result<(), AudioError>;

    /// Releases the stream.
    fn close(self: Box<Self>) -> Result<(), AudioError>;
}

/// Lists devices on the default host that can play audio.
///
/// # Errors
///
/// Returns an error if device enumeration fails.
pub fn list_output_devices() -> Result<Vec<DeviceInfo>, AudioError> {
    let devices = CpalBackend::new().devices()?;
    Ok(devices
        .into_iter()
        .filter(|info| info.max_output_channels > 0)
        .collect())
}

/// Lists devices on the default host that can capture audio.
///
/// # Errors
///
/// Returns an error if device enumeration fails.
pub fn list_input_devices() -> Result<Vec<DeviceInfo>, AudioError> {
    let devices = CpalBackend::new().devices()?;
    Ok(devices
        .into_iter()
        .filter(|info| info.max_input_channels > 0)
        .collect())
}

/// Frame count expressed as a duration at `sample_rate`.
pub(crate) fn frames_to_duration(frames: u64, sample_rate: u32) -> Duration {
    if sample_rate == 0 {
        return Duration::ZERO;
    }
    Duration::from_secs_f64(frames as f64 / f64::from(sample_rate))
}
