//! CPAL implementation of [`AudioBackend`].

use std::sync::Arc;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{BufferSize, Device, Host, SizedSample, Stream, StreamConfig, SupportedBufferSize};

use super::{frames_to_duration, AudioBackend, DeviceInfo, HardwareStream, StreamParams};
use crate::config::{DeviceSelection, Direction};
use crate::device::CallbackState;
use crate::format::{CellSample, SampleEncoding};
use crate::AudioError;

/// Backend for the platform's default CPAL host.
pub struct CpalBackend {
    host: Host,
}

impl Default for CpalBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl CpalBackend {
    /// Uses the default host (ALSA, CoreAudio, WASAPI, ...).
    pub fn new() -> Self {
        Self {
            host: cpal::default_host(),
        }
    }

    fn select(&self, selection: DeviceSelection, direction: Direction) -> Result<Device, AudioError> {
        match selection {
            DeviceSelection::SystemDefault => {
                let device = match direction {
                    Direction::Output => self.host.default_output_device(),
                    Direction::Input => self.host.default_input_device(),
                };
                device.ok_or(AudioError::NoDefaultDevice {
                    direction: direction.as_str(),
                })
            }
            DeviceSelection::Index(index) => self
                .host
                .devices()
                .map_err(AudioError::backend)?
                .nth(index)
                .ok_or(AudioError::DeviceNotFound {
                    index,
                    direction: direction.as_str(),
                }),
        }
    }

    fn describe(device: &Device, index: Option<usize>, direction: Direction) -> DeviceInfo {
        let name = device.name().unwrap_or_else(|_| "unknown".to_string());
        let max_input_channels = device
            .supported_input_configs()
            .map(|configs| configs.map(|c| c.channels()).max().unwrap_or(0))
            .unwrap_or(0);
        let max_output_channels = device
            .supported_output_configs()
            .map(|configs| configs.map(|c| c.channels()).max().unwrap_or(0))
            .unwrap_or(0);

        let default_config = match direction {
            Direction::Output => device.default_output_config(),
            Direction::Input => device.default_input_config(),
        }
        .ok();
        let default_sample_rate = default_config.as_ref().map(|c| c.sample_rate().0);
        let latency = default_config.as_ref().and_then(|c| match c.buffer_size() {
            SupportedBufferSize::Range { min, max } => Some((
                frames_to_duration(u64::from(*min), c.sample_rate().0),
                frames_to_duration(u64::from(*max), c.sample_rate().0),
            )),
            SupportedBufferSize::Unknown => None,
        });

        DeviceInfo {
            index,
            name,
            max_input_channels,
            max_output_channels,
            default_sample_rate,
            latency,
        }
    }
}

impl AudioBackend for CpalBackend {
    fn name(&self) -> &'static str {
        "cpal"
    }

    fn probe(
        &self,
        selection: DeviceSelection,
        direction: Direction,
    ) -> Result<DeviceInfo, AudioError> {
        let device = self.select(selection, direction)?;
        let index = match selection {
            DeviceSelection::Index(index) => Some(index),
            DeviceSelection::SystemDefault => None,
        };
        Ok(Self::describe(&device, index, direction))
    }

    fn devices(&self) -> Result<Vec<DeviceInfo>, AudioError> {
        let devices = self.host.devices().map_err(AudioError::backend)?;
        Ok(devices
            .enumerate()
            .map(|(index, device)| Self::describe(&device, Some(index), Direction::Output))
            .collect())
    }

    fn open_stream(
        &mut self,
        params: &StreamParams,
        state: Arc<CallbackState>,
    ) -> Result<Box<dyn HardwareStream>, AudioError> {
        let device = self.select(params.device, params.direction)?;
        let name = device.name().unwrap_or_else(|_| "unknown".to_string());
        let config = StreamConfig {
            channels: params.channels,
            sample_rate: cpal::SampleRate(params.sample_rate),
            // Hosts reject fixed sizes they cannot honour; the chunk length
            // only sizes the silence block.
            buffer_size: BufferSize::Default,
        };

        let stream = match (params.direction, params.encoding) {
            (Direction::Output, SampleEncoding::Int8) => build_output::<i8>(&device, &config, state),
            (Direction::Output, SampleEncoding::Int16) => build_output::<i16>(&device, &config, state),
            (Direction::Output, SampleEncoding::Int32) => build_output::<i32>(&device, &config, state),
            (Direction::Output, SampleEncoding::Float32) => build_output::<f32>(&device, &config, state),
            (Direction::Input, SampleEncoding::Int8) => build_input::<i8>(&device, &config, state),
            (Direction::Input, SampleEncoding::Int16) => build_input::<i16>(&device, &config, state),
            (Direction::Input, SampleEncoding::Int32) => build_input::<i32>(&device, &config, state),
            (Direction::Input, SampleEncoding::Float32) => build_input::<f32>(&device, &config, state),
        }
        .map_err(|reason| AudioError::DeviceUnavailable {
            name: name.clone(),
            reason,
        })?;

        // Some hosts start streams on creation.
        if let Err(e) = stream.pause() {
            tracing::debug!("Could not pause new stream on {}: {}", name, e);
        }

        tracing::debug!(
            "Opened {} stream on {}: {}Hz, {} channels, {}",
            params.direction,
            name,
            params.sample_rate,
            params.channels,
            params.encoding
        );
        Ok(Box::new(CpalStream { stream, name }))
    }

    fn terminate(&mut self) -> Result<(), AudioError> {
        tracing::debug!("Releasing CPAL host {:?}", self.host.id());
        Ok(())
    }
}

fn build_output<S>(
    device: &Device,
    config: &StreamConfig,
    state: Arc<CallbackState>,
) -> Result<Stream, String>
where
    S: CellSample + SizedSample,
{
    device
        .build_output_stream(
            config,
            move |data: &mut [S], _: &cpal::OutputCallbackInfo| {
                state.render_output(data);
            },
            |err| {
                tracing::error!("Audio stream error: {}", err);
            },
            None,
        )
        .map_err(|e| e.to_string())
}

fn build_input<S>(
    device: &Device,
    config: &StreamConfig,
    state: Arc<CallbackState>,
) -> Result<Stream, String>
where
    S: CellSample + SizedSample,
{
    device
        .build_input_stream(
            config,
            move |data: &[S], _: &cpal::InputCallbackInfo| {
                state.capture_input(data);
            },
            |err| {
                tracing::error!("Audio stream error: {}", err);
            },
            None,
        )
        .map_err(|e| e.to_string())
}

/// A CPAL stream. Dropping it releases the hardware.
struct CpalStream {
    stream: Stream,
    name: String,
}

impl HardwareStream for CpalStream {
    fn start(&mut self) -> Result<(), AudioError> {
        self.stream
            .play()
            .map_err(|e| AudioError::DeviceUnavailable {
                name: self.name.clone(),
                reason: e.to_string(),
            })
    }

    fn stop(&mut self) -> Result<(), AudioError> {
        self.stream.pause().map_err(AudioError::backend)
    }

    fn close(self: Box<Self>) -> Result<(), AudioError> {
        drop(self.stream);
        Ok(())
    }
}
