//! In-memory backend for tests.
//!
//! [`MockBackend`] accepts any device selection and opens streams that only
//! run when driven: either by hand through a [`MockHandle`], or by a clock
//! thread that services one output period every tick and records what the
//! "hardware" played.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use parking_lot::Mutex;

use super::{AudioBackend, DeviceInfo, HardwareStream, StreamParams};
use crate::config::{DeviceSelection, Direction};
use crate::device::CallbackState;
use crate::format::{i16_to_f32, i32_to_f32, i8_to_f32, CellSample, SampleEncoding};
use crate::AudioError;

#[derive(Default)]
struct MockShared {
    max_channels: u16,
    fail_open: bool,
    fail_start: bool,
    fail_stop: bool,
    clock: Option<Duration>,
    params: Option<StreamParams>,
    state: Option<Arc<CallbackState>>,
    running: bool,
    starts: u32,
    stops: u32,
    closed: bool,
    terminated: bool,
    played: Vec<f32>,
}

/// A backend with no hardware behind it.
///
/// # Example
///
/// ```
/// use loop_audio::backend::MockBackend;
/// use loop_audio::{AudioDevice, DeviceConfig};
///
/// let backend = MockBackend::new();
/// let handle = backend.handle();
/// let mut device = AudioDevice::open(Box::new(backend), DeviceConfig::default());
/// device.start().unwrap();
///
/// // Run one callback of 256 frames by hand.
/// let out = handle.render::<f32>(256).unwrap();
/// assert!(out.iter().all(|&s| s == 0.0));
/// ```
pub struct MockBackend {
    shared: Arc<Mutex<MockShared>>,
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MockBackend {
    /// Creates a stereo mock device.
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Mutex::new(MockShared {
                max_channels: 2,
                ..Default::default()
            })),
        }
    }

    /// Sets the maximum channel count the device reports.
    #[must_use]
    pub fn with_max_channels(self, channels: u16) -> Self {
        self.shared.lock().max_channels = channels;
        self
    }

    /// Makes `open_stream` fail.
    #[must_use]
    pub fn failing_open(self) -> Self {
        self.shared.lock().fail_open = true;
        self
    }

    /// Makes `start` fail.
    #[must_use]
    pub fn failing_start(self) -> Self {
        self.shared.lock().fail_start = true;
        self
    }

    /// Makes `stop` fail. The stream keeps running.
    #[must_use]
    pub fn failing_stop(self) -> Self {
        self.shared.lock().fail_stop = true;
        self
    }

    /// Services one period of `chunk_frames` every `period` while running.
    #[must_use]
    pub fn with_clock(self, period: Duration) -> Self {
        self.shared.lock().clock = Some(period);
        self
    }

    /// Returns a handle for driving and inspecting streams after the backend
    /// has been handed to a device.
    pub fn handle(&self) -> MockHandle {
        MockHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    fn info(&self, index: Option<usize>) -> DeviceInfo {
        let max = self.shared.lock().max_channels;
        DeviceInfo {
            index,
            name: "Mock Device".to_string(),
            max_input_channels: max,
            max_output_channels: max,
            default_sample_rate: Some(44100),
            latency: None,
        }
    }
}

impl AudioBackend for MockBackend {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn probe(
        &self,
        selection: DeviceSelection,
        _direction: Direction,
    ) -> Result<DeviceInfo, AudioError> {
        let index = match selection {
            DeviceSelection::Index(index) => Some(index),
            DeviceSelection::SystemDefault => None,
        };
        Ok(self.info(index))
    }

    fn devices(&self) -> Result<Vec<DeviceInfo>, AudioError> {
        Ok(vec![self.info(Some(0))])
    }

    fn open_stream(
        &mut self,
        params: &StreamParams,
        state: Arc<CallbackState>,
    ) -> Result<Box<dyn HardwareStream>, AudioError> {
        let mut shared = self.shared.lock();
        if shared.fail_open {
            return Err(AudioError::DeviceUnavailable {
                name: "Mock Device".to_string(),
                reason: "open rejected".to_string(),
            });
        }
        shared.params = Some(params.clone());
        shared.state = Some(state);
        shared.closed = false;
        Ok(Box::new(MockStream {
            shared: Arc::clone(&self.shared),
            running: Arc::new(AtomicBool::new(false)),
            clock: None,
        }))
    }

    fn terminate(&mut self) -> Result<(), AudioError> {
        self.shared.lock().terminated = true;
        Ok(())
    }
}

struct MockStream {
    shared: Arc<Mutex<MockShared>>,
    running: Arc<AtomicBool>,
    clock: Option<JoinHandle<()>>,
}

impl MockStream {
    fn spawn_clock(&mut self, period: Duration) {
        let shared = Arc::clone(&self.shared);
        let running = Arc::clone(&self.running);
        self.clock = Some(std::thread::spawn(move || {
            while running.load(Ordering::SeqCst) {
                let (state, params) = {
                    let guard = shared.lock();
                    match (&guard.state, &guard.params) {
                        (Some(state), Some(params)) => (Arc::clone(state), params.clone()),
                        _ => break,
                    }
                };
                if params.direction == Direction::Output {
                    let played = render_decoded(&state, params.encoding, params.chunk_frames);
                    shared.lock().played.extend_from_slice(&played);
                }
                std::thread::sleep(period);
            }
        }));
    }

    fn halt_clock(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(clock) = self.clock.take() {
            let _ = clock.join();
        }
    }
}

impl HardwareStream for MockStream {
    fn start(&mut self) -> Result<(), AudioError> {
        let clock = {
            let mut shared = self.shared.lock();
            if shared.fail_start {
                return Err(AudioError::DeviceUnavailable {
                    name: "Mock Device".to_string(),
                    reason: "start rejected".to_string(),
                });
            }
            shared.running = true;
            shared.starts += 1;
            shared.clock
        };
        self.running.store(true, Ordering::SeqCst);
        if let Some(period) = clock {
            if self.clock.is_none() {
                self.spawn_clock(period);
            }
        }
        Ok(())
    }

    fn stop(&mut self) -> Result<(), AudioError> {
        if self.shared.lock().fail_stop {
            return Err(AudioError::backend("stop rejected"));
        }
        self.halt_clock();
        let mut shared = self.shared.lock();
        shared.running = false;
        shared.stops += 1;
        Ok(())
    }

    fn close(mut self: Box<Self>) -> Result<(), AudioError> {
        self.halt_clock();
        let mut shared = self.shared.lock();
        shared.running = false;
        shared.closed = true;
        shared.state = None;
        Ok(())
    }
}

impl Drop for MockStream {
    fn drop(&mut self) {
        self.halt_clock();
    }
}

/// Drives and inspects a [`MockBackend`]'s stream.
#[derive(Clone)]
pub struct MockHandle {
    shared: Arc<Mutex<MockShared>>,
}

impl MockHandle {
    fn running_state(&self) -> Option<Arc<CallbackState>> {
        let shared = self.shared.lock();
        if shared.running {
            shared.state.clone()
        } else {
            None
        }
    }

    /// Runs one output callback of `frames` frames.
    ///
    /// Returns `None` if no stream is running.
    pub fn render<S: CellSample + Default>(&self, frames: usize) -> Option<Vec<S>> {
        let state = self.running_state()?;
        let mut out = vec![S::default(); frames * state.channels()];
        state.render_output(&mut out);
        Some(out)
    }

    /// Runs one input callback delivering `input`.
    ///
    /// Returns the frames stored, or `None` if no stream is running.
    pub fn capture<S: CellSample>(&self, input: &[S]) -> Option<usize> {
        let state = self.running_state()?;
        Some(state.capture_input(input))
    }

    /// Everything the clock thread has played, as normalized samples.
    pub fn played(&self) -> Vec<f32> {
        self.shared.lock().played.clone()
    }

    /// Parameters of the most recently opened stream.
    pub fn params(&self) -> Option<StreamParams> {
        self.shared.lock().params.clone()
    }

    /// Returns `true` while the stream is started.
    pub fn is_running(&self) -> bool {
        self.shared.lock().running
    }

    /// Number of successful starts.
    pub fn start_count(&self) -> u32 {
        self.shared.lock().starts
    }

    /// Number of stops.
    pub fn stop_count(&self) -> u32 {
        self.shared.lock().stops
    }

    /// Returns `true` once the stream has been closed.
    pub fn is_closed(&self) -> bool {
        self.shared.lock().closed
    }

    /// Returns `true` once the backend has been terminated.
    pub fn is_terminated(&self) -> bool {
        self.shared.lock().terminated
    }
}

fn render_decoded(state: &CallbackState, encoding: SampleEncoding, frames: usize) -> Vec<f32> {
    let len = frames * state.channels();
    match encoding {
        SampleEncoding::Int8 => {
            let mut out = vec![0i8; len];
            state.render_output(&mut out);
            out.into_iter().map(i8_to_f32).collect()
        }
        SampleEncoding::Int16 => {
            let mut out = vec![0i16; len];
            state.render_output(&mut out);
            out.into_iter().map(i16_to_f32).collect()
        }
        SampleEncoding::Int32 => {
            let mut out = vec![0i32; len];
            state.render_output(&mut out);
            out.into_iter().map(i32_to_f32).collect()
        }
        SampleEncoding::Float32 => {
            let mut out = vec![0f32; len];
            state.render_output(&mut out);
            out
        }
    }
}
