//! Mock frame source for testing without audio files.

use super::FrameSource;
use crate::SourceError;

/// A frame source backed by synthetic samples held in memory.
///
/// # Example
///
/// ```
/// use loop_audio::source::{FrameSource, MockSource};
///
/// let mut mock = MockSource::new(48000, 2);
///
/// // 100ms of silence followed by 100ms of a 440Hz sine
/// mock.generate_silence(100);
/// mock.generate_sine(440.0, 100);
/// assert_eq!(mock.total_frames(), 9600);
///
/// let mut chunk = vec![0.0; 1024 * 2];
/// let frames = mock.read(&mut chunk, 1024).unwrap();
/// assert_eq!(frames, 1024);
/// ```
#[derive(Debug, Clone)]
pub struct MockSource {
    sample_rate: u32,
    channels: u16,
    samples: Vec<f32>,
    cursor: usize,
}

impl MockSource {
    /// Creates an empty mock source with the given format.
    pub fn new(sample_rate: u32, channels: u16) -> Self {
        Self {
            sample_rate,
            channels: channels.max(1),
            samples: Vec::new(),
            cursor: 0,
        }
    }

    /// Appends silence for the given duration in milliseconds.
    pub fn generate_silence(&mut self, duration_ms: u64) {
        let num_samples = self.samples_for_duration(duration_ms);
        self.samples.resize(self.samples.len() + num_samples, 0.0);
    }

    /// Appends a full-scale sine wave at `frequency` on every channel.
    pub fn generate_sine(&mut self, frequency: f64, duration_ms: u64) {
        let num_frames = self.samples_for_duration(duration_ms) / usize::from(self.channels);
        let sample_rate = f64::from(self.sample_rate);

        for i in 0..num_frames {
            let t = i as f64 / sample_rate;
            let sample = (2.0 * std::f64::consts::PI * frequency * t).sin() as f32;
            for _ in 0..self.channels {
                self.samples.push(sample);
            }
        }
    }

    /// Appends `frames` frames whose value is the frame index scaled by
    /// `step`, repeated on every channel.
    pub fn generate_ramp(&mut self, frames: usize, step: f32) {
        for i in 0..frames {
            let value = i as f32 * step;
            for _ in 0..self.channels {
                self.samples.push(value);
            }
        }
    }

    /// Appends raw interleaved samples. A trailing partial frame is never read.
    pub fn add_samples(&mut self, samples: &[f32]) {
        self.samples.extend_from_slice(samples);
    }

    /// Returns all accumulated samples.
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    fn samples_for_duration(&self, duration_ms: u64) -> usize {
        let frames = (u64::from(self.sample_rate) * duration_ms / 1000) as usize;
        frames * usize::from(self.channels)
    }
}

impl FrameSource for MockSource {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn channels(&self) -> u16 {
        self.channels
    }

    fn read(&mut self, dst: &mut [f32], frames: usize) -> Result<usize, SourceError> {
        let channels = usize::from(self.channels);
        let available = (self.samples.len() - self.cursor) / channels;
        let frames = frames.min(dst.len() / channels).min(available);
        let len = frames * channels;

        dst[..len].copy_from_slice(&self.samples[self.cursor..self.cursor + len]);
        self.cursor += len;
        Ok(frames)
    }

    fn rewind(&mut self) -> Result<(), SourceError> {
        self.cursor = 0;
        Ok(())
    }

    fn position_frames(&self) -> u64 {
        (self.cursor / usize::from(self.channels)) as u64
    }

    fn total_frames(&self) -> u64 {
        (self.samples.len() / usize::from(self.channels)) as u64
    }
}
