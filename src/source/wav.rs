//! WAV file source.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use hound::{SampleFormat, WavReader, WavSpec};

use super::FrameSource;
use crate::format::int_to_f32;
use crate::SourceError;

/// A RIFF/WAVE file decoded to normalized `f32` frames.
///
/// Integer PCM of 8, 16, 24 and 32 bits is divided by `2^(bits-1)`; 32-bit
/// float passes through.
pub struct WavSource {
    path: PathBuf,
    reader: WavReader<BufReader<File>>,
    spec: WavSpec,
    position: u64,
    total: u64,
}

impl WavSource {
    /// Opens and validates a WAV file.
    ///
    /// # Errors
    ///
    /// Returns `SourceError::Open` if the file cannot be read and
    /// `SourceError::Unsupported` for encodings other than 8/16/24/32-bit
    /// integer or 32-bit float PCM.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, SourceError> {
        let path = path.as_ref().to_path_buf();
        let reader = WavReader::open(&path).map_err(|e| SourceError::open(&path, e))?;
        let spec = reader.spec();

        match (spec.sample_format, spec.bits_per_sample) {
            (SampleFormat::Int, 8 | 16 | 24 | 32) | (SampleFormat::Float, 32) => {}
            (format, bits) => {
                return Err(SourceError::Unsupported {
                    reason: format!("{bits}-bit {format:?} samples"),
                });
            }
        }

        let total = u64::from(reader.duration());
        tracing::info!(
            "Opened {}: {}Hz, {} channels, {}, {} frames",
            path.display(),
            spec.sample_rate,
            spec.channels,
            describe(spec),
            total
        );

        Ok(Self {
            path,
            reader,
            spec,
            position: 0,
            total,
        })
    }

    /// Path the source was opened from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Bits per sample in the file.
    pub fn bits_per_sample(&self) -> u16 {
        self.spec.bits_per_sample
    }

    /// Human-readable sample format, e.g. `"16-bit int"`.
    pub fn format_description(&self) -> String {
        describe(self.spec)
    }
}

impl FrameSource for WavSource {
    fn sample_rate(&self) -> u32 {
        self.spec.sample_rate
    }

    fn channels(&self) -> u16 {
        self.spec.channels
    }

    fn read(&mut self, dst: &mut [f32], frames: usize) -> Result<usize, SourceError> {
        let channels = usize::from(self.spec.channels);
        let remaining = usize::try_from(self.total - self.position).unwrap_or(usize::MAX);
        let frames = frames.min(dst.len() / channels).min(remaining);
        let dst = &mut dst[..frames * channels];

        let filled = match self.spec.sample_format {
            SampleFormat::Float => fill(self.reader.samples::<f32>(), dst, |s| s)?,
            SampleFormat::Int => {
                let bits = self.spec.bits_per_sample;
                fill(self.reader.samples::<i32>(), dst, |s| int_to_f32(s, bits))?
            }
        };

        let read = filled / channels;
        self.position += read as u64;
        if filled < dst.len() {
            // Data chunk shorter than its header claims.
            tracing::warn!(
                "{}: data ends at frame {} of {}",
                self.path.display(),
                self.position,
                self.total
            );
            self.total = self.position;
        }
        Ok(read)
    }

    fn rewind(&mut self) -> Result<(), SourceError> {
        self.reader
            .seek(0)
            .map_err(|e| SourceError::io(&self.path, e))?;
        self.position = 0;
        Ok(())
    }

    fn position_frames(&self) -> u64 {
        self.position
    }

    fn total_frames(&self) -> u64 {
        self.total
    }
}

fn fill<T>(
    samples: impl Iterator<Item = hound::Result<T>>,
    dst: &mut [f32],
    convert: impl Fn(T) -> f32,
) -> Result<usize, SourceError> {
    let mut filled = 0;
    for (slot, sample) in dst.iter_mut().zip(samples) {
        *slot = convert(sample?);
        filled += 1;
    }
    Ok(filled)
}

fn describe(spec: WavSpec) -> String {
    match spec.sample_format {
        SampleFormat::Float => format!("{}-bit float", spec.bits_per_sample),
        SampleFormat::Int => format!("{}-bit int", spec.bits_per_sample),
    }
}
