//! Frame sources: where decoded audio comes from.
//!
//! A [`FrameSource`] yields interleaved, normalized `f32` frames in order and
//! can be rewound to its start. [`LoopingSource`] wraps any source to produce
//! fixed-size chunks, rewinding at the end without a gap.

mod looping;
mod mock;
mod playlist;
mod wav;

use std::time::Duration;

use crate::SourceError;

pub use looping::LoopingSource;
pub use mock::MockSource;
pub use playlist::Playlist;
pub use wav::WavSource;

/// A rewindable stream of interleaved, normalized audio frames.
pub trait FrameSource {
    /// Sample rate in Hz.
    fn sample_rate(&self) -> u32;

    /// Samples per frame.
    fn channels(&self) -> u16;

    /// Reads up to `frames` frames into the front of `dst`.
    ///
    /// Returns the number of whole frames read. Fewer than requested (and
    /// eventually zero) means the end of the stream was reached.
    fn read(&mut self, dst: &mut [f32], frames: usize) -> Result<usize, SourceError>;

    /// Returns to the first frame.
    fn rewind(&mut self) -> Result<(), SourceError>;

    /// Frames read since the start (or the last rewind).
    fn position_frames(&self) -> u64;

    /// Total length in frames.
    fn total_frames(&self) -> u64;

    /// Returns `true` once every frame has been read.
    fn is_end_of_stream(&self) -> bool {
        self.position_frames() >= self.total_frames()
    }

    /// Current position as a duration.
    fn position(&self) -> Duration {
        crate::backend::frames_to_duration(self.position_frames(), self.sample_rate())
    }

    /// Total length as a duration.
    fn duration(&self) -> Duration {
        crate::backend::frames_to_duration(self.total_frames(), self.sample_rate())
    }
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn sample_rate(&self) -> u32 {
        (**self).sample_rate()
    }

    fn channels(&self) -> u16 {
        (**self).channels()
    }

    fn read(&mut self, dst: &mut [f32], frames: usize) -> Result<usize, SourceError> {
        (**self).read(dst, frames)
    }

    fn rewind(&mut self) -> Result<(), SourceError> {
        (**self).rewind()
    }

    fn position_frames(&self) -> u64 {
        (**self).position_frames()
    }

    fn total_frames(&self) -> u64 {
        (**self).total_frames()
    }

    fn is_end_of_stream(&self) -> bool {
        (**self).is_end_of_stream()
    }
}
