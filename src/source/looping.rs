//! Gapless looping over any [`FrameSource`].

use super::FrameSource;
use crate::SourceError;

/// Produces fixed-size chunks from a source, rewinding at the end so the
/// last frame of one pass is followed directly by the first of the next.
pub struct LoopingSource<S> {
    inner: S,
    loops: u64,
}

impl<S: FrameSource> LoopingSource<S> {
    /// Wraps `inner`.
    pub fn new(inner: S) -> Self {
        Self { inner, loops: 0 }
    }

    /// Fills `dst` with the next `frames` frames (clamped to what `dst`
    /// holds) and returns how many of them are audio.
    ///
    /// When looping, a source that ends mid-chunk is rewound and the chunk
    /// is completed from its start, so the full chunk is always returned.
    /// With `no_loop` the frames after the end of the source are silence and
    /// only the valid count is returned. A source with no frames at all
    /// yields a chunk of silence instead of rewinding forever.
    ///
    /// # Errors
    ///
    /// Propagates read and rewind failures from the source.
    pub fn prepare_chunk(
        &mut self,
        dst: &mut [f32],
        frames: usize,
        no_loop: bool,
    ) -> Result<usize, SourceError> {
        let channels = usize::from(self.inner.channels().max(1));
        let frames = frames.min(dst.len() / channels);
        let chunk = &mut dst[..frames * channels];

        let mut filled = self.inner.read(chunk, frames)?;
        if no_loop {
            chunk[filled * channels..].fill(0.0);
            return Ok(filled);
        }

        while filled < frames {
            self.inner.rewind()?;
            self.loops += 1;
            let read = self.inner.read(&mut chunk[filled * channels..], frames - filled)?;
            if read == 0 {
                tracing::debug!("Source has no frames; padding with silence");
                chunk[filled * channels..].fill(0.0);
                break;
            }
            filled += read;
        }
        Ok(frames)
    }

    /// Completed passes over the source.
    pub fn loops(&self) -> u64 {
        self.loops
    }

    /// Sample rate of the wrapped source.
    pub fn sample_rate(&self) -> u32 {
        self.inner.sample_rate()
    }

    /// Channel count of the wrapped source.
    pub fn channels(&self) -> u16 {
        self.inner.channels()
    }

    /// Position within the current pass, in frames.
    pub fn position_frames(&self) -> u64 {
        self.inner.position_frames()
    }

    /// Length of one pass, in frames.
    pub fn total_frames(&self) -> u64 {
        self.inner.total_frames()
    }

}
