//! State shared between the control thread and the hardware callback.
//!
//! Everything the callback touches lives in [`CallbackState`], handed to the
//! backend as an `Arc` when the stream is opened. The callback paths below
//! never allocate, log, or block on anything but the ring buffer's bounded
//! critical section.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};

use crate::config::Direction;
use crate::format::{CellSample, SampleCell};
use crate::pipeline::{RingBuffer, ZeroFill};

/// Transfer statistics for one open device.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeviceStats {
    /// Hardware callbacks serviced.
    pub callbacks: u64,
    /// Frames moved between the ring buffer and the hardware.
    pub frames_transferred: u64,
    /// Output frames padded with silence because the ring ran dry.
    pub underrun_frames: u64,
    /// Frames discarded because the ring buffer was full.
    pub overflow_frames: u64,
    /// Frame count requested by the most recent callback.
    pub last_callback_frames: usize,
}

/// Ring buffer, silence block, pause flag and counters for one stream.
pub struct CallbackState {
    ring: RingBuffer<SampleCell>,
    silence: ZeroFill<SampleCell>,
    channels: usize,
    direction: Direction,
    paused: AtomicBool,
    callbacks: AtomicU64,
    frames_transferred: AtomicU64,
    underrun_frames: AtomicU64,
    overflow_frames: AtomicU64,
    last_callback_frames: AtomicUsize,
}

impl CallbackState {
    /// Creates callback state. The device starts paused.
    pub fn new(
        ring: RingBuffer<SampleCell>,
        silence: ZeroFill<SampleCell>,
        channels: u16,
        direction: Direction,
    ) -> Self {
        Self {
            ring,
            silence,
            channels: usize::from(channels.max(1)),
            direction,
            paused: AtomicBool::new(true),
            callbacks: AtomicU64::new(0),
            frames_transferred: AtomicU64::new(0),
            underrun_frames: AtomicU64::new(0),
            overflow_frames: AtomicU64::new(0),
            last_callback_frames: AtomicUsize::new(0),
        }
    }

    /// Services one output period: fills `out` from the ring buffer and pads
    /// the remainder with silence. While paused the ring is not touched.
    ///
    /// Returns the number of frames taken from the ring.
    pub fn render_output<S: CellSample>(&self, out: &mut [S]) -> usize {
        let frames = out.len() / self.channels;
        self.begin_callback(frames);

        let paused = self.is_paused();
        let delivered = fill_output(&self.ring, &self.silence, paused, self.channels, out);
        if !paused {
            self.frames_transferred
                .fetch_add(delivered as u64, Ordering::Relaxed);
            self.underrun_frames
                .fetch_add((frames - delivered) as u64, Ordering::Relaxed);
        }
        delivered
    }

    /// Services one input period: appends whole frames of `input` to the ring
    /// buffer. Frames that do not fit are dropped. While paused nothing is
    /// stored.
    ///
    /// Returns the number of frames stored.
    pub fn capture_input<S: CellSample>(&self, input: &[S]) -> usize {
        let frames = input.len() / self.channels;
        self.begin_callback(frames);
        if self.is_paused() {
            return 0;
        }

        let stored = store_input(&self.ring, self.channels, input);
        self.frames_transferred
            .fetch_add(stored as u64, Ordering::Relaxed);
        self.overflow_frames
            .fetch_add((frames - stored) as u64, Ordering::Relaxed);
        stored
    }

    fn begin_callback(&self, frames: usize) {
        self.callbacks.fetch_add(1, Ordering::Relaxed);
        self.last_callback_frames.store(frames, Ordering::Relaxed);
    }

    pub(crate) fn ring(&self) -> &RingBuffer<SampleCell> {
        &self.ring
    }

    pub(crate) fn record_overflow(&self, frames: usize) {
        self.overflow_frames
            .fetch_add(frames as u64, Ordering::Relaxed);
    }

    pub(crate) fn set_paused(&self, paused: bool) {
        self.paused.store(paused, Ordering::SeqCst);
    }

    /// Returns `true` while the callback outputs silence (or discards input).
    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    /// Negotiated channel count.
    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Direction the stream was opened for.
    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Snapshot of the transfer counters.
    pub fn stats(&self) -> DeviceStats {
        DeviceStats {
            callbacks: self.callbacks.load(Ordering::Relaxed),
            frames_transferred: self.frames_transferred.load(Ordering::Relaxed),
            underrun_frames: self.underrun_frames.load(Ordering::Relaxed),
            overflow_frames: self.overflow_frames.load(Ordering::Relaxed),
            last_callback_frames: self.last_callback_frames.load(Ordering::Relaxed),
        }
    }
}

/// Fills one output period. Returns whole frames taken from `ring`.
///
/// When `paused`, all of `out` becomes silence and the ring is untouched.
/// Otherwise as many whole frames as are buffered are copied and everything
/// after them, including any trailing partial frame, is padded from `silence`.
pub fn fill_output<S: CellSample>(
    ring: &RingBuffer<SampleCell>,
    silence: &ZeroFill<SampleCell>,
    paused: bool,
    channels: usize,
    out: &mut [S],
) -> usize {
    if paused {
        silence.fill_map(out, |&cell| S::from_cell(cell));
        return 0;
    }
    let whole = out.len() / channels * channels;
    let read = ring.get_map(&mut out[..whole], |&cell| S::from_cell(cell));
    silence.pad_from_map(out, read, |&cell| S::from_cell(cell));
    read / channels
}

/// Stores one input period. Returns whole frames written to `ring`.
pub fn store_input<S: CellSample>(
    ring: &RingBuffer<SampleCell>,
    channels: usize,
    input: &[S],
) -> usize {
    let frames = (input.len() / channels).min(ring.free() / channels);
    ring.put_map(&input[..frames * channels], |&sample| sample.to_cell()) / channels
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(ring_frames: usize, channels: u16, direction: Direction) -> CallbackState {
        let cells = ring_frames * usize::from(channels);
        CallbackState::new(
            RingBuffer::new(cells).unwrap(),
            ZeroFill::new(64),
            channels,
            direction,
        )
    }

    fn push_frames(state: &CallbackState, samples: &[f32]) {
        state.ring().put_map(samples, |&s| SampleCell::from_f32(s));
    }

    #[test]
    fn test_starts_paused() {
        let state = state(16, 2, Direction::Output);
        assert!(state.is_paused());
    }

    #[test]
    fn test_paused_output_is_silent_and_keeps_ring() {
        let state = state(16, 2, Direction::Output);
        push_frames(&state, &[0.5; 8]);

        let mut out = vec![1.0f32; 8];
        assert_eq!(state.render_output(&mut out), 0);
        assert!(out.iter().all(|&s| s == 0.0));
        assert_eq!(state.ring().occupied(), 8);
        assert_eq!(state.stats().underrun_frames, 0);
        assert_eq!(state.stats().callbacks, 1);
    }

    #[test]
    fn test_underrun_pads_tail() {
        let state = state(16, 2, Direction::Output);
        state.set_paused(false);
        push_frames(&state, &[0.25, -0.25, 0.5, -0.5]);

        let mut out = vec![9.0f32; 8];
        assert_eq!(state.render_output(&mut out), 2);
        assert_eq!(out, vec![0.25, -0.25, 0.5, -0.5, 0.0, 0.0, 0.0, 0.0]);

        let stats = state.stats();
        assert_eq!(stats.frames_transferred, 2);
        assert_eq!(stats.underrun_frames, 2);
        assert_eq!(stats.last_callback_frames, 4);
    }

    #[test]
    fn test_output_into_integer_buffer() {
        let state = state(8, 1, Direction::Output);
        state.set_paused(false);
        state
            .ring()
            .put(&[SampleCell::from_i16(1000), SampleCell::from_i16(-1000)]);

        let mut out = vec![7i16; 3];
        assert_eq!(state.render_output(&mut out), 2);
        assert_eq!(out, vec![1000, -1000, 0]);
    }

    #[test]
    fn test_partial_trailing_frame_is_silenced() {
        let state = state(8, 2, Direction::Output);
        state.set_paused(false);
        push_frames(&state, &[0.1; 8]);

        let mut out = vec![1.0f32; 5];
        assert_eq!(state.render_output(&mut out), 2);
        assert_eq!(out[4], 0.0);
        assert_eq!(state.ring().occupied(), 4);
    }

    #[test]
    fn test_capture_drops_overflow() {
        let state = state(4, 2, Direction::Input);
        state.set_paused(false);

        let input: Vec<f32> = (0..12).map(|i| i as f32).collect();
        assert_eq!(state.capture_input(&input), 4);
        assert_eq!(state.stats().overflow_frames, 2);

        let mut cells = vec![SampleCell::SILENCE; 8];
        state.ring().get(&mut cells);
        let values: Vec<f32> = cells.iter().map(|c| c.as_f32()).collect();
        assert_eq!(values, (0..8).map(|i| i as f32).collect::<Vec<_>>());
    }

    #[test]
    fn test_paused_capture_discards() {
        let state = state(4, 1, Direction::Input);
        assert_eq!(state.capture_input(&[1i32, 2, 3]), 0);
        assert!(state.ring().is_empty());
        assert_eq!(state.stats().last_callback_frames, 3);
    }
}
