//! Runtime events for monitoring playback.
//!
//! Events are non-fatal notifications. Playback continues after any event is
//! emitted; they exist for status displays and logging, not error handling.

use std::sync::Arc;
use std::time::Duration;

/// Runtime events emitted by the [`Player`](crate::Player).
///
/// # Example
///
/// ```
/// use loop_audio::PlaybackEvent;
///
/// fn handle_event(event: PlaybackEvent) {
///     match event {
///         PlaybackEvent::Progress { buffered_frames, capacity_frames, .. } => {
///             eprintln!("buffer {buffered_frames}/{capacity_frames}");
///         }
///         PlaybackEvent::WriteTimeout { waited } => {
///             eprintln!("device stalled for {waited:?}");
///         }
///         other => eprintln!("{other:?}"),
///     }
/// }
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum PlaybackEvent {
    /// The device was started and playback is about to begin.
    Started {
        /// Negotiated sample rate.
        sample_rate: u32,
        /// Negotiated channel count.
        channels: u16,
    },

    /// A chunk was queued to the device.
    Progress {
        /// Valid frames in the chunk just written.
        frames: usize,
        /// Frames waiting in the ring buffer after the write.
        buffered_frames: usize,
        /// Ring buffer capacity in frames.
        capacity_frames: usize,
        /// Frame count of the most recent hardware callback.
        callback_frames: usize,
        /// Source position after the chunk, in frames.
        position_frames: u64,
        /// Total source length in frames.
        total_frames: u64,
        /// Absolute peak of the chunk (0.0 to 1.0 for in-range audio).
        peak: f32,
    },

    /// The source reached its end and was rewound without a gap.
    Looped {
        /// Number of completed passes so far.
        count: u64,
    },

    /// A blocking write found no room before its timeout. It is retried.
    WriteTimeout {
        /// How long the write waited.
        waited: Duration,
    },

    /// Decoding stopped; waiting for the ring buffer to empty.
    Draining {
        /// Frames still queued when draining began.
        buffered_frames: usize,
    },

    /// Playback ended normally.
    Finished {
        /// Total frames queued to the device.
        frames_written: u64,
    },

    /// Playback was cancelled.
    Interrupted,
}

/// Callback type for receiving playback events.
///
/// Register one with [`Player::with_event_callback()`](crate::Player::with_event_callback).
/// The callback runs on the control thread, never on the hardware thread.
pub type EventCallback = Arc<dyn Fn(PlaybackEvent) + Send + Sync>;

/// Creates an [`EventCallback`] from a closure.
///
/// # Example
///
/// ```
/// use loop_audio::{event_callback, PlaybackEvent};
///
/// let callback = event_callback(|event| {
///     println!("Got event: {:?}", event);
/// });
/// callback(PlaybackEvent::Interrupted);
/// ```
pub fn event_callback<F>(f: F) -> EventCallback
where
    F: Fn(PlaybackEvent) + Send + Sync + 'static,
{
    Arc::new(f)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_playback_event_debug() {
        let event = PlaybackEvent::Looped { count: 3 };
        let debug = format!("{:?}", event);
        assert!(debug.contains("Looped"));
        assert!(debug.contains('3'));
    }

    #[test]
    fn test_event_callback_helper() {
        use std::sync::atomic::{AtomicBool, Ordering};

        let called = Arc::new(AtomicBool::new(false));
        let called_clone = called.clone();

        let callback = event_callback(move |_| {
            called_clone.store(true, Ordering::SeqCst);
        });

        callback(PlaybackEvent::Interrupted);
        assert!(called.load(Ordering::SeqCst));
    }
}
