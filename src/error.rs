//! Error types for loop-audio.
//!
//! Errors are split into two categories:
//! - **Engine errors** ([`AudioError`]): device lifecycle, buffer and transport failures
//! - **Source errors** ([`SourceError`]): opening or decoding a [`FrameSource`](crate::FrameSource)
//!
//! Buffer overflow and underrun are not errors. They are masked in the real-time
//! path (truncation and zero-fill) and only show up in
//! [`DeviceStats`](crate::DeviceStats) and [`PlaybackEvent`](crate::PlaybackEvent)s.

use std::path::PathBuf;
use std::time::Duration;

/// Errors raised by the audio engine.
///
/// Hardware-boundary failures (open/start/stop/close/terminate) are also
/// recorded on the device and can be read back with
/// [`AudioDevice::status()`](crate::AudioDevice::status).
#[derive(Debug, thiserror::Error)]
pub enum AudioError {
    /// The device could not be opened or started.
    #[error("device unavailable: {name} - {reason}")]
    DeviceUnavailable {
        /// Name of the unavailable device.
        name: String,
        /// Reason the device is unavailable.
        reason: String,
    },

    /// No device exists at the requested index.
    #[error("no {direction} device at index {index}")]
    DeviceNotFound {
        /// Requested device index.
        index: usize,
        /// "input" or "output".
        direction: &'static str,
    },

    /// No default device is configured on this system.
    #[error("no default {direction} device configured")]
    NoDefaultDevice {
        /// "input" or "output".
        direction: &'static str,
    },

    /// The requested sample format is not supported.
    #[error("unsupported sample format: {format}")]
    UnsupportedFormat {
        /// The format that wasn't supported.
        format: String,
    },

    /// A configuration value is out of range.
    #[error("invalid configuration: {reason}")]
    InvalidConfig {
        /// What is wrong with the configuration.
        reason: String,
    },

    /// The operation is not allowed in the device's current state.
    #[error("cannot {operation} while device is {state}")]
    InvalidState {
        /// The attempted operation.
        operation: &'static str,
        /// The device state at the time.
        state: &'static str,
    },

    /// A blocking operation did not complete before its deadline.
    #[error("timed out after {waited:?}")]
    Timeout {
        /// How long the caller waited.
        waited: Duration,
    },

    /// A chunk is not smaller than the ring buffer, so a blocking write could
    /// never proceed.
    #[error("chunk of {frames} frames does not fit a ring buffer of {capacity} frames")]
    ChunkTooLarge {
        /// Frames in the rejected chunk.
        frames: usize,
        /// Ring buffer capacity in frames.
        capacity: usize,
    },

    /// The ring buffer backing store could not be allocated.
    #[error("failed to allocate ring buffer of {cells} cells")]
    Allocation {
        /// Requested capacity in cells.
        cells: usize,
    },

    /// A gain matrix channel index is out of range.
    #[error("channel index {index} out of range (have {count})")]
    ChannelOutOfRange {
        /// Requested index.
        index: usize,
        /// Number of channels.
        count: usize,
    },

    /// An error from the underlying audio library (CPAL).
    #[error("audio backend error: {0}")]
    BackendError(String),

    /// The frame source failed.
    #[error(transparent)]
    Source(#[from] SourceError),
}

impl AudioError {
    /// Creates an invalid configuration error with the given reason.
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }

    /// Creates a backend error from anything printable.
    pub fn backend(err: impl std::fmt::Display) -> Self {
        Self::BackendError(err.to_string())
    }

    /// Returns `true` for [`AudioError::Timeout`].
    ///
    /// Timeouts are recoverable: the caller may retry or abort.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

/// Errors that can occur while opening or decoding a frame source.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// The file could not be opened or its header could not be parsed.
    #[error("cannot open {path}: {source}")]
    Open {
        /// Path to the file.
        path: PathBuf,
        /// The underlying decoder error.
        #[source]
        source: hound::Error,
    },

    /// Sample data could not be decoded.
    #[error("decode error: {0}")]
    Decode(#[from] hound::Error),

    /// The file uses an encoding this crate does not decode.
    #[error("unsupported wave format: {reason}")]
    Unsupported {
        /// Description of the unsupported format.
        reason: String,
    },

    /// A directory contained no playable files.
    #[error("no playable .wav files in {path}")]
    EmptyPlaylist {
        /// The directory that was scanned.
        path: PathBuf,
    },

    /// A playlist entry does not match the playlist's format.
    #[error("{path}: {found_rate}Hz/{found_channels}ch does not match {rate}Hz/{channels}ch")]
    FormatMismatch {
        /// The mismatching file.
        path: PathBuf,
        /// Playlist sample rate.
        rate: u32,
        /// Playlist channel count.
        channels: u16,
        /// File sample rate.
        found_rate: u32,
        /// File channel count.
        found_channels: u16,
    },

    /// File system error.
    #[error("io error: {path}: {source}")]
    Io {
        /// Path involved in the failure.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

impl SourceError {
    /// Creates an I/O error for the given path.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Creates an open error, mapping hound's format rejections to `Unsupported`.
    pub fn open(path: impl Into<PathBuf>, source: hound::Error) -> Self {
        match source {
            hound::Error::Unsupported => Self::Unsupported {
                reason: "encoding not supported by the decoder".to_string(),
            },
            hound::Error::FormatError(reason) => Self::Unsupported {
                reason: reason.to_string(),
            },
            source => Self::Open {
                path: path.into(),
                source,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audio_error_display() {
        let err = AudioError::DeviceUnavailable {
            name: "USB DAC".to_string(),
            reason: "busy".to_string(),
        };
        assert_eq!(err.to_string(), "device unavailable: USB DAC - busy");
    }

    #[test]
    fn test_timeout_is_recoverable() {
        let err = AudioError::Timeout {
            waited: Duration::from_millis(10),
        };
        assert!(err.is_timeout());
        assert!(!AudioError::invalid_config("x").is_timeout());
    }

    #[test]
    fn test_chunk_too_large_display() {
        let err = AudioError::ChunkTooLarge {
            frames: 4096,
            capacity: 1024,
        };
        assert_eq!(
            err.to_string(),
            "chunk of 4096 frames does not fit a ring buffer of 1024 frames"
        );
    }

    #[test]
    fn test_source_error_converts() {
        let err: AudioError = SourceError::EmptyPlaylist {
            path: PathBuf::from("/tmp/loops"),
        }
        .into();
        assert!(err.to_string().contains("/tmp/loops"));
    }

    #[test]
    fn test_source_error_open_maps_unsupported() {
        let err = SourceError::open("a.wav", hound::Error::Unsupported);
        assert!(matches!(err, SourceError::Unsupported { .. }));
    }

    #[test]
    fn test_source_error_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err = SourceError::io("/tmp/none.wav", io_err);
        assert!(err.to_string().contains("/tmp/none.wav"));
    }
}
