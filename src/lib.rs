//! # loop-audio
//!
//! **Note:** This crate is under active development. The API may change before 1.0.
//!
//! Real-time audio output (and input) through a fixed-size ring buffer, with
//! gapless WAV looping on top.
//!
//! `loop-audio` opens a hardware stream via CPAL and decouples the real-time
//! callback from everything else with a lock-bounded ring buffer. The control
//! thread writes chunks whenever there is room; the callback drains them and
//! pads any shortfall with silence, so an underrun is heard as a gap rather
//! than as garbage.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use loop_audio::backend::CpalBackend;
//! use loop_audio::source::{LoopingSource, WavSource};
//! use loop_audio::{AudioDevice, CancelToken, DeviceConfig, PlaybackConfig, Player};
//!
//! let source = WavSource::open("drums.wav")?;
//! let config = DeviceConfig {
//!     sample_rate: loop_audio::source::FrameSource::sample_rate(&source),
//!     ..Default::default()
//! };
//! let mut device = AudioDevice::open(Box::new(CpalBackend::new()), config);
//!
//! let cancel = CancelToken::new();
//! let report = Player::new(PlaybackConfig::default())
//!     .with_event_callback(loop_audio::event_callback(|e| tracing::debug!(?e, "playback event")))
//!     .run(&mut device, &mut LoopingSource::new(source), &cancel)?;
//! println!("{} loops", report.loops);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Architecture
//!
//! The crate maintains a strict thread boundary:
//!
//! ```text
//!  control thread                              hardware thread
//! ┌──────────────────────────────┐           ┌──────────────────────┐
//! │ FrameSource → LoopingSource  │           │ backend callback     │
//! │   → GainMatrix → Player      │──write──▶ │  RingBuffer ─▶ out   │
//! │   blocking_write / wait      │   Ring    │  ZeroFill on short   │
//! └──────────────────────────────┘  Buffer   └──────────────────────┘
//! ```
//!
//! - **Hardware thread**: high-priority callback that never allocates, logs or
//!   waits on anything but the ring buffer's bounded copy
//! - **Ring buffer**: one exclusive lock, held only for a single transfer;
//!   overflow truncates, underrun reads short
//! - **Control thread**: decodes, remaps channels and blocks (with a timeout)
//!   until the ring has room

#![warn(missing_docs)]
// Audio code requires intentional numeric casts between sample formats
#![allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_possible_wrap,
    clippy::cast_lossless
)]
#![cfg_attr(test, allow(clippy::unwrap_used))]
// These doc lints are too strict for internal implementation details
#![allow(clippy::missing_panics_doc, clippy::missing_errors_doc)]

pub mod backend;
mod cancel;
mod config;
pub mod device;
mod error;
mod event;
pub mod format;
pub mod pipeline;
mod player;
pub mod source;

pub use backend::{list_input_devices, list_output_devices, AudioBackend, DeviceInfo};
pub use cancel::CancelToken;
pub use config::{
    DeviceConfig, DeviceSelection, Direction, PlaybackConfig, DEFAULT_CHUNK_FRAMES,
    DEFAULT_RING_CHUNKS,
};
pub use device::{AudioDevice, DeviceState, DeviceStats};
pub use error::{AudioError, SourceError};
pub use event::{event_callback, EventCallback, PlaybackEvent};
pub use format::{SampleCell, SampleEncoding};
pub use player::{PlaybackReport, Player};
pub use source::FrameSource;
