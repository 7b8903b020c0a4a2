//! Buffering between the control thread and the hardware callback.
//!
//! ```text
//! FrameSource → Player → RingBuffer → hardware callback → device
//!                                   ↘ ZeroFill (underrun / paused)
//! ```
//!
//! - **RingBuffer**: lock-bounded circular store; overflow truncates, underrun reads short
//! - **ZeroFill**: pre-allocated silence used to pad short reads

mod ring_buffer;
mod zero_fill;

pub use ring_buffer::RingBuffer;
pub use zero_fill::ZeroFill;
