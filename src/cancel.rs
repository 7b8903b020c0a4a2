//! Cooperative cancellation for the control loop.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

/// A cloneable cancellation handle.
///
/// Signal handlers or other threads call [`cancel()`](Self::cancel); the
/// control loop polls [`is_cancelled()`](Self::is_cancelled) once per
/// iteration. Requests are counted so a second request can escalate, e.g. to
/// abort the final drain after a first request stopped decoding. The hardware
/// callback never reads this.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    requests: Arc<AtomicU32>,
}

impl CancelToken {
    /// Creates a token with no requests.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one cancellation request.
    pub fn cancel(&self) {
        self.requests.fetch_add(1, Ordering::SeqCst);
    }

    /// Returns `true` once at least one request has been made.
    pub fn is_cancelled(&self) -> bool {
        self.requests() > 0
    }

    /// Number of requests made so far.
    pub fn requests(&self) -> u32 {
        self.requests.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_state() {
        let token = CancelToken::new();
        let handle = token.clone();
        assert!(!token.is_cancelled());

        handle.cancel();
        assert!(token.is_cancelled());
        assert_eq!(token.requests(), 1);

        handle.cancel();
        assert_eq!(token.requests(), 2);
    }

    #[test]
    fn test_cancel_from_other_thread() {
        let token = CancelToken::new();
        let handle = token.clone();
        std::thread::spawn(move || handle.cancel()).join().unwrap();
        assert!(token.is_cancelled());
    }
}
