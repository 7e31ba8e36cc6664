//! Cooperative cancellation for the periodic loop.
//!
//! A [`CancellationToken`] is the only channel between the asynchronous
//! signal context and the loop. The signal side only ever stores `true`;
//! the loop polls once per iteration boundary. Release/acquire ordering
//! guarantees the loop observes the most recent store.

use crossbeam_utils::CachePadded;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared cancellation flag.
///
/// Cloning yields another handle to the same flag. Storing to it is
/// async-signal-safe.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    flag: Arc<CachePadded<AtomicBool>>,
}

impl CancellationToken {
    /// Create a token in the not-cancelled state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Idempotent.
    #[inline]
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Release);
    }

    /// Check whether cancellation has been requested.
    #[inline]
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_default() {
        let token = CancellationToken::new();
        assert!(!token.is_cancelled());
    }

    #[test]
    fn test_clones_share_flag() {
        let token = CancellationToken::new();
        let writer = token.clone();
        writer.cancel();
        assert!(token.is_cancelled());

        writer.cancel();
        assert!(token.is_cancelled());
    }

    #[test]
    fn test_cancel_from_other_thread() {
        let token = CancellationToken::new();
        let writer = token.clone();
        std::thread::spawn(move || writer.cancel()).join().unwrap();
        assert!(token.is_cancelled());
    }
}
