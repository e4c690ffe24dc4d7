//! One-way cancellation flag shared between a run and whoever controls it.
//!
//! The token is created per run and handed to the pipeline explicitly, so two
//! concurrent runs can never cancel each other through shared global state.
//! Cancellation is cooperative: the pipeline checks the flag before starting
//! each page and never interrupts a render or recognition call in flight.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared flag with two states, idle and requested. Never resets.
///
/// Clones share the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    requested: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the run to stop before its next page. Idempotent.
    pub fn request(&self) {
        self.requested.store(true, Ordering::Release);
    }

    /// Whether cancellation has been requested. Never blocks.
    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_token_is_idle() {
        assert!(!CancellationToken::new().is_requested());
    }

    #[test]
    fn request_is_idempotent() {
        let token = CancellationToken::new();
        token.request();
        token.request();
        token.request();
        assert!(token.is_requested());
    }

    #[test]
    fn clones_share_state() {
        let token = CancellationToken::new();
        let observer = token.clone();
        token.request();
        assert!(observer.is_requested());
    }

    #[test]
    fn request_from_another_thread_is_visible() {
        let token = CancellationToken::new();
        let remote = token.clone();
        std::thread::spawn(move || remote.request())
            .join()
            .unwrap();
        assert!(token.is_requested());
    }
}
