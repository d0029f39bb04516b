//! Cooperative cancellation for resolution runs.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::{Result, TufError};

/// A cloneable flag shared between a caller and a running resolution.
///
/// Clones observe the same flag, so a caller can hand one clone to the
/// resolver and cancel from another thread.
///
/// # Examples
///
/// ```
/// use tuf_resolver::cancel::CancelToken;
///
/// let token = CancelToken::new();
/// let observer = token.clone();
/// token.cancel();
/// assert!(observer.is_cancelled());
/// ```
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    /// A token that has not been cancelled.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation has been requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Fail with [`TufError::Cancelled`] once cancellation was requested.
    ///
    /// # Errors
    ///
    /// Returns [`TufError::Cancelled`] when the token has been cancelled.
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(TufError::Cancelled)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_token_passes_check() {
        assert!(CancelToken::new().check().is_ok());
    }

    #[test]
    fn cancelled_token_fails_check_across_threads() {
        let token = CancelToken::new();
        let remote = token.clone();
        std::thread::spawn(move || remote.cancel())
            .join()
            .expect("cancel thread");
        assert!(matches!(token.check(), Err(TufError::Cancelled)));
    }
}
