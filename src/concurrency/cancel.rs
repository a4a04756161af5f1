//! Cooperative cancellation token.
//!
//! A [`CancelSource`] owns the signal; [`CancelToken`] clones observe it.
//! Cancellation is cooperative: long-running loops check
//! [`CancelToken::is_cancelled`] at their heads, and select-style code awaits
//! [`CancelToken::cancelled`]. Tokens are cheap to clone and keep the
//! underlying channel alive, so a token outliving its source still resolves
//! correctly.

use std::sync::Arc;

use tokio::sync::watch;

use crate::core::errors::{Result, ScannerError};

/// The owning side of a cancellation signal.
#[derive(Debug, Clone)]
pub struct CancelSource {
    tx: Arc<watch::Sender<bool>>,
}

impl CancelSource {
    /// Create a new, un-cancelled source.
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Derive an observing token.
    pub fn token(&self) -> CancelToken {
        CancelToken {
            rx: self.tx.subscribe(),
            _keepalive: Arc::clone(&self.tx),
        }
    }

    /// Fire the signal. Idempotent.
    pub fn cancel(&self) {
        let _ = self.tx.send(true);
    }

    /// True once [`CancelSource::cancel`] has been called.
    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }
}

impl Default for CancelSource {
    fn default() -> Self {
        Self::new()
    }
}

/// An observer of a cancellation signal.
#[derive(Debug, Clone)]
pub struct CancelToken {
    rx: watch::Receiver<bool>,
    _keepalive: Arc<watch::Sender<bool>>,
}

impl CancelToken {
    /// A token that never fires. Useful as a default for callers without a
    /// cancellation scope.
    pub fn never() -> Self {
        CancelSource::new().token()
    }

    /// True once the owning source has cancelled.
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolve when the owning source cancels. Never resolves for
    /// [`CancelToken::never`].
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        // wait_for only errs when the sender is gone; the keepalive makes
        // that unreachable, but degrade to pending rather than spuriously
        // resolving.
        if rx.wait_for(|cancelled| *cancelled).await.is_err() {
            std::future::pending::<()>().await;
        }
    }

    /// Loop-head guard: `Err(Cancelled)` once the signal fired.
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(ScannerError::Cancelled)
        } else {
            Ok(())
        }
    }
}
