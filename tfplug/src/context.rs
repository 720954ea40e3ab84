//! Request-scoped cancellation
//!
//! Every callback receives a [`Context`]. The gRPC service hands out clones of
//! one root context and cancels it when Terraform sends `StopProvider`, so any
//! in-flight work racing [`Context::cancelled`] is abandoned.

use std::sync::Arc;
use tokio::sync::watch;

/// Context carries the cancellation signal for a provider operation
/// Clones share the same signal
#[derive(Clone)]
pub struct Context {
    inner: Arc<ContextInner>,
}

struct ContextInner {
    done: watch::Receiver<bool>,
    done_tx: watch::Sender<bool>,
}

impl Context {
    pub fn new() -> Self {
        let (done_tx, done) = watch::channel(false);

        Self {
            inner: Arc::new(ContextInner { done, done_tx }),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        *self.inner.done.borrow()
    }

    /// Channel that flips to `true` once the context is cancelled
    fn done(&self) -> watch::Receiver<bool> {
        self.inner.done.clone()
    }

    /// Resolves once the context has been cancelled
    pub async fn cancelled(&self) {
        let mut done = self.done();
        // The sender lives in `inner`, so the channel stays open while `self` exists.
        let _ = done.wait_for(|cancelled| *cancelled).await;
    }

    pub fn cancel(&self) {
        self.inner.done_tx.send_replace(true);
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}
