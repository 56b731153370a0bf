//! One-shot broadcast signal.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio_util::sync::CancellationToken;

/// A signal that fires at most once and wakes every waiter.
///
/// Clones share the same state. Waiters arriving after the event fired return
/// immediately.
#[derive(Debug, Clone, Default)]
pub struct Event {
    inner: Arc<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    fired: AtomicBool,
    done: CancellationToken,
}

impl Event {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fires the event. Returns `true` only for the call that fired it.
    pub fn fire(&self) -> bool {
        let first = self
            .inner
            .fired
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if first {
            self.inner.done.cancel();
        }
        first
    }

    pub fn has_fired(&self) -> bool {
        self.inner.fired.load(Ordering::Acquire)
    }

    /// Resolves once the event has fired.
    pub async fn wait(&self) {
        self.inner.done.cancelled().await;
    }
}
