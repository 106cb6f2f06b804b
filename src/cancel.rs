use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// Cooperative cancellation handle shared between a query and its caller.
///
/// The evaluator polls the signal before acting on each step and at every
/// visit of a recursive descent, failing with [`ErrorCode::Cancelled`] once
/// tripped. Cloning is cheap; every clone observes the same flag. A caller
/// needing a deadline trips the signal from a timer thread.
///
/// [`ErrorCode::Cancelled`]: crate::ErrorCode::Cancelled
#[derive(Clone, Default)]
pub struct CancelSignal {
    shared: Arc<Shared>,
}

#[derive(Default)]
struct Shared {
    done: AtomicBool,
    reason: Mutex<Option<String>>,
}

impl CancelSignal {
    /// A fresh, untripped signal.
    pub fn new() -> Self {
        Self::default()
    }

    /// Trip the signal. The first recorded reason wins; later calls only
    /// keep the flag set.
    pub fn cancel(&self, reason: impl Into<String>) {
        if let Ok(mut slot) = self.shared.reason.lock() {
            if slot.is_none() {
                *slot = Some(reason.into());
            }
        }
        self.shared.done.store(true, Ordering::SeqCst);
    }

    /// Whether the signal has been tripped.
    pub fn is_done(&self) -> bool {
        self.shared.done.load(Ordering::SeqCst)
    }

    /// The reason recorded when the signal was tripped, if any.
    pub fn reason(&self) -> Option<String> {
        self.shared.reason.lock().ok().and_then(|slot| slot.clone())
    }
}

impl fmt::Debug for CancelSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancelSignal")
            .field("done", &self.is_done())
            .field("reason", &self.reason())
            .finish()
    }
}
