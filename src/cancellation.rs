use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A per-thread cancellation signal.
///
/// Rust threads have no built-in interrupt mechanism, so `interrupt_workers`
/// and the condilocks' cancellable waits are expressed in terms of this
/// token instead: setting it is "the thread has been interrupted", and
/// clearing it is consulted the same way `Thread::isInterrupted` would be.
#[derive(Clone)]
pub struct CancellationToken {
    token: Arc<AtomicBool>,
}

impl CancellationToken {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self {
            token: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.load(Ordering::SeqCst)
    }

    pub fn cancel(&self) {
        self.token.store(true, Ordering::SeqCst);
    }

    /// Clears the token, returning whether it had fired.
    ///
    /// Idle workers that absorb a spurious cancellation must not carry it
    /// forward into the next task, so the take-condition wait loop clears
    /// the token here rather than merely reading it.
    pub fn take(&self) -> bool {
        self.token.swap(false, Ordering::SeqCst)
    }
}
