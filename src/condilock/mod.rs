//! The condilock abstraction: a fused mutex + condition variable +
//! predicate-waiter, in three flavours (see `SPEC_FULL.md` §4.1 and §9).
//!
//! All three implementations share the same wait-chunk policy: a wait for
//! timeout `T` is decomposed into bounded sub-waits, re-checking the
//! predicate after each one, so that liveness survives wall-clock jumps and
//! relaxed-store signal loss. The check order inside the loop is always
//! predicate -> time -> cancellation -> wait.

mod lock_based;
mod monitor_based;
mod passive;

use std::time::{Duration, SystemTime};

pub use lock_based::LockBasedCondilock;
pub use monitor_based::MonitorBasedCondilock;
pub use passive::PassiveCondilock;

use crate::cancellation::CancellationToken;
use crate::error::Result;

/// Sub-waits are capped at this length when waiting against a relative
/// timeout (a monotonic clock can't drift, so this mostly bounds how often
/// the predicate gets re-checked under contention).
pub(crate) const DEFAULT_MAX_WAIT_CHUNK: Duration = Duration::from_millis(250);

/// Sub-waits are capped lower when waiting against a wall-clock deadline,
/// since the wall clock can jump or drift and a stale observation should
/// not be trusted for long.
pub(crate) const DEFAULT_MAX_DEADLINE_CHUNK: Duration = Duration::from_millis(50);

/// A fused mutex + condition variable + predicate-waiter.
///
/// # The passive-condilock asymmetry
///
/// [`PassiveCondilock`] is a no-op condilock meant for a genuinely
/// single-threaded host: nothing else could ever run to flip the
/// predicate, so [`Condilock::await_while_false`] on it returns
/// `Err(ExecutorError::InvalidState)` the moment the predicate is false on
/// entry, rather than spin-waiting forever the way a naive unification with
/// the active condilocks would. This is deliberate, not an oversight: a
/// false predicate handed to a passive condilock is a programmer error
/// (the caller forgot that nothing is on the other end to signal it), so
/// it fails fast instead of hanging.
pub trait Condilock: Send + Sync {
    /// Acquires the lock, wakes every waiter, releases the lock.
    fn signal_all_in_lock(&self);

    /// Acquires the lock, wakes a single waiter, releases the lock.
    /// Defaults to waking everyone; concrete variants override this with a
    /// real `notify_one` where that's cheaper.
    fn signal_one_in_lock(&self) {
        self.signal_all_in_lock();
    }

    /// Returns `true` the moment `predicate` becomes true, `false` if
    /// `timeout` elapses first. The fast path (predicate already true on
    /// entry) never touches the lock and never observes `cancel`.
    fn await_while_false(
        &self,
        predicate: &mut dyn FnMut() -> bool,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<bool>;

    /// Like [`Condilock::await_while_false`], but measured against a
    /// wall-clock deadline rather than a relative timeout. Never mix this
    /// with [`Condilock::await_while_false`]'s monotonic clock.
    fn await_until_deadline(
        &self,
        predicate: &mut dyn FnMut() -> bool,
        deadline: SystemTime,
        cancel: &CancellationToken,
    ) -> Result<bool>;

    /// Same contract as [`Condilock::await_while_false`], except a fired
    /// cancellation token is not propagated as `Err` — it is re-armed on
    /// `cancel` so that the caller observes it was interrupted without the
    /// wait itself being cut short.
    fn await_while_false_uninterruptibly(
        &self,
        predicate: &mut dyn FnMut() -> bool,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> bool {
        let mut was_cancelled = false;
        let result = loop {
            match self.await_while_false(predicate, timeout, cancel) {
                Ok(done) => break done,
                Err(_) => {
                    was_cancelled = true;
                    // Cancellation was absorbed; re-evaluate immediately
                    // rather than waiting out a fresh full timeout.
                    if predicate() {
                        break true;
                    }
                    break false;
                }
            }
        };

        if was_cancelled {
            cancel.cancel();
        }

        result
    }
}
