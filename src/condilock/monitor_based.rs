use std::time::{Duration, Instant, SystemTime};

use parking_lot::{Condvar, Mutex};

use super::{Condilock, DEFAULT_MAX_DEADLINE_CHUNK, DEFAULT_MAX_WAIT_CHUNK};
use crate::cancellation::CancellationToken;
use crate::error::{ExecutorError, Result};

/// Condilock variant C2b: `parking_lot`'s word-sized `Mutex` + `Condvar`,
/// modelling the "intrinsic monitor" design - cheaper than an OS mutex on
/// the uncontended path and never poisoned by a panicking holder. This is
/// the default condilock used internally by [`crate::Executor`], matching
/// the lock primitive the grounding crate already reaches for in
/// `jobs/thread_pool.rs` and `threadpool.rs`.
pub struct MonitorBasedCondilock {
    mutex: Mutex<()>,
    condvar: Condvar,
}

impl Default for MonitorBasedCondilock {
    fn default() -> Self {
        Self::new()
    }
}

impl MonitorBasedCondilock {
    pub fn new() -> Self {
        Self {
            mutex: Mutex::new(()),
            condvar: Condvar::new(),
        }
    }
}

impl Condilock for MonitorBasedCondilock {
    fn signal_all_in_lock(&self) {
        let _guard = self.mutex.lock();
        self.condvar.notify_all();
    }

    fn signal_one_in_lock(&self) {
        let _guard = self.mutex.lock();
        self.condvar.notify_one();
    }

    fn await_while_false(
        &self,
        predicate: &mut dyn FnMut() -> bool,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<bool> {
        if predicate() {
            return Ok(true);
        }

        let start = Instant::now();
        let mut guard = self.mutex.lock();

        loop {
            if predicate() {
                return Ok(true);
            }

            let elapsed = start.elapsed();
            if elapsed >= timeout {
                return Ok(false);
            }

            if cancel.take() {
                return Err(ExecutorError::Cancelled);
            }

            let remaining = timeout - elapsed;
            let chunk = remaining.min(DEFAULT_MAX_WAIT_CHUNK);

            self.condvar.wait_for(&mut guard, chunk);
        }
    }

    fn await_until_deadline(
        &self,
        predicate: &mut dyn FnMut() -> bool,
        deadline: SystemTime,
        cancel: &CancellationToken,
    ) -> Result<bool> {
        if predicate() {
            return Ok(true);
        }

        let mut guard = self.mutex.lock();

        loop {
            if predicate() {
                return Ok(true);
            }

            let now = SystemTime::now();
            let remaining = match deadline.duration_since(now) {
                Ok(remaining) => remaining,
                Err(_) => return Ok(false),
            };

            if cancel.take() {
                return Err(ExecutorError::Cancelled);
            }

            let chunk = remaining.min(DEFAULT_MAX_DEADLINE_CHUNK);

            self.condvar.wait_for(&mut guard, chunk);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::thread;

    use super::*;

    #[test]
    fn fast_path_does_not_block() {
        let condilock = MonitorBasedCondilock::new();
        let cancel = CancellationToken::new();

        let result = condilock.await_while_false(&mut || true, Duration::from_secs(10), &cancel);
        assert_eq!(result.unwrap(), true);
    }

    #[test]
    fn wakes_up_when_signalled() {
        let condilock = Arc::new(MonitorBasedCondilock::new());
        let flag = Arc::new(AtomicBool::new(false));
        let cancel = CancellationToken::new();

        let signaller_condilock = condilock.clone();
        let signaller_flag = flag.clone();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            signaller_flag.store(true, Ordering::SeqCst);
            signaller_condilock.signal_all_in_lock();
        });

        let result = condilock.await_while_false(
            &mut || flag.load(Ordering::SeqCst),
            Duration::from_secs(5),
            &cancel,
        );

        handle.join().unwrap();
        assert_eq!(result.unwrap(), true);
    }

    #[test]
    fn cancellation_is_observed() {
        let condilock = MonitorBasedCondilock::new();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result =
            condilock.await_while_false(&mut || false, Duration::from_secs(5), &cancel);
        assert!(matches!(result, Err(ExecutorError::Cancelled)));
    }
}
