use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant, SystemTime};

use super::{Condilock, DEFAULT_MAX_DEADLINE_CHUNK, DEFAULT_MAX_WAIT_CHUNK};
use crate::cancellation::CancellationToken;
use crate::error::{ExecutorError, Result};

/// Condilock variant C2a: a plain `std::sync::Mutex` + `std::sync::Condvar`
/// pair. This is the portable baseline implementation.
pub struct LockBasedCondilock {
    mutex: Mutex<()>,
    condvar: Condvar,
}

impl Default for LockBasedCondilock {
    fn default() -> Self {
        Self::new()
    }
}

impl LockBasedCondilock {
    pub fn new() -> Self {
        Self {
            mutex: Mutex::new(()),
            condvar: Condvar::new(),
        }
    }
}

impl Condilock for LockBasedCondilock {
    fn signal_all_in_lock(&self) {
        let _guard = self.mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        self.condvar.notify_all();
    }

    fn signal_one_in_lock(&self) {
        let _guard = self.mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
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
        let mut guard = self
            .mutex
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

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

            let (next_guard, _timed_out) = self
                .condvar
                .wait_timeout(guard, chunk)
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            guard = next_guard;
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

        let mut guard = self
            .mutex
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

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

            let (next_guard, _timed_out) = self
                .condvar
                .wait_timeout(guard, chunk)
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            guard = next_guard;
        }
    }
}
