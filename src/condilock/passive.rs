use std::time::{Duration, SystemTime};

use super::Condilock;
use crate::cancellation::CancellationToken;
use crate::error::{ExecutorError, Result};

/// Condilock variant C2c: a no-op condilock for a genuinely
/// single-threaded host. There is no other thread that could ever make the
/// predicate true, so a false predicate on entry is treated as a
/// programmer error rather than something to wait out.
#[derive(Default)]
pub struct PassiveCondilock;

impl PassiveCondilock {
    pub fn new() -> Self {
        Self
    }
}

impl Condilock for PassiveCondilock {
    fn signal_all_in_lock(&self) {
        // No-op: nothing is ever waiting.
    }

    fn await_while_false(
        &self,
        predicate: &mut dyn FnMut() -> bool,
        _timeout: Duration,
        _cancel: &CancellationToken,
    ) -> Result<bool> {
        if predicate() {
            Ok(true)
        } else {
            Err(ExecutorError::invalid_state(
                "PassiveCondilock::await_while_false called with a false predicate and no other \
                 thread able to signal it",
            ))
        }
    }

    fn await_until_deadline(
        &self,
        predicate: &mut dyn FnMut() -> bool,
        _deadline: SystemTime,
        _cancel: &CancellationToken,
    ) -> Result<bool> {
        if predicate() {
            Ok(true)
        } else {
            Err(ExecutorError::invalid_state(
                "PassiveCondilock::await_until_deadline called with a false predicate and no \
                 other thread able to signal it",
            ))
        }
    }
}
