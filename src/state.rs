//! The two orthogonal lifecycle state machines (`SPEC_FULL.md` §4.3):
//! whether new submissions are accepted, and whether workers drain the
//! queue. Both are backed by a plain `u32` written only under
//! [`StateMachines::mutate`] (a single state mutex, so transitions are
//! totally ordered) and read lock-free via `Ordering::Acquire` for the
//! submission fast path.

// Under `--cfg loom`, every synchronization primitive on the path being
// model-checked has to be loom's own version so its scheduler can see and
// explore every access - see the `loom_tests` module at the bottom of this
// file.
#[cfg(not(loom))]
use std::sync::atomic::{AtomicU32, Ordering};
#[cfg(loom)]
use loom::sync::atomic::{AtomicU32, Ordering};

#[cfg(not(loom))]
use parking_lot::Mutex;
#[cfg(loom)]
use loom::sync::Mutex;

/// Locks `mutex`, abstracting over `parking_lot::Mutex` (infallible) and
/// `loom::sync::Mutex` (poison-checked) behind one call site.
#[cfg(not(loom))]
fn lock_mutex<T>(mutex: &Mutex<T>) -> impl std::ops::DerefMut<Target = T> + '_ {
    mutex.lock()
}

#[cfg(loom)]
fn lock_mutex<T>(mutex: &Mutex<T>) -> impl std::ops::DerefMut<Target = T> + '_ {
    mutex.lock().unwrap()
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum AcceptanceState {
    Yes,
    YesNeedsStart,
    No,
    NoNeedsStart,
}

impl AcceptanceState {
    fn encode(self) -> u32 {
        match self {
            AcceptanceState::Yes => 0,
            AcceptanceState::YesNeedsStart => 1,
            AcceptanceState::No => 2,
            AcceptanceState::NoNeedsStart => 3,
        }
    }

    fn decode(value: u32) -> Self {
        match value {
            0 => AcceptanceState::Yes,
            1 => AcceptanceState::YesNeedsStart,
            2 => AcceptanceState::No,
            3 => AcceptanceState::NoNeedsStart,
            other => unreachable!("invalid AcceptanceState encoding: {other}"),
        }
    }

    pub(crate) fn is_accepting(self) -> bool {
        matches!(self, AcceptanceState::Yes | AcceptanceState::YesNeedsStart)
    }

    pub(crate) fn needs_start(self) -> bool {
        matches!(
            self,
            AcceptanceState::YesNeedsStart | AcceptanceState::NoNeedsStart
        )
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum ProcessingState {
    Yes,
    YesAndDie,
    No,
    NoAndDie,
}

impl ProcessingState {
    fn encode(self) -> u32 {
        match self {
            ProcessingState::Yes => 0,
            ProcessingState::YesAndDie => 1,
            ProcessingState::No => 2,
            ProcessingState::NoAndDie => 3,
        }
    }

    fn decode(value: u32) -> Self {
        match value {
            0 => ProcessingState::Yes,
            1 => ProcessingState::YesAndDie,
            2 => ProcessingState::No,
            3 => ProcessingState::NoAndDie,
            other => unreachable!("invalid ProcessingState encoding: {other}"),
        }
    }

    pub(crate) fn must_process(self) -> bool {
        matches!(self, ProcessingState::Yes | ProcessingState::YesAndDie)
    }

    pub(crate) fn is_dying(self) -> bool {
        matches!(self, ProcessingState::YesAndDie | ProcessingState::NoAndDie)
    }
}

/// The pair of state machines plus the state mutex that serializes every
/// transition. All field reads outside of [`StateMachines::mutate`] are
/// lock-free atomic loads.
pub(crate) struct StateMachines {
    acceptance: AtomicU32,
    processing: AtomicU32,
    // Guards every transition below so the two fields are updated as one
    // atomic event from an external observer's point of view, even though
    // they're stored in two separate atomics.
    transition_mutex: Mutex<()>,
}

impl StateMachines {
    pub(crate) fn new(threadless: bool) -> Self {
        let initial_acceptance = if threadless {
            // Threadless mode's sole worker is the caller entering
            // `start_and_work_in_current_thread`; nothing needs lazy
            // worker-thread startup, but submissions must still be
            // allowed to queue before that call happens (§4.7).
            AcceptanceState::Yes
        } else {
            AcceptanceState::YesNeedsStart
        };

        Self {
            acceptance: AtomicU32::new(initial_acceptance.encode()),
            processing: AtomicU32::new(ProcessingState::Yes.encode()),
            transition_mutex: Mutex::new(()),
        }
    }

    pub(crate) fn acceptance(&self) -> AcceptanceState {
        AcceptanceState::decode(self.acceptance.load(Ordering::Acquire))
    }

    pub(crate) fn processing(&self) -> ProcessingState {
        ProcessingState::decode(self.processing.load(Ordering::Acquire))
    }

    pub(crate) fn is_shutdown(&self) -> bool {
        self.processing().is_dying()
    }

    fn set_acceptance(&self, state: AcceptanceState) {
        self.acceptance.store(state.encode(), Ordering::Release);
    }

    fn set_processing(&self, state: ProcessingState) {
        self.processing.store(state.encode(), Ordering::Release);
    }

    /// Clears the `NEEDS_START` flag exactly once, on the first event that
    /// launches workers: submit, an explicit `start`, or caller-as-worker
    /// entry.
    pub(crate) fn clear_needs_start(&self) {
        let _guard = lock_mutex(&self.transition_mutex);

        match self.acceptance() {
            AcceptanceState::YesNeedsStart => self.set_acceptance(AcceptanceState::Yes),
            AcceptanceState::NoNeedsStart => self.set_acceptance(AcceptanceState::No),
            AcceptanceState::Yes | AcceptanceState::No => {}
        }
    }

    pub(crate) fn start_accepting(&self) {
        let _guard = lock_mutex(&self.transition_mutex);

        // Once shut down, acceptance is pinned to `No` forever (§4.3);
        // `processing()` may still be toggled between `Yes`/`No` while the
        // `_AND_DIE` suffix sticks, but acceptance must never come back.
        if self.processing().is_dying() {
            return;
        }

        match self.acceptance() {
            AcceptanceState::No => self.set_acceptance(AcceptanceState::Yes),
            AcceptanceState::NoNeedsStart => self.set_acceptance(AcceptanceState::YesNeedsStart),
            AcceptanceState::Yes | AcceptanceState::YesNeedsStart => {}
        }

        tracing::trace!(acceptance = ?self.acceptance(), "start_accepting");
    }

    pub(crate) fn stop_accepting(&self) {
        let _guard = lock_mutex(&self.transition_mutex);

        match self.acceptance() {
            AcceptanceState::Yes => self.set_acceptance(AcceptanceState::No),
            AcceptanceState::YesNeedsStart => self.set_acceptance(AcceptanceState::NoNeedsStart),
            AcceptanceState::No | AcceptanceState::NoNeedsStart => {}
        }

        tracing::trace!(acceptance = ?self.acceptance(), "stop_accepting");
    }

    pub(crate) fn start_processing(&self) {
        let _guard = lock_mutex(&self.transition_mutex);

        match self.processing() {
            ProcessingState::No => self.set_processing(ProcessingState::Yes),
            ProcessingState::NoAndDie => self.set_processing(ProcessingState::YesAndDie),
            ProcessingState::Yes | ProcessingState::YesAndDie => {}
        }

        tracing::trace!(processing = ?self.processing(), "start_processing");
    }

    pub(crate) fn stop_processing(&self) {
        let _guard = lock_mutex(&self.transition_mutex);

        match self.processing() {
            ProcessingState::Yes => self.set_processing(ProcessingState::No),
            ProcessingState::YesAndDie => self.set_processing(ProcessingState::NoAndDie),
            ProcessingState::No | ProcessingState::NoAndDie => {}
        }

        tracing::trace!(processing = ?self.processing(), "stop_processing");
    }

    /// Pins acceptance to `NO` forever and sets processing to its
    /// `_AND_DIE` counterpart. The caller is responsible for taking
    /// `put_lock` around this call to fence in-flight producers (§4.5/§4.6).
    pub(crate) fn shutdown(&self) {
        let _guard = lock_mutex(&self.transition_mutex);

        self.set_acceptance(AcceptanceState::No);

        match self.processing() {
            ProcessingState::Yes | ProcessingState::YesAndDie => {
                self.set_processing(ProcessingState::YesAndDie)
            }
            ProcessingState::No | ProcessingState::NoAndDie => {
                self.set_processing(ProcessingState::NoAndDie)
            }
        }

        tracing::trace!("shutdown: acceptance pinned to No, processing moved to its _AND_DIE counterpart");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_needing_worker_start_when_not_threadless() {
        let machines = StateMachines::new(false);
        assert_eq!(machines.acceptance(), AcceptanceState::YesNeedsStart);
        assert!(machines.acceptance().needs_start());
    }

    #[test]
    fn threadless_starts_without_needs_start() {
        let machines = StateMachines::new(true);
        assert_eq!(machines.acceptance(), AcceptanceState::Yes);
    }

    #[test]
    fn clear_needs_start_is_idempotent() {
        let machines = StateMachines::new(false);
        machines.clear_needs_start();
        machines.clear_needs_start();
        assert_eq!(machines.acceptance(), AcceptanceState::Yes);
    }

    #[test]
    fn stop_accepting_preserves_needs_start() {
        let machines = StateMachines::new(false);
        machines.stop_accepting();
        assert_eq!(machines.acceptance(), AcceptanceState::NoNeedsStart);

        machines.start_accepting();
        assert_eq!(machines.acceptance(), AcceptanceState::YesNeedsStart);
    }

    #[test]
    fn shutdown_is_final_and_pins_acceptance_to_no() {
        let machines = StateMachines::new(false);
        machines.shutdown();

        assert!(machines.is_shutdown());
        assert_eq!(machines.acceptance(), AcceptanceState::No);

        machines.start_accepting();
        assert_eq!(
            machines.acceptance(),
            AcceptanceState::No,
            "start_accepting after shutdown must have no effect"
        );

        machines.start_processing();
        assert!(
            machines.is_shutdown(),
            "start_processing after shutdown may resume draining but must not clear _AND_DIE"
        );
    }

    #[test]
    fn shutdown_from_processing_no_moves_to_no_and_die() {
        let machines = StateMachines::new(false);
        machines.stop_processing();
        machines.shutdown();

        assert_eq!(machines.processing(), ProcessingState::NoAndDie);
    }
}

/// Model-checked concurrency tests, run via
/// `RUSTFLAGS="--cfg loom" cargo test --release --test state_loom_model`
/// (there is no standalone `tests/loom_model.rs`: these state machines are
/// `pub(crate)`, so the check has to live next to them instead of in an
/// integration test). Exhaustively explores thread interleavings at the
/// small thread counts loom can afford, rather than relying on luck to hit
/// a race under real scheduling.
#[cfg(all(test, loom))]
mod loom_tests {
    use std::sync::Arc;

    use loom::thread;

    use super::*;

    #[test]
    fn concurrent_shutdown_and_start_accepting_never_revives_acceptance() {
        loom::model(|| {
            let machines = Arc::new(StateMachines::new(false));

            let shutdown_machines = Arc::clone(&machines);
            let shutdown_thread = thread::spawn(move || {
                shutdown_machines.shutdown();
            });

            let reviver_machines = Arc::clone(&machines);
            let reviver_thread = thread::spawn(move || {
                reviver_machines.start_accepting();
            });

            shutdown_thread.join().unwrap();
            reviver_thread.join().unwrap();

            // Regardless of interleaving, a thread that observes shutdown
            // and then calls start_accepting() must never revive
            // acceptance (§4.3 invariant 3: is_shutdown() stays true
            // forever, and acceptance is pinned to NO once it is).
            if machines.is_shutdown() {
                assert_eq!(machines.acceptance(), AcceptanceState::No);
            }
        });
    }

    #[test]
    fn concurrent_stop_and_start_processing_stay_within_valid_states() {
        loom::model(|| {
            let machines = Arc::new(StateMachines::new(false));

            let a = Arc::clone(&machines);
            let t1 = thread::spawn(move || a.stop_processing());

            let b = Arc::clone(&machines);
            let t2 = thread::spawn(move || b.start_processing());

            t1.join().unwrap();
            t2.join().unwrap();

            // No interleaving of stop_processing/start_processing should
            // ever produce the `_AND_DIE` suffix out of nowhere - only
            // shutdown() can set it.
            assert!(!machines.processing().is_dying());
        });
    }
}
