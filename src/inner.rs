//! The shared state record referenced by both the [`crate::Executor`]
//! façade and every worker closure (`SPEC_FULL.md` §9: "cyclic reference
//! between executor and worker runnable").

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread::{JoinHandle, ThreadId};

use parking_lot::Mutex;

use crate::cancellation::CancellationToken;
use crate::condilock::{Condilock, MonitorBasedCondilock};
use crate::config::{ExecutorConfig, WorkerCount};
use crate::queue::{build_queue, TaskQueue};
use crate::state::StateMachines;

pub(crate) struct Inner {
    pub(crate) config: ExecutorConfig,
    pub(crate) state: StateMachines,
    pub(crate) queue: Box<dyn TaskQueue>,

    /// Workers wait here for a task to poll or for a death signal.
    pub(crate) take_condilock: Box<dyn Condilock>,
    /// `await_termination` waits here for `running_workers` to hit zero.
    pub(crate) no_running_condilock: Box<dyn Condilock>,

    pub(crate) running_workers: AtomicUsize,
    pub(crate) working_workers: AtomicUsize,
    pub(crate) started_workers: AtomicUsize,

    /// Guards the lazy worker-start protocol: spawning happens at most
    /// once, on the first of {submit, explicit `start`, caller-as-worker
    /// entry}.
    pub(crate) lazy_start_lock: Mutex<bool>,
    pub(crate) worker_handles: Mutex<Vec<JoinHandle<()>>>,
    pub(crate) worker_thread_ids: Mutex<HashSet<ThreadId>>,
    pub(crate) worker_cancellation_tokens: Mutex<Vec<CancellationToken>>,

    /// Set once `start_and_work_in_current_thread` has been entered, so a
    /// second caller is rejected with `InvalidState` rather than quietly
    /// racing the first.
    pub(crate) threadless_entered: AtomicBool,
    pub(crate) threadless_thread_id: Mutex<Option<ThreadId>>,
    pub(crate) threadless_cancellation: CancellationToken,
}

impl Inner {
    pub(crate) fn new(config: ExecutorConfig) -> Self {
        let threadless = matches!(config.worker_count, WorkerCount::Threadless);
        let worker_count_for_queue = match config.worker_count {
            WorkerCount::Fixed(count) => count,
            WorkerCount::Threadless => 1,
        };

        let queue = build_queue(
            worker_count_for_queue,
            config.basic_queue_threshold,
            config.queue_capacity,
        );

        Self {
            config,
            state: StateMachines::new(threadless),
            queue,
            take_condilock: Box::new(MonitorBasedCondilock::new()),
            no_running_condilock: Box::new(MonitorBasedCondilock::new()),
            running_workers: AtomicUsize::new(0),
            working_workers: AtomicUsize::new(0),
            started_workers: AtomicUsize::new(0),
            lazy_start_lock: Mutex::new(false),
            worker_handles: Mutex::new(Vec::new()),
            worker_thread_ids: Mutex::new(HashSet::new()),
            worker_cancellation_tokens: Mutex::new(Vec::new()),
            threadless_entered: AtomicBool::new(false),
            threadless_thread_id: Mutex::new(None),
            threadless_cancellation: CancellationToken::new(),
        }
    }

    pub(crate) fn is_threadless(&self) -> bool {
        matches!(self.config.worker_count, WorkerCount::Threadless)
    }

    pub(crate) fn nbr_running(&self) -> usize {
        self.running_workers.load(Ordering::Acquire)
    }

    pub(crate) fn nbr_working(&self) -> usize {
        self.working_workers.load(Ordering::Acquire)
    }

    pub(crate) fn nbr_idle(&self) -> usize {
        self.nbr_running().saturating_sub(self.nbr_working())
    }

    pub(crate) fn nbr_started(&self) -> usize {
        self.started_workers.load(Ordering::Acquire)
    }

    pub(crate) fn nbr_pending(&self) -> usize {
        self.queue.len()
    }

    pub(crate) fn is_worker_thread(&self, id: ThreadId) -> bool {
        if self.threadless_thread_id.lock().as_ref() == Some(&id) {
            return true;
        }

        self.worker_thread_ids.lock().contains(&id)
    }

    pub(crate) fn is_terminated(&self) -> bool {
        self.state.is_shutdown() && self.nbr_pending() == 0 && self.nbr_running() == 0
    }
}
