//! Validated executor configuration (`SPEC_FULL.md` §4.8, §6).

use crate::error::{ExecutorError, Result};

/// How many worker threads the executor pre-allocates, or the sentinel
/// selecting threadless (caller-as-worker) mode.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum WorkerCount {
    Fixed(usize),
    /// No dedicated worker threads; the first caller of
    /// `Executor::start_and_work_in_current_thread` becomes the sole
    /// worker (§4.7).
    Threadless,
}

/// Materialized, validated configuration for an [`crate::Executor`].
#[derive(Clone, Debug)]
pub struct ExecutorConfig {
    pub(crate) worker_count: WorkerCount,
    pub(crate) queue_capacity: usize,
    pub(crate) basic_queue_threshold: usize,
    pub(crate) thread_name_prefix: String,
    pub(crate) daemon: bool,
    pub(crate) signal_all_on_submit: bool,
}

impl ExecutorConfig {
    pub fn builder() -> ExecutorBuilder {
        ExecutorBuilder::new()
    }
}

/// Accumulates executor configuration with chained setters; validation
/// happens once, synchronously, in [`ExecutorBuilder::build`] - before any
/// thread is spawned (§4.8).
#[derive(Clone, Debug)]
pub struct ExecutorBuilder {
    worker_count: WorkerCount,
    queue_capacity: usize,
    basic_queue_threshold: usize,
    thread_name_prefix: String,
    daemon: bool,
    signal_all_on_submit: bool,
}

impl Default for ExecutorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ExecutorBuilder {
    pub fn new() -> Self {
        Self {
            worker_count: WorkerCount::Fixed(1),
            queue_capacity: usize::MAX,
            basic_queue_threshold: 4,
            thread_name_prefix: String::from("executor-worker"),
            daemon: false,
            signal_all_on_submit: true,
        }
    }

    pub fn worker_count(mut self, worker_count: usize) -> Self {
        self.worker_count = WorkerCount::Fixed(worker_count);
        self
    }

    pub fn threadless(mut self) -> Self {
        self.worker_count = WorkerCount::Threadless;
        self
    }

    pub fn queue_capacity(mut self, queue_capacity: usize) -> Self {
        self.queue_capacity = queue_capacity;
        self
    }

    pub fn basic_queue_threshold(mut self, basic_queue_threshold: usize) -> Self {
        self.basic_queue_threshold = basic_queue_threshold;
        self
    }

    pub fn thread_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.thread_name_prefix = prefix.into();
        self
    }

    /// Whether `Executor::drop` should detach outstanding worker threads
    /// (`true`) instead of joining them (`false`, the default). Rust has
    /// no daemon-thread concept, so this is the only behavioural
    /// consequence of the flag (§6, §"daemon" open-question resolution in
    /// `DESIGN.md`).
    pub fn daemon(mut self, daemon: bool) -> Self {
        self.daemon = daemon;
        self
    }

    pub fn signal_all_on_submit(mut self, signal_all_on_submit: bool) -> Self {
        self.signal_all_on_submit = signal_all_on_submit;
        self
    }

    pub fn build_config(self) -> Result<ExecutorConfig> {
        if let WorkerCount::Fixed(0) = self.worker_count {
            return Err(ExecutorError::invalid_argument(
                "worker_count must be at least 1; use `.threadless()` for zero dedicated workers",
            ));
        }

        Ok(ExecutorConfig {
            worker_count: self.worker_count,
            queue_capacity: self.queue_capacity,
            basic_queue_threshold: self.basic_queue_threshold,
            thread_name_prefix: self.thread_name_prefix,
            daemon: self.daemon,
            signal_all_on_submit: self.signal_all_on_submit,
        })
    }
}
