//! The public executor façade (`SPEC_FULL.md` §4.5-§4.7, component C6).
//!
//! [`Executor`] is a thin handle around a shared `Inner`; cloning it is
//! cheap and every clone observes the same queue, state machines, and
//! worker pool. This resolves the cyclic reference between the executor
//! and the worker closures each worker thread runs (§9): the closures hold
//! their own `Arc<Inner>` clone rather than a reference back to an
//! `Executor`.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::cancellation::CancellationToken;
use crate::condilock::Condilock;
use crate::config::ExecutorConfig;
use crate::error::{ExecutorError, RejectReason, Result};
use crate::inner::Inner;
use crate::queue::{AcceptDecision, CheckedOfferOutcome};
use crate::state::AcceptanceState;
use crate::task::{CancellableTask, Task, TaskNode};
use crate::worker::{run_worker, spawn_workers};

/// A fixed-worker-count task executor with independently controllable
/// acceptance and processing lifecycles.
///
/// Cloning an `Executor` is cheap (it's an `Arc` handle); the last clone
/// dropped triggers `shutdown()` and joins outstanding workers unless the
/// executor was built with `.daemon(true)`.
///
/// `Executor` wraps `Inner` through one extra layer of `Arc` (`Handle`)
/// rather than sharing `Inner`'s own `Arc` directly: every worker closure
/// also holds an `Arc<Inner>` clone (§9's "cyclic reference"), so counting
/// `Inner`'s strong references would never reach "only the caller is left"
/// while any worker thread is still alive. `Handle` exists solely so its
/// own strong count tracks `Executor` clones alone.
#[derive(Clone)]
pub struct Executor {
    handle: Arc<Handle>,
}

struct Handle {
    inner: Arc<Inner>,
}

impl Executor {
    pub fn new(config: ExecutorConfig) -> Self {
        Self {
            handle: Arc::new(Handle {
                inner: Arc::new(Inner::new(config)),
            }),
        }
    }

    fn inner(&self) -> &Arc<Inner> {
        &self.handle.inner
    }

    /// Submits a plain task. Silently discarded (no callback) if rejected;
    /// use [`Executor::submit_cancellable`] to be notified.
    pub fn submit<F>(&self, task: F) -> Result<()>
    where
        F: Task,
    {
        self.submit_node(TaskNode::plain(Box::new(task)))
    }

    /// Submits a task carrying an `on_cancel` hook, invoked if the task is
    /// rejected on submission or later discarded via
    /// [`Executor::cancel_pending`]/[`Executor::drain_into`].
    pub fn submit_cancellable(&self, task: CancellableTask) -> Result<()> {
        self.submit_node(task.into_node())
    }

    /// The submission protocol from §4.5: decide-then-enqueue happens in a
    /// single critical section under the queue's producer lock so a
    /// concurrent `shutdown` can't race a submission reading stale
    /// acceptance state. `YES_NEEDS_START` triggers a lazy worker spawn and
    /// a retry of the same task rather than a reject.
    fn submit_node(&self, mut node: TaskNode) -> Result<()> {
        loop {
            let inner = self.inner();
            let decision = inner.queue.offer_last_if(
                &mut || match inner.state.acceptance() {
                    AcceptanceState::Yes => AcceptDecision::Enqueue,
                    AcceptanceState::YesNeedsStart => AcceptDecision::NeedsStart,
                    AcceptanceState::No | AcceptanceState::NoNeedsStart => AcceptDecision::Reject,
                },
                node,
            );

            match decision {
                CheckedOfferOutcome::Accepted { was_empty } => {
                    if inner.config.signal_all_on_submit {
                        inner.take_condilock.signal_all_in_lock();
                    } else if was_empty {
                        inner.take_condilock.signal_one_in_lock();
                    }
                    return Ok(());
                }
                CheckedOfferOutcome::Full(rejected) => {
                    return self.finish_rejection(rejected, RejectReason::QueueFull);
                }
                CheckedOfferOutcome::Rejected(rejected) => {
                    return self.finish_rejection(rejected, RejectReason::NotAccepting);
                }
                CheckedOfferOutcome::NeedsStart(pending) => {
                    spawn_workers(self.inner());
                    node = pending;
                    continue;
                }
            }
        }
    }

    /// Runs the rejection path *outside* the queue's lock (§4.5 step 3):
    /// fires the task's own `on_cancel` hook if it has one - in which case
    /// the task has been notified and `submit` returns `Ok(())` - or
    /// leaves the reason for the caller's `Err` if it has none (§6: "
    /// `Rejected` if full/not-accepting and task is not `Cancellable`;
    /// otherwise on-cancel invoked").
    fn finish_rejection(&self, node: TaskNode, reason: RejectReason) -> Result<()> {
        match node.reject(reason) {
            Some(reason) => {
                tracing::debug!(%reason, "task rejected");
                Err(ExecutorError::rejected(reason))
            }
            None => {
                tracing::debug!(%reason, "task rejected; on-cancel hook invoked");
                Ok(())
            }
        }
    }

    /// Spawns the worker threads immediately rather than waiting for the
    /// first submission to do it lazily. A no-op if workers already
    /// started. Not valid on a threadless executor.
    pub fn start(&self) -> Result<()> {
        if self.inner().is_threadless() {
            return Err(ExecutorError::invalid_state(
                "start() is not valid on a threadless executor; call start_and_work_in_current_thread instead",
            ));
        }

        spawn_workers(self.inner());
        Ok(())
    }

    /// `stop_accepting(); stop_processing();` (§4.6) - pauses both switches
    /// without discarding anything already queued.
    pub fn stop(&self) {
        self.stop_accepting();
        self.stop_processing();
    }

    pub fn start_accepting(&self) {
        self.inner().state.start_accepting();
    }

    pub fn stop_accepting(&self) {
        self.inner().state.stop_accepting();
    }

    /// Resumes draining the queue after [`Executor::stop_processing`].
    /// Wakes every idle worker, since any of them may have been parked on
    /// an always-false predicate while processing was paused.
    pub fn start_processing(&self) {
        self.inner().state.start_processing();
        self.inner().take_condilock.signal_all_in_lock();
    }

    /// Pauses draining without discarding anything already queued. Workers
    /// finish their current task, if any, then idle.
    pub fn stop_processing(&self) {
        self.inner().state.stop_processing();
    }

    /// Stops accepting new submissions and lets workers drain whatever is
    /// already queued before they exit. `stop_accepting` is fenced through
    /// the queue's producer lock so it can never race a `submit` that's
    /// mid-acceptance-check (§4.5/§4.6).
    pub fn shutdown(&self) {
        let inner = self.inner();
        inner.queue.fence_put(&mut || {
            inner.state.shutdown();
        });
        inner.take_condilock.signal_all_in_lock();

        tracing::info!("executor shutdown: draining remaining queue before workers exit");
    }

    /// Like [`Executor::shutdown`], but workers die immediately instead of
    /// draining the queue first. Every task still sitting in the queue
    /// after that point - i.e. every task that never got a chance to
    /// start - is immediately cancelled (its `on_cancel` hook fires, if
    /// it has one) and counted in the returned "undrained" total. A task
    /// a worker had already popped before dying is *not* in that count:
    /// it either already ran or is still running, never both counted and
    /// executed (§5, invariant 4). `interrupt_workers` also cancels any
    /// worker currently blocked inside a condilock wait.
    pub fn shutdown_now(&self, interrupt_workers: bool) -> usize {
        let inner = self.inner();
        inner.queue.fence_put(&mut || {
            inner.state.stop_processing();
            inner.state.shutdown();
        });
        inner.take_condilock.signal_all_in_lock();

        tracing::info!(interrupt_workers, "executor shutdown_now: workers dying without draining");

        if interrupt_workers {
            self.interrupt_workers();
        }

        self.cancel_pending()
    }

    /// Cancels every worker's cancellation token and wakes them, so a
    /// worker parked on a condilock wait observes it was interrupted
    /// rather than waiting out the remaining chunked timeout.
    pub fn interrupt_workers(&self) {
        for token in self.inner().worker_cancellation_tokens.lock().iter() {
            token.cancel();
        }
        self.inner().threadless_cancellation.cancel();
        self.inner().take_condilock.signal_all_in_lock();
    }

    /// Removes every pending (not yet started) task from the queue,
    /// invoking `on_discarded` for every plain task (one without its own
    /// `on_cancel` hook - those fire inline via
    /// [`crate::task::TaskNode::reject`]). Returns how many tasks were
    /// discarded in total.
    pub fn drain_into(&self, mut on_discarded: impl FnMut(RejectReason)) -> usize {
        let drained = self.inner().queue.drain_all();
        let count = drained.len();

        for node in drained {
            if let Some(reason) = node.reject(RejectReason::NotAccepting) {
                on_discarded(reason);
            }
        }

        count
    }

    /// Convenience over [`Executor::drain_into`] for callers who don't
    /// need to observe which plain tasks were discarded.
    pub fn cancel_pending(&self) -> usize {
        self.drain_into(|_| {})
    }

    /// Blocks until every worker has exited and the queue is empty, or
    /// `timeout` elapses first. Returns `Ok(true)` on termination,
    /// `Ok(false)` on timeout.
    pub fn await_termination(&self, timeout: Duration) -> Result<bool> {
        let cancel = CancellationToken::new();
        let inner = self.inner();

        inner
            .no_running_condilock
            .await_while_false(&mut || inner.is_terminated(), timeout, &cancel)
    }

    /// Enters threadless ("caller-as-worker") mode: the calling thread
    /// becomes the executor's sole worker and blocks here until the
    /// executor is shut down or interrupted (§4.7). Can be entered exactly
    /// once per executor.
    pub fn start_and_work_in_current_thread(&self) -> Result<()> {
        if !self.inner().is_threadless() {
            return Err(ExecutorError::invalid_state(
                "start_and_work_in_current_thread requires a threadless executor",
            ));
        }

        if self.inner().threadless_entered.swap(true, Ordering::AcqRel) {
            return Err(ExecutorError::invalid_state(
                "start_and_work_in_current_thread has already been entered",
            ));
        }

        *self.inner().threadless_thread_id.lock() = Some(thread::current().id());
        self.inner().running_workers.fetch_add(1, Ordering::AcqRel);
        self.inner().started_workers.fetch_add(1, Ordering::AcqRel);
        self.inner().state.clear_needs_start();

        run_worker(
            Arc::clone(self.inner()),
            self.inner().threadless_cancellation.clone(),
        );

        Ok(())
    }

    pub fn is_shutdown(&self) -> bool {
        self.inner().state.is_shutdown()
    }

    pub fn is_terminated(&self) -> bool {
        self.inner().is_terminated()
    }

    pub fn nbr_running(&self) -> usize {
        self.inner().nbr_running()
    }

    pub fn nbr_working(&self) -> usize {
        self.inner().nbr_working()
    }

    pub fn nbr_idle(&self) -> usize {
        self.inner().nbr_idle()
    }

    pub fn nbr_pending(&self) -> usize {
        self.inner().nbr_pending()
    }

    /// Whether the calling thread is one of this executor's own workers
    /// (dedicated or the threadless caller-as-worker thread). Useful for a
    /// task to detect, and refuse, a reentrant `submit` that would
    /// deadlock a single-worker executor awaiting its own completion.
    pub fn is_worker_thread(&self) -> bool {
        self.inner().is_worker_thread(thread::current().id())
    }
}

impl Drop for Handle {
    /// Runs exactly once, when the last `Executor` clone is dropped - never
    /// while a worker thread is still alive, since workers hold their own
    /// `Arc<Inner>` clone rather than an `Arc<Handle>` clone (see the
    /// doc comment on [`Executor`]).
    fn drop(&mut self) {
        if self.inner.config.daemon {
            // Rust has no daemon-thread primitive; the only behavioural
            // difference a daemon executor gets is that the last handle
            // does not wait for workers to exit. Each worker closure holds
            // its own `Arc<Inner>` clone, so `Inner` stays alive until
            // they finish on their own.
            return;
        }

        let inner = &self.inner;
        inner.queue.fence_put(&mut || {
            inner.state.shutdown();
        });
        inner.take_condilock.signal_all_in_lock();

        let handles = std::mem::take(&mut *self.inner.worker_handles.lock());
        for handle in handles {
            let _ = handle.join();
        }
    }
}
