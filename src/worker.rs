//! The worker loop and lazy-start protocol (`SPEC_FULL.md` §4.4, §4.6).

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::cancellation::CancellationToken;
use crate::condilock::Condilock;
use crate::config::WorkerCount;
use crate::inner::Inner;
use crate::task::TaskNode;

/// Workers poll in chunks this long while idle, so a death signal or
/// interrupt is never more than one chunk away from being observed even if
/// a wakeup is lost.
const WORKER_WAIT_TIMEOUT: Duration = Duration::MAX;

/// Spawns the configured number of worker threads exactly once. Later
/// calls (from a racing `submit` and an explicit `start`, say) observe
/// `lazy_start_lock` already held and return immediately - this is the
/// gate behind the `*_NEEDS_START` states.
pub(crate) fn spawn_workers(inner: &Arc<Inner>) {
    let mut already_started = inner.lazy_start_lock.lock();
    if *already_started {
        return;
    }
    *already_started = true;

    let worker_count = match inner.config.worker_count {
        WorkerCount::Fixed(count) => count,
        WorkerCount::Threadless => 0,
    };

    let mut handles = inner.worker_handles.lock();
    let mut tokens = inner.worker_cancellation_tokens.lock();

    for index in 0..worker_count {
        let cancel = CancellationToken::new();
        let worker_inner = Arc::clone(inner);
        let worker_cancel = cancel.clone();
        let thread_name = format!("{}-{}", inner.config.thread_name_prefix, index);

        inner.running_workers.fetch_add(1, Ordering::AcqRel);
        inner.started_workers.fetch_add(1, Ordering::AcqRel);

        let spawn_result = thread::Builder::new()
            .name(thread_name.clone())
            .spawn(move || run_worker(worker_inner, worker_cancel));

        match spawn_result {
            Ok(handle) => {
                handles.push(handle);
                tokens.push(cancel);
            }
            Err(error) => {
                inner.running_workers.fetch_sub(1, Ordering::AcqRel);
                inner.started_workers.fetch_sub(1, Ordering::AcqRel);
                tracing::error!(
                    thread_name = %thread_name,
                    error = %error,
                    "failed to spawn worker thread"
                );
            }
        }
    }

    inner.state.clear_needs_start();
    tracing::debug!(worker_count, "workers started");
}

/// Un-registers a worker thread and updates `running_workers` bookkeeping
/// when the worker loop exits, whether by normal return or by a task panic
/// unwinding through it. Per §4.4, a panicking task must terminate its
/// worker without being caught - this guard is what keeps `nbr_running`
/// and `await_termination` correct despite that, since its `Drop` still
/// runs while the panic unwinds.
struct WorkerLifecycleGuard<'a> {
    inner: &'a Arc<Inner>,
    thread_id: thread::ThreadId,
}

impl Drop for WorkerLifecycleGuard<'_> {
    fn drop(&mut self) {
        self.inner.worker_thread_ids.lock().remove(&self.thread_id);

        let remaining = self.inner.running_workers.fetch_sub(1, Ordering::AcqRel) - 1;
        tracing::debug!(remaining, "worker exiting");

        if remaining == 0 {
            self.inner.no_running_condilock.signal_all_in_lock();
            tracing::info!("all workers have exited");
        }
    }
}

/// Body of a dedicated worker thread, and also of the caller-as-worker
/// closure in threadless mode (`SPEC_FULL.md` §4.7), which calls this
/// directly instead of going through [`spawn_workers`].
pub(crate) fn run_worker(inner: Arc<Inner>, cancel: CancellationToken) {
    let thread_id = thread::current().id();
    inner.worker_thread_ids.lock().insert(thread_id);
    let _lifecycle_guard = WorkerLifecycleGuard {
        inner: &inner,
        thread_id,
    };

    loop {
        let mut predicate = || {
            let processing = inner.state.processing();
            (processing.must_process() && !inner.queue.is_empty()) || processing.is_dying()
        };

        // An idle wait that catches a cancellation must absorb it silently
        // (§4.4) rather than exit or carry it forward into the next task:
        // `interrupt_workers` is meant to unblock a stuck wait, not to kill
        // the worker. The loop re-evaluates the predicate immediately
        // either way.
        let _ = inner
            .take_condilock
            .await_while_false(&mut predicate, WORKER_WAIT_TIMEOUT, &cancel);

        let processing = inner.state.processing();

        if processing.is_dying() && !processing.must_process() {
            // `shutdown_now`: die immediately, leaving any remaining tasks
            // for `Executor::drain_into`/`cancel_pending` to deal with.
            break;
        }

        if !processing.must_process() {
            // Processing paused (not dying): go back to waiting.
            continue;
        }

        match inner.queue.poll_first() {
            Some((task, still_non_empty)) => {
                if still_non_empty {
                    // More work remains; wake a sibling so a burst of
                    // submissions isn't drained by a single worker.
                    inner.take_condilock.signal_one_in_lock();
                }

                run_task(&inner, task);
            }
            None => {
                if processing.is_dying() {
                    break;
                }
            }
        }
    }
}

/// Un-counts a task as "working" when it finishes or panics; does not catch
/// the panic itself (§4.4: a panicking task must terminate its worker).
struct WorkingGuard<'a> {
    inner: &'a Arc<Inner>,
}

impl Drop for WorkingGuard<'_> {
    fn drop(&mut self) {
        self.inner.working_workers.fetch_sub(1, Ordering::AcqRel);

        if thread::panicking() {
            tracing::error!(
                thread = ?thread::current().name().unwrap_or("<unnamed>"),
                "task panicked; worker thread is terminating"
            );
        }
    }
}

fn run_task(inner: &Arc<Inner>, task: TaskNode) {
    inner.working_workers.fetch_add(1, Ordering::AcqRel);
    let _working_guard = WorkingGuard { inner };

    task.run();
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use crate::config::ExecutorConfig;
    use crate::inner::Inner;
    use crate::state::ProcessingState;
    use crate::task::TaskNode;

    use super::*;

    fn build_inner(worker_count: usize) -> Arc<Inner> {
        let config = ExecutorConfig::builder()
            .worker_count(worker_count)
            .build_config()
            .unwrap();
        Arc::new(Inner::new(config))
    }

    #[test]
    fn spawn_workers_is_idempotent() {
        let inner = build_inner(2);
        spawn_workers(&inner);
        spawn_workers(&inner);
        assert_eq!(inner.worker_handles.lock().len(), 2);
    }

    #[test]
    fn worker_drains_queue_and_exits_on_die_signal() {
        let inner = build_inner(1);
        spawn_workers(&inner);

        let (tx, rx) = std::sync::mpsc::channel();
        inner.queue.offer_last(TaskNode::plain(Box::new(move || {
            tx.send(()).unwrap();
        })));
        inner.take_condilock.signal_one_in_lock();

        rx.recv_timeout(Duration::from_secs(5))
            .expect("worker must run the queued task");

        inner.state.shutdown();
        inner.take_condilock.signal_all_in_lock();

        let handles = std::mem::take(&mut *inner.worker_handles.lock());
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(inner.nbr_running(), 0);
        assert_eq!(inner.state.processing(), ProcessingState::NoAndDie);
    }
}
