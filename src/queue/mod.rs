//! The bounded FIFO task queue, in two flavours chosen by worker count
//! against `basic_queue_threshold` (see `SPEC_FULL.md` §4.2).

mod dual_lock;
mod single_lock;

pub(crate) use dual_lock::DualLockQueue;
pub(crate) use single_lock::SingleLockQueue;

use crate::task::TaskNode;

/// Result of [`TaskQueue::offer_last`]. On rejection the task is handed
/// back so the caller can run the rejection path *outside* any lock (see
/// `SPEC_FULL.md` §4.2: "does not throw from within the lock").
pub(crate) enum OfferOutcome {
    Accepted { was_empty: bool },
    Full(TaskNode),
}

/// What `submit` should do with a task, decided while still holding the
/// queue's producer-side lock (see `SPEC_FULL.md` §4.5 step 1).
pub(crate) enum AcceptDecision {
    /// Acceptance is `YES` (or `YES_NEEDS_START` in threadless mode):
    /// attempt the enqueue now.
    Enqueue,
    /// Acceptance is `YES_NEEDS_START` and workers haven't been launched
    /// yet: the caller must start them and retry.
    NeedsStart,
    /// Acceptance is off: reject without enqueuing.
    Reject,
}

/// Result of [`TaskQueue::offer_last_if`].
pub(crate) enum CheckedOfferOutcome {
    Accepted { was_empty: bool },
    Full(TaskNode),
    NeedsStart(TaskNode),
    Rejected(TaskNode),
}

/// A bounded FIFO of [`TaskNode`]s.
pub(crate) trait TaskQueue: Send + Sync {
    fn offer_last(&self, task: TaskNode) -> OfferOutcome;

    /// Evaluates `decide` and attempts the enqueue as a single critical
    /// section under the producer-side lock, so a concurrent `shutdown`
    /// (which fences through [`TaskQueue::fence_put`]) can never race with
    /// a submission that reads a stale acceptance state (§4.5's "why
    /// acceptance is re-read inside put_lock").
    fn offer_last_if(
        &self,
        decide: &mut dyn FnMut() -> AcceptDecision,
        task: TaskNode,
    ) -> CheckedOfferOutcome;

    /// Runs `f` while holding the producer-side lock, with no enqueue
    /// attempt. Used by `shutdown` to fence in-flight producers: any
    /// `offer_last_if` call that started before this either completed its
    /// acceptance check (and so still got a coherent answer) or is
    /// strictly ordered after `f`.
    fn fence_put(&self, f: &mut dyn FnMut());

    /// Returns the removed task and whether the queue is still non-empty
    /// afterwards (used to decide whether to wake one more waiter).
    fn poll_first(&self) -> Option<(TaskNode, bool)>;

    /// Removes and returns every pending task in FIFO order, under a
    /// single critical section.
    fn drain_all(&self) -> Vec<TaskNode>;

    fn len(&self) -> usize;

    fn capacity(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Which concrete queue variant this is, for logging and tests.
    fn variant_name(&self) -> &'static str;
}

/// Picks the queue implementation per `SPEC_FULL.md` §4.2: the single-lock
/// queue's simpler cache behaviour wins for small worker counts, while the
/// dual-lock queue wins above the threshold where producer/consumer
/// contention dominates.
pub(crate) fn build_queue(
    worker_count: usize,
    basic_queue_threshold: usize,
    capacity: usize,
) -> Box<dyn TaskQueue> {
    if worker_count <= basic_queue_threshold {
        Box::new(SingleLockQueue::new(capacity))
    } else {
        Box::new(DualLockQueue::new(capacity))
    }
}
