use std::collections::VecDeque;

use parking_lot::Mutex;

use super::{AcceptDecision, CheckedOfferOutcome, OfferOutcome, TaskQueue};
use crate::task::TaskNode;

/// Variant used when `worker_count <= basic_queue_threshold`: a plain
/// `VecDeque` behind one lock, shared by producers, consumers, and the
/// wake-up signal. Simpler cache behaviour than the dual-lock queue wins
/// out at small worker counts.
pub(crate) struct SingleLockQueue {
    capacity: usize,
    inner: Mutex<VecDeque<TaskNode>>,
}

impl SingleLockQueue {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            capacity,
            inner: Mutex::new(VecDeque::new()),
        }
    }
}

impl TaskQueue for SingleLockQueue {
    fn offer_last(&self, task: TaskNode) -> OfferOutcome {
        let mut guard = self.inner.lock();

        if guard.len() >= self.capacity {
            return OfferOutcome::Full(task);
        }

        let was_empty = guard.is_empty();
        guard.push_back(task);

        OfferOutcome::Accepted { was_empty }
    }

    fn offer_last_if(
        &self,
        decide: &mut dyn FnMut() -> AcceptDecision,
        task: TaskNode,
    ) -> CheckedOfferOutcome {
        let mut guard = self.inner.lock();

        match decide() {
            AcceptDecision::Reject => return CheckedOfferOutcome::Rejected(task),
            AcceptDecision::NeedsStart => return CheckedOfferOutcome::NeedsStart(task),
            AcceptDecision::Enqueue => {}
        }

        if guard.len() >= self.capacity {
            return CheckedOfferOutcome::Full(task);
        }

        let was_empty = guard.is_empty();
        guard.push_back(task);

        CheckedOfferOutcome::Accepted { was_empty }
    }

    fn fence_put(&self, f: &mut dyn FnMut()) {
        let _guard = self.inner.lock();
        f();
    }

    fn poll_first(&self) -> Option<(TaskNode, bool)> {
        let mut guard = self.inner.lock();
        let task = guard.pop_front()?;
        let was_non_empty_after = !guard.is_empty();

        Some((task, was_non_empty_after))
    }

    fn drain_all(&self) -> Vec<TaskNode> {
        let mut guard = self.inner.lock();
        guard.drain(..).collect()
    }

    fn len(&self) -> usize {
        self.inner.lock().len()
    }

    fn capacity(&self) -> usize {
        self.capacity
    }

    fn variant_name(&self) -> &'static str {
        "single-lock"
    }
}
