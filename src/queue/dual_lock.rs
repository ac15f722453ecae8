use std::cell::UnsafeCell;
use std::ptr;
use std::sync::atomic::{AtomicPtr, AtomicUsize, Ordering};

use crossbeam::utils::CachePadded;
use parking_lot::Mutex;

use super::{AcceptDecision, CheckedOfferOutcome, OfferOutcome, TaskQueue};
use crate::task::TaskNode;

/// A singly-linked node. `item` is `None` exactly for the dummy head node;
/// every other node's `item` is `Some` until it is dequeued, at which point
/// the node it sat in is retired and becomes the new dummy head.
struct Node {
    item: UnsafeCell<Option<TaskNode>>,
    next: AtomicPtr<Node>,
}

impl Node {
    fn new_boxed(item: Option<TaskNode>) -> *mut Node {
        Box::into_raw(Box::new(Node {
            item: UnsafeCell::new(item),
            next: AtomicPtr::new(ptr::null_mut()),
        }))
    }
}

/// Variant used when `worker_count > basic_queue_threshold`: a linked
/// chain with a dummy head, split into a `put_lock` guarding the tail and a
/// `take_lock` guarding the head, so producers and consumers don't contend
/// on the same lock. Size lives in a cache-line-padded atomic counter so
/// `len()` is concurrently readable without taking either lock, and so it
/// doesn't false-share with the head/tail pointers above it.
///
/// # Safety
///
/// `head`/`tail` are raw pointers because the two ends of the list are
/// mutated under two different locks; this mirrors the classic
/// `LinkedBlockingQueue` dual-lock design. Every dereference of `head`'s
/// current value happens while holding `take_lock`; every dereference of
/// `tail`'s current value happens while holding `put_lock`. `Node::next`
/// is only ever written once (by the producer that links it in) and then
/// read by whichever consumer later advances past it, so the
/// release/acquire pair on `next` and the release/acquire pair on `size`
/// together publish a fully-initialized node before any consumer observes
/// it.
pub(crate) struct DualLockQueue {
    capacity: usize,
    size: CachePadded<AtomicUsize>,
    put_lock: Mutex<*mut Node>,
    take_lock: Mutex<*mut Node>,
}

unsafe impl Send for DualLockQueue {}
unsafe impl Sync for DualLockQueue {}

impl DualLockQueue {
    pub(crate) fn new(capacity: usize) -> Self {
        let dummy = Node::new_boxed(None);

        Self {
            capacity,
            size: CachePadded::new(AtomicUsize::new(0)),
            put_lock: Mutex::new(dummy),
            take_lock: Mutex::new(dummy),
        }
    }
}

impl DualLockQueue {
    /// Appends `task` at the tail, given a guard already holding
    /// `put_lock`. Shared by `offer_last` and `offer_last_if` so the
    /// capacity-check-then-append stays a single critical section in both.
    fn append_locked(&self, tail_guard: &mut *mut Node, task: TaskNode) -> OfferOutcome {
        if self.size.load(Ordering::Acquire) >= self.capacity {
            return OfferOutcome::Full(task);
        }

        let new_node = Node::new_boxed(Some(task));

        unsafe {
            (**tail_guard).next.store(new_node, Ordering::Release);
        }
        *tail_guard = new_node;

        let previous_size = self.size.fetch_add(1, Ordering::AcqRel);

        OfferOutcome::Accepted {
            was_empty: previous_size == 0,
        }
    }
}

impl TaskQueue for DualLockQueue {
    fn offer_last(&self, task: TaskNode) -> OfferOutcome {
        let mut tail_guard = self.put_lock.lock();
        self.append_locked(&mut tail_guard, task)
    }

    fn offer_last_if(
        &self,
        decide: &mut dyn FnMut() -> AcceptDecision,
        task: TaskNode,
    ) -> CheckedOfferOutcome {
        let mut tail_guard = self.put_lock.lock();

        match decide() {
            AcceptDecision::Reject => return CheckedOfferOutcome::Rejected(task),
            AcceptDecision::NeedsStart => return CheckedOfferOutcome::NeedsStart(task),
            AcceptDecision::Enqueue => {}
        }

        match self.append_locked(&mut tail_guard, task) {
            OfferOutcome::Accepted { was_empty } => CheckedOfferOutcome::Accepted { was_empty },
            OfferOutcome::Full(task) => CheckedOfferOutcome::Full(task),
        }
    }

    fn fence_put(&self, f: &mut dyn FnMut()) {
        let _guard = self.put_lock.lock();
        f();
    }

    fn poll_first(&self) -> Option<(TaskNode, bool)> {
        let mut head_guard = self.take_lock.lock();
        let head_ptr = *head_guard;

        let first_ptr = unsafe { (*head_ptr).next.load(Ordering::Acquire) };
        if first_ptr.is_null() {
            return None;
        }

        let task = unsafe { (*(*first_ptr).item.get()).take() }
            .expect("non-dummy node must carry a task until dequeued");

        // The dequeued node becomes the new dummy head; the old dummy is
        // retired and freed.
        *head_guard = first_ptr;
        unsafe {
            drop(Box::from_raw(head_ptr));
        }

        let previous_size = self.size.fetch_sub(1, Ordering::AcqRel);

        Some((task, previous_size - 1 > 0))
    }

    fn drain_all(&self) -> Vec<TaskNode> {
        let mut drained = Vec::new();

        while let Some((task, _)) = self.poll_first() {
            drained.push(task);
        }

        drained
    }

    fn len(&self) -> usize {
        self.size.load(Ordering::Acquire)
    }

    fn capacity(&self) -> usize {
        self.capacity
    }

    fn variant_name(&self) -> &'static str {
        "dual-lock"
    }
}

impl Drop for DualLockQueue {
    fn drop(&mut self) {
        let mut current = *self.take_lock.lock();

        while !current.is_null() {
            let next = unsafe { (*current).next.load(Ordering::Acquire) };
            unsafe {
                drop(Box::from_raw(current));
            }
            current = next;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize as StdAtomicUsize;
    use std::sync::Arc;
    use std::thread;

    use super::*;

    fn task_node(marker: Arc<StdAtomicUsize>, value: usize) -> TaskNode {
        TaskNode::plain(Box::new(move || {
            marker.store(value, Ordering::SeqCst);
        }))
    }

    #[test]
    fn respects_capacity() {
        let queue = DualLockQueue::new(1);
        let marker = Arc::new(StdAtomicUsize::new(0));

        match queue.offer_last(task_node(marker.clone(), 1)) {
            OfferOutcome::Accepted { was_empty } => assert!(was_empty),
            OfferOutcome::Full(_) => panic!("expected acceptance"),
        }

        match queue.offer_last(task_node(marker, 2)) {
            OfferOutcome::Full(_) => {}
            OfferOutcome::Accepted { .. } => panic!("expected rejection at capacity"),
        }
    }

    #[test]
    fn offer_last_if_rejects_without_enqueueing() {
        let queue = DualLockQueue::new(10);
        let marker = Arc::new(StdAtomicUsize::new(0));

        let outcome = queue.offer_last_if(&mut || AcceptDecision::Reject, task_node(marker, 1));
        assert!(matches!(outcome, CheckedOfferOutcome::Rejected(_)));
        assert_eq!(queue.len(), 0);
    }

    #[test]
    fn fifo_order_preserved() {
        let queue = DualLockQueue::new(100);
        let marker = Arc::new(StdAtomicUsize::new(0));

        for value in 0..20 {
            queue.offer_last(task_node(marker.clone(), value));
        }

        for expected in 0..20 {
            let (node, _) = queue.poll_first().expect("task present");
            node.run();
            assert_eq!(marker.load(Ordering::SeqCst), expected);
        }

        assert!(queue.poll_first().is_none());
        assert_eq!(queue.len(), 0);
    }

    #[test]
    fn concurrent_producers_never_exceed_capacity_or_lose_tasks() {
        let queue = Arc::new(DualLockQueue::new(1_000));
        let produced = Arc::new(StdAtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..4 {
            let queue = queue.clone();
            let produced = produced.clone();
            handles.push(thread::spawn(move || {
                for _ in 0..250 {
                    let counter = produced.clone();
                    loop {
                        match queue.offer_last(TaskNode::plain(Box::new(move || {
                            counter.fetch_add(1, Ordering::SeqCst);
                        }))) {
                            OfferOutcome::Accepted { .. } => break,
                            OfferOutcome::Full(_) => continue,
                        }
                    }
                }
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(queue.len(), 1_000);

        let mut consumed = 0;
        while let Some((task, _)) = queue.poll_first() {
            task.run();
            consumed += 1;
        }

        assert_eq!(consumed, 1_000);
        assert_eq!(produced.load(Ordering::SeqCst), 1_000);
    }
}
