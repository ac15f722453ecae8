use crate::error::RejectReason;

/// An opaque, nullary unit of work submitted to the executor.
pub trait Task: FnOnce() + Send + 'static {}

impl<F> Task for F where F: FnOnce() + Send + 'static {}

pub(crate) type BoxedTask = Box<dyn FnOnce() + Send + 'static>;

/// An optional on-cancel hook a task may carry.
///
/// It is invoked exactly once if the executor refuses to run the task
/// (rejected on submission, or discarded via `cancel_pending`) and never
/// otherwise: a task is executed, cancelled, or drained, never more than
/// one of the three (see `SPEC_FULL.md` §5).
pub(crate) type BoxedOnCancel = Box<dyn FnOnce(RejectReason) + Send + 'static>;

/// A task node as stored in the queue: the work itself, plus its optional
/// cancellation hook.
pub(crate) struct TaskNode {
    pub(crate) task: BoxedTask,
    pub(crate) on_cancel: Option<BoxedOnCancel>,
}

impl TaskNode {
    pub(crate) fn plain(task: BoxedTask) -> Self {
        Self {
            task,
            on_cancel: None,
        }
    }

    pub(crate) fn run(self) {
        (self.task)()
    }

    /// Invokes the on-cancel hook, if any, *after* the caller has released
    /// every lock (see `SPEC_FULL.md` §4.5 step 3).
    pub(crate) fn reject(self, reason: RejectReason) -> Option<RejectReason> {
        match self.on_cancel {
            Some(on_cancel) => {
                on_cancel(reason);
                None
            }
            None => Some(reason),
        }
    }
}

/// A task that additionally implements the *Cancellable* capability: it
/// carries an `on_cancel` callback invoked on rejection or drain instead of
/// silently vanishing.
///
/// Build one with [`CancellableTask::new`] and pass it to
/// [`crate::Executor::submit_cancellable`].
pub struct CancellableTask {
    pub(crate) task: BoxedTask,
    pub(crate) on_cancel: BoxedOnCancel,
}

impl CancellableTask {
    pub fn new<F, C>(task: F, on_cancel: C) -> Self
    where
        F: FnOnce() + Send + 'static,
        C: FnOnce(RejectReason) + Send + 'static,
    {
        Self {
            task: Box::new(task),
            on_cancel: Box::new(on_cancel),
        }
    }

    pub(crate) fn into_node(self) -> TaskNode {
        TaskNode {
            task: self.task,
            on_cancel: Some(self.on_cancel),
        }
    }
}
