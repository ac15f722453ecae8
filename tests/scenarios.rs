//! End-to-end scenarios from `SPEC_FULL.md` §8, exercised through the
//! public API only (this crate's internals are `pub(crate)`).

use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use condilock_executor::{CancellableTask, Executor, ExecutorConfig, RejectReason};

fn default_timeout() -> Duration {
    Duration::from_secs(5)
}

#[test]
fn single_worker_runs_tasks_in_fifo_order() {
    let executor = Executor::new(
        ExecutorConfig::builder()
            .worker_count(1)
            .build_config()
            .unwrap(),
    );

    let (tx, rx) = mpsc::channel();

    for i in 0..20 {
        let tx = tx.clone();
        executor.submit(move || tx.send(i).unwrap()).unwrap();
    }
    drop(tx);

    executor.shutdown();
    assert!(executor.await_termination(default_timeout()).unwrap());

    let observed: Vec<i32> = rx.iter().collect();
    let expected: Vec<i32> = (0..20).collect();
    assert_eq!(observed, expected);
}

#[test]
fn rejected_submission_invokes_on_cancel_instead_of_erroring() {
    let executor = Executor::new(
        ExecutorConfig::builder()
            .worker_count(1)
            .build_config()
            .unwrap(),
    );

    executor.stop_accepting();

    let (tx, rx) = mpsc::channel();
    let task = CancellableTask::new(
        || panic!("must never run: acceptance is off"),
        move |reason| tx.send(reason).unwrap(),
    );

    // A `CancellableTask` absorbs the rejection into its own hook, so the
    // submission call itself reports success (§6's mutual-exclusivity
    // between `Rejected` and "on-cancel invoked").
    assert!(executor.submit_cancellable(task).is_ok());

    let reason = rx.recv_timeout(default_timeout()).unwrap();
    assert_eq!(reason, RejectReason::NotAccepting);

    executor.shutdown_now(false);
}

#[test]
fn plain_task_rejection_surfaces_as_an_error() {
    let executor = Executor::new(
        ExecutorConfig::builder()
            .worker_count(1)
            .build_config()
            .unwrap(),
    );

    executor.stop_accepting();

    let result = executor.submit(|| {});
    assert!(matches!(
        result,
        Err(condilock_executor::ExecutorError::Rejected {
            reason: RejectReason::NotAccepting
        })
    ));

    executor.shutdown_now(false);
}

#[test]
fn shutdown_now_drains_pending_tasks_exactly_once() {
    let executor = Executor::new(
        ExecutorConfig::builder()
            .worker_count(1)
            .queue_capacity(1_000)
            .build_config()
            .unwrap(),
    );

    // Block the one worker on the first task so the rest pile up in the
    // queue undrained.
    let (release_tx, release_rx) = mpsc::channel::<()>();
    executor.submit(move || {
        let _ = release_rx.recv();
    }).unwrap();

    // Give the worker a moment to pick up the blocking task.
    std::thread::sleep(Duration::from_millis(50));

    let cancelled = Arc::new(Mutex::new(Vec::new()));
    for i in 0..10 {
        let cancelled = Arc::clone(&cancelled);
        let task = CancellableTask::new(
            move || panic!("task {i} must never run after shutdown_now"),
            move |reason| cancelled.lock().unwrap().push(reason),
        );
        executor.submit_cancellable(task).unwrap();
    }

    let undrained = executor.shutdown_now(false);
    assert_eq!(undrained, 10);
    assert_eq!(cancelled.lock().unwrap().len(), 10);

    release_tx.send(()).unwrap();
    assert!(executor.await_termination(default_timeout()).unwrap());
}

#[test]
fn threadless_executor_runs_tasks_on_the_calling_thread() {
    let executor = Executor::new(
        ExecutorConfig::builder()
            .threadless()
            .build_config()
            .unwrap(),
    );

    let (tx, rx) = mpsc::channel();
    for i in 0..5 {
        let tx = tx.clone();
        executor.submit(move || tx.send(i).unwrap()).unwrap();
    }
    drop(tx);

    executor.shutdown();

    let worker_executor = executor.clone();
    let handle = std::thread::spawn(move || {
        worker_executor.start_and_work_in_current_thread().unwrap();
    });
    handle.join().unwrap();

    let observed: Vec<i32> = rx.iter().collect();
    assert_eq!(observed, vec![0, 1, 2, 3, 4]);
    assert!(executor.await_termination(default_timeout()).unwrap());
}

#[test]
fn reentrant_submit_from_a_worker_is_detectable_via_is_worker_thread() {
    let executor = Executor::new(
        ExecutorConfig::builder()
            .worker_count(1)
            .build_config()
            .unwrap(),
    );

    let (tx, rx) = mpsc::channel();
    let inner_executor = executor.clone();
    executor
        .submit(move || {
            tx.send(inner_executor.is_worker_thread()).unwrap();
        })
        .unwrap();

    assert!(rx.recv_timeout(default_timeout()).unwrap());
    assert!(!executor.is_worker_thread());

    executor.shutdown();
    assert!(executor.await_termination(default_timeout()).unwrap());
}

#[test]
fn await_termination_times_out_while_a_worker_is_busy() {
    let executor = Executor::new(
        ExecutorConfig::builder()
            .worker_count(1)
            .build_config()
            .unwrap(),
    );

    let (release_tx, release_rx) = mpsc::channel::<()>();
    executor.submit(move || {
        let _ = release_rx.recv();
    }).unwrap();

    std::thread::sleep(Duration::from_millis(50));
    executor.shutdown();

    let terminated = executor.await_termination(Duration::from_millis(100)).unwrap();
    assert!(!terminated);

    release_tx.send(()).unwrap();
    assert!(executor.await_termination(default_timeout()).unwrap());
}

#[test]
fn stop_processing_pauses_draining_without_discarding_the_queue() {
    let executor = Executor::new(
        ExecutorConfig::builder()
            .worker_count(2)
            .build_config()
            .unwrap(),
    );

    executor.stop_processing();

    let (tx, rx) = mpsc::channel();
    for i in 0..5 {
        let tx = tx.clone();
        executor.submit(move || tx.send(i).unwrap()).unwrap();
    }
    drop(tx);

    assert!(rx.recv_timeout(Duration::from_millis(200)).is_err());
    assert_eq!(executor.nbr_pending(), 5);

    executor.start_processing();

    let mut observed: Vec<i32> = rx.iter().take(5).collect();
    observed.sort_unstable();
    assert_eq!(observed, vec![0, 1, 2, 3, 4]);

    executor.shutdown();
    assert!(executor.await_termination(default_timeout()).unwrap());
}
