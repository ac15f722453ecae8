//! A fixed-worker-count task executor built around a condition-lock
//! primitive (see `SPEC_FULL.md` for the full design).
//!
//! The executor pre-allocates a fixed set of worker threads (or, in
//! threadless mode, borrows the caller's own thread) and runs submitted
//! tasks off a bounded FIFO queue. Acceptance (whether new submissions are
//! queued) and processing (whether workers drain the queue) are two
//! independent on/off switches, so callers can pause either one without
//! tearing the executor down.
//!
//! ```
//! use condilock_executor::{Executor, ExecutorConfig};
//! use std::sync::{Arc, Mutex};
//!
//! let log = Arc::new(Mutex::new(Vec::new()));
//! let executor = Executor::new(
//!     ExecutorConfig::builder()
//!         .worker_count(1)
//!         .queue_capacity(100)
//!         .build_config()
//!         .unwrap(),
//! );
//!
//! for value in 0..10 {
//!     let log = Arc::clone(&log);
//!     executor.submit(move || log.lock().unwrap().push(value)).unwrap();
//! }
//!
//! executor.shutdown();
//! executor
//!     .await_termination(std::time::Duration::from_secs(5))
//!     .unwrap();
//!
//! assert_eq!(*log.lock().unwrap(), (0..10).collect::<Vec<_>>());
//! ```

pub mod condilock;

mod cancellation;
mod config;
mod error;
mod executor;
mod inner;
mod queue;
mod state;
mod task;
mod worker;

pub use cancellation::CancellationToken;
pub use config::{ExecutorBuilder, ExecutorConfig, WorkerCount};
pub use error::{ExecutorError, RejectReason, Result};
pub use executor::Executor;
pub use task::{CancellableTask, Task};
