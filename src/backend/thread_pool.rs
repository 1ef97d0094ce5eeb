//! Worker pool for spawned evaluations
//!
//! Parallel constructs hand whole evaluations to a small set of persistent
//! workers instead of spawning an OS thread per task.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                        EvalPool                          │
//! │                                                          │
//! │  ┌────────┐    ┌──────────────────────────────────────┐  │
//! │  │ Sender │───>│  Bounded Channel (num_threads * 4)   │  │
//! │  └────────┘    └──────────────────────────────────────┘  │
//! │                           │                              │
//! │          ┌────────────────┼────────────────┐             │
//! │          ▼                ▼                ▼             │
//! │    ┌──────────┐    ┌──────────┐    ┌──────────┐          │
//! │    │ Worker 1 │    │ Worker 2 │    │ Worker N │          │
//! │    └──────────┘    └──────────┘    └──────────┘          │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! Workers block on `recv()` and exit when the pool's sender is dropped.

use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, Receiver, Sender};
use tracing::{debug, warn};

use crate::backend::eval::errors::{EvalError, EvalResult};
use crate::backend::models::Object;

type BoxedTask = Box<dyn FnOnce() + Send + 'static>;

/// Persistent evaluation workers owned by a kernel
pub struct EvalPool {
    sender: Option<Sender<BoxedTask>>,
    workers: Vec<JoinHandle<()>>,
}

impl EvalPool {
    /// Start `num_threads` workers.
    ///
    /// If no worker can be started, tasks run on the submitting thread.
    pub fn new(num_threads: usize) -> Self {
        let num_threads = num_threads.max(1);
        let (sender, receiver) = bounded::<BoxedTask>(num_threads * 4);
        let workers: Vec<_> = (0..num_threads)
            .filter_map(|id| {
                let rx = receiver.clone();
                thread::Builder::new()
                    .name(format!("pmath-worker-{}", id))
                    .spawn(move || worker_loop(rx))
                    .map_err(|e| warn!(target: "pmath_core::pool", error = %e, "failed to start worker"))
                    .ok()
            })
            .collect();
        debug!(target: "pmath_core::pool", workers = workers.len(), "eval pool started");
        EvalPool {
            sender: (!workers.is_empty()).then_some(sender),
            workers,
        }
    }

    pub fn num_threads(&self) -> usize {
        self.workers.len()
    }

    /// Run `f` on a worker. The handle yields its result.
    pub fn spawn<F>(&self, f: F) -> TaskHandle
    where
        F: FnOnce() -> EvalResult<Object> + Send + 'static,
    {
        let (result_sender, receiver) = bounded(1);
        let task: BoxedTask = Box::new(move || {
            // The handle may have been dropped
            let _ = result_sender.send(f());
        });
        match &self.sender {
            Some(sender) => {
                if let Err(rejected) = sender.send(task) {
                    (rejected.into_inner())();
                }
            }
            None => task(),
        }
        TaskHandle { receiver }
    }

    /// Stop accepting tasks and wait for the workers to drain the queue.
    pub fn shutdown(mut self) {
        self.sender = None;
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
    }
}

impl Drop for EvalPool {
    fn drop(&mut self) {
        // Closing the channel is enough; joining here could mean a worker
        // joining itself when it drops the last kernel handle.
        self.sender = None;
    }
}

fn worker_loop(receiver: Receiver<BoxedTask>) {
    while let Ok(task) = receiver.recv() {
        task();
    }
}

/// Result of a spawned evaluation
#[derive(Debug)]
pub struct TaskHandle {
    receiver: Receiver<EvalResult<Object>>,
}

impl TaskHandle {
    /// Block until the evaluation finishes.
    ///
    /// A task lost with its worker reports [`EvalError::Aborted`].
    pub fn wait(self) -> EvalResult<Object> {
        self.receiver.recv().unwrap_or(Err(EvalError::Aborted))
    }

    /// The result, if the evaluation already finished
    pub fn try_wait(&self) -> Option<EvalResult<Object>> {
        self.receiver.try_recv().ok()
    }
}
