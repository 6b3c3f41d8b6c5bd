use std::panic::{self, AssertUnwindSafe};
use std::thread::{self, JoinHandle, ThreadId};

use crossbeam_channel::{unbounded, Sender};
use parking_lot::Mutex;

use crate::models::error::SessionError;
use crate::traits::callback_context::{CallbackContext, Job};

/// A named worker thread that runs jobs one at a time, in submission order.
///
/// Used for the serial executor, the sample delivery context, and as a
/// ready-made caller-facing context for hosts without their own loop.
pub struct DispatchQueue {
    label: String,
    worker_id: ThreadId,
    sender: Mutex<Option<Sender<Job>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl DispatchQueue {
    pub fn new(label: impl Into<String>) -> Result<Self, SessionError> {
        let label = label.into();
        let (sender, receiver) = unbounded::<Job>();
        let worker_label = label.clone();

        let handle = thread::Builder::new()
            .name(label.clone())
            .spawn(move || {
                while let Ok(job) = receiver.recv() {
                    if panic::catch_unwind(AssertUnwindSafe(job)).is_err() {
                        log::error!("Job panicked on dispatch queue {}", worker_label);
                    }
                }
                log::debug!("Dispatch queue {} drained", worker_label);
            })
            .map_err(|e| {
                SessionError::ExecutorUnavailable(format!("failed to spawn {}: {}", label, e))
            })?;

        Ok(Self {
            label,
            worker_id: handle.thread().id(),
            sender: Mutex::new(Some(sender)),
            worker: Mutex::new(Some(handle)),
        })
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Whether the calling thread is this queue's worker.
    pub fn is_current(&self) -> bool {
        thread::current().id() == self.worker_id
    }

    /// Append `job` to the queue. Jobs posted after shutdown are dropped.
    pub fn enqueue(&self, job: Job) {
        match self.sender.lock().as_ref() {
            Some(sender) => {
                if sender.send(job).is_err() {
                    log::warn!("Dispatch queue {} worker exited; job dropped", self.label);
                }
            }
            None => log::warn!("Dispatch queue {} is shut down; job dropped", self.label),
        }
    }

    /// Stop accepting jobs, let the worker drain what is queued, and join it.
    ///
    /// Called from the worker itself, the join is skipped and the thread
    /// exits after its current job.
    pub fn shutdown(&self) {
        self.sender.lock().take();
        let handle = self.worker.lock().take();
        if let Some(handle) = handle {
            if self.is_current() {
                return;
            }
            if handle.join().is_err() {
                log::error!("Dispatch queue {} worker panicked", self.label);
            }
        }
    }
}

impl CallbackContext for DispatchQueue {
    fn dispatch(&self, job: Job) {
        self.enqueue(job);
    }
}

impl Drop for DispatchQueue {
    fn drop(&mut self) {
        self.shutdown();
    }
}
