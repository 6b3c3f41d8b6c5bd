use std::time::{Duration, Instant};

use crossbeam_channel::{unbounded, Receiver, Sender};

use crate::traits::callback_context::{CallbackContext, Job};

/// A caller-facing context pumped by the thread that owns it.
///
/// Lets a plain `main` thread (or a test) act as the context on which
/// completions and observer calls land.
pub struct RunLoop {
    sender: Sender<Job>,
    receiver: Receiver<Job>,
}

/// Cloneable posting side of a [`RunLoop`].
#[derive(Clone)]
pub struct RunLoopHandle {
    sender: Sender<Job>,
}

impl RunLoop {
    pub fn new() -> Self {
        let (sender, receiver) = unbounded();
        Self { sender, receiver }
    }

    pub fn handle(&self) -> RunLoopHandle {
        RunLoopHandle {
            sender: self.sender.clone(),
        }
    }

    /// Run at most one job, waiting up to `timeout` for it. Returns whether
    /// a job ran.
    pub fn run_once(&self, timeout: Duration) -> bool {
        match self.receiver.recv_timeout(timeout) {
            Ok(job) => {
                job();
                true
            }
            Err(_) => false,
        }
    }

    /// Run every job already queued. Returns how many ran.
    pub fn run_pending(&self) -> usize {
        let mut ran = 0;
        while let Ok(job) = self.receiver.try_recv() {
            job();
            ran += 1;
        }
        ran
    }

    /// Pump jobs until `done` returns true or `timeout` elapses.
    pub fn run_until(&self, timeout: Duration, mut done: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + timeout;
        while !done() {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            self.run_once(deadline - now);
        }
        true
    }

    pub fn pending(&self) -> usize {
        self.receiver.len()
    }
}

impl Default for RunLoop {
    fn default() -> Self {
        Self::new()
    }
}

impl CallbackContext for RunLoopHandle {
    fn dispatch(&self, job: Job) {
        if self.sender.send(job).is_err() {
            log::warn!("Run loop is gone; job dropped");
        }
    }
}
