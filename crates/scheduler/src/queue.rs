//! Bounded-concern FIFO queue for decode work.
//!
//! One queue feeds one worker. Jobs are processed strictly in
//! submission order; there is no per-tile priority. The queue blocks
//! its consumer on a condvar while empty instead of polling, and
//! `close` both rejects future work and drops whatever is still
//! pending, so teardown never waits for queued decodes.

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex};

/// A unit of decode work.
///
/// `generation` stamps the viewing state the job was created for; the
/// executor discards results whose generation no longer matches (image
/// replaced or grid rebuilt while the job was queued or running).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeJob {
    /// Decode every cell's low-res bitmap for a freshly built grid.
    PrimeGrid { generation: u64 },

    /// Decode one cell's full-res bitmap at the current sample size.
    UpgradeTile {
        row: u32,
        col: u32,
        generation: u64,
    },
}

/// Counters for host diagnostics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueStats {
    /// Jobs accepted by `push`.
    pub jobs_submitted: u64,
    /// Jobs pulled and run to completion by the worker.
    pub jobs_executed: u64,
    /// Jobs dropped unexecuted by `clear` or `close`.
    pub jobs_discarded: u64,
    /// Jobs currently waiting.
    pub queue_size: usize,
}

struct QueueState {
    jobs: VecDeque<DecodeJob>,
    closed: bool,
    submitted: u64,
    executed: u64,
    discarded: u64,
}

/// FIFO decode queue with cooperative blocking.
pub struct DecodeQueue {
    state: Mutex<QueueState>,
    available: Condvar,
}

impl DecodeQueue {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(QueueState {
                jobs: VecDeque::new(),
                closed: false,
                submitted: 0,
                executed: 0,
                discarded: 0,
            }),
            available: Condvar::new(),
        }
    }

    /// Enqueue a job. Returns false if the queue has been closed.
    pub fn push(&self, job: DecodeJob) -> bool {
        let mut state = self.state.lock().unwrap();
        if state.closed {
            return false;
        }
        state.jobs.push_back(job);
        state.submitted += 1;
        drop(state);

        self.available.notify_one();
        true
    }

    /// Block until a job is available or the queue is closed.
    ///
    /// Returns `None` once the queue is closed; pending jobs are not
    /// drained after close.
    pub fn pop_blocking(&self) -> Option<DecodeJob> {
        let mut state = self.state.lock().unwrap();
        loop {
            if state.closed {
                return None;
            }
            if let Some(job) = state.jobs.pop_front() {
                return Some(job);
            }
            state = self.available.wait(state).unwrap();
        }
    }

    /// Record that a popped job ran to completion.
    pub fn mark_executed(&self) {
        self.state.lock().unwrap().executed += 1;
    }

    /// Drop all pending jobs without closing. Returns how many were
    /// discarded. Used when the image or grid is replaced wholesale.
    pub fn clear(&self) -> usize {
        let mut state = self.state.lock().unwrap();
        let dropped = state.jobs.len();
        state.jobs.clear();
        state.discarded += dropped as u64;
        dropped
    }

    /// Reject future work, drop pending jobs and wake the consumer.
    pub fn close(&self) {
        let mut state = self.state.lock().unwrap();
        state.closed = true;
        let dropped = state.jobs.len();
        state.jobs.clear();
        state.discarded += dropped as u64;
        drop(state);

        self.available.notify_all();
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().unwrap().closed
    }

    pub fn len(&self) -> usize {
        self.state.lock().unwrap().jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> QueueStats {
        let state = self.state.lock().unwrap();
        QueueStats {
            jobs_submitted: state.submitted,
            jobs_executed: state.executed,
            jobs_discarded: state.discarded,
            queue_size: state.jobs.len(),
        }
    }
}

impl Default for DecodeQueue {
    fn default() -> Self {
        Self::new()
    }
}
