//! The single background decode worker.
//!
//! One named thread pulls jobs off the [`DecodeQueue`] in FIFO order
//! and hands them to an executor callback. The thread blocks on the
//! queue's condvar while idle and exits when the queue is closed.
//! There is no mid-job cancellation: a running decode always finishes,
//! and staleness is handled by the executor discarding the result.

use crate::queue::{DecodeJob, DecodeQueue};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::debug;

/// Callback invoked for each job the worker pulls.
///
/// Runs on the worker thread. The executor owns re-validation: it must
/// check that the job's generation still matches the live state before
/// storing any result.
pub type JobExecutor = Arc<dyn Fn(DecodeJob) + Send + Sync>;

/// Handle to the decode worker thread.
pub struct DecodeWorker {
    queue: Arc<DecodeQueue>,
    thread: Option<JoinHandle<()>>,
}

impl DecodeWorker {
    /// Spawn the worker thread.
    pub fn spawn(queue: Arc<DecodeQueue>, executor: JobExecutor) -> Self {
        let worker_queue = queue.clone();
        let thread = thread::Builder::new()
            .name("tileview-decode".to_owned())
            .spawn(move || {
                debug!("decode worker started");
                while let Some(job) = worker_queue.pop_blocking() {
                    executor(job);
                    worker_queue.mark_executed();
                }
                debug!("decode worker stopped");
            })
            .expect("failed to spawn decode worker thread");

        Self {
            queue,
            thread: Some(thread),
        }
    }

    /// Close the queue and wait for the worker to finish its current
    /// job and exit. Pending jobs are dropped, not drained.
    pub fn shutdown(mut self) {
        self.queue.close();
        if let Some(thread) = self.thread.take() {
            thread.join().expect("decode worker thread panicked");
        }
    }
}

impl Drop for DecodeWorker {
    fn drop(&mut self) {
        self.queue.close();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    fn wait_until(deadline: Duration, condition: impl Fn() -> bool) -> bool {
        let start = std::time::Instant::now();
        while start.elapsed() < deadline {
            if condition() {
                return true;
            }
            thread::sleep(Duration::from_millis(5));
        }
        condition()
    }

    #[test]
    fn test_worker_executes_jobs_in_order() {
        let queue = Arc::new(DecodeQueue::new());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_in_executor = seen.clone();

        let worker = DecodeWorker::spawn(
            queue.clone(),
            Arc::new(move |job| {
                if let DecodeJob::UpgradeTile { row, col, .. } = job {
                    seen_in_executor.lock().unwrap().push((row, col));
                }
            }),
        );

        for col in 0..5 {
            queue.push(DecodeJob::UpgradeTile {
                row: 0,
                col,
                generation: 1,
            });
        }

        assert!(wait_until(Duration::from_secs(2), || {
            seen.lock().unwrap().len() == 5
        }));
        assert_eq!(
            *seen.lock().unwrap(),
            vec![(0, 0), (0, 1), (0, 2), (0, 3), (0, 4)]
        );

        worker.shutdown();
    }

    #[test]
    fn test_shutdown_drops_pending_jobs() {
        let queue = Arc::new(DecodeQueue::new());
        let executed = Arc::new(AtomicUsize::new(0));
        let executed_in_executor = executed.clone();

        let worker = DecodeWorker::spawn(
            queue.clone(),
            Arc::new(move |_job| {
                executed_in_executor.fetch_add(1, Ordering::SeqCst);
                thread::sleep(Duration::from_millis(50));
            }),
        );

        for col in 0..20 {
            queue.push(DecodeJob::UpgradeTile {
                row: 0,
                col,
                generation: 1,
            });
        }

        // Let the first job start, then shut down under it.
        thread::sleep(Duration::from_millis(20));
        worker.shutdown();

        let ran = executed.load(Ordering::SeqCst);
        assert!(ran < 20, "shutdown drained the whole queue ({ran} jobs)");
        assert!(queue.is_closed());
    }

    #[test]
    fn test_worker_idles_without_busy_spinning() {
        let queue = Arc::new(DecodeQueue::new());
        let executed = Arc::new(AtomicUsize::new(0));
        let executed_in_executor = executed.clone();

        let worker = DecodeWorker::spawn(
            queue.clone(),
            Arc::new(move |_job| {
                executed_in_executor.fetch_add(1, Ordering::SeqCst);
            }),
        );

        // Jobs submitted after an idle stretch still get picked up.
        thread::sleep(Duration::from_millis(100));
        queue.push(DecodeJob::PrimeGrid { generation: 1 });

        assert!(wait_until(Duration::from_secs(2), || {
            executed.load(Ordering::SeqCst) == 1
        }));

        worker.shutdown();
    }

    #[test]
    fn test_drop_joins_the_thread() {
        let queue = Arc::new(DecodeQueue::new());
        {
            let _worker = DecodeWorker::spawn(queue.clone(), Arc::new(|_job| {}));
        }
        assert!(queue.is_closed());
    }
}
