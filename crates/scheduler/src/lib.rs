//! Decode scheduling for the tiled region-image viewer.
//!
//! A single-worker FIFO pipeline: the viewer pushes [`DecodeJob`]s onto
//! a [`DecodeQueue`] and one [`DecodeWorker`] thread drains it, blocking
//! cooperatively while idle. Deduplication happens upstream (a tile
//! already marked loading is never re-queued) and staleness downstream
//! (the executor drops results whose generation no longer matches), so
//! the queue itself stays a plain FIFO.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use tileview_scheduler::{DecodeJob, DecodeQueue, DecodeWorker};
//!
//! let queue = Arc::new(DecodeQueue::new());
//! let worker = DecodeWorker::spawn(
//!     queue.clone(),
//!     Arc::new(|job| {
//!         if let DecodeJob::UpgradeTile { row, col, .. } = job {
//!             // decode the tile's source rect, store the result,
//!             // request a redraw
//!             let _ = (row, col);
//!         }
//!     }),
//! );
//!
//! queue.push(DecodeJob::UpgradeTile { row: 0, col: 0, generation: 1 });
//!
//! // Teardown drops anything still pending.
//! worker.shutdown();
//! ```

mod queue;
mod worker;

pub use queue::{DecodeJob, DecodeQueue, QueueStats};
pub use worker::{DecodeWorker, JobExecutor};
