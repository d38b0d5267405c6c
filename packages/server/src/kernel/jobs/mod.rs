//! In-process job infrastructure for report analysis.
//!
//! - [`TaskQueue`] - unbounded FIFO of [`AnalysisTask`]s
//! - [`AnalysisWorker`] - pool of loops that drain the queue
//!
//! # Architecture
//!
//! ```text
//! Request handler creates pending report
//!     │
//!     └─► worker.enqueue(report_id)
//!             └─► TaskQueue (memory only)
//!
//! AnalysisWorker loop
//!     │
//!     ├─► dequeue with timeout
//!     ├─► process_report (domains::analysis::activities)
//!     └─► log outcome
//! ```
//!
//! Business logic stays in the analysis domain; this module only moves tasks.

mod queue;
mod task;
mod worker;

pub use queue::TaskQueue;
pub use task::AnalysisTask;
pub use worker::{AnalysisWorker, AnalysisWorkerConfig};
