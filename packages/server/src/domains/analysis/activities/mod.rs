//! Analysis activities - the business logic run by the worker.

pub mod process_report;
pub mod reconcile;

pub use process_report::{
    fail_abandoned_report, process_report, ABORTED_MESSAGE, FALLBACK_AEO_SCORE,
};
pub use reconcile::{reconcile_stale_reports, INTERRUPTED_MESSAGE};
