use thiserror::Error;

use super::models::ReportStatus;
use crate::common::{DomainId, ReportId};

/// Why a dequeued task did not produce a completed report.
///
/// Nothing here reaches a caller: the enqueueing request has long since
/// returned. Users see failures through the report's `status` and
/// `error_message`; everything else is only logged.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("report {0} not found")]
    ReportNotFound(ReportId),

    #[error("domain {domain_id} for report {report_id} not found")]
    DomainNotFound {
        report_id: ReportId,
        domain_id: DomainId,
    },

    /// An analyzer or the LLM call failed; the report was marked failed.
    #[error("analysis of report {report_id} failed: {message}")]
    Analyzer { report_id: ReportId, message: String },

    /// The store could not be read or written.
    #[error("persistence error for report {report_id}: {source}")]
    Persistence {
        report_id: ReportId,
        #[source]
        source: anyhow::Error,
    },
}

impl AnalysisError {
    pub fn persistence(report_id: ReportId, source: anyhow::Error) -> Self {
        AnalysisError::Persistence { report_id, source }
    }
}

/// How a task ended when it did not error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessOutcome {
    Completed,
    /// Report was not `pending` at dequeue (duplicate enqueue or lost claim).
    Skipped(ReportStatus),
}
