use chrono::{DateTime, Utc};

use crate::common::ReportId;

/// In-memory descriptor of a report awaiting analysis.
///
/// Carries no report data: the worker re-reads the report when it dequeues
/// the task, so a stale descriptor can never overwrite newer state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnalysisTask {
    pub report_id: ReportId,
    pub queued_at: DateTime<Utc>,
}

impl AnalysisTask {
    pub fn new(report_id: ReportId) -> Self {
        Self {
            report_id,
            queued_at: Utc::now(),
        }
    }
}
