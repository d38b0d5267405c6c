//! Startup sweep for reports orphaned in `processing`.
//!
//! The queue lives in memory, so a report claimed by a worker that died
//! stays in `processing` forever. On startup every such report older than
//! the threshold is marked failed and its domain set to `error` once none
//! of its reports is left in `processing`.

use anyhow::Result;
use chrono::{Duration, Utc};
use tracing::{info, warn};

use crate::domains::analysis::models::DomainOutcome;
use crate::kernel::WorkerDeps;

pub const INTERRUPTED_MESSAGE: &str = "Analysis interrupted before completion";

/// Returns the number of reports marked failed.
pub async fn reconcile_stale_reports(deps: &WorkerDeps, older_than: Duration) -> Result<usize> {
    let cutoff = Utc::now() - older_than;
    let stale = deps.reports.find_processing_started_before(cutoff).await?;

    let mut reconciled = 0;
    for mut report in stale {
        let report_id = report.id;
        report.mark_failed(INTERRUPTED_MESSAGE);

        if deps.reports.get_domain(report.domain_id).await?.is_none() {
            warn!(report_id = %report_id, domain_id = %report.domain_id, "stale report has no domain");
        }

        deps.reports.commit(&report, DomainOutcome::Failed).await?;
        reconciled += 1;
    }

    if reconciled > 0 {
        info!(count = reconciled, "marked interrupted analyses as failed");
    }

    Ok(reconciled)
}
