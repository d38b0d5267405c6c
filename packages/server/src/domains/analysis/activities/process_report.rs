//! Per-report processing activity.
//!
//! Drives one report through `pending -> processing -> completed | failed`.
//! The `processing` transition (and the domain's `analyzing` status) is
//! persisted before any analyzer runs, so status pollers see progress while
//! the slow work happens. Results are written in a single commit at the end,
//! which also folds the outcome into the domain.

use std::time::Instant;

use anyhow::Result;
use serde_json::{json, Value};
use tracing::{debug, error, info, warn};

use crate::common::ReportId;
use crate::domains::analysis::error::{AnalysisError, ProcessOutcome};
use crate::domains::analysis::llms_txt::{self, LlmsTxtSummary};
use crate::domains::analysis::models::{
    AnalysisReport, DomainOutcome, DomainStatus, LlmConfig, ReportStatus,
};
use crate::kernel::WorkerDeps;

/// AEO score used when no usable LLM configuration exists.
pub const FALLBACK_AEO_SCORE: f64 = 60.0;

pub const ABORTED_MESSAGE: &str = "Analysis aborted unexpectedly";

/// Process one dequeued report.
///
/// - Missing report or domain: `Err(ReportNotFound | DomainNotFound)`, nothing written.
/// - Report no longer `pending`: `Ok(Skipped(status))`, nothing written.
/// - Analyzer failure: report `failed`, domain `error`, `Err(Analyzer)`.
/// - Store failure while saving results: the failure is recorded best-effort,
///   then `Err(Persistence)`. If that also fails the report stays in
///   `processing` for the startup sweep.
pub async fn process_report(
    report_id: ReportId,
    deps: &WorkerDeps,
) -> Result<ProcessOutcome, AnalysisError> {
    let repo = &deps.reports;

    let report = repo
        .get_report(report_id)
        .await
        .map_err(|e| AnalysisError::persistence(report_id, e))?
        .ok_or(AnalysisError::ReportNotFound(report_id))?;

    if report.status != ReportStatus::Pending {
        debug!(report_id = %report_id, status = %report.status, "report is not pending, skipping");
        return Ok(ProcessOutcome::Skipped(report.status));
    }

    let domain = repo
        .get_domain(report.domain_id)
        .await
        .map_err(|e| AnalysisError::persistence(report_id, e))?
        .ok_or(AnalysisError::DomainNotFound {
            report_id,
            domain_id: report.domain_id,
        })?;

    let Some(report) = repo
        .claim_report(report_id)
        .await
        .map_err(|e| AnalysisError::persistence(report_id, e))?
    else {
        debug!(report_id = %report_id, "report was claimed elsewhere, skipping");
        return Ok(ProcessOutcome::Skipped(ReportStatus::Processing));
    };

    info!(report_id = %report_id, domain_id = %domain.id, url = %domain.url, "processing analysis");

    let result = async {
        repo.set_domain_status(domain.id, DomainStatus::Analyzing).await?;
        run_analysis(report.clone(), &domain.url, deps).await
    }
    .await;

    match result {
        Ok(completed) => {
            let outcome = DomainOutcome::Completed {
                seo_score: completed.seo_score,
                aeo_score: completed.aeo_score,
            };
            if let Err(e) = repo.commit(&completed, outcome).await {
                let message = format!("Failed to save analysis results: {:#}", e);
                error!(report_id = %report_id, error = %message, "failed to commit completed analysis");
                record_failure(deps, report, message).await;
                return Err(AnalysisError::persistence(report_id, e));
            }

            info!(
                report_id = %report_id,
                seo_score = completed.seo_score,
                aeo_score = completed.aeo_score,
                overall_score = completed.overall_score,
                seconds = completed.processing_time_seconds,
                "analysis completed"
            );
            Ok(ProcessOutcome::Completed)
        }
        Err(e) => {
            let message = format!("{:#}", e);
            error!(report_id = %report_id, error = %message, "analysis failed");

            let mut failed = report;
            failed.mark_failed(message.clone());
            if let Err(e) = repo.commit(&failed, DomainOutcome::Failed).await {
                error!(report_id = %report_id, error = %e, "failed to record analysis failure");
                return Err(AnalysisError::persistence(report_id, e));
            }

            Err(AnalysisError::Analyzer { report_id, message })
        }
    }
}

/// Marks a report failed if it is still `processing`, for runs that ended
/// without finalizing (a panic in the pipeline). Returns whether a failure
/// was recorded.
pub async fn fail_abandoned_report(
    report_id: ReportId,
    deps: &WorkerDeps,
    message: &str,
) -> Result<bool> {
    match deps.reports.get_report(report_id).await? {
        Some(report) if report.status == ReportStatus::Processing => {
            warn!(report_id = %report_id, reason = message, "failing abandoned analysis");
            Ok(record_failure(deps, report, message).await)
        }
        _ => Ok(false),
    }
}

/// Best-effort: mark a claimed report failed and its domain `error`.
/// Returns whether the failure was persisted.
async fn record_failure(
    deps: &WorkerDeps,
    mut report: AnalysisReport,
    message: impl Into<String>,
) -> bool {
    let report_id = report.id;
    report.mark_failed(message);
    match deps.reports.commit(&report, DomainOutcome::Failed).await {
        Ok(()) => true,
        Err(e) => {
            error!(report_id = %report_id, error = %e, "failed to record analysis failure");
            false
        }
    }
}

/// Runs the analyzers and fills in the report. Writes nothing except LLM
/// usage; the caller commits.
async fn run_analysis(
    mut report: AnalysisReport,
    url: &str,
    deps: &WorkerDeps,
) -> Result<AnalysisReport> {
    let started = Instant::now();

    let seo = deps.seo_analyzer.analyze(url).await?;
    report.seo_score = Some(seo.score);
    report.set_seo_analysis(&seo.to_value());

    let mut recommendations: Vec<Value> = seo.recommendations.clone();

    match usable_llm_config(deps).await? {
        Some(config) => {
            let aeo = deps.aeo_analyzer.analyze(url, &config).await?;
            report.aeo_score = Some(aeo.analysis.score);
            report.set_aeo_analysis(&aeo.analysis.to_value());
            recommendations.extend(aeo.analysis.recommendations.iter().cloned());

            if let Some(usage) = aeo.usage {
                if let Err(e) = deps
                    .llm_configs
                    .record_usage(&config, usage.tokens_used, usage.cost)
                    .await
                {
                    warn!(config = %config.name, error = %e, "failed to record LLM usage");
                }
            }
        }
        None => {
            debug!(report_id = %report.id, "no usable LLM configuration, using fallback AEO score");
            report.aeo_score = Some(FALLBACK_AEO_SCORE);
            report.set_aeo_analysis(&json!({ "error": "No LLM configuration available" }));
        }
    }

    report.set_recommendations(recommendations);
    let overall = report.calculate_overall_score();

    let summary = LlmsTxtSummary::for_analysis(url, report.seo_score, report.aeo_score);
    report.llms_file_content = Some(llms_txt::generate(url, &summary));
    report.summary = Some(format!(
        "Analysis completed for {}. SEO Score: {:.1}, AEO Score: {:.1}, Overall Score: {:.1}",
        url,
        report.seo_score.unwrap_or_default(),
        report.aeo_score.unwrap_or_default(),
        overall,
    ));

    report.mark_completed(started.elapsed().as_secs_f64());

    Ok(report)
}

async fn usable_llm_config(deps: &WorkerDeps) -> Result<Option<LlmConfig>> {
    let config = deps.llm_configs.get_active_config(deps.llm_provider).await?;
    Ok(config.filter(LlmConfig::is_usable))
}
