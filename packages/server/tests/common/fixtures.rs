//! Test fixtures for creating test data.
//!
//! Builders produce in-memory models; the `wait_for_*` helpers poll the
//! in-memory repository while a worker runs.

use std::time::Duration;

use server_core::common::{ReportId, UserId};
use server_core::domains::analysis::models::{
    AnalysisReport, Domain, LlmConfig, LlmProvider, ReportStatus,
};
use server_core::kernel::test_dependencies::InMemoryReportRepository;

/// Install a test-writer subscriber. Safe to call from every test.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn test_domain(url: &str) -> Domain {
    Domain::builder()
        .user_id(UserId::new())
        .url(url)
        .name("Test Site".to_string())
        .build()
}

pub fn pending_report(domain: &Domain) -> AnalysisReport {
    AnalysisReport::builder()
        .domain_id(domain.id)
        .user_id(domain.user_id)
        .build()
}

/// An active config with a decrypted key.
pub fn usable_llm_config(name: &str, priority: i32) -> LlmConfig {
    LlmConfig::builder()
        .provider(LlmProvider::OpenAi)
        .name(name)
        .model_name("gpt-4o-mini")
        .api_key_encrypted("sk-test-0123456789abcdef")
        .api_key("sk-test-0123456789abcdef".to_string())
        .priority(priority)
        .cost_per_1k_tokens(0.002)
        .build()
}

/// Repository holding one domain and one pending report for it.
pub fn seeded_repository(url: &str) -> (InMemoryReportRepository, ReportId, Domain) {
    let domain = test_domain(url);
    let report = pending_report(&domain);
    let report_id = report.id;
    let repo = InMemoryReportRepository::new()
        .with_domain(domain.clone())
        .with_report(report);
    (repo, report_id, domain)
}

/// Poll until the report leaves `pending`/`processing`, or give up after 5s.
pub async fn wait_for_terminal(repo: &InMemoryReportRepository, id: ReportId) -> AnalysisReport {
    wait_for(repo, id, |r| r.status.is_terminal()).await
}

pub async fn wait_for(
    repo: &InMemoryReportRepository,
    id: ReportId,
    done: impl Fn(&AnalysisReport) -> bool,
) -> AnalysisReport {
    let poll = async {
        loop {
            if let Some(report) = repo.report(id).filter(|r| done(r)) {
                return report;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    };
    tokio::time::timeout(Duration::from_secs(5), poll)
        .await
        .unwrap_or_else(|_| panic!("report {} did not reach the expected state", id))
}

pub fn assert_status(repo: &InMemoryReportRepository, id: ReportId, status: ReportStatus) {
    assert_eq!(repo.report(id).map(|r| r.status), Some(status));
}
