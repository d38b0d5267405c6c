//! Integration tests for the Postgres-backed stores.
//!
//! These need Docker for the Postgres container:
//! `cargo test --test postgres_store_tests -- --ignored`

mod common;

use std::sync::Arc;

use chrono::{Duration, Utc};
use common::*;
use server_core::domains::analysis::activities::process_report;
use server_core::domains::analysis::models::{
    AnalysisReport, Domain, DomainOutcome, DomainStatus, LlmConfig, LlmProvider, ReportStatus,
};
use server_core::domains::analysis::ProcessOutcome;
use server_core::kernel::test_dependencies::{MockAeoAnalyzer, MockSeoAnalyzer};
use server_core::kernel::{
    BaseLlmConfigStore, BaseReportRepository, PgLlmConfigStore, PgReportRepository,
    PlaintextCredentials, WorkerDeps,
};
use test_context::test_context;

async fn seed(ctx: &TestHarness) -> (Domain, AnalysisReport) {
    let domain = test_domain("https://example.com")
        .insert(&ctx.db_pool)
        .await
        .unwrap();
    let report = pending_report(&domain).insert(&ctx.db_pool).await.unwrap();
    (domain, report)
}

#[test_context(TestHarness)]
#[tokio::test]
#[ignore = "requires Docker"]
async fn claim_is_compare_and_set(ctx: &TestHarness) {
    let repo = PgReportRepository::new(ctx.db_pool.clone());
    let (_, report) = seed(ctx).await;

    let claimed = repo.claim_report(report.id).await.unwrap().unwrap();
    assert_eq!(claimed.status, ReportStatus::Processing);
    assert!(claimed.started_at.is_some());

    assert!(repo.claim_report(report.id).await.unwrap().is_none());
}

#[test_context(TestHarness)]
#[tokio::test]
#[ignore = "requires Docker"]
async fn processes_report_end_to_end(ctx: &TestHarness) {
    let (domain, report) = seed(ctx).await;
    let repo = Arc::new(PgReportRepository::new(ctx.db_pool.clone()));
    let deps = WorkerDeps::new(
        repo.clone(),
        Arc::new(PgLlmConfigStore::new(
            ctx.db_pool.clone(),
            Arc::new(PlaintextCredentials),
        )),
        Arc::new(MockSeoAnalyzer::new()),
        Arc::new(MockAeoAnalyzer::new()),
    )
    // No configs for this provider exist in the shared database
    .with_llm_provider(Some(LlmProvider::Google));

    let outcome = process_report(report.id, &deps).await.unwrap();
    assert_eq!(outcome, ProcessOutcome::Completed);

    let stored = repo.get_report(report.id).await.unwrap().unwrap();
    assert_eq!(stored.status, ReportStatus::Completed);
    assert_eq!(stored.overall_score, Some(67.75));
    assert_eq!(stored.recommendations().len(), 2);

    let stored_domain = repo.get_domain(domain.id).await.unwrap().unwrap();
    assert_eq!(stored_domain.status, DomainStatus::Active);
    assert_eq!(stored_domain.analysis_count, 1);
}

#[test_context(TestHarness)]
#[tokio::test]
#[ignore = "requires Docker"]
async fn concurrent_commits_on_one_domain_both_count(ctx: &TestHarness) {
    let repo = PgReportRepository::new(ctx.db_pool.clone());
    let (domain, first) = seed(ctx).await;
    let second = pending_report(&domain).insert(&ctx.db_pool).await.unwrap();

    let mut first = repo.claim_report(first.id).await.unwrap().unwrap();
    let mut second = repo.claim_report(second.id).await.unwrap().unwrap();
    first.mark_completed(1.0);
    second.mark_completed(1.0);
    let outcome = DomainOutcome::Completed {
        seo_score: Some(75.5),
        aeo_score: Some(60.0),
    };

    let (a, b) = tokio::join!(repo.commit(&first, outcome), repo.commit(&second, outcome));
    a.unwrap();
    b.unwrap();

    let stored = repo.get_domain(domain.id).await.unwrap().unwrap();
    assert_eq!(stored.analysis_count, 2);
    assert_eq!(stored.status, DomainStatus::Active);
    assert_eq!(stored.current_seo_score, Some(75.5));
}

#[test_context(TestHarness)]
#[tokio::test]
#[ignore = "requires Docker"]
async fn finds_stale_processing_reports(ctx: &TestHarness) {
    let repo = PgReportRepository::new(ctx.db_pool.clone());
    let (_, report) = seed(ctx).await;
    let mut claimed = repo.claim_report(report.id).await.unwrap().unwrap();
    claimed.started_at = Some(Utc::now() - Duration::hours(2));
    repo.save_report(&claimed).await.unwrap();

    let stale = repo
        .find_processing_started_before(Utc::now() - Duration::hours(1))
        .await
        .unwrap();

    assert!(stale.iter().any(|r| r.id == report.id));
}

#[test_context(TestHarness)]
#[tokio::test]
#[ignore = "requires Docker"]
async fn config_store_decrypts_and_records_usage(ctx: &TestHarness) {
    let config = LlmConfig::builder()
        .provider(LlmProvider::Custom)
        .name("local-proxy")
        .model_name("llama-3")
        .api_key_encrypted("sk-local")
        .priority(100)
        .cost_per_1k_tokens(0.5)
        .build()
        .insert(&ctx.db_pool)
        .await
        .unwrap();

    let store = PgLlmConfigStore::new(ctx.db_pool.clone(), Arc::new(PlaintextCredentials));
    let active = store
        .get_active_config(Some(LlmProvider::Custom))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(active.id, config.id);
    assert_eq!(active.api_key.as_deref(), Some("sk-local"));
    assert!(active.is_usable());

    store.record_usage(&active, 2000, None).await.unwrap();

    let updated = store
        .get_active_config(Some(LlmProvider::Custom))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(updated.total_requests, 1);
    assert_eq!(updated.total_tokens, 2000);
    assert!((updated.total_cost - 1.0).abs() < 1e-9);
    assert!(updated.last_used.is_some());
}
