// TestDependencies - in-memory and mock implementations for testing
//
// Provides stores and analyzers that can be injected into WorkerDeps so the
// worker and activities run without Postgres or network access.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Map;

use super::{
    BaseAeoAnalyzer, BaseLlmConfigStore, BaseLlmGateway, BaseReportRepository, BaseSeoAnalyzer,
    LlmCompletion, WorkerDeps,
};
use crate::common::{DomainId, LlmConfigId, ReportId};
use crate::domains::analysis::analyzers::{
    factor, recommendation, AeoOutcome, AnalysisResult, LlmUsage,
};
use crate::domains::analysis::models::{
    AnalysisReport, Domain, DomainOutcome, DomainStatus, LlmConfig, LlmProvider, ReportStatus,
};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

// =============================================================================
// In-memory Report Repository
// =============================================================================

#[derive(Default)]
pub struct InMemoryReportRepository {
    reports: Mutex<HashMap<ReportId, AnalysisReport>>,
    domains: Mutex<HashMap<DomainId, Domain>>,
    fail_commits: AtomicBool,
    failing_commits: AtomicUsize,
    commits: AtomicUsize,
    claims: AtomicUsize,
}

impl InMemoryReportRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_domain(self, domain: Domain) -> Self {
        self.insert_domain(domain);
        self
    }

    pub fn with_report(self, report: AnalysisReport) -> Self {
        self.insert_report(report);
        self
    }

    pub fn insert_domain(&self, domain: Domain) {
        lock(&self.domains).insert(domain.id, domain);
    }

    pub fn insert_report(&self, report: AnalysisReport) {
        lock(&self.reports).insert(report.id, report);
    }

    /// Make every subsequent `commit` fail.
    pub fn fail_commits(&self, fail: bool) {
        self.fail_commits.store(fail, Ordering::SeqCst);
    }

    /// Make only the next `count` commits fail.
    pub fn fail_next_commits(&self, count: usize) {
        self.failing_commits.store(count, Ordering::SeqCst);
    }

    fn commit_should_fail(&self) -> bool {
        self.fail_commits.load(Ordering::SeqCst)
            || self
                .failing_commits
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
    }

    pub fn report(&self, id: ReportId) -> Option<AnalysisReport> {
        lock(&self.reports).get(&id).cloned()
    }

    pub fn domain(&self, id: DomainId) -> Option<Domain> {
        lock(&self.domains).get(&id).cloned()
    }

    /// Number of successful commits
    pub fn commit_count(&self) -> usize {
        self.commits.load(Ordering::SeqCst)
    }

    /// Number of successful `pending -> processing` claims
    pub fn claim_count(&self) -> usize {
        self.claims.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BaseReportRepository for InMemoryReportRepository {
    async fn get_report(&self, id: ReportId) -> Result<Option<AnalysisReport>> {
        Ok(self.report(id))
    }

    async fn get_domain(&self, id: DomainId) -> Result<Option<Domain>> {
        Ok(self.domain(id))
    }

    async fn save_report(&self, report: &AnalysisReport) -> Result<()> {
        self.insert_report(report.clone());
        Ok(())
    }

    async fn set_domain_status(&self, id: DomainId, status: DomainStatus) -> Result<()> {
        if let Some(domain) = lock(&self.domains).get_mut(&id) {
            domain.set_status(status);
        }
        Ok(())
    }

    async fn claim_report(&self, id: ReportId) -> Result<Option<AnalysisReport>> {
        let mut reports = lock(&self.reports);
        match reports.get_mut(&id) {
            Some(report) if report.status == ReportStatus::Pending => {
                report.mark_processing();
                self.claims.fetch_add(1, Ordering::SeqCst);
                Ok(Some(report.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn commit(&self, report: &AnalysisReport, outcome: DomainOutcome) -> Result<()> {
        if self.commit_should_fail() {
            return Err(anyhow!("database unavailable"));
        }

        // Same lock order as `claim_report`: reports, then domains.
        let mut reports = lock(&self.reports);
        reports.insert(report.id, report.clone());
        let others_in_flight = reports
            .values()
            .any(|r| r.domain_id == report.domain_id && r.status == ReportStatus::Processing);

        if let Some(domain) = lock(&self.domains).get_mut(&report.domain_id) {
            domain.apply_outcome(outcome, others_in_flight);
        }
        self.commits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn find_processing_started_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<AnalysisReport>> {
        let mut stale: Vec<AnalysisReport> = lock(&self.reports)
            .values()
            .filter(|r| r.status == ReportStatus::Processing)
            .filter(|r| r.started_at.unwrap_or(r.created_at) <= cutoff)
            .cloned()
            .collect();
        stale.sort_by_key(|r| r.created_at);
        Ok(stale)
    }
}

// =============================================================================
// In-memory LLM Config Store
// =============================================================================

/// Arguments captured from a `record_usage` call
#[derive(Debug, Clone, PartialEq)]
pub struct UsageCall {
    pub config_id: LlmConfigId,
    pub tokens_used: u32,
    pub cost: Option<f64>,
}

#[derive(Default)]
pub struct InMemoryLlmConfigStore {
    configs: Mutex<Vec<LlmConfig>>,
    usage_calls: Mutex<Vec<UsageCall>>,
    fail_usage: AtomicBool,
}

impl InMemoryLlmConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(self, config: LlmConfig) -> Self {
        lock(&self.configs).push(config);
        self
    }

    /// Make `record_usage` fail.
    pub fn failing_usage(self) -> Self {
        self.fail_usage.store(true, Ordering::SeqCst);
        self
    }

    pub fn usage_calls(&self) -> Vec<UsageCall> {
        lock(&self.usage_calls).clone()
    }

    pub fn config(&self, id: LlmConfigId) -> Option<LlmConfig> {
        lock(&self.configs).iter().find(|c| c.id == id).cloned()
    }
}

#[async_trait]
impl BaseLlmConfigStore for InMemoryLlmConfigStore {
    async fn get_active_config(&self, provider: Option<LlmProvider>) -> Result<Option<LlmConfig>> {
        let configs = lock(&self.configs);
        let best = configs
            .iter()
            .filter(|c| c.is_active)
            .filter(|c| provider.map_or(true, |p| c.provider == p))
            // Highest priority, oldest first on ties
            .min_by_key(|c| (std::cmp::Reverse(c.priority), c.created_at))
            .cloned();
        Ok(best)
    }

    async fn record_usage(&self, config: &LlmConfig, tokens_used: u32, cost: Option<f64>) -> Result<()> {
        if self.fail_usage.load(Ordering::SeqCst) {
            return Err(anyhow!("usage table locked"));
        }
        lock(&self.usage_calls).push(UsageCall {
            config_id: config.id,
            tokens_used,
            cost,
        });
        if let Some(stored) = lock(&self.configs).iter_mut().find(|c| c.id == config.id) {
            stored.record_usage(tokens_used, cost);
        }
        Ok(())
    }
}

// =============================================================================
// Mock SEO Analyzer
// =============================================================================

/// The canned SEO result: score 75.5 with two recommendations.
pub fn sample_seo_result() -> AnalysisResult {
    let mut factors = Map::new();
    factors.insert("title_tags".into(), factor(85.0));
    factors.insert("meta_descriptions".into(), factor(70.0));
    factors.insert("headings".into(), factor(80.0));
    factors.insert("internal_links".into(), factor(65.0));
    factors.insert("page_speed".into(), factor(75.0));
    factors.insert("mobile_friendly".into(), factor(90.0));

    AnalysisResult {
        score: 75.5,
        factors,
        recommendations: vec![
            recommendation(
                "Meta Descriptions",
                "high",
                "Add compelling meta descriptions to improve click-through rates",
                "medium",
            ),
            recommendation(
                "Internal Linking",
                "medium",
                "Improve internal link structure for better crawlability",
                "medium",
            ),
        ],
    }
}

pub struct MockSeoAnalyzer {
    result: Mutex<Result<AnalysisResult, String>>,
    delay: Option<Duration>,
    calls: Mutex<Vec<String>>,
}

impl MockSeoAnalyzer {
    pub fn new() -> Self {
        Self {
            result: Mutex::new(Ok(sample_seo_result())),
            delay: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_result(self, result: AnalysisResult) -> Self {
        *lock(&self.result) = Ok(result);
        self
    }

    pub fn failing(self, message: impl Into<String>) -> Self {
        *lock(&self.result) = Err(message.into());
        self
    }

    /// Sleep this long before answering, to simulate slow fetches
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Get all URLs that were analyzed
    pub fn calls(&self) -> Vec<String> {
        lock(&self.calls).clone()
    }

    pub fn call_count(&self) -> usize {
        lock(&self.calls).len()
    }
}

impl Default for MockSeoAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BaseSeoAnalyzer for MockSeoAnalyzer {
    async fn analyze(&self, url: &str) -> Result<AnalysisResult> {
        lock(&self.calls).push(url.to_string());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        lock(&self.result).clone().map_err(|e| anyhow!(e))
    }
}

// =============================================================================
// Mock AEO Analyzer
// =============================================================================

pub struct MockAeoAnalyzer {
    outcome: Mutex<Result<AeoOutcome, String>>,
    calls: Mutex<Vec<(String, LlmConfigId)>>,
}

impl MockAeoAnalyzer {
    pub fn new() -> Self {
        let mut factors = Map::new();
        factors.insert("schema_markup".into(), factor(72.0));
        let analysis = AnalysisResult {
            score: 82.0,
            factors,
            recommendations: vec![recommendation(
                "FAQ Optimization",
                "medium",
                "Add an FAQ section answering common customer questions",
                "high",
            )],
        };
        Self {
            outcome: Mutex::new(Ok(AeoOutcome {
                analysis,
                usage: Some(LlmUsage {
                    tokens_used: 1200,
                    cost: None,
                }),
            })),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_outcome(self, outcome: AeoOutcome) -> Self {
        *lock(&self.outcome) = Ok(outcome);
        self
    }

    pub fn failing(self, message: impl Into<String>) -> Self {
        *lock(&self.outcome) = Err(message.into());
        self
    }

    /// (url, config id) for each call
    pub fn calls(&self) -> Vec<(String, LlmConfigId)> {
        lock(&self.calls).clone()
    }
}

impl Default for MockAeoAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BaseAeoAnalyzer for MockAeoAnalyzer {
    async fn analyze(&self, url: &str, config: &LlmConfig) -> Result<AeoOutcome> {
        lock(&self.calls).push((url.to_string(), config.id));
        lock(&self.outcome).clone().map_err(|e| anyhow!(e))
    }
}

// =============================================================================
// Mock LLM Gateway
// =============================================================================

pub struct MockLlmGateway {
    responses: Mutex<Vec<Result<LlmCompletion, String>>>,
    calls: Mutex<Vec<String>>,
}

impl MockLlmGateway {
    pub fn new() -> Self {
        Self {
            responses: Mutex::new(Vec::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Add a text response to the queue
    pub fn with_response(self, text: impl Into<String>, tokens_used: u32) -> Self {
        lock(&self.responses).push(Ok(LlmCompletion {
            text: text.into(),
            tokens_used,
            cost: None,
        }));
        self
    }

    pub fn with_error(self, message: impl Into<String>) -> Self {
        lock(&self.responses).push(Err(message.into()));
        self
    }

    /// Get all prompts that were sent
    pub fn calls(&self) -> Vec<String> {
        lock(&self.calls).clone()
    }
}

impl Default for MockLlmGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BaseLlmGateway for MockLlmGateway {
    async fn complete(&self, prompt: &str, _config: &LlmConfig) -> Result<LlmCompletion> {
        lock(&self.calls).push(prompt.to_string());

        let mut responses = lock(&self.responses);
        if responses.is_empty() {
            return Ok(LlmCompletion {
                text: "Mock AI response".to_string(),
                tokens_used: 0,
                cost: None,
            });
        }
        responses.remove(0).map_err(|e| anyhow!(e))
    }
}

// =============================================================================
// TestDependencies - Builder for test dependencies
// =============================================================================

#[derive(Clone)]
pub struct TestDependencies {
    pub reports: Arc<InMemoryReportRepository>,
    pub llm_configs: Arc<InMemoryLlmConfigStore>,
    pub seo_analyzer: Arc<MockSeoAnalyzer>,
    pub aeo_analyzer: Arc<MockAeoAnalyzer>,
}

impl TestDependencies {
    pub fn new() -> Self {
        Self {
            reports: Arc::new(InMemoryReportRepository::new()),
            llm_configs: Arc::new(InMemoryLlmConfigStore::new()),
            seo_analyzer: Arc::new(MockSeoAnalyzer::new()),
            aeo_analyzer: Arc::new(MockAeoAnalyzer::new()),
        }
    }

    pub fn mock_reports(mut self, reports: InMemoryReportRepository) -> Self {
        self.reports = Arc::new(reports);
        self
    }

    pub fn mock_llm_configs(mut self, store: InMemoryLlmConfigStore) -> Self {
        self.llm_configs = Arc::new(store);
        self
    }

    pub fn mock_seo(mut self, analyzer: MockSeoAnalyzer) -> Self {
        self.seo_analyzer = Arc::new(analyzer);
        self
    }

    pub fn mock_aeo(mut self, analyzer: MockAeoAnalyzer) -> Self {
        self.aeo_analyzer = Arc::new(analyzer);
        self
    }

    /// Convert into WorkerDeps for testing
    pub fn worker_deps(&self) -> WorkerDeps {
        WorkerDeps::new(
            self.reports.clone(),
            self.llm_configs.clone(),
            self.seo_analyzer.clone(),
            self.aeo_analyzer.clone(),
        )
    }
}

impl Default for TestDependencies {
    fn default() -> Self {
        Self::new()
    }
}
