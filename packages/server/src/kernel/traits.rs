// Trait definitions for dependency injection
//
// These are the seams the analysis worker is written against. Production
// wiring lives in `postgres_store`, `llm_gateway` and the analyzers; tests use
// the in-memory versions in `test_dependencies`.
//
// Naming convention: Base* for trait names (e.g., BaseReportRepository)

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::common::{DomainId, ReportId};
use crate::domains::analysis::analyzers::{AeoOutcome, AnalysisResult};
use crate::domains::analysis::models::{
    AnalysisReport, Domain, DomainOutcome, DomainStatus, LlmConfig, LlmProvider,
};

// =============================================================================
// Report Repository (Persistence)
// =============================================================================

#[async_trait]
pub trait BaseReportRepository: Send + Sync {
    async fn get_report(&self, id: ReportId) -> Result<Option<AnalysisReport>>;

    async fn get_domain(&self, id: DomainId) -> Result<Option<Domain>>;

    async fn save_report(&self, report: &AnalysisReport) -> Result<()>;

    async fn set_domain_status(&self, id: DomainId, status: DomainStatus) -> Result<()>;

    /// Compare-and-set `pending -> processing`, persisted immediately.
    /// Returns `None` if the report was no longer pending.
    async fn claim_report(&self, id: ReportId) -> Result<Option<AnalysisReport>>;

    /// Persist a report and fold `outcome` into its domain as one
    /// transaction, serialized per domain. The domain counter is incremented
    /// in the store and the domain stays `analyzing` while another of its
    /// reports is `processing`. A missing domain only skips the domain update.
    async fn commit(&self, report: &AnalysisReport, outcome: DomainOutcome) -> Result<()>;

    /// Reports stuck in `processing` since before `cutoff`.
    async fn find_processing_started_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<AnalysisReport>>;
}

// =============================================================================
// LLM Configuration Store
// =============================================================================

#[async_trait]
pub trait BaseLlmConfigStore: Send + Sync {
    /// Highest-priority active config, optionally restricted to one provider.
    /// The returned config has its credential decrypted when possible.
    async fn get_active_config(&self, provider: Option<LlmProvider>) -> Result<Option<LlmConfig>>;

    async fn record_usage(&self, config: &LlmConfig, tokens_used: u32, cost: Option<f64>)
        -> Result<()>;
}

/// Decrypts stored provider credentials. `None` means the credential is not
/// usable (missing, corrupt, or encrypted under another key).
pub trait BaseCredentialCipher: Send + Sync {
    fn decrypt(&self, ciphertext: &str) -> Option<String>;
}

// =============================================================================
// LLM Gateway (Infrastructure)
// =============================================================================

/// Text returned by a provider plus what it cost.
#[derive(Debug, Clone, PartialEq)]
pub struct LlmCompletion {
    pub text: String,
    pub tokens_used: u32,
    /// Provider-reported cost, when the provider reports one.
    pub cost: Option<f64>,
}

#[async_trait]
pub trait BaseLlmGateway: Send + Sync {
    /// Send a prompt to the provider described by `config`.
    async fn complete(&self, prompt: &str, config: &LlmConfig) -> Result<LlmCompletion>;
}

// =============================================================================
// Analyzers
// =============================================================================

#[async_trait]
pub trait BaseSeoAnalyzer: Send + Sync {
    async fn analyze(&self, url: &str) -> Result<AnalysisResult>;
}

#[async_trait]
pub trait BaseAeoAnalyzer: Send + Sync {
    /// Errors only when the provider call itself fails. Unparseable model
    /// output comes back as the default analysis, not an error.
    async fn analyze(&self, url: &str, config: &LlmConfig) -> Result<AeoOutcome>;
}
