//! Postgres-backed implementations of the report repository and LLM config
//! store. Queries live on the models; these types only add transactions and
//! credential handling.

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::warn;

use crate::common::{DomainId, ReportId};
use crate::domains::analysis::models::{
    AnalysisReport, Domain, DomainOutcome, DomainStatus, LlmConfig, LlmProvider,
};
use crate::kernel::{BaseCredentialCipher, BaseLlmConfigStore, BaseReportRepository};

#[derive(Clone)]
pub struct PgReportRepository {
    pool: PgPool,
}

impl PgReportRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BaseReportRepository for PgReportRepository {
    async fn get_report(&self, id: ReportId) -> Result<Option<AnalysisReport>> {
        AnalysisReport::find_by_id(id, &self.pool).await
    }

    async fn get_domain(&self, id: DomainId) -> Result<Option<Domain>> {
        Domain::find_by_id(id, &self.pool).await
    }

    async fn save_report(&self, report: &AnalysisReport) -> Result<()> {
        report.update(&self.pool).await?;
        Ok(())
    }

    async fn set_domain_status(&self, id: DomainId, status: DomainStatus) -> Result<()> {
        Domain::update_status(id, status, &self.pool).await
    }

    async fn claim_report(&self, id: ReportId) -> Result<Option<AnalysisReport>> {
        AnalysisReport::claim_pending(id, &self.pool).await
    }

    async fn commit(&self, report: &AnalysisReport, outcome: DomainOutcome) -> Result<()> {
        let domain_id = report.domain_id;
        let mut tx = self.pool.begin().await?;

        // Taken before the report write so a concurrent commit for the same
        // domain sees this report's final status in its in-flight check.
        let domain_exists = Domain::lock_for_update(domain_id, &mut *tx).await?;

        report
            .update(&mut *tx)
            .await
            .with_context(|| format!("failed to save report {}", report.id))?;

        if domain_exists {
            Domain::record_outcome(domain_id, outcome, &mut *tx)
                .await
                .with_context(|| format!("failed to update domain {}", domain_id))?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn find_processing_started_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<AnalysisReport>> {
        AnalysisReport::find_processing_started_before(cutoff, &self.pool).await
    }
}

pub struct PgLlmConfigStore {
    pool: PgPool,
    cipher: Arc<dyn BaseCredentialCipher>,
}

impl PgLlmConfigStore {
    pub fn new(pool: PgPool, cipher: Arc<dyn BaseCredentialCipher>) -> Self {
        Self { pool, cipher }
    }
}

#[async_trait]
impl BaseLlmConfigStore for PgLlmConfigStore {
    async fn get_active_config(&self, provider: Option<LlmProvider>) -> Result<Option<LlmConfig>> {
        let Some(mut config) = LlmConfig::find_active(provider, &self.pool).await? else {
            return Ok(None);
        };

        config.api_key = self.cipher.decrypt(&config.api_key_encrypted);
        if config.api_key.is_none() {
            warn!(config = %config.name, "could not decrypt LLM API key");
        }

        Ok(Some(config))
    }

    async fn record_usage(&self, config: &LlmConfig, tokens_used: u32, cost: Option<f64>) -> Result<()> {
        LlmConfig::add_usage(config.id, tokens_used, config.cost_for(tokens_used, cost), &self.pool)
            .await
    }
}

/// Treats the stored credential as the key itself. For deployments where
/// the column is protected at the database level.
pub struct PlaintextCredentials;

impl BaseCredentialCipher for PlaintextCredentials {
    fn decrypt(&self, ciphertext: &str) -> Option<String> {
        let key = ciphertext.trim();
        (!key.is_empty()).then(|| key.to_string())
    }
}
