//! Worker dependencies (using traits for testability)
//!
//! This module provides the dependency container handed to every analysis
//! task. All external collaborators sit behind `Base*` traits.

use std::sync::Arc;

use crate::domains::analysis::models::LlmProvider;
use crate::kernel::{BaseAeoAnalyzer, BaseLlmConfigStore, BaseReportRepository, BaseSeoAnalyzer};

/// Dependencies accessible to the analysis worker.
#[derive(Clone)]
pub struct WorkerDeps {
    pub reports: Arc<dyn BaseReportRepository>,
    pub llm_configs: Arc<dyn BaseLlmConfigStore>,
    pub seo_analyzer: Arc<dyn BaseSeoAnalyzer>,
    pub aeo_analyzer: Arc<dyn BaseAeoAnalyzer>,
    /// Restricts AEO analysis to one provider's configs when set.
    pub llm_provider: Option<LlmProvider>,
}

impl WorkerDeps {
    pub fn new(
        reports: Arc<dyn BaseReportRepository>,
        llm_configs: Arc<dyn BaseLlmConfigStore>,
        seo_analyzer: Arc<dyn BaseSeoAnalyzer>,
        aeo_analyzer: Arc<dyn BaseAeoAnalyzer>,
    ) -> Self {
        Self {
            reports,
            llm_configs,
            seo_analyzer,
            aeo_analyzer,
            llm_provider: None,
        }
    }

    pub fn with_llm_provider(mut self, provider: Option<LlmProvider>) -> Self {
        self.llm_provider = provider;
        self
    }
}
