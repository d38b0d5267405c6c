//! Kernel module - worker infrastructure and dependencies.

pub mod deps;
pub mod jobs;
pub mod llm_gateway;
pub mod postgres_store;
pub mod test_dependencies;
pub mod traits;

pub use deps::WorkerDeps;
pub use jobs::{AnalysisTask, AnalysisWorker, AnalysisWorkerConfig, TaskQueue};
pub use llm_gateway::{HttpLlmGateway, LlmGatewayError};
pub use postgres_store::{PgLlmConfigStore, PgReportRepository, PlaintextCredentials};
pub use test_dependencies::TestDependencies;
pub use traits::*;
