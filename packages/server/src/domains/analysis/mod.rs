//! Website analysis: report model, analyzers and the per-report pipeline.

pub mod activities;
pub mod analyzers;
pub mod error;
pub mod llms_txt;
pub mod models;

pub use error::{AnalysisError, ProcessOutcome};
