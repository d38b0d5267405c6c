// TrafficTuner - background analysis worker
//
// Scores a domain's SEO and AEO standing outside the request cycle: request
// handlers create a pending report and enqueue it, the worker does the slow
// analyzer and LLM calls and finalizes the report and its domain.
//
// Business logic lives in domains/analysis; kernel/ holds infrastructure.

pub mod common;
pub mod config;
pub mod domains;
pub mod kernel;

pub use config::*;
