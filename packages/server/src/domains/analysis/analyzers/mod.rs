//! Pluggable SEO and AEO analyzers.
//!
//! - [`HtmlSeoAnalyzer`] fetches the page and scores on-page heuristics
//! - [`LlmAeoAnalyzer`] asks the configured LLM for an answer-engine review

mod aeo;
mod seo;
mod types;

pub use aeo::{default_aeo_analysis, parse_aeo_response, LlmAeoAnalyzer, AEO_PROMPT_TEMPLATE};
pub use seo::{score_html, HtmlSeoAnalyzer};
pub use types::{factor, factor_status, recommendation, AeoOutcome, AnalysisResult, LlmUsage};
