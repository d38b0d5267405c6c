pub mod domain;
pub mod llm_config;
pub mod report;

pub use domain::*;
pub use llm_config::*;
pub use report::*;
