use anyhow::{anyhow, Context, Result};
use dotenvy::dotenv;
use std::env;
use std::time::Duration;

use crate::domains::analysis::models::LlmProvider;

/// Worker configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub worker_poll_timeout: Duration,
    pub worker_concurrency: usize,
    /// Restrict AEO analysis to one provider's configs
    pub llm_provider: Option<LlmProvider>,
    /// `processing` reports older than this are failed at startup
    pub stale_processing_after: Duration,
    pub llm_request_timeout: Duration,
    pub seo_fetch_timeout: Duration,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();

        let llm_provider = match env::var("LLM_PROVIDER") {
            Ok(name) if !name.trim().is_empty() => Some(
                LlmProvider::parse(&name)
                    .ok_or_else(|| anyhow!("LLM_PROVIDER has unknown provider '{}'", name))?,
            ),
            _ => None,
        };

        Ok(Self {
            database_url: env::var("DATABASE_URL").context("DATABASE_URL must be set")?,
            worker_poll_timeout: Duration::from_millis(
                parse_var("WORKER_POLL_TIMEOUT_MS", 1000)
                    .context("WORKER_POLL_TIMEOUT_MS must be a valid number")?,
            ),
            worker_concurrency: parse_var("WORKER_CONCURRENCY", 1)
                .context("WORKER_CONCURRENCY must be a valid number")?,
            llm_provider,
            stale_processing_after: Duration::from_secs(
                parse_var("STALE_PROCESSING_SECS", 0)
                    .context("STALE_PROCESSING_SECS must be a valid number")?,
            ),
            llm_request_timeout: Duration::from_secs(
                parse_var("LLM_REQUEST_TIMEOUT_SECS", 120)
                    .context("LLM_REQUEST_TIMEOUT_SECS must be a valid number")?,
            ),
            seo_fetch_timeout: Duration::from_secs(
                parse_var("SEO_FETCH_TIMEOUT_SECS", 20)
                    .context("SEO_FETCH_TIMEOUT_SECS must be a valid number")?,
            ),
        })
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, default: T) -> Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(raw) => Ok(raw.trim().parse()?),
        Err(_) => Ok(default),
    }
}
