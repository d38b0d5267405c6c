use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgExecutor};
use typed_builder::TypedBuilder;

use crate::common::LlmConfigId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, Default)]
#[sqlx(type_name = "llm_provider", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum LlmProvider {
    #[default]
    OpenAi,
    Anthropic,
    Google,
    /// Any OpenAI-compatible endpoint.
    Custom,
}

impl LlmProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            LlmProvider::OpenAi => "open_ai",
            LlmProvider::Anthropic => "anthropic",
            LlmProvider::Google => "google",
            LlmProvider::Custom => "custom",
        }
    }

    /// Parses a provider name as operators write it (`openai`, `anthropic`, ...).
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "openai" | "open_ai" => Some(LlmProvider::OpenAi),
            "anthropic" => Some(LlmProvider::Anthropic),
            "google" | "gemini" => Some(LlmProvider::Google),
            "custom" => Some(LlmProvider::Custom),
            _ => None,
        }
    }

    pub fn default_endpoint(&self) -> &'static str {
        match self {
            LlmProvider::OpenAi | LlmProvider::Custom => "https://api.openai.com/v1",
            LlmProvider::Anthropic => "https://api.anthropic.com/v1",
            LlmProvider::Google => "https://generativelanguage.googleapis.com/v1beta",
        }
    }
}

/// Generation settings stored alongside a provider config.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LlmSettings {
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

/// A configured LLM provider used for AEO analysis.
///
/// `api_key` is never read from the database directly: the config store
/// decrypts `api_key_encrypted` and fills it in. A config whose key could not
/// be decrypted is not usable.
#[derive(FromRow, Debug, Clone, Serialize, Deserialize, TypedBuilder)]
#[builder(field_defaults(setter(into)))]
pub struct LlmConfig {
    #[builder(default)]
    pub id: LlmConfigId,
    #[builder(default)]
    pub provider: LlmProvider,
    pub name: String,
    pub model_name: String,
    #[builder(default, setter(strip_option))]
    pub api_endpoint: Option<String>,

    #[serde(default, skip_serializing)]
    #[builder(default)]
    pub api_key_encrypted: String,
    #[sqlx(skip)]
    #[serde(skip)]
    #[builder(default, setter(strip_option))]
    pub api_key: Option<String>,

    #[builder(default, setter(strip_option))]
    pub settings: Option<String>,

    #[builder(default = true)]
    pub is_active: bool,
    #[builder(default = 1)]
    pub priority: i32,
    #[builder(default)]
    pub cost_per_1k_tokens: f64,

    // Usage tracking
    #[builder(default)]
    pub total_requests: i64,
    #[builder(default)]
    pub total_tokens: i64,
    #[builder(default)]
    pub total_cost: f64,
    #[builder(default, setter(strip_option))]
    pub last_used: Option<DateTime<Utc>>,

    #[builder(default = Utc::now())]
    pub created_at: DateTime<Utc>,
}

impl LlmConfig {
    /// Active and holding a decrypted credential.
    pub fn is_usable(&self) -> bool {
        self.is_active && self.api_key.as_deref().is_some_and(|key| !key.is_empty())
    }

    pub fn endpoint(&self) -> &str {
        self.api_endpoint
            .as_deref()
            .filter(|e| !e.is_empty())
            .unwrap_or_else(|| self.provider.default_endpoint())
            .trim_end_matches('/')
    }

    pub fn settings(&self) -> LlmSettings {
        self.settings
            .as_deref()
            .and_then(|raw| serde_json::from_str(raw).ok())
            .unwrap_or_default()
    }

    /// Cost charged for a request: the explicit cost when the provider
    /// reported one, otherwise derived from the per-1k-token rate.
    pub fn cost_for(&self, tokens_used: u32, cost: Option<f64>) -> f64 {
        cost.unwrap_or_else(|| (tokens_used as f64 / 1000.0) * self.cost_per_1k_tokens)
    }

    pub fn record_usage(&mut self, tokens_used: u32, cost: Option<f64>) {
        self.total_requests += 1;
        self.total_tokens += i64::from(tokens_used);
        self.total_cost += self.cost_for(tokens_used, cost);
        self.last_used = Some(Utc::now());
    }

    pub fn masked_api_key(&self) -> Option<String> {
        let key = self.api_key.as_deref()?;
        let chars: Vec<char> = key.chars().collect();
        if chars.len() > 12 {
            let head: String = chars[..8].iter().collect();
            let tail: String = chars[chars.len() - 4..].iter().collect();
            Some(format!("{}...{}", head, tail))
        } else {
            Some("***".to_string())
        }
    }

    /// Highest-priority active config, optionally restricted to one provider.
    pub async fn find_active<'e>(
        provider: Option<LlmProvider>,
        db: impl PgExecutor<'e>,
    ) -> Result<Option<Self>> {
        sqlx::query_as::<_, Self>(
            r#"
            SELECT * FROM llm_configs
            WHERE is_active = true
              AND ($1::llm_provider IS NULL OR provider = $1)
            ORDER BY priority DESC, created_at ASC
            LIMIT 1
            "#,
        )
        .bind(provider)
        .fetch_optional(db)
        .await
        .map_err(Into::into)
    }

    pub async fn insert<'e>(&self, db: impl PgExecutor<'e>) -> Result<Self> {
        sqlx::query_as::<_, Self>(
            r#"
            INSERT INTO llm_configs (
                id, provider, name, model_name, api_endpoint, api_key_encrypted,
                settings, is_active, priority, cost_per_1k_tokens, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING *
            "#,
        )
        .bind(self.id)
        .bind(self.provider)
        .bind(&self.name)
        .bind(&self.model_name)
        .bind(&self.api_endpoint)
        .bind(&self.api_key_encrypted)
        .bind(&self.settings)
        .bind(self.is_active)
        .bind(self.priority)
        .bind(self.cost_per_1k_tokens)
        .bind(self.created_at)
        .fetch_one(db)
        .await
        .map_err(Into::into)
    }

    /// Adds one request's usage to the running totals.
    pub async fn add_usage<'e>(
        id: LlmConfigId,
        tokens_used: u32,
        cost: f64,
        db: impl PgExecutor<'e>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE llm_configs SET
                total_requests = total_requests + 1,
                total_tokens = total_tokens + $2,
                total_cost = total_cost + $3,
                last_used = NOW(),
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(i64::from(tokens_used))
        .bind(cost)
        .execute(db)
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> LlmConfig {
        LlmConfig::builder()
            .provider(LlmProvider::OpenAi)
            .name("OpenAI GPT-4")
            .model_name("gpt-4")
            .cost_per_1k_tokens(0.03)
            .api_key("sk-test-1234567890abcd".to_string())
            .build()
    }

    #[test]
    fn usage_derives_cost_from_rate() {
        let mut config = config();
        config.record_usage(2000, None);

        assert_eq!(config.total_requests, 1);
        assert_eq!(config.total_tokens, 2000);
        assert!((config.total_cost - 0.06).abs() < 1e-9);
        assert!(config.last_used.is_some());
    }

    #[test]
    fn usage_prefers_explicit_cost() {
        let mut config = config();
        config.record_usage(2000, Some(0.5));
        config.record_usage(1000, None);

        assert_eq!(config.total_requests, 2);
        assert_eq!(config.total_tokens, 3000);
        assert!((config.total_cost - 0.53).abs() < 1e-9);
    }

    #[test]
    fn usable_requires_active_and_key() {
        let mut config = config();
        assert!(config.is_usable());

        config.is_active = false;
        assert!(!config.is_usable());

        config.is_active = true;
        config.api_key = None;
        assert!(!config.is_usable());
    }

    #[test]
    fn settings_are_lenient() {
        let mut config = config();
        assert_eq!(config.settings(), LlmSettings::default());

        config.settings = Some("{oops".to_string());
        assert_eq!(config.settings(), LlmSettings::default());

        config.settings = Some(r#"{"temperature": 0.7, "max_tokens": 2000}"#.to_string());
        assert_eq!(config.settings().max_tokens, Some(2000));
    }

    #[test]
    fn endpoint_defaults_per_provider() {
        let mut config = config();
        assert_eq!(config.endpoint(), "https://api.openai.com/v1");

        config.api_endpoint = Some("https://llm.internal/v1/".to_string());
        assert_eq!(config.endpoint(), "https://llm.internal/v1");

        config.api_endpoint = None;
        config.provider = LlmProvider::Anthropic;
        assert_eq!(config.endpoint(), "https://api.anthropic.com/v1");
    }

    #[test]
    fn masks_keys() {
        let mut config = config();
        assert_eq!(config.masked_api_key().as_deref(), Some("sk-test-...abcd"));

        config.api_key = Some("short".to_string());
        assert_eq!(config.masked_api_key().as_deref(), Some("***"));
    }

    #[test]
    fn parses_provider_names() {
        assert_eq!(LlmProvider::parse("OpenAI"), Some(LlmProvider::OpenAi));
        assert_eq!(LlmProvider::parse("anthropic"), Some(LlmProvider::Anthropic));
        assert_eq!(LlmProvider::parse("mystery"), None);
    }
}
