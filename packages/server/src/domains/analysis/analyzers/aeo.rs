use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::{json, Map, Value};
use tracing::{debug, warn};

use super::types::{recommendation, AeoOutcome, AnalysisResult, LlmUsage};
use crate::domains::analysis::models::LlmConfig;
use crate::kernel::{BaseAeoAnalyzer, BaseLlmGateway};

pub const AEO_PROMPT_TEMPLATE: &str = r#"Analyze the website {url} for Answer Engine Optimization (AEO).
Provide a comprehensive analysis including:

1. AEO Score (0-100)
2. Content structure analysis
3. Schema markup assessment
4. FAQ optimization
5. Featured snippet potential
6. Voice search readiness
7. AI-friendly content formatting
8. Recommendations for improvement

Return the analysis in JSON format with the following structure:
{
    "score": <number>,
    "factors": {
        "content_structure": {"score": <number>, "status": "<status>"},
        "schema_markup": {"score": <number>, "status": "<status>"},
        "faq_optimization": {"score": <number>, "status": "<status>"},
        "featured_snippets": {"score": <number>, "status": "<status>"},
        "voice_search": {"score": <number>, "status": "<status>"},
        "ai_formatting": {"score": <number>, "status": "<status>"}
    },
    "recommendations": [
        {
            "category": "<category>",
            "priority": "<high|medium|low>",
            "description": "<description>",
            "impact": "<high|medium|low>"
        }
    ]
}"#;

/// AEO analyzer backed by whichever LLM provider the config points at.
pub struct LlmAeoAnalyzer {
    gateway: Arc<dyn BaseLlmGateway>,
}

impl LlmAeoAnalyzer {
    pub fn new(gateway: Arc<dyn BaseLlmGateway>) -> Self {
        Self { gateway }
    }

    pub fn prompt_for(url: &str) -> String {
        AEO_PROMPT_TEMPLATE.replace("{url}", url)
    }
}

#[async_trait]
impl BaseAeoAnalyzer for LlmAeoAnalyzer {
    async fn analyze(&self, url: &str, config: &LlmConfig) -> Result<AeoOutcome> {
        let prompt = Self::prompt_for(url);

        let completion = self
            .gateway
            .complete(&prompt, config)
            .await
            .with_context(|| format!("AEO analysis via {} failed", config.name))?;

        debug!(
            url = %url,
            config = %config.name,
            tokens = completion.tokens_used,
            "AEO completion received"
        );

        let analysis = parse_aeo_response(&completion.text).unwrap_or_else(|| {
            warn!(url = %url, config = %config.name, "LLM returned unparseable AEO analysis, using default");
            default_aeo_analysis()
        });

        Ok(AeoOutcome {
            analysis,
            usage: Some(LlmUsage {
                tokens_used: completion.tokens_used,
                cost: completion.cost,
            }),
        })
    }
}

/// Parses model output into an analysis.
///
/// Tolerates markdown code fences and prose around the JSON object. Returns
/// `None` unless the payload is an object with a numeric `score`.
pub fn parse_aeo_response(text: &str) -> Option<AnalysisResult> {
    let stripped = strip_code_blocks(text);
    let candidate = match serde_json::from_str::<Value>(stripped) {
        Ok(value) => value,
        Err(_) => {
            let start = stripped.find('{')?;
            let end = stripped.rfind('}')?;
            if end <= start {
                return None;
            }
            serde_json::from_str::<Value>(&stripped[start..=end]).ok()?
        }
    };

    let object = candidate.as_object()?;
    let score = object.get("score")?.as_f64()?;

    let factors = object
        .get("factors")
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default();
    let recommendations = object
        .get("recommendations")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    Some(AnalysisResult {
        score: score.clamp(0.0, 100.0),
        factors,
        recommendations,
    })
}

/// Analysis used when the model's answer cannot be parsed.
pub fn default_aeo_analysis() -> AnalysisResult {
    // Fixed statuses, not derived from the score bands
    let factors: Map<String, Value> = [
        ("content_structure", 75, "good"),
        ("schema_markup", 60, "needs_improvement"),
        ("faq_optimization", 65, "needs_improvement"),
        ("featured_snippets", 70, "good"),
        ("voice_search", 75, "good"),
        ("ai_formatting", 80, "good"),
    ]
    .into_iter()
    .map(|(name, score, status)| (name.to_string(), json!({ "score": score, "status": status })))
    .collect();

    AnalysisResult {
        score: 70.0,
        factors,
        recommendations: vec![recommendation(
            "Schema Markup",
            "high",
            "Implement structured data markup for better AI understanding",
            "high",
        )],
    }
}

fn strip_code_blocks(response: &str) -> &str {
    response
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim()
}
