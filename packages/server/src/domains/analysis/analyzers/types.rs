use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// Output of an analyzer: a 0-100 score, per-factor findings, and
/// recommendations in `{category, priority, description, impact}` shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub score: f64,
    #[serde(default)]
    pub factors: Map<String, Value>,
    #[serde(default)]
    pub recommendations: Vec<Value>,
}

impl AnalysisResult {
    pub fn to_value(&self) -> Value {
        json!({
            "score": self.score,
            "factors": self.factors,
            "recommendations": self.recommendations,
        })
    }
}

/// Tokens (and optional provider-reported cost) spent producing an AEO result.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LlmUsage {
    pub tokens_used: u32,
    pub cost: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AeoOutcome {
    pub analysis: AnalysisResult,
    /// `None` when no provider call was made.
    pub usage: Option<LlmUsage>,
}

/// Builds one factor entry, deriving its status from the score.
pub fn factor(score: f64) -> Value {
    json!({ "score": score, "status": factor_status(score) })
}

pub fn factor_status(score: f64) -> &'static str {
    if score >= 90.0 {
        "excellent"
    } else if score >= 75.0 {
        "good"
    } else if score >= 50.0 {
        "needs_improvement"
    } else {
        "poor"
    }
}

pub fn recommendation(category: &str, priority: &str, description: &str, impact: &str) -> Value {
    json!({
        "category": category,
        "priority": priority,
        "description": description,
        "impact": impact,
    })
}
