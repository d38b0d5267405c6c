use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sqlx::{FromRow, PgExecutor};
use typed_builder::TypedBuilder;

use crate::common::json_field;
use crate::common::{DomainId, ReportId, UserId};

// ============================================================================
// Enums
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, Default)]
#[sqlx(type_name = "report_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ReportStatus {
    #[default]
    Pending,
    Processing,
    Completed,
    Failed,
}

impl ReportStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ReportStatus::Completed | ReportStatus::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ReportStatus::Pending => "pending",
            ReportStatus::Processing => "processing",
            ReportStatus::Completed => "completed",
            ReportStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for ReportStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, Default)]
#[sqlx(type_name = "analysis_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AnalysisType {
    #[default]
    Full,
    Quick,
    Competitor,
}

// ============================================================================
// Model
// ============================================================================

/// A scored SEO/AEO analysis of one domain.
///
/// Structured findings live in JSON text columns and are decoded on access;
/// a malformed column reads back as an empty mapping or sequence.
#[derive(FromRow, Debug, Clone, Serialize, Deserialize, TypedBuilder)]
#[builder(field_defaults(setter(into)))]
pub struct AnalysisReport {
    #[builder(default)]
    pub id: ReportId,
    pub domain_id: DomainId,
    pub user_id: UserId,

    #[builder(default)]
    pub analysis_type: AnalysisType,
    #[builder(default)]
    pub status: ReportStatus,

    // Scores
    #[builder(default, setter(strip_option))]
    pub seo_score: Option<f64>,
    #[builder(default, setter(strip_option))]
    pub aeo_score: Option<f64>,
    #[builder(default, setter(strip_option))]
    pub overall_score: Option<f64>,

    // Findings (serialized JSON)
    #[builder(default, setter(strip_option))]
    pub seo_analysis: Option<String>,
    #[builder(default, setter(strip_option))]
    pub aeo_analysis: Option<String>,
    #[builder(default, setter(strip_option))]
    pub recommendations: Option<String>,
    #[builder(default, setter(strip_option))]
    pub competitor_analysis: Option<String>,

    // Generated content
    #[builder(default, setter(strip_option))]
    pub llms_file_content: Option<String>,
    #[builder(default, setter(strip_option))]
    pub summary: Option<String>,

    // Processing metadata
    #[builder(default, setter(strip_option))]
    pub processing_time_seconds: Option<f64>,
    #[builder(default, setter(strip_option))]
    pub error_message: Option<String>,

    #[builder(default = Utc::now())]
    pub created_at: DateTime<Utc>,
    #[builder(default, setter(strip_option))]
    pub started_at: Option<DateTime<Utc>>,
    #[builder(default, setter(strip_option))]
    pub completed_at: Option<DateTime<Utc>>,
}

impl AnalysisReport {
    // ------------------------------------------------------------------------
    // Structured findings
    // ------------------------------------------------------------------------

    pub fn seo_analysis(&self) -> Map<String, Value> {
        json_field::object_or_empty(self.seo_analysis.as_deref())
    }

    pub fn set_seo_analysis(&mut self, data: &Value) {
        self.seo_analysis = json_field::encode(data);
    }

    pub fn aeo_analysis(&self) -> Map<String, Value> {
        json_field::object_or_empty(self.aeo_analysis.as_deref())
    }

    pub fn set_aeo_analysis(&mut self, data: &Value) {
        self.aeo_analysis = json_field::encode(data);
    }

    pub fn competitor_analysis(&self) -> Map<String, Value> {
        json_field::object_or_empty(self.competitor_analysis.as_deref())
    }

    pub fn recommendations(&self) -> Vec<Value> {
        json_field::array_or_empty(self.recommendations.as_deref())
    }

    pub fn set_recommendations(&mut self, items: Vec<Value>) {
        self.recommendations = json_field::encode(&Value::Array(items));
    }

    // ------------------------------------------------------------------------
    // Scoring and lifecycle
    // ------------------------------------------------------------------------

    /// Mean of both component scores, the single present score, or 0.
    pub fn calculate_overall_score(&mut self) -> f64 {
        let overall = overall_score(self.seo_score, self.aeo_score);
        self.overall_score = Some(overall);
        overall
    }

    pub fn mark_processing(&mut self) {
        self.status = ReportStatus::Processing;
        self.started_at = Some(Utc::now());
    }

    pub fn mark_completed(&mut self, processing_time_seconds: f64) {
        self.status = ReportStatus::Completed;
        self.completed_at = Some(Utc::now());
        self.processing_time_seconds = Some(processing_time_seconds);
    }

    /// Moves the report to `failed`, dropping any partial results so that no
    /// score outlives the run that produced it.
    pub fn mark_failed(&mut self, error_message: impl Into<String>) {
        self.status = ReportStatus::Failed;
        self.error_message = Some(error_message.into());
        self.completed_at = Some(Utc::now());

        self.seo_score = None;
        self.aeo_score = None;
        self.overall_score = None;
        self.seo_analysis = None;
        self.aeo_analysis = None;
        self.recommendations = None;
        self.llms_file_content = None;
        self.summary = None;
        self.processing_time_seconds = None;
    }

    // ------------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------------

    pub async fn find_by_id<'e>(
        id: ReportId,
        db: impl PgExecutor<'e>,
    ) -> Result<Option<Self>> {
        sqlx::query_as::<_, Self>("SELECT * FROM analysis_reports WHERE id = $1")
            .bind(id)
            .fetch_optional(db)
            .await
            .map_err(Into::into)
    }

    /// Inserts a new report. Request handlers call this with a `pending`
    /// report before enqueueing it.
    pub async fn insert<'e>(&self, db: impl PgExecutor<'e>) -> Result<Self> {
        sqlx::query_as::<_, Self>(
            r#"
            INSERT INTO analysis_reports (
                id, domain_id, user_id, analysis_type, status, competitor_analysis, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(self.id)
        .bind(self.domain_id)
        .bind(self.user_id)
        .bind(self.analysis_type)
        .bind(self.status)
        .bind(&self.competitor_analysis)
        .bind(self.created_at)
        .fetch_one(db)
        .await
        .map_err(Into::into)
    }

    /// Atomically moves a pending report to `processing`.
    ///
    /// Returns `None` when the report is no longer pending, which is how two
    /// workers racing on the same report end up with exactly one winner.
    pub async fn claim_pending<'e>(
        id: ReportId,
        db: impl PgExecutor<'e>,
    ) -> Result<Option<Self>> {
        sqlx::query_as::<_, Self>(
            r#"
            UPDATE analysis_reports
            SET status = 'processing', started_at = NOW()
            WHERE id = $1 AND status = 'pending'
            RETURNING *
            "#,
        )
        .bind(id)
        .fetch_optional(db)
        .await
        .map_err(Into::into)
    }

    pub async fn find_processing_started_before<'e>(
        cutoff: DateTime<Utc>,
        db: impl PgExecutor<'e>,
    ) -> Result<Vec<Self>> {
        sqlx::query_as::<_, Self>(
            r#"
            SELECT * FROM analysis_reports
            WHERE status = 'processing'
              AND COALESCE(started_at, created_at) <= $1
            ORDER BY created_at ASC
            "#,
        )
        .bind(cutoff)
        .fetch_all(db)
        .await
        .map_err(Into::into)
    }

    pub async fn update<'e>(&self, db: impl PgExecutor<'e>) -> Result<Self> {
        sqlx::query_as::<_, Self>(
            r#"
            UPDATE analysis_reports SET
                status = $2,
                seo_score = $3,
                aeo_score = $4,
                overall_score = $5,
                seo_analysis = $6,
                aeo_analysis = $7,
                recommendations = $8,
                llms_file_content = $9,
                summary = $10,
                processing_time_seconds = $11,
                error_message = $12,
                started_at = $13,
                completed_at = $14
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(self.id)
        .bind(self.status)
        .bind(self.seo_score)
        .bind(self.aeo_score)
        .bind(self.overall_score)
        .bind(&self.seo_analysis)
        .bind(&self.aeo_analysis)
        .bind(&self.recommendations)
        .bind(&self.llms_file_content)
        .bind(&self.summary)
        .bind(self.processing_time_seconds)
        .bind(&self.error_message)
        .bind(self.started_at)
        .bind(self.completed_at)
        .fetch_one(db)
        .await
        .map_err(Into::into)
    }
}

/// Overall score rule shared by reports and summaries.
pub fn overall_score(seo: Option<f64>, aeo: Option<f64>) -> f64 {
    match (seo, aeo) {
        (Some(seo), Some(aeo)) => (seo + aeo) / 2.0,
        (Some(score), None) | (None, Some(score)) => score,
        (None, None) => 0.0,
    }
}
