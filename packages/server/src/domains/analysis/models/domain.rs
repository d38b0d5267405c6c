use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgExecutor};
use typed_builder::TypedBuilder;

use crate::common::{DomainId, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, Default)]
#[sqlx(type_name = "domain_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum DomainStatus {
    #[default]
    Active,
    Analyzing,
    Error,
    Paused,
}

/// What a finished (or abandoned) report does to its domain.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DomainOutcome {
    Completed {
        seo_score: Option<f64>,
        aeo_score: Option<f64>,
    },
    Failed,
}

impl DomainOutcome {
    /// Domain status once no other report for the domain is in flight.
    pub fn settled_status(&self) -> DomainStatus {
        match self {
            DomainOutcome::Completed { .. } => DomainStatus::Active,
            DomainOutcome::Failed => DomainStatus::Error,
        }
    }
}

/// A website registered by a user for analysis.
#[derive(FromRow, Debug, Clone, Serialize, Deserialize, TypedBuilder)]
#[builder(field_defaults(setter(into)))]
pub struct Domain {
    #[builder(default)]
    pub id: DomainId,
    pub user_id: UserId,
    pub url: String,
    #[builder(default, setter(strip_option))]
    pub name: Option<String>,

    #[builder(default)]
    pub status: DomainStatus,
    #[builder(default, setter(strip_option))]
    pub last_analyzed: Option<DateTime<Utc>>,
    #[builder(default)]
    pub analysis_count: i32,

    #[builder(default, setter(strip_option))]
    pub current_seo_score: Option<f64>,
    #[builder(default, setter(strip_option))]
    pub current_aeo_score: Option<f64>,

    #[builder(default = Utc::now())]
    pub created_at: DateTime<Utc>,
    #[builder(default = Utc::now())]
    pub updated_at: DateTime<Utc>,
}

impl Domain {
    /// Records the scores of a finished analysis.
    pub fn update_scores(&mut self, seo_score: Option<f64>, aeo_score: Option<f64>) {
        self.current_seo_score = seo_score;
        self.current_aeo_score = aeo_score;
        self.last_analyzed = Some(Utc::now());
        self.analysis_count += 1;
    }

    pub fn set_status(&mut self, status: DomainStatus) {
        self.status = status;
        self.updated_at = Utc::now();
    }

    /// Folds a report outcome into the domain. Stays `analyzing` while
    /// another of its reports is still processing.
    pub fn apply_outcome(&mut self, outcome: DomainOutcome, others_in_flight: bool) {
        if let DomainOutcome::Completed { seo_score, aeo_score } = outcome {
            self.update_scores(seo_score, aeo_score);
        }
        let status = if others_in_flight {
            DomainStatus::Analyzing
        } else {
            outcome.settled_status()
        };
        self.set_status(status);
    }

    pub async fn find_by_id<'e>(id: DomainId, db: impl PgExecutor<'e>) -> Result<Option<Self>> {
        sqlx::query_as::<_, Self>("SELECT * FROM domains WHERE id = $1")
            .bind(id)
            .fetch_optional(db)
            .await
            .map_err(Into::into)
    }

    pub async fn insert<'e>(&self, db: impl PgExecutor<'e>) -> Result<Self> {
        sqlx::query_as::<_, Self>(
            r#"
            INSERT INTO domains (
                id, user_id, url, name, status, last_analyzed, analysis_count,
                current_seo_score, current_aeo_score, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING *
            "#,
        )
        .bind(self.id)
        .bind(self.user_id)
        .bind(&self.url)
        .bind(&self.name)
        .bind(self.status)
        .bind(self.last_analyzed)
        .bind(self.analysis_count)
        .bind(self.current_seo_score)
        .bind(self.current_aeo_score)
        .bind(self.created_at)
        .bind(self.updated_at)
        .fetch_one(db)
        .await
        .map_err(Into::into)
    }

    /// Row lock held until the surrounding transaction ends.
    pub async fn lock_for_update<'e>(id: DomainId, db: impl PgExecutor<'e>) -> Result<bool> {
        let row = sqlx::query("SELECT id FROM domains WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(db)
            .await?;
        Ok(row.is_some())
    }

    pub async fn update_status<'e>(
        id: DomainId,
        status: DomainStatus,
        db: impl PgExecutor<'e>,
    ) -> Result<()> {
        sqlx::query("UPDATE domains SET status = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(status)
            .execute(db)
            .await?;
        Ok(())
    }

    /// SQL counterpart of [`Domain::apply_outcome`]. The counter is
    /// incremented in place and the in-flight check reads the reports table,
    /// so callers must hold the domain row lock.
    pub async fn record_outcome<'e>(
        id: DomainId,
        outcome: DomainOutcome,
        db: impl PgExecutor<'e>,
    ) -> Result<()> {
        let (completed, seo_score, aeo_score) = match outcome {
            DomainOutcome::Completed { seo_score, aeo_score } => (true, seo_score, aeo_score),
            DomainOutcome::Failed => (false, None, None),
        };

        sqlx::query(
            r#"
            UPDATE domains SET
                current_seo_score = CASE WHEN $2 THEN $3 ELSE current_seo_score END,
                current_aeo_score = CASE WHEN $2 THEN $4 ELSE current_aeo_score END,
                last_analyzed = CASE WHEN $2 THEN NOW() ELSE last_analyzed END,
                analysis_count = analysis_count + CASE WHEN $2 THEN 1 ELSE 0 END,
                status = CASE
                    WHEN EXISTS (
                        SELECT 1 FROM analysis_reports
                        WHERE domain_id = $1 AND status = 'processing'
                    ) THEN 'analyzing'::domain_status
                    ELSE $5
                END,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(completed)
        .bind(seo_score)
        .bind(aeo_score)
        .bind(outcome.settled_status())
        .execute(db)
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_scores_bumps_counter_and_timestamp() {
        let mut domain = Domain::builder()
            .user_id(UserId::new())
            .url("https://example.com")
            .build();

        domain.update_scores(Some(75.5), Some(60.0));
        domain.update_scores(Some(80.0), None);

        assert_eq!(domain.analysis_count, 2);
        assert_eq!(domain.current_seo_score, Some(80.0));
        assert_eq!(domain.current_aeo_score, None);
        assert!(domain.last_analyzed.is_some());
    }

    #[test]
    fn outcome_settles_status_when_nothing_else_is_in_flight() {
        let mut domain = Domain::builder()
            .user_id(UserId::new())
            .url("https://example.com")
            .status(DomainStatus::Analyzing)
            .build();

        domain.apply_outcome(
            DomainOutcome::Completed {
                seo_score: Some(75.5),
                aeo_score: Some(60.0),
            },
            false,
        );
        assert_eq!(domain.status, DomainStatus::Active);
        assert_eq!(domain.analysis_count, 1);

        domain.apply_outcome(DomainOutcome::Failed, false);
        assert_eq!(domain.status, DomainStatus::Error);
        assert_eq!(domain.analysis_count, 1);
        assert_eq!(domain.current_seo_score, Some(75.5));
    }

    #[test]
    fn outcome_keeps_analyzing_while_another_report_runs() {
        let mut domain = Domain::builder()
            .user_id(UserId::new())
            .url("https://example.com")
            .status(DomainStatus::Analyzing)
            .build();

        domain.apply_outcome(
            DomainOutcome::Completed {
                seo_score: Some(80.0),
                aeo_score: None,
            },
            true,
        );

        assert_eq!(domain.status, DomainStatus::Analyzing);
        assert_eq!(domain.analysis_count, 1);
        assert_eq!(domain.current_seo_score, Some(80.0));
    }

    #[test]
    fn set_status_touches_updated_at() {
        let mut domain = Domain::builder()
            .user_id(UserId::new())
            .url("https://example.com")
            .updated_at(DateTime::<Utc>::MIN_UTC)
            .build();

        domain.set_status(DomainStatus::Analyzing);

        assert_eq!(domain.status, DomainStatus::Analyzing);
        assert!(domain.updated_at > DateTime::<Utc>::MIN_UTC);
    }
}
