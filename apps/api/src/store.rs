//! Storage seam for the analysis pipeline.
//!
//! Orchestrators only ever load a target by id and write one finished analysis
//! back. Each write is a single `UPDATE`, so readers never observe
//! `analyzed_at` without the content columns or the other way round.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::debug;
use uuid::Uuid;

use crate::analysis::backend::AnalysisBackend;
use crate::analysis::records::{CvAnalysis, OfferAnalysis};
use crate::models::{CvRow, JobOfferRow};

#[async_trait]
pub trait AnalysisStore: Send + Sync {
    async fn find_cv(&self, id: Uuid) -> Result<Option<CvRow>>;

    async fn save_cv_analysis(
        &self,
        id: Uuid,
        analysis: &CvAnalysis,
        analyzed_at: DateTime<Utc>,
    ) -> Result<()>;

    async fn find_job_offer(&self, id: Uuid) -> Result<Option<JobOfferRow>>;

    async fn save_offer_analysis(
        &self,
        id: Uuid,
        analysis: &OfferAnalysis,
        backend: AnalysisBackend,
        analyzed_at: DateTime<Utc>,
    ) -> Result<()>;
}

/// PostgreSQL-backed store.
#[derive(Clone)]
pub struct PgAnalysisStore {
    pool: PgPool,
}

impl PgAnalysisStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AnalysisStore for PgAnalysisStore {
    async fn find_cv(&self, id: Uuid) -> Result<Option<CvRow>> {
        Ok(sqlx::query_as::<_, CvRow>("SELECT * FROM cvs WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn save_cv_analysis(
        &self,
        id: Uuid,
        analysis: &CvAnalysis,
        analyzed_at: DateTime<Utc>,
    ) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE cvs
            SET analysis_summary = $2,
                analysis_strengths = $3,
                analysis_weaknesses = $4,
                analysis_suggestions = $5,
                analyzed_at = $6,
                updated_at = $6
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(&analysis.summary)
        .bind(&analysis.strengths)
        .bind(&analysis.weaknesses)
        .bind(&analysis.suggestions)
        .bind(analyzed_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            anyhow::bail!("CV {id} disappeared before its analysis was saved");
        }
        debug!(cv_id = %id, "Persisted CV analysis");
        Ok(())
    }

    async fn find_job_offer(&self, id: Uuid) -> Result<Option<JobOfferRow>> {
        Ok(
            sqlx::query_as::<_, JobOfferRow>("SELECT * FROM job_offers WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn save_offer_analysis(
        &self,
        id: Uuid,
        analysis: &OfferAnalysis,
        backend: AnalysisBackend,
        analyzed_at: DateTime<Utc>,
    ) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE job_offers
            SET summary = $2,
                tech_stack = $3,
                keywords = $4,
                seniority_level = $5,
                analysis_backend = $6,
                analyzed_at = $7,
                updated_at = $7
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(&analysis.summary)
        .bind(&analysis.tech_stack)
        .bind(&analysis.keywords)
        .bind(&analysis.seniority_level)
        .bind(backend.as_str())
        .bind(analyzed_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            anyhow::bail!("Job offer {id} disappeared before its analysis was saved");
        }
        debug!(job_offer_id = %id, backend = %backend, "Persisted job offer analysis");
        Ok(())
    }
}
