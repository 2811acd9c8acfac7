//! Submission-number store backed by the `submissions` table

use async_trait::async_trait;
use sqlx::PgPool;

use crate::error::PipelineError;
use crate::numbering::SequenceStore;

#[derive(Clone)]
pub struct PgSequenceStore {
    pool: PgPool,
}

impl PgSequenceStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SequenceStore for PgSequenceStore {
    async fn current_year_label(&self) -> Result<Option<String>, PipelineError> {
        let label: Option<Option<String>> = sqlx::query_scalar(
            "SELECT current_year FROM system_config ORDER BY config_id DESC LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await?;
        Ok(label.flatten())
    }

    async fn count_numbers_with_prefix(&self, prefix: &str) -> Result<i64, PipelineError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM submissions WHERE submission_number LIKE $1",
        )
        .bind(format!("{}%", prefix))
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    async fn number_exists(&self, number: &str) -> Result<bool, PipelineError> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM submissions WHERE submission_number = $1)",
        )
        .bind(number)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }
}
