//! Database module - AppState and database operations
//!
//! Split per concern:
//! - `installment` - installment period lookups
//! - `sequence` - the submission-number store backing the generator
//! - `submission` - submissions, documents, files and the system config snapshot

mod installment;
mod sequence;
mod submission;

use moka::future::Cache;
use sqlx::{PgConnection, PgPool};
use std::sync::Arc;
use std::time::Duration;

use crate::config::AppConfig;
use crate::conversion::DocumentConverter;
use crate::merge::PdfMerger;
use crate::numbering::{SequenceGenerator, SubmissionNumberGenerator};
use crate::process::{ProcessRunner, SystemProcessRunner};
use crate::submission::model::SystemConfigSnapshot;

pub use installment::{fetch_installment_periods, resolve_installment_for};
pub use sequence::PgSequenceStore;
pub use submission::*;

const SYSTEM_CONFIG_CACHE_KEY: &str = "latest";

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Arc<AppConfig>,
    pub numbers: Arc<dyn SubmissionNumberGenerator>,
    pub converter: Arc<DocumentConverter>,
    pub merger: Arc<PdfMerger>,
    pub system_config_cache: Cache<String, SystemConfigSnapshot>,
}

impl AppState {
    pub async fn new(config: AppConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(20)
            .min_connections(2)
            .acquire_timeout(Duration::from_secs(30))
            .idle_timeout(Duration::from_secs(900))
            .max_lifetime(Duration::from_secs(1800))
            .connect(&config.database_url)
            .await?;

        let runner: Arc<dyn ProcessRunner> = Arc::new(SystemProcessRunner::new(config.tool_timeout));
        Ok(Self::new_with_pool(pool, config, runner))
    }

    /// Assemble the state around an existing pool and process runner.
    pub fn new_with_pool(pool: PgPool, config: AppConfig, runner: Arc<dyn ProcessRunner>) -> Self {
        let numbers = Arc::new(SequenceGenerator::new(PgSequenceStore::new(pool.clone())));
        let converter = Arc::new(DocumentConverter::new(config.converter.clone(), runner.clone()));
        let merger = Arc::new(PdfMerger::new(config.merge.clone(), runner));

        let system_config_cache = Cache::builder()
            .time_to_live(Duration::from_secs(60))
            .max_capacity(1)
            .build();

        AppState {
            pool,
            config: Arc::new(config),
            numbers,
            converter,
            merger,
            system_config_cache,
        }
    }

    /// Latest system config, cached for a minute.
    ///
    /// A cache miss reads through `conn`, so callers holding a transaction never need a
    /// second pooled connection.
    pub async fn system_config(
        &self,
        conn: &mut PgConnection,
    ) -> Result<SystemConfigSnapshot, sqlx::Error> {
        if let Some(cached) = self.system_config_cache.get(SYSTEM_CONFIG_CACHE_KEY).await {
            return Ok(cached);
        }

        let snapshot = latest_system_config(conn).await?;
        self.system_config_cache
            .insert(SYSTEM_CONFIG_CACHE_KEY.to_string(), snapshot.clone())
            .await;
        Ok(snapshot)
    }
}
