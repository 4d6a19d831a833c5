use async_trait::async_trait;
use sqlx::{postgres::PgPoolOptions, PgPool};
use std::time::Duration;

use crate::models::job::{JobStatus, NewProductJob, ProductJob, ProductJobPatch};

pub mod memory;
pub mod queries;

pub use memory::MemoryJobStore;
pub use queries::PgJobStore;

/// Initialize PostgreSQL connection pool
pub async fn init_pool(database_url: &str) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(20)
        .min_connections(5)
        .acquire_timeout(Duration::from_secs(10))
        .idle_timeout(Duration::from_secs(600))
        .max_lifetime(Duration::from_secs(1800))
        .connect(database_url)
        .await
}

/// Run database migrations
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| sqlx::Error::Migrate(Box::new(e)))
}

/// Persistence for product job rows.
///
/// Each row is written by exactly one pipeline run; administrative updates
/// and the inbound webhook may overwrite it afterwards (last writer wins).
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Insert all rows atomically, returning them in input order.
    async fn insert_batch(&self, jobs: Vec<NewProductJob>)
        -> Result<Vec<ProductJob>, JobStoreError>;

    async fn get(&self, id: &str) -> Result<Option<ProductJob>, JobStoreError>;

    async fn list(&self) -> Result<Vec<ProductJob>, JobStoreError>;

    async fn list_by_request_id(&self, request_id: &str)
        -> Result<Vec<ProductJob>, JobStoreError>;

    /// Record the terminal outputs and status of a pipeline run.
    async fn record_outcome(
        &self,
        id: &str,
        output_image_urls: &[String],
        status: &JobStatus,
    ) -> Result<(), JobStoreError>;

    async fn update(
        &self,
        id: &str,
        patch: ProductJobPatch,
    ) -> Result<Option<ProductJob>, JobStoreError>;

    async fn delete(&self, id: &str) -> Result<Option<ProductJob>, JobStoreError>;

    /// Set `status` on every row of a batch. Returns the number of rows touched.
    async fn set_status_for_request(
        &self,
        request_id: &str,
        status: &JobStatus,
    ) -> Result<u64, JobStoreError>;

    async fn health_check(&self) -> Result<(), JobStoreError>;

    /// Convenience for single-row creation.
    async fn insert(&self, job: NewProductJob) -> Result<ProductJob, JobStoreError> {
        self.insert_batch(vec![job])
            .await?
            .pop()
            .ok_or(JobStoreError::Inconsistent("insert returned no row"))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum JobStoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Product job {0} not found")]
    NotFound(String),

    #[error("Job store inconsistency: {0}")]
    Inconsistent(&'static str),
}
