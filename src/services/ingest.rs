use std::sync::Arc;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::db::{JobStore, JobStoreError};
use crate::models::batch::{BatchRequest, ValidationError};
use crate::models::job::{NewProductJob, ProductJob};
use crate::services::pipeline::ProductPipeline;

/// Result of a successful ingest. Dropping `tasks` detaches the runs.
#[derive(Debug)]
pub struct IngestReceipt {
    pub request_id: String,
    pub jobs: Vec<ProductJob>,
    pub tasks: Vec<JoinHandle<()>>,
}

pub struct BatchIngestor {
    jobs: Arc<dyn JobStore>,
    pipeline: Arc<ProductPipeline>,
}

impl BatchIngestor {
    pub fn new(jobs: Arc<dyn JobStore>, pipeline: Arc<ProductPipeline>) -> Self {
        Self { jobs, pipeline }
    }

    /// Validate, persist all rows as `Pending`, then dispatch each product.
    ///
    /// Rows are inserted in one atomic store call, so a persistence failure
    /// leaves nothing behind and dispatches nothing.
    pub async fn ingest(&self, batch: BatchRequest) -> Result<IngestReceipt, IngestError> {
        let rows = batch.validate()?;
        let request_id = Uuid::new_v4().to_string();

        let new_jobs = rows
            .into_iter()
            .map(|row| {
                NewProductJob::pending(
                    row.serial_number,
                    row.product_name,
                    row.input_image_urls,
                    request_id.clone(),
                )
            })
            .collect();

        let jobs = self.jobs.insert_batch(new_jobs).await?;

        metrics::counter!("batches_submitted_total").increment(1);
        metrics::counter!("product_jobs_created_total").increment(jobs.len() as u64);
        tracing::info!(
            request_id = %request_id,
            products = jobs.len(),
            "Batch accepted"
        );

        let tasks = jobs
            .iter()
            .map(|job| self.pipeline.spawn(job.clone()))
            .collect();

        Ok(IngestReceipt {
            request_id,
            jobs,
            tasks,
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Failed to persist batch: {0}")]
    Persist(#[from] JobStoreError),
}
