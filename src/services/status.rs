use std::sync::Arc;

use crate::db::{JobStore, JobStoreError};
use crate::models::batch::BatchStatusResponse;
use crate::models::job::{normalize_record_id, JobStatus, ProductJob};

pub const NOT_FOUND_STATUS: &str = "Not Found";

/// Read path over the job store.
#[derive(Clone)]
pub struct StatusService {
    jobs: Arc<dyn JobStore>,
}

impl StatusService {
    pub fn new(jobs: Arc<dyn JobStore>) -> Self {
        Self { jobs }
    }

    pub async fn get_by_record_id(&self, id: &str) -> Result<ProductJob, StatusError> {
        let id =
            normalize_record_id(id).ok_or_else(|| StatusError::MalformedId(id.to_string()))?;
        self.jobs
            .get(&id)
            .await?
            .ok_or(StatusError::NotFound(id))
    }

    /// All rows of a batch with their aggregate status.
    pub async fn get_by_request_id(
        &self,
        request_id: &str,
    ) -> Result<BatchStatusResponse, StatusError> {
        let results = self.jobs.list_by_request_id(request_id).await?;
        Ok(BatchStatusResponse {
            request_id: request_id.to_string(),
            status: aggregate_status(&results),
            results,
        })
    }
}

/// Batch-level status over every row of a batch.
///
/// Unanimous rows report their shared status. Otherwise an unfinished row
/// keeps the batch `Pending`, then the first externally set status (see
/// [`JobStatus::Other`]) wins. A batch finished by the pipeline alone reports
/// the total number of failed images.
pub fn aggregate_status(rows: &[ProductJob]) -> String {
    let Some(first) = rows.first() else {
        return NOT_FOUND_STATUS.to_string();
    };

    if rows.iter().all(|r| r.status == first.status) {
        return first.status.to_string();
    }
    if rows.iter().any(|r| r.status.is_pending()) {
        return JobStatus::Pending.to_string();
    }
    if let Some(external) = rows
        .iter()
        .find(|r| matches!(r.status, JobStatus::Other(_)))
    {
        return external.status.to_string();
    }

    let failed = rows.iter().map(ProductJob::failed_count).sum();
    JobStatus::from_failed_count(failed).to_string()
}

#[derive(Debug, thiserror::Error)]
pub enum StatusError {
    #[error("Invalid ID format: {0}")]
    MalformedId(String),

    #[error("Product job {0} not found")]
    NotFound(String),

    #[error(transparent)]
    Store(#[from] JobStoreError),
}
