use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use super::{JobStore, JobStoreError};
use crate::models::job::{new_record_id, JobStatus, NewProductJob, ProductJob, ProductJobPatch};

/// Process-local job store used when no database is configured, and in tests.
#[derive(Default)]
pub struct MemoryJobStore {
    rows: RwLock<Vec<ProductJob>>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn insert_batch(
        &self,
        jobs: Vec<NewProductJob>,
    ) -> Result<Vec<ProductJob>, JobStoreError> {
        let now = Utc::now();
        let created: Vec<ProductJob> = jobs
            .into_iter()
            .map(|job| ProductJob {
                id: new_record_id(),
                serial_number: job.serial_number,
                product_name: job.product_name,
                input_image_urls: job.input_image_urls,
                output_image_urls: job.output_image_urls,
                status: job.status,
                request_id: job.request_id,
                created_at: now,
                updated_at: now,
            })
            .collect();

        self.rows.write().await.extend(created.iter().cloned());
        Ok(created)
    }

    async fn get(&self, id: &str) -> Result<Option<ProductJob>, JobStoreError> {
        Ok(self.rows.read().await.iter().find(|j| j.id == id).cloned())
    }

    async fn list(&self) -> Result<Vec<ProductJob>, JobStoreError> {
        Ok(self.rows.read().await.clone())
    }

    async fn list_by_request_id(
        &self,
        request_id: &str,
    ) -> Result<Vec<ProductJob>, JobStoreError> {
        Ok(self
            .rows
            .read()
            .await
            .iter()
            .filter(|j| j.request_id == request_id)
            .cloned()
            .collect())
    }

    async fn record_outcome(
        &self,
        id: &str,
        output_image_urls: &[String],
        status: &JobStatus,
    ) -> Result<(), JobStoreError> {
        let mut rows = self.rows.write().await;
        let job = rows
            .iter_mut()
            .find(|j| j.id == id)
            .ok_or_else(|| JobStoreError::NotFound(id.to_string()))?;
        job.output_image_urls = output_image_urls.to_vec();
        job.status = status.clone();
        job.updated_at = Utc::now();
        Ok(())
    }

    async fn update(
        &self,
        id: &str,
        patch: ProductJobPatch,
    ) -> Result<Option<ProductJob>, JobStoreError> {
        let mut rows = self.rows.write().await;
        Ok(rows.iter_mut().find(|j| j.id == id).map(|job| {
            patch.apply(job);
            job.updated_at = Utc::now();
            job.clone()
        }))
    }

    async fn delete(&self, id: &str) -> Result<Option<ProductJob>, JobStoreError> {
        let mut rows = self.rows.write().await;
        let position = rows.iter().position(|j| j.id == id);
        Ok(position.map(|idx| rows.remove(idx)))
    }

    async fn set_status_for_request(
        &self,
        request_id: &str,
        status: &JobStatus,
    ) -> Result<u64, JobStoreError> {
        let now = Utc::now();
        let mut updated = 0;
        for job in self
            .rows
            .write()
            .await
            .iter_mut()
            .filter(|j| j.request_id == request_id)
        {
            job.status = status.clone();
            job.updated_at = now;
            updated += 1;
        }
        Ok(updated)
    }

    async fn health_check(&self) -> Result<(), JobStoreError> {
        Ok(())
    }
}
