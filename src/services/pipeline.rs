//! Per-product fetch → compress → store pipeline.
//!
//! Fetch and decode failures are recorded per image as an empty output slot.
//! Storage and persistence failures abort the product's run and are reported
//! to whoever awaits it; for spawned runs that is the log.

use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;

use crate::db::{JobStore, JobStoreError};
use crate::models::batch::WebhookOutcome;
use crate::models::job::{JobStatus, ProductJob};
use crate::services::compression::{CodecError, ImageCompressor};
use crate::services::fetcher::{FetchError, ImageFetcher};
use crate::services::notifier::Notifier;
use crate::services::storage::{ArtifactStore, StoreError, JPEG_CONTENT_TYPE};

/// Summary of a finished product run.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessedProduct {
    pub record_id: String,
    pub request_id: String,
    pub output_image_urls: Vec<String>,
    pub failed_urls: Vec<String>,
    pub status: JobStatus,
}

/// Recoverable, per-image failure.
#[derive(Debug, thiserror::Error)]
pub enum ImageError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Codec(#[from] CodecError),
}

enum ImageOutcome {
    Stored(String),
    Failed(ImageError),
}

pub struct ProductPipeline {
    fetcher: Arc<dyn ImageFetcher>,
    compressor: Arc<dyn ImageCompressor>,
    artifacts: Arc<dyn ArtifactStore>,
    jobs: Arc<dyn JobStore>,
    notifier: Arc<dyn Notifier>,
    permits: Arc<Semaphore>,
}

impl ProductPipeline {
    /// `max_in_flight` bounds concurrent image operations across all products.
    pub fn new(
        fetcher: Arc<dyn ImageFetcher>,
        compressor: Arc<dyn ImageCompressor>,
        artifacts: Arc<dyn ArtifactStore>,
        jobs: Arc<dyn JobStore>,
        notifier: Arc<dyn Notifier>,
        max_in_flight: usize,
    ) -> Self {
        Self {
            fetcher,
            compressor,
            artifacts,
            jobs,
            notifier,
            permits: Arc::new(Semaphore::new(max_in_flight.max(1))),
        }
    }

    /// Run the pipeline in the background. Errors are logged with job ids.
    pub fn spawn(self: &Arc<Self>, job: ProductJob) -> JoinHandle<()> {
        let pipeline = Arc::clone(self);
        tokio::spawn(async move {
            let record_id = job.id.clone();
            let request_id = job.request_id.clone();
            if let Err(e) = pipeline.run(job).await {
                tracing::error!(
                    request_id = %request_id,
                    record_id = %record_id,
                    error = %e,
                    "Product pipeline failed"
                );
            }
        })
    }

    /// Process every input URL in order, persist the outcome, then notify.
    pub async fn run(&self, job: ProductJob) -> Result<ProcessedProduct, PipelineError> {
        tracing::info!(
            request_id = %job.request_id,
            record_id = %job.id,
            images = job.input_image_urls.len(),
            "Processing product"
        );

        let mut output_image_urls = Vec::with_capacity(job.input_image_urls.len());
        let mut failed_urls = Vec::new();

        for url in &job.input_image_urls {
            match self.process_image(url).await {
                Ok(ImageOutcome::Stored(public_url)) => {
                    metrics::counter!("images_processed_total").increment(1);
                    output_image_urls.push(public_url);
                }
                Ok(ImageOutcome::Failed(e)) => {
                    metrics::counter!("images_failed_total").increment(1);
                    tracing::warn!(
                        request_id = %job.request_id,
                        record_id = %job.id,
                        url = %url,
                        error = %e,
                        "Image skipped"
                    );
                    output_image_urls.push(String::new());
                    failed_urls.push(url.clone());
                }
                Err(source) => {
                    metrics::counter!("artifact_store_failures_total").increment(1);
                    return Err(PipelineError::Store {
                        url: url.clone(),
                        source,
                    });
                }
            }
        }

        let status = JobStatus::from_failed_count(failed_urls.len());
        self.jobs
            .record_outcome(&job.id, &output_image_urls, &status)
            .await?;
        metrics::counter!("product_jobs_completed_total").increment(1);

        tracing::info!(
            request_id = %job.request_id,
            record_id = %job.id,
            status = %status,
            "Product completed"
        );

        let outcome = WebhookOutcome {
            request_id: job.request_id.clone(),
            status: status.clone(),
            failed_urls: failed_urls.clone(),
        };
        self.notifier.notify(&outcome).await;

        Ok(ProcessedProduct {
            record_id: job.id,
            request_id: job.request_id,
            output_image_urls,
            failed_urls,
            status,
        })
    }

    /// Fetch, compress and store one image while holding a pool permit.
    async fn process_image(&self, url: &str) -> Result<ImageOutcome, StoreError> {
        // Never closed, so acquisition can only wait.
        let _permit = self.permits.acquire().await.ok();

        let original = match self.fetcher.fetch(url).await {
            Ok(bytes) => bytes,
            Err(e) => return Ok(ImageOutcome::Failed(e.into())),
        };

        let compressed = match self.compress_blocking(original).await {
            Ok(bytes) => bytes,
            Err(e) => return Ok(ImageOutcome::Failed(e.into())),
        };

        let public_url = self.artifacts.put(compressed, JPEG_CONTENT_TYPE).await?;
        Ok(ImageOutcome::Stored(public_url))
    }

    async fn compress_blocking(&self, original: Vec<u8>) -> Result<Vec<u8>, CodecError> {
        let compressor = Arc::clone(&self.compressor);
        tokio::task::spawn_blocking(move || compressor.compress(&original))
            .await
            .map_err(|e| CodecError::Worker(e.to_string()))?
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Failed to store compressed image for {url}: {source}")]
    Store {
        url: String,
        #[source]
        source: StoreError,
    },

    #[error("Failed to persist product outcome: {0}")]
    Persist(#[from] JobStoreError),
}
