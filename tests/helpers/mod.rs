//! In-process fakes and harness for pipeline and API tests

#![allow(dead_code)]

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Method, Request};
use axum::response::Response;
use axum::Router;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::sleep;

use image_batch_compressor::{
    app_state::AppState,
    db::{JobStore, JobStoreError, MemoryJobStore},
    models::batch::WebhookOutcome,
    models::job::{JobStatus, NewProductJob, ProductJob, ProductJobPatch},
    routes,
    services::{
        compression::JpegCompressor,
        fetcher::{FetchError, ImageFetcher},
        notifier::Notifier,
        pipeline::ProductPipeline,
        storage::{ArtifactStore, StoreError},
    },
};

/// Serves fixed bytes per URL; anything else is a 404.
#[derive(Default)]
pub struct StaticFetcher {
    images: HashMap<String, Vec<u8>>,
    delay: Option<Duration>,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    calls: AtomicUsize,
}

impl StaticFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_image(mut self, url: impl Into<String>, bytes: Vec<u8>) -> Self {
        self.images.insert(url.into(), bytes);
        self
    }

    /// Hold each fetch open for `delay` so overlapping calls can be observed.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Highest number of fetches observed in flight at once.
    pub fn peak_in_flight(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ImageFetcher for StaticFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            sleep(delay).await;
        }

        let result = self
            .images
            .get(url)
            .cloned()
            .ok_or(FetchError::Status(404));

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

/// Keeps uploaded artifacts in memory, or rejects every upload.
#[derive(Default)]
pub struct MemoryArtifactStore {
    objects: Mutex<Vec<(String, Vec<u8>)>>,
    reject: bool,
}

pub const ARTIFACT_BASE_URL: &str = "https://cdn.test";

impl MemoryArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rejecting() -> Self {
        Self {
            reject: true,
            ..Self::default()
        }
    }

    pub async fn objects(&self) -> Vec<(String, Vec<u8>)> {
        self.objects.lock().await.clone()
    }
}

#[async_trait]
impl ArtifactStore for MemoryArtifactStore {
    async fn put(&self, data: Vec<u8>, _content_type: &str) -> Result<String, StoreError> {
        let mut objects = self.objects.lock().await;
        let key = format!("compressed-image-{}.jpg", objects.len());
        if self.reject {
            return Err(StoreError::Status { key, status: 503 });
        }
        let url = format!("{ARTIFACT_BASE_URL}/{key}");
        objects.push((url.clone(), data));
        Ok(url)
    }
}

/// Records every outcome instead of posting it.
#[derive(Default)]
pub struct RecordingNotifier {
    outcomes: Mutex<Vec<WebhookOutcome>>,
}

impl RecordingNotifier {
    pub async fn outcomes(&self) -> Vec<WebhookOutcome> {
        self.outcomes.lock().await.clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, outcome: &WebhookOutcome) {
        self.outcomes.lock().await.push(outcome.clone());
    }
}

/// Memory store whose writes can be switched to fail.
#[derive(Default)]
pub struct FlakyJobStore {
    inner: MemoryJobStore,
    fail_inserts: bool,
    fail_outcomes: bool,
}

impl FlakyJobStore {
    pub fn failing_inserts() -> Self {
        Self {
            fail_inserts: true,
            ..Self::default()
        }
    }

    pub fn failing_outcomes() -> Self {
        Self {
            fail_outcomes: true,
            ..Self::default()
        }
    }
}

fn unavailable() -> JobStoreError {
    JobStoreError::Database(sqlx::Error::PoolTimedOut)
}

#[async_trait]
impl JobStore for FlakyJobStore {
    async fn insert_batch(
        &self,
        jobs: Vec<NewProductJob>,
    ) -> Result<Vec<ProductJob>, JobStoreError> {
        if self.fail_inserts {
            return Err(unavailable());
        }
        self.inner.insert_batch(jobs).await
    }

    async fn get(&self, id: &str) -> Result<Option<ProductJob>, JobStoreError> {
        self.inner.get(id).await
    }

    async fn list(&self) -> Result<Vec<ProductJob>, JobStoreError> {
        self.inner.list().await
    }

    async fn list_by_request_id(
        &self,
        request_id: &str,
    ) -> Result<Vec<ProductJob>, JobStoreError> {
        self.inner.list_by_request_id(request_id).await
    }

    async fn record_outcome(
        &self,
        id: &str,
        output_image_urls: &[String],
        status: &JobStatus,
    ) -> Result<(), JobStoreError> {
        if self.fail_outcomes {
            return Err(unavailable());
        }
        self.inner.record_outcome(id, output_image_urls, status).await
    }

    async fn update(
        &self,
        id: &str,
        patch: ProductJobPatch,
    ) -> Result<Option<ProductJob>, JobStoreError> {
        self.inner.update(id, patch).await
    }

    async fn delete(&self, id: &str) -> Result<Option<ProductJob>, JobStoreError> {
        self.inner.delete(id).await
    }

    async fn set_status_for_request(
        &self,
        request_id: &str,
        status: &JobStatus,
    ) -> Result<u64, JobStoreError> {
        self.inner.set_status_for_request(request_id, status).await
    }

    async fn health_check(&self) -> Result<(), JobStoreError> {
        if self.fail_inserts {
            return Err(unavailable());
        }
        Ok(())
    }
}

/// A pipeline wired to fakes, with handles to inspect each of them.
pub struct Harness {
    pub jobs: Arc<dyn JobStore>,
    pub fetcher: Arc<StaticFetcher>,
    pub artifacts: Arc<MemoryArtifactStore>,
    pub notifier: Arc<RecordingNotifier>,
    pub pipeline: Arc<ProductPipeline>,
}

impl Harness {
    pub fn new(fetcher: StaticFetcher) -> Self {
        Self::build(
            fetcher,
            MemoryArtifactStore::new(),
            Arc::new(MemoryJobStore::new()),
            4,
        )
    }

    pub fn build(
        fetcher: StaticFetcher,
        artifacts: MemoryArtifactStore,
        jobs: Arc<dyn JobStore>,
        permits: usize,
    ) -> Self {
        let fetcher = Arc::new(fetcher);
        let artifacts = Arc::new(artifacts);
        let notifier = Arc::new(RecordingNotifier::default());
        let pipeline = Arc::new(ProductPipeline::new(
            fetcher.clone(),
            Arc::new(JpegCompressor::default()),
            artifacts.clone(),
            Arc::clone(&jobs),
            notifier.clone(),
            permits,
        ));
        Self {
            jobs,
            fetcher,
            artifacts,
            notifier,
            pipeline,
        }
    }

    pub fn state(&self) -> AppState {
        AppState::new(Arc::clone(&self.jobs), Arc::clone(&self.pipeline))
    }

    pub fn router(&self) -> Router {
        routes::router(self.state())
    }

    /// Poll until no row of the batch is `Pending`, or panic after `timeout`.
    pub async fn wait_for_batch(&self, request_id: &str, timeout: Duration) -> Vec<ProductJob> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let rows = self
                .jobs
                .list_by_request_id(request_id)
                .await
                .expect("list batch rows");
            if !rows.is_empty() && rows.iter().all(|r| !r.status.is_pending()) {
                return rows;
            }
            if tokio::time::Instant::now() >= deadline {
                panic!("Batch {request_id} did not finish within {timeout:?}");
            }
            sleep(Duration::from_millis(20)).await;
        }
    }
}

pub const BOUNDARY: &str = "----batch-upload-boundary";

/// Multipart POST carrying `content` as a file under `field`.
pub fn multipart_upload(uri: &str, field: &str, content: &str) -> Request<Body> {
    let body = format!(
        "--{BOUNDARY}\r\n\
         Content-Disposition: form-data; name=\"{field}\"; filename=\"batch.csv\"\r\n\
         Content-Type: text/csv\r\n\r\n\
         {content}\r\n\
         --{BOUNDARY}--\r\n"
    );
    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .expect("build multipart request")
}

pub fn json_request(method: Method, uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .expect("build JSON request")
}

pub fn get_request(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .body(Body::empty())
        .expect("build GET request")
}

pub async fn body_json(response: Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read response body");
    serde_json::from_slice(&bytes).expect("response body is JSON")
}
