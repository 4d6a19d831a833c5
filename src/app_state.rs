use std::sync::Arc;

use crate::db::JobStore;
use crate::services::{ingest::BatchIngestor, pipeline::ProductPipeline, status::StatusService};

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub jobs: Arc<dyn JobStore>,
    pub ingestor: Arc<BatchIngestor>,
    pub status: StatusService,
}

impl AppState {
    pub fn new(jobs: Arc<dyn JobStore>, pipeline: Arc<ProductPipeline>) -> Self {
        Self {
            ingestor: Arc::new(BatchIngestor::new(Arc::clone(&jobs), pipeline)),
            status: StatusService::new(Arc::clone(&jobs)),
            jobs,
        }
    }
}
