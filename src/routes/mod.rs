use axum::routing::{get, post};
use axum::Router;

use crate::app_state::AppState;

pub mod error;
pub mod health;
pub mod jobs;
pub mod metrics;

/// API routes without the metrics endpoint or middleware layers.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_check))
        .route(
            "/api/v1/process-image",
            get(jobs::list_jobs).post(jobs::create_job),
        )
        .route("/api/v1/process-image/upload", post(jobs::upload_batch))
        .route("/api/v1/process-image/webhook", post(jobs::inbound_webhook))
        .route(
            "/api/v1/process-image/status/{request_id}",
            get(jobs::batch_status),
        )
        .route(
            "/api/v1/process-image/{id}",
            get(jobs::get_job)
                .patch(jobs::update_job)
                .delete(jobs::delete_job),
        )
        .with_state(state)
}
