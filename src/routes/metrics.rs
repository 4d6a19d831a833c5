use axum::extract::State;
use axum::response::IntoResponse;
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;

/// GET /metrics: Prometheus text exposition of pipeline counters.
pub async fn prometheus_metrics(State(handle): State<Arc<PrometheusHandle>>) -> impl IntoResponse {
    handle.render()
}

/// Register descriptions for the metrics emitted by the pipeline.
pub fn describe() {
    ::metrics::describe_counter!("batches_submitted_total", "CSV batches accepted");
    ::metrics::describe_counter!("product_jobs_created_total", "Product rows created by ingestion");
    ::metrics::describe_counter!("images_processed_total", "Images compressed and stored");
    ::metrics::describe_counter!("images_failed_total", "Images skipped after fetch or decode failure");
    ::metrics::describe_counter!(
        "artifact_store_failures_total",
        "Product runs aborted by an object storage failure"
    );
    ::metrics::describe_counter!("product_jobs_completed_total", "Product runs persisted as completed");
    ::metrics::describe_counter!(
        "webhook_deliveries_failed_total",
        "Outbound webhook notifications that were dropped"
    );
    ::metrics::describe_histogram!("image_compression_seconds", "Time spent compressing one image");
}
