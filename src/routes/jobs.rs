use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::Json;
use garde::Validate;

use super::error::{ApiError, ApiResult};
use crate::app_state::AppState;
use crate::models::batch::{
    BatchRequest, BatchStatusResponse, InboundWebhook, UploadResponse, WebhookAck,
};
use crate::models::job::{
    normalize_record_id, CreateProductJob, JobStatus, NewProductJob, ProductJob, ProductJobPatch,
};

/// Multipart field carrying the batch CSV.
const UPLOAD_FIELD: &str = "file";

/// POST /api/v1/process-image/upload: Submit a CSV batch.
pub async fn upload_batch(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ApiResult<(StatusCode, Json<UploadResponse>)> {
    let mut file = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(e.to_string()))?
    {
        if field.name() == Some(UPLOAD_FIELD) {
            let data = field
                .bytes()
                .await
                .map_err(|e| ApiError::BadRequest(e.to_string()))?;
            file = Some(data);
        }
    }
    let file = file.ok_or_else(|| ApiError::BadRequest("No file uploaded".to_string()))?;

    let batch = BatchRequest::from_csv(&file)?;
    let receipt = state.ingestor.ingest(batch).await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(UploadResponse {
            request_id: receipt.request_id,
        }),
    ))
}

/// POST /api/v1/process-image/webhook: Override status for a whole batch.
pub async fn inbound_webhook(
    State(state): State<AppState>,
    Json(body): Json<InboundWebhook>,
) -> ApiResult<Json<WebhookAck>> {
    let request_id = non_empty(body.request_id)
        .ok_or_else(|| ApiError::BadRequest("requestId is required".to_string()))?;
    let status = non_empty(body.status)
        .ok_or_else(|| ApiError::BadRequest("status is required".to_string()))?;

    let updated = state
        .jobs
        .set_status_for_request(&request_id, &JobStatus::from(status))
        .await?;

    tracing::info!(request_id = %request_id, updated, "Inbound webhook applied");

    Ok(Json(WebhookAck {
        request_id,
        updated,
    }))
}

/// GET /api/v1/process-image/status/{request_id}
pub async fn batch_status(
    State(state): State<AppState>,
    Path(request_id): Path<String>,
) -> ApiResult<Json<BatchStatusResponse>> {
    Ok(Json(state.status.get_by_request_id(&request_id).await?))
}

/// GET /api/v1/process-image/{id}
pub async fn get_job(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<ProductJob>> {
    Ok(Json(state.status.get_by_record_id(&id).await?))
}

/// GET /api/v1/process-image
pub async fn list_jobs(State(state): State<AppState>) -> ApiResult<Json<Vec<ProductJob>>> {
    Ok(Json(state.jobs.list().await?))
}

/// POST /api/v1/process-image
pub async fn create_job(
    State(state): State<AppState>,
    Json(body): Json<CreateProductJob>,
) -> ApiResult<(StatusCode, Json<ProductJob>)> {
    body.validate()?;
    let job = state.jobs.insert(NewProductJob::from(body)).await?;
    Ok((StatusCode::CREATED, Json(job)))
}

/// PATCH /api/v1/process-image/{id}
pub async fn update_job(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(patch): Json<ProductJobPatch>,
) -> ApiResult<Json<ProductJob>> {
    let id = check_id(&id)?;
    patch.validate()?;
    state
        .jobs
        .update(&id, patch)
        .await?
        .map(Json)
        .ok_or_else(|| not_found(&id))
}

/// DELETE /api/v1/process-image/{id}
pub async fn delete_job(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<ProductJob>> {
    let id = check_id(&id)?;
    state
        .jobs
        .delete(&id)
        .await?
        .map(Json)
        .ok_or_else(|| not_found(&id))
}

fn check_id(id: &str) -> ApiResult<String> {
    normalize_record_id(id)
        .ok_or_else(|| ApiError::BadRequest(format!("Invalid ID format: {id}")))
}

fn not_found(id: &str) -> ApiError {
    ApiError::NotFound(format!("Product job {id} not found"))
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
