//! Outbound webhook delivery against a local receiver
//!
//! Run with: cargo test --test webhook_test

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

use image_batch_compressor::{
    models::batch::WebhookOutcome,
    models::job::JobStatus,
    services::notifier::{Notifier, WebhookNotifier},
};

type Received = Arc<Mutex<Vec<serde_json::Value>>>;

/// Bind a receiver on an ephemeral port that answers with `reply`.
async fn spawn_receiver(reply: StatusCode) -> (String, Received) {
    let received: Received = Arc::default();
    let app = Router::new()
        .route(
            "/hook",
            post(
                move |State(received): State<Received>, Json(body): Json<serde_json::Value>| async move {
                    received.lock().await.push(body);
                    reply
                },
            ),
        )
        .with_state(Arc::clone(&received));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{addr}/hook"), received)
}

fn outcome(status: JobStatus, failed: &[&str]) -> WebhookOutcome {
    WebhookOutcome {
        request_id: "6b1f0c3e-6c43-4a7e-9d55-1f4f8f5d1a20".into(),
        status,
        failed_urls: failed.iter().map(|u| u.to_string()).collect(),
    }
}

#[tokio::test]
async fn test_outcome_is_posted_as_camel_case_json() {
    let (url, received) = spawn_receiver(StatusCode::OK).await;
    let notifier = WebhookNotifier::new(Some(url), Duration::from_secs(5)).unwrap();

    notifier
        .notify(&outcome(
            JobStatus::CompletedExcept(1),
            &["https://images.test/missing.png"],
        ))
        .await;

    let received = received.lock().await;
    assert_eq!(received.len(), 1);
    assert_eq!(
        received[0],
        serde_json::json!({
            "requestId": "6b1f0c3e-6c43-4a7e-9d55-1f4f8f5d1a20",
            "status": "Completed except for 1 url(s)",
            "failedUrls": ["https://images.test/missing.png"]
        })
    );
}

#[tokio::test]
async fn test_rejected_delivery_is_not_retried() {
    let (url, received) = spawn_receiver(StatusCode::INTERNAL_SERVER_ERROR).await;
    let notifier = WebhookNotifier::new(Some(url), Duration::from_secs(5)).unwrap();

    notifier.notify(&outcome(JobStatus::Completed, &[])).await;

    assert_eq!(received.lock().await.len(), 1);
}
