//! Best-effort outbound webhook.
//!
//! One POST per product outcome. Missing or malformed targets and delivery
//! failures are logged and dropped; nothing is retried.

use async_trait::async_trait;
use reqwest::{Client, Url};
use std::time::Duration;

use crate::models::batch::WebhookOutcome;

/// Receives per-product outcomes. Never fails toward its caller.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, outcome: &WebhookOutcome);
}

pub struct WebhookNotifier {
    http: Client,
    target: Option<String>,
}

impl WebhookNotifier {
    pub fn new(target: Option<String>, timeout: Duration) -> Result<Self, NotifyError> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self { http, target })
    }

    /// Resolve and validate the configured target.
    fn resolve_target(&self) -> Result<Url, NotifyError> {
        let raw = self
            .target
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(NotifyError::NotConfigured)?;
        parse_target(raw)
    }

    async fn deliver(&self, url: Url, outcome: &WebhookOutcome) -> Result<(), NotifyError> {
        let response = self.http.post(url).json(outcome).send().await?;
        if !response.status().is_success() {
            return Err(NotifyError::HttpStatus(response.status().as_u16()));
        }
        Ok(())
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, outcome: &WebhookOutcome) {
        let result = match self.resolve_target() {
            Ok(url) => self.deliver(url, outcome).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(()) => tracing::info!(
                request_id = %outcome.request_id,
                status = %outcome.status,
                "Webhook delivered"
            ),
            Err(e) => {
                metrics::counter!("webhook_deliveries_failed_total").increment(1);
                tracing::warn!(
                    request_id = %outcome.request_id,
                    error = %e,
                    "Webhook not delivered"
                );
            }
        }
    }
}

/// Accept only absolute http(s) URLs.
pub fn parse_target(raw: &str) -> Result<Url, NotifyError> {
    let url = Url::parse(raw).map_err(|_| NotifyError::InvalidTarget(raw.to_string()))?;
    match url.scheme() {
        "http" | "https" if url.has_host() => Ok(url),
        _ => Err(NotifyError::InvalidTarget(raw.to_string())),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("Webhook URL is not configured")]
    NotConfigured,

    #[error("Webhook URL is not a valid absolute URL: {0}")]
    InvalidTarget(String),

    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Webhook returned HTTP {0}")]
    HttpStatus(u16),
}
