use serde::{Deserialize, Serialize};

use crate::models::job::{JobStatus, ProductJob};

pub const SERIAL_NUMBER_COLUMN: &str = "S. No.";
pub const PRODUCT_NAME_COLUMN: &str = "Product Name";
pub const INPUT_URLS_COLUMN: &str = "Input Image Urls";

/// A CSV record as uploaded, before validation.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawBatchRow {
    #[serde(rename = "S. No.", default)]
    pub serial_number: Option<String>,

    #[serde(rename = "Product Name", default)]
    pub product_name: Option<String>,

    #[serde(rename = "Input Image Urls", default)]
    pub input_image_urls: Option<String>,
}

/// A validated batch row.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchRow {
    pub serial_number: i32,
    pub product_name: String,
    pub input_image_urls: Vec<String>,
}

/// An uploaded batch: raw rows in source order.
#[derive(Debug, Clone, Default)]
pub struct BatchRequest {
    pub rows: Vec<RawBatchRow>,
}

impl BatchRequest {
    /// Parse CSV bytes with a header row. Fields are trimmed.
    ///
    /// Every record must have as many fields as the header, so an unquoted
    /// URL list spilling into extra columns is rejected.
    pub fn from_csv(data: &[u8]) -> Result<Self, ValidationError> {
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(data);

        let rows = reader
            .deserialize::<RawBatchRow>()
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| ValidationError::Malformed(e.to_string()))?;

        Ok(Self { rows })
    }

    /// Validate every row, failing on the first incomplete one.
    pub fn validate(&self) -> Result<Vec<BatchRow>, ValidationError> {
        if self.rows.is_empty() {
            return Err(ValidationError::Empty);
        }
        self.rows
            .iter()
            .enumerate()
            .map(|(idx, raw)| raw.validate(idx + 1))
            .collect()
    }
}

impl RawBatchRow {
    fn validate(&self, row: usize) -> Result<BatchRow, ValidationError> {
        let serial = required(&self.serial_number, row, SERIAL_NUMBER_COLUMN)?;
        let product_name = required(&self.product_name, row, PRODUCT_NAME_COLUMN)?;
        let urls = required(&self.input_image_urls, row, INPUT_URLS_COLUMN)?;

        let serial_number = serial
            .parse::<i32>()
            .map_err(|_| ValidationError::InvalidSerialNumber {
                row,
                value: serial.to_string(),
            })?;

        let input_image_urls = split_urls(urls);
        if input_image_urls.iter().all(String::is_empty) {
            return Err(ValidationError::MissingField {
                row,
                column: INPUT_URLS_COLUMN,
            });
        }

        Ok(BatchRow {
            serial_number,
            product_name: product_name.to_string(),
            input_image_urls,
        })
    }
}

fn required<'a>(
    value: &'a Option<String>,
    row: usize,
    column: &'static str,
) -> Result<&'a str, ValidationError> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or(ValidationError::MissingField { row, column })
}

/// Split a comma-separated URL list, keeping source order.
///
/// Empty fragments stay in place; they fail to fetch and leave an empty
/// output slot at the same position.
pub fn split_urls(list: &str) -> Vec<String> {
    list.split(',').map(|u| u.trim().to_string()).collect()
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("CSV is missing required column '{column}' in row {row}")]
    MissingField { row: usize, column: &'static str },

    #[error("Invalid serial number '{value}' in row {row}")]
    InvalidSerialNumber { row: usize, value: String },

    #[error("CSV could not be parsed: {0}")]
    Malformed(String),

    #[error("CSV contains no product rows")]
    Empty,
}

/// Payload posted to the outbound webhook once per product.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookOutcome {
    pub request_id: String,
    pub status: JobStatus,
    pub failed_urls: Vec<String>,
}

/// Inbound webhook body. Unknown fields are ignored.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InboundWebhook {
    pub request_id: Option<String>,
    pub status: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookAck {
    pub request_id: String,
    pub updated: u64,
}

/// Response after submitting a batch.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub request_id: String,
}

/// Response for the batch status query.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchStatusResponse {
    pub request_id: String,
    pub status: String,
    pub results: Vec<ProductJob>,
}
