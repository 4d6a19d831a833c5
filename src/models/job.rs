use std::fmt;

use chrono::{DateTime, Utc};
use garde::Validate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

const PENDING: &str = "Pending";
const COMPLETED: &str = "Completed";
const PARTIAL_PREFIX: &str = "Completed except for ";
const PARTIAL_SUFFIX: &str = " url(s)";

/// Length of a record identifier in hex characters.
pub const RECORD_ID_LEN: usize = 24;

/// Status of a product job.
///
/// The pipeline only ever produces `Pending`, `Completed` and
/// `CompletedExcept`. `Other` carries statuses set through the inbound
/// webhook or an administrative update, verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum JobStatus {
    Pending,
    Completed,
    CompletedExcept(usize),
    Other(String),
}

impl JobStatus {
    /// Terminal status for a product with `failed` unusable images.
    pub fn from_failed_count(failed: usize) -> Self {
        if failed == 0 {
            JobStatus::Completed
        } else {
            JobStatus::CompletedExcept(failed)
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, JobStatus::Pending)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobStatus::Pending => f.write_str(PENDING),
            JobStatus::Completed => f.write_str(COMPLETED),
            JobStatus::CompletedExcept(n) => write!(f, "{PARTIAL_PREFIX}{n}{PARTIAL_SUFFIX}"),
            JobStatus::Other(s) => f.write_str(s),
        }
    }
}

impl From<String> for JobStatus {
    fn from(value: String) -> Self {
        match value.as_str() {
            PENDING => return JobStatus::Pending,
            COMPLETED => return JobStatus::Completed,
            _ => {}
        }
        let count = value
            .strip_prefix(PARTIAL_PREFIX)
            .and_then(|rest| rest.strip_suffix(PARTIAL_SUFFIX))
            .and_then(|n| n.parse::<usize>().ok());
        match count {
            Some(n) if n > 0 => JobStatus::CompletedExcept(n),
            _ => JobStatus::Other(value),
        }
    }
}

impl From<&str> for JobStatus {
    fn from(value: &str) -> Self {
        JobStatus::from(value.to_string())
    }
}

impl From<JobStatus> for String {
    fn from(value: JobStatus) -> Self {
        value.to_string()
    }
}

/// One product row of a batch, persisted in the job store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductJob {
    pub id: String,
    pub serial_number: i32,
    pub product_name: String,
    pub input_image_urls: Vec<String>,
    pub output_image_urls: Vec<String>,
    pub status: JobStatus,
    pub request_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ProductJob {
    /// Number of positions whose source image produced no output.
    pub fn failed_count(&self) -> usize {
        self.output_image_urls.iter().filter(|u| u.is_empty()).count()
    }
}

/// Insert payload for the job store. The store assigns id and timestamps.
#[derive(Debug, Clone)]
pub struct NewProductJob {
    pub serial_number: i32,
    pub product_name: String,
    pub input_image_urls: Vec<String>,
    pub output_image_urls: Vec<String>,
    pub status: JobStatus,
    pub request_id: String,
}

impl NewProductJob {
    /// A freshly ingested row: `Pending` with no outputs.
    pub fn pending(
        serial_number: i32,
        product_name: String,
        input_image_urls: Vec<String>,
        request_id: String,
    ) -> Self {
        Self {
            serial_number,
            product_name,
            input_image_urls,
            output_image_urls: Vec::new(),
            status: JobStatus::Pending,
            request_id,
        }
    }
}

/// Body of the administrative create endpoint.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateProductJob {
    #[garde(skip)]
    pub serial_number: i32,

    #[garde(length(min = 1, max = 500))]
    pub product_name: String,

    #[garde(length(min = 1), inner(length(min = 1)))]
    pub input_image_urls: Vec<String>,

    #[garde(skip)]
    #[serde(default)]
    pub output_image_urls: Vec<String>,

    #[garde(length(min = 1))]
    #[serde(default)]
    pub status: Option<String>,

    #[garde(length(min = 1))]
    #[serde(default)]
    pub request_id: Option<String>,
}

impl From<CreateProductJob> for NewProductJob {
    fn from(dto: CreateProductJob) -> Self {
        Self {
            serial_number: dto.serial_number,
            product_name: dto.product_name,
            input_image_urls: dto.input_image_urls,
            output_image_urls: dto.output_image_urls,
            status: dto.status.map(JobStatus::from).unwrap_or(JobStatus::Pending),
            request_id: dto
                .request_id
                .unwrap_or_else(|| Uuid::new_v4().to_string()),
        }
    }
}

/// Partial update; `None` leaves the column unchanged.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ProductJobPatch {
    #[garde(skip)]
    pub serial_number: Option<i32>,

    #[garde(length(min = 1, max = 500))]
    pub product_name: Option<String>,

    #[garde(skip)]
    pub input_image_urls: Option<Vec<String>>,

    #[garde(skip)]
    pub output_image_urls: Option<Vec<String>>,

    #[garde(skip)]
    pub status: Option<JobStatus>,

    #[garde(length(min = 1))]
    pub request_id: Option<String>,
}

impl ProductJobPatch {
    pub fn apply(self, job: &mut ProductJob) {
        if let Some(v) = self.serial_number {
            job.serial_number = v;
        }
        if let Some(v) = self.product_name {
            job.product_name = v;
        }
        if let Some(v) = self.input_image_urls {
            job.input_image_urls = v;
        }
        if let Some(v) = self.output_image_urls {
            job.output_image_urls = v;
        }
        if let Some(v) = self.status {
            job.status = v;
        }
        if let Some(v) = self.request_id {
            job.request_id = v;
        }
    }
}

/// Generate a 24-hex-character record id: creation seconds then random bits.
pub fn new_record_id() -> String {
    let seconds = Utc::now().timestamp().clamp(0, i64::from(u32::MAX)) as u32;
    let random = Uuid::new_v4().simple().to_string();
    format!("{seconds:08x}{}", &random[..RECORD_ID_LEN - 8])
}

pub fn is_valid_record_id(id: &str) -> bool {
    id.len() == RECORD_ID_LEN && id.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Canonical (lowercase) form of a well-formed record id.
pub fn normalize_record_id(id: &str) -> Option<String> {
    is_valid_record_id(id).then(|| id.to_ascii_lowercase())
}
