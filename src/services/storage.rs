use async_trait::async_trait;
use s3::creds::Credentials;
use s3::{Bucket, Region};
use uuid::Uuid;

pub const JPEG_CONTENT_TYPE: &str = "image/jpeg";

/// Durable storage for compressed artifacts.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Store `data` under a fresh key and return its public URL.
    async fn put(&self, data: Vec<u8>, content_type: &str) -> Result<String, StoreError>;
}

/// Client for S3-compatible object storage.
pub struct S3ArtifactStore {
    bucket: Box<Bucket>,
    public_base_url: String,
}

impl S3ArtifactStore {
    pub fn new(
        bucket_name: &str,
        region_name: &str,
        endpoint: Option<&str>,
        access_key: &str,
        secret_key: &str,
    ) -> Result<Self, StoreError> {
        let region = match endpoint {
            Some(endpoint) => Region::Custom {
                region: region_name.to_string(),
                endpoint: endpoint.to_string(),
            },
            None => region_name
                .parse::<Region>()
                .map_err(|e| StoreError::Config(e.to_string()))?,
        };

        let credentials =
            Credentials::new(Some(access_key), Some(secret_key), None, None, None)
                .map_err(|e| StoreError::Config(e.to_string()))?;

        let mut bucket = Bucket::new(bucket_name, region, credentials)
            .map_err(|e| StoreError::Config(e.to_string()))?;
        if endpoint.is_some() {
            bucket = bucket.with_path_style();
        }

        let public_base_url = match endpoint {
            Some(endpoint) => endpoint_public_base_url(endpoint, bucket_name),
            None => default_public_base_url(bucket_name, region_name),
        };

        Ok(Self {
            bucket,
            public_base_url,
        })
    }

    /// Serve artifacts from a CDN or custom domain instead of the bucket host.
    pub fn with_public_base_url(mut self, base: Option<&str>) -> Self {
        if let Some(base) = base {
            self.public_base_url = base.trim_end_matches('/').to_string();
        }
        self
    }
}

#[async_trait]
impl ArtifactStore for S3ArtifactStore {
    async fn put(&self, data: Vec<u8>, content_type: &str) -> Result<String, StoreError> {
        let key = artifact_key();
        let response = self
            .bucket
            .put_object_with_content_type(&key, &data, content_type)
            .await
            .map_err(StoreError::S3)?;

        let status = response.status_code();
        if !(200..300).contains(&status) {
            return Err(StoreError::Status { key, status });
        }

        Ok(public_url(&self.public_base_url, &key))
    }
}

/// Object key for a new compressed artifact.
pub fn artifact_key() -> String {
    format!("compressed-image-{}.jpg", Uuid::new_v4())
}

pub fn default_public_base_url(bucket: &str, region: &str) -> String {
    format!("https://{bucket}.s3.{region}.amazonaws.com")
}

/// Path-style base for custom endpoints (MinIO, R2).
pub fn endpoint_public_base_url(endpoint: &str, bucket: &str) -> String {
    format!("{}/{bucket}", endpoint.trim_end_matches('/'))
}

pub fn public_url(base: &str, key: &str) -> String {
    format!("{base}/{key}")
}

/// Failure to persist a compressed artifact. Fatal to a product's run.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("S3 operation failed: {0}")]
    S3(#[from] s3::error::S3Error),

    #[error("S3 rejected upload of {key} with HTTP {status}")]
    Status { key: String, status: u16 },

    #[error("Storage configuration error: {0}")]
    Config(String),
}
