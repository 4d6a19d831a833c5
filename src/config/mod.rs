use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct AppConfig {
    /// Server bind address (e.g., "0.0.0.0:3000").
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// PostgreSQL connection string. Falls back to the in-memory store when unset.
    #[serde(default)]
    pub database_url: Option<String>,

    /// S3 access key ID
    pub aws_access_key_id: String,

    /// S3 secret access key
    pub aws_secret_access_key: String,

    /// S3 region, also used to build public artifact URLs
    pub aws_region: String,

    /// Bucket receiving compressed images
    pub aws_bucket_name: String,

    /// Custom S3-compatible endpoint (R2, MinIO)
    #[serde(default)]
    pub s3_endpoint: Option<String>,

    /// Public URL base for artifacts. Defaults to `<endpoint>/<bucket>` with a
    /// custom endpoint, else `https://<bucket>.s3.<region>.amazonaws.com`
    #[serde(default)]
    pub s3_public_base_url: Option<String>,

    /// Outbound notification target for per-product outcomes
    #[serde(default)]
    pub webhook_url: Option<String>,

    /// Upper bound on image fetch/compress/store operations in flight
    #[serde(default = "default_max_concurrent_images")]
    pub max_concurrent_images: usize,

    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,

    #[serde(default = "default_webhook_timeout_secs")]
    pub webhook_timeout_secs: u64,
}

fn default_bind_addr() -> String {
    "0.0.0.0:3000".to_string()
}

fn default_max_concurrent_images() -> usize {
    8
}

fn default_fetch_timeout_secs() -> u64 {
    30
}

fn default_webhook_timeout_secs() -> u64 {
    10
}

impl AppConfig {
    pub fn from_env() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();
        envy::from_env()
    }

    /// Semaphore size; a zero value would stall every pipeline.
    pub fn image_permits(&self) -> usize {
        self.max_concurrent_images.max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(extra: &[(&str, &str)]) -> Vec<(String, String)> {
        let mut v: Vec<(String, String)> = [
            ("AWS_ACCESS_KEY_ID", "key"),
            ("AWS_SECRET_ACCESS_KEY", "secret"),
            ("AWS_REGION", "us-east-1"),
            ("AWS_BUCKET_NAME", "images"),
        ]
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        v.extend(extra.iter().map(|(k, v)| (k.to_string(), v.to_string())));
        v
    }

    #[test]
    fn test_defaults_applied() {
        let config: AppConfig = envy::from_iter(vars(&[])).unwrap();
        assert_eq!(config.bind_addr, "0.0.0.0:3000");
        assert!(config.database_url.is_none());
        assert!(config.webhook_url.is_none());
        assert_eq!(config.max_concurrent_images, 8);
        assert_eq!(config.fetch_timeout_secs, 30);
        assert_eq!(config.webhook_timeout_secs, 10);
    }

    #[test]
    fn test_zero_permits_clamped() {
        let config: AppConfig =
            envy::from_iter(vars(&[("MAX_CONCURRENT_IMAGES", "0")])).unwrap();
        assert_eq!(config.image_permits(), 1);
    }

    #[test]
    fn test_missing_bucket_rejected() {
        let mut v = vars(&[]);
        v.retain(|(k, _)| k != "AWS_BUCKET_NAME");
        assert!(envy::from_iter::<_, AppConfig>(v).is_err());
    }
}
