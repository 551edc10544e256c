use feedload_common::env;
use serde::{Deserialize, Serialize};

/// Google Cloud Storage S3-interoperability endpoint.
pub const DEFAULT_STORAGE_ENDPOINT: &str = "https://storage.googleapis.com";

/// Region sent with requests; GCS ignores it, AWS needs a real one.
pub const DEFAULT_STORAGE_REGION: &str = "auto";

/// Bucket holding the reference feed files.
pub const DEFAULT_BUCKET: &str = "reference-feeds";

#[derive(Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Custom endpoint; `None` means AWS S3
    pub endpoint: Option<String>,
    pub region: String,
    pub bucket: String,
    /// Prefix prepended to every object name (`daily/` + `routes.gz`)
    pub key_prefix: Option<String>,
    /// HMAC key pair; when absent the default AWS credential chain is used
    pub access_key: Option<String>,
    #[serde(skip_serializing)]
    pub secret_key: Option<String>,
    pub path_style: bool,
}

impl std::fmt::Debug for StorageConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageConfig")
            .field("endpoint", &self.endpoint)
            .field("region", &self.region)
            .field("bucket", &self.bucket)
            .field("key_prefix", &self.key_prefix)
            .field("access_key", &self.access_key)
            .field("secret_key", &self.secret_key.as_ref().map(|_| "<redacted>"))
            .field("path_style", &self.path_style)
            .finish()
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self::for_gcs(DEFAULT_BUCKET)
    }
}

impl StorageConfig {
    /// Load from `FEEDLOAD_STORAGE_*` / `FEEDLOAD_BUCKET` environment variables
    ///
    /// Setting `FEEDLOAD_STORAGE_ENDPOINT` to an empty string selects AWS S3.
    pub fn from_env() -> feedload_common::Result<Self> {
        let endpoint = match std::env::var("FEEDLOAD_STORAGE_ENDPOINT") {
            Ok(value) if value.trim().is_empty() => None,
            Ok(value) => Some(value),
            Err(_) => Some(DEFAULT_STORAGE_ENDPOINT.to_string()),
        };

        Ok(Self {
            endpoint,
            region: env::var_or("FEEDLOAD_STORAGE_REGION", DEFAULT_STORAGE_REGION),
            bucket: env::var_or("FEEDLOAD_BUCKET", DEFAULT_BUCKET),
            key_prefix: env::var_opt("FEEDLOAD_KEY_PREFIX"),
            access_key: env::var_opt("FEEDLOAD_STORAGE_ACCESS_KEY"),
            secret_key: env::var_opt("FEEDLOAD_STORAGE_SECRET_KEY"),
            path_style: env::parse_or("FEEDLOAD_STORAGE_PATH_STYLE", true)?,
        })
    }

    pub fn for_gcs(bucket: impl Into<String>) -> Self {
        Self {
            endpoint: Some(DEFAULT_STORAGE_ENDPOINT.to_string()),
            region: DEFAULT_STORAGE_REGION.to_string(),
            bucket: bucket.into(),
            key_prefix: None,
            access_key: None,
            secret_key: None,
            path_style: true,
        }
    }

    /// Full object key for a feed file
    pub fn object_key(&self, name: &str) -> String {
        match self.key_prefix.as_deref() {
            Some(prefix) if !prefix.is_empty() => {
                format!("{}/{}", prefix.trim_end_matches('/'), name)
            },
            _ => name.to_string(),
        }
    }

    pub fn validate(&self) -> feedload_common::Result<()> {
        if self.bucket.trim().is_empty() {
            return Err(feedload_common::FeedloadError::config("bucket cannot be empty"));
        }

        if self.access_key.is_some() != self.secret_key.is_some() {
            return Err(feedload_common::FeedloadError::config(
                "storage access key and secret key must be set together",
            ));
        }

        Ok(())
    }
}
