//! Object storage source (S3 API; works against GCS interoperability too)

use anyhow::{Context, Result};
use async_trait::async_trait;
use aws_sdk_s3::{
    config::{Credentials, Region},
    Client,
};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info, instrument};

use super::config::StorageConfig;
use super::FileSource;

#[derive(Clone)]
pub struct BucketSource {
    client: Client,
    config: StorageConfig,
}

impl BucketSource {
    pub async fn new(config: StorageConfig) -> Result<Self> {
        config.validate()?;
        debug!("Initializing bucket source with config: {:?}", config);

        let region = Region::new(config.region.clone());

        let mut builder = match (&config.access_key, &config.secret_key) {
            (Some(access_key), Some(secret_key)) => {
                let credentials =
                    Credentials::new(access_key, secret_key, None, None, "feedload-storage");
                aws_sdk_s3::Config::builder()
                    .credentials_provider(credentials)
                    .region(region)
            },
            _ => {
                let shared = aws_config::defaults(aws_config::BehaviorVersion::latest())
                    .region(region)
                    .load()
                    .await;
                aws_sdk_s3::config::Builder::from(&shared)
            },
        };

        builder = builder.force_path_style(config.path_style);

        if let Some(endpoint) = &config.endpoint {
            builder = builder.endpoint_url(endpoint);
        }

        let client = Client::from_conf(builder.build());

        info!("Bucket source initialized for bucket: {}", config.bucket);

        Ok(Self { client, config })
    }
}

#[async_trait]
impl FileSource for BucketSource {
    #[instrument(skip(self))]
    async fn fetch(&self, name: &str) -> Result<Vec<u8>> {
        let key = self.config.object_key(name);
        debug!("Downloading s3://{}/{}", self.config.bucket, key);

        let response = self
            .client
            .get_object()
            .bucket(&self.config.bucket)
            .key(&key)
            .send()
            .await
            .with_context(|| format!("Failed to fetch s3://{}/{}", self.config.bucket, key))?;

        let total_size = response
            .content_length()
            .and_then(|len| u64::try_from(len).ok())
            .unwrap_or(0);

        let pb = ProgressBar::new(total_size);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{msg}\n{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {bytes}/{total_bytes} ({eta})")?
                .progress_chars("#>-"),
        );
        pb.set_message(format!("Downloading {}", name));

        let mut body = response.body;
        let mut data = Vec::with_capacity(total_size as usize);
        while let Some(chunk) = body
            .try_next()
            .await
            .with_context(|| format!("Failed to read body of s3://{}/{}", self.config.bucket, key))?
        {
            data.extend_from_slice(&chunk);
            pb.set_position(data.len() as u64);
        }

        pb.finish_and_clear();
        info!(
            bytes = data.len(),
            "Downloaded s3://{}/{}", self.config.bucket, key
        );

        Ok(data)
    }

    fn describe(&self, name: &str) -> String {
        format!("s3://{}/{}", self.config.bucket, self.config.object_key(name))
    }
}
