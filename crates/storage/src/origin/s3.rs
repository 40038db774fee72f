//! S3-compatible object storage origin.
//!
//! Works against AWS S3 and the usual S3-compatible services (Backblaze B2,
//! MinIO, Tigris). Size comes from `HeadObject`, data from `GetObject`;
//! writes buffer in memory and `PutObject` the whole body on close.
//!
//! # Credentials
//!
//! Credentials are provided explicitly, either from configuration or from
//! the standard `AWS_ACCESS_KEY_ID`/`AWS_SECRET_ACCESS_KEY` variables by the
//! caller. The SDK credential chain is not consulted.

use crate::error::{ErrorKind, Result};
use crate::origin::{BoxRead, Origin, basename};
use crate::sink::{BoxSink, UploadSink};
use crate::{OriginKind, Stat};
use async_trait::async_trait;
use aws_sdk_s3::{
    Client,
    config::{BehaviorVersion, Credentials, Region, retry::RetryConfig},
    error::DisplayErrorContext,
    primitives::{ByteStream, DateTime},
};
use futures::FutureExt;
use time::OffsetDateTime;

/// Bucket and key addressed by an `s3://bucket/key` locator.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct S3Target {
    pub bucket: String,
    pub key: String,
}

impl S3Target {
    pub fn parse(locator: &str) -> Result<Self> {
        let Some(rest) = locator.strip_prefix("s3://") else {
            exn::bail!(ErrorKind::InvalidLocator(locator.to_string()));
        };
        match rest.split_once('/') {
            Some((bucket, key)) if !bucket.is_empty() && !key.trim_matches('/').is_empty() => Ok(Self {
                bucket: bucket.to_string(),
                key: key.trim_start_matches('/').to_string(),
            }),
            _ => exn::bail!(ErrorKind::InvalidLocator(locator.to_string())),
        }
    }

    /// Key under an optional prefix, as used by configured disks.
    pub fn with_prefix(bucket: impl Into<String>, prefix: Option<&str>, path: &str) -> Self {
        let path = path.trim_start_matches('/');
        let key = match prefix.map(|p| p.trim_matches('/')).filter(|p| !p.is_empty()) {
            Some(prefix) => format!("{prefix}/{path}"),
            None => path.to_string(),
        };
        Self { bucket: bucket.into(), key }
    }

    pub fn locator(&self) -> String {
        format!("s3://{}/{}", self.bucket, self.key)
    }
}

#[derive(Clone, Debug)]
pub struct S3Origin {
    client: Client,
    target: S3Target,
    locator: String,
}

impl S3Origin {
    pub fn new(client: Client, target: S3Target) -> Self {
        let locator = target.locator();
        Self { client, target, locator }
    }

    /// Build a client for S3 or an S3-compatible service.
    ///
    /// # Arguments
    /// * `region` - AWS region or provider-specific region (e.g., "us-west-004" for Backblaze)
    /// * `endpoint` - Custom endpoint URL for S3-compatible services
    /// * `key_id` - Access key ID
    /// * `key_secret` - Secret access key
    /// * `path_style` - Use path-style addressing (MinIO and friends need it)
    pub fn client(
        region: impl Into<String>,
        endpoint: Option<impl Into<String>>,
        key_id: impl Into<String>,
        key_secret: impl Into<String>,
        path_style: bool,
    ) -> Client {
        let credentials = Credentials::new(key_id, key_secret, None, None, "zipstream-config");
        let mut config_builder = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .credentials_provider(credentials)
            .region(Region::new(region.into()))
            // 1 initial + 3 retries, exponential backoff
            .retry_config(RetryConfig::standard().with_max_attempts(4))
            .force_path_style(path_style);
        if let Some(endpoint_url) = endpoint {
            config_builder = config_builder.endpoint_url(endpoint_url);
        }
        Client::from_conf(config_builder.build())
    }

    pub fn target(&self) -> &S3Target {
        &self.target
    }

    fn parse_datetime(dt: &DateTime) -> Option<OffsetDateTime> {
        OffsetDateTime::from_unix_timestamp_nanos(dt.as_nanos()).ok()
    }
}

#[async_trait]
impl Origin for S3Origin {
    fn kind(&self) -> OriginKind {
        OriginKind::S3
    }

    fn locator(&self) -> &str {
        &self.locator
    }

    fn default_archive_path(&self) -> Option<String> {
        basename(&self.target.key).map(str::to_string)
    }

    #[tracing::instrument(level = "debug", skip(self), fields(locator = %self.locator))]
    async fn stat(&self) -> Result<Stat> {
        let output = self
            .client
            .head_object()
            .bucket(&self.target.bucket)
            .key(&self.target.key)
            .send()
            .await
            .map_err(|e| {
                let not_found = e.as_service_error().is_some_and(|se| se.is_not_found());
                if not_found {
                    ErrorKind::NotFound(self.locator.clone())
                } else {
                    ErrorKind::Network(format!("{}: {}", self.locator, DisplayErrorContext(&e)))
                }
            })?;
        let size = output.content_length().and_then(|len| u64::try_from(len).ok());
        let modified = output.last_modified().and_then(Self::parse_datetime);
        Ok(Stat { size, modified })
    }

    async fn reader(&self) -> Result<BoxRead> {
        let output = self
            .client
            .get_object()
            .bucket(&self.target.bucket)
            .key(&self.target.key)
            .send()
            .await
            .map_err(|e| {
                let not_found = e.as_service_error().is_some_and(|se| se.is_no_such_key());
                if not_found {
                    ErrorKind::NotFound(self.locator.clone())
                } else {
                    ErrorKind::Network(format!("{}: {}", self.locator, DisplayErrorContext(&e)))
                }
            })?;
        Ok(Box::pin(output.body.into_async_read()))
    }

    async fn writer(&self) -> Result<BoxSink> {
        let client = self.client.clone();
        let target = self.target.clone();
        let locator = self.locator.clone();
        Ok(Box::new(UploadSink::new(self.locator.clone(), move |body: Vec<u8>| {
            async move {
                client
                    .put_object()
                    .bucket(&target.bucket)
                    .key(&target.key)
                    .body(ByteStream::from(body))
                    .send()
                    .await
                    .map_err(|e| ErrorKind::Network(format!("{locator}: {}", DisplayErrorContext(&e))))?;
                Ok(())
            }
            .boxed()
        })))
    }
}
