//! HTTP(S) origin.
//!
//! Size comes from the `Content-Length` of a `HEAD` request. Servers that
//! omit it (chunked responses, dynamic downloads) make the origin
//! unpredictable, which only disables size prediction for the archive.

use crate::error::{ErrorKind, Result};
use crate::origin::{BoxRead, Origin, basename};
use crate::{OriginKind, Stat};
use async_trait::async_trait;
use futures::TryStreamExt;
use reqwest::header::{CONTENT_LENGTH, HeaderMap, LAST_MODIFIED};
use reqwest::{Client, StatusCode, Url};
use std::time::Duration;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc2822;
use tokio_util::io::StreamReader;

#[derive(Clone, Debug)]
pub struct HttpOrigin {
    client: Client,
    url: Url,
    locator: String,
}

impl HttpOrigin {
    pub fn new(client: Client, locator: impl Into<String>) -> Result<Self> {
        let locator = locator.into();
        let url = Url::parse(&locator).map_err(|e| ErrorKind::InvalidLocator(format!("{locator}: {e}")))?;
        if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
            exn::bail!(ErrorKind::InvalidLocator(locator));
        }
        Ok(Self { client, url, locator })
    }

    /// Build the shared client used by every HTTP origin.
    pub fn client(timeout: Option<Duration>, user_agent: Option<&str>) -> Result<Client> {
        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        if let Some(user_agent) = user_agent {
            builder = builder.user_agent(user_agent.to_string());
        }
        let client = builder.build().map_err(|e| ErrorKind::BackendError(e.to_string()))?;
        Ok(client)
    }

    fn network_error(&self, e: reqwest::Error) -> ErrorKind {
        match e.status() {
            Some(status) => self.status_error(status),
            None => ErrorKind::Network(format!("{}: {e}", self.locator)),
        }
    }

    fn status_error(&self, status: StatusCode) -> ErrorKind {
        match status {
            StatusCode::NOT_FOUND | StatusCode::GONE => ErrorKind::NotFound(self.locator.clone()),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ErrorKind::PermissionDenied(self.locator.clone()),
            status => ErrorKind::Network(format!("{}: HTTP {status}", self.locator)),
        }
    }
}

/// Last `Content-Length` value, when it parses.
///
/// Redirect chains can leave more than one header behind; the final
/// response's value is the one that describes the payload.
pub(crate) fn content_length(headers: &HeaderMap) -> Option<u64> {
    headers
        .get_all(CONTENT_LENGTH)
        .iter()
        .last()
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse().ok())
}

pub(crate) fn last_modified(headers: &HeaderMap) -> Option<OffsetDateTime> {
    let value = headers.get(LAST_MODIFIED)?.to_str().ok()?;
    OffsetDateTime::parse(value.trim(), &Rfc2822).ok()
}

#[async_trait]
impl Origin for HttpOrigin {
    fn kind(&self) -> OriginKind {
        OriginKind::Http
    }

    fn locator(&self) -> &str {
        &self.locator
    }

    fn default_archive_path(&self) -> Option<String> {
        basename(self.url.path()).map(str::to_string)
    }

    #[tracing::instrument(level = "debug", skip(self), fields(locator = %self.locator))]
    async fn stat(&self) -> Result<Stat> {
        let response = self
            .client
            .head(self.url.clone())
            .send()
            .await
            .map_err(|e| self.network_error(e))?;
        if !response.status().is_success() {
            exn::bail!(self.status_error(response.status()));
        }
        let headers = response.headers();
        let stat = Stat {
            size: content_length(headers),
            modified: last_modified(headers),
        };
        tracing::debug!(size = ?stat.size, "probed HTTP origin");
        Ok(stat)
    }

    async fn reader(&self) -> Result<BoxRead> {
        let response = self
            .client
            .get(self.url.clone())
            .send()
            .await
            .map_err(|e| self.network_error(e))?;
        if !response.status().is_success() {
            exn::bail!(self.status_error(response.status()));
        }
        let body = response.bytes_stream().map_err(std::io::Error::other);
        Ok(Box::pin(StreamReader::new(body)))
    }
}
