//! Local filesystem origin.

use crate::error::{ErrorKind, Result};
use crate::origin::{BoxRead, Origin, basename};
use crate::sink::{BoxSink, WriterSink};
use crate::{OriginKind, Stat};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use time::OffsetDateTime;
use tokio::fs;

/// A file on the local filesystem.
///
/// Reading and probing go through `tokio::fs`; the writer creates missing
/// parent directories before truncating the target.
#[derive(Clone, Debug)]
pub struct LocalOrigin {
    path: PathBuf,
    locator: String,
}

impl LocalOrigin {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let locator = path.to_string_lossy().into_owned();
        Self { path, locator }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn map_io_error(&self, e: std::io::Error) -> ErrorKind {
        ErrorKind::from_io(e, &self.locator)
    }
}

#[async_trait]
impl Origin for LocalOrigin {
    fn kind(&self) -> OriginKind {
        OriginKind::Local
    }

    fn locator(&self) -> &str {
        &self.locator
    }

    fn default_archive_path(&self) -> Option<String> {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .or_else(|| basename(&self.locator).map(str::to_string))
    }

    async fn stat(&self) -> Result<Stat> {
        let metadata = fs::metadata(&self.path).await.map_err(|e| self.map_io_error(e))?;
        if !metadata.is_file() {
            exn::bail!(ErrorKind::NotFound(self.locator.clone()));
        }
        // Some platforms (and some filesystems) refuse to report mtime.
        let modified = metadata.modified().ok().map(OffsetDateTime::from);
        Ok(Stat::sized(metadata.len()).with_modified(modified))
    }

    async fn reader(&self) -> Result<BoxRead> {
        let file = fs::File::open(&self.path).await.map_err(|e| self.map_io_error(e))?;
        tracing::trace!(locator = %self.locator, "opened local reader");
        Ok(Box::pin(file))
    }

    async fn writer(&self) -> Result<BoxSink> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).await.map_err(|e| self.map_io_error(e))?;
        }
        let file = fs::File::create(&self.path).await.map_err(|e| self.map_io_error(e))?;
        Ok(Box::new(WriterSink::new(self.locator.clone(), file)))
    }
}
