//! FTP origin.
//!
//! `suppaftp`'s synchronous client runs inside `spawn_blocking`; each
//! operation opens its own control connection and quits afterwards.

use crate::error::{ErrorKind, Result};
use crate::origin::{BoxRead, Origin, basename};
use crate::sink::{BoxSink, UploadSink};
use crate::{OriginKind, Stat};
use async_trait::async_trait;
use exn::ResultExt;
use futures::FutureExt;
use std::io::Cursor;
use suppaftp::FtpStream;
use suppaftp::types::FileType;

pub const DEFAULT_PORT: u16 = 21;

/// Connection details and remote path parsed from
/// `ftp://[user[:password]@]host[:port]/path`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FtpTarget {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub path: String,
}

impl FtpTarget {
    pub fn parse(locator: &str) -> Result<Self> {
        let invalid = || ErrorKind::InvalidLocator(locator.to_string());
        if locator.starts_with("ftps://") {
            exn::bail!(ErrorKind::InvalidLocator(format!("{locator}: FTPS is not supported")));
        }
        let Some(rest) = locator.strip_prefix("ftp://") else {
            exn::bail!(invalid());
        };
        let (authority, path) = rest.split_once('/').ok_or_else(invalid)?;
        let (credentials, address) = match authority.rsplit_once('@') {
            Some((credentials, address)) => (Some(credentials), address),
            None => (None, authority),
        };
        let (username, password) = match credentials.map(|c| c.split_once(':')) {
            Some(Some((user, pass))) => (Some(user.to_string()), Some(pass.to_string())),
            Some(None) => (credentials.map(str::to_string), None),
            None => (None, None),
        };
        let (host, port) = match address.rsplit_once(':') {
            Some((host, port)) => (host, port.parse::<u16>().map_err(|_| invalid())?),
            None => (address, DEFAULT_PORT),
        };
        if host.is_empty() || path.trim_matches('/').is_empty() {
            exn::bail!(invalid());
        }
        Ok(Self {
            host: host.to_string(),
            port,
            username: username.filter(|u| !u.is_empty()),
            password,
            path: format!("/{}", path.trim_start_matches('/')),
        })
    }

    /// Locator without the password, safe for logs and fingerprints.
    pub fn locator(&self) -> String {
        let user = self.username.as_deref().map(|u| format!("{u}@")).unwrap_or_default();
        format!("ftp://{user}{}:{}{}", self.host, self.port, self.path)
    }

    fn connect(&self) -> Result<FtpStream> {
        let mut ftp = FtpStream::connect((self.host.as_str(), self.port))
            .or_raise(|| ErrorKind::Network(format!("could not connect to {}:{}", self.host, self.port)))?;
        let username = self.username.as_deref().unwrap_or("anonymous");
        let password = self.password.as_deref().unwrap_or("");
        ftp.login(username, password)
            .or_raise(|| ErrorKind::PermissionDenied(self.locator()))?;
        ftp.transfer_type(FileType::Binary)
            .or_raise(|| ErrorKind::BackendError("could not switch to binary mode".to_string()))?;
        Ok(ftp)
    }
}

#[derive(Clone, Debug)]
pub struct FtpOrigin {
    target: FtpTarget,
    locator: String,
}

impl FtpOrigin {
    pub fn new(target: FtpTarget) -> Self {
        let locator = target.locator();
        Self { target, locator }
    }

    pub fn target(&self) -> &FtpTarget {
        &self.target
    }

    /// Run a blocking FTP session off the async runtime.
    async fn session<T, F>(&self, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut FtpStream, &str) -> Result<T> + Send + 'static,
    {
        let target = self.target.clone();
        tokio::task::spawn_blocking(move || {
            let mut ftp = target.connect()?;
            let result = op(&mut ftp, &target.path);
            if let Err(e) = ftp.quit() {
                tracing::debug!(host = %target.host, error = %e, "FTP quit failed");
            }
            result
        })
        .await
        .or_raise(|| ErrorKind::BackendError("FTP worker panicked".to_string()))?
    }
}

#[async_trait]
impl Origin for FtpOrigin {
    fn kind(&self) -> OriginKind {
        OriginKind::Ftp
    }

    fn locator(&self) -> &str {
        &self.locator
    }

    fn default_archive_path(&self) -> Option<String> {
        basename(&self.target.path).map(str::to_string)
    }

    #[tracing::instrument(level = "debug", skip(self), fields(locator = %self.locator))]
    async fn stat(&self) -> Result<Stat> {
        let locator = self.locator.clone();
        let size = self
            .session(move |ftp, path| {
                let size = ftp.size(path).or_raise(|| ErrorKind::NotFound(locator.clone()))?;
                Ok(size as u64)
            })
            .await?;
        Ok(Stat::sized(size))
    }

    async fn reader(&self) -> Result<BoxRead> {
        let locator = self.locator.clone();
        let buffer = self
            .session(move |ftp, path| {
                let cursor = ftp.retr_as_buffer(path).or_raise(|| ErrorKind::NotFound(locator.clone()))?;
                Ok(cursor.into_inner())
            })
            .await?;
        Ok(Box::pin(Cursor::new(buffer)))
    }

    async fn writer(&self) -> Result<BoxSink> {
        let origin = self.clone();
        Ok(Box::new(UploadSink::new(self.locator.clone(), move |body: Vec<u8>| {
            async move {
                let locator = origin.locator.clone();
                origin
                    .session(move |ftp, path| {
                        ftp.put_file(path, &mut Cursor::new(body))
                            .or_raise(|| ErrorKind::Network(format!("upload failed: {locator}")))?;
                        Ok(())
                    })
                    .await
            }
            .boxed()
        })))
    }
}
