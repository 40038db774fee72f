//! Locator dispatch.
//!
//! Turns a locator string (or a configured disk plus a path) into the
//! matching [`Origin`](zipstream_storage::Origin). Remote kinds are compiled
//! in by the `s3`, `http` and `ftp` features; without them their locators
//! are rejected with [`ErrorKind::UnsupportedOrigin`].

use crate::error::{ErrorKind, Result};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use zipstream_config::{Config, DiskConfig};
use zipstream_storage::OriginHandle;
use zipstream_storage::origin::{LocalOrigin, MemoryOrigin};

/// Shape of a locator, decided without touching the network.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LocatorKind {
    S3,
    Http,
    Ftp,
    Local,
    /// Not a locator at all: the string is the content.
    Raw,
}

impl LocatorKind {
    pub fn of(locator: &str) -> Self {
        if locator.starts_with("s3://") {
            return Self::S3;
        }
        if let Some(rest) = locator.strip_prefix("http://").or_else(|| locator.strip_prefix("https://"))
            && !rest.is_empty()
            && !rest.starts_with('/')
            && !rest.contains(char::is_whitespace)
        {
            return Self::Http;
        }
        if locator.starts_with("ftp://") || locator.starts_with("ftps://") {
            return Self::Ftp;
        }
        if locator.starts_with('/') || is_windows_path(locator) || Path::new(locator).is_file() {
            return Self::Local;
        }
        Self::Raw
    }
}

fn is_windows_path(locator: &str) -> bool {
    let bytes = locator.as_bytes();
    bytes.len() >= 3 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':' && matches!(bytes[2], b'\\' | b'/')
}

#[cfg_attr(all(feature = "s3", feature = "http", feature = "ftp"), allow(dead_code))]
fn unsupported(what: &str) -> ErrorKind {
    ErrorKind::UnsupportedOrigin(format!("{what} support is not compiled in"))
}

/// Builds origins for locators and configured disks.
pub struct Origins {
    #[cfg(feature = "http")]
    http: zipstream_storage::origin::HttpClient,
    #[cfg(feature = "s3")]
    s3: Option<zipstream_storage::origin::S3Client>,
    disks: BTreeMap<String, DiskConfig>,
}

impl Origins {
    pub fn new(config: &Config) -> Result<Self> {
        Ok(Self {
            #[cfg(feature = "http")]
            http: {
                use exn::ResultExt;
                let timeout = config.http.timeout_secs.map(std::time::Duration::from_secs);
                zipstream_storage::origin::HttpOrigin::client(timeout, config.http.user_agent.as_deref())
                    .or_raise(|| ErrorKind::Storage)?
            },
            #[cfg(feature = "s3")]
            s3: s3::client(&config.s3.clone().unwrap_or_default()),
            disks: config.disks.clone(),
        })
    }

    /// Origin for a readable locator. Anything that doesn't look like a
    /// locator becomes in-memory content.
    pub fn make(&self, locator: &str) -> Result<OriginHandle> {
        let origin: OriginHandle = match LocatorKind::of(locator) {
            LocatorKind::S3 => self.s3(locator)?,
            LocatorKind::Http => self.http(locator)?,
            LocatorKind::Ftp => make_ftp(locator)?,
            LocatorKind::Local => Arc::new(LocalOrigin::new(locator)),
            LocatorKind::Raw => Arc::new(MemoryOrigin::new(locator)),
        };
        tracing::trace!(kind = %origin.kind(), locator = %origin.locator(), "made origin");
        Ok(origin)
    }

    /// Origin for an output location: `s3://` or `ftp://`, otherwise a local
    /// path (which need not exist yet).
    pub fn make_writable(&self, locator: &str) -> Result<OriginHandle> {
        match LocatorKind::of(locator) {
            LocatorKind::S3 => self.s3(locator),
            LocatorKind::Ftp => make_ftp(locator),
            LocatorKind::Http => exn::bail!(ErrorKind::NotWritable(locator.to_string())),
            LocatorKind::Local | LocatorKind::Raw => Ok(Arc::new(LocalOrigin::new(locator))),
        }
    }

    /// Origin for `path` on the named disk.
    pub fn from_disk(&self, disk: &str, path: &str) -> Result<OriginHandle> {
        let Some(config) = self.disks.get(disk) else {
            exn::bail!(ErrorKind::UnsupportedOrigin(format!("unknown disk `{disk}`")));
        };
        let path = path.trim_start_matches('/');
        match config {
            DiskConfig::Local { root } => Ok(Arc::new(LocalOrigin::new(root.join(path)))),
            #[cfg(feature = "s3")]
            DiskConfig::S3(disk) => s3::from_disk(self.s3.as_ref(), disk, path),
            #[cfg(not(feature = "s3"))]
            DiskConfig::S3(_) => exn::bail!(unsupported("S3")),
            #[cfg(feature = "ftp")]
            DiskConfig::Ftp(disk) => ftp::from_disk(disk, path),
            #[cfg(not(feature = "ftp"))]
            DiskConfig::Ftp(_) => exn::bail!(unsupported("FTP")),
        }
    }

    /// Writable origin for `path` on the named disk.
    pub fn writable_from_disk(&self, disk: &str, path: &str) -> Result<OriginHandle> {
        let path = path.trim_start_matches('/');
        if path.is_empty() || path.ends_with('/') {
            exn::bail!(ErrorKind::NotWritable(format!("{disk}:{path} is not a file path")));
        }
        // Every disk driver accepts writes.
        self.from_disk(disk, path)
    }

    #[cfg(feature = "s3")]
    fn s3(&self, locator: &str) -> Result<OriginHandle> {
        s3::make(self.s3.as_ref(), locator)
    }

    #[cfg(not(feature = "s3"))]
    fn s3(&self, _locator: &str) -> Result<OriginHandle> {
        exn::bail!(unsupported("S3"))
    }

    #[cfg(feature = "http")]
    fn http(&self, locator: &str) -> Result<OriginHandle> {
        use exn::ResultExt;
        let origin = zipstream_storage::origin::HttpOrigin::new(self.http.clone(), locator)
            .or_raise(|| ErrorKind::UnsupportedOrigin(locator.to_string()))?;
        Ok(Arc::new(origin))
    }

    #[cfg(not(feature = "http"))]
    fn http(&self, _locator: &str) -> Result<OriginHandle> {
        exn::bail!(unsupported("HTTP"))
    }
}

#[cfg(feature = "ftp")]
fn make_ftp(locator: &str) -> Result<OriginHandle> {
    ftp::make(locator)
}

#[cfg(not(feature = "ftp"))]
fn make_ftp(_locator: &str) -> Result<OriginHandle> {
    exn::bail!(unsupported("FTP"))
}

#[cfg(feature = "s3")]
mod s3 {
    use super::*;
    use exn::ResultExt;
    use zipstream_config::{S3Config, S3DiskConfig};
    use zipstream_storage::origin::{S3Client, S3Origin, S3Target};

    /// Explicit keys win over the standard AWS environment variables.
    pub(super) fn client(config: &S3Config) -> Option<S3Client> {
        let key_id = config.key_id.clone().or_else(|| std::env::var("AWS_ACCESS_KEY_ID").ok())?;
        let key_secret = config
            .key_secret
            .clone()
            .or_else(|| std::env::var("AWS_SECRET_ACCESS_KEY").ok())?;
        Some(S3Origin::client(
            config.region.clone(),
            config.endpoint.clone(),
            key_id,
            key_secret,
            config.path_style,
        ))
    }

    fn no_credentials() -> ErrorKind {
        ErrorKind::UnsupportedOrigin("no S3 credentials configured".to_string())
    }

    pub(super) fn make(client: Option<&S3Client>, locator: &str) -> Result<OriginHandle> {
        let client = client.cloned().ok_or_else(no_credentials)?;
        let target = S3Target::parse(locator).or_raise(|| ErrorKind::UnsupportedOrigin(locator.to_string()))?;
        Ok(Arc::new(S3Origin::new(client, target)))
    }

    pub(super) fn from_disk(default: Option<&S3Client>, disk: &S3DiskConfig, path: &str) -> Result<OriginHandle> {
        let client = match &disk.client {
            Some(config) => client(config),
            None => default.cloned(),
        }
        .ok_or_else(no_credentials)?;
        let target = S3Target::with_prefix(disk.bucket.clone(), disk.prefix.as_deref(), path);
        Ok(Arc::new(S3Origin::new(client, target)))
    }
}

#[cfg(feature = "ftp")]
mod ftp {
    use super::*;
    use exn::ResultExt;
    use zipstream_config::FtpConfig;
    use zipstream_storage::origin::{FtpOrigin, FtpTarget};

    pub(super) fn make(locator: &str) -> Result<OriginHandle> {
        let target = FtpTarget::parse(locator).or_raise(|| ErrorKind::UnsupportedOrigin(locator.to_string()))?;
        Ok(Arc::new(FtpOrigin::new(target)))
    }

    pub(super) fn from_disk(disk: &FtpConfig, path: &str) -> Result<OriginHandle> {
        if disk.ssl {
            exn::bail!(ErrorKind::UnsupportedOrigin(format!("FTPS disk on {}", disk.host)));
        }
        let root = disk.root.as_deref().unwrap_or("").trim_matches('/');
        let path = match root.is_empty() {
            true => format!("/{path}"),
            false => format!("/{root}/{path}"),
        };
        let target = FtpTarget {
            host: disk.host.clone(),
            port: disk.port.unwrap_or(zipstream_storage::origin::FTP_DEFAULT_PORT),
            username: disk.username.clone(),
            password: disk.password.clone(),
            path,
        };
        Ok(Arc::new(FtpOrigin::new(target)))
    }
}
