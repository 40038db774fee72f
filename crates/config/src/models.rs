use crate::error::{Error, ErrorKind};
use derive_more::Display;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::str::FromStr;
use zipstream_codec::Method;

pub const S3_DEFAULT_REGION: &str = "us-east-1";
const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;
const DEFAULT_CHANNEL_CAPACITY: usize = 16;

/// What happens when an entry is added at a path that is already taken.
#[derive(Clone, Copy, Debug, Default, Display, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConflictStrategy {
    /// Keep the first entry, silently drop later ones.
    #[default]
    #[display("skip")]
    Skip,
    /// Last write wins (the entry keeps its original position).
    #[display("replace")]
    Replace,
    /// Insert a numeric suffix before the extension until the path is free.
    #[display("rename")]
    Rename,
}

impl FromStr for ConflictStrategy {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "skip" => Ok(Self::Skip),
            "replace" => Ok(Self::Replace),
            "rename" => Ok(Self::Rename),
            _ => exn::bail!(ErrorKind::Invalid(format!("unknown conflict strategy `{s}`"))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Try to predict the archive size up front (only possible with `store`).
    pub predict_size: bool,
    #[serde(with = "method")]
    pub compression_method: Method,
    /// Strip non-ASCII characters from archive paths.
    pub ascii_filenames: bool,
    pub conflict_strategy: ConflictStrategy,
    /// Treat `Text.txt` and `text.TXT` as the same path.
    pub case_insensitive_conflicts: bool,
    /// Always write Zip64 records, even for small archives. Needed when
    /// streaming sources of unknown size that may exceed 4 GiB.
    pub zip64: bool,
    /// Read buffer size per source, in bytes.
    pub chunk_size: usize,
    /// Chunks buffered between the archive writer and a streaming consumer.
    pub channel_capacity: usize,
    pub http: HttpConfig,
    /// Client settings for `s3://` locators.
    pub s3: Option<S3Config>,
    /// Named storage locations for `add_from_disk`.
    pub disks: BTreeMap<String, DiskConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            predict_size: true,
            compression_method: Method::Store,
            ascii_filenames: true,
            conflict_strategy: ConflictStrategy::Skip,
            case_insensitive_conflicts: true,
            zip64: false,
            chunk_size: DEFAULT_CHUNK_SIZE,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            http: HttpConfig::default(),
            s3: None,
            disks: BTreeMap::new(),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Whole-request timeout for HTTP sources.
    pub timeout_secs: Option<u64>,
    pub user_agent: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct S3Config {
    pub region: String,
    /// Custom endpoint URL for S3-compatible services.
    pub endpoint: Option<String>,
    pub key_id: Option<String>,
    pub key_secret: Option<String>,
    /// Path-style addressing, required by most S3-compatible services.
    pub path_style: bool,
}

impl Default for S3Config {
    fn default() -> Self {
        Self {
            region: S3_DEFAULT_REGION.to_string(),
            endpoint: None,
            key_id: None,
            key_secret: None,
            path_style: false,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "driver", rename_all = "lowercase")]
pub enum DiskConfig {
    Local { root: PathBuf },
    S3(S3DiskConfig),
    Ftp(FtpConfig),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct S3DiskConfig {
    pub bucket: String,
    #[serde(default)]
    pub prefix: Option<String>,
    /// Falls back to the top-level `s3` client settings when omitted.
    #[serde(default)]
    pub client: Option<S3Config>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FtpConfig {
    pub host: String,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub root: Option<String>,
    #[serde(default)]
    pub ssl: bool,
}

mod method {
    use serde::{Deserialize, Deserializer, Serializer, de};
    use zipstream_codec::Method;

    pub fn serialize<S: Serializer>(method: &Method, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(method.as_str())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Method, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(|_| de::Error::custom(format!("unsupported compression method `{raw}`")))
    }
}
