//! Layered configuration for zipstream.
//!
//! Values are merged from (lowest to highest precedence):
//!
//! 1. Built-in defaults ([`Config::default`])
//! 2. A configuration file (TOML, YAML or JSON, detected by extension), or
//!    `config.toml` in the platform configuration directory when no file is
//!    given explicitly
//! 3. Environment variables prefixed with `ZIPSTREAM_`; nested keys are
//!    separated with `__` (e.g. `ZIPSTREAM_S3__REGION`)

pub mod error;
mod models;

pub use crate::models::{
    Config, ConflictStrategy, DiskConfig, FtpConfig, HttpConfig, S3Config, S3DiskConfig, S3_DEFAULT_REGION,
};

use crate::error::{ErrorKind, Result};
use directories::ProjectDirs;
use exn::ResultExt;
use figment::Figment;
use figment::providers::{Env, Format, Json, Serialized, Toml, Yaml};
use std::path::{Path, PathBuf};

const ENV_PREFIX: &str = "ZIPSTREAM_";

impl Config {
    /// Location of the implicit configuration file, if the platform has a
    /// configuration directory.
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "zipstream").map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Build the provider stack without extracting it.
    ///
    /// An explicit `path` must exist; the implicit default path is skipped
    /// silently when missing.
    pub fn figment(path: Option<&Path>) -> Result<Figment> {
        let mut figment = Figment::from(Serialized::defaults(Config::default()));
        match path {
            Some(path) => {
                if !path.is_file() {
                    exn::bail!(ErrorKind::NotFound(path.to_path_buf()));
                }
                figment = merge_file(figment, path)?;
            },
            None => {
                if let Some(default) = Self::default_path().filter(|p| p.is_file()) {
                    figment = merge_file(figment, &default)?;
                }
            },
        }
        Ok(figment.merge(Env::prefixed(ENV_PREFIX).split("__")))
    }

    /// Load and validate the configuration.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config: Config = Self::figment(path)?.extract().or_raise(|| ErrorKind::Parse)?;
        config.validate()?;
        tracing::debug!(
            predict_size = config.predict_size,
            compression_method = %config.compression_method,
            conflict_strategy = %config.conflict_strategy,
            disks = config.disks.len(),
            "configuration loaded"
        );
        Ok(config)
    }

    /// Reject values that deserialize fine but cannot work.
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            exn::bail!(ErrorKind::Invalid("chunk_size must be greater than zero".to_string()));
        }
        if self.channel_capacity == 0 {
            exn::bail!(ErrorKind::Invalid("channel_capacity must be greater than zero".to_string()));
        }
        for (name, disk) in &self.disks {
            if let DiskConfig::Local { root } = disk
                && !root.is_absolute()
            {
                exn::bail!(ErrorKind::Invalid(format!("disk `{name}` root must be an absolute path")));
            }
        }
        Ok(())
    }
}

fn merge_file(figment: Figment, path: &Path) -> Result<Figment> {
    let extension = path.extension().and_then(|e| e.to_str()).map(str::to_lowercase);
    Ok(match extension.as_deref() {
        Some("toml") => figment.merge(Toml::file(path)),
        Some("yaml" | "yml") => figment.merge(Yaml::file(path)),
        Some("json") => figment.merge(Json::file(path)),
        _ => exn::bail!(ErrorKind::UnsupportedFormat(path.to_path_buf())),
    })
}
