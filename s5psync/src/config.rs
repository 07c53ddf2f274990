//! Configuration for the ingestion pipeline.
//!
//! `IngestConfig` collects everything a run needs: the three collaborator
//! directories (manifest, incoming, processed), the partition to process,
//! download tuning, and the integrity policy. It can be built programmatically
//! with the `with_*` methods or loaded from an INI file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use ini::Ini;

use crate::download::RetryPolicy;
use crate::error::{IngestError, IngestResult};
use crate::manifest::Partition;

/// Default number of simultaneously in-flight downloads.
pub const DEFAULT_CONCURRENT_DOWNLOADS: usize = 5;

/// Default maximum download attempts per candidate.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 15;

/// Default delay between download attempts (seconds).
pub const DEFAULT_RETRY_DELAY_SECS: u64 = 10;

/// Filename prefix identifying Sentinel-5P products on disk.
pub const DEFAULT_FILE_PREFIX: &str = "S5P_";

/// Data-type code preferred when two product variants exist for a day.
pub const DEFAULT_OFFLINE_TYPE: &str = "OFFL";

/// Path suffix appended to a manifest URL to request the raw content stream.
pub const DEFAULT_VALUE_SUFFIX: &str = "/$value";

/// HTTP basic-auth credentials for the archive endpoint.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Default for Credentials {
    fn default() -> Self {
        // Guest credentials published by the archive operator.
        Self {
            username: "s5pguest".to_string(),
            password: "s5pguest".to_string(),
        }
    }
}

/// Configuration for an ingestion run.
#[derive(Debug, Clone)]
pub struct IngestConfig {
    /// Directory containing CSV manifest listings.
    pub manifest_dir: PathBuf,

    /// Directory downloads are written into.
    pub incoming_dir: PathBuf,

    /// Directory of files already handed off downstream.
    pub processed_dir: PathBuf,

    /// Month-range partition this invocation is responsible for.
    pub partition: Partition,

    /// Maximum simultaneously in-flight downloads.
    pub max_concurrent_downloads: usize,

    /// Retry behavior for individual downloads.
    pub retry: RetryPolicy,

    /// Basic-auth credentials for the archive endpoint.
    pub credentials: Credentials,

    /// Filename prefix selecting products when listing local directories.
    pub file_prefix: String,

    /// Data-type code kept when a day has two product variants.
    pub offline_type: String,

    /// Suffix appended to manifest URLs to fetch the raw body.
    pub value_suffix: String,

    /// Whether files in the processed directory are trusted without
    /// re-running the integrity probe. The processed directory is assumed
    /// immutable once files land there.
    pub trust_processed: bool,
}

impl IngestConfig {
    /// Create a configuration with defaults for everything but the
    /// directories and partition.
    pub fn new(
        manifest_dir: impl Into<PathBuf>,
        incoming_dir: impl Into<PathBuf>,
        processed_dir: impl Into<PathBuf>,
        partition: Partition,
    ) -> Self {
        Self {
            manifest_dir: manifest_dir.into(),
            incoming_dir: incoming_dir.into(),
            processed_dir: processed_dir.into(),
            partition,
            max_concurrent_downloads: DEFAULT_CONCURRENT_DOWNLOADS,
            retry: RetryPolicy::fixed(
                DEFAULT_MAX_ATTEMPTS,
                Duration::from_secs(DEFAULT_RETRY_DELAY_SECS),
            ),
            credentials: Credentials::default(),
            file_prefix: DEFAULT_FILE_PREFIX.to_string(),
            offline_type: DEFAULT_OFFLINE_TYPE.to_string(),
            value_suffix: DEFAULT_VALUE_SUFFIX.to_string(),
            trust_processed: true,
        }
    }

    /// Set the maximum number of concurrent downloads.
    pub fn with_max_concurrent_downloads(mut self, max: usize) -> Self {
        self.max_concurrent_downloads = max;
        self
    }

    /// Set the retry policy.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Set the basic-auth credentials.
    pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.credentials = Credentials {
            username: username.into(),
            password: password.into(),
        };
        self
    }

    /// Set the data-type code preferred for two-variant days.
    pub fn with_offline_type(mut self, code: impl Into<String>) -> Self {
        self.offline_type = code.into();
        self
    }

    /// Enable or disable trusting processed-directory files without probing.
    pub fn with_trust_processed(mut self, trust: bool) -> Self {
        self.trust_processed = trust;
        self
    }

    /// Load configuration from an INI file.
    ///
    /// Expected layout:
    ///
    /// ```ini
    /// [directories]
    /// manifest = /data/manifest
    /// incoming = /data/incoming
    /// processed = /data/processed
    ///
    /// [download]
    /// partition = 1
    /// concurrency = 5
    /// max_attempts = 15
    /// retry_delay_secs = 10
    /// backoff = fixed
    /// username = s5pguest
    /// password = s5pguest
    ///
    /// [integrity]
    /// trust_processed = true
    /// ```
    ///
    /// Only the `[directories]` keys and `partition` are required; everything
    /// else falls back to defaults.
    pub fn from_ini(path: &Path) -> IngestResult<Self> {
        let ini = Ini::load_from_file(path)
            .map_err(|e| IngestError::InvalidConfig(format!("{}: {}", path.display(), e)))?;

        let dirs = ini
            .section(Some("directories"))
            .ok_or_else(|| IngestError::InvalidConfig("missing [directories] section".into()))?;
        let dir = |key: &str| -> IngestResult<PathBuf> {
            dirs.get(key)
                .map(PathBuf::from)
                .ok_or_else(|| IngestError::InvalidConfig(format!("missing directories.{}", key)))
        };

        let download = ini.section(Some("download"));
        let get = |key: &str| download.and_then(|s| s.get(key));

        let partition: Partition = get("partition")
            .ok_or_else(|| IngestError::InvalidConfig("missing download.partition".into()))?
            .parse()
            .map_err(IngestError::InvalidConfig)?;

        let mut config = Self::new(dir("manifest")?, dir("incoming")?, dir("processed")?, partition);

        if let Some(v) = get("concurrency") {
            config.max_concurrent_downloads = v
                .parse()
                .map_err(|_| IngestError::InvalidConfig(format!("bad download.concurrency: {}", v)))?;
        }

        let max_attempts: u32 = match get("max_attempts") {
            Some(v) => v
                .parse()
                .map_err(|_| IngestError::InvalidConfig(format!("bad download.max_attempts: {}", v)))?,
            None => DEFAULT_MAX_ATTEMPTS,
        };
        let delay_secs: u64 = match get("retry_delay_secs") {
            Some(v) => v.parse().map_err(|_| {
                IngestError::InvalidConfig(format!("bad download.retry_delay_secs: {}", v))
            })?,
            None => DEFAULT_RETRY_DELAY_SECS,
        };
        config.retry = match get("backoff").unwrap_or("fixed") {
            "fixed" => RetryPolicy::fixed(max_attempts, Duration::from_secs(delay_secs)),
            "exponential" => RetryPolicy::exponential(max_attempts),
            other => {
                return Err(IngestError::InvalidConfig(format!(
                    "bad download.backoff: {} (expected fixed or exponential)",
                    other
                )))
            }
        };

        if let (Some(user), Some(pass)) = (get("username"), get("password")) {
            config.credentials = Credentials {
                username: user.to_string(),
                password: pass.to_string(),
            };
        }

        if let Some(v) = ini.section(Some("integrity")).and_then(|s| s.get("trust_processed")) {
            config.trust_processed = v.parse().map_err(|_| {
                IngestError::InvalidConfig(format!("bad integrity.trust_processed: {}", v))
            })?;
        }

        Ok(config)
    }
}
