//! Object-storage configuration for the large-object subsystem.
//!
//! Read from the environment once per process (`StorageConfig::global`) and
//! treated as immutable afterwards.

use std::path::PathBuf;
use std::sync::Once;

use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};

pub const ENV_ENDPOINT: &str = "STORAGE_S3_ENDPOINT";
pub const ENV_REGION: &str = "STORAGE_S3_REGION";
pub const ENV_USERNAME: &str = "STORAGE_S3_AUTH_USERNAME";
pub const ENV_PASSWORD: &str = "STORAGE_S3_AUTH_PASSWORD";
pub const ENV_BUCKET: &str = "STORAGE_LARGE_OBJECT_BUCKET";
pub const ENV_STAGING_DIR: &str = "STORAGE_STAGING_DIR";
pub const ENV_RETRY_MAX_RETRIES: &str = "STORAGE_RETRY_MAX_RETRIES";
pub const ENV_RETRY_INITIAL_MS: &str = "STORAGE_RETRY_INITIAL_MS";
pub const ENV_RETRY_MAX_MS: &str = "STORAGE_RETRY_MAX_MS";

pub const DEFAULT_ENDPOINT: &str = "http://localhost:9000";
pub const DEFAULT_REGION: &str = "us-west-2";
pub const DEFAULT_USERNAME: &str = "minio";
pub const DEFAULT_PASSWORD: &str = "password";
pub const DEFAULT_BUCKET: &str = "udf-large-objects";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// `http(s)://host:port` of an S3-compatible service, or `memory://`.
    pub endpoint: String,
    pub region: String,
    pub username: String,
    #[serde(skip_serializing, default)]
    pub password: String,

    /// Bucket freshly minted references are placed in.
    pub default_bucket: String,

    /// Directory for local staging files of open streams.
    pub staging_dir: PathBuf,

    /// Retry policy for object-store calls.
    pub retry_max_retries: usize,
    pub retry_initial_backoff_ms: u64,
    pub retry_max_backoff_ms: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            region: DEFAULT_REGION.to_string(),
            username: DEFAULT_USERNAME.to_string(),
            password: DEFAULT_PASSWORD.to_string(),
            default_bucket: DEFAULT_BUCKET.to_string(),
            staging_dir: std::env::temp_dir(),
            retry_max_retries: 3,
            retry_initial_backoff_ms: 200,
            retry_max_backoff_ms: 5_000,
        }
    }
}

static GLOBAL: OnceCell<StorageConfig> = OnceCell::new();
static EXPORT: Once = Once::new();

impl StorageConfig {
    /// Configuration backed by the in-process object store.
    pub fn in_memory() -> Self {
        Self {
            endpoint: "memory://".to_string(),
            ..Self::default()
        }
    }

    /// Create a config from environment variables, falling back to defaults.
    ///
    /// Environment variables:
    /// - `STORAGE_S3_ENDPOINT`, `STORAGE_S3_REGION`
    /// - `STORAGE_S3_AUTH_USERNAME`, `STORAGE_S3_AUTH_PASSWORD`
    /// - `STORAGE_LARGE_OBJECT_BUCKET`: bucket for minted references
    /// - `STORAGE_STAGING_DIR`: staging directory for stream files
    /// - `STORAGE_RETRY_MAX_RETRIES`, `STORAGE_RETRY_INITIAL_MS`, `STORAGE_RETRY_MAX_MS`
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Some(s) = non_empty_env(ENV_ENDPOINT) {
            cfg.endpoint = s;
        }

        if let Some(s) = non_empty_env(ENV_REGION) {
            cfg.region = s;
        }

        if let Some(s) = non_empty_env(ENV_USERNAME) {
            cfg.username = s;
        }

        if let Some(s) = non_empty_env(ENV_PASSWORD) {
            cfg.password = s;
        }

        if let Some(s) = non_empty_env(ENV_BUCKET) {
            cfg.default_bucket = s;
        }

        if let Some(s) = non_empty_env(ENV_STAGING_DIR) {
            cfg.staging_dir = PathBuf::from(s);
        }

        if let Some(v) = non_empty_env(ENV_RETRY_MAX_RETRIES).and_then(|s| s.parse().ok()) {
            cfg.retry_max_retries = v;
        }

        if let Some(v) = non_empty_env(ENV_RETRY_INITIAL_MS).and_then(|s| s.parse().ok()) {
            cfg.retry_initial_backoff_ms = v;
        }

        if let Some(v) = non_empty_env(ENV_RETRY_MAX_MS).and_then(|s| s.parse().ok()) {
            cfg.retry_max_backoff_ms = v;
        }

        cfg
    }

    /// The process-wide configuration, read from the environment on first use.
    pub fn global() -> &'static StorageConfig {
        GLOBAL.get_or_init(Self::from_env)
    }

    /// Publish the resolved connection settings back into the environment so
    /// that code running inside the guest sees the same values. Runs once per
    /// process; later calls are no-ops.
    pub fn export_to_env(&self) {
        EXPORT.call_once(|| {
            std::env::set_var(ENV_ENDPOINT, &self.endpoint);
            std::env::set_var(ENV_REGION, &self.region);
            std::env::set_var(ENV_USERNAME, &self.username);
            std::env::set_var(ENV_PASSWORD, &self.password);
        });
    }

    /// URI scheme of the endpoint (`http`, `https`, `memory`, ...).
    pub fn scheme(&self) -> Option<&str> {
        self.endpoint
            .split_once("://")
            .map(|(s, _)| s.trim())
            .filter(|s| !s.is_empty())
    }

    pub fn use_https(&self) -> bool {
        self.scheme() == Some("https")
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|s| !s.trim().is_empty())
}
