//! Object-store backends for large objects.
//!
//! - `memory`: in-process buckets, selected by a `memory://` endpoint.
//! - `s3`: S3-compatible services built on `object_store::aws` (feature `s3`).
//!
//! A backend hands out one `ObjectStore` per bucket and knows how to probe
//! for and create buckets, which `object_store` itself does not cover.

mod memory;
pub use memory::MemoryBackend;

#[cfg(test)]
pub(crate) mod failing;

#[cfg(feature = "s3")]
mod s3;
#[cfg(feature = "s3")]
pub use s3::S3Backend;

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use futures::future::BoxFuture;
use object_store::{Error as ObjectStoreError, ObjectStore};
use rudf_core::config::StorageConfig;
use tokio::runtime::Runtime;

use crate::error::{Error, Result};

/// A family of buckets reachable with one set of credentials.
pub trait ObjectBackend: Send + Sync + fmt::Debug {
    /// Human-readable backend name (stable).
    fn name(&self) -> &'static str;

    /// Store scoped to `bucket`. Does not check that the bucket exists.
    fn bucket_store(&self, bucket: &str) -> Result<Arc<dyn ObjectStore>>;

    fn bucket_exists<'a>(&'a self, bucket: &'a str) -> BoxFuture<'a, Result<bool>>;

    /// Create `bucket`. Fails with `Error::BucketExists` when it is already there.
    fn create_bucket<'a>(&'a self, bucket: &'a str) -> BoxFuture<'a, Result<()>>;
}

/// Retry/backoff configuration shared across backends.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_retries: usize,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff: Duration::from_millis(200),
            max_backoff: Duration::from_secs(5),
        }
    }
}

impl RetryConfig {
    pub fn from_storage_config(cfg: &StorageConfig) -> Self {
        Self {
            max_retries: cfg.retry_max_retries,
            initial_backoff: Duration::from_millis(cfg.retry_initial_backoff_ms),
            max_backoff: Duration::from_millis(cfg.retry_max_backoff_ms),
        }
    }
}

/// Run `op` on `runtime`, retrying transient failures with exponential backoff.
/// NotFound and AlreadyExists are returned immediately.
pub(crate) fn run_with_retry<F, Fut, T>(
    runtime: &Runtime,
    retry: &RetryConfig,
    mut op: F,
) -> object_store::Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = object_store::Result<T>>,
{
    let mut attempt = 0usize;
    let mut backoff = retry.initial_backoff;

    loop {
        match runtime.block_on(op()) {
            Ok(value) => return Ok(value),
            Err(err) => {
                if attempt >= retry.max_retries || !is_retryable(&err) {
                    return Err(err);
                }
                attempt += 1;
                tracing::debug!(attempt, error = %err, "retrying object store call");
                thread::sleep(backoff);
                backoff = std::cmp::min(backoff * 2, retry.max_backoff);
            }
        }
    }
}

fn is_retryable(err: &ObjectStoreError) -> bool {
    match err {
        ObjectStoreError::NotFound { .. } => false,
        ObjectStoreError::AlreadyExists { .. } => false,
        ObjectStoreError::InvalidPath { .. } => false,
        ObjectStoreError::NotImplemented => false,
        _ => true,
    }
}

/// Build the backend the configured endpoint asks for.
pub fn build_backend_from_config(cfg: &StorageConfig) -> Result<Arc<dyn ObjectBackend>> {
    match cfg.scheme() {
        Some("memory") => Ok(Arc::new(MemoryBackend::new())),
        Some("http") | Some("https") => {
            #[cfg(feature = "s3")]
            {
                Ok(Arc::new(S3Backend::new(cfg)?))
            }

            #[cfg(not(feature = "s3"))]
            {
                Err(Error::Config(
                    "rudf was built without the `s3` feature; rebuild with `--features rudf-io/s3`"
                        .into(),
                ))
            }
        }
        Some(other) => Err(Error::Config(format!(
            "unsupported storage endpoint scheme '{other}'"
        ))),
        None => Err(Error::Config(format!(
            "storage endpoint '{}' has no scheme",
            cfg.endpoint
        ))),
    }
}
