//! Minting, binding and opening large-object references.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use futures::StreamExt;
use object_store::path::Path as ObjectPath;
use object_store::{Error as ObjectStoreError, GetResult};
use once_cell::sync::OnceCell;
use rudf_core::config::StorageConfig;
use rudf_core::large_object::{LargeObjectRef, URI_SCHEME_PREFIX};
use tokio::runtime::Runtime;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::storage::{build_backend_from_config, run_with_retry, MemoryBackend, ObjectBackend, RetryConfig};
use crate::stream::{remove_staging, staging_path, LargeObjectReader, LargeObjectWriter};

/// Entry point of the large-object subsystem.
///
/// Owns the tokio runtime that drives the backend; every method is blocking.
#[derive(Debug)]
pub struct LargeObjectStore {
    runtime: Arc<Runtime>,
    backend: Arc<dyn ObjectBackend>,
    default_bucket: String,
    staging_dir: PathBuf,
    retry: RetryConfig,
    bucket_ready: AtomicBool,
}

static GLOBAL: OnceCell<Arc<LargeObjectStore>> = OnceCell::new();

impl LargeObjectStore {
    pub fn new(backend: Arc<dyn ObjectBackend>, cfg: &StorageConfig) -> Result<Self> {
        let runtime = Runtime::new()?;
        Ok(Self {
            runtime: Arc::new(runtime),
            backend,
            default_bucket: cfg.default_bucket.clone(),
            staging_dir: cfg.staging_dir.clone(),
            retry: RetryConfig::from_storage_config(cfg),
            bucket_ready: AtomicBool::new(false),
        })
    }

    pub fn from_config(cfg: &StorageConfig) -> Result<Self> {
        Self::new(build_backend_from_config(cfg)?, cfg)
    }

    /// A store over a fresh in-process backend.
    pub fn in_memory() -> Result<Self> {
        Self::new(Arc::new(MemoryBackend::new()), &StorageConfig::in_memory())
    }

    /// Process-wide store built from `StorageConfig::global()`.
    pub fn global() -> Result<Arc<Self>> {
        GLOBAL
            .get_or_try_init(|| Self::from_config(StorageConfig::global()).map(Arc::new))
            .map(Arc::clone)
    }

    pub fn backend(&self) -> &Arc<dyn ObjectBackend> {
        &self.backend
    }

    pub fn default_bucket(&self) -> &str {
        &self.default_bucket
    }

    /// Create `bucket` if it does not exist. Returns whether the bucket is
    /// known to exist afterwards. Concurrent creators are tolerated; any
    /// other failure is logged and left for the first real I/O on the bucket
    /// to report.
    pub fn ensure_bucket(&self, bucket: &str) -> bool {
        match self.runtime.block_on(self.backend.bucket_exists(bucket)) {
            Ok(true) => return true,
            Ok(false) => {}
            Err(e) => tracing::warn!(bucket, error = %e, "bucket probe failed"),
        }
        match self.runtime.block_on(self.backend.create_bucket(bucket)) {
            Ok(()) => {
                tracing::debug!(bucket, "created bucket");
                true
            }
            Err(Error::BucketExists(_)) => true,
            Err(e) => {
                tracing::warn!(bucket, error = %e, "bucket creation failed");
                false
            }
        }
    }

    /// A fresh, unique reference under the default bucket. The bucket is
    /// checked until one attempt confirms it.
    pub fn mint(&self) -> Result<LargeObjectRef> {
        if !self.bucket_ready.load(Ordering::Acquire) && self.ensure_bucket(&self.default_bucket) {
            self.bucket_ready.store(true, Ordering::Release);
        }
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or_default();
        let uri = format!(
            "{URI_SCHEME_PREFIX}{}/objects/{millis}/{}",
            self.default_bucket,
            Uuid::new_v4().simple()
        );
        Ok(LargeObjectRef::bind(uri)?)
    }

    pub fn bind(&self, uri: &str) -> Result<LargeObjectRef> {
        Ok(LargeObjectRef::bind(uri)?)
    }

    fn locate(&self, reference: &LargeObjectRef) -> Result<(Arc<dyn object_store::ObjectStore>, ObjectPath)> {
        let (bucket, key) = reference.parts()?;
        let store = self.backend.bucket_store(bucket)?;
        let location = ObjectPath::parse(key)
            .map_err(|e| Error::InvalidReference(format!("{reference}: {e}")))?;
        Ok((store, location))
    }

    /// Download `reference` into a staging file and open it for reading.
    pub fn open_read(&self, reference: &LargeObjectRef) -> Result<LargeObjectReader> {
        let (store, location) = self
            .locate(reference)
            .map_err(|e| Error::Download(e.to_string()))?;
        let result = run_with_retry(&self.runtime, &self.retry, || {
            let store = Arc::clone(&store);
            let location = location.clone();
            async move { store.get(&location).await }
        })
        .map_err(|e| Error::Download(format!("{reference}: {e}")))?;

        let staging = staging_path(&self.staging_dir);
        match self.save_object(result, &staging) {
            Ok(size) => tracing::debug!(uri = %reference, size, "downloaded large object"),
            Err(e) => {
                remove_staging(&staging);
                return Err(Error::Download(format!("{reference}: {e}")));
            }
        }
        LargeObjectReader::from_staging(reference.clone(), staging)
    }

    /// Stream a download into `staging` chunk by chunk.
    fn save_object(&self, result: GetResult, staging: &Path) -> Result<u64> {
        let mut file = BufWriter::new(File::create(staging)?);
        let mut chunks = result.into_stream();
        let mut size = 0u64;
        while let Some(chunk) = self.runtime.block_on(chunks.next()) {
            let chunk = chunk.map_err(|e| Error::Storage(e.to_string()))?;
            file.write_all(&chunk)?;
            size += chunk.len() as u64;
        }
        file.flush()?;
        Ok(size)
    }

    /// Open a staging file whose contents are uploaded to `reference` on close.
    pub fn open_write(&self, reference: &LargeObjectRef) -> Result<LargeObjectWriter> {
        let (store, location) = self.locate(reference)?;
        LargeObjectWriter::create(
            reference.clone(),
            staging_path(&self.staging_dir),
            store,
            location,
            Arc::clone(&self.runtime),
            self.retry.clone(),
        )
    }

    pub fn exists(&self, reference: &LargeObjectRef) -> Result<bool> {
        let (store, location) = self.locate(reference)?;
        match run_with_retry(&self.runtime, &self.retry, || {
            let store = Arc::clone(&store);
            let location = location.clone();
            async move { store.head(&location).await }
        }) {
            Ok(_) => Ok(true),
            Err(ObjectStoreError::NotFound { .. }) => Ok(false),
            Err(e) => Err(Error::Storage(format!("{reference}: {e}"))),
        }
    }

    pub fn delete(&self, reference: &LargeObjectRef) -> Result<()> {
        let (store, location) = self.locate(reference)?;
        run_with_retry(&self.runtime, &self.retry, || {
            let store = Arc::clone(&store);
            let location = location.clone();
            async move { store.delete(&location).await }
        })
        .map_err(|e| Error::Storage(format!("{reference}: {e}")))
    }
}
