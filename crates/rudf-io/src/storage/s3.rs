//! S3-compatible backend (AWS, MinIO) built on `object_store::aws`.
//!
//! Path-style requests against the configured endpoint; plain HTTP is allowed
//! for local development endpoints. `object_store` has no bucket API, so
//! bucket creation signs a `PUT /<bucket>/` with the store's own signer and
//! sends it with reqwest.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::future::BoxFuture;
use object_store::aws::{AmazonS3, AmazonS3Builder};
use object_store::path::Path as ObjectPath;
use object_store::signer::Signer;
use object_store::{BackoffConfig, Error as ObjectStoreError, ObjectStore};
use reqwest::{Method, StatusCode};
use rudf_core::config::StorageConfig;

use super::{ObjectBackend, RetryConfig};
use crate::error::{Error, Result};

const SIGNED_URL_TTL: Duration = Duration::from_secs(60);

#[derive(Debug)]
pub struct S3Backend {
    cfg: StorageConfig,
    retry: RetryConfig,
    stores: Mutex<HashMap<String, Arc<AmazonS3>>>,
    http: reqwest::Client,
}

impl S3Backend {
    pub fn new(cfg: &StorageConfig) -> Result<Self> {
        if cfg.endpoint.trim().is_empty() {
            return Err(Error::Config("missing S3 endpoint".into()));
        }
        Ok(Self {
            cfg: cfg.clone(),
            retry: RetryConfig::from_storage_config(cfg),
            stores: Mutex::new(HashMap::new()),
            http: reqwest::Client::new(),
        })
    }

    fn s3_for(&self, bucket: &str) -> Result<Arc<AmazonS3>> {
        let mut stores = self
            .stores
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(store) = stores.get(bucket) {
            return Ok(Arc::clone(store));
        }
        let store = AmazonS3Builder::new()
            .with_bucket_name(bucket)
            .with_endpoint(self.cfg.endpoint.clone())
            .with_region(self.cfg.region.clone())
            .with_access_key_id(self.cfg.username.clone())
            .with_secret_access_key(self.cfg.password.clone())
            .with_allow_http(!self.cfg.use_https())
            .with_virtual_hosted_style_request(false)
            .with_retry(object_store_retry(&self.retry))
            .build()
            .map_err(|e| Error::Config(format!("object_store builder error: {e}")))?;
        let store = Arc::new(store);
        stores.insert(bucket.to_string(), Arc::clone(&store));
        Ok(store)
    }
}

fn object_store_retry(retry: &RetryConfig) -> object_store::RetryConfig {
    object_store::RetryConfig {
        max_retries: retry.max_retries,
        retry_timeout: retry.max_backoff,
        backoff: BackoffConfig {
            init_backoff: retry.initial_backoff,
            max_backoff: retry.max_backoff,
            base: 2.0,
        },
    }
}

impl ObjectBackend for S3Backend {
    fn name(&self) -> &'static str {
        "s3"
    }

    fn bucket_store(&self, bucket: &str) -> Result<Arc<dyn ObjectStore>> {
        let store: Arc<dyn ObjectStore> = self.s3_for(bucket)?;
        Ok(store)
    }

    fn bucket_exists<'a>(&'a self, bucket: &'a str) -> BoxFuture<'a, Result<bool>> {
        Box::pin(async move {
            let store = self.s3_for(bucket)?;
            match store.list_with_delimiter(None).await {
                Ok(_) => Ok(true),
                Err(ObjectStoreError::NotFound { .. }) => Ok(false),
                Err(e) => Err(Error::Storage(format!("probe bucket {bucket}: {e}"))),
            }
        })
    }

    fn create_bucket<'a>(&'a self, bucket: &'a str) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let store = self.s3_for(bucket)?;
            let url = store
                .signed_url(Method::PUT, &ObjectPath::from(""), SIGNED_URL_TTL)
                .await
                .map_err(|e| Error::Storage(format!("sign create-bucket request: {e}")))?;
            let response = self
                .http
                .put(url)
                .send()
                .await
                .map_err(|e| Error::Storage(format!("create bucket {bucket}: {e}")))?;
            match response.status() {
                s if s.is_success() => Ok(()),
                StatusCode::CONFLICT => Err(Error::BucketExists(bucket.to_string())),
                s => Err(Error::Storage(format!("create bucket {bucket}: HTTP {s}"))),
            }
        })
    }
}
