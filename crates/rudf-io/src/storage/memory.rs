//! In-memory backend for tests and single-process deployments.
//!
//! Buckets are `object_store::memory::InMemory` instances kept in a map;
//! a bucket must be created before it can be read from or written to.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use futures::future::BoxFuture;
use object_store::memory::InMemory;
use object_store::ObjectStore;

use super::ObjectBackend;
use crate::error::{Error, Result};

/// Thread-safe map of bucket name to in-memory store.
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    buckets: Arc<Mutex<HashMap<String, Arc<InMemory>>>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn buckets(&self) -> MutexGuard<'_, HashMap<String, Arc<InMemory>>> {
        self.buckets
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Names of all existing buckets, sorted.
    pub fn bucket_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.buckets().keys().cloned().collect();
        names.sort();
        names
    }
}

impl ObjectBackend for MemoryBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn bucket_store(&self, bucket: &str) -> Result<Arc<dyn ObjectStore>> {
        self.buckets()
            .get(bucket)
            .map(|s| Arc::clone(s) as Arc<dyn ObjectStore>)
            .ok_or_else(|| Error::Storage(format!("no such bucket: {bucket}")))
    }

    fn bucket_exists<'a>(&'a self, bucket: &'a str) -> BoxFuture<'a, Result<bool>> {
        let exists = self.buckets().contains_key(bucket);
        Box::pin(async move { Ok(exists) })
    }

    fn create_bucket<'a>(&'a self, bucket: &'a str) -> BoxFuture<'a, Result<()>> {
        let result = {
            let mut buckets = self.buckets();
            if buckets.contains_key(bucket) {
                Err(Error::BucketExists(bucket.to_string()))
            } else {
                buckets.insert(bucket.to_string(), Arc::new(InMemory::new()));
                Ok(())
            }
        };
        Box::pin(async move { result })
    }
}
