//! Test backend whose buckets fail on demand.
//!
//! Objects live in one `InMemory` store shared by every bucket. Uploads,
//! downloads and bucket calls can each be switched to fail.

use std::fmt;
use std::ops::Range;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use futures::future::BoxFuture;
use futures::stream::{self, BoxStream, StreamExt};
use object_store::memory::InMemory;
use object_store::path::Path as ObjectPath;
use object_store::{
    GetOptions, GetResult, GetResultPayload, ListResult, MultipartId, ObjectMeta, ObjectStore,
    PutOptions, PutResult,
};
use tokio::io::AsyncWrite;

use super::ObjectBackend;
use crate::error::{Error, Result};

fn injected(what: &str) -> object_store::Error {
    object_store::Error::Generic {
        store: "failing",
        source: format!("injected {what} failure").into(),
    }
}

#[derive(Debug, Default)]
pub(crate) struct FailingStore {
    pub(crate) inner: InMemory,
    pub(crate) fail_puts: AtomicBool,
    /// Downloads yield the first chunk of the object, then an error.
    pub(crate) fail_reads: AtomicBool,
}

impl fmt::Display for FailingStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FailingStore({})", self.inner)
    }
}

#[async_trait]
impl ObjectStore for FailingStore {
    async fn put_opts(&self, location: &ObjectPath, bytes: Bytes, opts: PutOptions) -> object_store::Result<PutResult> {
        if self.fail_puts.load(Ordering::SeqCst) {
            return Err(injected("put"));
        }
        self.inner.put_opts(location, bytes, opts).await
    }

    async fn put_multipart(
        &self,
        location: &ObjectPath,
    ) -> object_store::Result<(MultipartId, Box<dyn AsyncWrite + Unpin + Send>)> {
        if self.fail_puts.load(Ordering::SeqCst) {
            return Err(injected("multipart put"));
        }
        self.inner.put_multipart(location).await
    }

    async fn abort_multipart(&self, location: &ObjectPath, multipart_id: &MultipartId) -> object_store::Result<()> {
        self.inner.abort_multipart(location, multipart_id).await
    }

    async fn get_opts(&self, location: &ObjectPath, options: GetOptions) -> object_store::Result<GetResult> {
        let result = self.inner.get_opts(location, options).await?;
        if !self.fail_reads.load(Ordering::SeqCst) {
            return Ok(result);
        }
        let meta = result.meta.clone();
        let range: Range<usize> = result.range.clone();
        let body = result.bytes().await?;
        let first = body.slice(..body.len().min(4));
        let chunks: BoxStream<'static, object_store::Result<Bytes>> =
            stream::iter(vec![Ok(first), Err(injected("read"))]).boxed();
        Ok(GetResult {
            payload: GetResultPayload::Stream(chunks),
            meta,
            range,
        })
    }

    async fn delete(&self, location: &ObjectPath) -> object_store::Result<()> {
        self.inner.delete(location).await
    }

    fn list(&self, prefix: Option<&ObjectPath>) -> BoxStream<'_, object_store::Result<ObjectMeta>> {
        self.inner.list(prefix)
    }

    async fn list_with_delimiter(&self, prefix: Option<&ObjectPath>) -> object_store::Result<ListResult> {
        self.inner.list_with_delimiter(prefix).await
    }

    async fn copy(&self, from: &ObjectPath, to: &ObjectPath) -> object_store::Result<()> {
        self.inner.copy(from, to).await
    }

    async fn copy_if_not_exists(&self, from: &ObjectPath, to: &ObjectPath) -> object_store::Result<()> {
        self.inner.copy_if_not_exists(from, to).await
    }
}

/// Every bucket maps to the same `FailingStore`. The next
/// `bucket_failures` bucket probes or creations fail.
#[derive(Debug, Default)]
pub(crate) struct FailingBackend {
    pub(crate) store: Arc<FailingStore>,
    pub(crate) bucket_failures: AtomicUsize,
    pub(crate) created: AtomicUsize,
    exists: AtomicBool,
}

impl FailingBackend {
    fn bucket_call_fails(&self) -> bool {
        self.bucket_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

impl ObjectBackend for FailingBackend {
    fn name(&self) -> &'static str {
        "failing"
    }

    fn bucket_store(&self, _bucket: &str) -> Result<Arc<dyn ObjectStore>> {
        Ok(Arc::clone(&self.store) as Arc<dyn ObjectStore>)
    }

    fn bucket_exists<'a>(&'a self, bucket: &'a str) -> BoxFuture<'a, Result<bool>> {
        let result = if self.bucket_call_fails() {
            Err(Error::Storage(format!("probe of {bucket} timed out")))
        } else {
            Ok(self.exists.load(Ordering::SeqCst))
        };
        Box::pin(async move { result })
    }

    fn create_bucket<'a>(&'a self, bucket: &'a str) -> BoxFuture<'a, Result<()>> {
        let result = if self.bucket_call_fails() {
            Err(Error::Storage(format!("create of {bucket} timed out")))
        } else if self.exists.swap(true, Ordering::SeqCst) {
            Err(Error::BucketExists(bucket.to_string()))
        } else {
            self.created.fetch_add(1, Ordering::SeqCst);
            Ok(())
        };
        Box::pin(async move { result })
    }
}
