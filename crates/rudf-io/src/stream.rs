//! Sequential stream handles over large objects.
//!
//! Both handles work through a local staging file: readers stream the
//! whole object to disk up front, writers upload on `close`. Neither supports
//! seeking. Dropping a handle without closing it removes its staging file;
//! a writer dropped this way uploads nothing.

use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::Bytes;
use object_store::path::Path as ObjectPath;
use object_store::ObjectStore;
use rudf_core::large_object::LargeObjectRef;
use tokio::io::AsyncWriteExt;
use tokio::runtime::Runtime;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::storage::{run_with_retry, RetryConfig};

/// Part size for multipart uploads. Objects up to this size go up in one put.
pub const PART_SIZE: usize = 50 * 1024 * 1024;

pub(crate) fn staging_path(dir: &Path) -> PathBuf {
    dir.join(format!("rudf-lob-{}.part", Uuid::new_v4().simple()))
}

pub(crate) fn remove_staging(path: &Path) {
    if let Err(e) = fs::remove_file(path) {
        if e.kind() != io::ErrorKind::NotFound {
            tracing::warn!(path = %path.display(), error = %e, "failed to remove staging file");
        }
    }
}

pub struct LargeObjectReader {
    reference: LargeObjectRef,
    staging: PathBuf,
    file: Option<BufReader<File>>,
}

impl LargeObjectReader {
    /// Take ownership of an already-downloaded staging file.
    pub(crate) fn from_staging(reference: LargeObjectRef, staging: PathBuf) -> Result<Self> {
        let file = match File::open(&staging) {
            Ok(f) => f,
            Err(e) => {
                remove_staging(&staging);
                return Err(e.into());
            }
        };
        Ok(Self {
            reference,
            staging,
            file: Some(BufReader::new(file)),
        })
    }

    pub fn reference(&self) -> &LargeObjectRef {
        &self.reference
    }

    fn file(&mut self) -> Result<&mut BufReader<File>> {
        self.file.as_mut().ok_or(Error::StreamClosed)
    }

    /// Up to `n` bytes; `n < 0` reads everything that is left. An empty
    /// result means end of object.
    pub fn read(&mut self, n: i64) -> Result<Vec<u8>> {
        let file = self.file()?;
        let mut buf = Vec::new();
        if n < 0 {
            file.read_to_end(&mut buf)?;
        } else {
            file.by_ref().take(n as u64).read_to_end(&mut buf)?;
        }
        Ok(buf)
    }

    /// Next line without its terminator, or `None` at end of object.
    pub fn read_line(&mut self) -> Result<Option<String>> {
        let file = self.file()?;
        let mut raw = Vec::new();
        if file.read_until(b'\n', &mut raw)? == 0 {
            return Ok(None);
        }
        if raw.last() == Some(&b'\n') {
            raw.pop();
            if raw.last() == Some(&b'\r') {
                raw.pop();
            }
        }
        Ok(Some(String::from_utf8_lossy(&raw).into_owned()))
    }

    pub fn readable(&self) -> bool {
        self.file.is_some()
    }

    pub fn seekable(&self) -> bool {
        false
    }

    pub fn closed(&self) -> bool {
        self.file.is_none()
    }

    /// Release the staging file. Closing twice is a no-op.
    pub fn close(&mut self) {
        if self.file.take().is_some() {
            remove_staging(&self.staging);
        }
    }
}

impl Read for LargeObjectReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.file.as_mut() {
            Some(f) => f.read(buf),
            None => Err(io::Error::new(io::ErrorKind::Other, Error::StreamClosed)),
        }
    }
}

impl Drop for LargeObjectReader {
    fn drop(&mut self) {
        self.close();
    }
}

pub struct LargeObjectWriter {
    reference: LargeObjectRef,
    staging: PathBuf,
    file: Option<BufWriter<File>>,
    store: Arc<dyn ObjectStore>,
    location: ObjectPath,
    runtime: Arc<Runtime>,
    retry: RetryConfig,
}

impl LargeObjectWriter {
    pub(crate) fn create(
        reference: LargeObjectRef,
        staging: PathBuf,
        store: Arc<dyn ObjectStore>,
        location: ObjectPath,
        runtime: Arc<Runtime>,
        retry: RetryConfig,
    ) -> Result<Self> {
        let file = File::create(&staging)?;
        Ok(Self {
            reference,
            staging,
            file: Some(BufWriter::new(file)),
            store,
            location,
            runtime,
            retry,
        })
    }

    pub fn reference(&self) -> &LargeObjectRef {
        &self.reference
    }

    /// Append `data`; returns the number of bytes written.
    pub fn write(&mut self, data: &[u8]) -> Result<usize> {
        let file = self.file.as_mut().ok_or(Error::StreamClosed)?;
        file.write_all(data)?;
        Ok(data.len())
    }

    pub fn flush(&mut self) -> Result<()> {
        if let Some(file) = self.file.as_mut() {
            file.flush()?;
        }
        Ok(())
    }

    pub fn writable(&self) -> bool {
        self.file.is_some()
    }

    pub fn seekable(&self) -> bool {
        false
    }

    pub fn closed(&self) -> bool {
        self.file.is_none()
    }

    /// Upload the staged bytes and remove the staging file, whether or not
    /// the upload succeeded. Closing twice is a no-op.
    pub fn close(&mut self) -> Result<()> {
        let Some(mut file) = self.file.take() else {
            return Ok(());
        };
        let flushed = file.flush();
        drop(file);
        let result = match flushed {
            Ok(()) => self.upload(),
            Err(e) => Err(Error::Upload(format!("flush staging file: {e}"))),
        };
        remove_staging(&self.staging);
        match &result {
            Ok(size) => tracing::debug!(uri = %self.reference, size, "uploaded large object"),
            Err(e) => tracing::warn!(uri = %self.reference, error = %e, "large object upload failed"),
        }
        result.map(|_| ())
    }

    /// Drop the staged bytes without uploading.
    pub fn discard(&mut self) {
        if self.file.take().is_some() {
            remove_staging(&self.staging);
        }
    }

    fn upload(&self) -> Result<u64> {
        let size = fs::metadata(&self.staging)
            .map_err(|e| Error::Upload(format!("stat staging file: {e}")))?
            .len();
        if size <= PART_SIZE as u64 {
            let data = Bytes::from(
                fs::read(&self.staging).map_err(|e| Error::Upload(format!("read staging file: {e}")))?,
            );
            run_with_retry(&self.runtime, &self.retry, || {
                let store = Arc::clone(&self.store);
                let location = self.location.clone();
                let data = data.clone();
                async move { store.put(&location, data).await.map(|_| ()) }
            })
            .map_err(|e| Error::Upload(format!("{}: {e}", self.reference)))?;
        } else {
            self.upload_multipart()?;
        }
        Ok(size)
    }

    fn upload_multipart(&self) -> Result<()> {
        let mut source = File::open(&self.staging)
            .map_err(|e| Error::Upload(format!("open staging file: {e}")))?;
        let store = Arc::clone(&self.store);
        let location = self.location.clone();
        let uri = self.reference.to_string();
        self.runtime.block_on(async move {
            let (id, mut sink) = store
                .put_multipart(&location)
                .await
                .map_err(|e| Error::Upload(format!("{uri}: {e}")))?;
            let mut part = vec![0u8; PART_SIZE];
            let copied: io::Result<()> = async {
                loop {
                    let n = read_full(&mut source, &mut part)?;
                    if n == 0 {
                        break;
                    }
                    sink.write_all(&part[..n]).await?;
                }
                sink.shutdown().await
            }
            .await;
            if let Err(e) = copied {
                if let Err(abort) = store.abort_multipart(&location, &id).await {
                    tracing::warn!(uri = %uri, error = %abort, "failed to abort multipart upload");
                }
                return Err(Error::Upload(format!("{uri}: {e}")));
            }
            Ok(())
        })
    }
}

/// Fill `buf` as far as the source allows; returns bytes read.
fn read_full(source: &mut File, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match source.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

impl Write for LargeObjectWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self.file.as_mut() {
            Some(f) => f.write(buf),
            None => Err(io::Error::new(io::ErrorKind::Other, Error::StreamClosed)),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.file.as_mut() {
            Some(f) => f.flush(),
            None => Ok(()),
        }
    }
}

impl Drop for LargeObjectWriter {
    fn drop(&mut self) {
        if self.file.is_some() {
            tracing::warn!(uri = %self.reference, "large object writer dropped without close; discarding");
            self.discard();
        }
    }
}
