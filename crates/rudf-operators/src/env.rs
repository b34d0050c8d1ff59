//! The large-object API installed into the guest.
//!
//! Guest code sees these globals:
//!
//! - `largebinary(uri = NULL)`: mint a fresh reference, or bind `uri`.
//! - `largebinary_open_read(ref)` / `largebinary_open_write(ref)`: open a
//!   stream; `ref` is a reference or a URI string. Returns a handle.
//! - `largebinary_read(h, n = -1)`: raw vector of up to `n` bytes (all
//!   remaining when `n < 0`); empty at end of object.
//! - `largebinary_readline(h)`: next line, or `character(0)` at the end.
//! - `largebinary_write(h, data)`: write a raw vector or string; returns the
//!   byte count.
//! - `largebinary_close(h)`: close the stream, uploading for writers.
//!
//! Handles are host-side streams keyed by id. They live for one invocation:
//! whatever guest code leaves open is released when the call (or the row
//! stream it returned) finishes. Readers are closed, writers are discarded.

use std::collections::HashMap;
use std::fmt::Display;
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use once_cell::sync::OnceCell;
use rudf_core::config::StorageConfig;
use rudf_core::guest::{GuestList, GuestValue};
use rudf_core::id::StreamId;
use rudf_core::large_object::LargeObjectRef;
use rudf_guest::{GuestError, GuestSession, HostFunction};
use rudf_io::{LargeObjectReader, LargeObjectStore, LargeObjectWriter};

use crate::traits::OpError;

pub const LARGEBINARY: &str = "largebinary";
pub const LARGEBINARY_OPEN_READ: &str = "largebinary_open_read";
pub const LARGEBINARY_OPEN_WRITE: &str = "largebinary_open_write";
pub const LARGEBINARY_READ: &str = "largebinary_read";
pub const LARGEBINARY_READLINE: &str = "largebinary_readline";
pub const LARGEBINARY_WRITE: &str = "largebinary_write";
pub const LARGEBINARY_CLOSE: &str = "largebinary_close";

const HANDLE_ID: &str = "stream";
const HANDLE_MODE: &str = "mode";
const HANDLE_URI: &str = "uri";

enum OpenStream {
    Reader(LargeObjectReader),
    Writer(LargeObjectWriter),
}

#[derive(Default)]
struct StreamTable {
    next_id: u64,
    streams: HashMap<StreamId, OpenStream>,
}

struct Inner {
    session: GuestSession,
    store: Arc<LargeObjectStore>,
    streams: Mutex<StreamTable>,
    installed: OnceCell<()>,
}

/// Guest session plus the large-object state shared by one operator.
#[derive(Clone)]
pub struct UdfEnv {
    inner: Arc<Inner>,
}

impl UdfEnv {
    pub fn new(session: GuestSession, store: Arc<LargeObjectStore>) -> Self {
        Self {
            inner: Arc::new(Inner {
                session,
                store,
                streams: Mutex::new(StreamTable::default()),
                installed: OnceCell::new(),
            }),
        }
    }

    /// Environment over the process-wide store. Also publishes the storage
    /// settings to the process environment for code running in the guest.
    pub fn from_global_config(session: GuestSession) -> Result<Self, OpError> {
        StorageConfig::global().export_to_env();
        Ok(Self::new(session, LargeObjectStore::global()?))
    }

    pub fn session(&self) -> &GuestSession {
        &self.inner.session
    }

    pub fn store(&self) -> &Arc<LargeObjectStore> {
        &self.inner.store
    }

    /// Define the `largebinary*` globals in the guest. Runs once per
    /// environment; later calls return immediately.
    pub fn install(&self) -> Result<(), OpError> {
        self.inner.installed.get_or_try_init(|| {
            let weak = Arc::downgrade(&self.inner);
            let defs: [(&str, fn(&Inner, &[GuestValue]) -> Result<GuestValue, GuestError>); 7] = [
                (LARGEBINARY, Inner::largebinary),
                (LARGEBINARY_OPEN_READ, Inner::open_read),
                (LARGEBINARY_OPEN_WRITE, Inner::open_write),
                (LARGEBINARY_READ, Inner::read),
                (LARGEBINARY_READLINE, Inner::read_line),
                (LARGEBINARY_WRITE, Inner::write),
                (LARGEBINARY_CLOSE, Inner::close),
            ];
            for (name, body) in defs {
                self.inner.session.define(name, host_function(weak.clone(), body))?;
            }
            tracing::debug!(runtime = self.inner.session.runtime_name(), "installed large-object API");
            Ok::<(), OpError>(())
        })?;
        Ok(())
    }

    /// Streams guest code opened and has not released yet.
    pub fn open_streams(&self) -> usize {
        self.inner.table().streams.len()
    }

    /// Close every stream still held for guest code. Writers that were never
    /// closed are discarded, not uploaded.
    pub fn release_streams(&self) {
        let drained: Vec<(StreamId, OpenStream)> = self.inner.table().streams.drain().collect();
        for (id, stream) in drained {
            match stream {
                OpenStream::Reader(mut r) => r.close(),
                OpenStream::Writer(mut w) => {
                    if !w.closed() {
                        tracing::warn!(stream = %id, uri = %w.reference(), "discarding unclosed large-object writer");
                        w.discard();
                    }
                }
            }
        }
    }

    /// Release streams when the returned guard goes out of scope.
    pub fn stream_scope(&self) -> StreamScope<'_> {
        StreamScope { env: self }
    }
}

impl std::fmt::Debug for UdfEnv {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UdfEnv")
            .field("session", &self.inner.session)
            .field("open_streams", &self.open_streams())
            .finish()
    }
}

pub struct StreamScope<'a> {
    env: &'a UdfEnv,
}

impl Drop for StreamScope<'_> {
    fn drop(&mut self) {
        self.env.release_streams();
    }
}

fn host_function(
    weak: Weak<Inner>,
    body: fn(&Inner, &[GuestValue]) -> Result<GuestValue, GuestError>,
) -> HostFunction {
    Arc::new(move |args: &[GuestValue]| {
        let inner = weak
            .upgrade()
            .ok_or_else(|| GuestError::Call("large-object environment is gone".into()))?;
        body(&inner, args)
    })
}

fn host_err(e: impl Display) -> GuestError {
    GuestError::Call(e.to_string())
}

fn handle(id: StreamId, mode: &str, reference: &LargeObjectRef) -> GuestValue {
    GuestValue::List(GuestList::named(vec![
        (HANDLE_ID.into(), GuestValue::Integer64(vec![Some(id.get() as i64)])),
        (HANDLE_MODE.into(), GuestValue::character(mode)),
        (HANDLE_URI.into(), GuestValue::character(reference.uri())),
    ]))
}

fn stream_id(args: &[GuestValue]) -> Result<StreamId, GuestError> {
    let id = match args.first() {
        Some(GuestValue::List(list)) => list.get(HANDLE_ID).and_then(GuestValue::as_i64),
        _ => None,
    };
    id.filter(|v| *v >= 0)
        .map(|v| StreamId::new(v as u64))
        .ok_or_else(|| GuestError::Call("expected a large-object stream handle".into()))
}

impl Inner {
    fn table(&self) -> MutexGuard<'_, StreamTable> {
        self.streams.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn reference(&self, arg: Option<&GuestValue>) -> Result<LargeObjectRef, GuestError> {
        match arg {
            Some(GuestValue::LargeObject(r)) => Ok(r.clone()),
            Some(v @ GuestValue::Character(_)) => match v.as_str() {
                Some(uri) => self.store.bind(uri).map_err(host_err),
                None => Err(GuestError::Call("URI must be a single string".into())),
            },
            Some(other) => Err(GuestError::Call(format!(
                "expected a largebinary or URI string, got {}",
                other.type_name()
            ))),
            None => Err(GuestError::Call("missing large-object reference".into())),
        }
    }

    fn register(&self, stream: OpenStream) -> StreamId {
        let mut table = self.table();
        table.next_id += 1;
        let id = StreamId::new(table.next_id);
        table.streams.insert(id, stream);
        id
    }

    fn with_stream<T>(
        &self,
        args: &[GuestValue],
        f: impl FnOnce(&mut OpenStream) -> Result<T, GuestError>,
    ) -> Result<T, GuestError> {
        let id = stream_id(args)?;
        let mut table = self.table();
        let stream = table
            .streams
            .get_mut(&id)
            .ok_or_else(|| GuestError::Call(format!("unknown large-object stream {id}")))?;
        f(stream)
    }

    fn largebinary(&self, args: &[GuestValue]) -> Result<GuestValue, GuestError> {
        let reference = match args.first() {
            None | Some(GuestValue::Null) => self.store.mint().map_err(host_err)?,
            arg => self.reference(arg)?,
        };
        Ok(GuestValue::LargeObject(reference))
    }

    fn open_read(&self, args: &[GuestValue]) -> Result<GuestValue, GuestError> {
        let reference = self.reference(args.first())?;
        let reader = self.store.open_read(&reference).map_err(host_err)?;
        let id = self.register(OpenStream::Reader(reader));
        Ok(handle(id, "rb", &reference))
    }

    fn open_write(&self, args: &[GuestValue]) -> Result<GuestValue, GuestError> {
        let reference = self.reference(args.first())?;
        let writer = self.store.open_write(&reference).map_err(host_err)?;
        let id = self.register(OpenStream::Writer(writer));
        Ok(handle(id, "wb", &reference))
    }

    fn read(&self, args: &[GuestValue]) -> Result<GuestValue, GuestError> {
        let n = args.get(1).and_then(GuestValue::as_i64).unwrap_or(-1);
        self.with_stream(args, |stream| match stream {
            OpenStream::Reader(r) => r.read(n).map(GuestValue::Raw).map_err(host_err),
            OpenStream::Writer(_) => Err(GuestError::Call("stream is not readable".into())),
        })
    }

    fn read_line(&self, args: &[GuestValue]) -> Result<GuestValue, GuestError> {
        self.with_stream(args, |stream| match stream {
            OpenStream::Reader(r) => match r.read_line().map_err(host_err)? {
                Some(line) => Ok(GuestValue::character(line)),
                None => Ok(GuestValue::Character(Vec::new())),
            },
            OpenStream::Writer(_) => Err(GuestError::Call("stream is not readable".into())),
        })
    }

    fn write(&self, args: &[GuestValue]) -> Result<GuestValue, GuestError> {
        let data: &[u8] = match args.get(1) {
            Some(GuestValue::Raw(bytes)) => bytes,
            Some(v @ GuestValue::Character(_)) => v
                .as_str()
                .map(str::as_bytes)
                .ok_or_else(|| GuestError::Call("can only write a single string".into()))?,
            Some(other) => {
                return Err(GuestError::Call(format!(
                    "can only write raw vectors or strings, got {}",
                    other.type_name()
                )))
            }
            None => return Err(GuestError::Call("nothing to write".into())),
        };
        self.with_stream(args, |stream| match stream {
            OpenStream::Writer(w) => w
                .write(data)
                .map(|n| GuestValue::Double(vec![Some(n as f64)]))
                .map_err(host_err),
            OpenStream::Reader(_) => Err(GuestError::Call("stream is not writable".into())),
        })
    }

    fn close(&self, args: &[GuestValue]) -> Result<GuestValue, GuestError> {
        self.with_stream(args, |stream| match stream {
            OpenStream::Reader(r) => {
                r.close();
                Ok(GuestValue::Null)
            }
            OpenStream::Writer(w) => w.close().map(|_| GuestValue::Null).map_err(host_err),
        })
    }
}
