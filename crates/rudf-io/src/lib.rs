#![forbid(unsafe_code)]
//! rudf-io: storage for large objects referenced from rows and tables.
//!
//! - `storage`: object-store backends (`memory://`, S3 behind the `s3` feature)
//!   and the retry policy shared by all of them.
//! - `large_object`: `LargeObjectStore`, which mints references and opens
//!   streams against them.
//! - `stream`: sequential, non-seekable reader/writer handles backed by local
//!   staging files.
//!
//! Object-store calls are async; this crate drives them from synchronous code
//! with a private tokio runtime, the same way the guest side expects to call it.

pub mod error;
pub mod large_object;
pub mod storage;
pub mod stream;

pub use error::{Error, Result};
pub use large_object::LargeObjectStore;
pub use storage::{build_backend_from_config, MemoryBackend, ObjectBackend, RetryConfig};
pub use stream::{LargeObjectReader, LargeObjectWriter, PART_SIZE};
