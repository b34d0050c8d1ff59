#![forbid(unsafe_code)]
//! rudf-core: the data model shared by every rudf crate.
//!
//! - `schema`: fields, data types and the large-object metadata tag.
//! - `types`: native `Value`, `Row` and column-major `Table`.
//! - `guest`: the guest runtime's value model (`GuestValue`).
//! - `large_object`: `LargeObjectRef`, the `s3://` content-location handle.
//! - `config`: process-wide object-storage configuration.
//!
//! No Arrow, async runtime or object-store IO lives here.

pub mod config;
pub mod error;
pub mod guest;
pub mod id;
pub mod large_object;
pub mod prelude;
pub mod schema;
pub mod types;

pub use error::{Error, Result};
