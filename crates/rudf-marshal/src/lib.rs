#![forbid(unsafe_code)]
//! rudf-marshal: moving rows and tables across the guest boundary.
//!
//! - `convert`: scalar conversion in both directions (the Value Converter).
//! - `binary`: the envelope opaque guest payloads travel in as bytes.
//! - `interchange`: the Arrow bridge (schemas, arrays, record batches).
//! - `row`: `Row` <-> guest record, including the end-of-stream check.
//! - `table`: `Table` <-> guest data frame with large-object detection.
//!
//! Field categories decide the route: plain fields go through Arrow, binary
//! and large-object fields are carried by hand.

pub mod binary;
pub mod convert;
pub mod error;
pub mod interchange;
pub mod row;
pub mod table;

pub use error::{Error, Result};
pub use row::{row_from_guest, row_to_guest, RowLayout};
pub use table::{
    detect_large_object_columns, table_from_guest, table_from_guest_with, table_to_guest,
    LARGE_OBJECT_THRESHOLD,
};
