//! Convenient re-exports for downstream crates.

pub use crate::config::StorageConfig;
pub use crate::error::{Error, Result};
pub use crate::guest::{GuestFrame, GuestList, GuestValue, EXHAUSTED_SYMBOL};
pub use crate::id::{FunctionId, StreamId};
pub use crate::large_object::{is_large_object_uri, LargeObjectRef, URI_SCHEME_PREFIX};
pub use crate::schema::{DataType, Field, FieldCategory, Schema, SchemaRef};
pub use crate::types::{Column, Row, Table, Value};
