#![forbid(unsafe_code)]
//! rudf: run user-defined R functions as dataflow operators.
//!
//! This crate re-exports the workspace members:
//! - `rudf_core`: rows, tables, schemas, guest values, storage config.
//! - `rudf_guest`: the guest runtime contract and the guest lock.
//! - `rudf_io`: large-object storage.
//! - `rudf_marshal`: row/table marshalling across the guest boundary.
//! - `rudf_operators`: the execution adapters.

pub use rudf_core;
pub use rudf_guest;
pub use rudf_io;
pub use rudf_marshal;
pub use rudf_operators;

pub mod prelude {
    pub use rudf_core::prelude::*;
    pub use rudf_guest::{GuestError, GuestRuntime, GuestSession, NativeRuntime};
    pub use rudf_io::LargeObjectStore;
    pub use rudf_operators::{
        OpError, Operator, RowSource, RowSourceUdf, RowStream, RowUdf, TableOperator,
        TableSource, TableSourceUdf, TableUdf, TupleOperator, UdfEnv,
    };
}
