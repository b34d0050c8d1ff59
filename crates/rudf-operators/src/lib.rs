#![forbid(unsafe_code)]
//! rudf-operators: guest UDFs behind the engine's operator contract.
//!
//! Four adapters cover the invocation shapes:
//! - `RowUdf`: one input row in, a generator of rows out.
//! - `RowSourceUdf`: no input, a generator of rows out.
//! - `TableUdf`: one table in, one table out.
//! - `TableSourceUdf`: no input, one table out.
//!
//! Each adapter installs the large-object API into the guest (see `env`)
//! before evaluating user code, then drives the marshaller per call.

pub mod adapters;
pub mod env;
pub mod traits;

pub use adapters::{GuestRowStream, RowSourceUdf, RowUdf, TableSourceUdf, TableUdf};
pub use env::UdfEnv;
pub use traits::{OpError, Operator, Port, RowSource, RowStream, TableOperator, TableSource, TupleOperator};
