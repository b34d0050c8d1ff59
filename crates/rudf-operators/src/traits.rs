//! The engine's operator contract, as rudf sees it.
//!
//! The engine owns scheduling and port wiring; operators only answer
//! `process_*` / `produce*` calls, one at a time per instance.

use rudf_core::types::{Row, Table};
use rudf_guest::GuestError;
use thiserror::Error;

/// Input port index an item arrived on.
pub type Port = usize;

/// Lazy, finite-or-not, non-restartable sequence of output rows.
pub type RowStream = Box<dyn Iterator<Item = Result<Row, OpError>> + Send>;

#[derive(Debug, Error)]
pub enum OpError {
    /// Raised by user code; passed through as the guest reported it.
    #[error(transparent)]
    Guest(#[from] GuestError),

    #[error("marshalling error: {0}")]
    Marshal(#[from] rudf_marshal::Error),

    #[error("large-object storage error: {0}")]
    Storage(#[from] rudf_io::Error),

    #[error("execution error: {0}")]
    Exec(String),
}

pub trait Operator: Send + Sync {
    /// Human-readable operator name (stable).
    fn name(&self) -> &'static str;

    /// Sources take no input and are driven through `produce`.
    fn is_source(&self) -> bool;
}

pub trait TupleOperator: Operator {
    fn process_tuple(&self, row: &Row, port: Port) -> Result<RowStream, OpError>;
}

pub trait RowSource: Operator {
    fn produce(&self) -> Result<RowStream, OpError>;
}

pub trait TableOperator: Operator {
    fn process_table(&self, table: &Table, port: Port) -> Result<Table, OpError>;
}

pub trait TableSource: Operator {
    fn produce_table(&self) -> Result<Table, OpError>;
}
