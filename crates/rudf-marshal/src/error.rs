use arrow::error::ArrowError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("arrow error: {0}")]
    Arrow(#[from] ArrowError),

    #[error(transparent)]
    Core(#[from] rudf_core::Error),

    #[error("unsupported conversion: {0}")]
    Unsupported(String),

    #[error("shape mismatch: {0}")]
    Shape(String),
}
