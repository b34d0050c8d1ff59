use thiserror::Error;

/// Result type local to rudf-io.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid large-object reference: {0}")]
    InvalidReference(String),

    #[error("I/O operation on closed stream")]
    StreamClosed,

    #[error("failed to upload to object storage: {0}")]
    Upload(String),

    #[error("failed to download from object storage: {0}")]
    Download(String),

    #[error("bucket '{0}' already exists")]
    BucketExists(String),

    #[error("object storage error: {0}")]
    Storage(String),

    #[error("invalid storage configuration: {0}")]
    Config(String),

    #[error("staging file error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<rudf_core::Error> for Error {
    fn from(e: rudf_core::Error) -> Self {
        match e {
            rudf_core::Error::InvalidReference(msg) => Error::InvalidReference(msg),
            other => Error::Config(other.to_string()),
        }
    }
}
