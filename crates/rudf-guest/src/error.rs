use thiserror::Error;

pub type Result<T> = std::result::Result<T, GuestError>;

/// Failures raised by or inside the guest runtime. Adapters surface these to
/// the engine unchanged.
#[derive(Debug, Error)]
pub enum GuestError {
    #[error("guest evaluation failed: {0}")]
    Eval(String),

    #[error("guest call failed: {0}")]
    Call(String),

    #[error("attempt to apply non-function ({0})")]
    NotCallable(&'static str),

    #[error("object '{0}' not found")]
    UnknownObject(String),
}
