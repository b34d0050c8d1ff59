//! The guest runtime trait.

use std::sync::Arc;

use rudf_core::guest::GuestValue;

use crate::error::Result;

/// Host code exposed to the guest under a global name.
pub type HostFunction = Arc<dyn Fn(&[GuestValue]) -> Result<GuestValue> + Send + Sync>;

/// An embedded guest interpreter.
///
/// Invariants:
/// - `eval` of user source yields the value of the last expression; for UDF
///   source that is the user's function.
/// - `call` must accept any `GuestValue::Function` produced by this runtime
///   and reject other values with `GuestError::NotCallable`.
/// - `define` replaces an existing global of the same name.
/// - `release` is a hint that a function value will not be called again;
///   runtimes that track closures may free it.
///
/// Implementations need not be reentrant: callers go through `GuestSession`,
/// which holds the process-wide guest lock for the duration of each call.
pub trait GuestRuntime: Send + Sync {
    /// Human-readable runtime name (stable).
    fn name(&self) -> &str;

    fn eval(&self, source: &str) -> Result<GuestValue>;

    fn call(&self, function: &GuestValue, args: &[GuestValue]) -> Result<GuestValue>;

    fn define(&self, name: &str, function: HostFunction) -> Result<()>;

    fn release(&self, _function: &GuestValue) {}
}
