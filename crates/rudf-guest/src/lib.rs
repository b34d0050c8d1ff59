#![forbid(unsafe_code)]
//! rudf-guest: the contract between rudf and the embedded guest runtime.
//!
//! A guest runtime evaluates user source text into callables and invokes
//! them with `GuestValue` arguments. Everything here is synchronous; the
//! `GuestSession` wrapper serialises all calls through one process-wide lock
//! because embedded interpreters are single-threaded.
//!
//! rudf does not link an R interpreter. The embedding host supplies one by
//! implementing `GuestRuntime` over its own bindings and handing it to
//! `GuestSession::new`. `NativeRuntime` resolves source text as the name of
//! a registered host closure; it backs hosts without an interpreter and the
//! test suites.

pub mod error;
pub mod native;
pub mod runtime;
pub mod session;

pub use error::{GuestError, Result};
pub use native::NativeRuntime;
pub use runtime::{GuestRuntime, HostFunction};
pub use session::GuestSession;
