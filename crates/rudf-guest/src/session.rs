//! Serialised access to the guest runtime.

use std::sync::{Arc, Mutex, MutexGuard};

use rudf_core::guest::GuestValue;

use crate::error::{GuestError, Result};
use crate::runtime::{GuestRuntime, HostFunction};

/// Only one guest call may be in flight per process, whichever operator
/// instance issues it.
static GUEST_LOCK: Mutex<()> = Mutex::new(());

fn guest_lock() -> MutexGuard<'static, ()> {
    // A panic inside an earlier call leaves the runtime usable; the lock only
    // orders calls, it protects no data.
    GUEST_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Cheap-to-clone handle that funnels every call through the guest lock.
#[derive(Clone)]
pub struct GuestSession {
    runtime: Arc<dyn GuestRuntime>,
}

impl GuestSession {
    pub fn new(runtime: Arc<dyn GuestRuntime>) -> Self {
        Self { runtime }
    }

    pub fn runtime_name(&self) -> &str {
        self.runtime.name()
    }

    pub fn eval(&self, source: &str) -> Result<GuestValue> {
        let _guard = guest_lock();
        self.runtime.eval(source)
    }

    pub fn call(&self, function: &GuestValue, args: &[GuestValue]) -> Result<GuestValue> {
        let _guard = guest_lock();
        self.runtime.call(function, args)
    }

    pub fn define(&self, name: &str, function: HostFunction) -> Result<()> {
        let _guard = guest_lock();
        self.runtime.define(name, function)
    }

    /// Let the runtime drop a function value that will not be called again.
    pub fn release(&self, function: &GuestValue) {
        let _guard = guest_lock();
        self.runtime.release(function)
    }

    /// Evaluate user source and insist that it produced a callable.
    pub fn load_function(&self, source: &str) -> Result<GuestValue> {
        let value = self.eval(source)?;
        match value {
            GuestValue::Function(id) => {
                tracing::debug!(runtime = self.runtime.name(), function = %id, "loaded user function");
                Ok(value)
            }
            other => Err(GuestError::NotCallable(other.type_name())),
        }
    }
}

impl std::fmt::Debug for GuestSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GuestSession")
            .field("runtime", &self.runtime.name())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use rudf_core::id::FunctionId;

    /// Runtime supplied by an embedding host: one fixed function, counting
    /// releases, and no closure tracking beyond that.
    #[derive(Default)]
    struct HostRuntime {
        released: AtomicUsize,
    }

    impl GuestRuntime for HostRuntime {
        fn name(&self) -> &str {
            "host"
        }

        fn eval(&self, source: &str) -> Result<GuestValue> {
            match source {
                "function(x) x" => Ok(GuestValue::Function(FunctionId::new(1))),
                "42" => Ok(GuestValue::integer(42)),
                other => Err(GuestError::Eval(format!("cannot parse: {other}"))),
            }
        }

        fn call(&self, function: &GuestValue, args: &[GuestValue]) -> Result<GuestValue> {
            match function {
                GuestValue::Function(_) => Ok(args.first().cloned().unwrap_or(GuestValue::Null)),
                other => Err(GuestError::NotCallable(other.type_name())),
            }
        }

        fn define(&self, _name: &str, _function: HostFunction) -> Result<()> {
            Ok(())
        }

        fn release(&self, _function: &GuestValue) {
            self.released.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_host_supplied_runtime_plugs_in() {
        let runtime = Arc::new(HostRuntime::default());
        let session = GuestSession::new(runtime.clone());
        assert_eq!(session.runtime_name(), "host");

        let f = session.load_function("function(x) x").unwrap();
        assert_eq!(session.call(&f, &[GuestValue::integer(7)]).unwrap(), GuestValue::integer(7));
        session.release(&f);
        assert_eq!(runtime.released.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_load_function_rejects_non_callables() {
        let session = GuestSession::new(Arc::new(HostRuntime::default()));
        assert!(matches!(session.load_function("42"), Err(GuestError::NotCallable("integer"))));
        assert!(matches!(session.load_function("x <-"), Err(GuestError::Eval(_))));
    }
}
