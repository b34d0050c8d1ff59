//! A guest runtime whose functions are host closures.
//!
//! Hosts that embed rudf without an interpreter register their routines here
//! by name; "source text" is then simply the name of a registered global.
//! The test suites use it to script guest behaviour precisely.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use rudf_core::guest::GuestValue;
use rudf_core::id::FunctionId;

use crate::error::{GuestError, Result};
use crate::runtime::{GuestRuntime, HostFunction};

/// A guest function body. It receives the runtime so it can mint further
/// closures (generators) and call globals.
pub type NativeFn = Arc<dyn Fn(&NativeRuntime, &[GuestValue]) -> Result<GuestValue> + Send + Sync>;

#[derive(Default)]
struct State {
    next_id: u64,
    functions: HashMap<FunctionId, NativeFn>,
    globals: HashMap<String, FunctionId>,
}

#[derive(Default)]
pub struct NativeRuntime {
    state: Mutex<State>,
}

impl NativeRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn insert(&self, f: NativeFn) -> FunctionId {
        let mut state = self.state();
        state.next_id += 1;
        let id = FunctionId::new(state.next_id);
        state.functions.insert(id, f);
        id
    }

    /// Register `f` as a global called `name`, replacing any previous one.
    pub fn register<F>(&self, name: &str, f: F) -> FunctionId
    where
        F: Fn(&NativeRuntime, &[GuestValue]) -> Result<GuestValue> + Send + Sync + 'static,
    {
        let id = self.insert(Arc::new(f));
        self.state().globals.insert(name.to_string(), id);
        id
    }

    /// An anonymous function value.
    pub fn closure<F>(&self, f: F) -> GuestValue
    where
        F: Fn(&NativeRuntime, &[GuestValue]) -> Result<GuestValue> + Send + Sync + 'static,
    {
        GuestValue::Function(self.insert(Arc::new(f)))
    }

    /// A generator closure: each no-argument call yields the next item, then
    /// the exhausted symbol forever.
    pub fn generator(&self, items: Vec<GuestValue>) -> GuestValue {
        let queue = Mutex::new(VecDeque::from(items));
        self.closure(move |_, _| {
            let mut q = queue.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            Ok(q.pop_front().unwrap_or_else(GuestValue::exhausted))
        })
    }

    /// Call a global by name.
    pub fn call_global(&self, name: &str, args: &[GuestValue]) -> Result<GuestValue> {
        let f = self.lookup_global(name)?;
        self.call(&f, args)
    }

    fn lookup_global(&self, name: &str) -> Result<GuestValue> {
        self.state()
            .globals
            .get(name)
            .copied()
            .map(GuestValue::Function)
            .ok_or_else(|| GuestError::UnknownObject(name.to_string()))
    }

    pub fn function_count(&self) -> usize {
        self.state().functions.len()
    }
}

impl GuestRuntime for NativeRuntime {
    fn name(&self) -> &str {
        "native"
    }

    fn eval(&self, source: &str) -> Result<GuestValue> {
        let name = source.trim();
        if name.is_empty() {
            return Err(GuestError::Eval("empty source".into()));
        }
        self.lookup_global(name)
    }

    fn call(&self, function: &GuestValue, args: &[GuestValue]) -> Result<GuestValue> {
        let id = match function {
            GuestValue::Function(id) => *id,
            other => return Err(GuestError::NotCallable(other.type_name())),
        };
        // Clone the body out so it can re-enter the runtime.
        let body = self
            .state()
            .functions
            .get(&id)
            .cloned()
            .ok_or_else(|| GuestError::Call(format!("{id} was released")))?;
        body(self, args)
    }

    fn define(&self, name: &str, function: HostFunction) -> Result<()> {
        self.register(name, move |_, args| function(args));
        Ok(())
    }

    /// Drops anonymous closures; globals stay registered.
    fn release(&self, function: &GuestValue) {
        if let GuestValue::Function(id) = function {
            let mut state = self.state();
            if !state.globals.values().any(|g| g == id) {
                state.functions.remove(id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_eval_resolves_registered_globals() {
        let rt = NativeRuntime::new();
        rt.register("double_it", |_, args| match args.first().and_then(|a| a.as_i64()) {
            Some(v) => Ok(GuestValue::integer((v * 2) as i32)),
            None => Err(GuestError::Call("expected a number".into())),
        });
        let f = rt.eval("  double_it\n").unwrap();
        assert_eq!(rt.call(&f, &[GuestValue::integer(21)]).unwrap(), GuestValue::integer(42));
        assert!(matches!(rt.eval("missing"), Err(GuestError::UnknownObject(_))));
    }

    #[test]
    fn test_generator_yields_then_exhausts() {
        let rt = NativeRuntime::new();
        let gen = rt.generator(vec![GuestValue::integer(1), GuestValue::integer(2)]);
        assert_eq!(rt.call(&gen, &[]).unwrap(), GuestValue::integer(1));
        assert_eq!(rt.call(&gen, &[]).unwrap(), GuestValue::integer(2));
        assert!(rt.call(&gen, &[]).unwrap().is_exhausted_symbol());
        assert!(rt.call(&gen, &[]).unwrap().is_exhausted_symbol());
    }

    #[test]
    fn test_call_rejects_non_functions() {
        let rt = NativeRuntime::new();
        let err = rt.call(&GuestValue::integer(1), &[]).unwrap_err();
        assert!(matches!(err, GuestError::NotCallable("integer")));
    }

    #[test]
    fn test_define_replaces_global() {
        let rt = NativeRuntime::new();
        rt.define("f", Arc::new(|_| Ok(GuestValue::integer(1)))).unwrap();
        rt.define("f", Arc::new(|_| Ok(GuestValue::integer(2)))).unwrap();
        assert_eq!(rt.call_global("f", &[]).unwrap(), GuestValue::integer(2));
    }

    #[test]
    fn test_release_keeps_globals() {
        let rt = NativeRuntime::new();
        rt.register("g", |_, _| Ok(GuestValue::Null));
        let anon = rt.closure(|_, _| Ok(GuestValue::Null));
        assert_eq!(rt.function_count(), 2);
        rt.release(&anon);
        rt.release(&rt.eval("g").unwrap());
        assert_eq!(rt.function_count(), 1);
    }
}
