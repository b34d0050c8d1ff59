//! Table-shaped adapters: one call per table, one data frame back.

use rudf_core::guest::{GuestFrame, GuestValue};
use rudf_core::types::Table;
use rudf_marshal::{detect_large_object_columns, table_from_guest_with, table_to_guest};

use super::{load_udf, port_arg};
use crate::env::UdfEnv;
use crate::traits::{OpError, Operator, Port, TableOperator, TableSource};

/// Accept what `as.data.frame` would: a data frame, or a fully named list
/// of columns.
fn into_frame(value: GuestValue) -> Result<GuestValue, OpError> {
    match value {
        GuestValue::DataFrame(_) => Ok(value),
        GuestValue::List(list) if list.names.is_some() => {
            let names = list.names.unwrap_or_default();
            Ok(GuestValue::DataFrame(GuestFrame::new(
                names.into_iter().zip(list.values).collect(),
            )))
        }
        other => Err(OpError::Exec(format!(
            "table function must return a data.frame, got {}",
            other.type_name()
        ))),
    }
}

/// Table in, table out: calls `fn(frame, port)` per input table.
#[derive(Debug)]
pub struct TableUdf {
    env: UdfEnv,
    function: GuestValue,
}

impl TableUdf {
    pub fn new(env: UdfEnv, source: &str) -> Result<Self, OpError> {
        let function = load_udf(&env, source)?;
        Ok(Self { env, function })
    }

    pub fn env(&self) -> &UdfEnv {
        &self.env
    }
}

impl Operator for TableUdf {
    fn name(&self) -> &'static str {
        "table_udf"
    }

    fn is_source(&self) -> bool {
        false
    }
}

impl TableOperator for TableUdf {
    fn process_table(&self, table: &Table, port: Port) -> Result<Table, OpError> {
        tracing::debug!(
            port,
            rows = table.num_rows(),
            columns = table.num_columns(),
            "invoking table function"
        );
        let input_large_objects = detect_large_object_columns(table);
        let frame = table_to_guest(table)?;
        let _scope = self.env.stream_scope();
        let result = self
            .env
            .session()
            .call(&self.function, &[frame, port_arg(port)?])?;
        Ok(table_from_guest_with(&into_frame(result)?, &input_large_objects)?)
    }
}

/// No input, one table out: calls `fn()` once per `produce_table`.
#[derive(Debug)]
pub struct TableSourceUdf {
    env: UdfEnv,
    function: GuestValue,
}

impl TableSourceUdf {
    pub fn new(env: UdfEnv, source: &str) -> Result<Self, OpError> {
        let function = load_udf(&env, source)?;
        Ok(Self { env, function })
    }

    pub fn env(&self) -> &UdfEnv {
        &self.env
    }
}

impl Operator for TableSourceUdf {
    fn name(&self) -> &'static str {
        "table_source_udf"
    }

    fn is_source(&self) -> bool {
        true
    }
}

impl TableSource for TableSourceUdf {
    fn produce_table(&self) -> Result<Table, OpError> {
        tracing::debug!("invoking table source");
        let _scope = self.env.stream_scope();
        let result = self.env.session().call(&self.function, &[])?;
        Ok(table_from_guest_with(&into_frame(result)?, &[])?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use rudf_core::guest::GuestList;
    use rudf_core::large_object::LargeObjectRef;
    use rudf_core::types::{Column, Value};
    use rudf_guest::{GuestError, GuestSession, NativeRuntime};
    use rudf_io::LargeObjectStore;

    fn env_with(runtime: &Arc<NativeRuntime>) -> UdfEnv {
        let store = Arc::new(LargeObjectStore::in_memory().unwrap());
        UdfEnv::new(GuestSession::new(runtime.clone()), store)
    }

    #[test]
    fn test_table_udf_adds_column() {
        let rt = Arc::new(NativeRuntime::new());
        rt.register("with_double", |_, args| {
            let GuestValue::DataFrame(frame) = &args[0] else {
                return Err(GuestError::Call("expected a data.frame".into()));
            };
            let Some(GuestValue::Integer(xs)) = frame.column("x") else {
                return Err(GuestError::Call("missing x".into()));
            };
            let doubled = xs.iter().map(|x| x.map(|v| v * 2)).collect();
            let mut out = frame.clone();
            out.columns.push(("x2".into(), GuestValue::Integer(doubled)));
            Ok(GuestValue::DataFrame(out))
        });
        let udf = TableUdf::new(env_with(&rt), "with_double").unwrap();
        let table = Table::new(vec![Column::new("x", vec![Value::I32(1), Value::I32(2)])]);
        let out = udf.process_table(&table, 0).unwrap();
        assert_eq!(out.column_names(), vec!["x", "x2"]);
        assert_eq!(out.column("x2").unwrap().values, vec![Value::I32(2), Value::I32(4)]);
    }

    #[test]
    fn test_large_object_columns_survive_identity() {
        let rt = Arc::new(NativeRuntime::new());
        rt.register("identity", |_, args| Ok(args[0].clone()));
        let udf = TableUdf::new(env_with(&rt), "identity").unwrap();
        let lob = |u: &str| Value::LargeObject(LargeObjectRef::bind(u).unwrap());
        let table = Table::new(vec![Column::new(
            "blob",
            vec![lob("s3://b/1"), Value::Null, lob("s3://b/2")],
        )]);
        let out = udf.process_table(&table, 0).unwrap();
        assert_eq!(out.columns, table.columns);
    }

    #[test]
    fn test_table_source_accepts_named_list() {
        let rt = Arc::new(NativeRuntime::new());
        rt.register("make", |_, _| {
            Ok(GuestValue::List(GuestList::named(vec![
                ("id".into(), GuestValue::Integer(vec![Some(1), Some(2), Some(3)])),
                (
                    "name".into(),
                    GuestValue::Character(vec![Some("a".into()), Some("b".into()), None]),
                ),
            ])))
        });
        let udf = TableSourceUdf::new(env_with(&rt), "make").unwrap();
        assert!(udf.is_source());
        let table = udf.produce_table().unwrap();
        assert_eq!(table.num_rows(), 3);
        assert_eq!(table.column("name").unwrap().values[2], Value::Null);
    }

    #[test]
    fn test_table_function_must_return_a_frame() {
        let rt = Arc::new(NativeRuntime::new());
        rt.register("scalar", |_, _| Ok(GuestValue::integer(1)));
        let udf = TableSourceUdf::new(env_with(&rt), "scalar").unwrap();
        assert!(matches!(udf.produce_table(), Err(OpError::Exec(_))));
    }

    #[test]
    fn test_streams_released_after_call() {
        let rt = Arc::new(NativeRuntime::new());
        rt.register("leaky", |rt, _| {
            let r = rt.call_global("largebinary", &[])?;
            rt.call_global("largebinary_open_write", &[r])?;
            Ok(GuestValue::DataFrame(GuestFrame::default()))
        });
        let udf = TableSourceUdf::new(env_with(&rt), "leaky").unwrap();
        let table = udf.produce_table().unwrap();
        assert_eq!(table.num_columns(), 0);
        assert_eq!(udf.env().open_streams(), 0);
    }
}
