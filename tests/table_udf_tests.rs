use std::sync::Arc;

use chrono::DateTime;
use rudf::prelude::*;
use rudf::rudf_operators::env::{LARGEBINARY, LARGEBINARY_CLOSE, LARGEBINARY_OPEN_WRITE, LARGEBINARY_WRITE};

fn env_with(rt: &Arc<NativeRuntime>) -> UdfEnv {
    let store = Arc::new(LargeObjectStore::in_memory().unwrap());
    UdfEnv::new(GuestSession::new(rt.clone()), store)
}

fn identity_udf() -> TableUdf {
    let rt = Arc::new(NativeRuntime::new());
    rt.register("identity", |_, args| Ok(args[0].clone()));
    TableUdf::new(env_with(&rt), "identity").unwrap()
}

#[test]
fn test_identity_keeps_scalar_columns() {
    let ts = DateTime::from_timestamp_micros(1_700_000_000_000_001).unwrap();
    let table = Table::new(vec![
        Column::new("flag", vec![Value::Bool(true), Value::Null]),
        Column::new("n", vec![Value::I64(1 << 40), Value::I64(-1)]),
        Column::new("score", vec![Value::F64(0.5), Value::F64(1.25)]),
        Column::new("name", vec![Value::Str("a".into()), Value::Null]),
        Column::new("at", vec![Value::Timestamp(ts), Value::Null]),
        Column::new("payload", vec![Value::Bin(vec![1, 2, 3]), Value::Bin(vec![])]),
    ]);
    let out = identity_udf().process_table(&table, 0).unwrap();
    assert_eq!(out.column_names(), table.column_names());
    assert_eq!(out.columns, table.columns);
}

#[test]
fn test_uri_heavy_string_column_comes_back_as_references() {
    let values = (0..10)
        .map(|i| {
            if i < 8 {
                Value::Str(format!("s3://bkt/objects/{i}/k"))
            } else {
                Value::Str(format!("note-{i}"))
            }
        })
        .collect();
    let table = Table::new(vec![Column::new("c", values)]);
    let out = identity_udf().process_table(&table, 0).unwrap();

    let col = out.column("c").unwrap();
    assert_eq!(
        col.values[0],
        Value::LargeObject(LargeObjectRef::bind("s3://bkt/objects/0/k").unwrap())
    );
    assert_eq!(col.values[9], Value::Str("note-9".into()));
    let schema = out.schema.unwrap();
    assert!(schema.field_named("c").unwrap().is_large_object());
}

#[test]
fn test_plain_string_column_stays_plain() {
    let table = Table::new(vec![Column::new(
        "c",
        vec![Value::Str("x".into()), Value::Str("s3://bkt/k".into())],
    )]);
    let out = identity_udf().process_table(&table, 0).unwrap();
    assert_eq!(out.columns, table.columns);
}

#[test]
fn test_source_frame_of_written_objects() {
    let rt = Arc::new(NativeRuntime::new());
    rt.register("blobs", |rt, _| {
        let mut uris = Vec::new();
        for body in ["one", "two"] {
            let r = rt.call_global(LARGEBINARY, &[])?;
            let w = rt.call_global(LARGEBINARY_OPEN_WRITE, &[r.clone()])?;
            rt.call_global(LARGEBINARY_WRITE, &[w.clone(), GuestValue::character(body)])?;
            rt.call_global(LARGEBINARY_CLOSE, &[w])?;
            let GuestValue::LargeObject(reference) = r else {
                return Err(GuestError::Call("expected a reference".into()));
            };
            uris.push(Some(reference.into_uri()));
        }
        Ok(GuestValue::DataFrame(GuestFrame::new(vec![
            ("id".into(), GuestValue::Integer(vec![Some(1), Some(2)])),
            ("blob".into(), GuestValue::Character(uris)),
        ])))
    });
    let udf = TableSourceUdf::new(env_with(&rt), "blobs").unwrap();
    let table = udf.produce_table().unwrap();
    assert_eq!(table.num_rows(), 2);

    let store = udf.env().store();
    let mut bodies = Vec::new();
    for value in &table.column("blob").unwrap().values {
        let Value::LargeObject(reference) = value else {
            panic!("expected a reference, got {value:?}");
        };
        bodies.push(store.open_read(reference).unwrap().read(-1).unwrap());
    }
    assert_eq!(bodies, vec![b"one".to_vec(), b"two".to_vec()]);
}

#[test]
fn test_guest_errors_surface_from_table_udf() {
    let rt = Arc::new(NativeRuntime::new());
    rt.register("fails", |_, _| Err(GuestError::Call("bad input".into())));
    let udf = TableUdf::new(env_with(&rt), "fails").unwrap();
    let table = Table::new(vec![Column::new("x", vec![Value::I32(1)])]);
    let err = udf.process_table(&table, 0).unwrap_err();
    assert!(err.to_string().contains("bad input"));
}
