use std::result::Result;
use std::sync::Arc;

use rudf::prelude::*;
use rudf::rudf_operators::env::{LARGEBINARY, LARGEBINARY_CLOSE, LARGEBINARY_OPEN_WRITE, LARGEBINARY_WRITE};

fn env_with(rt: &Arc<NativeRuntime>) -> UdfEnv {
    let store = Arc::new(LargeObjectStore::in_memory().unwrap());
    UdfEnv::new(GuestSession::new(rt.clone()), store)
}

fn lob(uri: &str) -> Value {
    Value::LargeObject(LargeObjectRef::bind(uri).unwrap())
}

fn record(entries: Vec<(&str, GuestValue)>) -> GuestValue {
    GuestValue::List(GuestList::named(
        entries.into_iter().map(|(k, v)| (k.to_string(), v)).collect(),
    ))
}

#[test]
fn test_echo_row_round_trips_every_field_kind() {
    let rt = Arc::new(NativeRuntime::new());
    rt.register("echo", |rt, args| Ok(rt.generator(vec![args[0].clone()])));
    let udf = RowUdf::new(env_with(&rt), "echo").unwrap();

    let row = Row::from_pairs(vec![
        ("a".into(), Value::I32(1)),
        ("b".into(), Value::Bin(vec![0xde, 0xad, 0xbe, 0xef])),
        ("c".into(), lob("s3://bkt/objects/1/x")),
    ])
    .unwrap();
    let out: Vec<Row> = udf
        .process_tuple(&row, 0)
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();

    assert_eq!(out.len(), 1);
    assert_eq!(out[0], row);
    assert!(out[0].schema().field_named("c").unwrap().is_large_object());
}

#[test]
fn test_port_is_passed_to_the_function() {
    let rt = Arc::new(NativeRuntime::new());
    rt.register("tag_port", |rt, args| {
        let port = args[1].clone();
        Ok(rt.generator(vec![record(vec![("port", port)])]))
    });
    let udf = RowUdf::new(env_with(&rt), "tag_port").unwrap();
    let row = Row::from_pairs(vec![("x".into(), Value::Null)]).unwrap();
    let out: Vec<Row> = udf
        .process_tuple(&row, 3)
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(out[0].get("x"), Some(&Value::Null));
    assert_eq!(out[0].get("port"), Some(&Value::I32(3)));
}

#[test]
fn test_source_yields_three_records_then_stops() {
    let rt = Arc::new(NativeRuntime::new());
    rt.register("three", |rt, _| {
        Ok(rt.generator(
            (1..=3)
                .map(|i| record(vec![("i", GuestValue::integer(i)), ("s", GuestValue::character(format!("r{i}")))]))
                .collect(),
        ))
    });
    let udf = RowSourceUdf::new(env_with(&rt), "three").unwrap();
    assert!(udf.is_source());

    let out: Vec<Row> = udf.produce().unwrap().collect::<Result<_, _>>().unwrap();
    assert_eq!(out.len(), 3);
    for (i, row) in out.iter().enumerate() {
        assert_eq!(row.field_names(), vec!["i", "s"]);
        assert_eq!(row.get("i"), Some(&Value::I32(i as i32 + 1)));
        assert_eq!(row.get("s"), Some(&Value::Str(format!("r{}", i + 1))));
    }
}

#[test]
fn test_source_strings_that_look_like_uris_become_references() {
    let rt = Arc::new(NativeRuntime::new());
    rt.register("refs", |rt, _| {
        Ok(rt.generator(vec![record(vec![("obj", GuestValue::character("s3://bkt/k"))])]))
    });
    let udf = RowSourceUdf::new(env_with(&rt), "refs").unwrap();
    let out: Vec<Row> = udf.produce().unwrap().collect::<Result<_, _>>().unwrap();
    assert_eq!(out[0].get("obj"), Some(&lob("s3://bkt/k")));
}

#[test]
fn test_guest_written_object_is_readable_from_the_host() {
    let rt = Arc::new(NativeRuntime::new());
    rt.register("writer", |rt, _| {
        let r = rt.call_global(LARGEBINARY, &[])?;
        let w = rt.call_global(LARGEBINARY_OPEN_WRITE, &[r.clone()])?;
        rt.call_global(LARGEBINARY_WRITE, &[w.clone(), GuestValue::character("payload")])?;
        rt.call_global(LARGEBINARY_CLOSE, &[w])?;
        Ok(rt.generator(vec![record(vec![("obj", r)])]))
    });
    let udf = RowSourceUdf::new(env_with(&rt), "writer").unwrap();
    let out: Vec<Row> = udf.produce().unwrap().collect::<Result<_, _>>().unwrap();

    let Some(Value::LargeObject(reference)) = out[0].get("obj") else {
        panic!("expected a large-object reference");
    };
    let store = udf.env().store();
    assert!(store.exists(reference).unwrap());
    let mut reader = store.open_read(reference).unwrap();
    assert_eq!(reader.read(-1).unwrap(), b"payload");
    assert_eq!(udf.env().open_streams(), 0);
}

#[test]
fn test_empty_record_ends_the_stream() {
    let rt = Arc::new(NativeRuntime::new());
    rt.register("short", |rt, _| {
        Ok(rt.generator(vec![
            record(vec![("x", GuestValue::integer(1))]),
            GuestValue::List(GuestList::named(vec![])),
            record(vec![("x", GuestValue::integer(2))]),
        ]))
    });
    let udf = RowSourceUdf::new(env_with(&rt), "short").unwrap();
    let out: Vec<Row> = udf.produce().unwrap().collect::<Result<_, _>>().unwrap();
    assert_eq!(out.len(), 1);
}
