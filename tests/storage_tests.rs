use std::io::Write;
use std::path::PathBuf;

use rudf::rudf_core::config::StorageConfig;
use rudf::rudf_io::{build_backend_from_config, Error, LargeObjectStore, PART_SIZE};

fn temp_staging_dir(name: &str) -> PathBuf {
    let mut dir = std::env::temp_dir();
    dir.push(format!("rudf-storage-tests-{name}"));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

fn memory_store(name: &str) -> LargeObjectStore {
    let cfg = StorageConfig {
        staging_dir: temp_staging_dir(name),
        ..StorageConfig::in_memory()
    };
    LargeObjectStore::from_config(&cfg).expect("memory store")
}

#[test]
fn test_write_then_read_through_config_built_store() {
    let store = memory_store("roundtrip");
    let reference = store.mint().unwrap();
    assert!(reference.uri().starts_with("s3://udf-large-objects/objects/"));

    let mut writer = store.open_write(&reference).unwrap();
    writer.write(b"hello ").unwrap();
    writer.write(b"world").unwrap();
    writer.close().unwrap();
    assert!(writer.closed());

    let mut reader = store.open_read(&reference).unwrap();
    assert_eq!(reader.read(-1).unwrap(), b"hello world");
}

#[test]
fn test_payload_larger_than_one_part_uploads() {
    let store = memory_store("multipart");
    let reference = store.mint().unwrap();
    let chunk = vec![7u8; 1024 * 1024];

    let mut writer = store.open_write(&reference).unwrap();
    let mut written = 0;
    while written <= PART_SIZE {
        writer.write_all(&chunk).unwrap();
        written += chunk.len();
    }
    writer.close().unwrap();

    let mut reader = store.open_read(&reference).unwrap();
    let body = reader.read(-1).unwrap();
    assert_eq!(body.len(), written);
    assert!(body.iter().all(|b| *b == 7));
}

#[test]
fn test_staging_directory_is_left_clean() {
    let dir = temp_staging_dir("clean");
    let cfg = StorageConfig {
        staging_dir: dir.clone(),
        ..StorageConfig::in_memory()
    };
    let store = LargeObjectStore::from_config(&cfg).unwrap();
    let reference = store.mint().unwrap();

    let mut writer = store.open_write(&reference).unwrap();
    writer.write(b"data").unwrap();
    writer.close().unwrap();
    let mut reader = store.open_read(&reference).unwrap();
    reader.read(2).unwrap();
    reader.close();

    assert_eq!(std::fs::read_dir(&dir).unwrap().count(), 0);
}

#[test]
fn test_reading_a_missing_object_fails() {
    let store = memory_store("missing");
    let reference = store.mint().unwrap();
    assert!(!store.exists(&reference).unwrap());
    assert!(matches!(store.open_read(&reference), Err(Error::Download(_))));
}

#[test]
fn test_invalid_scheme_errors() {
    let cfg = StorageConfig {
        endpoint: "ftp://example.com".into(),
        ..StorageConfig::default()
    };
    let err = build_backend_from_config(&cfg).err().expect("should fail");
    assert!(err.to_string().contains("unsupported storage endpoint scheme"));
}

#[cfg(not(feature = "s3"))]
#[test]
fn test_http_endpoint_without_feature_fails() {
    let err = LargeObjectStore::from_config(&StorageConfig::default())
        .err()
        .expect("feature missing");
    assert!(err.to_string().contains("built without the `s3` feature"));
}

#[cfg(feature = "s3")]
#[test]
fn test_s3_backend_initializes_with_dummy_credentials() {
    let cfg = StorageConfig {
        endpoint: "http://127.0.0.1:1".into(),
        username: "ACCESSKEY123".into(),
        password: "SECRET456".into(),
        ..StorageConfig::default()
    };
    let backend = build_backend_from_config(&cfg).expect("s3 backend");
    assert_eq!(backend.name(), "s3");
}
