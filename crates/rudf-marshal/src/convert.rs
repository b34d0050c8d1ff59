//! Scalar conversion between guest vectors and native values.
//!
//! Only length-1 vectors become native scalars. Every other shape is handed
//! back as `Value::Guest` untouched; downstream validation decides what to do
//! with it.

use chrono::{DateTime, Utc};
use rudf_core::guest::GuestValue;
use rudf_core::types::Value;

/// Time zone attached to date-time vectors built from native timestamps.
pub const UTC_TZ: &str = "UTC";

/// Guest value -> native scalar.
pub fn to_native(value: &GuestValue) -> Value {
    match value {
        GuestValue::Null => Value::Null,
        GuestValue::Logical(v) if v.len() == 1 => v[0].map_or(Value::Null, Value::Bool),
        GuestValue::Integer(v) if v.len() == 1 => v[0].map_or(Value::Null, Value::I32),
        GuestValue::Integer64(v) if v.len() == 1 => v[0].map_or(Value::Null, Value::I64),
        GuestValue::Double(v) if v.len() == 1 => v[0].map_or(Value::Null, Value::F64),
        GuestValue::DateTime { seconds, .. } if !seconds.is_empty() => match seconds[0] {
            None => Value::Null,
            Some(s) => match timestamp_from_seconds(s) {
                Some(ts) => Value::Timestamp(ts),
                None => Value::Guest(value.clone()),
            },
        },
        GuestValue::Character(v) if v.len() == 1 => {
            v[0].clone().map_or(Value::Null, Value::Str)
        }
        GuestValue::Raw(bytes) => Value::Bin(bytes.clone()),
        GuestValue::LargeObject(r) => Value::LargeObject(r.clone()),
        other => Value::Guest(other.clone()),
    }
}

/// Native scalar -> length-1 guest vector.
pub fn to_guest(value: &Value) -> GuestValue {
    match value {
        Value::Null => GuestValue::Null,
        Value::Bool(b) => GuestValue::logical(*b),
        Value::I32(i) => GuestValue::integer(*i),
        Value::I64(i) => GuestValue::Integer64(vec![Some(*i)]),
        Value::F64(f) => GuestValue::double(*f),
        Value::Str(s) => GuestValue::character(s.clone()),
        Value::Bin(b) => GuestValue::Raw(b.clone()),
        Value::Timestamp(ts) => GuestValue::DateTime {
            seconds: vec![Some(seconds_from_timestamp(ts))],
            tz: Some(UTC_TZ.to_string()),
        },
        Value::LargeObject(r) => GuestValue::character(r.uri()),
        Value::Guest(g) => g.clone(),
    }
}

/// Seconds since the epoch, rounded to whole microseconds.
pub fn timestamp_from_seconds(seconds: f64) -> Option<DateTime<Utc>> {
    if !seconds.is_finite() {
        return None;
    }
    let micros = (seconds * 1_000_000.0).round();
    if micros < i64::MIN as f64 || micros > i64::MAX as f64 {
        return None;
    }
    DateTime::from_timestamp_micros(micros as i64)
}

pub fn seconds_from_timestamp(ts: &DateTime<Utc>) -> f64 {
    ts.timestamp_micros() as f64 / 1_000_000.0
}
