//! Arrow interchange bridge.
//!
//! Arrow sits between the native model and the guest for plain data, the
//! way a columnar bridge would between an engine and R:
//!
//! | Arrow            | guest                     |
//! |------------------|---------------------------|
//! | Boolean          | logical                   |
//! | Int32            | integer                   |
//! | Int64            | integer64                 |
//! | Float64          | double                    |
//! | Utf8             | character                 |
//! | Timestamp(µs)    | POSIXct (date-time)       |
//! | Binary           | list of raw vectors       |
//! | Null             | logical, all NA           |
//!
//! Field metadata travels with the Arrow schema so the large-object tag
//! survives a round trip through the bridge.

use std::collections::HashMap;
use std::sync::Arc;

use arrow::array::{
    Array, ArrayRef, BinaryArray, BooleanArray, Float64Array, Int32Array, Int64Array, NullArray,
    StringArray, StructArray, TimestampMicrosecondArray,
};
use arrow::datatypes::{
    DataType as ArrowDataType, Field as ArrowField, Fields, Schema as ArrowSchema, TimeUnit,
};
use arrow::record_batch::{RecordBatch, RecordBatchOptions};
use rudf_core::guest::{GuestFrame, GuestList, GuestValue};
use rudf_core::large_object::{is_large_object_uri, LargeObjectRef};
use rudf_core::schema::{DataType, Field, Schema};
use rudf_core::types::{Column, Table, Value};

use crate::binary;
use crate::convert::{timestamp_from_seconds, UTC_TZ};
use crate::error::{Error, Result};

// ---- schemas ----

pub fn data_type_to_arrow(dt: DataType) -> ArrowDataType {
    match dt {
        DataType::Null => ArrowDataType::Null,
        DataType::Boolean => ArrowDataType::Boolean,
        DataType::Int32 => ArrowDataType::Int32,
        DataType::Int64 => ArrowDataType::Int64,
        DataType::Float64 => ArrowDataType::Float64,
        DataType::Utf8 => ArrowDataType::Utf8,
        DataType::Binary => ArrowDataType::Binary,
        DataType::Timestamp => ArrowDataType::Timestamp(TimeUnit::Microsecond, Some(UTC_TZ.into())),
    }
}

pub fn data_type_from_arrow(dt: &ArrowDataType) -> Result<DataType> {
    Ok(match dt {
        ArrowDataType::Null => DataType::Null,
        ArrowDataType::Boolean => DataType::Boolean,
        ArrowDataType::Int32 => DataType::Int32,
        ArrowDataType::Int64 => DataType::Int64,
        ArrowDataType::Float64 => DataType::Float64,
        ArrowDataType::Utf8 => DataType::Utf8,
        ArrowDataType::Binary => DataType::Binary,
        ArrowDataType::Timestamp(TimeUnit::Microsecond, _) => DataType::Timestamp,
        other => return Err(Error::Unsupported(format!("arrow type {other}"))),
    })
}

pub fn field_to_arrow(field: &Field) -> ArrowField {
    let metadata: HashMap<String, String> = field
        .metadata
        .iter()
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    ArrowField::new(&field.name, data_type_to_arrow(field.data_type), field.nullable)
        .with_metadata(metadata)
}

pub fn field_from_arrow(field: &ArrowField) -> Result<Field> {
    let metadata = field
        .metadata()
        .iter()
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    Ok(
        Field::new(field.name(), data_type_from_arrow(field.data_type())?, field.is_nullable())
            .with_metadata(metadata),
    )
}

pub fn schema_to_arrow(schema: &Schema) -> ArrowSchema {
    ArrowSchema::new(schema.fields.iter().map(field_to_arrow).collect::<Vec<_>>())
}

pub fn schema_from_arrow(schema: &ArrowSchema) -> Result<Schema> {
    let fields = schema
        .fields()
        .iter()
        .map(|f| field_from_arrow(f))
        .collect::<Result<Vec<_>>>()?;
    Ok(Schema::new(fields))
}

// ---- native values <-> arrays ----

fn mismatch(field: &Field, value: &Value) -> Error {
    Error::Shape(format!(
        "field '{}' is {:?} but holds a {:?} value",
        field.name,
        field.data_type,
        value.data_type()
    ))
}

/// Build the Arrow array for one field's values.
pub fn values_to_array(field: &Field, values: &[Value]) -> Result<ArrayRef> {
    let array: ArrayRef = match field.data_type {
        DataType::Null => {
            if let Some(v) = values.iter().find(|v| !v.is_null()) {
                return Err(mismatch(field, v));
            }
            Arc::new(NullArray::new(values.len()))
        }
        DataType::Boolean => {
            let out = values
                .iter()
                .map(|v| match v {
                    Value::Null => Ok(None),
                    Value::Bool(b) => Ok(Some(*b)),
                    other => Err(mismatch(field, other)),
                })
                .collect::<Result<Vec<_>>>()?;
            Arc::new(BooleanArray::from(out))
        }
        DataType::Int32 => {
            let out = values
                .iter()
                .map(|v| match v {
                    Value::Null => Ok(None),
                    Value::I32(i) => Ok(Some(*i)),
                    other => Err(mismatch(field, other)),
                })
                .collect::<Result<Vec<_>>>()?;
            Arc::new(Int32Array::from(out))
        }
        DataType::Int64 => {
            let out = values
                .iter()
                .map(|v| match v {
                    Value::Null => Ok(None),
                    Value::I32(i) => Ok(Some(i64::from(*i))),
                    Value::I64(i) => Ok(Some(*i)),
                    other => Err(mismatch(field, other)),
                })
                .collect::<Result<Vec<_>>>()?;
            Arc::new(Int64Array::from(out))
        }
        DataType::Float64 => {
            let out = values
                .iter()
                .map(|v| match v {
                    Value::Null => Ok(None),
                    Value::I32(i) => Ok(Some(f64::from(*i))),
                    Value::F64(f) => Ok(Some(*f)),
                    other => Err(mismatch(field, other)),
                })
                .collect::<Result<Vec<_>>>()?;
            Arc::new(Float64Array::from(out))
        }
        DataType::Utf8 => {
            let out = values
                .iter()
                .map(|v| match v {
                    Value::Null => Ok(None),
                    Value::Str(s) => Ok(Some(s.clone())),
                    Value::LargeObject(r) => Ok(Some(r.uri().to_string())),
                    other => Err(mismatch(field, other)),
                })
                .collect::<Result<Vec<_>>>()?;
            Arc::new(StringArray::from(out))
        }
        DataType::Binary => {
            let out = values
                .iter()
                .map(|v| match v {
                    Value::Null => Ok(None),
                    Value::Bin(b) => Ok(Some(b.clone())),
                    Value::Guest(g) => binary::encode(g).map(Some),
                    other => Err(mismatch(field, other)),
                })
                .collect::<Result<Vec<_>>>()?;
            Arc::new(BinaryArray::from_iter(out))
        }
        DataType::Timestamp => {
            let out = values
                .iter()
                .map(|v| match v {
                    Value::Null => Ok(None),
                    Value::Timestamp(ts) => Ok(Some(ts.timestamp_micros())),
                    other => Err(mismatch(field, other)),
                })
                .collect::<Result<Vec<_>>>()?;
            Arc::new(TimestampMicrosecondArray::from(out).with_timezone(UTC_TZ))
        }
    };
    Ok(array)
}

fn downcast<'a, T: 'static>(array: &'a dyn Array) -> Result<&'a T> {
    array
        .as_any()
        .downcast_ref::<T>()
        .ok_or_else(|| Error::Unsupported(format!("unexpected array for {}", array.data_type())))
}

/// Read an Arrow array back into native values. Strings in a large-object
/// field that carry a URI come back as references.
pub fn array_to_values(array: &dyn Array, field: &Field) -> Result<Vec<Value>> {
    let n = array.len();
    let values: Vec<Value> = match array.data_type() {
        ArrowDataType::Null => vec![Value::Null; n],
        ArrowDataType::Boolean => downcast::<BooleanArray>(array)?
            .iter()
            .map(|o| o.map_or(Value::Null, Value::Bool))
            .collect(),
        ArrowDataType::Int32 => downcast::<Int32Array>(array)?
            .iter()
            .map(|o| o.map_or(Value::Null, Value::I32))
            .collect(),
        ArrowDataType::Int64 => downcast::<Int64Array>(array)?
            .iter()
            .map(|o| o.map_or(Value::Null, Value::I64))
            .collect(),
        ArrowDataType::Float64 => downcast::<Float64Array>(array)?
            .iter()
            .map(|o| o.map_or(Value::Null, Value::F64))
            .collect(),
        ArrowDataType::Utf8 => {
            let lob = field.is_large_object();
            downcast::<StringArray>(array)?
                .iter()
                .map(|o| match o {
                    None => Ok(Value::Null),
                    Some(s) if lob && is_large_object_uri(s) => {
                        Ok(Value::LargeObject(LargeObjectRef::bind(s)?))
                    }
                    Some(s) => Ok(Value::Str(s.to_string())),
                })
                .collect::<Result<Vec<_>>>()?
        }
        ArrowDataType::Binary => downcast::<BinaryArray>(array)?
            .iter()
            .map(|o| o.map_or(Value::Null, |b| Value::Bin(b.to_vec())))
            .collect(),
        ArrowDataType::Timestamp(TimeUnit::Microsecond, _) => {
            downcast::<TimestampMicrosecondArray>(array)?
                .iter()
                .map(|o| match o {
                    None => Ok(Value::Null),
                    Some(us) => chrono::DateTime::from_timestamp_micros(us)
                        .map(Value::Timestamp)
                        .ok_or_else(|| Error::Shape(format!("timestamp {us}us out of range"))),
                })
                .collect::<Result<Vec<_>>>()?
        }
        other => {
            return Err(Error::Unsupported(format!(
                "arrow type {other} in field '{}'",
                field.name
            )))
        }
    };
    Ok(values)
}

// ---- arrays <-> guest vectors ----

pub fn array_to_guest(array: &dyn Array) -> Result<GuestValue> {
    let value = match array.data_type() {
        ArrowDataType::Null => GuestValue::Logical(vec![None; array.len()]),
        ArrowDataType::Boolean => GuestValue::Logical(downcast::<BooleanArray>(array)?.iter().collect()),
        ArrowDataType::Int32 => GuestValue::Integer(downcast::<Int32Array>(array)?.iter().collect()),
        ArrowDataType::Int64 => GuestValue::Integer64(downcast::<Int64Array>(array)?.iter().collect()),
        ArrowDataType::Float64 => GuestValue::Double(downcast::<Float64Array>(array)?.iter().collect()),
        ArrowDataType::Utf8 => GuestValue::Character(
            downcast::<StringArray>(array)?
                .iter()
                .map(|o| o.map(str::to_string))
                .collect(),
        ),
        ArrowDataType::Timestamp(TimeUnit::Microsecond, tz) => GuestValue::DateTime {
            seconds: downcast::<TimestampMicrosecondArray>(array)?
                .iter()
                .map(|o| o.map(|us| us as f64 / 1_000_000.0))
                .collect(),
            tz: tz.as_ref().map(|t| t.to_string()),
        },
        ArrowDataType::Binary => GuestValue::List(GuestList::unnamed(
            downcast::<BinaryArray>(array)?
                .iter()
                .map(|o| o.map_or(GuestValue::Null, |b| GuestValue::Raw(b.to_vec())))
                .collect(),
        )),
        other => return Err(Error::Unsupported(format!("arrow type {other} has no guest form"))),
    };
    Ok(value)
}

/// A guest column as an Arrow array.
pub fn guest_to_array(value: &GuestValue) -> Result<ArrayRef> {
    let array: ArrayRef = match value {
        GuestValue::Logical(v) => Arc::new(BooleanArray::from(v.clone())),
        GuestValue::Integer(v) => Arc::new(Int32Array::from(v.clone())),
        GuestValue::Integer64(v) => Arc::new(Int64Array::from(v.clone())),
        GuestValue::Double(v) => Arc::new(Float64Array::from(v.clone())),
        GuestValue::Character(v) => Arc::new(StringArray::from(v.clone())),
        GuestValue::DateTime { seconds, tz } => {
            let micros: Vec<Option<i64>> = seconds
                .iter()
                .map(|s| s.and_then(timestamp_from_seconds).map(|ts| ts.timestamp_micros()))
                .collect();
            Arc::new(TimestampMicrosecondArray::from(micros).with_timezone_opt(tz.clone()))
        }
        GuestValue::List(list) => {
            let bytes = list
                .values
                .iter()
                .map(|v| match v {
                    GuestValue::Null => Ok(None),
                    GuestValue::Raw(b) => Ok(Some(b.as_slice())),
                    other => Err(Error::Unsupported(format!(
                        "list column element of type {}",
                        other.type_name()
                    ))),
                })
                .collect::<Result<Vec<_>>>()?;
            Arc::new(BinaryArray::from_iter(bytes))
        }
        other => {
            return Err(Error::Unsupported(format!(
                "{} cannot be a table column",
                other.type_name()
            )))
        }
    };
    Ok(array)
}

// ---- composite shapes ----

/// A one-row struct holding `values` under `fields`.
pub fn row_struct(fields: &[Field], values: &[Value]) -> Result<StructArray> {
    if fields.len() != values.len() {
        return Err(Error::Shape(format!(
            "{} fields but {} values",
            fields.len(),
            values.len()
        )));
    }
    let arrays = fields
        .iter()
        .zip(values)
        .map(|(f, v)| values_to_array(f, std::slice::from_ref(v)))
        .collect::<Result<Vec<_>>>()?;
    let arrow_fields: Fields = fields.iter().map(field_to_arrow).collect();
    Ok(StructArray::try_new(arrow_fields, arrays, None)?)
}

/// A struct array as a named list, one entry per child column.
pub fn struct_to_guest(array: &StructArray) -> Result<GuestList> {
    let entries = array
        .fields()
        .iter()
        .zip(array.columns())
        .map(|(f, col)| Ok((f.name().clone(), array_to_guest(col.as_ref())?)))
        .collect::<Result<Vec<_>>>()?;
    Ok(GuestList::named(entries))
}

pub fn batch_to_guest(batch: &RecordBatch) -> Result<GuestFrame> {
    let schema = batch.schema();
    let columns = schema
        .fields()
        .iter()
        .zip(batch.columns())
        .map(|(f, col)| Ok((f.name().clone(), array_to_guest(col.as_ref())?)))
        .collect::<Result<Vec<_>>>()?;
    Ok(GuestFrame::new(columns))
}

pub fn batch_from_guest(frame: &GuestFrame) -> Result<RecordBatch> {
    let rows = frame.num_rows();
    let mut fields = Vec::with_capacity(frame.columns.len());
    let mut arrays = Vec::with_capacity(frame.columns.len());
    for (name, column) in &frame.columns {
        let array = guest_to_array(column)?;
        if array.len() != rows {
            return Err(Error::Shape(format!(
                "column '{name}' has {} rows, expected {rows}",
                array.len()
            )));
        }
        fields.push(ArrowField::new(name, array.data_type().clone(), true));
        arrays.push(array);
    }
    let options = RecordBatchOptions::new().with_row_count(Some(rows));
    Ok(RecordBatch::try_new_with_options(
        Arc::new(ArrowSchema::new(fields)),
        arrays,
        &options,
    )?)
}

pub fn batch_to_table(batch: &RecordBatch) -> Result<Table> {
    let schema = schema_from_arrow(batch.schema().as_ref())?;
    let columns = schema
        .fields
        .iter()
        .zip(batch.columns())
        .map(|(f, col)| Ok(Column::new(f.name.clone(), array_to_values(col.as_ref(), f)?)))
        .collect::<Result<Vec<_>>>()?;
    Ok(Table::new(columns).with_schema(Arc::new(schema)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rudf_core::schema::{ATTRIBUTE_TYPE_METADATA_KEY, LARGE_BINARY_METADATA_VALUE};

    #[test]
    fn test_schema_metadata_survives_arrow() {
        let schema = Schema::new(vec![
            Field::new("a", DataType::Int32, false),
            Field::large_object("blob"),
            Field::new("t", DataType::Timestamp, true),
        ]);
        let arrow = schema_to_arrow(&schema);
        assert_eq!(
            arrow.field(1).metadata().get(ATTRIBUTE_TYPE_METADATA_KEY).map(String::as_str),
            Some(LARGE_BINARY_METADATA_VALUE)
        );
        assert_eq!(schema_from_arrow(&arrow).unwrap(), schema);
    }

    #[test]
    fn test_row_struct_to_named_list() {
        let fields = vec![
            Field::new("a", DataType::Int32, true),
            Field::new("s", DataType::Utf8, true),
            Field::new("n", DataType::Float64, true),
        ];
        let values = vec![Value::I32(1), Value::Str("x".into()), Value::Null];
        let list = struct_to_guest(&row_struct(&fields, &values).unwrap()).unwrap();
        assert_eq!(list.get("a"), Some(&GuestValue::integer(1)));
        assert_eq!(list.get("s"), Some(&GuestValue::character("x")));
        assert_eq!(list.get("n"), Some(&GuestValue::Double(vec![None])));
    }

    #[test]
    fn test_type_mismatch_is_shape_error() {
        let field = Field::new("a", DataType::Int32, true);
        let err = values_to_array(&field, &[Value::Str("x".into())]).unwrap_err();
        assert!(matches!(err, Error::Shape(_)));
    }

    #[test]
    fn test_frame_round_trip_through_batch() {
        let frame = GuestFrame::new(vec![
            ("b".into(), GuestValue::Logical(vec![Some(true), None])),
            ("i".into(), GuestValue::Integer(vec![Some(1), Some(2)])),
            ("l".into(), GuestValue::Integer64(vec![None, Some(5)])),
            ("d".into(), GuestValue::Double(vec![Some(0.5), None])),
            ("s".into(), GuestValue::Character(vec![Some("x".into()), None])),
            (
                "t".into(),
                GuestValue::DateTime {
                    seconds: vec![Some(1.25), None],
                    tz: Some("UTC".into()),
                },
            ),
            (
                "r".into(),
                GuestValue::List(GuestList::unnamed(vec![
                    GuestValue::Raw(vec![1, 2]),
                    GuestValue::Null,
                ])),
            ),
        ]);
        let batch = batch_from_guest(&frame).unwrap();
        assert_eq!(batch.num_rows(), 2);
        assert_eq!(batch_to_guest(&batch).unwrap(), frame);
    }

    #[test]
    fn test_ragged_frame_is_rejected() {
        let frame = GuestFrame::new(vec![
            ("a".into(), GuestValue::Integer(vec![Some(1), Some(2)])),
            ("b".into(), GuestValue::Integer(vec![Some(1)])),
        ]);
        assert!(matches!(batch_from_guest(&frame), Err(Error::Shape(_))));
    }

    #[test]
    fn test_nested_list_column_is_unsupported() {
        let frame = GuestFrame::new(vec![(
            "a".into(),
            GuestValue::List(GuestList::unnamed(vec![GuestValue::integer(1)])),
        )]);
        assert!(matches!(batch_from_guest(&frame), Err(Error::Unsupported(_))));
    }

    #[test]
    fn test_empty_frame_has_zero_rows() {
        let batch = batch_from_guest(&GuestFrame::default()).unwrap();
        assert_eq!(batch.num_rows(), 0);
        assert_eq!(batch.num_columns(), 0);
    }

    #[test]
    fn test_batch_to_table_rebinds_tagged_uris_only() {
        let schema = Arc::new(schema_to_arrow(&Schema::new(vec![
            Field::large_object("lob"),
            Field::new("plain", DataType::Utf8, true),
        ])));
        let batch = RecordBatch::try_new(
            schema,
            vec![
                Arc::new(StringArray::from(vec![Some("s3://b/k")])) as ArrayRef,
                Arc::new(StringArray::from(vec![Some("s3://b/k")])) as ArrayRef,
            ],
        )
        .unwrap();
        let table = batch_to_table(&batch).unwrap();
        assert!(matches!(table.columns[0].values[0], Value::LargeObject(_)));
        assert_eq!(table.columns[1].values[0], Value::Str("s3://b/k".into()));
    }
}
