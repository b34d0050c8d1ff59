//! Table <-> guest data frame.
//!
//! The guest has no large-object type, so columns are classified when they
//! cross: a declared tag always wins, otherwise the column is sampled. Large
//! objects travel as URI strings and are rebound on the way back.

use std::sync::Arc;

use arrow::array::{Array, StringArray};
use arrow::datatypes::Schema as ArrowSchema;
use arrow::record_batch::RecordBatch;
use rudf_core::guest::{GuestFrame, GuestValue};
use rudf_core::large_object::is_large_object_uri;
use rudf_core::schema::{DataType, Field, ATTRIBUTE_TYPE_METADATA_KEY, LARGE_BINARY_METADATA_VALUE};
use rudf_core::types::{Table, Value};

use crate::error::{Error, Result};
use crate::interchange::{
    batch_from_guest, batch_to_guest, batch_to_table, field_to_arrow, values_to_array,
};

/// Share of non-null URI strings that makes a column large-object, as
/// `numerator / denominator`.
pub const LARGE_OBJECT_THRESHOLD: (usize, usize) = (4, 5);

fn meets_threshold(uris: usize, non_null: usize) -> bool {
    let (num, den) = LARGE_OBJECT_THRESHOLD;
    non_null > 0 && uris * den >= non_null * num
}

fn sample_column(values: &[Value]) -> bool {
    match values.iter().find(|v| !v.is_null()) {
        None => false,
        Some(Value::LargeObject(_)) => true,
        Some(_) => {
            let mut non_null = 0;
            let mut uris = 0;
            for v in values {
                match v {
                    Value::Null => {}
                    Value::LargeObject(_) => {
                        non_null += 1;
                        uris += 1;
                    }
                    Value::Str(s) => {
                        non_null += 1;
                        if is_large_object_uri(s) {
                            uris += 1;
                        }
                    }
                    _ => non_null += 1,
                }
            }
            meets_threshold(uris, non_null)
        }
    }
}

/// Names of the columns that hold large objects, in column order.
pub fn detect_large_object_columns(table: &Table) -> Vec<String> {
    table
        .columns
        .iter()
        .filter(|col| {
            let declared = table
                .schema
                .as_ref()
                .and_then(|s| s.field_named(&col.name))
                .map_or(false, Field::is_large_object);
            declared || sample_column(&col.values)
        })
        .map(|col| col.name.clone())
        .collect()
}

/// Same classification on an Arrow batch: tagged fields, or string columns
/// past the URI threshold.
fn detect_in_batch(batch: &RecordBatch) -> Vec<String> {
    let schema = batch.schema();
    schema
        .fields()
        .iter()
        .zip(batch.columns())
        .filter(|(field, column)| {
            if is_tagged(field.metadata()) {
                return true;
            }
            let Some(strings) = column.as_any().downcast_ref::<StringArray>() else {
                return false;
            };
            let non_null = strings.len() - strings.null_count();
            let uris = strings.iter().flatten().filter(|s| is_large_object_uri(s)).count();
            meets_threshold(uris, non_null)
        })
        .map(|(field, _)| field.name().clone())
        .collect()
}

fn is_tagged(metadata: &std::collections::HashMap<String, String>) -> bool {
    metadata
        .get(ATTRIBUTE_TYPE_METADATA_KEY)
        .map_or(false, |v| v == LARGE_BINARY_METADATA_VALUE)
}

/// Tag the named fields of `batch` as large-object. The batch comes back
/// as is when every named field already carries the tag.
pub fn tag_large_object_fields(batch: RecordBatch, names: &[String]) -> Result<RecordBatch> {
    let schema = batch.schema();
    let missing = schema
        .fields()
        .iter()
        .any(|f| names.contains(f.name()) && !is_tagged(f.metadata()));
    if !missing {
        return Ok(batch);
    }
    let fields: Vec<_> = schema
        .fields()
        .iter()
        .map(|f| {
            if names.contains(f.name()) && !is_tagged(f.metadata()) {
                let mut metadata = f.metadata().clone();
                metadata.insert(
                    ATTRIBUTE_TYPE_METADATA_KEY.to_string(),
                    LARGE_BINARY_METADATA_VALUE.to_string(),
                );
                Arc::new(f.as_ref().clone().with_metadata(metadata))
            } else {
                Arc::clone(f)
            }
        })
        .collect();
    let tagged = ArrowSchema::new_with_metadata(fields, schema.metadata().clone());
    Ok(batch.with_schema(Arc::new(tagged))?)
}

/// Arrow form of `table` with every column in `large_objects` as a tagged
/// string column of URIs.
pub fn table_to_batch(table: &Table, large_objects: &[String]) -> Result<RecordBatch> {
    let rows = table.num_rows();
    let mut fields = Vec::with_capacity(table.num_columns());
    let mut arrays = Vec::with_capacity(table.num_columns());
    for (idx, col) in table.columns.iter().enumerate() {
        if col.len() != rows {
            return Err(Error::Shape(format!(
                "column '{}' has {} rows, expected {rows}",
                col.name,
                col.len()
            )));
        }
        let mut field = table.field_at(idx);
        if large_objects.contains(&col.name) {
            field = Field::new(field.name, DataType::Utf8, true)
                .with_metadata(field.metadata)
                .with_large_object_tag();
        }
        arrays.push(values_to_array(&field, &col.values)?);
        fields.push(field_to_arrow(&field));
    }
    let options = arrow::record_batch::RecordBatchOptions::new().with_row_count(Some(rows));
    Ok(RecordBatch::try_new_with_options(
        Arc::new(ArrowSchema::new(fields)),
        arrays,
        &options,
    )?)
}

pub fn table_to_guest(table: &Table) -> Result<GuestValue> {
    let large_objects = detect_large_object_columns(table);
    if !large_objects.is_empty() {
        tracing::trace!(columns = ?large_objects, "large-object columns going out");
    }
    let batch = table_to_batch(table, &large_objects)?;
    Ok(GuestValue::DataFrame(batch_to_guest(&batch)?))
}

pub fn table_from_guest(value: &GuestValue) -> Result<Table> {
    table_from_guest_with(value, &[])
}

/// Like [`table_from_guest`], also treating `input_large_objects` (columns
/// the input table had tagged) as large-object when the guest kept them.
pub fn table_from_guest_with(value: &GuestValue, input_large_objects: &[String]) -> Result<Table> {
    let GuestValue::DataFrame(frame) = value else {
        return Err(Error::Shape(format!(
            "expected a data.frame, got {}",
            value.type_name()
        )));
    };
    from_frame(frame, input_large_objects)
}

fn from_frame(frame: &GuestFrame, input_large_objects: &[String]) -> Result<Table> {
    let batch = batch_from_guest(frame)?;
    let mut names = detect_in_batch(&batch);
    for name in input_large_objects {
        let string_column = batch
            .schema()
            .field_with_name(name)
            .map_or(false, |f| f.data_type() == &arrow::datatypes::DataType::Utf8);
        if string_column && !names.contains(name) {
            names.push(name.clone());
        }
    }
    let batch = tag_large_object_fields(batch, &names)?;
    batch_to_table(&batch)
}
