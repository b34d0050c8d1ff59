//! Row <-> guest record.
//!
//! Outbound, a row is split by field category. Plain fields cross as a
//! one-row Arrow struct; binary and large-object fields are carried by hand
//! because the bridge has no form for them. The pieces are spliced into one
//! named list, plain fields first.
//!
//! Inbound, a named list (or anything with names) becomes a row again. The
//! end-of-stream symbol and values without names both mean "no more rows".

use std::collections::HashSet;
use std::sync::Arc;

use rudf_core::guest::{GuestList, GuestValue};
use rudf_core::large_object::{is_large_object_uri, LargeObjectRef};
use rudf_core::schema::{Field, FieldCategory, Schema, SchemaRef};
use rudf_core::types::{infer_field, Row, Value};

use crate::binary;
use crate::convert::{to_guest, to_native};
use crate::error::Result;
use crate::interchange::{row_struct, struct_to_guest};

/// How to rebuild a row from a guest record.
#[derive(Debug, Clone)]
pub enum RowLayout {
    /// The record answers an input row with this schema: keep its field
    /// order and declarations, append new fields after it.
    Operator(SchemaRef),
    /// The record comes from a source; no prior schema exists.
    Source,
}

pub fn row_to_guest(row: &Row) -> Result<GuestValue> {
    let mut plain_fields = Vec::new();
    let mut plain_values = Vec::new();
    let mut binary = Vec::new();
    let mut large = Vec::new();

    for (field, value) in row.iter() {
        match field.category() {
            FieldCategory::Plain => {
                plain_fields.push(field.clone());
                plain_values.push(value.clone());
            }
            FieldCategory::Binary => binary.push((field.name.clone(), binary_to_guest(value))),
            FieldCategory::LargeObject => {
                large.push((field.name.clone(), large_object_to_guest(value)))
            }
        }
    }

    let plain = if plain_fields.is_empty() {
        GuestList::named(Vec::new())
    } else {
        struct_to_guest(&row_struct(&plain_fields, &plain_values)?)?
    };
    binary.extend(large);
    Ok(GuestValue::List(plain.concat(GuestList::named(binary))))
}

fn binary_to_guest(value: &Value) -> GuestValue {
    match value {
        Value::Bin(bytes) => binary::decode(bytes),
        other => to_guest(other),
    }
}

fn large_object_to_guest(value: &Value) -> GuestValue {
    match value {
        Value::LargeObject(r) => GuestValue::character(r.uri()),
        Value::Str(s) => GuestValue::character(s.clone()),
        other => to_guest(other),
    }
}

/// Named entries of a guest record, in the order the guest reports them.
fn entries(record: &GuestValue) -> Vec<(&str, &GuestValue)> {
    match record {
        GuestValue::List(list) => match &list.names {
            Some(names) => names.iter().map(String::as_str).zip(&list.values).collect(),
            None => Vec::new(),
        },
        GuestValue::DataFrame(frame) => frame
            .columns
            .iter()
            .map(|(n, v)| (n.as_str(), v))
            .collect(),
        _ => Vec::new(),
    }
}

/// True when `record` ends a generator's output.
pub fn is_end_of_stream(record: &GuestValue) -> bool {
    record.is_exhausted_symbol() || record.names().map_or(true, |names| names.is_empty())
}

/// Rebuild a native row; `None` signals end-of-stream.
pub fn row_from_guest(record: &GuestValue, layout: &RowLayout) -> Result<Option<Row>> {
    if is_end_of_stream(record) {
        return Ok(None);
    }
    let entries = entries(record);
    let lookup = |name: &str| {
        entries
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, v)| *v)
    };

    let mut fields = Vec::with_capacity(entries.len());
    let mut values = Vec::with_capacity(entries.len());

    match layout {
        RowLayout::Operator(input) => {
            for declared in &input.fields {
                let raw = lookup(&declared.name);
                let value = raw.map_or(Value::Null, to_native);
                let (field, value) = reconcile(declared, raw, value)?;
                fields.push(field);
                values.push(value);
            }
            let mut seen: HashSet<&str> = input.fields.iter().map(|f| f.name.as_str()).collect();
            for (name, raw) in &entries {
                if seen.insert(name) {
                    let value = to_native(raw);
                    fields.push(infer_field(name, &value));
                    values.push(value);
                }
            }
        }
        RowLayout::Source => {
            let mut seen = HashSet::new();
            for (name, raw) in &entries {
                if !seen.insert(*name) {
                    continue;
                }
                let value = match to_native(raw) {
                    Value::Str(s) if is_large_object_uri(&s) => {
                        Value::LargeObject(LargeObjectRef::bind(s)?)
                    }
                    other => other,
                };
                fields.push(infer_field(name, &value));
                values.push(value);
            }
        }
    }

    Ok(Some(Row::try_new(Arc::new(Schema::new(fields)), values)?))
}

/// Fit a converted value back into its declared input field.
fn reconcile(declared: &Field, raw: Option<&GuestValue>, value: Value) -> Result<(Field, Value)> {
    match declared.category() {
        FieldCategory::LargeObject => {
            let value = match value {
                Value::Str(s) if is_large_object_uri(&s) => {
                    Value::LargeObject(LargeObjectRef::bind(s)?)
                }
                other => other,
            };
            Ok((declared.clone(), value))
        }
        FieldCategory::Binary => {
            let value = match (value, raw) {
                (v @ (Value::Bin(_) | Value::Null), _) => v,
                (_, Some(raw)) => Value::Bin(binary::encode(raw)?),
                (v, None) => v,
            };
            Ok((declared.clone(), value))
        }
        FieldCategory::Plain => {
            if value.is_null() || value.data_type() == declared.data_type {
                Ok((declared.clone(), value))
            } else {
                Ok((infer_field(&declared.name, &value), value))
            }
        }
    }
}
