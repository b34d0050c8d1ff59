//! Native values, rows and column-major tables as the engine hands them over.
//!
//! These are the engine-side shapes. `rudf-marshal` converts them to Arrow
//! for the interchange bridge and to `GuestValue`s for the guest.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::guest::GuestValue;
use crate::large_object::LargeObjectRef;
use crate::schema::{DataType, Field, Schema, SchemaRef};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Null,
    Bool(bool),
    I32(i32),
    I64(i64),
    F64(f64),
    Str(String),
    Bin(Vec<u8>),
    Timestamp(DateTime<Utc>),
    LargeObject(LargeObjectRef),
    /// A guest value with no native counterpart, passed through untouched.
    Guest(GuestValue),
}

impl Value {
    pub fn data_type(&self) -> DataType {
        match self {
            Value::Null => DataType::Null,
            Value::Bool(_) => DataType::Boolean,
            Value::I32(_) => DataType::Int32,
            Value::I64(_) => DataType::Int64,
            Value::F64(_) => DataType::Float64,
            Value::Str(_) => DataType::Utf8,
            Value::Bin(_) => DataType::Binary,
            Value::Timestamp(_) => DataType::Timestamp,
            Value::LargeObject(_) => DataType::Utf8,
            // The engine stores foreign objects as opaque binary payloads.
            Value::Guest(_) => DataType::Binary,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }
}

/// Field a value of unknown provenance would be declared with.
pub fn infer_field(name: &str, value: &Value) -> Field {
    match value {
        Value::LargeObject(_) => Field::large_object(name),
        other => Field::new(name, other.data_type(), true),
    }
}

/// One engine row: a schema plus one value per field, in schema order.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    schema: SchemaRef,
    values: Vec<Value>,
}

impl Row {
    pub fn try_new(schema: SchemaRef, values: Vec<Value>) -> Result<Self> {
        if schema.len() != values.len() {
            return Err(Error::Schema(format!(
                "row has {} values but schema declares {} fields",
                values.len(),
                schema.len()
            )));
        }
        Ok(Self { schema, values })
    }

    /// Build a row from ordered pairs, inferring each field from its value.
    pub fn from_pairs(pairs: Vec<(String, Value)>) -> Result<Self> {
        let fields = pairs.iter().map(|(n, v)| infer_field(n, v)).collect();
        let schema = Schema::try_new(fields)?;
        let values = pairs.into_iter().map(|(_, v)| v).collect();
        Ok(Self {
            schema: Arc::new(schema),
            values,
        })
    }

    pub fn schema(&self) -> &SchemaRef {
        &self.schema
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.schema.index_of(name).map(|i| &self.values[i])
    }

    pub fn field_names(&self) -> Vec<String> {
        self.schema.field_names()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Field, &Value)> {
        self.schema.fields.iter().zip(self.values.iter())
    }

    /// Sub-row with only `names`, in the order given.
    pub fn project(&self, names: &[String]) -> Result<Row> {
        let mut fields = Vec::with_capacity(names.len());
        let mut values = Vec::with_capacity(names.len());
        for name in names {
            let idx = self
                .schema
                .index_of(name)
                .ok_or_else(|| Error::Schema(format!("field '{name}' not in row")))?;
            fields.push(self.schema.fields[idx].clone());
            values.push(self.values[idx].clone());
        }
        Ok(Row {
            schema: Arc::new(Schema::new(fields)),
            values,
        })
    }

    pub fn into_pairs(self) -> Vec<(String, Value)> {
        self.schema
            .fields
            .iter()
            .map(|f| f.name.clone())
            .zip(self.values)
            .collect()
    }
}

/// Minimal column representation: a name and one value per row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub values: Vec<Value>,
}

impl Column {
    pub fn new(name: impl Into<String>, values: Vec<Value>) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn first_non_null(&self) -> Option<&Value> {
        self.values.iter().find(|v| !v.is_null())
    }
}

/// Column-major table. `schema`, when present, is the declared schema the
/// engine attached; otherwise fields are inferred from the values.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    pub columns: Vec<Column>,
    pub schema: Option<SchemaRef>,
}

impl Table {
    pub fn new(columns: Vec<Column>) -> Self {
        Self {
            columns,
            schema: None,
        }
    }

    pub fn with_schema(mut self, schema: SchemaRef) -> Self {
        self.schema = Some(schema);
        self
    }

    pub fn num_rows(&self) -> usize {
        self.columns.first().map(|c| c.len()).unwrap_or(0)
    }

    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    /// Declared field for column `idx`, or one inferred from its first
    /// non-null value.
    pub fn field_at(&self, idx: usize) -> Field {
        let col = &self.columns[idx];
        if let Some(f) = self.schema.as_ref().and_then(|s| s.field_named(&col.name)) {
            return f.clone();
        }
        match col.first_non_null() {
            Some(v) => infer_field(&col.name, v),
            None => Field::new(col.name.clone(), DataType::Null, true),
        }
    }

    pub fn resolved_schema(&self) -> Schema {
        Schema::new((0..self.columns.len()).map(|i| self.field_at(i)).collect())
    }

    /// Transpose rows into a table. All rows must share the first row's fields.
    pub fn from_rows(rows: &[Row]) -> Result<Table> {
        let Some(first) = rows.first() else {
            return Ok(Table::default());
        };
        let schema = Arc::clone(first.schema());
        let mut columns: Vec<Column> = schema
            .fields
            .iter()
            .map(|f| Column::new(f.name.clone(), Vec::with_capacity(rows.len())))
            .collect();
        for row in rows {
            if row.schema().field_names() != schema.field_names() {
                return Err(Error::Schema("rows disagree on field names".into()));
            }
            for (col, v) in columns.iter_mut().zip(row.values()) {
                col.values.push(v.clone());
            }
        }
        Ok(Table {
            columns,
            schema: Some(schema),
        })
    }

    /// Materialise every row, all sharing one resolved schema.
    pub fn rows(&self) -> Result<Vec<Row>> {
        let n = self.num_rows();
        if self.columns.iter().any(|c| c.len() != n) {
            return Err(Error::Invariant("columns have different lengths".into()));
        }
        let schema = Arc::new(self.resolved_schema());
        (0..n)
            .map(|i| {
                let values = self.columns.iter().map(|c| c.values[i].clone()).collect();
                Row::try_new(Arc::clone(&schema), values)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lob(uri: &str) -> Value {
        Value::LargeObject(LargeObjectRef::bind(uri).unwrap())
    }

    #[test]
    fn test_from_pairs_tags_large_objects() {
        let row = Row::from_pairs(vec![
            ("a".into(), Value::I32(1)),
            ("c".into(), lob("s3://bkt/objects/1/x")),
        ])
        .unwrap();
        assert!(row.schema().field_named("c").unwrap().is_large_object());
        assert!(!row.schema().field_named("a").unwrap().is_large_object());
    }

    #[test]
    fn test_project_keeps_requested_order() {
        let row = Row::from_pairs(vec![
            ("a".into(), Value::I32(1)),
            ("b".into(), Value::Str("x".into())),
        ])
        .unwrap();
        let p = row.project(&["b".to_string(), "a".to_string()]).unwrap();
        assert_eq!(p.field_names(), vec!["b", "a"]);
        assert!(row.project(&["zz".to_string()]).is_err());
    }

    #[test]
    fn test_table_rows_roundtrip() {
        let rows = vec![
            Row::from_pairs(vec![("a".into(), Value::I64(1)), ("b".into(), Value::Null)]).unwrap(),
            Row::from_pairs(vec![("a".into(), Value::I64(2)), ("b".into(), Value::Null)]).unwrap(),
        ];
        let table = Table::from_rows(&rows).unwrap();
        assert_eq!(table.num_rows(), 2);
        let back = table.rows().unwrap();
        assert_eq!(back[1].get("a"), Some(&Value::I64(2)));
    }

    #[test]
    fn test_field_at_infers_from_first_non_null() {
        let t = Table::new(vec![Column::new(
            "c",
            vec![Value::Null, lob("s3://b/k"), Value::Null],
        )]);
        assert!(t.field_at(0).is_large_object());
        let empty = Table::new(vec![Column::new("n", vec![Value::Null])]);
        assert_eq!(empty.field_at(0).data_type, DataType::Null);
    }
}
