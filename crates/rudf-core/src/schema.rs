//! Logical schema types. Pure data; no Arrow dependency here.
//!
//! `rudf-marshal` converts these to and from Arrow schemas, carrying the
//! field metadata across so the large-object tag survives the trip.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Metadata key that carries the engine-level attribute type of a field.
pub const ATTRIBUTE_TYPE_METADATA_KEY: &str = "attribute_type";

/// Value stored under [`ATTRIBUTE_TYPE_METADATA_KEY`] for large-object fields.
pub const LARGE_BINARY_METADATA_VALUE: &str = "LARGE_BINARY";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    Null,
    Boolean,
    Int32,
    Int64,
    Float64,
    Utf8,
    Binary,
    /// UTC timestamp with microsecond precision.
    Timestamp,
}

/// How a field crosses the guest boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldCategory {
    /// Goes through the columnar interchange bridge.
    Plain,
    /// Carried by hand as an opaque guest payload.
    Binary,
    /// Carried as a URI string.
    LargeObject,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub data_type: DataType,
    pub nullable: bool,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl Field {
    pub fn new(name: impl Into<String>, data_type: DataType, nullable: bool) -> Self {
        Self {
            name: name.into(),
            data_type,
            nullable,
            metadata: BTreeMap::new(),
        }
    }

    /// A nullable `Utf8` field tagged as large-object.
    pub fn large_object(name: impl Into<String>) -> Self {
        Self::new(name, DataType::Utf8, true).with_large_object_tag()
    }

    pub fn with_metadata(mut self, metadata: BTreeMap<String, String>) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_large_object_tag(mut self) -> Self {
        self.metadata.insert(
            ATTRIBUTE_TYPE_METADATA_KEY.to_string(),
            LARGE_BINARY_METADATA_VALUE.to_string(),
        );
        self
    }

    pub fn is_large_object(&self) -> bool {
        self.metadata
            .get(ATTRIBUTE_TYPE_METADATA_KEY)
            .map(|v| v == LARGE_BINARY_METADATA_VALUE)
            .unwrap_or(false)
    }

    /// The tag wins over the declared type: a tagged field is large-object
    /// even if some producer declared it as binary.
    pub fn category(&self) -> FieldCategory {
        if self.is_large_object() {
            FieldCategory::LargeObject
        } else if self.data_type == DataType::Binary {
            FieldCategory::Binary
        } else {
            FieldCategory::Plain
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    pub fields: Vec<Field>,
}

pub type SchemaRef = Arc<Schema>;

impl Schema {
    pub fn new(fields: Vec<Field>) -> Self {
        Self { fields }
    }

    /// Like `new`, but rejects duplicate field names.
    pub fn try_new(fields: Vec<Field>) -> Result<Self> {
        for (i, f) in fields.iter().enumerate() {
            if fields[..i].iter().any(|g| g.name == f.name) {
                return Err(Error::Schema(format!("duplicate field name '{}'", f.name)));
            }
        }
        Ok(Self { fields })
    }

    pub fn empty() -> Self {
        Self { fields: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn field(&self, idx: usize) -> Option<&Field> {
        self.fields.get(idx)
    }

    pub fn field_named(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    pub fn field_names(&self) -> Vec<String> {
        self.fields.iter().map(|f| f.name.clone()).collect()
    }

    /// Names of the fields in `category`, in schema order.
    pub fn names_in(&self, category: FieldCategory) -> Vec<String> {
        self.fields
            .iter()
            .filter(|f| f.category() == category)
            .map(|f| f.name.clone())
            .collect()
    }

    pub fn large_object_fields(&self) -> Vec<String> {
        self.names_in(FieldCategory::LargeObject)
    }
}
