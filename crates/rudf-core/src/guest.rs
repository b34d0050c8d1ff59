//! The guest runtime's value model.
//!
//! Mirrors the shapes R code hands back and forth: atomic vectors with NA
//! slots, raw vectors, (optionally named) lists, data frames, symbols and
//! callables. Runtimes convert their native objects into this model at the
//! boundary; the marshalling layer never sees anything else.

use serde::{Deserialize, Serialize};

use crate::id::FunctionId;
use crate::large_object::LargeObjectRef;

/// Symbol a guest generator returns once it has nothing left to yield.
pub const EXHAUSTED_SYMBOL: &str = ".__exhausted__.";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum GuestValue {
    Null,
    Logical(Vec<Option<bool>>),
    Integer(Vec<Option<i32>>),
    /// 64-bit integers (`bit64::integer64` in R).
    Integer64(Vec<Option<i64>>),
    Double(Vec<Option<f64>>),
    /// A double vector of seconds since the epoch tagged as date-time.
    DateTime {
        seconds: Vec<Option<f64>>,
        tz: Option<String>,
    },
    Character(Vec<Option<String>>),
    Raw(Vec<u8>),
    List(GuestList),
    DataFrame(GuestFrame),
    Symbol(String),
    Function(FunctionId),
    /// A host-side reference object handed to the guest untouched.
    LargeObject(LargeObjectRef),
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct GuestList {
    pub names: Option<Vec<String>>,
    pub values: Vec<GuestValue>,
}

impl GuestList {
    pub fn named(entries: Vec<(String, GuestValue)>) -> Self {
        let (names, values) = entries.into_iter().unzip();
        Self {
            names: Some(names),
            values,
        }
    }

    pub fn unnamed(values: Vec<GuestValue>) -> Self {
        Self {
            names: None,
            values,
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// First element called `name`, like `[[` on an R list.
    pub fn get(&self, name: &str) -> Option<&GuestValue> {
        let names = self.names.as_ref()?;
        let idx = names.iter().position(|n| n == name)?;
        self.values.get(idx)
    }

    /// Append `other`'s entries after ours, like `c(list, list)`.
    /// Unnamed entries on either side get an empty name.
    pub fn concat(self, other: GuestList) -> GuestList {
        let mut names = self
            .names
            .unwrap_or_else(|| vec![String::new(); self.values.len()]);
        names.extend(
            other
                .names
                .unwrap_or_else(|| vec![String::new(); other.values.len()]),
        );
        let mut values = self.values;
        values.extend(other.values);
        GuestList {
            names: Some(names),
            values,
        }
    }
}

/// A rectangular guest table: named columns of equal length.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct GuestFrame {
    pub columns: Vec<(String, GuestValue)>,
}

impl GuestFrame {
    pub fn new(columns: Vec<(String, GuestValue)>) -> Self {
        Self { columns }
    }

    pub fn column(&self, name: &str) -> Option<&GuestValue> {
        self.columns.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn num_rows(&self) -> usize {
        self.columns.first().map(|(_, v)| v.len()).unwrap_or(0)
    }
}

impl GuestValue {
    pub fn exhausted() -> Self {
        GuestValue::Symbol(EXHAUSTED_SYMBOL.to_string())
    }

    pub fn is_exhausted_symbol(&self) -> bool {
        matches!(self, GuestValue::Symbol(s) if s == EXHAUSTED_SYMBOL)
    }

    pub fn character(s: impl Into<String>) -> Self {
        GuestValue::Character(vec![Some(s.into())])
    }

    pub fn integer(v: i32) -> Self {
        GuestValue::Integer(vec![Some(v)])
    }

    pub fn double(v: f64) -> Self {
        GuestValue::Double(vec![Some(v)])
    }

    pub fn logical(v: bool) -> Self {
        GuestValue::Logical(vec![Some(v)])
    }

    /// Field names, as `names()` reports them. Only lists and frames have them.
    pub fn names(&self) -> Option<Vec<&str>> {
        match self {
            GuestValue::List(l) => l
                .names
                .as_ref()
                .map(|ns| ns.iter().map(String::as_str).collect()),
            GuestValue::DataFrame(f) => Some(f.columns.iter().map(|(n, _)| n.as_str()).collect()),
            _ => None,
        }
    }

    /// `length()` semantics: element count for vectors, entry count for lists,
    /// column count for frames, 1 for everything scalar-like.
    pub fn len(&self) -> usize {
        match self {
            GuestValue::Null => 0,
            GuestValue::Logical(v) => v.len(),
            GuestValue::Integer(v) => v.len(),
            GuestValue::Integer64(v) => v.len(),
            GuestValue::Double(v) => v.len(),
            GuestValue::DateTime { seconds, .. } => seconds.len(),
            GuestValue::Character(v) => v.len(),
            GuestValue::Raw(v) => v.len(),
            GuestValue::List(l) => l.len(),
            GuestValue::DataFrame(f) => f.columns.len(),
            GuestValue::Symbol(_) | GuestValue::Function(_) | GuestValue::LargeObject(_) => 1,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Short type name for error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            GuestValue::Null => "NULL",
            GuestValue::Logical(_) => "logical",
            GuestValue::Integer(_) => "integer",
            GuestValue::Integer64(_) => "integer64",
            GuestValue::Double(_) => "double",
            GuestValue::DateTime { .. } => "POSIXct",
            GuestValue::Character(_) => "character",
            GuestValue::Raw(_) => "raw",
            GuestValue::List(_) => "list",
            GuestValue::DataFrame(_) => "data.frame",
            GuestValue::Symbol(_) => "symbol",
            GuestValue::Function(_) => "closure",
            GuestValue::LargeObject(_) => "largebinary",
        }
    }

    /// The single string of a length-1 character vector.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            GuestValue::Character(v) if v.len() == 1 => v[0].as_deref(),
            _ => None,
        }
    }

    /// A numeric scalar as i64 (integer, integer64 or whole double).
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            GuestValue::Integer(v) if v.len() == 1 => v[0].map(i64::from),
            GuestValue::Integer64(v) if v.len() == 1 => v[0],
            GuestValue::Double(v) if v.len() == 1 => {
                v[0].filter(|d| d.fract() == 0.0).map(|d| d as i64)
            }
            _ => None,
        }
    }
}
