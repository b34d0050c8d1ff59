//! Content-location handles for payloads stored out of band.
//!
//! A `LargeObjectRef` never holds the payload, only where it lives. Fresh
//! references are minted by `rudf-io` (minting has to make sure the default
//! bucket exists); this module only validates and takes URIs apart.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Scheme prefix every large-object URI starts with.
pub const URI_SCHEME_PREFIX: &str = "s3://";

/// Returns true for strings that look like a large-object URI.
pub fn is_large_object_uri(s: &str) -> bool {
    s.starts_with(URI_SCHEME_PREFIX)
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct LargeObjectRef(String);

impl LargeObjectRef {
    /// Wrap an existing URI. The string is kept exactly as given.
    pub fn bind(uri: impl Into<String>) -> Result<Self> {
        let uri = uri.into();
        if !is_large_object_uri(&uri) {
            return Err(Error::InvalidReference(format!(
                "large-object URI must start with '{URI_SCHEME_PREFIX}', got: {uri}"
            )));
        }
        Ok(Self(uri))
    }

    pub fn uri(&self) -> &str {
        &self.0
    }

    pub fn into_uri(self) -> String {
        self.0
    }

    /// Split into `(bucket, object key)`. Needs at least one key segment.
    pub fn parts(&self) -> Result<(&str, &str)> {
        let rest = self.0.strip_prefix(URI_SCHEME_PREFIX).unwrap_or_default();
        match rest.split_once('/') {
            Some((bucket, key)) if !bucket.is_empty() && !key.is_empty() => Ok((bucket, key)),
            _ => Err(Error::InvalidReference(format!(
                "invalid large-object URI format: {}",
                self.0
            ))),
        }
    }

    pub fn bucket(&self) -> Result<&str> {
        self.parts().map(|(b, _)| b)
    }

    pub fn key(&self) -> Result<&str> {
        self.parts().map(|(_, k)| k)
    }
}

impl fmt::Display for LargeObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for LargeObjectRef {
    type Error = Error;

    fn try_from(uri: String) -> Result<Self> {
        Self::bind(uri)
    }
}

impl From<LargeObjectRef> for String {
    fn from(r: LargeObjectRef) -> Self {
        r.0
    }
}

impl std::str::FromStr for LargeObjectRef {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::bind(s)
    }
}
