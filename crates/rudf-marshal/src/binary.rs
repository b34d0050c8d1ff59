//! Byte envelope for guest values stored in binary fields.
//!
//! A payload is the 10-byte header `serde_json` followed by the JSON form of
//! a `GuestValue`. Bytes that do not carry a valid envelope are plain raw
//! data and surface in the guest as a raw vector.

use rudf_core::guest::GuestValue;

use crate::error::{Error, Result};

pub const ENVELOPE_HEADER: &[u8; 10] = b"serde_json";

/// Serialise `value` for a binary field. Raw vectors are stored bare.
pub fn encode(value: &GuestValue) -> Result<Vec<u8>> {
    if let GuestValue::Raw(bytes) = value {
        return Ok(bytes.clone());
    }
    let mut out = ENVELOPE_HEADER.to_vec();
    serde_json::to_writer(&mut out, value)
        .map_err(|e| Error::Unsupported(format!("cannot serialise {}: {e}", value.type_name())))?;
    Ok(out)
}

/// Inverse of [`encode`]; never fails.
pub fn decode(bytes: &[u8]) -> GuestValue {
    match bytes.strip_prefix(ENVELOPE_HEADER.as_slice()) {
        Some(body) => serde_json::from_slice(body).unwrap_or_else(|e| {
            tracing::trace!(error = %e, "envelope header without a valid body; keeping raw bytes");
            GuestValue::Raw(bytes.to_vec())
        }),
        None => GuestValue::Raw(bytes.to_vec()),
    }
}
