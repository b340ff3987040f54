//! Canonical serialization and etag hashing for registry records.
//!
//! # Responsibility
//! - Render the canonical field mapping used for content hashing.
//! - Compute SHA-256 etags that agree between creation and revision paths.
//!
//! # Invariants
//! - Object keys are rendered in sorted order, recursively.
//! - The internal identifier and the etag field itself never reach the digest.

use serde::Serialize;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::error::Error;
use std::fmt::Write as _;
use std::fmt::{Display, Formatter};

/// Serialized field name of the internal storage identifier.
///
/// Excluded from hashing: storage identity is not record content.
pub const INTERNAL_ID_FIELD: &str = "uuid";

/// Serialized field name of the content hash.
///
/// Excluded from hashing so that hashing a freshly drafted record (no etag
/// yet) and re-hashing a stored record (stale etag present) both apply the
/// same function to the same content.
pub const ETAG_FIELD: &str = "etag";

/// Error raised while rendering a record as a canonical field mapping.
#[derive(Debug)]
pub enum FieldMapError {
    /// The record failed JSON serialization.
    Json(serde_json::Error),
    /// The record serialized to something other than a JSON object.
    NotAnObject,
}

impl Display for FieldMapError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Json(err) => write!(f, "record serialization failed: {err}"),
            Self::NotAnObject => write!(f, "record did not serialize to a JSON object"),
        }
    }
}

impl Error for FieldMapError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Json(err) => Some(err),
            Self::NotAnObject => None,
        }
    }
}

impl From<serde_json::Error> for FieldMapError {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value)
    }
}

/// Serializes a record into its canonical field-name-to-value mapping.
pub fn canonical_fields<T: Serialize>(record: &T) -> Result<Map<String, Value>, FieldMapError> {
    match serde_json::to_value(record)? {
        Value::Object(fields) => Ok(fields),
        _ => Err(FieldMapError::NotAnObject),
    }
}

/// Renders canonical JSON bytes: keys sorted recursively, no insignificant
/// whitespace.
///
/// Sorting is applied explicitly rather than relying on the map order of the
/// input value, so the byte output is stable regardless of how the value was
/// built or which `serde_json` map backend is active.
pub fn canonical_json_bytes(value: &Value) -> Vec<u8> {
    let canonical = sorted(value);
    serde_json::to_vec(&canonical).expect("canonical JSON value always serializes")
}

/// Computes the etag for a canonical field mapping.
///
/// The internal identifier and any present etag field are dropped before
/// hashing; the remaining fields are rendered as canonical JSON and digested
/// with SHA-256. Returns the lowercase hex digest.
pub fn compute_etag(fields: &Map<String, Value>) -> String {
    let mut hashed = Map::new();
    for (name, value) in fields {
        if name == INTERNAL_ID_FIELD || name == ETAG_FIELD {
            continue;
        }
        hashed.insert(name.clone(), value.clone());
    }

    let bytes = canonical_json_bytes(&Value::Object(hashed));
    let digest = Sha256::digest(&bytes);

    let mut out = String::with_capacity(digest.len() * 2);
    for byte in digest {
        // Writing to a String cannot fail.
        let _ = write!(out, "{byte:02x}");
    }
    out
}

fn sorted(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut names: Vec<&String> = map.keys().collect();
            names.sort_unstable();
            let mut out = Map::new();
            for name in names {
                if let Some(inner) = map.get(name) {
                    out.insert(name.clone(), sorted(inner));
                }
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.iter().map(sorted).collect()),
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::{canonical_fields, canonical_json_bytes, compute_etag};
    use serde_json::json;

    #[test]
    fn canonical_json_sorts_keys_recursively() {
        let value = json!({
            "b": 1,
            "a": { "d": 4, "c": 3 },
            "list": [ { "z": true, "y": false } ]
        });

        let bytes = canonical_json_bytes(&value);
        assert_eq!(bytes, br#"{"a":{"c":3,"d":4},"b":1,"list":[{"y":false,"z":true}]}"#);
    }

    #[test]
    fn etag_ignores_internal_id_and_prior_etag() {
        let base = canonical_fields(&json!({
            "object_id": "https://example.org/BCO_000001/1.0",
            "contents": { "k": "v" }
        }))
        .unwrap();
        let decorated = canonical_fields(&json!({
            "uuid": "11111111-2222-4333-8444-555555555555",
            "etag": "stale-value",
            "object_id": "https://example.org/BCO_000001/1.0",
            "contents": { "k": "v" }
        }))
        .unwrap();

        assert_eq!(compute_etag(&base), compute_etag(&decorated));
    }

    #[test]
    fn etag_is_lowercase_hex_sha256() {
        let fields = canonical_fields(&json!({ "object_id": "x" })).unwrap();
        let etag = compute_etag(&fields);

        assert_eq!(etag.len(), 64);
        assert!(etag.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn etag_tracks_content_changes() {
        let one = canonical_fields(&json!({ "contents": { "n": 1 } })).unwrap();
        let two = canonical_fields(&json!({ "contents": { "n": 2 } })).unwrap();

        assert_ne!(compute_etag(&one), compute_etag(&two));
    }

    #[test]
    fn canonical_fields_rejects_non_objects() {
        assert!(canonical_fields(&json!([1, 2, 3])).is_err());
        assert!(canonical_fields(&json!("scalar")).is_err());
    }
}
