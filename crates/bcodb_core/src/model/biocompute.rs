//! BioCompute object domain model.
//!
//! # Responsibility
//! - Define the canonical registry record and its publication lifecycle.
//! - Enforce the structural rules every stored object must satisfy.
//!
//! # Invariants
//! - `uuid` is stable storage identity and never reused for another object.
//! - `etag` is derived from record content and recomputed on every write.
//! - `contents` holds the five required BioCompute domains with their
//!   documented shapes.
//!
//! # See also
//! - docs/architecture/data-model.md

use crate::model::etag::{canonical_fields, compute_etag, FieldMapError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Stable internal identifier of a registry record.
///
/// Kept as a type alias to make semantic intent explicit in signatures.
pub type BcoId = Uuid;

/// Expected JSON shape of a domain section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DomainShape {
    Object,
    Array,
}

impl Display for DomainShape {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Object => f.write_str("object"),
            Self::Array => f.write_str("array"),
        }
    }
}

/// The five domain sections every object must carry, with their shapes.
pub const REQUIRED_DOMAINS: [(&str, DomainShape); 5] = [
    ("provenance_domain", DomainShape::Object),
    ("usability_domain", DomainShape::Array),
    ("description_domain", DomainShape::Object),
    ("execution_domain", DomainShape::Object),
    ("io_domain", DomainShape::Object),
];

/// Optional user-defined domain section; an array when present.
pub const EXTENSION_DOMAIN: &str = "extension_domain";

/// Publication lifecycle of a registry object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BcoState {
    /// Editable working copy, visible to its owner only.
    Draft,
    /// Released to the registry. Content changes mint a new version.
    Published,
}

/// Structural validation failure for a registry record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BcoValidationError {
    /// Internal identifier is the nil UUID.
    NilUuid,
    /// `object_id` is empty or whitespace.
    EmptyObjectId,
    /// `etag` is empty or contains non-alphanumeric characters.
    InvalidEtag(String),
    /// `spec_version` is empty or whitespace.
    EmptySpecVersion,
    /// `contents` is not a JSON object.
    ContentsNotObject,
    /// A required domain section is absent from `contents`.
    MissingDomain(&'static str),
    /// A domain section is present but has the wrong JSON shape.
    WrongDomainShape {
        domain: &'static str,
        expected: DomainShape,
    },
}

impl Display for BcoValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NilUuid => write!(f, "uuid must not be nil"),
            Self::EmptyObjectId => write!(f, "object_id must not be empty"),
            Self::InvalidEtag(etag) => write!(f, "etag `{etag}` is not alphanumeric"),
            Self::EmptySpecVersion => write!(f, "spec_version must not be empty"),
            Self::ContentsNotObject => write!(f, "contents must be a JSON object"),
            Self::MissingDomain(domain) => write!(f, "contents is missing `{domain}`"),
            Self::WrongDomainShape { domain, expected } => {
                write!(f, "`{domain}` must be a JSON {expected}")
            }
        }
    }
}

impl Error for BcoValidationError {}

/// Canonical registry record.
///
/// `contents` keeps the domain sections as raw JSON rather than typed
/// structs, so records written against older section schemas still load,
/// validate and re-hash without migration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BcoObject {
    /// Stable internal ID used for storage, linking and auditing.
    pub uuid: BcoId,
    /// Public registry identifier. Kept as text so legacy spellings
    /// survive load; canonicalized by the revision pass and on update.
    pub object_id: String,
    /// Content hash over the record minus internal identity. Lowercase
    /// hex SHA-256 in practice; validation only requires alphanumeric.
    pub etag: String,
    /// Version of the external specification the contents conform to.
    pub spec_version: String,
    /// Publication lifecycle state.
    pub state: BcoState,
    /// Domain sections as submitted.
    pub contents: Value,
}

impl BcoObject {
    /// Creates a draft record with a generated internal ID and no etag yet.
    ///
    /// The etag is assigned by the registry service once the public
    /// identifier has been minted, since the identifier is part of the
    /// hashed content.
    pub fn draft(
        object_id: impl Into<String>,
        spec_version: impl Into<String>,
        contents: Value,
    ) -> Self {
        Self::with_id(Uuid::new_v4(), object_id, spec_version, contents)
    }

    /// Creates a draft record with a caller-provided internal ID.
    ///
    /// Used by import paths where identity already exists externally.
    pub fn with_id(
        uuid: BcoId,
        object_id: impl Into<String>,
        spec_version: impl Into<String>,
        contents: Value,
    ) -> Self {
        Self {
            uuid,
            object_id: object_id.into(),
            etag: String::new(),
            spec_version: spec_version.into(),
            state: BcoState::Draft,
            contents,
        }
    }

    /// Recomputes the content hash and stores it on the record.
    ///
    /// Must run after any change to hashed fields, in particular after the
    /// public identifier is assigned or revised.
    pub fn refresh_etag(&mut self) -> Result<(), FieldMapError> {
        let fields = canonical_fields(self)?;
        self.etag = compute_etag(&fields);
        Ok(())
    }

    /// Returns whether the stored etag matches the record's current content.
    pub fn etag_is_current(&self) -> Result<bool, FieldMapError> {
        let fields = canonical_fields(self)?;
        Ok(self.etag == compute_etag(&fields))
    }

    /// Checks every structural rule and returns the first violation.
    ///
    /// Enforced on write paths only. Read paths stay lenient so that
    /// records predating the current rules can be loaded and repaired.
    pub fn validate(&self) -> Result<(), BcoValidationError> {
        if self.uuid.is_nil() {
            return Err(BcoValidationError::NilUuid);
        }
        if self.object_id.trim().is_empty() {
            return Err(BcoValidationError::EmptyObjectId);
        }
        if self.etag.is_empty() || !self.etag.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(BcoValidationError::InvalidEtag(self.etag.clone()));
        }
        if self.spec_version.trim().is_empty() {
            return Err(BcoValidationError::EmptySpecVersion);
        }
        validate_contents(&self.contents)
    }
}

/// Checks that contents is an object carrying the five required domains
/// with their documented shapes, plus an optional array extension domain.
pub fn validate_contents(contents: &Value) -> Result<(), BcoValidationError> {
    let Value::Object(sections) = contents else {
        return Err(BcoValidationError::ContentsNotObject);
    };

    for (domain, shape) in REQUIRED_DOMAINS {
        let Some(section) = sections.get(domain) else {
            return Err(BcoValidationError::MissingDomain(domain));
        };
        let matches_shape = match shape {
            DomainShape::Object => section.is_object(),
            DomainShape::Array => section.is_array(),
        };
        if !matches_shape {
            return Err(BcoValidationError::WrongDomainShape {
                domain,
                expected: shape,
            });
        }
    }

    if let Some(extension) = sections.get(EXTENSION_DOMAIN) {
        if !extension.is_array() {
            return Err(BcoValidationError::WrongDomainShape {
                domain: EXTENSION_DOMAIN,
                expected: DomainShape::Array,
            });
        }
    }

    Ok(())
}
