//! Registry identifier parsing, rendering and revision.
//!
//! # Responsibility
//! - Parse canonical and legacy registry identifiers leniently.
//! - Render the single canonical identifier form.
//! - Revise stored identifiers so repeating the revision is a no-op.
//!
//! # Invariants
//! - `revise_object_id` is idempotent: revising a canonical identifier
//!   returns it unchanged.
//! - Accession numbers are preserved by revision, never renumbered.
//! - Identifiers with no recognizable accession are rejected, not guessed.

use once_cell::sync::Lazy;
use regex::Regex;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Registry root used when a legacy identifier carries no usable one.
pub const DEFAULT_REGISTRY_ROOT: &str = "https://biocomputeobject.org";

static ACCESSION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bBCO[-_ ]?0*([0-9]+)").expect("valid accession regex"));
static VERSION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^v?([0-9]+)(?:\.([0-9]+))?$").expect("valid version regex"));

/// Error raised while parsing or building a registry identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObjectIdError {
    /// Input was empty or whitespace.
    Empty,
    /// Registry root was empty or whitespace.
    EmptyRoot,
    /// Registry root is not an absolute http/https URL.
    InvalidRoot(String),
    /// No `BCO_<number>` accession could be located in the input.
    MissingAccession(String),
    /// The accession digits do not fit the accession number type.
    AccessionOutOfRange(String),
}

impl Display for ObjectIdError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty => write!(f, "object id is empty"),
            Self::EmptyRoot => write!(f, "registry root is empty"),
            Self::InvalidRoot(root) => {
                write!(f, "registry root `{root}` is not an absolute http(s) URL")
            }
            Self::MissingAccession(raw) => {
                write!(f, "object id `{raw}` contains no BCO accession")
            }
            Self::AccessionOutOfRange(digits) => {
                write!(f, "accession `{digits}` is out of range")
            }
        }
    }
}

impl Error for ObjectIdError {}

/// Base URL of the registry that identifiers resolve against.
///
/// Normalized on construction: surrounding whitespace and trailing slashes
/// are dropped, so rendered identifiers never contain `//` after the root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryRoot(String);

impl RegistryRoot {
    /// Builds a validated registry root from configuration or user input.
    pub fn new(raw: impl Into<String>) -> Result<Self, ObjectIdError> {
        let raw = raw.into();
        let trimmed = raw.trim().trim_end_matches('/');
        if trimmed.is_empty() {
            return Err(ObjectIdError::EmptyRoot);
        }
        if !trimmed.starts_with("http://") && !trimmed.starts_with("https://") {
            return Err(ObjectIdError::InvalidRoot(trimmed.to_string()));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for RegistryRoot {
    fn default() -> Self {
        Self(DEFAULT_REGISTRY_ROOT.to_string())
    }
}

impl Display for RegistryRoot {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Two-part object version, rendered as `major.minor`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ObjectVersion {
    pub major: u32,
    pub minor: u32,
}

impl ObjectVersion {
    /// Version assigned to newly drafted objects.
    pub const INITIAL: Self = Self { major: 1, minor: 0 };
}

impl Display for ObjectVersion {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// Structured form of a registry identifier.
///
/// Stored records keep the identifier as text so unrecognizable legacy
/// values survive round trips; this type is the parse/render vehicle used
/// when minting and revising identifiers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectId {
    root: RegistryRoot,
    accession: u64,
    version: ObjectVersion,
}

impl ObjectId {
    pub fn new(root: RegistryRoot, accession: u64, version: ObjectVersion) -> Self {
        Self {
            root,
            accession,
            version,
        }
    }

    pub fn root(&self) -> &RegistryRoot {
        &self.root
    }

    pub fn accession(&self) -> u64 {
        self.accession
    }

    pub fn version(&self) -> ObjectVersion {
        self.version
    }

    /// Parses canonical and legacy identifier spellings.
    ///
    /// Accepted inputs include `https://example.org/BCO_000123/1.2`,
    /// `BCO_123`, `bco-123/v2` and other spellings that carry a `BCO`
    /// accession. Missing parts fall back: root to [`DEFAULT_REGISTRY_ROOT`],
    /// version to [`ObjectVersion::INITIAL`].
    pub fn parse(raw: &str) -> Result<Self, ObjectIdError> {
        Self::parse_with_root(raw, &RegistryRoot::default())
    }

    /// Parses like [`ObjectId::parse`], filling a missing or unusable
    /// registry root with `fallback` instead of the default.
    ///
    /// An identifier that carries its own valid root keeps it; the fallback
    /// never overrides what the input already says.
    pub fn parse_with_root(raw: &str, fallback: &RegistryRoot) -> Result<Self, ObjectIdError> {
        let text = raw.trim();
        if text.is_empty() {
            return Err(ObjectIdError::Empty);
        }

        let captures = ACCESSION_RE
            .captures(text)
            .ok_or_else(|| ObjectIdError::MissingAccession(text.to_string()))?;
        let accession_match = captures.get(0).expect("regex match has a full capture");
        let digits = captures
            .get(1)
            .expect("accession regex has a digit group")
            .as_str();
        let accession: u64 = digits
            .parse()
            .map_err(|_| ObjectIdError::AccessionOutOfRange(digits.to_string()))?;

        let root = match RegistryRoot::new(&text[..accession_match.start()]) {
            Ok(root) => root,
            Err(_) => fallback.clone(),
        };

        let version = text[accession_match.end()..]
            .split('/')
            .filter_map(parse_version_segment)
            .next()
            .unwrap_or(ObjectVersion::INITIAL);

        Ok(Self {
            root,
            accession,
            version,
        })
    }

    /// Renders the canonical identifier text.
    ///
    /// The accession is zero-padded to six digits to match registry display
    /// conventions; wider accessions render unpadded.
    pub fn canonical(&self) -> String {
        format!(
            "{}/BCO_{:06}/{}",
            self.root, self.accession, self.version
        )
    }
}

impl Display for ObjectId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.canonical())
    }
}

fn parse_version_segment(segment: &str) -> Option<ObjectVersion> {
    let captures = VERSION_RE.captures(segment.trim())?;
    let major = captures.get(1)?.as_str().parse().ok()?;
    let minor = match captures.get(2) {
        Some(minor) => minor.as_str().parse().ok()?,
        None => 0,
    };
    Some(ObjectVersion { major, minor })
}

/// Rewrites an identifier into its canonical form.
///
/// This is the revision function applied by the batch reviser and by object
/// updates: parse leniently, render canonically. `fallback` supplies the
/// registry root for spellings that carry none; an identifier with its own
/// valid root keeps it. Applying the function to an already canonical
/// identifier returns the same text, so re-running a revision pass never
/// mutates identifiers a second time.
pub fn revise_object_id(raw: &str, fallback: &RegistryRoot) -> Result<String, ObjectIdError> {
    Ok(ObjectId::parse_with_root(raw, fallback)?.canonical())
}

#[cfg(test)]
mod tests {
    use super::{revise_object_id, ObjectId, ObjectIdError, ObjectVersion, RegistryRoot};

    #[test]
    fn parses_canonical_identifier() {
        let id = ObjectId::parse("https://example.org/BCO_000123/1.2").expect("should parse");
        assert_eq!(id.root().as_str(), "https://example.org");
        assert_eq!(id.accession(), 123);
        assert_eq!(id.version(), ObjectVersion { major: 1, minor: 2 });
    }

    #[test]
    fn parses_bare_legacy_spellings() {
        let id = ObjectId::parse("bco-42").expect("should parse");
        assert_eq!(id.root().as_str(), super::DEFAULT_REGISTRY_ROOT);
        assert_eq!(id.accession(), 42);
        assert_eq!(id.version(), ObjectVersion::INITIAL);

        let id = ObjectId::parse("BCO_7/v3").expect("should parse");
        assert_eq!(id.version(), ObjectVersion { major: 3, minor: 0 });
    }

    #[test]
    fn parse_skips_non_version_path_segments() {
        let id = ObjectId::parse("https://example.org/BCO_5/DRAFT").expect("should parse");
        assert_eq!(id.version(), ObjectVersion::INITIAL);

        let id = ObjectId::parse("https://example.org/BCO_5/2.1/archive").expect("should parse");
        assert_eq!(id.version(), ObjectVersion { major: 2, minor: 1 });
    }

    #[test]
    fn parse_rejects_inputs_without_accession() {
        assert_eq!(ObjectId::parse("   "), Err(ObjectIdError::Empty));
        assert!(matches!(
            ObjectId::parse("https://w3id.org/biocompute/1.4.0/HCV1a.json"),
            Err(ObjectIdError::MissingAccession(_))
        ));
    }

    #[test]
    fn revision_is_idempotent() {
        let root = RegistryRoot::default();
        let once = revise_object_id("bco 19", &root).expect("should revise");
        let twice = revise_object_id(&once, &root).expect("should revise");
        assert_eq!(once, twice);
        assert_eq!(
            once,
            format!("{}/BCO_000019/1.0", super::DEFAULT_REGISTRY_ROOT)
        );
    }

    #[test]
    fn fallback_root_fills_rootless_spellings_only() {
        let fallback = RegistryRoot::new("https://registry.example.com").expect("valid root");

        let filled = revise_object_id("BCO_1", &fallback).expect("should revise");
        assert_eq!(filled, "https://registry.example.com/BCO_000001/1.0");

        let kept =
            revise_object_id("https://example.org/BCO_3/DRAFT", &fallback).expect("should revise");
        assert_eq!(kept, "https://example.org/BCO_000003/1.0");
    }

    #[test]
    fn canonical_padding_stops_at_six_digits() {
        let id = ObjectId::new(
            RegistryRoot::default(),
            1_234_567,
            ObjectVersion::INITIAL,
        );
        assert!(id.canonical().contains("/BCO_1234567/"));
    }

    #[test]
    fn registry_root_rejects_non_http_values() {
        assert!(RegistryRoot::new("ftp://example.org").is_err());
        assert!(RegistryRoot::new("  ").is_err());
        assert_eq!(
            RegistryRoot::new("https://example.org///")
                .expect("should normalize")
                .as_str(),
            "https://example.org"
        );
    }
}
