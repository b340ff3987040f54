//! Registry object use-case service.
//!
//! # Responsibility
//! - Mint accessions and public identifiers for new drafts.
//! - Keep `etag` and `object_id` coherent on every write.
//! - Provide stable lookup/list entry points for core callers.
//!
//! # Invariants
//! - The public identifier is assigned before the etag is computed, since
//!   the identifier is part of the hashed content.
//! - Every persisted write re-derives the etag from current content.
//! - Accession numbers are never reused, even when a create fails.
//!
//! # See also
//! - docs/architecture/data-model.md

use crate::model::biocompute::{BcoId, BcoObject, BcoState};
use crate::model::etag::FieldMapError;
use crate::model::object_id::{revise_object_id, ObjectId, ObjectVersion, RegistryRoot};
use crate::repo::bco_repo::{BcoListQuery, BcoRepository, RepoError, RepoResult};
use serde_json::Value;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Service error for registry object use-cases.
#[derive(Debug)]
pub enum RegistryServiceError {
    /// Target object does not exist.
    ObjectNotFound(BcoId),
    /// Persistence-layer failure.
    Repo(RepoError),
    /// Record content could not be hashed.
    Content(FieldMapError),
    /// Internal consistency mismatch between write and read-back.
    InconsistentState(&'static str),
}

impl Display for RegistryServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ObjectNotFound(id) => write!(f, "object not found: {id}"),
            Self::Repo(err) => write!(f, "{err}"),
            Self::Content(err) => write!(f, "{err}"),
            Self::InconsistentState(details) => {
                write!(f, "inconsistent registry state: {details}")
            }
        }
    }
}

impl Error for RegistryServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            Self::Content(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for RegistryServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound(id) => Self::ObjectNotFound(id),
            other => Self::Repo(other),
        }
    }
}

impl From<FieldMapError> for RegistryServiceError {
    fn from(value: FieldMapError) -> Self {
        Self::Content(value)
    }
}

/// Registry service facade over repository implementations.
pub struct RegistryService<R: BcoRepository> {
    repo: R,
    root: RegistryRoot,
}

impl<R: BcoRepository> RegistryService<R> {
    /// Creates a service minting identifiers under the default registry root.
    pub fn new(repo: R) -> Self {
        Self::with_root(repo, RegistryRoot::default())
    }

    /// Creates a service minting identifiers under the provided root.
    pub fn with_root(repo: R, root: RegistryRoot) -> Self {
        Self { repo, root }
    }

    /// Drafts a new registry object from submitted contents.
    ///
    /// # Contract
    /// - Reserves the next accession and renders the canonical identifier.
    /// - Computes the etag over the identified record.
    /// - Returns the stored record as read back from the repository.
    pub fn draft_object(
        &self,
        spec_version: impl Into<String>,
        contents: Value,
    ) -> Result<BcoObject, RegistryServiceError> {
        let accession = self.repo.next_accession()?;
        let object_id = ObjectId::new(self.root.clone(), accession, ObjectVersion::INITIAL);

        let mut object = BcoObject::draft(object_id.canonical(), spec_version, contents);
        object.refresh_etag()?;

        let id = self.repo.create_object(&object)?;
        self.repo
            .get_object(id)?
            .ok_or(RegistryServiceError::InconsistentState(
                "created object not found in read-back",
            ))
    }

    /// Replaces the contents and spec version of an existing object.
    ///
    /// The stored identifier is canonicalized and the etag re-derived, so
    /// an update through this path always leaves the record coherent.
    pub fn update_object(
        &self,
        id: BcoId,
        spec_version: impl Into<String>,
        contents: Value,
    ) -> Result<BcoObject, RegistryServiceError> {
        let mut object = self
            .repo
            .get_object(id)?
            .ok_or(RegistryServiceError::ObjectNotFound(id))?;

        object.spec_version = spec_version.into();
        object.contents = contents;
        if let Ok(canonical) = revise_object_id(&object.object_id, &self.root) {
            object.object_id = canonical;
        }
        object.refresh_etag()?;

        self.repo.update_object(&object)?;
        self.repo
            .get_object(id)?
            .ok_or(RegistryServiceError::InconsistentState(
                "updated object not found in read-back",
            ))
    }

    /// Moves an object into the published lifecycle state.
    ///
    /// Publication is part of hashed content, so the etag changes here.
    pub fn publish_object(&self, id: BcoId) -> Result<BcoObject, RegistryServiceError> {
        let mut object = self
            .repo
            .get_object(id)?
            .ok_or(RegistryServiceError::ObjectNotFound(id))?;

        object.state = BcoState::Published;
        object.refresh_etag()?;

        self.repo.update_object(&object)?;
        self.repo
            .get_object(id)?
            .ok_or(RegistryServiceError::InconsistentState(
                "published object not found in read-back",
            ))
    }

    /// Gets one object by internal ID.
    pub fn get_object(&self, id: BcoId) -> RepoResult<Option<BcoObject>> {
        self.repo.get_object(id)
    }

    /// Finds one object by public identifier.
    ///
    /// The input is canonicalized first, so legacy spellings of an
    /// identifier resolve to the stored canonical record. Inputs with no
    /// recognizable accession fall back to an exact text match.
    pub fn find_by_object_id(&self, object_id: &str) -> RepoResult<Option<BcoObject>> {
        if let Ok(canonical) = revise_object_id(object_id, &self.root) {
            if let Some(object) = self.repo.find_by_object_id(&canonical)? {
                return Ok(Some(object));
            }
        }

        self.repo.find_by_object_id(object_id)
    }

    /// Lists objects using filter and pagination options.
    pub fn list_objects(&self, query: &BcoListQuery) -> RepoResult<Vec<BcoObject>> {
        self.repo.list_objects(query)
    }

    /// Returns the number of stored objects, optionally for one state.
    pub fn count_objects(&self, state: Option<BcoState>) -> RepoResult<u64> {
        self.repo.count_objects(state)
    }
}
