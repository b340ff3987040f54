//! Core domain logic for the BioCompute object registry.
//! This crate is the single source of truth for business invariants.

pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use logging::{default_log_level, init_logging, LoggingError};
pub use model::biocompute::{BcoId, BcoObject, BcoState, BcoValidationError};
pub use model::etag::{canonical_fields, compute_etag, FieldMapError};
pub use model::object_id::{
    revise_object_id, ObjectId, ObjectIdError, ObjectVersion, RegistryRoot, DEFAULT_REGISTRY_ROOT,
};
pub use repo::bco_repo::{
    BcoListQuery, BcoRepository, RepoError, RepoResult, RevisionCandidate, SqliteBcoRepository,
};
pub use service::registry_service::{RegistryService, RegistryServiceError};
pub use service::revise_service::{
    ReviseMode, ReviseOutcome, ReviseReport, ReviseService, ReviseStatus,
};
