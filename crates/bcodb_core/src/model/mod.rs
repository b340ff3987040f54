//! Domain model for BioCompute registry records.
//!
//! # Responsibility
//! - Define the canonical record shape and its structural rules.
//! - Provide the content-hash and identifier functions shared by creation
//!   and revision paths.
//!
//! # Invariants
//! - Every record is identified by a stable `BcoId`.
//! - One hashing function and one identifier-revision function serve all
//!   write paths, so stored hashes never drift between code paths.
//!
//! # See also
//! - docs/architecture/data-model.md

pub mod biocompute;
pub mod etag;
pub mod object_id;
