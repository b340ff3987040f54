//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define use-case oriented data access contracts for registry objects.
//! - Isolate SQLite query details from service/business orchestration.
//!
//! # Invariants
//! - Repository writes must enforce `BcoObject::validate()` before
//!   persistence.
//! - Repository reads stay lenient so records written under older rules can
//!   be loaded and repaired.
//! - Repository APIs return semantic errors (`NotFound`, `DuplicateObjectId`)
//!   in addition to DB transport errors.

pub mod bco_repo;
