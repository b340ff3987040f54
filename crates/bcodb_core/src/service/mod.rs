//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate repository calls into use-case level APIs.
//! - Keep CLI layers decoupled from storage details.
//!
//! # Invariants
//! - All write paths route content hashing and identifier revision through
//!   the single model-level functions, never local copies.

pub mod registry_service;
pub mod revise_service;
