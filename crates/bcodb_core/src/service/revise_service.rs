//! Batch revision pass over stored registry objects.
//!
//! # Responsibility
//! - Re-derive `etag` and canonicalize `object_id` for every stored record.
//! - Report a per-record outcome for every row visited.
//!
//! # Invariants
//! - One failing record never aborts the pass; its outcome is recorded and
//!   the pass continues.
//! - Records already in canonical form are left untouched, so running the
//!   pass twice performs zero writes the second time.
//! - A dry run performs no writes at all.
//! - The pass is not transactional: an interrupted run leaves earlier
//!   records revised and later ones not, and can simply be re-run.
//!
//! # See also
//! - docs/architecture/revision-pass.md

use crate::model::biocompute::BcoObject;
use crate::model::object_id::{revise_object_id, RegistryRoot};
use crate::repo::bco_repo::{BcoRepository, RepoResult};
use log::{debug, error, info};
use serde::Serialize;
use std::fmt::{Display, Formatter};
use std::time::Instant;

/// Whether a pass persists its changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviseMode {
    /// Persist revised records.
    Apply,
    /// Compute and report, write nothing.
    DryRun,
}

impl Display for ReviseMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Apply => f.write_str("apply"),
            Self::DryRun => f.write_str("dry_run"),
        }
    }
}

/// Outcome of one record in a revision pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviseStatus {
    /// Record was out of date. Under [`ReviseMode::DryRun`] this means the
    /// record would have been written.
    Revised {
        etag_changed: bool,
        object_id_changed: bool,
    },
    /// Record already carries its canonical identifier and current etag.
    AlreadyCurrent,
    /// Record could not be revised; the stored row is unchanged.
    Failed { reason: String },
}

/// Per-record entry of a [`ReviseReport`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReviseOutcome {
    /// `uuid` column text of the visited row.
    pub uuid_text: String,
    /// Public identifier after the attempt; the stored value on failure.
    pub object_id: String,
    pub status: ReviseStatus,
}

/// Structured result of one revision pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReviseReport {
    pub mode: ReviseMode,
    /// One entry per stored row, in visiting order.
    pub outcomes: Vec<ReviseOutcome>,
}

impl ReviseReport {
    pub fn total(&self) -> usize {
        self.outcomes.len()
    }

    pub fn revised(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|outcome| matches!(outcome.status, ReviseStatus::Revised { .. }))
            .count()
    }

    pub fn already_current(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|outcome| outcome.status == ReviseStatus::AlreadyCurrent)
            .count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|outcome| matches!(outcome.status, ReviseStatus::Failed { .. }))
            .count()
    }

    /// Returns whether every visited record ended in a non-failure outcome.
    pub fn is_clean(&self) -> bool {
        self.failed() == 0
    }
}

/// Batch revision service over repository implementations.
pub struct ReviseService<R: BcoRepository> {
    repo: R,
    root: RegistryRoot,
}

impl<R: BcoRepository> ReviseService<R> {
    /// Creates a service filling rootless identifiers with the default
    /// registry root.
    pub fn new(repo: R) -> Self {
        Self::with_root(repo, RegistryRoot::default())
    }

    /// Creates a service filling rootless identifiers with the provided
    /// root. Identifiers that carry their own valid root keep it.
    pub fn with_root(repo: R, root: RegistryRoot) -> Self {
        Self { repo, root }
    }

    /// Visits every stored record and brings `etag` and `object_id` up to
    /// date.
    ///
    /// For each row: decode, canonicalize the identifier, re-derive the
    /// etag over the identified record, and persist only when either field
    /// actually changed. Decode and persist failures become `Failed`
    /// outcomes for that row alone.
    ///
    /// An empty store yields an empty report and is not an error.
    ///
    /// # Side effects
    /// - Emits `revise_all` logging events with counts and duration.
    /// - Emits `revise_record` error events for per-record failures.
    pub fn revise_all(&self, mode: ReviseMode) -> RepoResult<ReviseReport> {
        let started_at = Instant::now();
        info!("event=revise_all module=service status=start mode={mode}");

        let candidates = match self.repo.load_revision_candidates() {
            Ok(candidates) => candidates,
            Err(err) => {
                error!(
                    "event=revise_all module=service status=error mode={mode} duration_ms={} error_code=load_failed error={}",
                    started_at.elapsed().as_millis(),
                    err
                );
                return Err(err);
            }
        };

        let mut outcomes = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            let outcome =
                self.revise_one(mode, candidate.uuid_text, candidate.object_id, candidate.decoded);
            if let ReviseStatus::Failed { reason } = &outcome.status {
                error!(
                    "event=revise_record module=service status=error mode={mode} uuid={} error={}",
                    outcome.uuid_text, reason
                );
            } else {
                debug!(
                    "event=revise_record module=service status=ok mode={mode} uuid={} outcome={:?}",
                    outcome.uuid_text, outcome.status
                );
            }
            outcomes.push(outcome);
        }

        let report = ReviseReport { mode, outcomes };
        info!(
            "event=revise_all module=service status=ok mode={mode} duration_ms={} total={} revised={} already_current={} failed={}",
            started_at.elapsed().as_millis(),
            report.total(),
            report.revised(),
            report.already_current(),
            report.failed()
        );

        Ok(report)
    }

    /// Dry-run convenience wrapper: reports what [`Self::revise_all`] would
    /// change without writing anything.
    pub fn verify_all(&self) -> RepoResult<ReviseReport> {
        self.revise_all(ReviseMode::DryRun)
    }

    fn revise_one(
        &self,
        mode: ReviseMode,
        uuid_text: String,
        stored_object_id: String,
        decoded: RepoResult<BcoObject>,
    ) -> ReviseOutcome {
        let mut object = match decoded {
            Ok(object) => object,
            Err(err) => {
                return ReviseOutcome {
                    uuid_text,
                    object_id: stored_object_id,
                    status: ReviseStatus::Failed {
                        reason: err.to_string(),
                    },
                };
            }
        };

        let revised_id = match revise_object_id(&object.object_id, &self.root) {
            Ok(revised_id) => revised_id,
            Err(err) => {
                return ReviseOutcome {
                    uuid_text,
                    object_id: stored_object_id,
                    status: ReviseStatus::Failed {
                        reason: err.to_string(),
                    },
                };
            }
        };

        let object_id_changed = revised_id != object.object_id;
        object.object_id = revised_id;

        let previous_etag = object.etag.clone();
        if let Err(err) = object.refresh_etag() {
            return ReviseOutcome {
                uuid_text,
                object_id: stored_object_id,
                status: ReviseStatus::Failed {
                    reason: err.to_string(),
                },
            };
        }
        let etag_changed = object.etag != previous_etag;

        if !etag_changed && !object_id_changed {
            return ReviseOutcome {
                uuid_text,
                object_id: object.object_id,
                status: ReviseStatus::AlreadyCurrent,
            };
        }

        if mode == ReviseMode::Apply {
            if let Err(err) = self.repo.update_object(&object) {
                return ReviseOutcome {
                    uuid_text,
                    object_id: stored_object_id,
                    status: ReviseStatus::Failed {
                        reason: err.to_string(),
                    },
                };
            }
        }

        ReviseOutcome {
            uuid_text,
            object_id: object.object_id,
            status: ReviseStatus::Revised {
                etag_changed,
                object_id_changed,
            },
        }
    }
}
