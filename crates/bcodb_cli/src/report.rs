//! Console rendering for revision pass reports.
//!
//! # Responsibility
//! - Render a `ReviseReport` as human-readable text or machine-readable
//!   JSON.
//!
//! # Invariants
//! - Text output always carries the four counters, plus one line per
//!   revised or failed record; current records are counted only.
//! - JSON output is the full report, one outcome per stored row.

use anyhow::Context;
use bcodb_core::{ReviseMode, ReviseReport, ReviseStatus};
use std::fmt::Write as _;

/// Renders the pass summary and its failures as console text.
pub fn render_text(report: &ReviseReport) -> String {
    let mut out = String::new();

    let heading = match report.mode {
        ReviseMode::Apply => "revision pass",
        ReviseMode::DryRun => "revision pass (dry run, nothing written)",
    };
    // Writing to a String cannot fail.
    let _ = writeln!(out, "{heading}");
    let _ = writeln!(
        out,
        "  total={} revised={} already_current={} failed={}",
        report.total(),
        report.revised(),
        report.already_current(),
        report.failed()
    );

    for outcome in &report.outcomes {
        match &outcome.status {
            ReviseStatus::Revised {
                etag_changed,
                object_id_changed,
            } => {
                let _ = writeln!(
                    out,
                    "  revised uuid={} object_id={} changed={}",
                    outcome.uuid_text,
                    outcome.object_id,
                    changed_fields(*etag_changed, *object_id_changed)
                );
            }
            ReviseStatus::Failed { reason } => {
                let _ = writeln!(
                    out,
                    "  failed uuid={} object_id={}: {reason}",
                    outcome.uuid_text, outcome.object_id
                );
            }
            ReviseStatus::AlreadyCurrent => {}
        }
    }

    out
}

fn changed_fields(etag_changed: bool, object_id_changed: bool) -> &'static str {
    match (etag_changed, object_id_changed) {
        (true, true) => "etag,object_id",
        (true, false) => "etag",
        (false, true) => "object_id",
        (false, false) => "none",
    }
}

/// Renders the full report as pretty-printed JSON.
pub fn render_json(report: &ReviseReport) -> anyhow::Result<String> {
    serde_json::to_string_pretty(report).context("failed to serialize revision report")
}
