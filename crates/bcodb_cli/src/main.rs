//! Command line entry point for the bcodb registry store.
//!
//! # Responsibility
//! - Parse arguments, load configuration, and dispatch to core services.
//! - Own process-level concerns: logging setup, exit codes, console output.
//!
//! # Invariants
//! - A revision pass that completes exits 0 even when individual records
//!   failed; the printed report carries the per-record outcomes.
//! - Store access goes through `bcodb_core` repositories and services only.
//!
//! # See also
//! - docs/architecture/revision-pass.md

mod config;
mod report;

use crate::config::CliConfig;
use anyhow::Context;
use bcodb_core::db::migrations::schema_version;
use bcodb_core::db::open_db;
use bcodb_core::{
    default_log_level, init_logging, BcoState, RegistryRoot, RegistryService, ReviseMode,
    ReviseReport, ReviseService, SqliteBcoRepository,
};
use clap::{Parser, Subcommand};
use log::debug;
use std::path::PathBuf;

/// Top-level CLI for the bcodb registry store.
#[derive(Debug, Parser)]
#[command(name = "bcodb")]
#[command(about = "bcodb: SQLite-backed BioCompute object registry", long_about = None)]
struct Cli {
    /// Path to a TOML config file (default: ./bcodb.toml when present).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Path to the SQLite store; overrides the config file.
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Registry root URL for minted and repaired identifiers; overrides
    /// the config file.
    #[arg(long, global = true)]
    registry_root: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Re-derive the etag and canonical object id of every stored record.
    Revise {
        /// Compute and report without writing (same as `verify`).
        #[arg(long)]
        dry_run: bool,

        /// Print the full per-record report as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Report what a revision pass would change without writing anything.
    Verify {
        /// Print the full per-record report as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Show the store location and record count.
    Status,

    /// Draft a new object from a JSON contents file.
    Create {
        /// Path to a JSON file with the object's domain contents.
        contents: PathBuf,

        /// IEEE 2791 schema identifier recorded on the object.
        #[arg(
            long,
            default_value = "https://w3id.org/ieee/ieee-2791-schema/2791object.json"
        )]
        spec_version: String,
    },
}

fn main() {
    if let Err(err) = run() {
        eprintln!("bcodb error: {err:#}");
        std::process::exit(1);
    }
}

fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = CliConfig::load(cli.config.as_deref())?;
    let db_path = cli.db.unwrap_or_else(|| config.db_path.clone());
    let root = RegistryRoot::new(
        cli.registry_root
            .unwrap_or_else(|| config.registry_root.clone()),
    )?;

    // File logging is opt-in; without a configured directory the log
    // macros in core stay silent and the console is the only output.
    if let Some(log_dir) = &config.log_dir {
        let level = config
            .log_level
            .clone()
            .unwrap_or_else(|| default_log_level().to_string());
        init_logging(&level, log_dir)?;
    }
    debug!(
        "event=cli_start module=cli status=ok db={} registry_root={}",
        db_path.display(),
        config.registry_root
    );

    let conn = open_db(&db_path)
        .with_context(|| format!("failed to open store at {}", db_path.display()))?;
    let repo = SqliteBcoRepository::try_new(&conn)?;

    match cli.command {
        Command::Revise { dry_run, json } => {
            let mode = if dry_run {
                ReviseMode::DryRun
            } else {
                ReviseMode::Apply
            };
            let service = ReviseService::with_root(repo, root);
            let report = service.revise_all(mode)?;
            print_report(&report, json)?;
        }
        Command::Verify { json } => {
            let service = ReviseService::with_root(repo, root);
            let report = service.verify_all()?;
            print_report(&report, json)?;
        }
        Command::Status => {
            let schema = schema_version(&conn)?;
            let registry = RegistryService::new(repo);
            let total = registry.count_objects(None)?;
            let drafts = registry.count_objects(Some(BcoState::Draft))?;
            let published = registry.count_objects(Some(BcoState::Published))?;

            let verify = ReviseService::with_root(SqliteBcoRepository::try_new(&conn)?, root);
            let pending = verify.verify_all()?;

            println!(
                "store={} schema_version={schema} objects={total} drafts={drafts} \
                 published={published} pending_revisions={} revision_failures={}",
                db_path.display(),
                pending.revised(),
                pending.failed()
            );
        }
        Command::Create {
            contents,
            spec_version,
        } => {
            let raw = std::fs::read_to_string(&contents)
                .with_context(|| format!("failed to read {}", contents.display()))?;
            let value: serde_json::Value = serde_json::from_str(&raw)
                .with_context(|| format!("{} is not valid JSON", contents.display()))?;

            let service = RegistryService::with_root(repo, root);
            let object = service.draft_object(spec_version, value)?;
            println!(
                "created uuid={} object_id={} etag={}",
                object.uuid, object.object_id, object.etag
            );
        }
    }

    Ok(())
}

fn print_report(report: &ReviseReport, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", report::render_json(report)?);
    } else {
        print!("{}", report::render_text(report));
    }
    Ok(())
}
