//! SQLite migration registry and executor.
//!
//! # Responsibility
//! - Register schema migrations in strictly increasing version order.
//! - Apply whatever is pending and stamp `PRAGMA user_version`.
//!
//! # Invariants
//! - `version` values must remain monotonic.
//! - Pending migrations apply inside one transaction; a failure leaves
//!   `user_version` and the schema exactly where they were.

use crate::db::{DbError, DbResult};
use log::info;
use rusqlite::Connection;

#[derive(Debug, Clone, Copy)]
struct Migration {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "init",
        sql: include_str!("0001_init.sql"),
    },
    Migration {
        version: 2,
        name: "accessions",
        sql: include_str!("0002_accessions.sql"),
    },
];

/// Returns the latest migration version known by this binary.
pub fn latest_version() -> u32 {
    MIGRATIONS.last().map_or(0, |migration| migration.version)
}

/// Applies all pending migrations on the provided connection.
///
/// A database stamped newer than this binary fails with
/// `UnsupportedSchemaVersion`; a failing migration reports its version
/// via `MigrationFailed` and rolls the whole batch back.
///
/// # Side effects
/// - Emits one `db_migrate` logging event per migration applied.
pub fn apply_migrations(conn: &mut Connection) -> DbResult<()> {
    let current_version = schema_version(conn)?;
    let latest = latest_version();

    if current_version > latest {
        return Err(DbError::UnsupportedSchemaVersion {
            db_version: current_version,
            latest_supported: latest,
        });
    }

    if current_version == latest {
        return Ok(());
    }

    let tx = conn.transaction()?;
    let mut applied = Vec::new();
    for migration in MIGRATIONS {
        if migration.version <= current_version {
            continue;
        }

        tx.execute_batch(migration.sql)
            .map_err(|err| DbError::MigrationFailed {
                version: migration.version,
                source: err,
            })?;
        tx.execute_batch(&format!("PRAGMA user_version = {};", migration.version))?;
        applied.push(migration);
    }
    tx.commit()?;

    for migration in applied {
        info!(
            "event=db_migrate module=db status=ok version={} name={}",
            migration.version, migration.name
        );
    }

    Ok(())
}

/// Returns the schema version stamped on the connection.
pub fn schema_version(conn: &Connection) -> DbResult<u32> {
    let version = conn.query_row("PRAGMA user_version;", [], |row| row.get::<_, u32>(0))?;
    Ok(version)
}
