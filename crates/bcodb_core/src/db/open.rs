//! Connection bootstrap for the registry store.
//!
//! # Responsibility
//! - Open file or in-memory store connections.
//! - Bring every connection to the latest schema before handing it out.
//!
//! # Invariants
//! - Returned connections have all migrations applied.
//! - Open and bootstrap failures are logged under the same `db_open`
//!   event before they propagate.
//!
//! # See also
//! - docs/architecture/data-model.md

use super::migrations::{apply_migrations, schema_version};
use super::DbResult;
use log::{error, info};
use rusqlite::Connection;
use std::path::Path;
use std::time::{Duration, Instant};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Opens the registry store file, creating and migrating it when needed.
///
/// # Side effects
/// - Emits `db_open` logging events with duration and status.
pub fn open_db(path: impl AsRef<Path>) -> DbResult<Connection> {
    open_with("file", || Connection::open(path))
}

/// Opens a private in-memory store, migrated and ready.
///
/// # Side effects
/// - Emits `db_open` logging events with duration and status.
pub fn open_db_in_memory() -> DbResult<Connection> {
    open_with("memory", Connection::open_in_memory)
}

fn open_with<F>(mode: &str, connect: F) -> DbResult<Connection>
where
    F: FnOnce() -> rusqlite::Result<Connection>,
{
    let started_at = Instant::now();
    info!("event=db_open module=db status=start mode={mode}");

    let result = connect().map_err(Into::into).and_then(|mut conn| {
        conn.busy_timeout(BUSY_TIMEOUT)?;
        apply_migrations(&mut conn)?;
        let version = schema_version(&conn)?;
        Ok((conn, version))
    });

    match result {
        Ok((conn, version)) => {
            info!(
                "event=db_open module=db status=ok mode={mode} duration_ms={} schema_version={version}",
                started_at.elapsed().as_millis()
            );
            Ok(conn)
        }
        Err(err) => {
            error!(
                "event=db_open module=db status=error mode={mode} duration_ms={} error={err}",
                started_at.elapsed().as_millis()
            );
            Err(err)
        }
    }
}
