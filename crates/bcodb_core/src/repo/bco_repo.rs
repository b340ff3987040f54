//! Registry object repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Provide stable CRUD APIs over canonical `bco_objects` storage.
//! - Mint accession numbers from the `bco_sequences` counter.
//! - Keep SQL details inside the core persistence boundary.
//!
//! # Invariants
//! - Write paths must call `BcoObject::validate()` before SQL mutations.
//! - Read paths decode storage faithfully but do not re-validate content,
//!   so rows predating current rules can be loaded and repaired.
//! - `object_id` is unique across the store; collisions surface as
//!   `DuplicateObjectId`, never as silent overwrites.

use crate::db::migrations::latest_version;
use crate::db::DbError;
use crate::model::biocompute::{BcoId, BcoObject, BcoState, BcoValidationError};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

const BCO_SELECT_SQL: &str = "SELECT
    uuid,
    object_id,
    etag,
    spec_version,
    state,
    contents
FROM bco_objects";

pub type RepoResult<T> = Result<T, RepoError>;

/// Generic repository error for registry persistence and query operations.
#[derive(Debug)]
pub enum RepoError {
    Validation(BcoValidationError),
    Db(DbError),
    NotFound(BcoId),
    /// Another record already holds the target `object_id`.
    DuplicateObjectId(String),
    InvalidData(String),
    /// Connection has not been migrated to the expected schema version.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    MissingRequiredTable(&'static str),
    MissingRequiredColumn {
        table: &'static str,
        column: &'static str,
    },
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound(id) => write!(f, "object not found: {id}"),
            Self::DuplicateObjectId(object_id) => {
                write!(f, "object_id `{object_id}` already exists")
            }
            Self::InvalidData(message) => write!(f, "invalid persisted object data: {message}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "connection is not migrated: schema version {actual_version}, expected {expected_version}"
            ),
            Self::MissingRequiredTable(table) => {
                write!(f, "required table `{table}` is missing")
            }
            Self::MissingRequiredColumn { table, column } => {
                write!(f, "required column `{table}.{column}` is missing")
            }
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<BcoValidationError> for RepoError {
    fn from(value: BcoValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Query options for listing registry objects.
#[derive(Debug, Clone, Default)]
pub struct BcoListQuery {
    pub state: Option<BcoState>,
    pub limit: Option<u32>,
    pub offset: u32,
}

/// Row-level read model for batch repair passes.
///
/// Decode failures are carried per row instead of failing the whole query,
/// so one corrupt record cannot hide the rest of the store from a repair.
#[derive(Debug)]
pub struct RevisionCandidate {
    /// `uuid` column text as stored, decoded or not.
    pub uuid_text: String,
    /// `object_id` column text as stored.
    pub object_id: String,
    /// Full record decode result for this row.
    pub decoded: RepoResult<BcoObject>,
}

/// Repository interface for registry object CRUD and accession minting.
pub trait BcoRepository {
    fn create_object(&self, object: &BcoObject) -> RepoResult<BcoId>;
    fn update_object(&self, object: &BcoObject) -> RepoResult<()>;
    fn get_object(&self, id: BcoId) -> RepoResult<Option<BcoObject>>;
    fn find_by_object_id(&self, object_id: &str) -> RepoResult<Option<BcoObject>>;
    fn list_objects(&self, query: &BcoListQuery) -> RepoResult<Vec<BcoObject>>;
    /// Returns every stored row in insertion order with its per-row decode
    /// result, including rows current rules would reject. Batch repair
    /// passes iterate this.
    fn load_revision_candidates(&self) -> RepoResult<Vec<RevisionCandidate>>;
    fn count_objects(&self, state: Option<BcoState>) -> RepoResult<u64>;
    /// Reserves and returns the next accession number. Numbers are handed
    /// out once and never reused, even when a draft is abandoned.
    fn next_accession(&self) -> RepoResult<u64>;
}

/// SQLite-backed registry object repository.
pub struct SqliteBcoRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteBcoRepository<'conn> {
    /// Constructs a repository from a migrated/ready connection.
    ///
    /// Rejects connections whose schema version or shape does not match
    /// what this binary was built against.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn)?;
        Ok(Self { conn })
    }
}

impl BcoRepository for SqliteBcoRepository<'_> {
    fn create_object(&self, object: &BcoObject) -> RepoResult<BcoId> {
        object.validate()?;

        let contents = encode_contents(object)?;
        self.conn
            .execute(
                "INSERT INTO bco_objects (
                    uuid,
                    object_id,
                    etag,
                    spec_version,
                    state,
                    contents
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
                params![
                    object.uuid.to_string(),
                    object.object_id.as_str(),
                    object.etag.as_str(),
                    object.spec_version.as_str(),
                    state_to_db(object.state),
                    contents.as_str(),
                ],
            )
            .map_err(|err| map_object_id_conflict(err, &object.object_id))?;

        Ok(object.uuid)
    }

    fn update_object(&self, object: &BcoObject) -> RepoResult<()> {
        object.validate()?;

        let contents = encode_contents(object)?;
        let changed = self
            .conn
            .execute(
                "UPDATE bco_objects
                 SET
                    object_id = ?1,
                    etag = ?2,
                    spec_version = ?3,
                    state = ?4,
                    contents = ?5,
                    updated_at = (strftime('%s', 'now') * 1000)
                 WHERE uuid = ?6;",
                params![
                    object.object_id.as_str(),
                    object.etag.as_str(),
                    object.spec_version.as_str(),
                    state_to_db(object.state),
                    contents.as_str(),
                    object.uuid.to_string(),
                ],
            )
            .map_err(|err| map_object_id_conflict(err, &object.object_id))?;

        if changed == 0 {
            return Err(RepoError::NotFound(object.uuid));
        }

        Ok(())
    }

    fn get_object(&self, id: BcoId) -> RepoResult<Option<BcoObject>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{BCO_SELECT_SQL} WHERE uuid = ?1;"))?;

        let mut rows = stmt.query([id.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_bco_row(row)?));
        }

        Ok(None)
    }

    fn find_by_object_id(&self, object_id: &str) -> RepoResult<Option<BcoObject>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{BCO_SELECT_SQL} WHERE object_id = ?1;"))?;

        let mut rows = stmt.query([object_id])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_bco_row(row)?));
        }

        Ok(None)
    }

    fn list_objects(&self, query: &BcoListQuery) -> RepoResult<Vec<BcoObject>> {
        let mut sql = format!("{BCO_SELECT_SQL} WHERE 1 = 1");
        let mut bind_values: Vec<Value> = Vec::new();

        if let Some(state) = query.state {
            sql.push_str(" AND state = ?");
            bind_values.push(Value::Text(state_to_db(state).to_string()));
        }

        sql.push_str(" ORDER BY object_id ASC, uuid ASC");

        if let Some(limit) = query.limit {
            sql.push_str(" LIMIT ?");
            bind_values.push(Value::Integer(i64::from(limit)));
            if query.offset > 0 {
                sql.push_str(" OFFSET ?");
                bind_values.push(Value::Integer(i64::from(query.offset)));
            }
        } else if query.offset > 0 {
            sql.push_str(" LIMIT -1 OFFSET ?");
            bind_values.push(Value::Integer(i64::from(query.offset)));
        }

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut objects = Vec::new();

        while let Some(row) = rows.next()? {
            objects.push(parse_bco_row(row)?);
        }

        Ok(objects)
    }

    fn load_revision_candidates(&self) -> RepoResult<Vec<RevisionCandidate>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{BCO_SELECT_SQL} ORDER BY rowid ASC;"))?;
        let mut rows = stmt.query([])?;
        let mut candidates = Vec::new();

        while let Some(row) = rows.next()? {
            candidates.push(RevisionCandidate {
                uuid_text: row.get("uuid")?,
                object_id: row.get("object_id")?,
                decoded: parse_bco_row(row),
            });
        }

        Ok(candidates)
    }

    fn count_objects(&self, state: Option<BcoState>) -> RepoResult<u64> {
        let count: i64 = match state {
            Some(state) => self.conn.query_row(
                "SELECT COUNT(*) FROM bco_objects WHERE state = ?1;",
                [state_to_db(state)],
                |row| row.get(0),
            )?,
            None => self
                .conn
                .query_row("SELECT COUNT(*) FROM bco_objects;", [], |row| row.get(0))?,
        };

        u64::try_from(count)
            .map_err(|_| RepoError::InvalidData(format!("negative row count `{count}`")))
    }

    fn next_accession(&self) -> RepoResult<u64> {
        let value: i64 = self
            .conn
            .query_row(
                "UPDATE bco_sequences
                 SET value = value + 1
                 WHERE name = 'accession'
                 RETURNING value;",
                [],
                |row| row.get(0),
            )
            .map_err(|err| match err {
                rusqlite::Error::QueryReturnedNoRows => RepoError::InvalidData(
                    "bco_sequences has no `accession` row".to_string(),
                ),
                other => other.into(),
            })?;

        u64::try_from(value).map_err(|_| {
            RepoError::InvalidData(format!("negative accession counter `{value}`"))
        })
    }
}

fn parse_bco_row(row: &Row<'_>) -> RepoResult<BcoObject> {
    let uuid_text: String = row.get("uuid")?;
    let uuid = Uuid::parse_str(&uuid_text).map_err(|_| {
        RepoError::InvalidData(format!("invalid uuid value `{uuid_text}` in bco_objects.uuid"))
    })?;

    let state_text: String = row.get("state")?;
    let state = parse_state(&state_text).ok_or_else(|| {
        RepoError::InvalidData(format!("invalid state `{state_text}` in bco_objects.state"))
    })?;

    let contents_text: String = row.get("contents")?;
    let contents = serde_json::from_str(&contents_text).map_err(|err| {
        RepoError::InvalidData(format!(
            "unparseable JSON in bco_objects.contents for `{uuid_text}`: {err}"
        ))
    })?;

    Ok(BcoObject {
        uuid,
        object_id: row.get("object_id")?,
        etag: row.get("etag")?,
        spec_version: row.get("spec_version")?,
        state,
        contents,
    })
}

fn encode_contents(object: &BcoObject) -> RepoResult<String> {
    serde_json::to_string(&object.contents).map_err(|err| {
        RepoError::InvalidData(format!(
            "contents of `{}` cannot be serialized: {err}",
            object.uuid
        ))
    })
}

fn state_to_db(state: BcoState) -> &'static str {
    match state {
        BcoState::Draft => "draft",
        BcoState::Published => "published",
    }
}

fn parse_state(value: &str) -> Option<BcoState> {
    match value {
        "draft" => Some(BcoState::Draft),
        "published" => Some(BcoState::Published),
        _ => None,
    }
}

fn map_object_id_conflict(err: rusqlite::Error, object_id: &str) -> RepoError {
    if is_object_id_conflict(&err) {
        return RepoError::DuplicateObjectId(object_id.to_string());
    }

    RepoError::Db(DbError::Sqlite(err))
}

fn is_object_id_conflict(err: &rusqlite::Error) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(failure, Some(message)) => {
            failure.code == rusqlite::ErrorCode::ConstraintViolation
                && message.contains("bco_objects.object_id")
        }
        _ => false,
    }
}

fn ensure_connection_ready(conn: &Connection) -> RepoResult<()> {
    let actual_version =
        conn.query_row("PRAGMA user_version;", [], |row| row.get::<_, u32>(0))?;
    let expected_version = latest_version();
    if actual_version != expected_version {
        return Err(RepoError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }

    for table in ["bco_objects", "bco_sequences"] {
        if !table_exists(conn, table)? {
            return Err(RepoError::MissingRequiredTable(table));
        }
    }

    for column in [
        "uuid",
        "object_id",
        "etag",
        "spec_version",
        "state",
        "contents",
    ] {
        if !table_has_column(conn, "bco_objects", column)? {
            return Err(RepoError::MissingRequiredColumn {
                table: "bco_objects",
                column,
            });
        }
    }

    for column in ["name", "value"] {
        if !table_has_column(conn, "bco_sequences", column)? {
            return Err(RepoError::MissingRequiredColumn {
                table: "bco_sequences",
                column,
            });
        }
    }

    Ok(())
}

fn table_exists(conn: &Connection, table: &'static str) -> RepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> RepoResult<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table});"))?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let current: String = row.get(1)?;
        if current == column {
            return Ok(true);
        }
    }
    Ok(false)
}
