use bcodb_core::db::open_db_in_memory;
use bcodb_core::{
    canonical_fields, compute_etag, BcoRepository, RegistryRoot, ReviseMode, ReviseService,
    ReviseStatus, SqliteBcoRepository,
};
use rusqlite::{params, Connection};
use serde_json::json;
use uuid::Uuid;

fn minimal_contents_text() -> String {
    json!({
        "provenance_domain": { "name": "assembly", "version": "1.0" },
        "usability_domain": ["assembles contigs from short reads"],
        "description_domain": { "pipeline_steps": [] },
        "execution_domain": { "script": ["assemble.sh"] },
        "io_domain": { "input_subdomain": [], "output_subdomain": [] }
    })
    .to_string()
}

/// Inserts a row the way older application versions wrote them: no etag,
/// whatever identifier spelling was in use at the time.
fn seed_row(conn: &Connection, uuid: &str, object_id: &str, etag: &str, contents: &str) {
    conn.execute(
        "INSERT INTO bco_objects (uuid, object_id, etag, spec_version, state, contents)
         VALUES (?1, ?2, ?3, '2791', 'draft', ?4);",
        params![uuid, object_id, etag, contents],
    )
    .unwrap();
}

fn stored_column(conn: &Connection, uuid: &str, column: &str) -> String {
    conn.query_row(
        &format!("SELECT {column} FROM bco_objects WHERE uuid = ?1;"),
        [uuid],
        |row| row.get(0),
    )
    .unwrap()
}

fn stored_updated_at(conn: &Connection, uuid: &str) -> i64 {
    conn.query_row(
        "SELECT updated_at FROM bco_objects WHERE uuid = ?1;",
        [uuid],
        |row| row.get(0),
    )
    .unwrap()
}

#[test]
fn revise_all_backfills_etags_and_canonicalizes_identifiers() {
    let conn = open_db_in_memory().unwrap();
    seed_row(
        &conn,
        "00000000-0000-4000-8000-000000000001",
        "BCO_1",
        "",
        &minimal_contents_text(),
    );
    seed_row(
        &conn,
        "00000000-0000-4000-8000-000000000002",
        "bco-0002",
        "",
        &minimal_contents_text(),
    );
    seed_row(
        &conn,
        "00000000-0000-4000-8000-000000000003",
        "https://example.org/BCO_3/DRAFT",
        "",
        &minimal_contents_text(),
    );

    let repo = SqliteBcoRepository::try_new(&conn).unwrap();
    let service = ReviseService::new(repo);
    let report = service.revise_all(ReviseMode::Apply).unwrap();

    assert_eq!(report.total(), 3);
    assert_eq!(report.revised(), 3);
    assert_eq!(report.failed(), 0);
    assert!(report.is_clean());
    for outcome in &report.outcomes {
        assert!(matches!(
            outcome.status,
            ReviseStatus::Revised {
                etag_changed: true,
                object_id_changed: true,
            }
        ));
    }

    let repo = SqliteBcoRepository::try_new(&conn).unwrap();
    let expected_ids = [
        (
            "00000000-0000-4000-8000-000000000001",
            "https://biocomputeobject.org/BCO_000001/1.0",
        ),
        (
            "00000000-0000-4000-8000-000000000002",
            "https://biocomputeobject.org/BCO_000002/1.0",
        ),
        (
            "00000000-0000-4000-8000-000000000003",
            "https://example.org/BCO_000003/1.0",
        ),
    ];
    for (uuid, expected_id) in expected_ids {
        let loaded = repo
            .get_object(Uuid::parse_str(uuid).unwrap())
            .unwrap()
            .unwrap();
        assert_eq!(loaded.object_id, expected_id);
        assert!(loaded.etag_is_current().unwrap());
        assert_eq!(loaded.etag, compute_etag(&canonical_fields(&loaded).unwrap()));
    }
}

#[test]
fn configured_root_fills_rootless_identifiers_only() {
    let conn = open_db_in_memory().unwrap();
    seed_row(
        &conn,
        "00000000-0000-4000-8000-000000000001",
        "BCO_1",
        "",
        &minimal_contents_text(),
    );
    seed_row(
        &conn,
        "00000000-0000-4000-8000-000000000002",
        "https://example.org/BCO_2/DRAFT",
        "",
        &minimal_contents_text(),
    );

    let repo = SqliteBcoRepository::try_new(&conn).unwrap();
    let root = RegistryRoot::new("https://registry.example.com").unwrap();
    let service = ReviseService::with_root(repo, root);
    let report = service.revise_all(ReviseMode::Apply).unwrap();
    assert!(report.is_clean());

    assert_eq!(
        stored_column(&conn, "00000000-0000-4000-8000-000000000001", "object_id"),
        "https://registry.example.com/BCO_000001/1.0"
    );
    assert_eq!(
        stored_column(&conn, "00000000-0000-4000-8000-000000000002", "object_id"),
        "https://example.org/BCO_000002/1.0"
    );
}

#[test]
fn second_pass_reports_every_record_already_current() {
    let conn = open_db_in_memory().unwrap();
    seed_row(
        &conn,
        "00000000-0000-4000-8000-000000000001",
        "BCO_1",
        "",
        &minimal_contents_text(),
    );

    let repo = SqliteBcoRepository::try_new(&conn).unwrap();
    let service = ReviseService::new(repo);
    service.revise_all(ReviseMode::Apply).unwrap();

    // Timestamp writes have second granularity; a sentinel makes any
    // second-pass write visible regardless of timing.
    conn.execute("UPDATE bco_objects SET updated_at = 1234567890000;", [])
        .unwrap();

    let second = service.revise_all(ReviseMode::Apply).unwrap();
    assert_eq!(second.total(), 1);
    assert_eq!(second.already_current(), 1);
    assert_eq!(second.revised(), 0);

    assert_eq!(
        stored_updated_at(&conn, "00000000-0000-4000-8000-000000000001"),
        1_234_567_890_000
    );
}

#[test]
fn empty_store_yields_empty_report() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteBcoRepository::try_new(&conn).unwrap();
    let service = ReviseService::new(repo);

    let report = service.revise_all(ReviseMode::Apply).unwrap();
    assert_eq!(report.total(), 0);
    assert!(report.is_clean());
}

#[test]
fn one_bad_record_does_not_abort_the_pass() {
    let conn = open_db_in_memory().unwrap();
    seed_row(
        &conn,
        "00000000-0000-4000-8000-000000000001",
        "BCO_1",
        "",
        &minimal_contents_text(),
    );
    seed_row(
        &conn,
        "00000000-0000-4000-8000-000000000002",
        "BCO_2",
        "",
        "this is not json",
    );
    seed_row(
        &conn,
        "00000000-0000-4000-8000-000000000003",
        "BCO_3",
        "",
        &minimal_contents_text(),
    );

    let repo = SqliteBcoRepository::try_new(&conn).unwrap();
    let service = ReviseService::new(repo);
    let report = service.revise_all(ReviseMode::Apply).unwrap();

    assert_eq!(report.total(), 3);
    assert_eq!(report.revised(), 2);
    assert_eq!(report.failed(), 1);
    assert!(!report.is_clean());

    let failed = report
        .outcomes
        .iter()
        .find(|outcome| matches!(outcome.status, ReviseStatus::Failed { .. }))
        .unwrap();
    assert_eq!(failed.uuid_text, "00000000-0000-4000-8000-000000000002");
    assert_eq!(failed.object_id, "BCO_2");

    // The poisoned row is untouched; its neighbors are fixed.
    assert_eq!(
        stored_column(&conn, "00000000-0000-4000-8000-000000000002", "etag"),
        ""
    );
    assert_eq!(
        stored_column(&conn, "00000000-0000-4000-8000-000000000002", "object_id"),
        "BCO_2"
    );
    assert_eq!(
        stored_column(&conn, "00000000-0000-4000-8000-000000000001", "object_id"),
        "https://biocomputeobject.org/BCO_000001/1.0"
    );
    assert_eq!(
        stored_column(&conn, "00000000-0000-4000-8000-000000000003", "object_id"),
        "https://biocomputeobject.org/BCO_000003/1.0"
    );
}

#[test]
fn dry_run_reports_changes_but_writes_nothing() {
    let conn = open_db_in_memory().unwrap();
    seed_row(
        &conn,
        "00000000-0000-4000-8000-000000000001",
        "BCO_1",
        "",
        &minimal_contents_text(),
    );

    let repo = SqliteBcoRepository::try_new(&conn).unwrap();
    let service = ReviseService::new(repo);
    let report = service.verify_all().unwrap();

    assert_eq!(report.mode, ReviseMode::DryRun);
    assert_eq!(report.total(), 1);
    assert_eq!(report.revised(), 1);
    assert!(matches!(
        report.outcomes[0].status,
        ReviseStatus::Revised {
            etag_changed: true,
            object_id_changed: true,
        }
    ));

    assert_eq!(
        stored_column(&conn, "00000000-0000-4000-8000-000000000001", "object_id"),
        "BCO_1"
    );
    assert_eq!(
        stored_column(&conn, "00000000-0000-4000-8000-000000000001", "etag"),
        ""
    );
}

#[test]
fn identifier_collision_is_reported_per_record() {
    let conn = open_db_in_memory().unwrap();
    // The older row carries the later-sorting uuid, so uuid order and
    // insertion order disagree here.
    seed_row(
        &conn,
        "00000000-0000-4000-8000-000000000002",
        "BCO_9",
        "",
        &minimal_contents_text(),
    );
    seed_row(
        &conn,
        "00000000-0000-4000-8000-000000000001",
        "bco_0009",
        "",
        &minimal_contents_text(),
    );

    let repo = SqliteBcoRepository::try_new(&conn).unwrap();
    let service = ReviseService::new(repo);
    let report = service.revise_all(ReviseMode::Apply).unwrap();

    assert_eq!(report.total(), 2);
    assert_eq!(report.revised(), 1);
    assert_eq!(report.failed(), 1);

    // Rows are visited in insertion order, so the first-inserted row
    // claims the canonical identifier and the later one collides.
    assert_eq!(
        report.outcomes[0].uuid_text,
        "00000000-0000-4000-8000-000000000002"
    );
    assert!(matches!(
        report.outcomes[0].status,
        ReviseStatus::Revised { .. }
    ));
    match &report.outcomes[1].status {
        ReviseStatus::Failed { reason } => assert!(reason.contains("already exists")),
        other => panic!("unexpected status: {other:?}"),
    }
    assert_eq!(
        stored_column(&conn, "00000000-0000-4000-8000-000000000002", "object_id"),
        "https://biocomputeobject.org/BCO_000009/1.0"
    );
    assert_eq!(
        stored_column(&conn, "00000000-0000-4000-8000-000000000001", "object_id"),
        "bco_0009"
    );
}

#[test]
fn unrecognizable_identifier_is_reported_and_left_alone() {
    let conn = open_db_in_memory().unwrap();
    seed_row(
        &conn,
        "00000000-0000-4000-8000-000000000001",
        "https://w3id.org/biocompute/1.4.0/HCV1a.json",
        "",
        &minimal_contents_text(),
    );

    let repo = SqliteBcoRepository::try_new(&conn).unwrap();
    let service = ReviseService::new(repo);
    let report = service.revise_all(ReviseMode::Apply).unwrap();

    assert_eq!(report.total(), 1);
    assert_eq!(report.failed(), 1);
    match &report.outcomes[0].status {
        ReviseStatus::Failed { reason } => assert!(reason.contains("no BCO accession")),
        other => panic!("unexpected status: {other:?}"),
    }
    assert_eq!(
        stored_column(&conn, "00000000-0000-4000-8000-000000000001", "object_id"),
        "https://w3id.org/biocompute/1.4.0/HCV1a.json"
    );
}

#[test]
fn record_failing_current_rules_is_reported_not_written() {
    let conn = open_db_in_memory().unwrap();
    let incomplete = json!({
        "provenance_domain": { "name": "x" },
        "usability_domain": []
    })
    .to_string();
    seed_row(
        &conn,
        "00000000-0000-4000-8000-000000000001",
        "BCO_1",
        "",
        &incomplete,
    );

    let repo = SqliteBcoRepository::try_new(&conn).unwrap();
    let service = ReviseService::new(repo);
    let report = service.revise_all(ReviseMode::Apply).unwrap();

    assert_eq!(report.failed(), 1);
    match &report.outcomes[0].status {
        ReviseStatus::Failed { reason } => assert!(reason.contains("description_domain")),
        other => panic!("unexpected status: {other:?}"),
    }
    assert_eq!(
        stored_column(&conn, "00000000-0000-4000-8000-000000000001", "object_id"),
        "BCO_1"
    );
}
