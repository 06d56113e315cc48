// Tests for database functionality

use routefinder_core::data::{Database, SessionStatus};
use routefinder_scanner::RouteSet;
use tempfile::TempDir;

fn create_test_db() -> (TempDir, Database) {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("test.db");
    let db = Database::new(&db_path).unwrap();
    (temp_dir, db)
}

fn route_set(origin: &str, routes: &[&str]) -> RouteSet {
    let mut set = RouteSet::new();
    set.merge(origin, routes);
    set
}

// ============================================================================
// Database Creation Tests
// ============================================================================

#[test]
fn test_database_creation() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("test.db");

    let db = Database::new(&db_path);
    assert!(db.is_ok());
    assert!(db_path.exists());
}

#[test]
fn test_database_drop() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("test.db");

    let _db = Database::new(&db_path).unwrap();
    assert!(Database::exists(&db_path));

    Database::drop(&db_path).unwrap();
    assert!(!Database::exists(&db_path));
}

#[test]
fn test_drop_missing_database_is_error() {
    let temp_dir = TempDir::new().unwrap();
    assert!(Database::drop(&temp_dir.path().join("missing.db")).is_err());
}

#[test]
fn test_reopen_keeps_routes() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("test.db");

    {
        let mut db = Database::new(&db_path).unwrap();
        db.save_routes(&route_set("http://a.test", &["/home"]), None)
            .unwrap();
    }

    let db = Database::new(&db_path).unwrap();
    assert_eq!(db.route_count().unwrap(), 1);
}

// ============================================================================
// Session Tests
// ============================================================================

#[test]
fn test_create_session() {
    let (_temp_dir, db) = create_test_db();

    let session_id = db
        .create_session("http://a.test", "http://a.test/app")
        .unwrap();
    let record = db.get_session(&session_id).unwrap().unwrap();

    assert_eq!(record.origin, "http://a.test");
    assert_eq!(record.target, "http://a.test/app");
    assert_eq!(record.status, SessionStatus::Running);
    assert!(record.end_time.is_none());
    assert_eq!(record.routes_found, 0);
}

#[test]
fn test_complete_session() {
    let (_temp_dir, db) = create_test_db();

    let session_id = db.create_session("http://a.test", "http://a.test/").unwrap();
    db.complete_session(&session_id, 7).unwrap();

    let record = db.get_session(&session_id).unwrap().unwrap();
    assert_eq!(record.status, SessionStatus::Completed);
    assert_eq!(record.routes_found, 7);
    assert!(record.end_time.is_some());
}

#[test]
fn test_fail_and_cancel_session() {
    let (_temp_dir, db) = create_test_db();

    let failed = db.create_session("http://a.test", "http://a.test/").unwrap();
    let cancelled = db.create_session("http://b.test", "http://b.test/").unwrap();
    db.fail_session(&failed).unwrap();
    db.cancel_session(&cancelled).unwrap();

    assert_eq!(
        db.get_session(&failed).unwrap().unwrap().status,
        SessionStatus::Failed
    );
    assert_eq!(
        db.get_session(&cancelled).unwrap().unwrap().status,
        SessionStatus::Cancelled
    );
}

#[test]
fn test_get_unknown_session() {
    let (_temp_dir, db) = create_test_db();
    assert!(db.get_session("nope").unwrap().is_none());
}

#[test]
fn test_list_sessions() {
    let (_temp_dir, db) = create_test_db();

    let first = db.create_session("http://a.test", "http://a.test/").unwrap();
    let second = db.create_session("http://b.test", "http://b.test/").unwrap();

    let sessions = db.list_sessions().unwrap();
    assert_eq!(sessions.len(), 2);
    // same second, so insertion order breaks the tie
    assert_eq!(sessions[0].id, second);
    assert_eq!(sessions[1].id, first);
}

// ============================================================================
// Route Store Tests
// ============================================================================

#[test]
fn test_save_and_load_routes() {
    let (_temp_dir, mut db) = create_test_db();

    let mut routes = route_set("http://a.test", &["/home", "/about"]);
    routes.merge("http://b.test", ["/api/users"]);

    let inserted = db.save_routes(&routes, None).unwrap();
    assert_eq!(inserted, 3);
    assert_eq!(db.load_routes().unwrap(), routes);
}

#[test]
fn test_save_routes_merges_overlap() {
    let (_temp_dir, mut db) = create_test_db();

    db.save_routes(&route_set("http://a.test", &["/a", "/b"]), None)
        .unwrap();
    let inserted = db
        .save_routes(&route_set("http://a.test", &["/b", "/c"]), None)
        .unwrap();

    assert_eq!(inserted, 1);
    let loaded = db.load_routes().unwrap();
    let stored: Vec<&str> = loaded
        .routes("http://a.test")
        .unwrap()
        .iter()
        .map(String::as_str)
        .collect();
    assert_eq!(stored, vec!["/a", "/b", "/c"]);
}

#[test]
fn test_save_routes_with_session() {
    let (_temp_dir, mut db) = create_test_db();

    let session_id = db.create_session("http://a.test", "http://a.test/").unwrap();
    let inserted = db
        .save_routes(&route_set("http://a.test", &["/x"]), Some(&session_id))
        .unwrap();
    assert_eq!(inserted, 1);
}

#[test]
fn test_clear_routes() {
    let (_temp_dir, mut db) = create_test_db();

    db.save_routes(&route_set("http://a.test", &["/a", "/b"]), None)
        .unwrap();
    assert_eq!(db.clear_routes().unwrap(), 2);
    assert!(db.load_routes().unwrap().is_empty());
    assert_eq!(db.route_count().unwrap(), 0);
}

#[test]
fn test_empty_store_loads_empty_set() {
    let (_temp_dir, db) = create_test_db();
    assert!(db.load_routes().unwrap().is_empty());
}

#[test]
fn test_save_routes_never_stores_invalid_origin() {
    let (_temp_dir, mut db) = create_test_db();

    let imported: RouteSet =
        serde_json::from_str(r#"{"undefined":["/leak"],"http://a.test":["/kept"]}"#).unwrap();
    let inserted = db.save_routes(&imported, None).unwrap();

    assert_eq!(inserted, 1);
    let loaded = db.load_routes().unwrap();
    assert_eq!(loaded.origins().collect::<Vec<_>>(), vec!["http://a.test"]);
    assert_eq!(db.route_count().unwrap(), 1);
}
