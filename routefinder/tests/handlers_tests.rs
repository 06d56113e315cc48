use routefinder::handlers::*;
use routefinder_core::data::{Database, SessionStatus};
use routefinder_core::scan::{ScanOutcome, TargetResult};
use std::io::Write;
use std::path::PathBuf;
use tempfile::{NamedTempFile, TempDir};
use url::Url;

#[test]
fn test_parse_url_line_with_scheme() {
    let result = parse_url_line("https://example.com");
    assert_eq!(result, Some("https://example.com".to_string()));
}

#[test]
fn test_parse_url_line_without_scheme() {
    let result = parse_url_line("example.com");
    assert_eq!(result, Some("http://example.com".to_string()));
}

#[test]
fn test_parse_url_line_host_with_port() {
    let result = parse_url_line("localhost:3000");
    assert_eq!(result, Some("http://localhost:3000".to_string()));
}

#[test]
fn test_parse_url_line_invalid() {
    let result = parse_url_line("not a valid url!!!");
    assert_eq!(result, None);
}

#[test]
fn test_load_urls_from_file() -> Result<(), Box<dyn std::error::Error>> {
    let mut temp_file = NamedTempFile::new()?;
    writeln!(temp_file, "https://example.com")?;
    writeln!(temp_file, "app.example.org")?;
    writeln!(temp_file)?; // Empty line
    writeln!(temp_file, "  https://api.example.com  ")?;

    let path = PathBuf::from(temp_file.path());
    let urls = load_urls_from_file(&path)?;

    assert_eq!(urls.len(), 3);
    assert_eq!(urls[0], "https://example.com");
    assert_eq!(urls[1], "http://app.example.org");
    assert_eq!(urls[2], "https://api.example.com");

    Ok(())
}

#[test]
fn test_load_urls_from_file_empty() {
    let mut temp_file = NamedTempFile::new().unwrap();
    writeln!(temp_file).unwrap();
    writeln!(temp_file, "   ").unwrap();

    let path = PathBuf::from(temp_file.path());
    let result = load_urls_from_file(&path);

    assert!(result.is_err());
    assert!(result.unwrap_err().to_string().contains("No valid URLs"));
}

#[test]
fn test_load_urls_from_missing_file() {
    let result = load_urls_from_file(&PathBuf::from("/definitely/not/here.txt"));
    assert!(result.is_err());
}

#[test]
fn test_load_urls_from_source_url() {
    let url = Url::parse("https://example.com/app").unwrap();
    let urls = load_urls_from_source(Some(&url), None).unwrap();
    assert_eq!(urls, vec!["https://example.com/app".to_string()]);
}

#[test]
fn test_load_urls_from_source_prefers_file() {
    let mut temp_file = NamedTempFile::new().unwrap();
    writeln!(temp_file, "https://from-file.example").unwrap();
    let url = Url::parse("https://example.com").unwrap();
    let path = PathBuf::from(temp_file.path());

    let urls = load_urls_from_source(Some(&url), Some(&path)).unwrap();
    assert_eq!(urls, vec!["https://from-file.example".to_string()]);
}

#[test]
fn test_load_urls_from_source_neither() {
    assert!(load_urls_from_source(None, None).is_err());
}

#[test]
fn test_database_path_default_and_explicit() {
    let default = database_path(None);
    assert!(default.ends_with(".config/routefinder/routefinder.db"));

    let explicit = database_path(Some(&"/tmp/rf.db".to_string()));
    assert_eq!(explicit, PathBuf::from("/tmp/rf.db"));
}

#[test]
fn test_initialize_creates_database() {
    let temp_dir = TempDir::new().unwrap();
    let config_dir = temp_dir.path().join("nested").join("routefinder");

    let db_path = initialize(&config_dir, false).unwrap();
    assert_eq!(db_path, config_dir.join(DATABASE_FILE));
    assert!(Database::exists(&db_path));
}

#[test]
fn test_initialize_keeps_or_overwrites_existing() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = initialize(temp_dir.path(), false).unwrap();
    {
        let mut db = Database::new(&db_path).unwrap();
        let mut routes = routefinder_scanner::RouteSet::new();
        routes.merge("http://a.test", ["/kept"]);
        db.save_routes(&routes, None).unwrap();
    }

    initialize(temp_dir.path(), false).unwrap();
    assert_eq!(Database::new(&db_path).unwrap().route_count().unwrap(), 1);

    initialize(temp_dir.path(), true).unwrap();
    assert_eq!(Database::new(&db_path).unwrap().route_count().unwrap(), 0);
}

#[test]
fn test_persist_results_records_sessions() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = initialize(temp_dir.path(), false).unwrap();
    let mut db = Database::new(&db_path).unwrap();

    let results = vec![
        TargetResult {
            target: "http://a.test/".to_string(),
            origin: "http://a.test".to_string(),
            outcome: ScanOutcome::Completed {
                routes: vec!["/a".to_string(), "/b".to_string()],
            },
        },
        TargetResult {
            target: "http://b.test/".to_string(),
            origin: "http://b.test".to_string(),
            outcome: ScanOutcome::Failed {
                error: "Injection failed: cannot load".to_string(),
            },
        },
        TargetResult {
            target: "http://c.test/".to_string(),
            origin: "http://c.test".to_string(),
            outcome: ScanOutcome::Stopped,
        },
        TargetResult {
            target: "not a url".to_string(),
            origin: String::new(),
            outcome: ScanOutcome::Failed {
                error: "Invalid target".to_string(),
            },
        },
    ];

    let inserted = persist_results(&mut db, &results).unwrap();
    assert_eq!(inserted, 2);

    let sessions = db.list_sessions().unwrap();
    assert_eq!(sessions.len(), 3);
    let status_of = |origin: &str| {
        sessions
            .iter()
            .find(|s| s.origin == origin)
            .map(|s| s.status)
            .unwrap()
    };
    assert_eq!(status_of("http://a.test"), SessionStatus::Completed);
    assert_eq!(status_of("http://b.test"), SessionStatus::Failed);
    assert_eq!(status_of("http://c.test"), SessionStatus::Cancelled);

    // a second run with the same routes adds nothing
    assert_eq!(persist_results(&mut db, &results[..1]).unwrap(), 0);
}

#[test]
fn test_stored_routes_filters_origin() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = initialize(temp_dir.path(), false).unwrap();
    let mut db = Database::new(&db_path).unwrap();

    let mut routes = routefinder_scanner::RouteSet::new();
    routes.merge("http://a.test", ["/a"]);
    routes.merge("http://b.test", ["/b"]);
    db.save_routes(&routes, None).unwrap();

    let only_a = stored_routes(&db, Some("http://a.test/"), None).unwrap();
    assert_eq!(only_a.origins().collect::<Vec<_>>(), vec!["http://a.test"]);

    let all = stored_routes(&db, None, None).unwrap();
    assert_eq!(all.len(), 2);
}

#[test]
fn test_stored_routes_filters_text() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = initialize(temp_dir.path(), false).unwrap();
    let mut db = Database::new(&db_path).unwrap();

    let mut routes = routefinder_scanner::RouteSet::new();
    routes.merge("http://a.test", ["/api/users", "/about"]);
    routes.merge("http://b.test", ["/API/orders", "/home"]);
    db.save_routes(&routes, None).unwrap();

    let api = stored_routes(&db, None, Some("api")).unwrap();
    assert_eq!(api.len(), 2);
    assert!(api.routes("http://a.test").unwrap().contains("/api/users"));
    assert!(api.routes("http://b.test").unwrap().contains("/API/orders"));

    let api_on_a = stored_routes(&db, Some("http://a.test"), Some("api")).unwrap();
    assert_eq!(api_on_a.len(), 1);

    let none = stored_routes(&db, None, Some("missing")).unwrap();
    assert!(none.is_empty());
    assert_eq!(none.origins().count(), 0);

    // a blank filter keeps everything
    assert_eq!(stored_routes(&db, None, Some("  ")).unwrap().len(), 4);
}
