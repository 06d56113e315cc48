use chrono::{DateTime, Utc};
use routefinder_scanner::RouteSet;
use rusqlite::{Connection, OptionalExtension, Result, params};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::Path;
use tracing::debug;

pub struct Database {
    conn: Connection,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Running => "running",
            SessionStatus::Completed => "completed",
            SessionStatus::Failed => "failed",
            SessionStatus::Cancelled => "cancelled",
        }
    }

    fn parse(value: &str) -> Self {
        match value {
            "completed" => SessionStatus::Completed,
            "failed" => SessionStatus::Failed,
            "cancelled" => SessionStatus::Cancelled,
            _ => SessionStatus::Running,
        }
    }
}

/// One row of `scan_sessions`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub id: String,
    pub origin: String,
    pub target: String,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub status: SessionStatus,
    pub routes_found: usize,
}

fn current_timestamp() -> i64 {
    Utc::now().timestamp()
}

fn from_timestamp(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs, 0).unwrap_or_default()
}

impl Database {
    pub fn drop(path: &Path) -> io::Result<()> {
        fs::remove_file(path)
    }

    pub fn exists(path: &Path) -> bool {
        path.exists()
    }

    pub fn new(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
            PRAGMA foreign_keys = ON;
            ",
        )?;

        let db = Database { conn };
        db.init_schema()?;
        Ok(db)
    }

    fn init_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            "
CREATE TABLE IF NOT EXISTS scan_sessions (
    id TEXT PRIMARY KEY,
    origin TEXT NOT NULL,
    target TEXT NOT NULL,
    start_time INTEGER NOT NULL,
    end_time INTEGER,
    status TEXT NOT NULL CHECK(status IN ('running', 'completed', 'failed', 'cancelled')),
    routes_found INTEGER NOT NULL DEFAULT 0
);

-- The persisted RouteSet
CREATE TABLE IF NOT EXISTS routes (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    origin TEXT NOT NULL,
    route TEXT NOT NULL,
    discovered_at INTEGER NOT NULL,
    session_id TEXT,
    FOREIGN KEY(session_id) REFERENCES scan_sessions(id) ON DELETE SET NULL,
    UNIQUE(origin, route)
);

CREATE INDEX IF NOT EXISTS idx_routes_origin ON routes(origin);
CREATE INDEX IF NOT EXISTS idx_scan_sessions_start ON scan_sessions(start_time);
            ",
        )?;
        Ok(())
    }

    // Session management
    pub fn create_session(&self, origin: &str, target: &str) -> Result<String> {
        let session_id = uuid::Uuid::new_v4().to_string();

        self.conn.execute(
            "INSERT INTO scan_sessions (id, origin, target, start_time, status) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                &session_id,
                origin,
                target,
                current_timestamp(),
                SessionStatus::Running.as_str()
            ],
        )?;

        Ok(session_id)
    }

    pub fn complete_session(&self, session_id: &str, routes_found: usize) -> Result<()> {
        self.conn.execute(
            "UPDATE scan_sessions SET status = ?1, end_time = ?2, routes_found = ?3 WHERE id = ?4",
            params![
                SessionStatus::Completed.as_str(),
                current_timestamp(),
                routes_found as i64,
                session_id
            ],
        )?;
        Ok(())
    }

    pub fn fail_session(&self, session_id: &str) -> Result<()> {
        self.finish_session(session_id, SessionStatus::Failed)
    }

    pub fn cancel_session(&self, session_id: &str) -> Result<()> {
        self.finish_session(session_id, SessionStatus::Cancelled)
    }

    fn finish_session(&self, session_id: &str, status: SessionStatus) -> Result<()> {
        self.conn.execute(
            "UPDATE scan_sessions SET status = ?1, end_time = ?2 WHERE id = ?3",
            params![status.as_str(), current_timestamp(), session_id],
        )?;
        Ok(())
    }

    pub fn get_session(&self, session_id: &str) -> Result<Option<SessionRecord>> {
        self.conn
            .query_row(
                "SELECT id, origin, target, start_time, end_time, status, routes_found
                 FROM scan_sessions WHERE id = ?1",
                params![session_id],
                session_from_row,
            )
            .optional()
    }

    /// Newest first.
    pub fn list_sessions(&self) -> Result<Vec<SessionRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, origin, target, start_time, end_time, status, routes_found
             FROM scan_sessions ORDER BY start_time DESC, rowid DESC",
        )?;

        let sessions = stmt
            .query_map([], session_from_row)?
            .collect::<Result<Vec<_>>>()?;

        Ok(sessions)
    }

    // Route store

    /// Merges `routes` into the stored set and returns how many rows were new.
    /// Invalid origins are skipped.
    pub fn save_routes(&mut self, routes: &RouteSet, session_id: Option<&str>) -> Result<usize> {
        let timestamp = current_timestamp();
        let tx = self.conn.transaction()?;
        let mut inserted = 0;
        {
            let mut stmt = tx.prepare(
                "INSERT OR IGNORE INTO routes (origin, route, discovered_at, session_id)
                 VALUES (?1, ?2, ?3, ?4)",
            )?;
            for (origin, set) in routes.iter() {
                for route in set {
                    inserted += stmt.execute(params![origin, route, timestamp, session_id])?;
                }
            }
        }
        tx.commit()?;
        debug!("Stored {} new route(s) across {} origin(s)", inserted, routes.origins().count());
        Ok(inserted)
    }

    pub fn load_routes(&self) -> Result<RouteSet> {
        let mut stmt = self
            .conn
            .prepare("SELECT origin, route FROM routes ORDER BY origin, route")?;

        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?
            .collect::<Result<Vec<_>>>()?;

        let mut set = RouteSet::new();
        for (origin, route) in rows {
            set.merge(&origin, [route]);
        }
        Ok(set)
    }

    pub fn route_count(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM routes", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// Resets the stored RouteSet. Returns the number of routes removed.
    pub fn clear_routes(&self) -> Result<usize> {
        self.conn.execute("DELETE FROM routes", [])
    }
}

fn session_from_row(row: &rusqlite::Row<'_>) -> Result<SessionRecord> {
    let status: String = row.get(5)?;
    let routes_found: i64 = row.get(6)?;
    Ok(SessionRecord {
        id: row.get(0)?,
        origin: row.get(1)?,
        target: row.get(2)?,
        start_time: from_timestamp(row.get(3)?),
        end_time: row.get::<_, Option<i64>>(4)?.map(from_timestamp),
        status: SessionStatus::parse(&status),
        routes_found: routes_found as usize,
    })
}
