//! SQLite Store
//!
//! Users and their interaction history. Rows are insert-only apart from
//! owner-initiated history deletion.

use chrono::{DateTime, SecondsFormat, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Row};
use serde::Serialize;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;
use tracing::{debug, info};

/// Store errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Username already taken")]
    UsernameTaken,

    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Metadata encoding error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Registered account
#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub age: u32,
    pub created_at: DateTime<Utc>,
}

/// Kind of recorded interaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryKind {
    Explain,
    Mcq,
    McqScore,
}

impl HistoryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            HistoryKind::Explain => "explain",
            HistoryKind::Mcq => "mcq",
            HistoryKind::McqScore => "mcq_score",
        }
    }
}

impl fmt::Display for HistoryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HistoryKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "explain" => Ok(Self::Explain),
            "mcq" => Ok(Self::Mcq),
            "mcq_score" => Ok(Self::McqScore),
            other => Err(format!("unknown history kind: {}", other)),
        }
    }
}

/// One persisted AI interaction or quiz score
#[derive(Debug, Clone, Serialize)]
pub struct HistoryEntry {
    pub id: i64,
    #[serde(skip_serializing)]
    pub user_id: i64,
    #[serde(rename = "type")]
    pub kind: HistoryKind,
    pub topic: String,
    pub response: String,
    pub metadata: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

/// History row to insert
#[derive(Debug, Clone)]
pub struct NewHistoryEntry<'a> {
    pub user_id: i64,
    pub kind: HistoryKind,
    pub topic: &'a str,
    pub response: &'a str,
    pub metadata: Option<serde_json::Value>,
}

/// Application store with SQLite backend
pub struct Store {
    conn: Mutex<Connection>,
}

impl Store {
    /// Open or create the database
    pub fn open(path: &Path) -> StoreResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        let store = Self::from_connection(conn)?;

        info!("Store opened: {}", path.display());
        Ok(store)
    }

    /// In-memory database (tests and throwaway runs)
    pub fn open_in_memory() -> StoreResult<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> StoreResult<Self> {
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    /// Initialize database schema
    fn init_schema(&self) -> StoreResult<()> {
        self.conn.lock().execute_batch(
            r#"
            PRAGMA foreign_keys = ON;

            CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                username TEXT NOT NULL UNIQUE,
                password_hash TEXT NOT NULL,
                age INTEGER NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS history (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL REFERENCES users(id),
                kind TEXT NOT NULL CHECK(kind IN ('explain', 'mcq', 'mcq_score')),
                topic TEXT NOT NULL,
                response TEXT NOT NULL,
                metadata TEXT,
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_history_user
                ON history(user_id, created_at DESC);
            "#,
        )?;

        Ok(())
    }

    // ------------------------------------------------------------------
    // Users
    // ------------------------------------------------------------------

    /// Insert a user; the UNIQUE constraint decides username conflicts
    pub fn create_user(&self, username: &str, password_hash: &str, age: u32) -> StoreResult<User> {
        let created_at = Utc::now();
        let conn = self.conn.lock();

        let inserted = conn.execute(
            "INSERT INTO users (username, password_hash, age, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![username, password_hash, age, format_timestamp(&created_at)],
        );

        match inserted {
            Ok(_) => {}
            Err(rusqlite::Error::SqliteFailure(e, _)) if e.code == ErrorCode::ConstraintViolation => {
                return Err(StoreError::UsernameTaken);
            }
            Err(e) => return Err(e.into()),
        }

        let id = conn.last_insert_rowid();
        debug!("Created user {} ({})", id, username);

        Ok(User {
            id,
            username: username.to_string(),
            password_hash: password_hash.to_string(),
            age,
            created_at,
        })
    }

    pub fn find_user_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        let conn = self.conn.lock();
        let user = conn
            .query_row(
                "SELECT id, username, password_hash, age, created_at FROM users WHERE username = ?1",
                params![username],
                user_from_row,
            )
            .optional()?;
        Ok(user)
    }

    pub fn get_user(&self, id: i64) -> StoreResult<Option<User>> {
        let conn = self.conn.lock();
        let user = conn
            .query_row(
                "SELECT id, username, password_hash, age, created_at FROM users WHERE id = ?1",
                params![id],
                user_from_row,
            )
            .optional()?;
        Ok(user)
    }

    // ------------------------------------------------------------------
    // History
    // ------------------------------------------------------------------

    pub fn add_history(&self, entry: NewHistoryEntry<'_>) -> StoreResult<HistoryEntry> {
        let created_at = Utc::now();
        let metadata = entry.metadata.as_ref().map(serde_json::to_string).transpose()?;
        let conn = self.conn.lock();

        conn.execute(
            "INSERT INTO history (user_id, kind, topic, response, metadata, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                entry.user_id,
                entry.kind.as_str(),
                entry.topic,
                entry.response,
                metadata,
                format_timestamp(&created_at)
            ],
        )?;

        let id = conn.last_insert_rowid();
        debug!("Added {} history entry {} for user {}", entry.kind, id, entry.user_id);

        Ok(HistoryEntry {
            id,
            user_id: entry.user_id,
            kind: entry.kind,
            topic: entry.topic.to_string(),
            response: entry.response.to_string(),
            metadata: entry.metadata,
            created_at,
        })
    }

    /// All entries for a user, newest first
    pub fn list_history(&self, user_id: i64) -> StoreResult<Vec<HistoryEntry>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, user_id, kind, topic, response, metadata, created_at
             FROM history WHERE user_id = ?1
             ORDER BY created_at DESC, id DESC",
        )?;

        let entries = stmt
            .query_map(params![user_id], history_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(entries)
    }

    /// Delete an entry owned by `user_id`. Returns false when no such entry
    /// exists for that user.
    pub fn delete_history(&self, id: i64, user_id: i64) -> StoreResult<bool> {
        let deleted = self.conn.lock().execute(
            "DELETE FROM history WHERE id = ?1 AND user_id = ?2",
            params![id, user_id],
        )?;

        if deleted > 0 {
            debug!("Deleted history entry {} for user {}", id, user_id);
        }
        Ok(deleted > 0)
    }
}

/// Fixed-width so that text ordering matches time ordering
fn format_timestamp(t: &DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(idx: usize, raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e)))
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    let created_at: String = row.get(4)?;
    Ok(User {
        id: row.get(0)?,
        username: row.get(1)?,
        password_hash: row.get(2)?,
        age: row.get(3)?,
        created_at: parse_timestamp(4, &created_at)?,
    })
}

fn history_from_row(row: &Row<'_>) -> rusqlite::Result<HistoryEntry> {
    let kind: String = row.get(2)?;
    let metadata: Option<String> = row.get(5)?;
    let created_at: String = row.get(6)?;

    Ok(HistoryEntry {
        id: row.get(0)?,
        user_id: row.get(1)?,
        kind: kind.parse().map_err(|e: String| {
            rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Text, e.into())
        })?,
        topic: row.get(3)?,
        response: row.get(4)?,
        // Unreadable metadata is treated as absent
        metadata: metadata.and_then(|m| serde_json::from_str(&m).ok()),
        created_at: parse_timestamp(6, &created_at)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn store() -> Store {
        Store::open_in_memory().unwrap()
    }

    fn entry<'a>(user_id: i64, kind: HistoryKind, topic: &'a str) -> NewHistoryEntry<'a> {
        NewHistoryEntry {
            user_id,
            kind,
            topic,
            response: "resp",
            metadata: None,
        }
    }

    #[test]
    fn test_create_and_find_user() {
        let store = store();
        let user = store.create_user("alice", "hash", 14).unwrap();

        let found = store.find_user_by_username("alice").unwrap().unwrap();
        assert_eq!(found.id, user.id);
        assert_eq!(found.age, 14);
        assert_eq!(found.password_hash, "hash");

        assert!(store.get_user(user.id).unwrap().is_some());
        assert!(store.get_user(user.id + 100).unwrap().is_none());
        assert!(store.find_user_by_username("bob").unwrap().is_none());
    }

    #[test]
    fn test_duplicate_username_rejected() {
        let store = store();
        store.create_user("alice", "hash", 14).unwrap();

        let result = store.create_user("alice", "other", 30);
        assert!(matches!(result, Err(StoreError::UsernameTaken)));
    }

    #[test]
    fn test_user_serialization_hides_hash() {
        let store = store();
        let user = store.create_user("alice", "secret-hash", 14).unwrap();

        let json = serde_json::to_value(&user).unwrap();
        assert_eq!(json["username"], "alice");
        assert!(json.get("password_hash").is_none());
    }

    #[test]
    fn test_history_newest_first() {
        let store = store();
        let user = store.create_user("alice", "hash", 14).unwrap();

        store.add_history(entry(user.id, HistoryKind::Explain, "first")).unwrap();
        store.add_history(entry(user.id, HistoryKind::Mcq, "second")).unwrap();
        store.add_history(entry(user.id, HistoryKind::Explain, "third")).unwrap();

        let history = store.list_history(user.id).unwrap();
        let topics: Vec<_> = history.iter().map(|e| e.topic.as_str()).collect();
        assert_eq!(topics, vec!["third", "second", "first"]);
    }

    #[test]
    fn test_history_metadata_round_trips() {
        let store = store();
        let user = store.create_user("alice", "hash", 14).unwrap();

        store
            .add_history(NewHistoryEntry {
                user_id: user.id,
                kind: HistoryKind::McqScore,
                topic: "Rust",
                response: "Scored 3/5",
                metadata: Some(json!({"score": 3, "total": 5})),
            })
            .unwrap();

        let history = store.list_history(user.id).unwrap();
        assert_eq!(history[0].kind, HistoryKind::McqScore);
        assert_eq!(history[0].metadata, Some(json!({"score": 3, "total": 5})));

        let json = serde_json::to_value(&history[0]).unwrap();
        assert_eq!(json["type"], "mcq_score");
        assert!(json.get("user_id").is_none());
    }

    #[test]
    fn test_history_isolated_per_user() {
        let store = store();
        let alice = store.create_user("alice", "hash", 14).unwrap();
        let bob = store.create_user("bob", "hash", 15).unwrap();

        store.add_history(entry(alice.id, HistoryKind::Explain, "alice topic")).unwrap();

        assert_eq!(store.list_history(alice.id).unwrap().len(), 1);
        assert!(store.list_history(bob.id).unwrap().is_empty());
    }

    #[test]
    fn test_delete_requires_owner() {
        let store = store();
        let alice = store.create_user("alice", "hash", 14).unwrap();
        let bob = store.create_user("bob", "hash", 15).unwrap();

        let e = store.add_history(entry(alice.id, HistoryKind::Explain, "mine")).unwrap();

        assert!(!store.delete_history(e.id, bob.id).unwrap());
        assert_eq!(store.list_history(alice.id).unwrap().len(), 1);

        assert!(store.delete_history(e.id, alice.id).unwrap());
        assert!(store.list_history(alice.id).unwrap().is_empty());

        // Second delete finds nothing
        assert!(!store.delete_history(e.id, alice.id).unwrap());
    }

    #[test]
    fn test_history_kind_parse() {
        assert_eq!("mcq_score".parse::<HistoryKind>().unwrap(), HistoryKind::McqScore);
        assert!("quiz".parse::<HistoryKind>().is_err());
    }
}
