//! SQLite-based session storage.
//!
//! Provides persistent storage for:
//! - Finalized focus and break sessions (append-only)
//! - Projects and tags
//! - Key-value store for application state (the saved timer state)

use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::{debug, warn};

use super::migrations;
use super::stats::{start_of_day, Stats};
use super::{data_dir, SessionStore};
use crate::error::StoreError;
use crate::models::{Project, Rating, Session, Tag};

const SESSION_COLUMNS: &str = "id, session_type, task_description, project_id, start_time, \
     end_time, duration_min, is_completed, rating, notes, tags_json";

const PROJECT_COLUMNS: &str = "id, name, goal, icon, color, created_at, updated_at";

/// SQLite database for session storage.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Get a reference to the underlying SQLite connection.
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Open (or create) the database at `path` and apply migrations.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let conn = Connection::open(path).map_err(|source| StoreError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_connection(conn)
    }

    /// Open `file_name` inside the data directory.
    pub fn open_default(file_name: &str) -> Result<Self, StoreError> {
        let dir = data_dir().map_err(|e| StoreError::Unavailable(e.to_string()))?;
        Self::open(dir.join(file_name))
    }

    /// Open an in-memory database.
    pub fn open_memory() -> Result<Self, StoreError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.busy_timeout(Duration::from_secs(5))?;
        migrations::migrate(&conn).map_err(|e| StoreError::MigrationFailed(e.to_string()))?;
        Ok(Self { conn })
    }

    /// Sessions that started at or after `since`, in append order.
    pub fn sessions_since(&self, since: DateTime<Utc>) -> Result<Vec<Session>, StoreError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {SESSION_COLUMNS} FROM sessions WHERE start_time >= ?1 ORDER BY seq ASC"
        ))?;
        let rows = stmt.query_map(params![timestamp(since)], session_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn stats_today(&self) -> Result<Stats, StoreError> {
        let today = start_of_day(Utc::now());
        let sessions = self.sessions_since(today)?;
        Ok(Stats::from_sessions(&sessions, today))
    }

    pub fn stats_all(&self) -> Result<Stats, StoreError> {
        let sessions = self.list_sessions(None)?;
        Ok(Stats::from_sessions(&sessions, start_of_day(Utc::now())))
    }

    /// Get a value from the kv store.
    pub fn kv_get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let value = self
            .conn
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
                row.get::<_, String>(0)
            })
            .optional()?;
        Ok(value)
    }

    /// Set a value in the kv store.
    pub fn kv_set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.conn.execute(
            "INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }
}

impl SessionStore for Database {
    /// Append inside a transaction, after checking that the last stored
    /// session still reads back cleanly and that the id is new. A failed
    /// append rolls back and leaves earlier rows untouched.
    fn append_session(&mut self, session: &Session) -> Result<(), StoreError> {
        session.validate_finalized()?;
        let tags_json = serde_json::to_string(&session.tags)?;
        let end_time = session
            .end_time
            .ok_or_else(|| StoreError::Serialization("missing end_time".into()))?;

        let tx = self.conn.transaction()?;
        verify_tail(&tx)?;

        let exists: bool = tx.query_row(
            "SELECT EXISTS(SELECT 1 FROM sessions WHERE id = ?1)",
            params![session.id],
            |row| row.get(0),
        )?;
        if exists {
            return Err(StoreError::DuplicateSession(session.id.clone()));
        }

        tx.execute(
            "INSERT INTO sessions (id, session_type, task_description, project_id, start_time,
                                   end_time, duration_min, is_completed, rating, notes, tags_json)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                session.id,
                session.session_type.as_str(),
                session.task_description,
                session.project_id,
                timestamp(session.start_time),
                timestamp(end_time),
                session.duration_min,
                session.is_completed,
                session.rating.map(Rating::value),
                session.notes,
                tags_json,
            ],
        )?;
        tx.commit()?;

        debug!(session_id = %session.id, "session appended");
        Ok(())
    }

    fn get_session(&self, id: &str) -> Result<Option<Session>, StoreError> {
        let session = self
            .conn
            .query_row(
                &format!("SELECT {SESSION_COLUMNS} FROM sessions WHERE id = ?1"),
                params![id],
                session_from_row,
            )
            .optional()?;
        Ok(session)
    }

    fn list_sessions(&self, limit: Option<usize>) -> Result<Vec<Session>, StoreError> {
        let mut sessions = match limit {
            Some(n) => {
                let mut stmt = self.conn.prepare(&format!(
                    "SELECT {SESSION_COLUMNS} FROM sessions ORDER BY seq DESC LIMIT ?1"
                ))?;
                let n = i64::try_from(n).unwrap_or(i64::MAX);
                let rows = stmt.query_map(params![n], session_from_row)?;
                rows.collect::<Result<Vec<_>, _>>()?
            }
            None => {
                let mut stmt = self.conn.prepare(&format!(
                    "SELECT {SESSION_COLUMNS} FROM sessions ORDER BY seq DESC"
                ))?;
                let rows = stmt.query_map([], session_from_row)?;
                rows.collect::<Result<Vec<_>, _>>()?
            }
        };
        sessions.reverse();
        Ok(sessions)
    }

    fn upsert_project(&mut self, project: &Project) -> Result<(), StoreError> {
        project.validate()?;
        self.conn.execute(
            "INSERT INTO projects (id, name, goal, icon, color, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                goal = excluded.goal,
                icon = excluded.icon,
                color = excluded.color,
                updated_at = excluded.updated_at",
            params![
                project.id,
                project.name,
                project.goal,
                project.icon,
                project.color,
                timestamp(project.created_at),
                timestamp(project.updated_at),
            ],
        )?;
        Ok(())
    }

    fn get_project(&self, id: &str) -> Result<Option<Project>, StoreError> {
        let project = self
            .conn
            .query_row(
                &format!("SELECT {PROJECT_COLUMNS} FROM projects WHERE id = ?1"),
                params![id],
                project_from_row,
            )
            .optional()?;
        Ok(project)
    }

    fn list_projects(&self) -> Result<Vec<Project>, StoreError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {PROJECT_COLUMNS} FROM projects ORDER BY created_at ASC, name ASC"
        ))?;
        let rows = stmt.query_map([], project_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    fn delete_project(&mut self, id: &str) -> Result<bool, StoreError> {
        let removed = self
            .conn
            .execute("DELETE FROM projects WHERE id = ?1", params![id])?;
        Ok(removed > 0)
    }

    fn upsert_tag(&mut self, tag: &Tag) -> Result<(), StoreError> {
        tag.validate()?;
        self.conn.execute(
            "INSERT INTO tags (id, name, color) VALUES (?1, ?2, ?3)
             ON CONFLICT(id) DO UPDATE SET name = excluded.name, color = excluded.color",
            params![tag.id, tag.name, tag.color],
        )?;
        Ok(())
    }

    fn list_tags(&self) -> Result<Vec<Tag>, StoreError> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name, color FROM tags ORDER BY name ASC")?;
        let rows = stmt.query_map([], |row| {
            Ok(Tag {
                id: row.get(0)?,
                name: row.get(1)?,
                color: row.get(2)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }
}

/// Check that the most recent session decodes and is well-formed.
fn verify_tail(conn: &Connection) -> Result<(), StoreError> {
    let tail = conn
        .query_row(
            &format!("SELECT {SESSION_COLUMNS} FROM sessions ORDER BY seq DESC LIMIT 1"),
            [],
            session_from_row,
        )
        .optional();
    match tail {
        Ok(None) => Ok(()),
        Ok(Some(session)) => session.validate_finalized().map_err(|e| {
            warn!(session_id = %session.id, error = %e, "last stored session is invalid");
            StoreError::CorruptTail(format!("{}: {e}", session.id))
        }),
        Err(
            e @ (rusqlite::Error::FromSqlConversionFailure(..)
            | rusqlite::Error::InvalidColumnType(..)),
        ) => {
            warn!(error = %e, "last stored session cannot be decoded");
            Err(StoreError::CorruptTail(e.to_string()))
        }
        Err(e) => Err(e.into()),
    }
}

/// Fixed-width UTC timestamps so that text comparison matches time order.
fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn conversion_error<E>(idx: usize, err: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(err))
}

fn parse_timestamp(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| conversion_error(idx, e))
}

fn session_from_row(row: &Row<'_>) -> rusqlite::Result<Session> {
    let session_type: String = row.get(1)?;
    let rating: Option<u8> = row.get(8)?;
    let tags_json: String = row.get(10)?;
    Ok(Session {
        id: row.get(0)?,
        session_type: session_type.parse().map_err(|e| conversion_error(1, e))?,
        task_description: row.get(2)?,
        project_id: row.get(3)?,
        start_time: parse_timestamp(row, 4)?,
        end_time: Some(parse_timestamp(row, 5)?),
        duration_min: row.get(6)?,
        is_completed: row.get(7)?,
        rating: rating
            .map(Rating::new)
            .transpose()
            .map_err(|e| conversion_error(8, e))?,
        notes: row.get(9)?,
        tags: serde_json::from_str(&tags_json).map_err(|e| conversion_error(10, e))?,
    })
}

fn project_from_row(row: &Row<'_>) -> rusqlite::Result<Project> {
    Ok(Project {
        id: row.get(0)?,
        name: row.get(1)?,
        goal: row.get(2)?,
        icon: row.get(3)?,
        color: row.get(4)?,
        created_at: parse_timestamp(row, 5)?,
        updated_at: parse_timestamp(row, 6)?,
    })
}
