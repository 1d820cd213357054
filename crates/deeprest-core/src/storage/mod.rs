mod config;
pub mod database;
pub mod memory;
pub mod migrations;
mod stats;

pub use config::{Config, StorageConfig};
pub use database::Database;
pub use memory::MemoryStore;
pub use stats::Stats;

use std::path::PathBuf;

use crate::error::StoreError;
use crate::models::{Project, Session, Tag};

/// Persistence boundary for finalized sessions and their labels.
///
/// Sessions are append-only: a store never updates or deletes one.
/// Implementations must validate a session before writing it and must leave
/// earlier records intact when a write fails.
pub trait SessionStore {
    fn append_session(&mut self, session: &Session) -> Result<(), StoreError>;

    fn get_session(&self, id: &str) -> Result<Option<Session>, StoreError>;

    /// Sessions in append order. With a limit, the most recent `limit`.
    fn list_sessions(&self, limit: Option<usize>) -> Result<Vec<Session>, StoreError>;

    fn upsert_project(&mut self, project: &Project) -> Result<(), StoreError>;

    fn get_project(&self, id: &str) -> Result<Option<Project>, StoreError>;

    fn list_projects(&self) -> Result<Vec<Project>, StoreError>;

    /// Returns whether a project was removed. Sessions keep their reference.
    fn delete_project(&mut self, id: &str) -> Result<bool, StoreError>;

    fn upsert_tag(&mut self, tag: &Tag) -> Result<(), StoreError>;

    fn list_tags(&self) -> Result<Vec<Tag>, StoreError>;
}

/// Returns the data directory, creating it if needed.
///
/// `DEEPREST_DATA_DIR` overrides the location. Otherwise
/// `~/.config/deeprest[-dev]/` based on `DEEPREST_ENV`; set
/// `DEEPREST_ENV=dev` to use the development directory.
///
/// # Errors
/// Returns an error if creating the directory fails.
pub fn data_dir() -> std::io::Result<PathBuf> {
    let dir = match std::env::var_os("DEEPREST_DATA_DIR") {
        Some(custom) => PathBuf::from(custom),
        None => {
            let base_dir = dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".config");
            let env = std::env::var("DEEPREST_ENV").unwrap_or_else(|_| "production".to_string());
            if env == "dev" {
                base_dir.join("deeprest-dev")
            } else {
                base_dir.join("deeprest")
            }
        }
    };

    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}
