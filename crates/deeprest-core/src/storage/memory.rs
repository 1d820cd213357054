//! In-memory session store, for tests and for callers without a database.

use std::collections::BTreeMap;

use super::SessionStore;
use crate::error::StoreError;
use crate::models::{Project, Session, Tag};

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    sessions: Vec<Session>,
    projects: BTreeMap<String, Project>,
    tags: BTreeMap<String, Tag>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

impl SessionStore for MemoryStore {
    fn append_session(&mut self, session: &Session) -> Result<(), StoreError> {
        session.validate_finalized()?;
        if self.sessions.iter().any(|s| s.id == session.id) {
            return Err(StoreError::DuplicateSession(session.id.clone()));
        }
        self.sessions.push(session.clone());
        Ok(())
    }

    fn get_session(&self, id: &str) -> Result<Option<Session>, StoreError> {
        Ok(self.sessions.iter().find(|s| s.id == id).cloned())
    }

    fn list_sessions(&self, limit: Option<usize>) -> Result<Vec<Session>, StoreError> {
        let skip = limit.map_or(0, |n| self.sessions.len().saturating_sub(n));
        Ok(self.sessions[skip..].to_vec())
    }

    fn upsert_project(&mut self, project: &Project) -> Result<(), StoreError> {
        project.validate()?;
        let stored = match self.projects.get(&project.id) {
            Some(existing) => Project {
                created_at: existing.created_at,
                ..project.clone()
            },
            None => project.clone(),
        };
        self.projects.insert(stored.id.clone(), stored);
        Ok(())
    }

    fn get_project(&self, id: &str) -> Result<Option<Project>, StoreError> {
        Ok(self.projects.get(id).cloned())
    }

    fn list_projects(&self) -> Result<Vec<Project>, StoreError> {
        let mut projects: Vec<_> = self.projects.values().cloned().collect();
        projects.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.name.cmp(&b.name))
        });
        Ok(projects)
    }

    fn delete_project(&mut self, id: &str) -> Result<bool, StoreError> {
        Ok(self.projects.remove(id).is_some())
    }

    fn upsert_tag(&mut self, tag: &Tag) -> Result<(), StoreError> {
        tag.validate()?;
        self.tags.insert(tag.id.clone(), tag.clone());
        Ok(())
    }

    fn list_tags(&self) -> Result<Vec<Tag>, StoreError> {
        let mut tags: Vec<_> = self.tags.values().cloned().collect();
        tags.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(tags)
    }
}
