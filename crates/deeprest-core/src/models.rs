//! Session, project and tag records.

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ValidationError;
use crate::timer::SessionType;

/// End-of-focus rating, 1 (rough) to 5 (deep flow).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Rating(u8);

impl Rating {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 5;

    pub fn new(value: u8) -> Result<Self, ValidationError> {
        if (Self::MIN..=Self::MAX).contains(&value) {
            Ok(Self(value))
        } else {
            Err(ValidationError::InvalidRating { value })
        }
    }

    pub fn value(self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for Rating {
    type Error = ValidationError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Rating> for u8 {
    fn from(rating: Rating) -> Self {
        rating.0
    }
}

impl fmt::Display for Rating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What the user is working on; carried by an interval until it is
/// finalized into a [`Session`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionDraft {
    #[serde(default)]
    pub task_description: String,
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl SessionDraft {
    pub fn new(task_description: impl Into<String>) -> Self {
        Self {
            task_description: task_description.into(),
            ..Self::default()
        }
    }

    pub fn with_project(mut self, project_id: impl Into<String>) -> Self {
        self.project_id = Some(project_id.into());
        self
    }

    pub fn with_tag(mut self, tag_id: impl Into<String>) -> Self {
        self.tags.insert(tag_id.into());
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    /// Draft for the break that follows this focus interval.
    ///
    /// Breaks stay attached to the project so per-project history includes
    /// the rest taken while working on it.
    pub(crate) fn for_break(&self) -> Self {
        Self {
            project_id: self.project_id.clone(),
            ..Self::default()
        }
    }
}

/// One finalized or cancelled interval.
///
/// Produced exactly once by a terminating timer transition and never
/// modified afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub task_description: String,
    /// Reference to a [`Project`]; the project may since have been deleted.
    pub project_id: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    /// Planned length in minutes.
    pub duration_min: u64,
    pub is_completed: bool,
    pub rating: Option<Rating>,
    pub notes: Option<String>,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    pub session_type: SessionType,
}

impl Session {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.id.trim().is_empty() {
            return Err(ValidationError::InvalidValue {
                field: "id".into(),
                message: "must not be empty".into(),
            });
        }
        if let Some(end) = self.end_time {
            if end < self.start_time {
                return Err(ValidationError::InvalidTimeRange {
                    start: self.start_time,
                    end,
                });
            }
        }
        if self.rating.is_some() {
            if !self.is_completed {
                return Err(ValidationError::RatingNotAllowed(
                    "session was not completed".into(),
                ));
            }
            if self.session_type != SessionType::Focus {
                return Err(ValidationError::RatingNotAllowed(
                    "only focus sessions are rated".into(),
                ));
            }
        }
        Ok(())
    }

    /// Validation for records about to be written: must also be finalized.
    pub fn validate_finalized(&self) -> Result<(), ValidationError> {
        self.validate()?;
        if self.end_time.is_none() {
            return Err(ValidationError::NotFinalized {
                id: self.id.clone(),
            });
        }
        Ok(())
    }

    /// Wall-clock span between start and end, pauses included.
    pub fn wall_duration(&self) -> Option<Duration> {
        self.end_time.map(|end| end - self.start_time)
    }

    pub fn is_focus(&self) -> bool {
        self.session_type == SessionType::Focus
    }
}

/// A label sessions can be grouped under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub name: String,
    pub goal: Option<String>,
    pub icon: Option<String>,
    pub color: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Project {
    pub fn new(name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            goal: None,
            icon: None,
            color: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_goal(mut self, goal: impl Into<String>) -> Self {
        self.goal = Some(goal.into());
        self
    }

    pub fn with_icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = Some(icon.into());
        self
    }

    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.color = Some(color.into());
        self
    }

    pub fn rename(&mut self, name: impl Into<String>) {
        self.name = name.into();
        self.touch();
    }

    /// Mark as edited now. `updated_at` never moves before `created_at`.
    pub fn touch(&mut self) {
        self.updated_at = Utc::now().max(self.created_at);
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::InvalidValue {
                field: "name".into(),
                message: "project name must not be empty".into(),
            });
        }
        if self.updated_at < self.created_at {
            return Err(ValidationError::InvalidTimeRange {
                start: self.created_at,
                end: self.updated_at,
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub id: String,
    pub name: String,
    pub color: Option<String>,
}

impl Tag {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            color: None,
        }
    }

    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.color = Some(color.into());
        self
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::InvalidValue {
                field: "name".into(),
                message: "tag name must not be empty".into(),
            });
        }
        Ok(())
    }
}
