use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::rating::RatingRequest;
use super::settings::SessionType;
use crate::models::{Rating, Session, SessionDraft};

/// Flat view of [`TimerState`] for display and error messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimerStatus {
    Idle,
    Running,
    Paused,
    Overtime,
    Completed,
}

impl TimerStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TimerStatus::Idle => "idle",
            TimerStatus::Running => "running",
            TimerStatus::Paused => "paused",
            TimerStatus::Overtime => "overtime",
            TimerStatus::Completed => "completed",
        }
    }
}

impl fmt::Display for TimerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The interval currently on the clock.
///
/// Elapsed time is `elapsed_before_ms` plus the wall-clock time since
/// `resumed_at`. It is recomputed on every read rather than accumulated per
/// tick, so a suspended process loses nothing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveInterval {
    pub session_id: String,
    pub session_type: SessionType,
    pub draft: SessionDraft,
    pub started_at: DateTime<Utc>,
    pub planned_ms: u64,
    /// Time counted before the most recent resume.
    pub elapsed_before_ms: u64,
    /// Set while the clock is counting; `None` while paused.
    pub resumed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub rating_request: Option<RatingRequest>,
}

impl ActiveInterval {
    pub(crate) fn begin(
        session_type: SessionType,
        planned_ms: u64,
        draft: SessionDraft,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            session_id: Uuid::new_v4().to_string(),
            session_type,
            draft,
            started_at: now,
            planned_ms,
            elapsed_before_ms: 0,
            resumed_at: Some(now),
            rating_request: None,
        }
    }

    pub fn elapsed_ms(&self, now: DateTime<Utc>) -> u64 {
        let live = self
            .resumed_at
            .map(|since| u64::try_from((now - since).num_milliseconds()).unwrap_or(0))
            .unwrap_or(0);
        self.elapsed_before_ms.saturating_add(live)
    }

    pub fn remaining_ms(&self, now: DateTime<Utc>) -> u64 {
        self.planned_ms.saturating_sub(self.elapsed_ms(now))
    }

    pub fn overtime_ms(&self, now: DateTime<Utc>) -> u64 {
        self.elapsed_ms(now).saturating_sub(self.planned_ms)
    }

    pub fn is_past_plan(&self, now: DateTime<Utc>) -> bool {
        self.elapsed_ms(now) >= self.planned_ms
    }

    /// Stop counting, banking the time elapsed so far.
    pub(crate) fn bank(&mut self, now: DateTime<Utc>) {
        self.elapsed_before_ms = self.elapsed_ms(now);
        self.resumed_at = None;
    }

    pub(crate) fn resume(&mut self, now: DateTime<Utc>) {
        if self.resumed_at.is_none() {
            self.resumed_at = Some(now);
        }
    }

    /// Turn the interval into its immutable record.
    pub(crate) fn finalize(
        self,
        end_time: DateTime<Utc>,
        is_completed: bool,
        rating: Option<Rating>,
    ) -> Session {
        Session {
            id: self.session_id,
            task_description: self.draft.task_description,
            project_id: self.draft.project_id,
            start_time: self.started_at,
            end_time: Some(end_time.max(self.started_at)),
            duration_min: self.planned_ms / 60_000,
            is_completed,
            rating: if is_completed && self.session_type == SessionType::Focus {
                rating
            } else {
                None
            },
            notes: self.draft.notes,
            tags: self.draft.tags,
            session_type: self.session_type,
        }
    }
}

/// Timer state with per-state payload.
///
/// Each variant carries only what is meaningful in it: a paused interval
/// always has its banked elapsed time, and an idle timer has no interval.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum TimerState {
    #[default]
    Idle,
    Running {
        interval: ActiveInterval,
    },
    Paused {
        interval: ActiveInterval,
    },
    /// Still counting past the planned duration; ends only on user action.
    Overtime {
        interval: ActiveInterval,
    },
    Completed {
        last_session_id: String,
    },
}

impl TimerState {
    pub fn status(&self) -> TimerStatus {
        match self {
            TimerState::Idle => TimerStatus::Idle,
            TimerState::Running { .. } => TimerStatus::Running,
            TimerState::Paused { .. } => TimerStatus::Paused,
            TimerState::Overtime { .. } => TimerStatus::Overtime,
            TimerState::Completed { .. } => TimerStatus::Completed,
        }
    }

    pub fn interval(&self) -> Option<&ActiveInterval> {
        match self {
            TimerState::Running { interval }
            | TimerState::Paused { interval }
            | TimerState::Overtime { interval } => Some(interval),
            TimerState::Idle | TimerState::Completed { .. } => None,
        }
    }

    pub fn session_type(&self) -> Option<SessionType> {
        self.interval().map(|i| i.session_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn elapsed_excludes_time_while_banked() {
        let t0 = Utc::now();
        let mut interval =
            ActiveInterval::begin(SessionType::Focus, 10 * 60_000, SessionDraft::default(), t0);
        interval.bank(t0 + Duration::minutes(4));
        assert_eq!(interval.elapsed_ms(t0 + Duration::minutes(30)), 4 * 60_000);
        interval.resume(t0 + Duration::minutes(30));
        assert_eq!(interval.elapsed_ms(t0 + Duration::minutes(31)), 5 * 60_000);
        assert_eq!(interval.remaining_ms(t0 + Duration::minutes(31)), 5 * 60_000);
    }

    #[test]
    fn clock_going_backwards_counts_as_zero() {
        let t0 = Utc::now();
        let interval =
            ActiveInterval::begin(SessionType::Break, 60_000, SessionDraft::default(), t0);
        assert_eq!(interval.elapsed_ms(t0 - Duration::minutes(5)), 0);
    }

    #[test]
    fn finalize_drops_rating_for_breaks() {
        let t0 = Utc::now();
        let interval =
            ActiveInterval::begin(SessionType::Break, 60_000, SessionDraft::default(), t0);
        let session = interval.finalize(t0 + Duration::minutes(1), true, Rating::new(5).ok());
        assert!(session.rating.is_none());
        assert_eq!(session.duration_min, 1);
    }

    #[test]
    fn state_serializes_with_status_tag() {
        let json = serde_json::to_value(TimerState::Idle).unwrap();
        assert_eq!(json["status"], "idle");

        let t0 = Utc::now();
        let state = TimerState::Paused {
            interval: ActiveInterval::begin(
                SessionType::Focus,
                60_000,
                SessionDraft::new("Read"),
                t0,
            ),
        };
        let json = serde_json::to_string(&state).unwrap();
        let decoded: TimerState = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, state);
    }
}
