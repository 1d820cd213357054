use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::Rating;
use crate::timer::{RatingRequest, SessionType, TimerStatus};

/// Every state change in the system produces an Event.
/// The UI renders them; the CLI prints them as JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    TimerStarted {
        session_id: String,
        session_type: SessionType,
        duration_secs: u64,
        at: DateTime<Utc>,
    },
    TimerPaused {
        session_id: String,
        remaining_ms: u64,
        at: DateTime<Utc>,
    },
    TimerResumed {
        session_id: String,
        remaining_ms: u64,
        at: DateTime<Utc>,
    },
    /// The planned duration ran out; the interval keeps counting.
    OvertimeStarted {
        session_id: String,
        session_type: SessionType,
        at: DateTime<Utc>,
    },
    /// A focus interval was finalized as completed.
    FocusEnded {
        session_id: String,
        rating: Option<Rating>,
        overtime_ms: u64,
        at: DateTime<Utc>,
    },
    /// An interval was abandoned before its natural end.
    IntervalCancelled {
        session_id: String,
        session_type: SessionType,
        elapsed_ms: u64,
        at: DateTime<Utc>,
    },
    /// A break interval was finished; the cycle is complete.
    TimerCompleted {
        session_id: String,
        session_type: SessionType,
        at: DateTime<Utc>,
    },
    ConnectivityChanged {
        online: bool,
        at: DateTime<Utc>,
    },
    StateSnapshot {
        status: TimerStatus,
        session_type: Option<SessionType>,
        session_id: Option<String>,
        task_description: Option<String>,
        elapsed_ms: u64,
        remaining_ms: u64,
        planned_ms: u64,
        overtime_ms: u64,
        is_overtime: bool,
        pending_rating: Option<RatingRequest>,
        /// Seconds until the open rating prompt expires.
        rating_secs_left: Option<i64>,
        at: DateTime<Utc>,
    },
}

impl Event {
    /// Short machine-friendly name, used in log lines.
    pub fn name(&self) -> &'static str {
        match self {
            Event::TimerStarted { .. } => "timer_started",
            Event::TimerPaused { .. } => "timer_paused",
            Event::TimerResumed { .. } => "timer_resumed",
            Event::OvertimeStarted { .. } => "overtime_started",
            Event::FocusEnded { .. } => "focus_ended",
            Event::IntervalCancelled { .. } => "interval_cancelled",
            Event::TimerCompleted { .. } => "timer_completed",
            Event::ConnectivityChanged { .. } => "connectivity_changed",
            Event::StateSnapshot { .. } => "state_snapshot",
        }
    }
}
