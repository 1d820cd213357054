use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionType {
    Focus,
    Break,
}

impl SessionType {
    pub fn as_str(self) -> &'static str {
        match self {
            SessionType::Focus => "focus",
            SessionType::Break => "break",
        }
    }
}

impl fmt::Display for SessionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SessionType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "focus" => Ok(SessionType::Focus),
            "break" => Ok(SessionType::Break),
            other => Err(ValidationError::InvalidValue {
                field: "session_type".into(),
                message: format!("expected 'focus' or 'break', got '{other}'"),
            }),
        }
    }
}

/// Convert minutes to milliseconds.
///
/// Uses saturating arithmetic to prevent overflow with large values.
pub fn minutes_to_ms(minutes: u64) -> u64 {
    minutes.saturating_mul(60).saturating_mul(1000)
}

/// Interval sizing and feedback preferences.
///
/// Read when an interval starts; changing settings never resizes the
/// interval already in progress.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerSettings {
    /// Focus interval length in minutes.
    #[serde(default = "default_focus_duration")]
    pub focus_duration: u64,
    /// Break interval length in minutes. Zero skips the break entirely.
    #[serde(default = "default_break_duration")]
    pub break_duration: u64,
    #[serde(default = "default_true")]
    pub sound_enabled: bool,
    #[serde(default = "default_true")]
    pub notifications_enabled: bool,
    /// How long a rating prompt may stay unanswered before the focus
    /// session is finalized without a rating.
    #[serde(default = "default_rating_timeout_secs")]
    pub rating_timeout_secs: u64,
}

fn default_focus_duration() -> u64 {
    25
}
fn default_break_duration() -> u64 {
    5
}
fn default_true() -> bool {
    true
}
fn default_rating_timeout_secs() -> u64 {
    120
}

impl Default for TimerSettings {
    fn default() -> Self {
        Self {
            focus_duration: default_focus_duration(),
            break_duration: default_break_duration(),
            sound_enabled: true,
            notifications_enabled: true,
            rating_timeout_secs: default_rating_timeout_secs(),
        }
    }
}

impl TimerSettings {
    /// Configured duration in minutes for an interval of `kind`.
    pub fn duration_for(&self, kind: SessionType) -> u64 {
        match kind {
            SessionType::Focus => self.focus_duration,
            SessionType::Break => self.break_duration,
        }
    }

    pub fn break_ms(&self) -> u64 {
        minutes_to_ms(self.break_duration)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.focus_duration == 0 {
            return Err(ValidationError::InvalidValue {
                field: "focus_duration".into(),
                message: "must be greater than zero".into(),
            });
        }
        Ok(())
    }
}
