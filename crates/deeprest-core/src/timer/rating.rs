//! End-of-focus rating hand-off.
//!
//! The machine does not wait on the UI. `TimerMachine::request_rating`
//! returns a `RatingRequest` that the UI hands back, together with its
//! answer, to `TimerMachine::submit_rating`. A request that is never
//! answered expires and the focus session is finalized without a rating on
//! the next tick.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Continuation for a pending end-of-focus rating prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RatingRequest {
    /// Focus session the rating belongs to.
    pub session_id: String,
    /// When the prompt was raised. The focus session ends at this instant.
    pub requested_at: DateTime<Utc>,
    /// After this instant the session is finalized without a rating.
    pub expires_at: DateTime<Utc>,
}

impl RatingRequest {
    pub(crate) fn new(session_id: String, requested_at: DateTime<Utc>, timeout_secs: u64) -> Self {
        let secs = i64::try_from(timeout_secs)
            .unwrap_or(i64::MAX)
            .min(i64::MAX / 1000);
        let timeout = Duration::seconds(secs);
        let expires_at = requested_at
            .checked_add_signed(timeout)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        Self {
            session_id,
            requested_at,
            expires_at,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Time left to answer, zero once expired.
    pub fn time_left(&self, now: DateTime<Utc>) -> Duration {
        (self.expires_at - now).max(Duration::zero())
    }
}
