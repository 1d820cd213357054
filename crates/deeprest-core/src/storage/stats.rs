use chrono::{DateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::Session;

/// Aggregate numbers over a set of stored sessions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Stats {
    pub total_sessions: u64,
    pub completed_focus_sessions: u64,
    pub cancelled_sessions: u64,
    /// Wall-clock minutes, so early ends count less and overtime counts.
    pub total_focus_min: u64,
    pub total_break_min: u64,
    /// Sum of the durations the focus sessions were started with.
    pub planned_focus_min: u64,
    pub today_focus_sessions: u64,
    pub today_focus_min: u64,
    /// Mean over rated focus sessions; `None` when nothing was rated.
    pub average_rating: Option<f64>,
}

impl Stats {
    /// Only completed sessions count towards minutes. A session belongs to
    /// "today" when it started at or after `today_start`.
    pub fn from_sessions<'a, I>(sessions: I, today_start: DateTime<Utc>) -> Self
    where
        I: IntoIterator<Item = &'a Session>,
    {
        let mut stats = Self::default();
        let mut rating_sum = 0u64;
        let mut rated = 0u64;
        let (mut focus_ms, mut break_ms, mut today_ms) = (0u64, 0u64, 0u64);

        for session in sessions {
            stats.total_sessions += 1;
            if !session.is_completed {
                stats.cancelled_sessions += 1;
                continue;
            }
            let spent = wall_ms(session);
            if session.is_focus() {
                stats.completed_focus_sessions += 1;
                stats.planned_focus_min += session.duration_min;
                focus_ms += spent;
                if session.start_time >= today_start {
                    stats.today_focus_sessions += 1;
                    today_ms += spent;
                }
                if let Some(rating) = session.rating {
                    rating_sum += u64::from(rating.value());
                    rated += 1;
                }
            } else {
                break_ms += spent;
            }
        }

        stats.total_focus_min = focus_ms / 60_000;
        stats.total_break_min = break_ms / 60_000;
        stats.today_focus_min = today_ms / 60_000;
        if rated > 0 {
            stats.average_rating = Some(rating_sum as f64 / rated as f64);
        }
        stats
    }
}

fn wall_ms(session: &Session) -> u64 {
    session
        .wall_duration()
        .and_then(|d| u64::try_from(d.num_milliseconds()).ok())
        .unwrap_or(0)
}

/// Midnight UTC of the day containing `now`.
pub(crate) fn start_of_day(now: DateTime<Utc>) -> DateTime<Utc> {
    now.date_naive().and_time(NaiveTime::MIN).and_utc()
}
