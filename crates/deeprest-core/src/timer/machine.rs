//! Focus/break timer state machine.
//!
//! The machine is wall-clock based. It does not use internal threads; the
//! caller is responsible for calling `tick()` periodically. Skipped ticks
//! are harmless because elapsed time is recomputed from the clock.
//!
//! ## State Transitions
//!
//! ```text
//! Idle | Completed --start--> Running <--pause/resume--> Paused
//! Running --(plan elapsed)--> Overtime
//! Running(focus) | Overtime(focus) --end_focus_to_break--> Running(break) | Idle
//! Running(break) | Overtime(break) --complete--> Completed
//! Running | Paused | Overtime --cancel_early--> Idle
//! ```
//!
//! ## Usage
//!
//! ```ignore
//! let mut machine = TimerMachine::new(TimerSettings::default());
//! machine.start_focus(SessionDraft::new("Write chapter"))?;
//! // In a loop:
//! machine.tick(); // Some(Transition) when the interval runs into overtime
//! let (request, _) = machine.request_rating()?;
//! machine.submit_rating(&request, Some(Rating::new(4)?))?;
//! ```

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info};

use super::clock::{Clock, SystemClock};
use super::rating::RatingRequest;
use super::settings::{minutes_to_ms, SessionType, TimerSettings};
use super::state::{ActiveInterval, TimerState, TimerStatus};
use crate::error::TimerError;
use crate::events::Event;
use crate::models::{Rating, Session, SessionDraft};

/// Result of a successful operation.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub from: TimerStatus,
    pub to: TimerStatus,
    pub events: Vec<Event>,
    /// Sessions finalized by this transition, oldest first. At most one per
    /// terminating step; two only when an expired rating prompt was settled
    /// on the way.
    pub finalized: Vec<Session>,
}

impl Transition {
    fn begin(from: TimerStatus) -> Self {
        Self {
            from,
            to: from,
            events: Vec::new(),
            finalized: Vec::new(),
        }
    }

    /// The most recently finalized session, if any.
    pub fn finalized_session(&self) -> Option<&Session> {
        self.finalized.last()
    }

    pub fn is_noop(&self) -> bool {
        self.events.is_empty() && self.finalized.is_empty()
    }
}

/// Core timer state machine.
///
/// Operates on wall-clock deltas -- no internal thread.
/// Every rejected operation leaves the state as it was.
#[derive(Debug)]
pub struct TimerMachine<C = SystemClock> {
    state: TimerState,
    settings: TimerSettings,
    clock: C,
    /// Append-only log of sessions finalized by this machine.
    history: Vec<Session>,
    /// Catch-up events from rejected commands, delivered with the next
    /// transition or through [`take_deferred_events`](Self::take_deferred_events).
    deferred: Vec<Event>,
}

impl TimerMachine<SystemClock> {
    pub fn new(settings: TimerSettings) -> Self {
        Self::with_clock(settings, SystemClock)
    }
}

impl<C: Clock> TimerMachine<C> {
    pub fn with_clock(settings: TimerSettings, clock: C) -> Self {
        Self::restore(TimerState::Idle, settings, clock)
    }

    /// Rebuild a machine around a previously saved state.
    ///
    /// The session history starts empty; earlier sessions live in the store.
    pub fn restore(state: TimerState, settings: TimerSettings, clock: C) -> Self {
        Self {
            state,
            settings,
            clock,
            history: Vec::new(),
            deferred: Vec::new(),
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn state(&self) -> &TimerState {
        &self.state
    }

    /// Observed status. A running interval past its plan reads as
    /// `Overtime` even before the next tick commits it.
    pub fn status(&self) -> TimerStatus {
        self.observed_status(self.clock.now())
    }

    pub fn session_type(&self) -> Option<SessionType> {
        self.state.session_type()
    }

    pub fn current_interval(&self) -> Option<&ActiveInterval> {
        self.state.interval()
    }

    pub fn elapsed_ms(&self) -> u64 {
        let now = self.clock.now();
        self.state.interval().map_or(0, |i| i.elapsed_ms(now))
    }

    pub fn remaining_ms(&self) -> u64 {
        let now = self.clock.now();
        self.state.interval().map_or(0, |i| i.remaining_ms(now))
    }

    pub fn planned_ms(&self) -> u64 {
        self.state.interval().map_or(0, |i| i.planned_ms)
    }

    pub fn overtime_ms(&self) -> u64 {
        let now = self.clock.now();
        self.state.interval().map_or(0, |i| i.overtime_ms(now))
    }

    pub fn is_overtime(&self) -> bool {
        self.status() == TimerStatus::Overtime
    }

    pub fn pending_rating(&self) -> Option<&RatingRequest> {
        self.state
            .interval()
            .and_then(|i| i.rating_request.as_ref())
    }

    pub fn settings(&self) -> &TimerSettings {
        &self.settings
    }

    /// Replace settings. The interval in progress keeps its size.
    pub fn set_settings(&mut self, settings: TimerSettings) {
        debug!(
            focus_duration = settings.focus_duration,
            break_duration = settings.break_duration,
            "timer settings updated"
        );
        self.settings = settings;
    }

    /// Sessions finalized by this machine, oldest first.
    pub fn sessions(&self) -> &[Session] {
        &self.history
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Build a full state snapshot event.
    pub fn snapshot(&self) -> Event {
        let now = self.clock.now();
        let interval = self.state.interval();
        let status = self.observed_status(now);
        Event::StateSnapshot {
            status,
            session_type: interval.map(|i| i.session_type),
            session_id: interval.map(|i| i.session_id.clone()),
            task_description: interval
                .map(|i| i.draft.task_description.clone())
                .filter(|t| !t.is_empty()),
            elapsed_ms: interval.map_or(0, |i| i.elapsed_ms(now)),
            remaining_ms: interval.map_or(0, |i| i.remaining_ms(now)),
            planned_ms: interval.map_or(0, |i| i.planned_ms),
            overtime_ms: interval.map_or(0, |i| i.overtime_ms(now)),
            is_overtime: status == TimerStatus::Overtime,
            pending_rating: self.pending_rating().cloned(),
            rating_secs_left: self
                .pending_rating()
                .map(|r| r.time_left(now).num_seconds()),
            at: now,
        }
    }

    /// Drain events produced by catch-up during rejected commands.
    pub fn take_deferred_events(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.deferred)
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Start a new interval of `duration_min` minutes.
    pub fn start(
        &mut self,
        kind: SessionType,
        duration_min: u64,
        draft: SessionDraft,
    ) -> Result<Transition, TimerError> {
        if duration_min == 0 {
            return Err(TimerError::InvalidDuration {
                minutes: duration_min,
            });
        }
        let now = self.clock.now();
        let mut transition = self.catch_up(now);
        if !matches!(self.state, TimerState::Idle | TimerState::Completed { .. }) {
            return Err(self.reject(transition, "start"));
        }

        let interval = ActiveInterval::begin(kind, minutes_to_ms(duration_min), draft, now);
        transition.events.push(Event::TimerStarted {
            session_id: interval.session_id.clone(),
            session_type: kind,
            duration_secs: duration_min.saturating_mul(60),
            at: now,
        });
        self.state = TimerState::Running { interval };
        Ok(self.finish(transition))
    }

    /// Start a focus interval sized by the current settings.
    pub fn start_focus(&mut self, draft: SessionDraft) -> Result<Transition, TimerError> {
        self.start(SessionType::Focus, self.settings.focus_duration, draft)
    }

    /// Start a standalone break sized by the current settings.
    pub fn start_break(&mut self) -> Result<Transition, TimerError> {
        self.start(
            SessionType::Break,
            self.settings.break_duration,
            SessionDraft::default(),
        )
    }

    /// Pause the running interval. Not allowed while a rating prompt is
    /// open, since the focus interval already ended at the prompt.
    pub fn pause(&mut self) -> Result<Transition, TimerError> {
        let now = self.clock.now();
        let mut transition = self.catch_up(now);
        match std::mem::take(&mut self.state) {
            TimerState::Running { mut interval } if interval.rating_request.is_none() => {
                interval.bank(now);
                transition.events.push(Event::TimerPaused {
                    session_id: interval.session_id.clone(),
                    remaining_ms: interval.remaining_ms(now),
                    at: now,
                });
                self.state = TimerState::Paused { interval };
                Ok(self.finish(transition))
            }
            TimerState::Running { interval } => {
                self.state = TimerState::Running { interval };
                Err(self.reject(transition, "pause with a rating prompt open"))
            }
            other => {
                self.state = other;
                Err(self.reject(transition, "pause"))
            }
        }
    }

    pub fn resume(&mut self) -> Result<Transition, TimerError> {
        let now = self.clock.now();
        let mut transition = self.catch_up(now);
        match std::mem::take(&mut self.state) {
            TimerState::Paused { mut interval } => {
                interval.resume(now);
                transition.events.push(Event::TimerResumed {
                    session_id: interval.session_id.clone(),
                    remaining_ms: interval.remaining_ms(now),
                    at: now,
                });
                self.state = if interval.is_past_plan(now) {
                    TimerState::Overtime { interval }
                } else {
                    TimerState::Running { interval }
                };
                Ok(self.finish(transition))
            }
            other => {
                self.state = other;
                Err(self.reject(transition, "resume"))
            }
        }
    }

    /// Call periodically. Commits time-driven changes: entering overtime and
    /// settling expired rating prompts. Returns `None` when nothing changed.
    pub fn tick(&mut self) -> Option<Transition> {
        let now = self.clock.now();
        let transition = self.catch_up(now);
        if transition.is_noop() && self.deferred.is_empty() {
            None
        } else {
            Some(self.finish(transition))
        }
    }

    /// Raise the end-of-focus rating prompt.
    ///
    /// Idempotent while a prompt is pending: the same request is returned.
    /// The focus interval ends at the request time; answer through
    /// [`submit_rating`](Self::submit_rating). The returned transition holds
    /// whatever catch-up happened on the way, often nothing.
    pub fn request_rating(&mut self) -> Result<(RatingRequest, Transition), TimerError> {
        let now = self.clock.now();
        let transition = self.catch_up(now);
        let timeout = self.settings.rating_timeout_secs;
        let request = match &mut self.state {
            TimerState::Running { interval } | TimerState::Overtime { interval }
                if interval.session_type == SessionType::Focus =>
            {
                match &interval.rating_request {
                    Some(existing) => existing.clone(),
                    None => {
                        let request =
                            RatingRequest::new(interval.session_id.clone(), now, timeout);
                        debug!(
                            session_id = %request.session_id,
                            expires_at = %request.expires_at,
                            "rating requested"
                        );
                        interval.rating_request = Some(request.clone());
                        request
                    }
                }
            }
            _ => return Err(self.reject(transition, "request rating")),
        };
        Ok((request, self.finish(transition)))
    }

    /// Answer a rating prompt and move on to the break.
    pub fn submit_rating(
        &mut self,
        request: &RatingRequest,
        rating: Option<Rating>,
    ) -> Result<Transition, TimerError> {
        let now = self.clock.now();
        let mut transition = self.catch_up(now);
        if self.pending_rating() != Some(request) {
            debug!(session_id = %request.session_id, "stale rating request rejected");
            self.deferred.extend(transition.events);
            return Err(TimerError::StaleRatingRequest {
                session_id: request.session_id.clone(),
            });
        }
        self.finish_focus(&mut transition, rating, request.requested_at, now);
        Ok(self.finish(transition))
    }

    /// Finalize the focus interval as completed and start the break, or go
    /// idle when the configured break is zero minutes.
    pub fn end_focus_to_break(&mut self, rating: Option<Rating>) -> Result<Transition, TimerError> {
        let now = self.clock.now();
        let mut transition = self.catch_up(now);
        let counting_focus = matches!(
            &self.state,
            TimerState::Running { interval } | TimerState::Overtime { interval }
                if interval.session_type == SessionType::Focus
        );
        if !counting_focus {
            return Err(self.reject(transition, "end focus"));
        }
        let ended_at = self.pending_rating().map_or(now, |r| r.requested_at);
        self.finish_focus(&mut transition, rating, ended_at, now);
        Ok(self.finish(transition))
    }

    /// Abandon the current interval. Records it as not completed, ending
    /// at the open rating prompt if there is one.
    pub fn cancel_early(&mut self) -> Result<Transition, TimerError> {
        let now = self.clock.now();
        let mut transition = self.catch_up(now);
        let interval = match std::mem::take(&mut self.state) {
            TimerState::Running { interval }
            | TimerState::Paused { interval }
            | TimerState::Overtime { interval } => interval,
            other => {
                self.state = other;
                return Err(self.reject(transition, "cancel"));
            }
        };
        let ended_at = interval
            .rating_request
            .as_ref()
            .map_or(now, |r| r.requested_at);
        let elapsed_ms = interval.elapsed_ms(ended_at);
        let session_type = interval.session_type;
        let session = interval.finalize(ended_at, false, None);
        transition.events.push(Event::IntervalCancelled {
            session_id: session.id.clone(),
            session_type,
            elapsed_ms,
            at: now,
        });
        self.record(&mut transition, session);
        self.state = TimerState::Idle;
        Ok(self.finish(transition))
    }

    /// Finish the break interval, ending the cycle.
    pub fn complete(&mut self) -> Result<Transition, TimerError> {
        let now = self.clock.now();
        let mut transition = self.catch_up(now);
        match std::mem::take(&mut self.state) {
            TimerState::Running { interval } | TimerState::Overtime { interval }
                if interval.session_type == SessionType::Break =>
            {
                let session = interval.finalize(now, true, None);
                let last_session_id = session.id.clone();
                transition.events.push(Event::TimerCompleted {
                    session_id: session.id.clone(),
                    session_type: SessionType::Break,
                    at: now,
                });
                self.record(&mut transition, session);
                self.state = TimerState::Completed { last_session_id };
                Ok(self.finish(transition))
            }
            other => {
                self.state = other;
                Err(self.reject(transition, "complete"))
            }
        }
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn observed_status(&self, now: DateTime<Utc>) -> TimerStatus {
        match &self.state {
            TimerState::Running { interval } if interval.is_past_plan(now) => {
                TimerStatus::Overtime
            }
            other => other.status(),
        }
    }

    /// Apply changes that are due purely because time has passed.
    fn catch_up(&mut self, now: DateTime<Utc>) -> Transition {
        let mut transition = Transition::begin(self.state.status());

        let expired = self
            .pending_rating()
            .filter(|r| r.is_expired(now))
            .cloned();
        if let Some(request) = expired {
            debug!(
                session_id = %request.session_id,
                "rating request expired, finalizing without rating"
            );
            self.finish_focus(
                &mut transition,
                None,
                request.requested_at,
                request.expires_at,
            );
        }

        self.state = match std::mem::take(&mut self.state) {
            TimerState::Running { interval } if interval.is_past_plan(now) => {
                let over = i64::try_from(interval.overtime_ms(now)).unwrap_or(0);
                transition.events.push(Event::OvertimeStarted {
                    session_id: interval.session_id.clone(),
                    session_type: interval.session_type,
                    at: now - Duration::milliseconds(over),
                });
                TimerState::Overtime { interval }
            }
            other => other,
        };

        transition
    }

    /// Finalize the current focus interval and begin the break at
    /// `break_starts_at`.
    fn finish_focus(
        &mut self,
        transition: &mut Transition,
        rating: Option<Rating>,
        ended_at: DateTime<Utc>,
        break_starts_at: DateTime<Utc>,
    ) {
        let interval = match std::mem::take(&mut self.state) {
            TimerState::Running { interval }
            | TimerState::Paused { interval }
            | TimerState::Overtime { interval } => interval,
            other => {
                self.state = other;
                return;
            }
        };
        let overtime_ms = interval.overtime_ms(ended_at);
        let break_draft = interval.draft.for_break();
        let session = interval.finalize(ended_at, true, rating);
        transition.events.push(Event::FocusEnded {
            session_id: session.id.clone(),
            rating: session.rating,
            overtime_ms,
            at: ended_at,
        });
        self.record(transition, session);

        if self.settings.break_duration > 0 {
            let rest = ActiveInterval::begin(
                SessionType::Break,
                self.settings.break_ms(),
                break_draft,
                break_starts_at,
            );
            transition.events.push(Event::TimerStarted {
                session_id: rest.session_id.clone(),
                session_type: SessionType::Break,
                duration_secs: self.settings.break_duration.saturating_mul(60),
                at: break_starts_at,
            });
            self.state = TimerState::Running { interval: rest };
        } else {
            self.state = TimerState::Idle;
        }
    }

    fn record(&mut self, transition: &mut Transition, session: Session) {
        info!(
            session_id = %session.id,
            session_type = %session.session_type,
            completed = session.is_completed,
            rating = ?session.rating.map(|r| r.value()),
            "session finalized"
        );
        self.history.push(session.clone());
        transition.finalized.push(session);
    }

    fn finish(&mut self, mut transition: Transition) -> Transition {
        if !self.deferred.is_empty() {
            let mut events = std::mem::take(&mut self.deferred);
            events.append(&mut transition.events);
            transition.events = events;
        }
        transition.to = self.state.status();
        if transition.from != transition.to {
            debug!(from = %transition.from, to = %transition.to, "timer transition");
        }
        transition
    }

    /// Reject `operation`, keeping the catch-up events for later delivery.
    fn reject(&mut self, transition: Transition, operation: &'static str) -> TimerError {
        self.deferred.extend(transition.events);
        let status = self.state.status();
        debug!(operation, %status, "transition rejected");
        TimerError::InvalidTransition { operation, status }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timer::ManualClock;

    fn machine() -> (TimerMachine<ManualClock>, ManualClock) {
        let clock = ManualClock::new(Utc::now());
        let machine = TimerMachine::with_clock(TimerSettings::default(), clock.clone());
        (machine, clock)
    }

    fn rating(value: u8) -> Option<Rating> {
        Some(Rating::new(value).unwrap())
    }

    #[test]
    fn start_pause_resume() {
        let (mut machine, _clock) = machine();
        assert_eq!(machine.status(), TimerStatus::Idle);

        machine.start_focus(SessionDraft::new("Outline")).unwrap();
        assert_eq!(machine.status(), TimerStatus::Running);

        machine.pause().unwrap();
        assert_eq!(machine.status(), TimerStatus::Paused);

        machine.resume().unwrap();
        assert_eq!(machine.status(), TimerStatus::Running);
    }

    #[test]
    fn start_reports_full_remaining_time() {
        let (mut machine, _clock) = machine();
        let t = machine
            .start(SessionType::Focus, 40, SessionDraft::default())
            .unwrap();
        assert_eq!(t.from, TimerStatus::Idle);
        assert_eq!(t.to, TimerStatus::Running);
        assert_eq!(machine.remaining_ms(), 40 * 60_000);
        assert_eq!(machine.planned_ms(), 40 * 60_000);
    }

    #[test]
    fn zero_duration_is_rejected_without_state_change() {
        let (mut machine, _clock) = machine();
        let err = machine
            .start(SessionType::Focus, 0, SessionDraft::default())
            .unwrap_err();
        assert_eq!(err, TimerError::InvalidDuration { minutes: 0 });
        assert_eq!(machine.state(), &TimerState::Idle);
    }

    #[test]
    fn start_while_running_is_rejected() {
        let (mut machine, _clock) = machine();
        machine.start_focus(SessionDraft::default()).unwrap();
        let before = machine.state().clone();
        let err = machine.start_break().unwrap_err();
        assert!(matches!(
            err,
            TimerError::InvalidTransition {
                operation: "start",
                status: TimerStatus::Running
            }
        ));
        assert_eq!(machine.state(), &before);
    }

    #[test]
    fn pause_from_idle_or_completed_is_rejected() {
        let (mut machine, _clock) = machine();
        assert!(matches!(
            machine.pause(),
            Err(TimerError::InvalidTransition {
                status: TimerStatus::Idle,
                ..
            })
        ));

        machine.start_break().unwrap();
        machine.complete().unwrap();
        assert_eq!(machine.status(), TimerStatus::Completed);
        assert!(machine.pause().is_err());
        assert_eq!(machine.status(), TimerStatus::Completed);
    }

    #[test]
    fn paused_time_is_not_counted() {
        let (mut machine, clock) = machine();
        machine.start_focus(SessionDraft::default()).unwrap();
        clock.advance_mins(10);
        machine.pause().unwrap();
        clock.advance_mins(60);
        assert_eq!(machine.remaining_ms(), 15 * 60_000);
        machine.resume().unwrap();
        clock.advance_mins(5);
        assert_eq!(machine.remaining_ms(), 10 * 60_000);
        assert_eq!(machine.elapsed_ms(), 15 * 60_000);
    }

    #[test]
    fn overtime_reads_before_tick_and_commits_on_tick() {
        let (mut machine, clock) = machine();
        machine.start_focus(SessionDraft::default()).unwrap();
        clock.advance_mins(25);

        assert!(machine.is_overtime());
        assert_eq!(machine.state().status(), TimerStatus::Running);

        let t = machine.tick().unwrap();
        assert_eq!(t.to, TimerStatus::Overtime);
        assert!(matches!(t.events[0], Event::OvertimeStarted { .. }));
        assert_eq!(machine.state().status(), TimerStatus::Overtime);

        // Idempotent.
        assert!(machine.tick().is_none());
        clock.advance_mins(3);
        assert!(machine.tick().is_none());
        assert_eq!(machine.overtime_ms(), 3 * 60_000);
        assert_eq!(machine.remaining_ms(), 0);
    }

    #[test]
    fn overtime_event_reports_crossing_time() {
        let (mut machine, clock) = machine();
        let started = clock.now();
        machine.start_focus(SessionDraft::default()).unwrap();
        clock.advance_mins(40);
        let t = machine.tick().unwrap();
        match &t.events[0] {
            Event::OvertimeStarted { at, .. } => {
                assert_eq!(*at, started + Duration::minutes(25));
            }
            other => panic!("Expected OvertimeStarted, got {other:?}"),
        }
    }

    #[test]
    fn pause_in_overtime_is_rejected() {
        let (mut machine, clock) = machine();
        machine.start_focus(SessionDraft::default()).unwrap();
        clock.advance_mins(26);
        assert!(matches!(
            machine.pause(),
            Err(TimerError::InvalidTransition {
                status: TimerStatus::Overtime,
                ..
            })
        ));
        assert!(machine.is_overtime());
    }

    #[test]
    fn end_focus_records_rating_and_starts_break() {
        let (mut machine, clock) = machine();
        machine
            .start_focus(SessionDraft::new("Refactor parser").with_project("p-1"))
            .unwrap();
        clock.advance_mins(25);
        let t = machine.end_focus_to_break(rating(4)).unwrap();

        let session = t.finalized_session().unwrap();
        assert_eq!(session.session_type, SessionType::Focus);
        assert!(session.is_completed);
        assert_eq!(session.rating, rating(4));
        assert_eq!(session.project_id.as_deref(), Some("p-1"));
        assert_eq!(session.end_time, Some(clock.now()));

        assert_eq!(machine.status(), TimerStatus::Running);
        assert_eq!(machine.session_type(), Some(SessionType::Break));
        assert_eq!(machine.remaining_ms(), 5 * 60_000);
        assert_eq!(
            machine.current_interval().unwrap().draft.project_id.as_deref(),
            Some("p-1")
        );
    }

    #[test]
    fn end_focus_with_zero_break_goes_idle() {
        let clock = ManualClock::new(Utc::now());
        let settings = TimerSettings {
            break_duration: 0,
            ..TimerSettings::default()
        };
        let mut machine = TimerMachine::with_clock(settings, clock.clone());
        machine.start_focus(SessionDraft::default()).unwrap();
        clock.advance_mins(5);
        let t = machine.end_focus_to_break(None).unwrap();
        assert_eq!(t.to, TimerStatus::Idle);
        assert_eq!(machine.sessions().len(), 1);
    }

    #[test]
    fn end_focus_during_break_is_rejected() {
        let (mut machine, _clock) = machine();
        machine.start_break().unwrap();
        assert!(machine.end_focus_to_break(None).is_err());
        assert!(machine.sessions().is_empty());
    }

    #[test]
    fn complete_only_finishes_breaks() {
        let (mut machine, clock) = machine();
        machine.start_focus(SessionDraft::default()).unwrap();
        assert!(matches!(
            machine.complete(),
            Err(TimerError::InvalidTransition {
                operation: "complete",
                ..
            })
        ));

        machine.end_focus_to_break(None).unwrap();
        clock.advance_mins(5);
        let t = machine.complete().unwrap();
        assert_eq!(t.to, TimerStatus::Completed);
        let rest = t.finalized_session().unwrap();
        assert_eq!(rest.session_type, SessionType::Break);
        assert!(rest.is_completed);
        assert!(rest.rating.is_none());
        assert_eq!(
            machine.state(),
            &TimerState::Completed {
                last_session_id: rest.id.clone()
            }
        );

        // A new cycle starts from Completed.
        machine.start_focus(SessionDraft::default()).unwrap();
        assert_eq!(machine.status(), TimerStatus::Running);
    }

    #[test]
    fn cancel_records_incomplete_session() {
        let (mut machine, clock) = machine();
        machine.start_focus(SessionDraft::new("Email")).unwrap();
        clock.advance_mins(7);
        let t = machine.cancel_early().unwrap();
        assert_eq!(t.to, TimerStatus::Idle);
        let session = t.finalized_session().unwrap();
        assert!(!session.is_completed);
        assert!(session.rating.is_none());
        assert_eq!(session.end_time, Some(clock.now()));
        assert_eq!(machine.sessions().len(), 1);
    }

    #[test]
    fn cancel_from_idle_or_completed_is_rejected() {
        let (mut machine, _clock) = machine();
        assert!(machine.cancel_early().is_err());

        machine.start_break().unwrap();
        machine.complete().unwrap();
        let before = machine.state().clone();
        assert!(machine.cancel_early().is_err());
        assert_eq!(machine.state(), &before);
        assert_eq!(machine.sessions().len(), 1);
    }

    #[test]
    fn rating_request_is_idempotent_and_ends_focus_at_request_time() {
        let (mut machine, clock) = machine();
        machine.start_focus(SessionDraft::default()).unwrap();
        clock.advance_mins(20);
        let request = machine.request_rating().unwrap().0;
        let requested_at = clock.now();
        clock.advance_secs(30);
        assert_eq!(machine.request_rating().unwrap().0, request);

        let t = machine.submit_rating(&request, rating(5)).unwrap();
        let focus = &t.finalized[0];
        assert_eq!(focus.end_time, Some(requested_at));
        assert_eq!(focus.rating, rating(5));

        // Break starts when the answer arrives.
        assert_eq!(machine.remaining_ms(), 5 * 60_000);
    }

    #[test]
    fn pause_with_rating_prompt_is_rejected() {
        let (mut machine, clock) = machine();
        machine.start_focus(SessionDraft::default()).unwrap();
        clock.advance_mins(10);
        let request = machine.request_rating().unwrap().0;

        let err = machine.pause().unwrap_err();
        assert!(matches!(
            err,
            TimerError::InvalidTransition {
                operation: "pause with a rating prompt open",
                status: TimerStatus::Running
            }
        ));
        assert_eq!(machine.pending_rating(), Some(&request));
        assert_eq!(machine.status(), TimerStatus::Running);
    }

    #[test]
    fn cancel_with_rating_prompt_ends_at_request_time() {
        let (mut machine, clock) = machine();
        machine.start_focus(SessionDraft::default()).unwrap();
        clock.advance_mins(12);
        let request = machine.request_rating().unwrap().0;
        clock.advance_secs(45);

        let t = machine.cancel_early().unwrap();
        let session = t.finalized_session().unwrap();
        assert!(!session.is_completed);
        assert_eq!(session.end_time, Some(request.requested_at));
        match &t.events[0] {
            Event::IntervalCancelled { elapsed_ms, .. } => {
                assert_eq!(*elapsed_ms, 12 * 60_000);
            }
            other => panic!("Expected IntervalCancelled, got {other:?}"),
        }
    }

    #[test]
    fn rejected_command_keeps_catch_up_events() {
        let (mut machine, clock) = machine();
        machine.start_focus(SessionDraft::default()).unwrap();
        let request = machine.request_rating().unwrap().0;
        clock.advance_secs(i64::try_from(TimerSettings::default().rating_timeout_secs).unwrap());

        // The expired prompt settles into a break, so another prompt is refused.
        assert!(machine.request_rating().is_err());
        assert_eq!(machine.sessions().len(), 1);

        let events = machine.take_deferred_events();
        assert!(matches!(
            &events[0],
            Event::FocusEnded { session_id, rating: None, .. } if *session_id == request.session_id
        ));
        assert!(machine.take_deferred_events().is_empty());
    }

    #[test]
    fn deferred_events_ride_on_the_next_transition() {
        let (mut machine, clock) = machine();
        machine.start_focus(SessionDraft::default()).unwrap();
        clock.advance_mins(26);
        assert!(machine.start_break().is_err());
        assert_eq!(machine.status(), TimerStatus::Overtime);

        let t = machine.tick().unwrap();
        assert!(matches!(t.events[0], Event::OvertimeStarted { .. }));
        assert!(machine.tick().is_none());
    }

    #[test]
    fn rating_request_only_for_focus() {
        let (mut machine, _clock) = machine();
        assert!(machine.request_rating().is_err());
        machine.start_break().unwrap();
        assert!(machine.request_rating().is_err());
    }

    #[test]
    fn unanswered_rating_finalizes_on_tick() {
        let (mut machine, clock) = machine();
        machine.start_focus(SessionDraft::default()).unwrap();
        clock.advance_mins(25);
        let request = machine.request_rating().unwrap().0;
        clock.advance_secs(i64::try_from(TimerSettings::default().rating_timeout_secs).unwrap());

        let t = machine.tick().unwrap();
        let focus = &t.finalized[0];
        assert!(focus.is_completed);
        assert!(focus.rating.is_none());
        assert_eq!(focus.end_time, Some(request.requested_at));
        assert_eq!(machine.session_type(), Some(SessionType::Break));
        assert!(machine.pending_rating().is_none());

        // The late answer is stale and changes nothing.
        let err = machine.submit_rating(&request, rating(3)).unwrap_err();
        assert!(matches!(err, TimerError::StaleRatingRequest { .. }));
        assert_eq!(machine.sessions().len(), 1);
    }

    #[test]
    fn snapshot_returns_valid_event() {
        let (mut machine, _clock) = machine();
        machine
            .start(SessionType::Focus, 15, SessionDraft::new("Warm up"))
            .unwrap();
        match machine.snapshot() {
            Event::StateSnapshot {
                status,
                session_type,
                remaining_ms,
                task_description,
                is_overtime,
                rating_secs_left,
                ..
            } => {
                assert_eq!(status, TimerStatus::Running);
                assert_eq!(rating_secs_left, None);
                assert_eq!(session_type, Some(SessionType::Focus));
                assert_eq!(remaining_ms, 15 * 60 * 1000);
                assert_eq!(task_description.as_deref(), Some("Warm up"));
                assert!(!is_overtime);
            }
            _ => panic!("Expected StateSnapshot"),
        }
    }

    #[test]
    fn settings_apply_to_next_interval_only() {
        let (mut machine, _clock) = machine();
        machine.start_focus(SessionDraft::default()).unwrap();
        machine.set_settings(TimerSettings {
            focus_duration: 50,
            break_duration: 10,
            ..TimerSettings::default()
        });
        assert_eq!(machine.planned_ms(), 25 * 60_000);
        machine.end_focus_to_break(None).unwrap();
        assert_eq!(machine.planned_ms(), 10 * 60_000);
    }

    #[test]
    fn restored_state_keeps_counting_from_wall_clock() {
        let (mut machine, clock) = machine();
        machine.start_focus(SessionDraft::default()).unwrap();
        let saved = serde_json::to_string(machine.state()).unwrap();

        clock.advance_mins(30);
        let state: TimerState = serde_json::from_str(&saved).unwrap();
        let restored = TimerMachine::restore(state, TimerSettings::default(), clock.clone());
        assert!(restored.is_overtime());
        assert_eq!(restored.overtime_ms(), 5 * 60_000);
        assert!(restored.sessions().is_empty());
    }
}
