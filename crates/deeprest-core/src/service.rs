//! Timer plus persistence.
//!
//! [`FocusService`] forwards commands to a [`TimerMachine`] and appends every
//! finalized session to a [`SessionStore`]. A failed append never undoes the
//! transition: the session stays in the outbox and the failure is reported
//! next to the transition in [`ServiceOutcome`], or inside [`ServiceError`]
//! when the command itself was rejected.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, warn};

use crate::connectivity::{should_show_offline_banner, AlwaysOnline, Connectivity};
use crate::error::{ServiceError, StoreError, TimerError};
use crate::events::Event;
use crate::models::{Rating, Session, SessionDraft};
use crate::storage::SessionStore;
use crate::timer::{Clock, RatingRequest, SessionType, SystemClock, TimerMachine, Transition};

/// A completed transition and the outcome of persisting what it finalized.
#[derive(Debug)]
pub struct ServiceOutcome {
    pub transition: Transition,
    /// Set when a finalized session could not be appended. The session
    /// stays pending until [`FocusService::retry_pending`] succeeds.
    pub persist_error: Option<StoreError>,
}

impl ServiceOutcome {
    pub fn is_persisted(&self) -> bool {
        self.persist_error.is_none()
    }
}

/// Everything a screen needs to render.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScreenState {
    pub snapshot: Event,
    pub show_offline_banner: bool,
    pub pending_writes: usize,
}

pub struct FocusService<S, C = SystemClock> {
    machine: TimerMachine<C>,
    store: S,
    connectivity: Arc<dyn Connectivity>,
    /// Finalized sessions not yet in the store, oldest first.
    outbox: Vec<Session>,
    /// Number of entries of `machine.sessions()` already moved to the outbox.
    seen: usize,
}

impl<S: SessionStore, C: Clock> FocusService<S, C> {
    pub fn new(machine: TimerMachine<C>, store: S) -> Self {
        Self::with_pending(machine, store, Vec::new())
    }

    /// Resume with sessions an earlier run finalized but could not store.
    /// They are written ahead of anything the machine finalizes next.
    pub fn with_pending(machine: TimerMachine<C>, store: S, pending: Vec<Session>) -> Self {
        Self {
            seen: machine.sessions().len(),
            machine,
            store,
            connectivity: Arc::new(AlwaysOnline),
            outbox: pending,
        }
    }

    pub fn with_connectivity(mut self, connectivity: Arc<dyn Connectivity>) -> Self {
        self.connectivity = connectivity;
        self
    }

    pub fn machine(&self) -> &TimerMachine<C> {
        &self.machine
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    /// Finalized sessions not yet in the store, oldest first.
    pub fn pending_sessions(&self) -> &[Session] {
        &self.outbox
    }

    pub fn pending_writes(&self) -> usize {
        self.outbox.len()
    }

    pub fn view(&self) -> ScreenState {
        ScreenState {
            snapshot: self.machine.snapshot(),
            show_offline_banner: should_show_offline_banner(self.connectivity.as_ref()),
            pending_writes: self.pending_writes(),
        }
    }

    pub fn start(
        &mut self,
        kind: SessionType,
        duration_min: u64,
        draft: SessionDraft,
    ) -> Result<ServiceOutcome, ServiceError> {
        let result = self.machine.start(kind, duration_min, draft);
        self.settle(result)
    }

    pub fn start_focus(&mut self, draft: SessionDraft) -> Result<ServiceOutcome, ServiceError> {
        let result = self.machine.start_focus(draft);
        self.settle(result)
    }

    pub fn start_break(&mut self) -> Result<ServiceOutcome, ServiceError> {
        let result = self.machine.start_break();
        self.settle(result)
    }

    pub fn pause(&mut self) -> Result<ServiceOutcome, ServiceError> {
        let result = self.machine.pause();
        self.settle(result)
    }

    pub fn resume(&mut self) -> Result<ServiceOutcome, ServiceError> {
        let result = self.machine.resume();
        self.settle(result)
    }

    /// Open the rating prompt. The outcome carries any catch-up that ran
    /// first, such as an earlier prompt expiring.
    pub fn request_rating(&mut self) -> Result<(RatingRequest, ServiceOutcome), ServiceError> {
        match self.machine.request_rating() {
            Ok((request, transition)) => Ok((request, self.outcome(transition))),
            Err(e) => Err(self.reject(e)),
        }
    }

    pub fn submit_rating(
        &mut self,
        request: &RatingRequest,
        rating: Option<Rating>,
    ) -> Result<ServiceOutcome, ServiceError> {
        let result = self.machine.submit_rating(request, rating);
        self.settle(result)
    }

    pub fn end_focus_to_break(
        &mut self,
        rating: Option<Rating>,
    ) -> Result<ServiceOutcome, ServiceError> {
        let result = self.machine.end_focus_to_break(rating);
        self.settle(result)
    }

    pub fn cancel_early(&mut self) -> Result<ServiceOutcome, ServiceError> {
        let result = self.machine.cancel_early();
        self.settle(result)
    }

    pub fn complete(&mut self) -> Result<ServiceOutcome, ServiceError> {
        let result = self.machine.complete();
        self.settle(result)
    }

    pub fn tick(&mut self) -> Option<ServiceOutcome> {
        let transition = self.machine.tick()?;
        Some(self.outcome(transition))
    }

    /// Append pending sessions in order, stopping at the first failure.
    /// Returns how many were written.
    pub fn retry_pending(&mut self) -> Result<usize, StoreError> {
        self.flush()
    }

    fn settle(
        &mut self,
        result: Result<Transition, TimerError>,
    ) -> Result<ServiceOutcome, ServiceError> {
        match result {
            Ok(transition) => Ok(self.outcome(transition)),
            Err(e) => Err(self.reject(e)),
        }
    }

    /// Time-driven finalizations can happen even when the command itself is
    /// rejected; store them and hand their events back with the error.
    fn reject(&mut self, timer: TimerError) -> ServiceError {
        let events = self.machine.take_deferred_events();
        for event in &events {
            debug!(event = event.name(), "timer event before rejection");
        }
        ServiceError {
            timer,
            events,
            persist_error: self.flush().err(),
        }
    }

    fn outcome(&mut self, transition: Transition) -> ServiceOutcome {
        for event in &transition.events {
            debug!(event = event.name(), "timer event");
        }
        let persist_error = self.flush().err();
        ServiceOutcome {
            transition,
            persist_error,
        }
    }

    fn flush(&mut self) -> Result<usize, StoreError> {
        let finalized = self.machine.sessions();
        self.outbox.extend_from_slice(&finalized[self.seen..]);
        self.seen = finalized.len();

        let mut written = 0;
        let mut failure = None;
        for session in &self.outbox {
            match self.store.append_session(session) {
                Ok(()) => {}
                Err(StoreError::DuplicateSession(id)) => {
                    debug!(session_id = %id, "session already stored");
                }
                Err(e) => {
                    warn!(
                        session_id = %session.id,
                        pending = self.outbox.len() - written,
                        error = %e,
                        "failed to persist session"
                    );
                    failure = Some(e);
                    break;
                }
            }
            written += 1;
        }
        self.outbox.drain(..written);
        match failure {
            Some(e) => Err(e),
            None => Ok(written),
        }
    }
}
