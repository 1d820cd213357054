//! Persistence tests: the SQLite store on disk and the service outbox.

use chrono::Utc;
use deeprest_core::storage::SessionStore;
use deeprest_core::{
    Database, FocusService, ManualClock, MemoryStore, Project, Rating, Session, SessionDraft,
    SessionType, StoreError, Tag, TimerMachine, TimerSettings, TimerStatus,
};

// ============================================================================
// Test Helpers
// ============================================================================

/// Store that can be switched into a failing mode.
#[derive(Default)]
struct FlakyStore {
    inner: MemoryStore,
    failing: bool,
}

impl SessionStore for FlakyStore {
    fn append_session(&mut self, session: &Session) -> Result<(), StoreError> {
        if self.failing {
            return Err(StoreError::Unavailable("disk full".into()));
        }
        self.inner.append_session(session)
    }

    fn get_session(&self, id: &str) -> Result<Option<Session>, StoreError> {
        self.inner.get_session(id)
    }

    fn list_sessions(&self, limit: Option<usize>) -> Result<Vec<Session>, StoreError> {
        self.inner.list_sessions(limit)
    }

    fn upsert_project(&mut self, project: &Project) -> Result<(), StoreError> {
        self.inner.upsert_project(project)
    }

    fn get_project(&self, id: &str) -> Result<Option<Project>, StoreError> {
        self.inner.get_project(id)
    }

    fn list_projects(&self) -> Result<Vec<Project>, StoreError> {
        self.inner.list_projects()
    }

    fn delete_project(&mut self, id: &str) -> Result<bool, StoreError> {
        self.inner.delete_project(id)
    }

    fn upsert_tag(&mut self, tag: &Tag) -> Result<(), StoreError> {
        self.inner.upsert_tag(tag)
    }

    fn list_tags(&self) -> Result<Vec<Tag>, StoreError> {
        self.inner.list_tags()
    }
}

fn service<S: SessionStore>(store: S) -> (FocusService<S, ManualClock>, ManualClock) {
    let clock = ManualClock::new(Utc::now());
    let machine = TimerMachine::with_clock(TimerSettings::default(), clock.clone());
    (FocusService::new(machine, store), clock)
}

// ============================================================================
// Service outbox
// ============================================================================

#[test]
fn failed_write_keeps_transition_and_session() {
    let (mut svc, clock) = service(FlakyStore::default());
    svc.store_mut().failing = true;

    svc.start_focus(SessionDraft::new("Read paper")).unwrap();
    clock.advance_mins(25);
    let outcome = svc
        .end_focus_to_break(Some(Rating::new(3).unwrap()))
        .unwrap();

    assert!(matches!(
        outcome.persist_error,
        Some(StoreError::Unavailable(_))
    ));
    assert_eq!(outcome.transition.to, TimerStatus::Running);
    assert_eq!(svc.machine().session_type(), Some(SessionType::Break));
    assert_eq!(svc.pending_writes(), 1);
    assert!(svc.view().pending_writes == 1);
    assert!(svc.store().inner.is_empty());

    // Still failing: nothing written, nothing lost.
    assert!(svc.retry_pending().is_err());
    assert_eq!(svc.pending_writes(), 1);

    svc.store_mut().failing = false;
    assert_eq!(svc.retry_pending().unwrap(), 1);
    assert_eq!(svc.pending_writes(), 0);
    let stored = svc.store().list_sessions(None).unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].task_description, "Read paper");
}

#[test]
fn outbox_drains_in_order_after_recovery() {
    let (mut svc, clock) = service(FlakyStore::default());
    svc.store_mut().failing = true;

    svc.start_focus(SessionDraft::new("first")).unwrap();
    clock.advance_mins(3);
    svc.cancel_early().unwrap();
    svc.start_focus(SessionDraft::new("second")).unwrap();
    clock.advance_mins(3);
    svc.cancel_early().unwrap();
    assert_eq!(svc.pending_writes(), 2);

    svc.store_mut().failing = false;
    svc.start_break().unwrap();
    assert_eq!(svc.pending_writes(), 0);

    let names: Vec<_> = svc
        .store()
        .list_sessions(None)
        .unwrap()
        .into_iter()
        .map(|s| s.task_description)
        .collect();
    assert_eq!(names, vec!["first", "second"]);
}

#[test]
fn pending_sessions_carry_over_to_a_new_service() {
    let (mut svc, clock) = service(FlakyStore::default());
    svc.store_mut().failing = true;
    svc.start_focus(SessionDraft::new("Carry over")).unwrap();
    clock.advance_mins(25);
    svc.end_focus_to_break(Some(Rating::new(4).unwrap()))
        .unwrap();
    let pending = svc.pending_sessions().to_vec();
    assert_eq!(pending.len(), 1);

    // A later run restores the timer state but not the machine's history.
    let state = svc.machine().state().clone();
    let machine = TimerMachine::restore(state, TimerSettings::default(), clock.clone());
    let mut next = FocusService::with_pending(machine, FlakyStore::default(), pending);
    assert_eq!(next.pending_writes(), 1);

    clock.advance_mins(5);
    assert!(next.complete().unwrap().is_persisted());
    assert_eq!(next.pending_writes(), 0);
    let stored = next.store().list_sessions(None).unwrap();
    assert_eq!(stored.len(), 2);
    assert_eq!(stored[0].task_description, "Carry over");
    assert_eq!(stored[0].rating.map(|r| r.value()), Some(4));
    assert_eq!(stored[1].session_type, SessionType::Break);
}

#[test]
fn rejected_command_reports_failed_write() {
    let (mut svc, clock) = service(FlakyStore::default());
    svc.start_focus(SessionDraft::default()).unwrap();
    svc.request_rating().unwrap();
    svc.store_mut().failing = true;
    clock.advance_mins(10);

    // The expired prompt finalizes the focus session, then start is refused.
    let err = svc.start_focus(SessionDraft::default()).unwrap_err();
    assert!(matches!(
        err.persist_error,
        Some(StoreError::Unavailable(_))
    ));
    assert!(err.to_string().contains("session could not be saved"));
    assert_eq!(svc.pending_writes(), 1);
    assert!(svc.store().inner.is_empty());
}

// ============================================================================
// SQLite store
// ============================================================================

#[test]
fn sessions_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sessions.db");

    {
        let (mut svc, clock) = service(Database::open(&path).unwrap());
        svc.start_focus(SessionDraft::new("Write").with_tag("t-1"))
            .unwrap();
        clock.advance_mins(25);
        let outcome = svc
            .end_focus_to_break(Some(Rating::new(5).unwrap()))
            .unwrap();
        assert!(outcome.is_persisted());
        clock.advance_mins(5);
        assert!(svc.complete().unwrap().is_persisted());
    }

    let db = Database::open(&path).unwrap();
    let sessions = db.list_sessions(None).unwrap();
    assert_eq!(sessions.len(), 2);
    assert_eq!(sessions[0].session_type, SessionType::Focus);
    assert_eq!(sessions[0].rating.map(|r| r.value()), Some(5));
    assert!(sessions[0].tags.contains("t-1"));
    assert_eq!(sessions[1].session_type, SessionType::Break);

    let stats = db.stats_all().unwrap();
    assert_eq!(stats.completed_focus_sessions, 1);
    assert_eq!(stats.total_break_min, 5);
    assert_eq!(stats.average_rating, Some(5.0));
}

#[test]
fn invalid_session_is_rejected_and_prior_rows_stay() {
    let dir = tempfile::tempdir().unwrap();
    let mut db = Database::open(dir.path().join("sessions.db")).unwrap();

    let (mut machine_svc, clock) = service(MemoryStore::new());
    machine_svc.start_focus(SessionDraft::default()).unwrap();
    clock.advance_mins(1);
    machine_svc.cancel_early().unwrap();
    let good = machine_svc.machine().sessions()[0].clone();
    db.append_session(&good).unwrap();

    let mut bad = good.clone();
    bad.id = "other".into();
    bad.rating = Some(Rating::new(4).unwrap());
    assert!(matches!(
        db.append_session(&bad),
        Err(StoreError::InvalidRecord(_))
    ));

    assert!(matches!(
        db.append_session(&good),
        Err(StoreError::DuplicateSession(_))
    ));
    assert_eq!(db.list_sessions(None).unwrap(), vec![good]);
}
