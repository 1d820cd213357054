use std::sync::Arc;

use clap::Subcommand;
use deeprest_core::{
    Config, ConnectivityFlag, CoreError, Database, Event, FocusService, Rating, RatingRequest,
    ScreenState, ServiceError, ServiceOutcome, Session, SessionDraft, SessionType, SystemClock,
    TimerMachine, TimerState,
};
use serde::Serialize;
use tracing::{info, warn};

use super::{open_database, print_json, CliResult};

const STATE_KEY: &str = "timer_state";

/// Finalized sessions that could not be appended yet, oldest first.
const PENDING_KEY: &str = "pending_sessions";

/// Set to any value to report the app as offline.
const OFFLINE_ENV: &str = "DEEPREST_OFFLINE";

#[derive(Subcommand)]
pub enum TimerAction {
    /// Start a focus interval (or a break with --break)
    Start {
        /// Start a break instead of a focus interval
        #[arg(long = "break")]
        rest: bool,
        /// Interval length; defaults to the configured duration
        #[arg(long)]
        minutes: Option<u64>,
        /// What you are working on
        #[arg(long)]
        task: Option<String>,
        /// Project ID
        #[arg(long)]
        project: Option<String>,
        /// Tag ID (repeatable)
        #[arg(long = "tag")]
        tags: Vec<String>,
        #[arg(long)]
        notes: Option<String>,
    },
    /// Pause the running interval
    Pause,
    /// Resume a paused interval
    Resume,
    /// Commit overtime and expired rating prompts
    Tick,
    /// Print current timer state as JSON
    Status,
    /// Open the end-of-focus rating prompt
    Rate,
    /// End focus and start the break
    EndFocus {
        /// Focus rating, 1-5
        #[arg(long)]
        rating: Option<u8>,
    },
    /// Abandon the current interval
    Cancel,
    /// Finish the break
    Complete,
}

#[derive(Serialize)]
struct TimerOutput {
    events: Vec<Event>,
    finalized: Vec<Session>,
    #[serde(skip_serializing_if = "Option::is_none")]
    rating_request: Option<RatingRequest>,
    #[serde(skip_serializing_if = "Option::is_none")]
    persist_error: Option<String>,
    view: ScreenState,
}

fn load_state(db: &Database) -> TimerState {
    match db.kv_get(STATE_KEY) {
        Ok(Some(json)) => serde_json::from_str(&json).unwrap_or_else(|e| {
            warn!(error = %e, "saved timer state is unreadable, starting idle");
            TimerState::Idle
        }),
        Ok(None) => TimerState::Idle,
        Err(e) => {
            warn!(error = %e, "failed to read saved timer state");
            TimerState::Idle
        }
    }
}

fn load_pending(db: &Database) -> Result<Vec<Session>, CoreError> {
    match db.kv_get(PENDING_KEY)? {
        Some(json) => Ok(serde_json::from_str(&json)?),
        None => Ok(Vec::new()),
    }
}

/// Save the timer state together with the sessions still waiting for the
/// store, so that a later run can write them.
fn save_progress(service: &FocusService<Database>) -> CliResult {
    let db = service.store();
    db.kv_set(STATE_KEY, &serde_json::to_string(service.machine().state())?)?;
    db.kv_set(PENDING_KEY, &serde_json::to_string(service.pending_sessions())?)?;
    Ok(())
}

pub fn run(action: TimerAction) -> CliResult {
    let config = Config::load_or_default();
    let db = open_database(&config)?;
    let machine = TimerMachine::restore(load_state(&db), config.timer.clone(), SystemClock);
    let pending = load_pending(&db)?;

    let connectivity = ConnectivityFlag::global();
    connectivity.set_online(std::env::var_os(OFFLINE_ENV).is_none());
    let mut service = FocusService::with_pending(machine, db, pending)
        .with_connectivity(Arc::new(connectivity.clone()));

    if service.pending_writes() > 0 {
        match service.retry_pending() {
            Ok(written) => info!(written, "stored sessions left over from an earlier run"),
            Err(e) => warn!(
                pending = service.pending_writes(),
                error = %e,
                "earlier sessions still cannot be stored"
            ),
        }
    }

    let mut rating_request = None;
    let result: Result<Option<ServiceOutcome>, ServiceError> = match action {
        TimerAction::Start {
            rest,
            minutes,
            task,
            project,
            tags,
            notes,
        } => {
            let kind = if rest {
                SessionType::Break
            } else {
                SessionType::Focus
            };
            let minutes = minutes.unwrap_or_else(|| config.timer.duration_for(kind));
            let mut draft = SessionDraft::new(task.unwrap_or_default());
            draft.project_id = project;
            draft.tags.extend(tags);
            draft.notes = notes;
            service.start(kind, minutes, draft).map(Some)
        }
        TimerAction::Pause => service.pause().map(Some),
        TimerAction::Resume => service.resume().map(Some),
        TimerAction::Tick => Ok(service.tick()),
        TimerAction::Status => Ok(None),
        TimerAction::Rate => service.request_rating().map(|(request, outcome)| {
            rating_request = Some(request);
            Some(outcome)
        }),
        TimerAction::EndFocus { rating } => {
            let rating = rating.map(Rating::new).transpose()?;
            let pending = service.machine().pending_rating().cloned();
            match pending {
                Some(request) => service.submit_rating(&request, rating),
                None => service.end_focus_to_break(rating),
            }
            .map(Some)
        }
        TimerAction::Cancel => service.cancel_early().map(Some),
        TimerAction::Complete => service.complete().map(Some),
    };

    // Time-driven changes apply even when the command is rejected.
    save_progress(&service)?;

    let outcome = match result {
        Ok(outcome) => outcome,
        Err(e) => {
            if !e.events.is_empty() {
                print_json(&TimerOutput {
                    events: e.events.clone(),
                    finalized: Vec::new(),
                    rating_request: None,
                    persist_error: e.persist_error.as_ref().map(ToString::to_string),
                    view: service.view(),
                })?;
            }
            return Err(e.into());
        }
    };

    let (events, finalized, persist_error) = match outcome {
        Some(outcome) => (
            outcome.transition.events,
            outcome.transition.finalized,
            outcome.persist_error,
        ),
        None => (Vec::new(), Vec::new(), None),
    };
    print_json(&TimerOutput {
        events,
        finalized,
        rating_request,
        persist_error: persist_error.as_ref().map(ToString::to_string),
        view: service.view(),
    })?;

    match persist_error {
        Some(e) => Err(CoreError::Custom(format!("session could not be saved: {e}"))),
        None => Ok(()),
    }
}
