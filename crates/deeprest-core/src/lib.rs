//! # DeepRest Core Library
//!
//! Core logic for the DeepRest focus timer: a focus interval followed by a
//! break, with every finished or abandoned interval recorded as a session.
//! All operations are available through the standalone CLI; a graphical
//! front end is a thin layer over the same library.
//!
//! ## Architecture
//!
//! - **Timer Machine**: A wall-clock-based state machine that requires the caller
//!   to periodically invoke `tick()` to commit overtime and expired rating prompts
//! - **Storage**: Append-only SQLite session log and TOML-based configuration
//! - **Service**: Couples the machine with a store and reports failed writes
//!   alongside the transition that produced them
//!
//! ## Key Components
//!
//! - [`TimerMachine`]: Core timer state machine
//! - [`Database`]: Session, project and tag persistence
//! - [`Config`]: Application configuration management
//! - [`FocusService`]: Timer plus persistence

pub mod connectivity;
pub mod error;
pub mod events;
pub mod models;
pub mod service;
pub mod storage;
pub mod timer;

pub use connectivity::{should_show_offline_banner, AlwaysOnline, Connectivity, ConnectivityFlag};
pub use error::{ConfigError, CoreError, ServiceError, StoreError, TimerError, ValidationError};
pub use events::Event;
pub use models::{Project, Rating, Session, SessionDraft, Tag};
pub use service::{FocusService, ScreenState, ServiceOutcome};
pub use storage::{Config, Database, MemoryStore, SessionStore, Stats};
pub use timer::{
    Clock, ManualClock, RatingRequest, SessionType, SystemClock, TimerMachine, TimerSettings,
    TimerState, TimerStatus, Transition,
};
