mod clock;
mod machine;
mod rating;
mod settings;
mod state;

pub use clock::{Clock, ManualClock, SystemClock};
pub use machine::{TimerMachine, Transition};
pub use rating::RatingRequest;
pub use settings::{minutes_to_ms, SessionType, TimerSettings};
pub use state::{ActiveInterval, TimerState, TimerStatus};
