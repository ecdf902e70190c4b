pub mod types;
pub mod lifecycle;
pub mod progress;
pub mod fare;
pub mod config;

pub use types::*;
pub use lifecycle::{
    attempt_transition, can_transition, is_terminal, successors, Notification,
    NotificationKind, TransitionError, TransitionOutcome,
};
pub use progress::{derive_view_model, ProgressStep};
pub use fare::{estimate_fare_cents, format_fare};
pub use config::Config;
