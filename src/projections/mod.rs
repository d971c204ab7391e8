//! Read models fed by user lifecycle events

pub mod session_activity;

pub use session_activity::{SessionActivity, SessionSummary};
