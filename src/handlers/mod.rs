//! Turn orchestration

pub mod interaction_machine;

pub use interaction_machine::{InteractionMachine, Turn};
