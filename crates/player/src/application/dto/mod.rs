//! Application-layer DTOs

pub mod player_intents;

pub use player_intents::{FormSubmission, SubmittedChoice};
