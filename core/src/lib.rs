// Shared pieces used on both sides of the relay and by the command backend:
// - Domain types (messages, actions, command payloads)
// - Command interpretation
// - Configuration loading
// - Shared error types

pub mod command;
pub use command::{detect_tag, strip_command};

pub mod types;
pub use types::*;

pub mod config;
pub use config::*;

pub mod errors;
pub use errors::*;
