// This crate centralizes the relay envelope shared by the page side and the
// privileged background side.

pub mod relay_messages; // For page <-> background communication

pub use relay_messages::{FetchRequest, RelayMessage, RelayReply, RelayResult};
