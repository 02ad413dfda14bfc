//! Upstream command service: turns `/api/commands` requests into
//! chat-completion calls.

pub mod config;
pub mod http_server;
pub mod llm_client;
pub mod prompts;

pub use config::BackendConfig;
pub use http_server::{router, run_server, AppState};
pub use llm_client::{ChatMessage, CompletionError, Completer, OpenAiClient};
