use ontap_core::{CommandRequest, CommandResponse, COMMANDS_PATH};
use ontap_ipc::{FetchRequest, RelayMessage, RelayResult};
use ontap_relay::RelayClient;
use thiserror::Error;
use tracing::{debug, warn};

/// Failure of a submission, as shown on the panel's status line
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PanelError {
    /// Transport failure reported by the relay
    #[error("{0}")]
    Relay(String),
    /// The API answered with a non-2xx status
    #[error("Error: API {status}")]
    Upstream { status: u16, body: String },
    /// The API answered 2xx with a body that is not a command response
    #[error("Error: invalid response: {0}")]
    InvalidResponse(String),
    #[error("Error: {0}")]
    Internal(String),
}

/// Sends a command through the relay to `POST /api/commands`.
pub async fn run_command(
    relay: &RelayClient,
    request: &CommandRequest,
) -> Result<CommandResponse, PanelError> {
    let body = serde_json::to_value(request).map_err(|e| PanelError::Internal(e.to_string()))?;
    let fetch = FetchRequest::post(COMMANDS_PATH, body)
        .with_header("Content-Type", "application/json");

    debug!(action = %request.action, input_len = request.input.len(), "Running command");
    match relay.send(RelayMessage::Fetch(fetch)).await {
        RelayResult::Failure { error } => {
            warn!(%error, "Relay failed");
            Err(PanelError::Relay(error))
        }
        RelayResult::Success { status, body } if !(200..300).contains(&status) => {
            warn!(status, "API returned an error status");
            Err(PanelError::Upstream { status, body })
        }
        RelayResult::Success { body, .. } => {
            let response: CommandResponse = serde_json::from_str(&body)
                .map_err(|e| PanelError::InvalidResponse(e.to_string()))?;
            if !response.ok {
                return Err(PanelError::InvalidResponse(
                    "API reported ok=false".to_string(),
                ));
            }
            Ok(response)
        }
    }
}
