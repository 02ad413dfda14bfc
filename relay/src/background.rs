use crate::channel::{self, serve, RelayClient, RelayHandler, UNSUPPORTED_MESSAGE};
use crate::fetch::FetchProxy;
use async_trait::async_trait;
use chrono::Utc;
use ontap_core::OntapConfig;
use ontap_ipc::{RelayMessage, RelayResult};
use serde_json::json;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Handler for messages arriving at the privileged background context
#[derive(Debug, Clone)]
pub struct BackgroundRelay {
    proxy: FetchProxy,
}

impl BackgroundRelay {
    pub fn new(proxy: FetchProxy) -> Self {
        Self { proxy }
    }

    pub fn from_config(config: &OntapConfig) -> Self {
        Self::new(FetchProxy::new(config.api_base()))
    }
}

#[async_trait]
impl RelayHandler for BackgroundRelay {
    async fn handle(&self, message: RelayMessage) -> RelayResult {
        match message {
            RelayMessage::Ping => {
                debug!("PING");
                let body = json!({"ok": true, "ts": Utc::now().timestamp_millis()});
                RelayResult::success(200, body.to_string())
            }
            RelayMessage::Fetch(request) => self.proxy.fetch(request).await,
            RelayMessage::TogglePalette => {
                warn!("TOGGLE_PALETTE is addressed to pages, not the background");
                RelayResult::failure(UNSUPPORTED_MESSAGE)
            }
        }
    }
}

/// Starts the background relay and returns the client pages use to reach it.
pub fn spawn_background(
    relay: BackgroundRelay,
    config: &OntapConfig,
) -> (RelayClient, JoinHandle<()>) {
    info!(api_base = %relay.proxy.api_base(), "Background relay booted");
    let (client, receiver) = channel::channel(config.relay_timeout());
    let handle = tokio::spawn(serve(receiver, Arc::new(relay)));
    (client, handle)
}
