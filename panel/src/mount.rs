use async_trait::async_trait;
use ontap_ipc::{RelayMessage, RelayResult};
use ontap_relay::channel::UNSUPPORTED_MESSAGE;
use ontap_relay::{channel, serve, InjectError, PanelInjector, RelayClient, RelayHandler, TabId};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::panel::Visibility;

/// Answers relay messages addressed to a page
#[derive(Debug, Clone)]
pub struct PanelListener {
    visibility: Visibility,
}

impl PanelListener {
    pub fn new(visibility: Visibility) -> Self {
        Self { visibility }
    }
}

#[async_trait]
impl RelayHandler for PanelListener {
    async fn handle(&self, message: RelayMessage) -> RelayResult {
        match message {
            RelayMessage::Ping => RelayResult::success(200, json!({"pong": true}).to_string()),
            RelayMessage::TogglePalette => {
                let open = self.visibility.toggle();
                debug!(open, "Toggled panel");
                RelayResult::success(200, json!({"open": open}).to_string())
            }
            RelayMessage::Fetch(_) => RelayResult::failure(UNSUPPORTED_MESSAGE),
        }
    }
}

/// Starts a page listener and returns the port the background uses to reach it.
pub fn mount_listener(visibility: Visibility, timeout: Duration) -> (RelayClient, JoinHandle<()>) {
    let (client, receiver) = channel(timeout);
    let handle = tokio::spawn(serve(receiver, Arc::new(PanelListener::new(visibility))));
    (client, handle)
}

/// Mounts page listeners into tabs on behalf of the background.
///
/// A tab whose panel already exists can be adopted up front so the injected
/// listener drives that panel's visibility. Otherwise a fresh, closed panel
/// is created so the toggle that triggered the injection opens it.
#[derive(Debug)]
pub struct ContentScriptInjector {
    timeout: Duration,
    mounted: Mutex<HashMap<TabId, Visibility>>,
}

impl ContentScriptInjector {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            mounted: Mutex::new(HashMap::new()),
        }
    }

    /// Uses `visibility` for the listener injected into `tab`
    pub async fn adopt(&self, tab: TabId, visibility: Visibility) {
        self.mounted.lock().await.insert(tab, visibility);
    }

    pub async fn visibility(&self, tab: TabId) -> Option<Visibility> {
        self.mounted.lock().await.get(&tab).cloned()
    }
}

#[async_trait]
impl PanelInjector for ContentScriptInjector {
    async fn inject(&self, tab: TabId) -> Result<RelayClient, InjectError> {
        let visibility = self
            .mounted
            .lock()
            .await
            .entry(tab)
            .or_insert_with(|| Visibility::new(false))
            .clone();
        let (port, _handle) = mount_listener(visibility, self.timeout);
        info!(%tab, "Mounted page listener");
        Ok(port)
    }
}
