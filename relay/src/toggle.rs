//! Handling of the external "toggle panel" trigger.
//!
//! A global shortcut fires in the background, outside any page. The background
//! finds the active tab and asks that tab's panel to flip visibility. A tab
//! whose panel has not been mounted yet gets one injected, followed by exactly
//! one more attempt.

use crate::channel::RelayClient;
use async_trait::async_trait;
use ontap_ipc::{RelayMessage, RelayResult};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Identifier of a browser tab
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TabId(pub u32);

impl fmt::Display for TabId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tab-{}", self.0)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TabError {
    #[error("no panel is listening in {0}")]
    NotPresent(TabId),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InjectError {
    #[error("{0} does not exist")]
    UnknownTab(TabId),
    #[error("injection failed: {0}")]
    Failed(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ToggleError {
    #[error("no active tab")]
    NoActiveTab,
    #[error(transparent)]
    Inject(#[from] InjectError),
    #[error("panel still absent in {0} after injection")]
    StillAbsent(TabId),
    #[error("panel rejected toggle: {0}")]
    Rejected(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleOutcome {
    /// The panel was already mounted and flipped.
    Toggled,
    /// The panel had to be injected first.
    ToggledAfterInject,
}

/// Browser-side view of tabs as seen from the background context.
#[async_trait]
pub trait TabHost: Send + Sync {
    async fn active_tab(&self) -> Option<TabId>;

    /// Delivers a message to the panel mounted in `tab`.
    async fn send_to_tab(&self, tab: TabId, message: RelayMessage)
        -> Result<RelayResult, TabError>;

    /// Mounts a panel into `tab`.
    async fn inject_panel(&self, tab: TabId) -> Result<(), InjectError>;
}

/// Mounts the page side of the relay into a tab.
#[async_trait]
pub trait PanelInjector: Send + Sync {
    async fn inject(&self, tab: TabId) -> Result<RelayClient, InjectError>;
}

/// Flips panel visibility in the active tab, injecting the panel at most once.
pub async fn handle_toggle<H>(host: &H) -> Result<ToggleOutcome, ToggleError>
where
    H: TabHost + ?Sized,
{
    let tab = host.active_tab().await.ok_or(ToggleError::NoActiveTab)?;

    match host.send_to_tab(tab, RelayMessage::TogglePalette).await {
        Ok(result) => return accepted(result).map(|_| ToggleOutcome::Toggled),
        Err(TabError::NotPresent(_)) => {
            info!(%tab, "Panel not mounted, injecting");
        }
    }

    host.inject_panel(tab).await?;

    match host.send_to_tab(tab, RelayMessage::TogglePalette).await {
        Ok(result) => accepted(result).map(|_| ToggleOutcome::ToggledAfterInject),
        Err(TabError::NotPresent(_)) => {
            warn!(%tab, "Panel still not listening after injection");
            Err(ToggleError::StillAbsent(tab))
        }
    }
}

fn accepted(result: RelayResult) -> Result<(), ToggleError> {
    match result {
        RelayResult::Success { .. } => Ok(()),
        RelayResult::Failure { error } => Err(ToggleError::Rejected(error)),
    }
}

/// In-process tab table backed by relay channels.
pub struct TabRegistry {
    tabs: RwLock<HashMap<TabId, Option<RelayClient>>>,
    active: RwLock<Option<TabId>>,
    injector: Arc<dyn PanelInjector>,
}

impl TabRegistry {
    pub fn new(injector: Arc<dyn PanelInjector>) -> Self {
        Self {
            tabs: RwLock::new(HashMap::new()),
            active: RwLock::new(None),
            injector,
        }
    }

    /// Registers a tab with no panel mounted.
    pub async fn open_tab(&self, tab: TabId) {
        self.tabs.write().await.entry(tab).or_insert(None);
        debug!(%tab, "Opened tab");
    }

    pub async fn close_tab(&self, tab: TabId) {
        self.tabs.write().await.remove(&tab);
        let mut active = self.active.write().await;
        if *active == Some(tab) {
            *active = None;
        }
    }

    pub async fn activate(&self, tab: TabId) {
        *self.active.write().await = Some(tab);
    }

    /// Records the relay port of a panel that mounted itself.
    pub async fn attach(&self, tab: TabId, port: RelayClient) {
        self.tabs.write().await.insert(tab, Some(port));
    }

    async fn port(&self, tab: TabId) -> Option<RelayClient> {
        self.tabs.read().await.get(&tab).cloned().flatten()
    }
}

#[async_trait]
impl TabHost for TabRegistry {
    async fn active_tab(&self) -> Option<TabId> {
        *self.active.read().await
    }

    async fn send_to_tab(
        &self,
        tab: TabId,
        message: RelayMessage,
    ) -> Result<RelayResult, TabError> {
        match self.port(tab).await {
            Some(port) if !port.is_closed() => Ok(port.send(message).await),
            _ => Err(TabError::NotPresent(tab)),
        }
    }

    async fn inject_panel(&self, tab: TabId) -> Result<(), InjectError> {
        if !self.tabs.read().await.contains_key(&tab) {
            return Err(InjectError::UnknownTab(tab));
        }
        let port = self.injector.inject(tab).await?;
        self.attach(tab, port).await;
        info!(%tab, "Injected panel");
        Ok(())
    }
}
