use ontap_core::{strip_command, Action, CommandRequest, Message, OntapConfig, Thread};
use ontap_relay::RelayClient;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::api::{run_command, PanelError};
use crate::session::SessionContext;
use crate::storage::StorageRef;
use crate::thread::{load_thread, save_thread};

/// Shared open/closed flag of a panel.
///
/// The page listener flips it on `TOGGLE_PALETTE` while the controller may be
/// waiting on a submission, so it lives outside the controller.
#[derive(Debug, Clone, Default)]
pub struct Visibility(Arc<AtomicBool>);

impl Visibility {
    pub fn new(open: bool) -> Self {
        Self(Arc::new(AtomicBool::new(open)))
    }

    pub fn is_open(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub fn set(&self, open: bool) {
        self.0.store(open, Ordering::SeqCst);
    }

    /// Flips the flag and returns the new state
    pub fn toggle(&self) -> bool {
        !self.0.fetch_xor(true, Ordering::SeqCst)
    }
}

/// A key press as delivered by the page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyChord {
    pub key: String,
    pub ctrl: bool,
    pub meta: bool,
}

impl KeyChord {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            ctrl: false,
            meta: false,
        }
    }

    /// Parses chords such as `ctrl+k`, `cmd+K` or `escape`.
    pub fn parse(raw: &str) -> Option<Self> {
        let mut chord = Self::new("");
        for part in raw.split('+').map(str::trim) {
            match part.to_lowercase().as_str() {
                "ctrl" | "control" => chord.ctrl = true,
                "meta" | "cmd" | "command" => chord.meta = true,
                "" => return None,
                _ if chord.key.is_empty() => chord.key = part.to_string(),
                _ => return None,
            }
        }
        (!chord.key.is_empty()).then_some(chord)
    }

    fn is_toggle(&self) -> bool {
        (self.ctrl || self.meta) && self.key.eq_ignore_ascii_case("k")
    }

    fn is_escape(&self) -> bool {
        self.key.eq_ignore_ascii_case("escape") || self.key.eq_ignore_ascii_case("esc")
    }
}

/// Page-level values forwarded with every command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PanelSettings {
    pub page_url: Option<String>,
    pub tone: Option<String>,
}

impl PanelSettings {
    pub fn from_config(config: &OntapConfig, page_url: Option<String>) -> Self {
        Self {
            page_url: page_url.filter(|_| config.include_page_url),
            tone: config.tone.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Empty query, or a submission already in flight
    Skipped,
    /// The assistant message that was appended
    Answered(Message),
    /// Nothing was appended besides the user message
    Failed(PanelError),
}

/// Clears the loading flag when the submission ends, even if its future is dropped
struct InFlight(Arc<AtomicBool>);

impl InFlight {
    fn start(flag: &Arc<AtomicBool>) -> Self {
        flag.store(true, Ordering::SeqCst);
        Self(Arc::clone(flag))
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Headless command palette: UI state plus the operations the view invokes.
#[derive(Debug)]
pub struct Panel {
    session: SessionContext,
    storage: StorageRef,
    relay: RelayClient,
    settings: PanelSettings,
    visibility: Visibility,
    query: String,
    active_command: Option<String>,
    thread: Thread,
    loading: Arc<AtomicBool>,
    error: Option<String>,
}

impl Panel {
    /// Builds the panel for `session`, restoring its thread from `storage`.
    ///
    /// An unreadable stored thread is logged and replaced by an empty one.
    pub async fn open(
        session: SessionContext,
        storage: StorageRef,
        relay: RelayClient,
        settings: PanelSettings,
        visibility: Visibility,
    ) -> Self {
        let thread = match load_thread(storage.as_ref(), &session).await {
            Ok(thread) => thread,
            Err(e) => {
                warn!(session = %session, error = %e, "Discarding unreadable thread");
                Thread::new()
            }
        };
        info!(session = %session, messages = thread.len(), "Panel ready");

        Self {
            session,
            storage,
            relay,
            settings,
            visibility,
            query: String::new(),
            active_command: None,
            thread,
            loading: Arc::new(AtomicBool::new(false)),
            error: None,
        }
    }

    pub fn session(&self) -> &SessionContext {
        &self.session
    }

    pub fn thread(&self) -> &Thread {
        &self.thread
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn active_command(&self) -> Option<&str> {
        self.active_command.as_deref()
    }

    /// Current status line, if the last submission failed
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn is_loading(&self) -> bool {
        self.loading.load(Ordering::SeqCst)
    }

    pub fn visibility(&self) -> Visibility {
        self.visibility.clone()
    }

    pub fn is_open(&self) -> bool {
        self.visibility.is_open()
    }

    pub fn set_query(&mut self, query: impl Into<String>) {
        self.query = query.into();
    }

    pub fn select_command(&mut self, tag: Option<&str>) {
        self.active_command = tag.map(str::to_string);
    }

    pub fn toggle(&self) -> bool {
        self.visibility.toggle()
    }

    pub fn close(&self) {
        self.visibility.set(false);
    }

    /// Ctrl/Cmd+K toggles, Escape closes. Returns whether the key was consumed.
    pub fn handle_key(&self, chord: &KeyChord) -> bool {
        if chord.is_toggle() {
            self.toggle();
            true
        } else if chord.is_escape() {
            self.close();
            true
        } else {
            false
        }
    }

    /// Submits the current query.
    ///
    /// The user message is appended and persisted before the request goes out;
    /// the assistant message only on success. Failures land on the status line.
    pub async fn submit(&mut self) -> SubmitOutcome {
        if self.query.trim().is_empty() || self.is_loading() {
            return SubmitOutcome::Skipped;
        }

        let cleaned = strip_command(&self.query);
        self.append(Message::user(cleaned.clone())).await;
        self.query.clear();
        self.error = None;

        let _in_flight = InFlight::start(&self.loading);
        let request = CommandRequest {
            input: cleaned,
            action: Action::from_tag(self.active_command.as_deref()),
            url: self.settings.page_url.clone(),
            tone: self.settings.tone.clone(),
        };
        debug!(session = %self.session, action = %request.action, "Submitting");

        match run_command(&self.relay, &request).await {
            Ok(response) => {
                let reply = Message::assistant(response.output);
                self.append(reply.clone()).await;
                SubmitOutcome::Answered(reply)
            }
            Err(e) => {
                self.error = Some(e.to_string());
                SubmitOutcome::Failed(e)
            }
        }
    }

    async fn append(&mut self, message: Message) {
        self.thread.push(message);
        if let Err(e) = save_thread(self.storage.as_ref(), &self.session, &self.thread).await {
            warn!(session = %self.session, error = %e, "Failed to persist thread");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_visibility_toggle() {
        let visibility = Visibility::new(false);
        assert!(visibility.toggle());
        assert!(visibility.is_open());
        assert!(!visibility.toggle());
        assert!(!visibility.is_open());

        let shared = visibility.clone();
        shared.set(true);
        assert!(visibility.is_open());
    }

    #[test]
    fn test_key_chord_parse() {
        assert_eq!(
            KeyChord::parse("ctrl+k"),
            Some(KeyChord {
                key: "k".to_string(),
                ctrl: true,
                meta: false
            })
        );
        assert_eq!(
            KeyChord::parse("Cmd + K"),
            Some(KeyChord {
                key: "K".to_string(),
                ctrl: false,
                meta: true
            })
        );
        assert_eq!(KeyChord::parse("escape"), Some(KeyChord::new("escape")));
        assert_eq!(KeyChord::parse("ctrl+"), None);
        assert_eq!(KeyChord::parse("ctrl"), None);
        assert_eq!(KeyChord::parse("a+b"), None);
    }

    #[test]
    fn test_key_chord_meaning() {
        assert!(KeyChord::parse("ctrl+k").unwrap().is_toggle());
        assert!(KeyChord::parse("meta+K").unwrap().is_toggle());
        assert!(!KeyChord::new("k").is_toggle());
        assert!(KeyChord::new("Escape").is_escape());
    }

    #[test]
    fn test_settings_respect_page_url_flag() {
        let mut config = OntapConfig::default();
        config.tone = Some("formal".to_string());
        let url = Some("https://example.com".to_string());

        let settings = PanelSettings::from_config(&config, url.clone());
        assert_eq!(settings.page_url, url);
        assert_eq!(settings.tone.as_deref(), Some("formal"));

        config.include_page_url = false;
        assert_eq!(PanelSettings::from_config(&config, url).page_url, None);
    }

    #[test]
    fn test_in_flight_guard_resets_flag() {
        let flag = Arc::new(AtomicBool::new(false));
        {
            let _guard = InFlight::start(&flag);
            assert!(flag.load(Ordering::SeqCst));
        }
        assert!(!flag.load(Ordering::SeqCst));
    }
}
