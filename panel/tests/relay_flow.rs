use async_trait::async_trait;
use ontap_core::{OntapConfig, Role};
use ontap_ipc::{RelayMessage, RelayResult};
use ontap_panel::{
    load_thread, ContentScriptInjector, InMemoryStorage, KeyChord, Panel, PanelError,
    PanelSettings, SessionContext, Storage, StorageRef, SubmitOutcome, Visibility,
};
use ontap_relay::{
    channel, handle_toggle, serve, spawn_background, BackgroundRelay, RelayClient, RelayHandler,
    TabId, TabRegistry, ToggleOutcome,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Relay handler that always answers with the same result
struct FixedReply(RelayResult);

#[async_trait]
impl RelayHandler for FixedReply {
    async fn handle(&self, _message: RelayMessage) -> RelayResult {
        self.0.clone()
    }
}

/// Relay handler that pops replies from the back of a list
struct Scripted(Mutex<Vec<RelayResult>>);

#[async_trait]
impl RelayHandler for Scripted {
    async fn handle(&self, _message: RelayMessage) -> RelayResult {
        self.0
            .lock()
            .await
            .pop()
            .unwrap_or_else(|| RelayResult::failure("script exhausted"))
    }
}

/// Relay handler that never answers
struct NeverReplies;

#[async_trait]
impl RelayHandler for NeverReplies {
    async fn handle(&self, _message: RelayMessage) -> RelayResult {
        std::future::pending().await
    }
}

fn relay_with<H: RelayHandler>(handler: H, timeout: Duration) -> RelayClient {
    let (client, receiver) = channel(timeout);
    tokio::spawn(serve(receiver, Arc::new(handler)));
    client
}

fn background_for(server: &MockServer) -> RelayClient {
    let config = OntapConfig {
        api_base: server.uri(),
        relay_timeout_secs: 5,
        ..OntapConfig::default()
    };
    let (client, _handle) = spawn_background(BackgroundRelay::from_config(&config), &config);
    client
}

async fn open_panel(storage: StorageRef, relay: RelayClient, session: &SessionContext) -> Panel {
    Panel::open(
        session.clone(),
        storage,
        relay,
        PanelSettings::default(),
        Visibility::new(true),
    )
    .await
}

fn command_reply(output: &str) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .set_body_string(json!({"ok": true, "output": output, "model": "x"}).to_string())
}

#[tokio::test]
async fn explain_submission_appends_user_then_assistant() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/commands"))
        .and(body_json(json!({"input": "what is TCP", "action": "explain"})))
        .respond_with(command_reply("TCP is ..."))
        .expect(1)
        .mount(&server)
        .await;

    let storage = Arc::new(InMemoryStorage::new());
    let session = SessionContext::new();
    let mut panel = open_panel(storage.clone(), background_for(&server), &session).await;

    panel.select_command(Some("/explain"));
    panel.set_query("/explain: what is TCP");
    let outcome = panel.submit().await;

    match outcome {
        SubmitOutcome::Answered(reply) => assert_eq!(reply.content, "TCP is ..."),
        other => panic!("unexpected outcome {:?}", other),
    }
    let messages = panel.thread().messages();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].role, Role::User);
    assert_eq!(messages[0].content, "what is TCP");
    assert_eq!(messages[1].role, Role::Assistant);
    assert_eq!(messages[1].content, "TCP is ...");
    assert_eq!(panel.query(), "");
    assert_eq!(panel.error(), None);
    assert!(!panel.is_loading());
}

#[tokio::test]
async fn relay_failure_keeps_only_user_message() {
    let storage = Arc::new(InMemoryStorage::new());
    let session = SessionContext::new();
    let relay = relay_with(
        FixedReply(RelayResult::failure("network_down")),
        Duration::from_secs(5),
    );
    let mut panel = open_panel(storage.clone(), relay, &session).await;

    panel.set_query("why is the sky blue");
    let outcome = panel.submit().await;

    assert_eq!(
        outcome,
        SubmitOutcome::Failed(PanelError::Relay("network_down".to_string()))
    );
    assert_eq!(panel.error(), Some("network_down"));
    assert_eq!(panel.thread().len(), 1);
    assert_eq!(panel.thread().messages()[0].role, Role::User);

    let persisted = load_thread(storage.as_ref(), &session).await.unwrap();
    assert_eq!(&persisted, panel.thread());
}

#[tokio::test]
async fn upstream_error_status_is_reported() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_string("internal_error"))
        .mount(&server)
        .await;

    let storage = Arc::new(InMemoryStorage::new());
    let mut panel = open_panel(storage, background_for(&server), &SessionContext::new()).await;

    panel.set_query("hello");
    panel.submit().await;
    assert_eq!(panel.error(), Some("Error: API 500"));
    assert_eq!(panel.thread().len(), 1);
}

#[tokio::test]
async fn two_submissions_persist_after_each_step() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_json(json!({"input": "first", "action": "answer"})))
        .respond_with(command_reply("one"))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(body_json(json!({"input": "second", "action": "rephrase"})))
        .respond_with(command_reply("two"))
        .mount(&server)
        .await;

    let storage = Arc::new(InMemoryStorage::new());
    let session = SessionContext::new();
    let mut panel = open_panel(storage.clone(), background_for(&server), &session).await;

    panel.set_query("first");
    panel.submit().await;
    assert_eq!(
        &load_thread(storage.as_ref(), &session).await.unwrap(),
        panel.thread()
    );

    panel.select_command(Some("/rewrite"));
    panel.set_query("/rewrite second");
    panel.submit().await;
    assert_eq!(
        &load_thread(storage.as_ref(), &session).await.unwrap(),
        panel.thread()
    );

    let contents: Vec<(Role, &str)> = panel
        .thread()
        .iter()
        .map(|m| (m.role, m.content.as_str()))
        .collect();
    assert_eq!(
        contents,
        vec![
            (Role::User, "first"),
            (Role::Assistant, "one"),
            (Role::User, "second"),
            (Role::Assistant, "two"),
        ]
    );
}

#[tokio::test]
async fn reopened_panel_restores_thread() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(command_reply("ok"))
        .mount(&server)
        .await;

    let storage: StorageRef = Arc::new(InMemoryStorage::new());
    let session = SessionContext::resume_or_create(storage.as_ref())
        .await
        .unwrap();
    let mut panel = open_panel(storage.clone(), background_for(&server), &session).await;
    for i in 0..3 {
        panel.set_query(format!("question {}", i));
        panel.submit().await;
    }
    let before = panel.thread().clone();
    drop(panel);

    // Same storage, same cached session id: a reload of the page
    let resumed = SessionContext::resume_or_create(storage.as_ref())
        .await
        .unwrap();
    assert_eq!(resumed, session);
    let reopened = open_panel(storage, background_for(&server), &resumed).await;
    assert_eq!(reopened.thread(), &before);
    assert_eq!(reopened.thread().len(), 6);
}

#[tokio::test]
async fn unreadable_thread_falls_back_to_empty() {
    let storage = Arc::new(InMemoryStorage::new());
    let session = SessionContext::new();
    storage
        .set(&session.thread_key(), "[{\"broken\":".to_string())
        .await
        .unwrap();

    let relay = relay_with(
        FixedReply(RelayResult::failure("unused")),
        Duration::from_secs(1),
    );
    let panel = open_panel(storage, relay, &session).await;
    assert!(panel.thread().is_empty());
}

#[tokio::test]
async fn blank_query_is_skipped() {
    let storage = Arc::new(InMemoryStorage::new());
    let relay = relay_with(
        FixedReply(RelayResult::failure("unused")),
        Duration::from_secs(1),
    );
    let mut panel = open_panel(storage, relay, &SessionContext::new()).await;

    panel.set_query("   ");
    assert_eq!(panel.submit().await, SubmitOutcome::Skipped);
    assert!(panel.thread().is_empty());
}

#[tokio::test(start_paused = true)]
async fn unanswered_relay_call_surfaces_timeout() {
    let storage = Arc::new(InMemoryStorage::new());
    let relay = relay_with(NeverReplies, Duration::from_secs(30));
    let mut panel = open_panel(storage, relay, &SessionContext::new()).await;

    panel.set_query("anyone there?");
    let outcome = panel.submit().await;

    assert_eq!(
        outcome,
        SubmitOutcome::Failed(PanelError::Relay("relay_timeout".to_string()))
    );
    assert_eq!(panel.error(), Some("relay_timeout"));
    assert!(!panel.is_loading());
}

#[tokio::test]
async fn error_line_clears_on_next_submission() {
    let relay = relay_with(
        Scripted(Mutex::new(vec![
            RelayResult::success(200, json!({"ok": true, "output": "fine", "model": "x"}).to_string()),
            RelayResult::failure("network_down"),
        ])),
        Duration::from_secs(1),
    );
    let mut panel = open_panel(
        Arc::new(InMemoryStorage::new()),
        relay,
        &SessionContext::new(),
    )
    .await;

    panel.set_query("first try");
    panel.submit().await;
    assert_eq!(panel.error(), Some("network_down"));

    panel.set_query("second try");
    panel.submit().await;
    assert_eq!(panel.error(), None);
    assert_eq!(panel.thread().len(), 3);
}

#[tokio::test]
async fn keyboard_toggles_and_closes() {
    let relay = relay_with(
        FixedReply(RelayResult::failure("unused")),
        Duration::from_secs(1),
    );
    let panel = open_panel(
        Arc::new(InMemoryStorage::new()),
        relay,
        &SessionContext::new(),
    )
    .await;

    assert!(panel.is_open());
    assert!(panel.handle_key(&KeyChord::parse("ctrl+k").unwrap()));
    assert!(!panel.is_open());
    assert!(panel.handle_key(&KeyChord::parse("cmd+k").unwrap()));
    assert!(panel.is_open());
    assert!(panel.handle_key(&KeyChord::new("Escape")));
    assert!(!panel.is_open());
    assert!(!panel.handle_key(&KeyChord::new("a")));
}

#[tokio::test]
async fn global_toggle_injects_then_flips_panel() {
    let relay = relay_with(
        FixedReply(RelayResult::failure("unused")),
        Duration::from_secs(1),
    );
    let visibility = Visibility::new(true);
    let panel = Panel::open(
        SessionContext::new(),
        Arc::new(InMemoryStorage::new()),
        relay,
        PanelSettings::default(),
        visibility.clone(),
    )
    .await;

    let injector = Arc::new(ContentScriptInjector::new(Duration::from_secs(1)));
    injector.adopt(TabId(1), visibility).await;
    let tabs = TabRegistry::new(injector.clone());
    tabs.open_tab(TabId(1)).await;
    tabs.open_tab(TabId(2)).await;
    tabs.activate(TabId(1)).await;

    assert_eq!(
        handle_toggle(&tabs).await,
        Ok(ToggleOutcome::ToggledAfterInject)
    );
    assert!(!panel.is_open());

    assert_eq!(handle_toggle(&tabs).await, Ok(ToggleOutcome::Toggled));
    assert!(panel.is_open());

    // A tab that never had a panel gets a fresh one, opened by the toggle
    tabs.activate(TabId(2)).await;
    assert_eq!(
        handle_toggle(&tabs).await,
        Ok(ToggleOutcome::ToggledAfterInject)
    );
    assert!(injector.visibility(TabId(2)).await.unwrap().is_open());
    assert!(panel.is_open());
}
