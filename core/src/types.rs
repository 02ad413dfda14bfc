use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Who authored a message in the thread
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// A single entry in the panel thread. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub role: Role,
    pub content: String,
    /// Unix milliseconds
    #[serde(rename = "ts", alias = "timestamp")]
    pub timestamp: i64,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().simple().to_string(),
            role,
            content: content.into(),
            timestamp: Utc::now().timestamp_millis(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// Ordered sequence of messages belonging to one session.
///
/// Insertion order is display order. The persisted form is a plain JSON array.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Thread {
    messages: Vec<Message>,
}

impl Thread {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Message> {
        self.messages.iter()
    }
}

impl From<Vec<Message>> for Thread {
    fn from(messages: Vec<Message>) -> Self {
        Self { messages }
    }
}

/// Semantic operation requested of the completion API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Explain,
    Rephrase,
    #[default]
    Answer,
}

impl Action {
    /// Maps the active command tag to an action.
    ///
    /// Unknown or missing tags fall back to [`Action::Answer`].
    pub fn from_tag(tag: Option<&str>) -> Self {
        let Some(tag) = tag else {
            return Action::Answer;
        };
        let tag = tag.to_lowercase();
        if tag.starts_with("/explain") {
            Action::Explain
        } else if tag.starts_with("/rewrite") || tag.starts_with("/rephrase") {
            Action::Rephrase
        } else {
            Action::Answer
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Explain => "explain",
            Action::Rephrase => "rephrase",
            Action::Answer => "answer",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Body of `POST /api/commands`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandRequest {
    pub input: String,
    pub action: Action,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tone: Option<String>,
}

/// Successful reply of `POST /api/commands`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandResponse {
    pub ok: bool,
    pub output: String,
    pub model: String,
}

/// Path of the command endpoint relative to the API base
pub const COMMANDS_PATH: &str = "/api/commands";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_from_tag() {
        assert_eq!(Action::from_tag(Some("/explain")), Action::Explain);
        assert_eq!(Action::from_tag(Some("/EXPLAIN")), Action::Explain);
        assert_eq!(Action::from_tag(Some("/rewrite")), Action::Rephrase);
        assert_eq!(Action::from_tag(Some("/rephrase")), Action::Rephrase);
        assert_eq!(Action::from_tag(Some("/answer")), Action::Answer);
        assert_eq!(Action::from_tag(None), Action::Answer);
        assert_eq!(Action::from_tag(Some("/summarize")), Action::Answer);
        assert_eq!(Action::from_tag(Some("")), Action::Answer);
    }

    #[test]
    fn test_message_wire_format() {
        let msg = Message {
            id: "abc".to_string(),
            role: Role::Assistant,
            content: "hi".to_string(),
            timestamp: 42,
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"id": "abc", "role": "assistant", "content": "hi", "ts": 42})
        );

        // Older payloads spelled the timestamp out
        let parsed: Message = serde_json::from_str(
            r#"{"id":"x","role":"user","content":"q","timestamp":7}"#,
        )
        .unwrap();
        assert_eq!(parsed.timestamp, 7);
        assert_eq!(parsed.role, Role::User);
    }

    #[test]
    fn test_thread_serializes_as_array() {
        let mut thread = Thread::new();
        thread.push(Message::user("one"));
        thread.push(Message::assistant("two"));

        let json = serde_json::to_string(&thread).unwrap();
        assert!(json.starts_with('['));

        let back: Thread = serde_json::from_str(&json).unwrap();
        assert_eq!(back, thread);
    }

    #[test]
    fn test_command_request_omits_empty_fields() {
        let request = CommandRequest {
            input: "what is TCP".to_string(),
            action: Action::Explain,
            url: None,
            tone: None,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"input": "what is TCP", "action": "explain"})
        );
    }
}
