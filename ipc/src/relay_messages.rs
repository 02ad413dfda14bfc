use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// A message crossing the boundary between a page and the background context.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type")]
pub enum RelayMessage {
    /// Reachability check.
    #[serde(rename = "PING")]
    Ping,
    /// Background -> page: flip panel visibility.
    #[serde(rename = "TOGGLE_PALETTE")]
    TogglePalette,
    /// Page -> background: perform an HTTP request against the API base.
    #[serde(rename = "ONTAPAI_FETCH")]
    Fetch(FetchRequest),
}

impl RelayMessage {
    /// Wire name of the message kind, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            RelayMessage::Ping => "PING",
            RelayMessage::TogglePalette => "TOGGLE_PALETTE",
            RelayMessage::Fetch(_) => "ONTAPAI_FETCH",
        }
    }
}

fn default_method() -> String {
    "GET".to_string()
}

/// HTTP request to be performed by the privileged side.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct FetchRequest {
    /// Appended to the configured API base.
    pub path: String,
    #[serde(default = "default_method")]
    pub method: String,
    /// Merged over a JSON content-type default; these take precedence.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
}

impl FetchRequest {
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            method: default_method(),
            headers: BTreeMap::new(),
            body: None,
        }
    }

    pub fn post(path: impl Into<String>, body: Value) -> Self {
        Self {
            path: path.into(),
            method: "POST".to_string(),
            headers: BTreeMap::new(),
            body: Some(body),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }
}

/// Outcome of one relay call.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(into = "RelayReply", try_from = "RelayReply")]
pub enum RelayResult {
    /// The exchange completed. `body` is the raw, unparsed response text.
    Success { status: u16, body: String },
    /// Transport or relay failure, normalized to a readable reason.
    Failure { error: String },
}

impl RelayResult {
    pub fn success(status: u16, body: impl Into<String>) -> Self {
        RelayResult::Success {
            status,
            body: body.into(),
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        RelayResult::Failure {
            error: error.into(),
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, RelayResult::Success { .. })
    }
}

/// Wire shape of a reply: `{ok, status?, body?, error?}`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct RelayReply {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<RelayResult> for RelayReply {
    fn from(result: RelayResult) -> Self {
        match result {
            RelayResult::Success { status, body } => RelayReply {
                ok: true,
                status: Some(status),
                body: Some(body),
                error: None,
            },
            RelayResult::Failure { error } => RelayReply {
                ok: false,
                status: None,
                body: None,
                error: Some(error),
            },
        }
    }
}

impl TryFrom<RelayReply> for RelayResult {
    type Error = String;

    fn try_from(reply: RelayReply) -> Result<Self, Self::Error> {
        if reply.ok {
            let status = reply
                .status
                .ok_or_else(|| "malformed reply: ok without status".to_string())?;
            return Ok(RelayResult::Success {
                status,
                body: reply.body.unwrap_or_default(),
            });
        }

        let error = match (reply.error, reply.status) {
            (Some(error), _) => error,
            (None, Some(status)) => format!("API {}", status),
            (None, None) => "unknown_error".to_string(),
        };
        Ok(RelayResult::Failure { error })
    }
}
