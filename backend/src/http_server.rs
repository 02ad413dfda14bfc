use crate::config::BackendConfig;
use crate::llm_client::Completer;
use crate::prompts::build_messages;
use axum::{
    extract::State,
    http::{request::Parts, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use ontap_core::{CommandRequest, CommandResponse, COMMANDS_PATH};
use serde::Serialize;
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tracing::{error, info, warn};

/// Longest accepted command input, in characters
pub const MAX_INPUT_CHARS: usize = 10_000;

/// Application state shared with all routes
#[derive(Clone)]
pub struct AppState {
    config: Arc<BackendConfig>,
    /// None while no API key is configured
    completer: Option<Arc<dyn Completer>>,
}

impl AppState {
    pub fn new(config: BackendConfig, completer: Option<Arc<dyn Completer>>) -> Self {
        Self {
            config: Arc::new(config),
            completer,
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    detail: String,
}

/// Error type for HTTP server
#[derive(Debug)]
pub enum ApiError {
    Validation(String),
    NotConfigured,
    InternalError(anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, detail) = match self {
            Self::Validation(detail) => {
                warn!(%detail, "Rejected command");
                (StatusCode::UNPROCESSABLE_ENTITY, detail)
            }
            Self::NotConfigured => {
                error!("OPENAI_API_KEY not configured");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "OPENAI_API_KEY not configured".to_string(),
                )
            }
            Self::InternalError(e) => {
                error!(error = %e, "Internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    format!("internal_error: {}", e),
                )
            }
        };
        (status, Json(ErrorBody { detail })).into_response()
    }
}

/// Allowed origins split into exact matches and `scheme://*`-style prefixes
#[derive(Debug, Default, Clone, PartialEq, Eq)]
struct OriginRules {
    exact: Vec<String>,
    prefixes: Vec<String>,
}

impl OriginRules {
    fn from_entries(entries: Vec<String>) -> Self {
        let mut rules = Self::default();
        for entry in entries {
            match entry.strip_suffix('*') {
                Some(prefix) if !prefix.is_empty() => rules.prefixes.push(prefix.to_string()),
                _ => rules.exact.push(entry),
            }
        }
        rules
    }

    fn allows(&self, origin: &str) -> bool {
        self.exact.iter().any(|o| o == origin)
            || self.prefixes.iter().any(|p| origin.starts_with(p.as_str()))
    }
}

fn cors_layer(config: &BackendConfig) -> CorsLayer {
    let origins = config.origins();
    // Only a bare "*" opens the API to every origin
    let allow_origin = if origins.iter().any(|o| o == "*") {
        AllowOrigin::any()
    } else {
        let rules = OriginRules::from_entries(origins);
        AllowOrigin::predicate(move |origin: &HeaderValue, _: &Parts| match origin.to_str() {
            Ok(origin) => rules.allows(origin),
            Err(_) => false,
        })
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods(Any)
        .allow_headers(Any)
}

/// Builds the router with all routes and middleware
pub fn router(state: AppState) -> Router {
    let cors = cors_layer(&state.config);

    Router::new()
        .route("/health", get(health))
        .route(COMMANDS_PATH, post(handle_command))
        .layer(cors)
        .with_state(state)
}

/// Start the HTTP server
pub async fn run_server(state: AppState, addr: SocketAddr) -> anyhow::Result<()> {
    info!("Starting HTTP server on {}", addr);

    axum::Server::bind(&addr)
        .serve(router(state).into_make_service())
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown signal received");
        })
        .await
        .map_err(|e| anyhow::anyhow!("Failed to start HTTP server: {}", e))
}

/// Health check handler
async fn health() -> impl IntoResponse {
    Json(json!({"ok": true}))
}

fn validate(request: &CommandRequest) -> Result<(), ApiError> {
    let chars = request.input.chars().count();
    if chars == 0 {
        return Err(ApiError::Validation("input must not be empty".to_string()));
    }
    if chars > MAX_INPUT_CHARS {
        return Err(ApiError::Validation(format!(
            "input must be at most {} characters",
            MAX_INPUT_CHARS
        )));
    }
    if let Some(url) = &request.url {
        let parsed = reqwest::Url::parse(url)
            .map_err(|e| ApiError::Validation(format!("invalid url: {}", e)))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ApiError::Validation(
                "url must use http or https".to_string(),
            ));
        }
    }
    Ok(())
}

/// Handler for command requests
async fn handle_command(
    State(state): State<AppState>,
    Json(payload): Json<CommandRequest>,
) -> Result<Json<CommandResponse>, ApiError> {
    validate(&payload)?;
    let completer = state.completer.as_ref().ok_or(ApiError::NotConfigured)?;

    info!(action = %payload.action, input_len = payload.input.len(), "Handling command");
    let messages = build_messages(
        payload.action,
        &payload.input,
        payload.url.as_deref(),
        payload.tone.as_deref(),
    );

    let output = completer
        .complete(messages)
        .await
        .map_err(|e| ApiError::InternalError(e.into()))?;

    Ok(Json(CommandResponse {
        ok: true,
        output,
        model: completer.model().to_string(),
    }))
}
