//! HTTP API server.
//!
//! Exposes each project's world and arc chats to a web UI: read the
//! transcript and pending state, send turns, request artifacts, delete
//! summaries or artifacts, reset and export.

// Allow clippy lint triggered by utoipa's OpenApi derive macro
#![allow(clippy::needless_for_each)]

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode, header},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
};
use chat_core::{ChatError, Message, Surface};
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::config::Config;
use crate::core::registry::Session;
use crate::core::{Error, ExportFormat, ExportedChat, FileStore, SessionRegistry, SharedSession};

/// Shared application state.
#[derive(Debug)]
pub struct AppState {
    /// Live chat sessions.
    pub registry: SessionRegistry,

    /// API token for authentication (if configured).
    pub token: Option<String>,
}

type SharedState = Arc<AppState>;

/// `OpenAPI` documentation.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Loresmith API",
        description = "World and story-arc chat sessions with bounded context windows",
        version = "0.1.0",
        license(name = "MIT")
    ),
    paths(
        health,
        get_chat,
        send_message,
        generate_artifact,
        delete_message,
        reset_chat,
        export_chat
    ),
    components(schemas(
        ChatView,
        MessageView,
        SendMessageRequest,
        ArtifactRequest,
        ErrorResponse
    ))
)]
struct ApiDoc;

/// A message as shown to the UI.
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MessageView {
    pub id: String,
    /// `user`, `assistant` or `system`.
    pub role: String,
    pub content: String,
    /// RFC 3339 timestamp.
    pub timestamp: String,
    pub is_summary: bool,
    pub is_artifact: bool,
}

impl From<&Message> for MessageView {
    fn from(message: &Message) -> Self {
        Self {
            id: message.id().to_string(),
            role: message.role().as_str().to_string(),
            content: message.content().to_string(),
            timestamp: message.timestamp().to_rfc3339(),
            is_summary: message.is_summary(),
            is_artifact: message.is_artifact(),
        }
    }
}

/// What a chat UI renders.
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChatView {
    pub project_id: String,
    /// `world` or `arc`.
    pub surface: String,
    pub display_history: Vec<MessageView>,
    /// `idle`, `sending` or `summarizing`.
    pub pending_state: String,
    /// Entries currently sent to the model.
    pub context_length: usize,
    /// Rolling summary at the head of the context, if the window has been
    /// compressed. Deletable by id.
    pub context_summary: Option<MessageView>,
}

impl ChatView {
    fn of(session: &Session) -> Self {
        let context_summary = session
            .context_history()
            .first()
            .filter(|m| m.is_summary())
            .map(MessageView::from);
        let view = session.view();
        Self {
            project_id: view.project_id,
            surface: view.surface.to_string(),
            display_history: view.display_history.iter().map(MessageView::from).collect(),
            pending_state: view.pending_state.as_str().to_string(),
            context_length: view.context_length,
            context_summary,
        }
    }
}

/// Request body for sending a message.
#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct SendMessageRequest {
    /// The user's message.
    pub text: String,
}

/// Request body for artifact generation.
#[derive(Debug, Default, Deserialize, utoipa::ToSchema)]
pub struct ArtifactRequest {
    /// Custom instruction; the surface's digest prompt if omitted.
    #[serde(default)]
    pub instruction: Option<String>,
}

/// Query for transcript export.
#[derive(Debug, Deserialize)]
pub struct ExportQuery {
    /// `markdown` (default) or `json`.
    pub format: Option<String>,
}

/// Error body.
#[derive(Debug, Serialize, Deserialize, utoipa::ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

/// Handler error.
#[derive(Debug)]
pub enum ApiError {
    Chat(ChatError),
    Core(Error),
}

impl From<ChatError> for ApiError {
    fn from(e: ChatError) -> Self {
        Self::Chat(e)
    }
}

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        match e {
            Error::Chat(e) => Self::Chat(e),
            e => Self::Core(e),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error) = match &self {
            Self::Chat(ChatError::EmptyMessage | ChatError::EmptyConversation) => {
                (StatusCode::BAD_REQUEST, "bad_request")
            }
            Self::Chat(ChatError::Busy) => (StatusCode::CONFLICT, "busy"),
            Self::Chat(ChatError::NotFound(_)) => (StatusCode::NOT_FOUND, "not_found"),
            Self::Chat(ChatError::NotDeletable(_)) => (StatusCode::FORBIDDEN, "not_deletable"),
            Self::Core(Error::InvalidArgument(_)) => (StatusCode::BAD_REQUEST, "bad_request"),
            Self::Core(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
        };

        let message = match self {
            Self::Chat(e) => e.to_string(),
            Self::Core(e) => {
                if status.is_server_error() {
                    tracing::error!(error = %e, "request failed");
                }
                e.to_string()
            }
        };

        (
            status,
            Json(ErrorResponse {
                error: error.to_string(),
                message,
            }),
        )
            .into_response()
    }
}

/// Authentication middleware.
///
/// Validates the `Authorization: Bearer <token>` header if a token is configured.
async fn auth_middleware(
    State(state): State<SharedState>,
    headers: HeaderMap,
    request: axum::extract::Request,
    next: Next,
) -> Response {
    // If no token configured, allow all requests (localhost-only mode)
    let Some(expected_token) = state.token.as_deref() else {
        return next.run(request).await;
    };

    let auth_header = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));

    match auth_header {
        Some(token) if token == expected_token => next.run(request).await,
        _ => (
            StatusCode::UNAUTHORIZED,
            Json(ErrorResponse {
                error: "unauthorized".to_string(),
                message: "Missing or invalid Authorization header. Use: Bearer <token>"
                    .to_string(),
            }),
        )
            .into_response(),
    }
}

/// Build the application router.
pub fn router(state: SharedState) -> Router {
    let chat = "/api/projects/{project}/chat/{surface}";

    // Protected routes (require auth if token configured)
    let protected_routes = Router::new()
        .route(chat, get(get_chat))
        .route(&format!("{chat}/messages"), post(send_message))
        .route(&format!("{chat}/messages/{{id}}"), delete(delete_message))
        .route(&format!("{chat}/artifact"), post(generate_artifact))
        .route(&format!("{chat}/reset"), post(reset_chat))
        .route(&format!("{chat}/export"), get(export_chat))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    // Public routes (no auth required)
    let public_routes = Router::new()
        .route("/health", get(health))
        .merge(SwaggerUi::new("/api/docs").url("/api/openapi.json", ApiDoc::openapi()));

    Router::new()
        .merge(protected_routes)
        .merge(public_routes)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Start the HTTP API server.
///
/// # Errors
///
/// Returns an error if the provider or storage cannot be set up, or the
/// server fails to bind or start.
pub async fn serve(config: &Config, host: &str, port: u16) -> anyhow::Result<()> {
    let client = config.provider.create_client()?;
    let store = FileStore::from_config(config)?;
    tracing::info!(root = %store.root().display(), provider = client.name(), "opened history store");

    let state = Arc::new(AppState {
        registry: SessionRegistry::new(client, Arc::new(store), config.chat.session_settings()),
        token: config.api.token(),
    });
    let auth_enabled = state.token.is_some();

    let app = router(state);

    let addr = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    if auth_enabled {
        tracing::info!(addr = %addr, "starting HTTP API server (auth enabled)");
    } else {
        tracing::warn!(addr = %addr, "starting HTTP API server (NO AUTH - localhost only recommended)");
    }

    axum::serve(listener, app).await?;

    Ok(())
}

fn open(state: &AppState, project: &str, surface: &str) -> Result<SharedSession, ApiError> {
    let surface: Surface = surface.parse().map_err(Error::InvalidArgument)?;
    Ok(state.registry.session(project, surface)?)
}

/// Health check endpoint.
#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "Service healthy", body = String))
)]
async fn health() -> &'static str {
    "ok"
}

/// Get a chat's transcript and state.
#[utoipa::path(
    get,
    path = "/api/projects/{project}/chat/{surface}",
    params(
        ("project" = String, Path, description = "Project ID"),
        ("surface" = String, Path, description = "`world` or `arc`")
    ),
    responses(
        (status = 200, description = "Current chat", body = ChatView),
        (status = 400, description = "Invalid project or surface", body = ErrorResponse)
    )
)]
async fn get_chat(
    State(state): State<SharedState>,
    Path((project, surface)): Path<(String, String)>,
) -> Result<Json<ChatView>, ApiError> {
    let session = open(&state, &project, &surface)?;
    Ok(Json(ChatView::of(&session)))
}

/// Send a message and wait for the reply.
///
/// A failed model call is not an HTTP error: the transcript gains a system
/// message describing it.
#[utoipa::path(
    post,
    path = "/api/projects/{project}/chat/{surface}/messages",
    params(
        ("project" = String, Path, description = "Project ID"),
        ("surface" = String, Path, description = "`world` or `arc`")
    ),
    request_body = SendMessageRequest,
    responses(
        (status = 200, description = "Turn completed", body = ChatView),
        (status = 400, description = "Empty message", body = ErrorResponse),
        (status = 409, description = "A message is already being sent", body = ErrorResponse)
    )
)]
async fn send_message(
    State(state): State<SharedState>,
    Path((project, surface)): Path<(String, String)>,
    Json(req): Json<SendMessageRequest>,
) -> Result<Json<ChatView>, ApiError> {
    let session = open(&state, &project, &surface)?;
    session.send_message(&req.text).await?;
    Ok(Json(ChatView::of(&session)))
}

/// Generate a structured artifact from the conversation.
#[utoipa::path(
    post,
    path = "/api/projects/{project}/chat/{surface}/artifact",
    params(
        ("project" = String, Path, description = "Project ID"),
        ("surface" = String, Path, description = "`world` or `arc`")
    ),
    request_body = ArtifactRequest,
    responses(
        (status = 200, description = "Artifact generated", body = ChatView),
        (status = 400, description = "Nothing to summarize", body = ErrorResponse),
        (status = 409, description = "A message is already being sent", body = ErrorResponse)
    )
)]
async fn generate_artifact(
    State(state): State<SharedState>,
    Path((project, surface)): Path<(String, String)>,
    Json(req): Json<ArtifactRequest>,
) -> Result<Json<ChatView>, ApiError> {
    let session = open(&state, &project, &surface)?;
    session.generate_artifact(req.instruction.as_deref()).await?;
    Ok(Json(ChatView::of(&session)))
}

/// Delete a summary or artifact.
#[utoipa::path(
    delete,
    path = "/api/projects/{project}/chat/{surface}/messages/{id}",
    params(
        ("project" = String, Path, description = "Project ID"),
        ("surface" = String, Path, description = "`world` or `arc`"),
        ("id" = String, Path, description = "Message ID")
    ),
    responses(
        (status = 200, description = "Message deleted", body = ChatView),
        (status = 403, description = "Conversation turns cannot be deleted", body = ErrorResponse),
        (status = 404, description = "No such message", body = ErrorResponse),
        (status = 409, description = "A message is being sent", body = ErrorResponse)
    )
)]
async fn delete_message(
    State(state): State<SharedState>,
    Path((project, surface, id)): Path<(String, String, String)>,
) -> Result<Json<ChatView>, ApiError> {
    let session = open(&state, &project, &surface)?;
    session.delete_message(&id)?;
    Ok(Json(ChatView::of(&session)))
}

/// Clear a chat.
#[utoipa::path(
    post,
    path = "/api/projects/{project}/chat/{surface}/reset",
    params(
        ("project" = String, Path, description = "Project ID"),
        ("surface" = String, Path, description = "`world` or `arc`")
    ),
    responses((status = 200, description = "Chat cleared", body = ChatView))
)]
async fn reset_chat(
    State(state): State<SharedState>,
    Path((project, surface)): Path<(String, String)>,
) -> Result<Json<ChatView>, ApiError> {
    let session = open(&state, &project, &surface)?;
    session.reset();
    Ok(Json(ChatView::of(&session)))
}

/// Export a chat's transcript.
#[utoipa::path(
    get,
    path = "/api/projects/{project}/chat/{surface}/export",
    params(
        ("project" = String, Path, description = "Project ID"),
        ("surface" = String, Path, description = "`world` or `arc`"),
        ("format" = Option<String>, Query, description = "`markdown` (default) or `json`")
    ),
    responses(
        (status = 200, description = "Transcript", body = String),
        (status = 400, description = "Unknown format", body = ErrorResponse)
    )
)]
async fn export_chat(
    State(state): State<SharedState>,
    Path((project, surface)): Path<(String, String)>,
    Query(query): Query<ExportQuery>,
) -> Result<Response, ApiError> {
    let format = query
        .format
        .as_deref()
        .map(str::parse::<ExportFormat>)
        .transpose()?
        .unwrap_or_default();

    let session = open(&state, &project, &surface)?;
    let messages = session.display_history();
    let body = ExportedChat::new(session.project_id(), session.surface(), &messages)
        .render(format)
        .map_err(|e| Error::Io(e.into()))?;

    Ok(([(header::CONTENT_TYPE, format.content_type())], body).into_response())
}
