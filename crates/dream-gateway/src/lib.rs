//! HTTP gateway for Dream share links and survey matching.
//!
//! Serves survey selection for the chat widget plus share-link construction
//! and parsing, backed by an immutable survey catalog loaded at startup.
//! Shared transcripts are resolved against the chat backend on request.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use axum::extract::rejection::JsonRejection;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use dream_chat::{
    select_shared_messages, ChatBackend, ChatClientConfig, ChatTransportError, DreamChatClient,
    SharedMessage,
};
use dream_share::{
    parse_share_params, ShareLinkBuilder, ShareTokenError, ShareUrlError, SharedMessageRef,
    DEFAULT_SHARE_HOST,
};
use dream_survey::{
    load_survey_catalog, ClientContext, RandomSource, SurveyCatalog, SurveyConfig,
    SurveyLoadOptions,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::net::TcpListener;

const GATEWAY_SCHEMA_VERSION: u32 = 1;
const HEALTH_ENDPOINT: &str = "/health";
const SURVEY_ENDPOINT: &str = "/api/survey";
const SHARE_ENDPOINT: &str = "/api/share";
const SHARED_ENDPOINT: &str = "/api/shared";
const SHARED_MESSAGES_ENDPOINT: &str = "/api/shared/messages";

#[derive(Debug, Clone)]
/// Startup settings for [`run_gateway`].
pub struct GatewayConfig {
    pub bind: String,
    pub share_host: String,
    pub survey_dir: Option<PathBuf>,
    pub strict_surveys: bool,
    pub chat: ChatClientConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8790".to_string(),
            share_host: DEFAULT_SHARE_HOST.to_string(),
            survey_dir: None,
            strict_surveys: false,
            chat: ChatClientConfig::default(),
        }
    }
}

type SharedRandom = Arc<Mutex<Box<dyn RandomSource + Send>>>;

/// Request body for building a share link.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShareLinkRequest {
    pub dialog_id: String,
    pub messages: Vec<SharedMessageRef>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShareLinkResponse {
    pub url: String,
}

/// Shared utterances in link order; `null` marks omitted messages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SharedMessagesResponse {
    pub dialog_id: String,
    pub messages: Vec<Option<SharedMessage>>,
}

/// Shared request state: read-only catalog and link builder, plus the draw source.
#[derive(Clone)]
pub struct GatewayState {
    catalog: Arc<SurveyCatalog>,
    share_links: ShareLinkBuilder,
    random: SharedRandom,
    chat: Option<Arc<dyn ChatBackend>>,
}

impl GatewayState {
    pub fn new(
        catalog: SurveyCatalog,
        share_links: ShareLinkBuilder,
        random: Box<dyn RandomSource + Send>,
    ) -> Self {
        Self {
            catalog: Arc::new(catalog),
            share_links,
            random: Arc::new(Mutex::new(random)),
            chat: None,
        }
    }

    /// Enables transcript lookups for shared links.
    pub fn with_chat_backend(mut self, chat: Arc<dyn ChatBackend>) -> Self {
        self.chat = Some(chat);
        self
    }

    /// Loads the survey catalog and seeds the draw source from OS entropy.
    pub fn from_config(config: &GatewayConfig) -> Result<Self> {
        let catalog = match config.survey_dir.as_deref() {
            Some(dir) => load_survey_catalog(
                dir,
                SurveyLoadOptions {
                    strict: config.strict_surveys,
                },
            )
            .with_context(|| format!("failed to load surveys from '{}'", dir.display()))?,
            None => {
                tracing::warn!("no survey directory configured; survey matching always returns null");
                SurveyCatalog::default()
            }
        };
        let share_links = ShareLinkBuilder::new(&config.share_host)
            .with_context(|| format!("invalid --share-host '{}'", config.share_host))?;
        let chat = DreamChatClient::new(config.chat.clone()).with_context(|| {
            format!("invalid chat backend config '{}'", config.chat.api_base)
        })?;
        Ok(
            Self::new(catalog, share_links, Box::new(StdRng::from_entropy()))
                .with_chat_backend(Arc::new(chat)),
        )
    }

    pub fn catalog(&self) -> &SurveyCatalog {
        &self.catalog
    }

    fn select_survey(&self, context: &ClientContext) -> Option<SurveyConfig> {
        let mut random = match self.random.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        self.catalog.find(context, &mut **random).cloned()
    }
}

/// Run the gateway until ctrl-c.
pub async fn run_gateway(config: GatewayConfig) -> Result<()> {
    let bind_addr: SocketAddr = config
        .bind
        .parse()
        .with_context(|| format!("invalid --bind '{}': expected host:port", config.bind))?;
    let state = Arc::new(GatewayState::from_config(&config)?);

    let listener = TcpListener::bind(bind_addr)
        .await
        .with_context(|| format!("failed to bind gateway on {bind_addr}"))?;
    let local_addr = listener
        .local_addr()
        .context("failed to resolve gateway listen address")?;

    tracing::info!(
        addr = %local_addr,
        share_base_url = %state.share_links.base_url(),
        survey_count = state.catalog.len(),
        "gateway listening"
    );

    let app = build_gateway_router(state);
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
        .context("gateway server exited unexpectedly")?;
    Ok(())
}

pub fn build_gateway_router(state: Arc<GatewayState>) -> Router {
    Router::new()
        .route(HEALTH_ENDPOINT, get(handle_health))
        .route(SURVEY_ENDPOINT, post(handle_survey))
        .route(SHARE_ENDPOINT, post(handle_share))
        .route(SHARED_ENDPOINT, get(handle_shared))
        .route(SHARED_MESSAGES_ENDPOINT, get(handle_shared_messages))
        .with_state(state)
}

async fn handle_health(State(state): State<Arc<GatewayState>>) -> Response {
    (
        StatusCode::OK,
        Json(json!({
            "schema_version": GATEWAY_SCHEMA_VERSION,
            "status": "ready",
            "survey_count": state.catalog.len(),
            "share_base_url": state.share_links.base_url().as_str(),
        })),
    )
        .into_response()
}

async fn handle_survey(
    State(state): State<Arc<GatewayState>>,
    payload: Result<Json<ClientContext>, JsonRejection>,
) -> Response {
    match payload {
        Ok(Json(context)) => Json(state.select_survey(&context)).into_response(),
        Err(rejection) => rejection_response("survey_invalid_context", &rejection),
    }
}

async fn handle_share(
    State(state): State<Arc<GatewayState>>,
    payload: Result<Json<ShareLinkRequest>, JsonRejection>,
) -> Response {
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => return rejection_response("share_invalid_request", &rejection),
    };
    match state.share_links.build(&request.dialog_id, &request.messages) {
        Ok(url) => (StatusCode::OK, Json(ShareLinkResponse { url })).into_response(),
        Err(error) => share_error_response(&error),
    }
}

async fn handle_shared(Query(params): Query<Vec<(String, String)>>) -> Response {
    match parse_share_params(params) {
        Ok(dialog) => (StatusCode::OK, Json(dialog)).into_response(),
        Err(error) => share_error_response(&error),
    }
}

async fn handle_shared_messages(
    State(state): State<Arc<GatewayState>>,
    Query(params): Query<Vec<(String, String)>>,
) -> Response {
    let dialog = match parse_share_params(params) {
        Ok(dialog) => dialog,
        Err(error) => return share_error_response(&error),
    };
    let Some(chat) = state.chat.as_ref() else {
        return error_response(
            StatusCode::SERVICE_UNAVAILABLE,
            "chat_backend_unavailable",
            "no chat backend is configured".to_string(),
        );
    };
    let transcript = match chat.fetch_dialog(&dialog.dialog_id).await {
        Ok(transcript) => transcript,
        Err(ChatTransportError::HttpStatus { status: 404, .. }) => {
            return error_response(
                StatusCode::NOT_FOUND,
                "shared_dialog_not_found",
                format!("dialog '{}' does not exist", dialog.dialog_id),
            );
        }
        Err(error) => {
            tracing::warn!(dialog_id = %dialog.dialog_id, %error, "dialog lookup failed");
            return error_response(StatusCode::BAD_GATEWAY, "chat_backend_error", error.to_string());
        }
    };
    match select_shared_messages(&transcript, &dialog.message_idxs) {
        Ok(messages) => Json(SharedMessagesResponse {
            dialog_id: dialog.dialog_id,
            messages,
        })
        .into_response(),
        Err(error) => error_response(
            StatusCode::NOT_FOUND,
            "shared_message_not_found",
            error.to_string(),
        ),
    }
}

fn share_error_code(error: &ShareUrlError) -> &'static str {
    match error {
        ShareUrlError::MissingParameter(_) => "share_missing_parameter",
        ShareUrlError::Token(ShareTokenError::EmptySelection) => "share_empty_selection",
        ShareUrlError::Token(_) => "share_invalid_token",
        ShareUrlError::InvalidHost { .. } | ShareUrlError::InvalidUrl { .. } => {
            "share_invalid_url"
        }
    }
}

fn share_error_response(error: &ShareUrlError) -> Response {
    let code = share_error_code(error);
    tracing::warn!(code, %error, "rejected share request");
    error_response(StatusCode::BAD_REQUEST, code, error.to_string())
}

fn rejection_response(code: &'static str, rejection: &JsonRejection) -> Response {
    tracing::warn!(code, error = %rejection.body_text(), "rejected request body");
    error_response(rejection.status(), code, rejection.body_text())
}

fn error_response(status: StatusCode, code: &'static str, message: String) -> Response {
    (
        status,
        Json(json!({
            "error": {
                "code": code,
                "message": message,
            }
        })),
    )
        .into_response()
}
