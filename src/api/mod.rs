//! HTTP API for the research agent.
//!
//! ## Endpoints
//!
//! - `GET /` - Landing page with the query form
//! - `GET /api/health` - Health check
//! - `POST /api/investigate` - Answer a query (`{"query": "..."}`)

pub mod types;

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use tokio_util::sync::CancellationToken;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::agent::{Agent, ErrorClass, InvestigationOutcome};
use crate::config::Config;

use types::{HealthResponse, InvestigateRequest, InvestigateResponse};

const INDEX_HTML: &str = include_str!("../../templates/index.html");

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub agent: Arc<Agent>,
    /// Parent of every per-request cancellation token.
    pub shutdown: CancellationToken,
}

/// Build the router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/api/health", get(health))
        .route("/api/investigate", post(investigate))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the HTTP server and run until Ctrl-C.
pub async fn serve(config: Config) -> anyhow::Result<()> {
    let agent = Agent::from_config(&config)?;
    let shutdown = CancellationToken::new();
    let state = AppState {
        agent: Arc::new(agent),
        shutdown: shutdown.clone(),
    };

    let listener = tokio::net::TcpListener::bind(config.bind_addr()).await?;
    tracing::info!("Listening on {}", listener.local_addr()?);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for shutdown signal: {}", e);
            }
            tracing::info!("Shutting down, cancelling in-flight investigations");
            shutdown.cancel();
        })
        .await?;

    Ok(())
}

/// GET / - Landing page.
async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

/// GET /api/health - Service status.
async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        model: state.agent.model_name().to_string(),
    })
}

/// POST /api/investigate - Answer a query.
async fn investigate(
    State(state): State<AppState>,
    Json(req): Json<InvestigateRequest>,
) -> Response {
    let query = req.query.unwrap_or_default();
    tracing::info!("Received query ({} chars)", query.len());

    let cancel = state.shutdown.child_token();
    let outcome = state.agent.investigate_with_cancel(&query, &cancel).await;

    let status = match &outcome {
        InvestigationOutcome::Answer { .. } => StatusCode::OK,
        InvestigationOutcome::Error {
            class: ErrorClass::EmptyQuery,
            ..
        } => StatusCode::BAD_REQUEST,
        InvestigationOutcome::Error { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    };

    (status, Json(InvestigateResponse::from(outcome))).into_response()
}
