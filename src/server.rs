//! HTTP trigger endpoint
//!
//! `POST /pipeline` with `{"action": "run" | "status"}` (body optional,
//! defaults to run) plus a health probe. Internal failures never escape as
//! a bare 5xx: every error becomes a structured `{success, error}` body.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::pipeline::Pipeline;

#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<Pipeline>,
}

struct ServerError(crate::error::PipelineError);

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "success": false, "error": self.0.to_string() })),
        )
            .into_response()
    }
}

impl From<crate::error::PipelineError> for ServerError {
    fn from(e: crate::error::PipelineError) -> Self {
        Self(e)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
enum Action {
    #[default]
    Run,
    Status,
}

#[derive(Debug, Default, Deserialize)]
struct TriggerRequest {
    #[serde(default)]
    action: Action,
}

async fn trigger(
    State(state): State<AppState>,
    body: Option<Json<TriggerRequest>>,
) -> Result<Response, ServerError> {
    let request = body.map(|Json(r)| r).unwrap_or_default();
    match request.action {
        Action::Run => {
            let report = state.pipeline.run_batch().await?;
            Ok(Json(report).into_response())
        }
        Action::Status => {
            let status = state.pipeline.status().await?;
            Ok(Json(status).into_response())
        }
    }
}

async fn health() -> &'static str {
    "ok"
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/pipeline", post(trigger))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn run_server(state: AppState, port: u16) -> anyhow::Result<()> {
    let addr = format!("0.0.0.0:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(%addr, "trigger endpoint listening");
    axum::serve(listener, router(state)).await?;
    Ok(())
}
