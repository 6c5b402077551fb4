//! HTTP routes and error mapping for the session hub.

use std::path::Path;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tracing::error;

use mb::{AuthOutcome, Error as HubError};
use mb_protocol::TenantId;

use crate::state::AppState;

/// Builds the application router; `pairing_dir` is served under `/pairing`.
pub fn router(state: AppState, pairing_dir: &Path) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/authenticate", post(authenticate))
        .route("/verify", post(verify))
        .route("/disconnect", post(disconnect))
        .route("/send-message", post(send_message))
        .nest_service("/pairing", ServeDir::new(pairing_dir))
        .layer(cors)
        .with_state(state)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TenantRequest {
    tenant_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SendMessageRequest {
    tenant_id: Option<String>,
    number: Option<String>,
    message: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AuthenticateResponse {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    qr_code: Option<String>,
}

struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }
}

impl From<HubError> for ApiError {
    fn from(err: HubError) -> Self {
        let status = match &err {
            HubError::SessionNotFound(_) | HubError::SessionClosed(_) => StatusCode::NOT_FOUND,
            HubError::NotReady { .. } => StatusCode::CONFLICT,
            HubError::InvalidTenantId(_) | HubError::InvalidAddress(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            error!(target = "mb.http", error = %err, "request failed");
        }
        Self {
            status,
            message: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

fn parse_tenant(raw: Option<String>) -> Result<TenantId, ApiError> {
    let raw = raw
        .filter(|value| !value.is_empty())
        .ok_or_else(|| ApiError::bad_request("tenantId is required"))?;
    TenantId::parse(&raw).map_err(|err| ApiError::bad_request(err.to_string()))
}

fn required(value: Option<String>, field: &str) -> Result<String, ApiError> {
    value
        .filter(|value| !value.is_empty())
        .ok_or_else(|| ApiError::bad_request(format!("{field} is required")))
}

fn auth_response(outcome: AuthOutcome) -> Json<AuthenticateResponse> {
    let qr_code = match outcome {
        AuthOutcome::Ready => None,
        AuthOutcome::Pairing(artifact) => Some(artifact.url),
    };
    Json(AuthenticateResponse {
        success: true,
        qr_code,
    })
}

async fn authenticate(
    State(state): State<AppState>,
    Json(request): Json<TenantRequest>,
) -> Result<Json<AuthenticateResponse>, ApiError> {
    let tenant = parse_tenant(request.tenant_id)?;
    let outcome = state.controller.authenticate(&tenant).await?;
    Ok(auth_response(outcome))
}

async fn verify(
    State(state): State<AppState>,
    Json(request): Json<TenantRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let tenant = parse_tenant(request.tenant_id)?;
    Ok(Json(
        json!({ "authenticated": state.controller.verify(&tenant) }),
    ))
}

async fn disconnect(
    State(state): State<AppState>,
    Json(request): Json<TenantRequest>,
) -> Result<Json<AuthenticateResponse>, ApiError> {
    let tenant = parse_tenant(request.tenant_id)?;
    let outcome = state.controller.disconnect(&tenant).await?;
    Ok(auth_response(outcome))
}

async fn send_message(
    State(state): State<AppState>,
    Json(request): Json<SendMessageRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let tenant = parse_tenant(request.tenant_id)?;
    let number = required(request.number, "number")?;
    let message = required(request.message, "message")?;
    state.dispatcher.send(&tenant, &number, &message).await?;
    Ok(Json(json!({ "success": true })))
}
