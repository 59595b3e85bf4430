//! `POST /admin/keys`: worker key issuance.

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{error, info, warn};
use vox_auth::{constant_time_eq, generate_api_key};
use vox_core::GroupName;

use crate::server::AppState;

/// Request body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueKeyRequest {
    /// Group the key is for.
    pub group: String,
    /// Must match the configured admin secret.
    pub admin_secret: String,
}

/// Response body on success.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueKeyResponse {
    /// The new key. Shown once; only its hash is stored.
    pub api_key: String,
    /// Group the key is bound to.
    pub group: GroupName,
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}

/// Mint and store a key for the requested group.
///
/// `404` when no admin secret is configured, `401` on a wrong secret, `400`
/// on an unknown group, `500` when the credential store fails.
pub async fn issue_key(
    State(state): State<AppState>,
    Json(body): Json<IssueKeyRequest>,
) -> Response {
    let Some(secret) = state.config.admin_secret.as_deref() else {
        return error_response(StatusCode::NOT_FOUND, "key issuance is disabled");
    };
    if !constant_time_eq(&body.admin_secret, secret) {
        warn!("admin key request with wrong secret");
        return error_response(StatusCode::UNAUTHORIZED, "unauthorized");
    }
    let group: GroupName = match body.group.parse() {
        Ok(group) => group,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, &e.to_string()),
    };

    let api_key = generate_api_key();
    if let Err(e) = state.broker.credentials().issue(&api_key, group).await {
        error!(error = %e, %group, "failed to store issued key");
        return error_response(StatusCode::INTERNAL_SERVER_ERROR, "credential store unavailable");
    }
    info!(%group, "worker key issued via admin endpoint");
    (
        StatusCode::CREATED,
        Json(IssueKeyResponse { api_key, group }),
    )
        .into_response()
}
