use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::auth::Identity;
use crate::errors::AppError;
use crate::speech::SpeechRequest;
use crate::store::{generate_secret, is_valid_identifier};
use crate::AppState;

// ── Request / Response DTOs ──────────────────────────────────

#[derive(Deserialize)]
pub struct AddTokenRequest {
    pub id: Option<String>,
    pub rate_limit: Option<u32>,
}

#[derive(Deserialize)]
pub struct EditTokenRequest {
    pub id: Option<String>,
    pub rate_limit: Option<u32>,
}

#[derive(Deserialize)]
pub struct RevokeTokenRequest {
    pub token: Option<String>,
}

#[derive(Deserialize)]
pub struct RegenerateTokenRequest {
    pub id: Option<String>,
}

/// Carries the raw secret; shown to the caller exactly once.
#[derive(Serialize)]
pub struct TokenIssued {
    pub token: String,
}

#[derive(Serialize)]
pub struct TokenView {
    pub id: String,
    pub hashed_secret: String,
    pub rate_limit: u32,
    pub created_at: DateTime<Utc>,
}

// ── Handlers ─────────────────────────────────────────────────

/// POST /add-token — issue a credential for a new identifier.
pub async fn add_token(
    State(state): State<Arc<AppState>>,
    Json(body): Json<serde_json::Value>,
) -> Result<impl IntoResponse, AppError> {
    let payload: AddTokenRequest = parse_body(body)?;
    let id = require_id(payload.id)?;
    let rate_limit = resolve_rate_limit(payload.rate_limit, &state)?;

    let raw_secret = generate_secret();
    state.store.create(&id, &raw_secret, rate_limit).await?;

    tracing::info!("token created for ID: {}", id);
    Ok((StatusCode::CREATED, Json(TokenIssued { token: raw_secret })))
}

/// POST /edit-token — change a record's rate limit. An omitted rate_limit
/// resets the record to the configured default.
pub async fn edit_token(
    State(state): State<Arc<AppState>>,
    Json(body): Json<serde_json::Value>,
) -> Result<Json<serde_json::Value>, AppError> {
    let payload: EditTokenRequest = parse_body(body)?;
    let id = require_id(payload.id)?;
    let rate_limit = resolve_rate_limit(payload.rate_limit, &state)?;

    let record = state.store.update_rate_limit(&id, rate_limit).await?;

    tracing::info!("rate limit for ID {} set to {}", record.id, record.rate_limit);
    Ok(Json(json!({
        "message": format!("Rate limit for '{}' set to {}", record.id, record.rate_limit)
    })))
}

/// POST /regenerate-token — rotate a record's secret, invalidating the old
/// one. Identifier, rate limit and creation time are preserved.
pub async fn regenerate_token(
    State(state): State<Arc<AppState>>,
    Json(body): Json<serde_json::Value>,
) -> Result<Json<TokenIssued>, AppError> {
    let payload: RegenerateTokenRequest = parse_body(body)?;
    let Some(id) = payload.id.filter(|id| !id.is_empty()) else {
        tracing::info!("Regenerate token request with missing ID");
        return Err(AppError::InvalidInput("Token ID is required".into()));
    };

    let raw_secret = state.store.rotate_secret(&id).await?;

    tracing::info!("Token regenerated successfully for ID: {}", id);
    Ok(Json(TokenIssued { token: raw_secret }))
}

/// POST /revoke-token — delete a record matched by identifier or raw
/// secret. The value is not logged: it may be a live secret.
pub async fn revoke_token(
    State(state): State<Arc<AppState>>,
    Json(body): Json<serde_json::Value>,
) -> Result<Json<serde_json::Value>, AppError> {
    let payload: RevokeTokenRequest = parse_body(body)?;
    let Some(value) = payload.token.filter(|t| !t.is_empty()) else {
        tracing::info!("Revoke token request with missing token field");
        return Err(AppError::InvalidInput("Token is required".into()));
    };

    state.store.delete_by_identifier_or_raw_secret(&value).await?;

    tracing::info!("Token revoked successfully");
    Ok(Json(json!({"message": "Token revoked successfully"})))
}

/// GET /list-tokens — every record, hashes only, never raw secrets.
pub async fn list_tokens(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<TokenView>>, AppError> {
    let records = state.store.list().await?;
    Ok(Json(
        records
            .into_iter()
            .map(|r| TokenView {
                id: r.id,
                hashed_secret: r.secret_hash,
                rate_limit: r.rate_limit,
                created_at: r.created_at,
            })
            .collect(),
    ))
}

/// POST /generate-speech — fan the request out and stream back one MP3.
pub async fn generate_speech(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    Json(body): Json<serde_json::Value>,
) -> Result<impl IntoResponse, AppError> {
    let request = SpeechRequest::parse(&body)?;

    let caller = match &identity {
        Identity::Admin => "admin",
        Identity::Token(record) => record.id.as_str(),
    };
    tracing::debug!(caller, "generating speech");

    let audio = state.engine.synthesize(request).await?;
    Ok(([(header::CONTENT_TYPE, "audio/mpeg")], audio))
}

/// GET /healthz
pub async fn healthz(
    State(state): State<Arc<AppState>>,
) -> Result<Json<serde_json::Value>, AppError> {
    state.store.ping().await?;
    Ok(Json(json!({"status": "healthy"})))
}

// ── Shared validation ────────────────────────────────────────

fn parse_body<T: serde::de::DeserializeOwned>(body: serde_json::Value) -> Result<T, AppError> {
    serde_json::from_value(body).map_err(|_| AppError::InvalidInput("malformed request body".into()))
}

fn require_id(id: Option<String>) -> Result<String, AppError> {
    let Some(id) = id.filter(|id| !id.is_empty()) else {
        return Err(AppError::InvalidInput("ID is required".into()));
    };
    if !is_valid_identifier(&id) {
        return Err(AppError::InvalidInput("Invalid ID format".into()));
    }
    Ok(id)
}

fn resolve_rate_limit(requested: Option<u32>, state: &AppState) -> Result<u32, AppError> {
    match requested {
        Some(0) => Err(AppError::InvalidInput(
            "rate_limit must be a positive integer".into(),
        )),
        Some(n) => Ok(n),
        None => Ok(state.config.default_rate_limit),
    }
}
