use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{header::AUTHORIZATION, StatusCode},
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
    Router,
};

use crate::auth::{self, Identity};
use crate::errors::AppError;
use crate::AppState;

pub mod handlers;

/// Per-address budgets for the unauthenticated management routes,
/// requests per minute.
const ADD_TOKEN_LIMIT: u32 = 2;
const EDIT_TOKEN_LIMIT: u32 = 2;
const REGENERATE_TOKEN_LIMIT: u32 = 2;
const REVOKE_TOKEN_LIMIT: u32 = 10;

/// Build the application router. Auth-then-ratelimit is composed as an
/// explicit per-route middleware chain: `require_credential` resolves an
/// `Identity` extension, `per_token_limit` consumes it, and the
/// unauthenticated management routes are scoped by caller address.
pub fn router(state: Arc<AppState>) -> Router {
    let address_limited = {
        let state = state.clone();
        move |limit: u32| middleware::from_fn_with_state((state.clone(), limit), per_address_limit)
    };

    Router::new()
        .route(
            "/add-token",
            post(handlers::add_token).layer(address_limited(ADD_TOKEN_LIMIT)),
        )
        .route(
            "/edit-token",
            post(handlers::edit_token).layer(address_limited(EDIT_TOKEN_LIMIT)),
        )
        .route(
            "/regenerate-token",
            post(handlers::regenerate_token).layer(address_limited(REGENERATE_TOKEN_LIMIT)),
        )
        .route(
            "/revoke-token",
            post(handlers::revoke_token).layer(address_limited(REVOKE_TOKEN_LIMIT)),
        )
        .route(
            "/list-tokens",
            get(handlers::list_tokens)
                .layer(middleware::from_fn_with_state(state.clone(), require_credential)),
        )
        .route(
            "/generate-speech",
            // layers run outermost-last: credential check first, then the
            // per-token budget
            post(handlers::generate_speech)
                .layer(middleware::from_fn_with_state(state.clone(), per_token_limit))
                .layer(middleware::from_fn_with_state(state.clone(), require_credential)),
        )
        .route("/healthz", get(handlers::healthz))
        .fallback(fallback_404)
        .with_state(state)
}

async fn fallback_404() -> StatusCode {
    StatusCode::NOT_FOUND
}

/// Middleware: resolves the `Authorization` header into an `Identity`
/// extension, or terminates the request with 401.
async fn require_credential(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let raw = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    let identity = auth::authenticate(raw, &state.store, &state.config).await?;
    req.extensions_mut().insert(identity);
    Ok(next.run(req).await)
}

/// Middleware: enforces the authenticated record's own requests-per-minute
/// budget. Admin bypasses rate limiting entirely.
async fn per_token_limit(
    State(state): State<Arc<AppState>>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    match req.extensions().get::<Identity>() {
        Some(Identity::Admin) => Ok(next.run(req).await),
        Some(Identity::Token(record)) => {
            let key = format!("token:{}", record.id);
            if !state.limiter.allow(&key, record.rate_limit) {
                tracing::info!("rate limit exceeded for ID: {}", record.id);
                return Err(AppError::RateLimited);
            }
            Ok(next.run(req).await)
        }
        // require_credential must run first; a missing extension means the
        // chain was assembled wrong
        None => Err(AppError::Unauthorized),
    }
}

/// Middleware: scopes a fixed budget to the caller's network address for
/// routes that have no credential to key on.
async fn per_address_limit(
    State((state, limit)): State<(Arc<AppState>, u32)>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let address = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|info| info.0.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string());

    let key = format!("addr:{}:{}", address, req.uri().path());
    if !state.limiter.allow(&key, limit) {
        tracing::info!("address rate limit exceeded: {}", key);
        return Err(AppError::RateLimited);
    }
    Ok(next.run(req).await)
}
