//! speechgate — token-authenticated text-to-speech gateway.
//!
//! Module tree plus the shared application state, re-exported for
//! integration tests in `tests/`.

pub mod api;
pub mod auth;
pub mod cli;
pub mod companion;
pub mod config;
pub mod errors;
pub mod rate_limit;
pub mod speech;
pub mod store;

use rate_limit::RateLimiter;
use speech::SpeechEngine;
use store::TokenStore;

/// Shared application state passed to handlers and middleware.
pub struct AppState {
    pub store: TokenStore,
    pub limiter: RateLimiter,
    pub engine: SpeechEngine,
    pub config: config::Config,
}
