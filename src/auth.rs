use subtle::ConstantTimeEq;

use crate::config::Config;
use crate::errors::AppError;
use crate::store::{hash_secret, TokenRecord, TokenStore};

/// Resolved caller identity. `Admin` bypasses rate limiting and token
/// lookup entirely; `Token` carries the record whose `rate_limit` the
/// limiter enforces.
#[derive(Debug, Clone)]
pub enum Identity {
    Admin,
    Token(TokenRecord),
}

/// Validate a raw credential from the `Authorization` header.
///
/// Order matters: the admin secret is compared first (constant-time, plain
/// value — the admin secret is configuration, not a stored record), then
/// the salted hash is looked up in the store.
pub async fn authenticate(
    raw_credential: Option<&str>,
    store: &TokenStore,
    config: &Config,
) -> Result<Identity, AppError> {
    let Some(raw) = raw_credential else {
        return Err(AppError::Unauthorized);
    };
    // Tolerate clients that send a Bearer prefix.
    let raw = raw.strip_prefix("Bearer ").map(str::trim).unwrap_or(raw);
    if raw.is_empty() {
        return Err(AppError::Unauthorized);
    }

    if raw.as_bytes().ct_eq(config.admin_token.as_bytes()).into() {
        return Ok(Identity::Admin);
    }

    let hash = hash_secret(raw, &config.admin_token);
    match store.find_by_hashed_secret(&hash).await? {
        Some(record) => Ok(Identity::Token(record)),
        None => {
            tracing::warn!("authentication failed (credential: '{}')", mask(raw));
            Err(AppError::Unauthorized)
        }
    }
}

/// Never log full credentials: keep a recognizable prefix/suffix only.
fn mask(credential: &str) -> String {
    if credential.len() > 8 {
        format!(
            "{}…{}",
            &credential[..4],
            &credential[credential.len() - 4..]
        )
    } else {
        "****".to_string()
    }
}
