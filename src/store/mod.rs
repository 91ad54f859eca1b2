pub mod sqlite;

pub use sqlite::{TokenRecord, TokenStore};

use base64::Engine as _;
use rand::RngCore;
use sha2::{Digest, Sha256};

/// hex(SHA-256(secret ++ salt)). The salt is the process-wide admin secret;
/// there is no per-record salt, so rotating the admin secret invalidates
/// every stored hash at once.
pub fn hash_secret(secret: &str, salt: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    hasher.update(salt.as_bytes());
    hex::encode(hasher.finalize())
}

/// 24 bytes of OS randomness, base64-encoded: a 32-character bearer secret.
pub fn generate_secret() -> String {
    let mut bytes = [0u8; 24];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    base64::engine::general_purpose::STANDARD.encode(bytes)
}

/// Identifiers are user-chosen and restricted to `[A-Za-z0-9_-]+`.
pub fn is_valid_identifier(id: &str) -> bool {
    !id.is_empty()
        && id
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
}
