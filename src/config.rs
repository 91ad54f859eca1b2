#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub database_url: String,
    /// Admin bearer secret. Doubles as the server-wide salt for stored
    /// token hashes, so rotating it orphans every existing hash.
    pub admin_token: String,
    /// Per-token requests-per-minute budget used when create/edit omits one.
    /// Set via DEFAULT_RATE_LIMIT env var. Default: 10.
    pub default_rate_limit: u32,
    /// Concurrent worker budget for the synthesis fan-out engine.
    /// Set via SYNTH_WORKERS env var. Default: 4.
    pub synth_workers: usize,
}

pub fn load() -> anyhow::Result<Config> {
    dotenvy::dotenv().ok();

    let admin_token = match std::env::var("ADMIN_TOKEN") {
        Ok(v) if !v.is_empty() => v,
        _ => anyhow::bail!("ADMIN_TOKEN is not set. Terminating."),
    };

    let default_rate_limit = match std::env::var("DEFAULT_RATE_LIMIT") {
        Err(_) => 10,
        Ok(raw) => match raw.parse::<u32>() {
            Ok(n) if n > 0 => n,
            _ => {
                tracing::error!(
                    "Invalid DEFAULT_RATE_LIMIT value. Must be a positive integer. \
                     Falling back to default 10."
                );
                10
            }
        },
    };

    Ok(Config {
        port: std::env::var("PORT")
            .unwrap_or_else(|_| "5000".into())
            .parse()
            .unwrap_or(5000),
        database_url: std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://tokens.db?mode=rwc".into()),
        admin_token,
        default_rate_limit,
        synth_workers: std::env::var("SYNTH_WORKERS")
            .ok()
            .and_then(|v| v.parse().ok())
            .filter(|&n| n > 0)
            .unwrap_or(4),
    })
}

/// Map the LOGLEVEL deployment convention onto a tracing filter
/// directive. RUST_LOG, when set, wins unchanged.
pub fn log_filter() -> String {
    if let Ok(directive) = std::env::var("RUST_LOG") {
        return directive;
    }
    let level = match std::env::var("LOGLEVEL")
        .unwrap_or_else(|_| "INFO".into())
        .to_uppercase()
        .as_str()
    {
        "DEBUG" => "debug",
        "WARNING" => "warn",
        "ERROR" => "error",
        "CRITICAL" => "error",
        // unknown values fall back to info
        _ => "info",
    };
    format!("speechgate={level},tower_http={level}")
}
