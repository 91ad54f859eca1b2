use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use clap::Parser;
use tower_http::cors::CorsLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use speechgate::speech::google::{GoogleSynthesizer, GoogleTranslator};
use speechgate::speech::SpeechEngine;
use speechgate::store::{generate_secret, is_valid_identifier, TokenStore};
use speechgate::{api, cli, config, rate_limit::RateLimiter, AppState};

/// Request bodies are capped at 1 MiB.
const MAX_BODY_BYTES: usize = 1024 * 1024;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config::log_filter()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cfg = config::load()?;
    let args = cli::Cli::parse();

    let result = match args.command {
        Some(cli::Commands::Serve { port }) => run_server(cfg, port).await,
        Some(cli::Commands::Token { command }) => {
            let store = TokenStore::connect(&cfg.database_url, &cfg.admin_token).await?;
            store.migrate().await?;
            handle_token_command(command, &store, &cfg).await
        }
        None => run_server(cfg, None).await,
    };

    if let Err(ref e) = result {
        eprintln!("Error: {:?}", e);
    }
    result
}

async fn run_server(cfg: config::Config, port_override: Option<u16>) -> anyhow::Result<()> {
    let port = port_override.unwrap_or(cfg.port);

    tracing::info!("Connecting to database...");
    let store = TokenStore::connect(&cfg.database_url, &cfg.admin_token).await?;

    tracing::info!("Running migrations...");
    store.migrate().await?;

    let engine = SpeechEngine::new(
        Arc::new(GoogleTranslator::new()),
        Arc::new(GoogleSynthesizer::new()),
        cfg.synth_workers,
    );

    let state = Arc::new(AppState {
        store,
        limiter: RateLimiter::new(),
        engine,
        config: cfg,
    });

    let app = api::router(state.clone())
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(tower_http::trace::TraceLayer::new_for_http())
        // the admin UI is served from another origin
        .layer(CorsLayer::permissive())
        .layer(axum::middleware::from_fn(request_id_middleware));

    // Sweep stale rate-limit windows so the counter map stays bounded.
    {
        let state = state.clone();
        tokio::spawn(async move {
            let mut tick = tokio::time::interval(std::time::Duration::from_secs(60));
            loop {
                tick.tick().await;
                state.limiter.evict_expired();
            }
        });
    }

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("speechgate listening on {}", addr);
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}

/// Middleware: injects a unique X-Request-Id into every response.
/// This allows clients to correlate errors with gateway logs.
async fn request_id_middleware(
    req: axum::extract::Request,
    next: axum::middleware::Next,
) -> axum::response::Response {
    let req_id = uuid::Uuid::new_v4().to_string();
    let mut resp = next.run(req).await;
    if let Ok(val) = axum::http::HeaderValue::from_str(&req_id) {
        resp.headers_mut().insert("x-request-id", val);
    }
    resp
}

async fn handle_token_command(
    cmd: cli::TokenCommands,
    store: &TokenStore,
    cfg: &config::Config,
) -> anyhow::Result<()> {
    match cmd {
        cli::TokenCommands::Add { id, rate_limit } => {
            if !is_valid_identifier(&id) {
                anyhow::bail!("invalid ID format: {}", id);
            }
            let rate_limit = match rate_limit {
                Some(0) => anyhow::bail!("rate_limit must be a positive integer"),
                Some(n) => n,
                None => cfg.default_rate_limit,
            };
            let raw_secret = generate_secret();
            let record = store.create(&id, &raw_secret, rate_limit).await?;
            println!(
                "Token created:\n  ID:         {}\n  Rate limit: {}/min\n  Secret:     {}  (shown once, store it now)",
                record.id, record.rate_limit, raw_secret
            );
        }
        cli::TokenCommands::List => {
            let records = store.list().await?;
            if records.is_empty() {
                println!("No tokens found.");
            } else {
                println!("{:<20} {:<12} CREATED", "ID", "RATE/MIN");
                for r in records {
                    println!(
                        "{:<20} {:<12} {}",
                        r.id,
                        r.rate_limit,
                        r.created_at.format("%Y-%m-%d %H:%M:%S")
                    );
                }
            }
        }
        cli::TokenCommands::Revoke { value } => {
            store.delete_by_identifier_or_raw_secret(&value).await?;
            println!("Token revoked.");
        }
    }
    Ok(())
}
