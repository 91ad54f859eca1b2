//! HTTP-surface tests: the full router with a scripted synthesis engine,
//! exercising auth, per-token and per-address rate limits, and the
//! management routes end-to-end.

use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::util::ServiceExt;

use speechgate::config::Config;
use speechgate::rate_limit::RateLimiter;
use speechgate::speech::{SpeechEngine, Synthesizer, Translator};
use speechgate::store::{hash_secret, TokenStore};
use speechgate::{api, AppState};

const ADMIN_TOKEN: &str = "test-admin-secret";

struct StaticSynth;

#[async_trait]
impl Synthesizer for StaticSynth {
    async fn synthesize(&self, _text: &str, _language: &str) -> anyhow::Result<Vec<u8>> {
        Ok(b"MPEG".to_vec())
    }
}

struct EchoTranslator;

#[async_trait]
impl Translator for EchoTranslator {
    async fn translate(&self, text: &str, _source: &str, _target: &str) -> anyhow::Result<String> {
        Ok(text.to_string())
    }
}

async fn test_app() -> (Router, Arc<AppState>) {
    let path = std::env::temp_dir().join(format!("speechgate-api-{}.db", uuid::Uuid::new_v4()));
    let database_url = format!("sqlite://{}?mode=rwc", path.display());

    let store = TokenStore::connect(&database_url, ADMIN_TOKEN).await.unwrap();
    store.migrate().await.unwrap();

    let config = Config {
        port: 0,
        database_url,
        admin_token: ADMIN_TOKEN.to_string(),
        default_rate_limit: 10,
        synth_workers: 2,
    };

    let state = Arc::new(AppState {
        store,
        limiter: RateLimiter::new(),
        engine: SpeechEngine::new(Arc::new(EchoTranslator), Arc::new(StaticSynth), 2),
        config,
    });

    (api::router(state.clone()), state)
}

fn request(method: &str, uri: &str, addr: &str, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .extension(ConnectInfo::<SocketAddr>(
            format!("{addr}:40000").parse().unwrap(),
        ));
    let body = match body {
        Some(value) => {
            builder = builder.header("content-type", "application/json");
            Body::from(value.to_string())
        }
        None => Body::empty(),
    };
    builder.body(body).unwrap()
}

fn with_auth(mut req: Request<Body>, credential: &str) -> Request<Body> {
    req.headers_mut()
        .insert("authorization", credential.parse().unwrap());
    req
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

// ── Token management ─────────────────────────────────────────

#[tokio::test]
async fn add_token_issues_a_secret_shown_once() {
    let (app, state) = test_app().await;

    let resp = app
        .clone()
        .oneshot(request(
            "POST",
            "/add-token",
            "10.0.0.1",
            Some(json!({"id": "alice"})),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);

    let body = body_json(resp).await;
    let raw_secret = body["token"].as_str().unwrap();
    assert_eq!(raw_secret.len(), 32);

    // only the salted hash is stored
    let record = state.store.find_by_identifier("alice").await.unwrap().unwrap();
    assert_eq!(record.secret_hash, hash_secret(raw_secret, ADMIN_TOKEN));
    assert_eq!(record.rate_limit, 10); // configured default
}

#[tokio::test]
async fn add_token_rejects_bad_ids_and_duplicates() {
    let (app, _state) = test_app().await;

    let resp = app
        .clone()
        .oneshot(request(
            "POST",
            "/add-token",
            "10.0.0.2",
            Some(json!({"id": "invalid#id"})),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = app
        .clone()
        .oneshot(request(
            "POST",
            "/add-token",
            "10.0.0.3",
            Some(json!({"id": "bob"})),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);

    // re-adding an existing identifier is a conflict, not an overwrite
    let resp = app
        .clone()
        .oneshot(request(
            "POST",
            "/add-token",
            "10.0.0.3",
            Some(json!({"id": "bob", "rate_limit": 99})),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn add_token_is_limited_per_address() {
    let (app, _state) = test_app().await;

    for i in 0..2 {
        let resp = app
            .clone()
            .oneshot(request(
                "POST",
                "/add-token",
                "10.1.0.1",
                Some(json!({"id": format!("user{i}")})),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::CREATED);
    }

    let resp = app
        .clone()
        .oneshot(request(
            "POST",
            "/add-token",
            "10.1.0.1",
            Some(json!({"id": "user2"})),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(resp.headers().get("retry-after").unwrap(), "60");

    // a different caller address has its own budget
    let resp = app
        .clone()
        .oneshot(request(
            "POST",
            "/add-token",
            "10.1.0.2",
            Some(json!({"id": "user3"})),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
}

#[tokio::test]
async fn edit_token_updates_the_rate_limit() {
    let (app, state) = test_app().await;
    state.store.create("carol", "raw-secret-carol", 10).await.unwrap();

    let resp = app
        .clone()
        .oneshot(request(
            "POST",
            "/edit-token",
            "10.2.0.1",
            Some(json!({"id": "carol", "rate_limit": 3})),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let record = state.store.find_by_identifier("carol").await.unwrap().unwrap();
    assert_eq!(record.rate_limit, 3);

    let resp = app
        .clone()
        .oneshot(request(
            "POST",
            "/edit-token",
            "10.2.0.2",
            Some(json!({"id": "carol", "rate_limit": 0})),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = app
        .clone()
        .oneshot(request(
            "POST",
            "/edit-token",
            "10.2.0.3",
            Some(json!({"id": "nobody", "rate_limit": 5})),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn revoke_token_accepts_id_or_raw_secret() {
    let (app, state) = test_app().await;

    let resp = app
        .clone()
        .oneshot(request(
            "POST",
            "/add-token",
            "10.3.0.1",
            Some(json!({"id": "dave"})),
        ))
        .await
        .unwrap();
    let raw_secret = body_json(resp).await["token"].as_str().unwrap().to_string();

    let resp = app
        .clone()
        .oneshot(request(
            "POST",
            "/revoke-token",
            "10.3.0.1",
            Some(json!({"token": raw_secret})),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(state.store.find_by_identifier("dave").await.unwrap().is_none());

    let resp = app
        .clone()
        .oneshot(request(
            "POST",
            "/revoke-token",
            "10.3.0.1",
            Some(json!({"token": "nonexistent"})),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let resp = app
        .clone()
        .oneshot(request("POST", "/revoke-token", "10.3.0.1", Some(json!({}))))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn regenerate_rotates_the_credential() {
    let (app, state) = test_app().await;

    let resp = app
        .clone()
        .oneshot(request(
            "POST",
            "/add-token",
            "10.4.0.1",
            Some(json!({"id": "erin"})),
        ))
        .await
        .unwrap();
    let old_secret = body_json(resp).await["token"].as_str().unwrap().to_string();

    let resp = app
        .clone()
        .oneshot(request(
            "POST",
            "/regenerate-token",
            "10.4.0.1",
            Some(json!({"id": "erin"})),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let new_secret = body_json(resp).await["token"].as_str().unwrap().to_string();
    assert_ne!(new_secret, old_secret);

    let record = state.store.find_by_identifier("erin").await.unwrap().unwrap();
    assert_eq!(record.secret_hash, hash_secret(&new_secret, ADMIN_TOKEN));

    // the old credential no longer authenticates
    let resp = app
        .clone()
        .oneshot(with_auth(
            request("GET", "/list-tokens", "10.4.0.1", None),
            &old_secret,
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn list_tokens_requires_a_credential_and_hides_secrets() {
    let (app, state) = test_app().await;
    state.store.create("frank", "raw-secret-frank", 10).await.unwrap();

    let resp = app
        .clone()
        .oneshot(request("GET", "/list-tokens", "10.5.0.1", None))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    // any valid token credential may list
    let resp = app
        .clone()
        .oneshot(with_auth(
            request("GET", "/list-tokens", "10.5.0.1", None),
            "raw-secret-frank",
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    let rows = body.as_array().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["id"], "frank");
    assert_eq!(
        rows[0]["hashed_secret"],
        hash_secret("raw-secret-frank", ADMIN_TOKEN)
    );
    assert_eq!(rows[0]["rate_limit"], 10);
    assert!(rows[0]["created_at"].is_string());
    assert!(rows[0].get("token").is_none());
}

// ── Speech generation ────────────────────────────────────────

#[tokio::test]
async fn generate_speech_streams_audio_for_a_valid_credential() {
    let (app, state) = test_app().await;
    state.store.create("gina", "raw-secret-gina", 10).await.unwrap();

    let resp = app
        .clone()
        .oneshot(with_auth(
            request(
                "POST",
                "/generate-speech",
                "10.6.0.1",
                Some(json!({"localization": {"en": "horse"}})),
            ),
            "raw-secret-gina",
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers()["content-type"], "audio/mpeg");
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&bytes[..], b"MPEG");
}

#[tokio::test]
async fn generate_speech_rejects_missing_or_unknown_credentials() {
    let (app, _state) = test_app().await;

    let body = json!({"localization": {"en": "horse"}});
    let resp = app
        .clone()
        .oneshot(request("POST", "/generate-speech", "10.6.0.2", Some(body.clone())))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let resp = app
        .clone()
        .oneshot(with_auth(
            request("POST", "/generate-speech", "10.6.0.2", Some(body)),
            "no-such-credential",
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn generate_speech_validates_the_body_shape() {
    let (app, state) = test_app().await;
    state.store.create("hank", "raw-secret-hank", 10).await.unwrap();

    // neither shape present
    let resp = app
        .clone()
        .oneshot(with_auth(
            request("POST", "/generate-speech", "10.6.0.3", Some(json!({}))),
            "raw-secret-hank",
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    // unsupported primary language
    let resp = app
        .clone()
        .oneshot(with_auth(
            request(
                "POST",
                "/generate-speech",
                "10.6.0.3",
                Some(json!({"text": "horse", "language": "xx", "translations": ["en"]})),
            ),
            "raw-secret-hank",
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

/// Property 7: calls beyond the credential's own budget are rejected with
/// the rate-limit status, not an auth failure.
#[tokio::test]
async fn generate_speech_enforces_the_per_token_budget() {
    let (app, state) = test_app().await;
    state.store.create("iris", "raw-secret-iris", 3).await.unwrap();

    let body = json!({"localization": {"en": "horse"}});
    for _ in 0..3 {
        let resp = app
            .clone()
            .oneshot(with_auth(
                request("POST", "/generate-speech", "10.7.0.1", Some(body.clone())),
                "raw-secret-iris",
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    let resp = app
        .clone()
        .oneshot(with_auth(
            request("POST", "/generate-speech", "10.7.0.1", Some(body)),
            "raw-secret-iris",
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(resp.headers().get("retry-after").unwrap(), "60");
}

/// The admin credential bypasses token lookup and rate limiting.
#[tokio::test]
async fn admin_credential_bypasses_rate_limits() {
    let (app, _state) = test_app().await;

    let body = json!({"localization": {"en": "horse"}});
    for _ in 0..20 {
        let resp = app
            .clone()
            .oneshot(with_auth(
                request("POST", "/generate-speech", "10.8.0.1", Some(body.clone())),
                ADMIN_TOKEN,
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }
}

// ── Health ───────────────────────────────────────────────────

#[tokio::test]
async fn healthz_reports_healthy() {
    let (app, _state) = test_app().await;
    let resp = app
        .clone()
        .oneshot(request("GET", "/healthz", "10.9.0.1", None))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_json(resp).await, json!({"status": "healthy"}));
}

#[tokio::test]
async fn unknown_routes_are_404() {
    let (app, _state) = test_app().await;
    let resp = app
        .clone()
        .oneshot(request("GET", "/nope", "10.9.0.2", None))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}
