//! Integration tests for the directory client.
//!
//! Each test spins up an Axum stub of the auth and participants endpoints
//! on a random port and points a real `DirectoryClient` at it.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use secrecy::SecretString;
use serde_json::json;
use tokio::net::TcpListener;
use tokio::time::timeout;

use sticker_bot::config::DirectoryConfig;
use sticker_bot::directory::{Clock, DirectoryClient, IdentityDirectory, Lookup};
use sticker_bot::error::DirectoryError;

const TEST_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Default)]
struct Stub {
    token_requests: AtomicUsize,
    lookups: AtomicUsize,
    /// Lifetime reported for issued tokens.
    expires_in: AtomicU64,
    /// Authorization headers seen on lookups.
    bearers: Mutex<Vec<String>>,
}

async fn issue_token(State(stub): State<Arc<Stub>>, body: String) -> Response {
    if !body.contains("grant_type=password") || !body.contains("username=bot") {
        return (StatusCode::UNAUTHORIZED, "invalid_grant").into_response();
    }
    let n = stub.token_requests.fetch_add(1, Ordering::SeqCst) + 1;
    Json(json!({
        "access_token": format!("tok-{n}"),
        "expires_in": stub.expires_in.load(Ordering::SeqCst),
        "token_type": "Bearer",
    }))
    .into_response()
}

async fn participant(
    State(stub): State<Arc<Stub>>,
    Path(handle): Path<String>,
    headers: HeaderMap,
) -> Response {
    stub.lookups.fetch_add(1, Ordering::SeqCst);
    let bearer = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    stub.bearers.lock().unwrap().push(bearer);

    match handle.as_str() {
        "ivanov" => Json(json!({
            "login": "ivanov",
            "className": "Dragons",
            "parallelName": "Core program",
            "expValue": 1234,
            "status": "ACTIVE",
        }))
        .into_response(),
        "lonely" => Json(json!({ "login": "lonely" })).into_response(),
        "garbled" => (StatusCode::OK, "<html>").into_response(),
        "boom" => (StatusCode::INTERNAL_SERVER_ERROR, "upstream exploded").into_response(),
        "locked" => (StatusCode::UNAUTHORIZED, "token revoked").into_response(),
        _ => (StatusCode::NOT_FOUND, "").into_response(),
    }
}

/// Start the stub, return (base url, state).
async fn start_stub(expires_in: u64) -> (String, Arc<Stub>) {
    let stub = Arc::new(Stub::default());
    stub.expires_in.store(expires_in, Ordering::SeqCst);

    let app = Router::new()
        .route("/auth/token", post(issue_token))
        .route("/api/v1/participants/{handle}", get(participant))
        .with_state(Arc::clone(&stub));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://127.0.0.1:{port}"), stub)
}

fn config(base: &str) -> DirectoryConfig {
    DirectoryConfig {
        auth_url: format!("{base}/auth/token"),
        api_base_url: format!("{base}/api/v1"),
        username: Some(SecretString::from("bot")),
        password: Some(SecretString::from("hunter2")),
        refresh_margin: Duration::from_secs(60),
        request_timeout: Duration::from_secs(2),
        ..DirectoryConfig::default()
    }
}

/// Manually advanced clock.
struct FakeClock(Mutex<DateTime<Utc>>);

impl FakeClock {
    fn new() -> Arc<Self> {
        Arc::new(Self(Mutex::new(Utc::now())))
    }

    fn advance(&self, by: Duration) {
        let mut now = self.0.lock().unwrap();
        *now += chrono::Duration::from_std(by).unwrap();
    }
}

impl Clock for FakeClock {
    fn now(&self) -> DateTime<Utc> {
        *self.0.lock().unwrap()
    }
}

// ── Lookups ──────────────────────────────────────────────────────────

#[tokio::test]
async fn known_handle_is_found() {
    timeout(TEST_TIMEOUT, async {
        let (base, stub) = start_stub(3600).await;
        let client = DirectoryClient::new(config(&base));

        match client.resolve("ivanov").await.unwrap() {
            Lookup::Found(profile) => {
                assert_eq!(profile.login, "ivanov");
                assert_eq!(profile.parallel_name.as_deref(), Some("Core program"));
                assert_eq!(profile.class_name.as_deref(), Some("Dragons"));
            }
            Lookup::NotFound => panic!("expected a profile"),
        }
        assert_eq!(stub.bearers.lock().unwrap().as_slice(), ["Bearer tok-1"]);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn profile_without_cohort_fields() {
    timeout(TEST_TIMEOUT, async {
        let (base, _stub) = start_stub(3600).await;
        let client = DirectoryClient::new(config(&base));

        let Lookup::Found(profile) = client.resolve("lonely").await.unwrap() else {
            panic!("expected a profile");
        };
        assert_eq!(profile.parallel_name, None);
        assert_eq!(profile.class_name, None);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn unknown_handle_is_not_found() {
    timeout(TEST_TIMEOUT, async {
        let (base, _stub) = start_stub(3600).await;
        let client = DirectoryClient::new(config(&base));

        assert_eq!(client.resolve("unknownuser").await.unwrap(), Lookup::NotFound);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn server_error_is_not_a_miss() {
    timeout(TEST_TIMEOUT, async {
        let (base, _stub) = start_stub(3600).await;
        let client = DirectoryClient::new(config(&base));

        match client.resolve("boom").await {
            Err(DirectoryError::UnexpectedStatus { status, body }) => {
                assert_eq!(status, 500);
                assert_eq!(body, "upstream exploded");
            }
            other => panic!("expected UnexpectedStatus, got {other:?}"),
        }
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn malformed_profile_is_invalid_response() {
    timeout(TEST_TIMEOUT, async {
        let (base, _stub) = start_stub(3600).await;
        let client = DirectoryClient::new(config(&base));

        assert!(matches!(
            client.resolve("garbled").await,
            Err(DirectoryError::InvalidResponse(_))
        ));
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn unreachable_directory_is_request_failure() {
    timeout(TEST_TIMEOUT, async {
        let (base, _stub) = start_stub(3600).await;
        let mut cfg = config(&base);
        // Nothing listens on port 9 locally.
        cfg.api_base_url = "http://127.0.0.1:9/api/v1".into();
        let client = DirectoryClient::new(cfg);

        assert!(matches!(
            client.resolve("ivanov").await,
            Err(DirectoryError::RequestFailed(_))
        ));
    })
    .await
    .expect("test timed out");
}

// ── Credentials ──────────────────────────────────────────────────────

#[tokio::test]
async fn credential_is_reused_across_lookups() {
    timeout(TEST_TIMEOUT, async {
        let (base, stub) = start_stub(3600).await;
        let client = DirectoryClient::new(config(&base));

        for handle in ["ivanov", "unknownuser", "ivanov", "lonely"] {
            client.resolve(handle).await.unwrap();
        }
        assert_eq!(stub.token_requests.load(Ordering::SeqCst), 1);
        assert_eq!(stub.lookups.load(Ordering::SeqCst), 4);
        assert!(
            stub.bearers
                .lock()
                .unwrap()
                .iter()
                .all(|b| b == "Bearer tok-1")
        );
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn credential_is_refreshed_inside_margin() {
    timeout(TEST_TIMEOUT, async {
        let (base, stub) = start_stub(120).await;
        let clock = FakeClock::new();
        let client = DirectoryClient::with_clock(config(&base), clock.clone());

        client.resolve("ivanov").await.unwrap();
        clock.advance(Duration::from_secs(30));
        client.resolve("ivanov").await.unwrap();
        assert_eq!(stub.token_requests.load(Ordering::SeqCst), 1);

        // 70 s in, only 50 s of a 120 s token remain: under the 60 s margin.
        clock.advance(Duration::from_secs(40));
        client.resolve("ivanov").await.unwrap();
        assert_eq!(stub.token_requests.load(Ordering::SeqCst), 2);
        assert_eq!(
            stub.bearers.lock().unwrap().last().map(String::as_str),
            Some("Bearer tok-2")
        );
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn short_lived_credential_is_never_served() {
    timeout(TEST_TIMEOUT, async {
        // Issued tokens expire in 30 s, which is already inside the margin.
        let (base, stub) = start_stub(30).await;
        let clock = FakeClock::new();
        let client = DirectoryClient::with_clock(config(&base), clock.clone());

        client.resolve("ivanov").await.unwrap();
        client.resolve("ivanov").await.unwrap();
        assert_eq!(stub.token_requests.load(Ordering::SeqCst), 2);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn unauthorized_lookup_drops_cached_credential() {
    timeout(TEST_TIMEOUT, async {
        let (base, stub) = start_stub(3600).await;
        let client = DirectoryClient::new(config(&base));

        client.resolve("ivanov").await.unwrap();
        assert!(client.credentials().current().await.is_some());

        assert!(matches!(
            client.resolve("locked").await,
            Err(DirectoryError::UnexpectedStatus { status: 401, .. })
        ));
        assert!(client.credentials().current().await.is_none());

        client.resolve("ivanov").await.unwrap();
        assert_eq!(stub.token_requests.load(Ordering::SeqCst), 2);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn rejected_credentials_fail_the_lookup() {
    timeout(TEST_TIMEOUT, async {
        let (base, stub) = start_stub(3600).await;
        let mut cfg = config(&base);
        cfg.username = Some(SecretString::from("intruder"));
        let client = DirectoryClient::new(cfg);

        assert!(matches!(
            client.resolve("ivanov").await,
            Err(DirectoryError::CredentialFailed(_))
        ));
        assert_eq!(stub.lookups.load(Ordering::SeqCst), 0);
        assert!(client.credentials().current().await.is_none());
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn missing_secrets_skip_the_network() {
    timeout(TEST_TIMEOUT, async {
        let (base, stub) = start_stub(3600).await;
        let mut cfg = config(&base);
        cfg.password = None;
        let client = DirectoryClient::new(cfg);

        match client.resolve("ivanov").await {
            Err(DirectoryError::NotConfigured(missing)) => assert_eq!(missing, "S21_PASSWORD"),
            other => panic!("expected NotConfigured, got {other:?}"),
        }
        assert_eq!(stub.token_requests.load(Ordering::SeqCst), 0);
    })
    .await
    .expect("test timed out");
}
