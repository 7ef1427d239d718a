// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Shared integration test helpers: app construction over the in-memory
//! store, session JWTs, and a local fake of the Google endpoints.

use axum::{
    body::Body,
    extract::{Form, State},
    http::{header, HeaderMap, Request, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::{Duration, Utc};
use creator_sync::config::{Config, GoogleEndpoints};
use creator_sync::db::{Database, FirestoreDb};
use creator_sync::models::{Provider, TokenRecord};
use creator_sync::routes::create_router;
use creator_sync::services::{
    AnalyticsService, TokenCipher, YouTubeClient, YouTubeService,
};
use creator_sync::time_utils::format_utc_rfc3339;
use creator_sync::AppState;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Check if emulator is available via environment variable.
#[allow(dead_code)]
pub fn emulator_available() -> bool {
    std::env::var("FIRESTORE_EMULATOR_HOST").is_ok()
}

/// Skip test with message if emulator not available.
#[macro_export]
macro_rules! require_emulator {
    () => {
        if !crate::common::emulator_available() {
            eprintln!("⚠️  Skipping: FIRESTORE_EMULATOR_HOST not set");
            return;
        }
    };
}

/// Create a test database connection to the emulator.
#[allow(dead_code)]
pub async fn test_db() -> Database {
    Database::Firestore(
        FirestoreDb::new("test-project")
            .await
            .expect("Failed to connect to Firestore emulator"),
    )
}

/// Channel ID returned by the fake channels endpoint.
#[allow(dead_code)]
pub const FAKE_CHANNEL_ID: &str = "UCfakechannel";

// ─── Fake Google ─────────────────────────────────────────────

/// How the fake token endpoint answers refresh requests.
#[allow(dead_code)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RefreshMode {
    Succeed,
    InvalidGrant,
}

/// Request counters, one per endpoint.
#[derive(Default)]
pub struct Calls {
    pub code_exchange: AtomicUsize,
    pub refresh: AtomicUsize,
    pub revoke: AtomicUsize,
    pub channels: AtomicUsize,
    pub reports: AtomicUsize,
}

#[allow(dead_code)]
impl Calls {
    pub fn refresh(&self) -> usize {
        self.refresh.load(Ordering::SeqCst)
    }

    pub fn revoke(&self) -> usize {
        self.revoke.load(Ordering::SeqCst)
    }

    pub fn reports(&self) -> usize {
        self.reports.load(Ordering::SeqCst)
    }

    /// Every request the fake has seen.
    pub fn total(&self) -> usize {
        self.code_exchange.load(Ordering::SeqCst)
            + self.refresh.load(Ordering::SeqCst)
            + self.revoke.load(Ordering::SeqCst)
            + self.channels.load(Ordering::SeqCst)
            + self.reports.load(Ordering::SeqCst)
    }
}

struct FakeState {
    calls: Arc<Calls>,
    refresh_mode: Mutex<RefreshMode>,
    /// Pause before answering refresh requests
    refresh_delay: Mutex<Option<std::time::Duration>>,
    report: Mutex<Value>,
    /// Access tokens the reports endpoint answers with 401
    rejected_tokens: Mutex<Vec<String>>,
    /// Last Authorization header seen by the reports endpoint
    last_report_auth: Mutex<Option<String>>,
}

/// Local stand-in for the Google OAuth, Data and Analytics endpoints.
#[derive(Clone)]
pub struct FakeGoogle {
    pub base_url: String,
    pub calls: Arc<Calls>,
    state: Arc<FakeState>,
}

#[allow(dead_code)]
impl FakeGoogle {
    pub async fn start() -> Self {
        let calls = Arc::new(Calls::default());
        let state = Arc::new(FakeState {
            calls: calls.clone(),
            refresh_mode: Mutex::new(RefreshMode::Succeed),
            refresh_delay: Mutex::new(None),
            report: Mutex::new(report_json(&[])),
            rejected_tokens: Mutex::new(Vec::new()),
            last_report_auth: Mutex::new(None),
        });

        let app = Router::new()
            .route("/token", post(fake_token))
            .route("/revoke", post(fake_revoke))
            .route("/youtube/v3/channels", get(fake_channels))
            .route("/v2/reports", get(fake_reports))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind fake google");
        let addr = listener.local_addr().expect("local addr");
        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("fake google server");
        });

        Self {
            base_url: format!("http://{}", addr),
            calls,
            state,
        }
    }

    pub fn endpoints(&self) -> GoogleEndpoints {
        GoogleEndpoints::with_base(&self.base_url)
    }

    pub fn set_refresh_mode(&self, mode: RefreshMode) {
        *self.state.refresh_mode.lock().unwrap() = mode;
    }

    /// Hold every refresh answer for `delay`.
    pub fn set_refresh_delay(&self, delay: std::time::Duration) {
        *self.state.refresh_delay.lock().unwrap() = Some(delay);
    }

    /// Wait until the fake has received `n` refresh requests.
    pub async fn wait_for_refreshes(&self, n: usize) {
        for _ in 0..200 {
            if self.calls.refresh() >= n {
                return;
            }
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
        panic!("fake google saw {} refreshes, wanted {}", self.calls.refresh(), n);
    }

    /// Replace the body returned by the reports endpoint.
    pub fn set_report(&self, report: Value) {
        *self.state.report.lock().unwrap() = report;
    }

    pub fn reject_access_token(&self, token: &str) {
        self.state
            .rejected_tokens
            .lock()
            .unwrap()
            .push(token.to_string());
    }

    pub fn last_report_auth(&self) -> Option<String> {
        self.state.last_report_auth.lock().unwrap().clone()
    }
}

async fn fake_token(
    State(state): State<Arc<FakeState>>,
    Form(form): Form<HashMap<String, String>>,
) -> impl IntoResponse {
    match form.get("grant_type").map(String::as_str) {
        Some("authorization_code") => {
            state.calls.code_exchange.fetch_add(1, Ordering::SeqCst);
            (
                StatusCode::OK,
                Json(json!({
                    "access_token": "ya29.from-code",
                    "refresh_token": "1//refresh-from-code",
                    "expires_in": 3599,
                    "token_type": "Bearer",
                    "scope": "https://www.googleapis.com/auth/yt-analytics.readonly"
                })),
            )
        }
        Some("refresh_token") => {
            let n = state.calls.refresh.fetch_add(1, Ordering::SeqCst) + 1;
            let delay = *state.refresh_delay.lock().unwrap();
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            if *state.refresh_mode.lock().unwrap() == RefreshMode::InvalidGrant {
                return (
                    StatusCode::BAD_REQUEST,
                    Json(json!({
                        "error": "invalid_grant",
                        "error_description": "Token has been expired or revoked."
                    })),
                );
            }
            // Google omits refresh_token on refresh.
            (
                StatusCode::OK,
                Json(json!({
                    "access_token": format!("ya29.refreshed-{}", n),
                    "expires_in": 3599,
                    "token_type": "Bearer"
                })),
            )
        }
        _ => (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "unsupported_grant_type"})),
        ),
    }
}

async fn fake_revoke(State(state): State<Arc<FakeState>>) -> StatusCode {
    state.calls.revoke.fetch_add(1, Ordering::SeqCst);
    StatusCode::OK
}

async fn fake_channels(State(state): State<Arc<FakeState>>) -> Json<Value> {
    state.calls.channels.fetch_add(1, Ordering::SeqCst);
    Json(json!({
        "items": [{
            "id": FAKE_CHANNEL_ID,
            "snippet": {
                "title": "Fake Channel",
                "thumbnails": {"default": {"url": "https://img.example/fake.jpg"}}
            }
        }]
    }))
}

async fn fake_reports(State(state): State<Arc<FakeState>>, headers: HeaderMap) -> impl IntoResponse {
    state.calls.reports.fetch_add(1, Ordering::SeqCst);
    let auth = headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .map(String::from);
    *state.last_report_auth.lock().unwrap() = auth.clone();

    let token = auth
        .as_deref()
        .and_then(|h| h.strip_prefix("Bearer "))
        .unwrap_or("");
    if token.is_empty() || state.rejected_tokens.lock().unwrap().iter().any(|t| t == token) {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"error": {"code": 401, "message": "Invalid Credentials"}})),
        );
    }

    (StatusCode::OK, Json(state.report.lock().unwrap().clone()))
}

/// Reports response in the provider's column order.
///
/// Each row: (day, views, likes, comments, shares, subs gained, subs lost,
/// minutes watched, average view duration).
#[allow(dead_code)]
pub fn report_json(rows: &[(String, u64, u64, u64, u64, u64, u64, f64, f64)]) -> Value {
    let headers = [
        ("day", "DIMENSION", "STRING"),
        ("views", "METRIC", "INTEGER"),
        ("likes", "METRIC", "INTEGER"),
        ("comments", "METRIC", "INTEGER"),
        ("shares", "METRIC", "INTEGER"),
        ("subscribersGained", "METRIC", "INTEGER"),
        ("subscribersLost", "METRIC", "INTEGER"),
        ("estimatedMinutesWatched", "METRIC", "FLOAT"),
        ("averageViewDuration", "METRIC", "FLOAT"),
    ];
    json!({
        "kind": "youtubeAnalytics#resultTable",
        "columnHeaders": headers
            .iter()
            .map(|(name, column_type, data_type)| json!({
                "name": name,
                "columnType": column_type,
                "dataType": data_type
            }))
            .collect::<Vec<_>>(),
        "rows": rows
            .iter()
            .map(|r| json!([r.0, r.1, r.2, r.3, r.4, r.5, r.6, r.7, r.8]))
            .collect::<Vec<_>>(),
    })
}

// ─── App construction ────────────────────────────────────────

/// Cipher matching the test config's key.
#[allow(dead_code)]
pub fn test_cipher(config: &Config) -> TokenCipher {
    TokenCipher::from_key(config.token_encryption_key.as_ref()).expect("test cipher")
}

/// Wire the services the same way `main` does.
#[allow(dead_code)]
pub fn build_state(config: Config, db: Database) -> Arc<AppState> {
    let client = YouTubeClient::new(
        config.google_client_id.clone(),
        config.google_client_secret.clone(),
        config.google.clone(),
    )
    .expect("youtube client");
    let youtube_service = YouTubeService::new(
        client,
        db.clone(),
        test_cipher(&config),
        Arc::new(dashmap::DashMap::new()),
        Arc::new(dashmap::DashMap::new()),
    );
    let analytics_service =
        AnalyticsService::new(youtube_service.clone(), db.clone(), config.mock_data_fallback);

    Arc::new(AppState {
        config,
        db,
        youtube_service,
        analytics_service,
    })
}

/// A test app over the in-memory store, talking to a fresh fake Google.
#[allow(dead_code)]
pub struct TestApp {
    pub router: Router,
    pub state: Arc<AppState>,
    pub google: FakeGoogle,
}

#[allow(dead_code)]
impl TestApp {
    pub async fn new() -> Self {
        let google = FakeGoogle::start().await;
        let mut config = Config::test_default();
        config.google = google.endpoints();
        let state = build_state(config, Database::memory());
        Self {
            router: create_router(state.clone()),
            state,
            google,
        }
    }

    /// Session JWT for `user_id`.
    pub fn jwt(&self, user_id: &str) -> String {
        create_test_jwt(user_id, &self.state.config.jwt_signing_key)
    }

    /// Store tokens for `user_id` expiring `expires_in` from now.
    pub async fn seed_tokens(
        &self,
        user_id: &str,
        access_token: &str,
        refresh_token: Option<&str>,
        expires_in: Duration,
    ) -> TokenRecord {
        let cipher = test_cipher(&self.state.config);
        let now = Utc::now();
        let record = TokenRecord {
            user_id: user_id.to_string(),
            provider: Provider::YouTube,
            access_token_encrypted: cipher.encrypt(access_token, user_id).unwrap(),
            refresh_token_encrypted: refresh_token.map(|t| cipher.encrypt(t, user_id).unwrap()),
            expires_at: Some(format_utc_rfc3339(now + expires_in)),
            token_type: Some("Bearer".to_string()),
            scopes: vec!["https://www.googleapis.com/auth/yt-analytics.readonly".to_string()],
            updated_at: format_utc_rfc3339(now),
        };
        self.state.db.set_tokens(&record).await.unwrap();
        record
    }

    /// Send a request with the user's session and return status plus JSON body.
    pub async fn call(&self, method: &str, uri: &str, user_id: &str) -> (StatusCode, Value) {
        use tower::ServiceExt;

        let response = self
            .router
            .clone()
            .oneshot(
                Request::builder()
                    .method(method)
                    .uri(uri)
                    .header(header::AUTHORIZATION, format!("Bearer {}", self.jwt(user_id)))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }
}

/// App whose storage is unreachable; Google points at a closed port.
#[allow(dead_code)]
pub fn create_offline_app(mock_data_fallback: bool) -> (Router, Arc<AppState>) {
    let mut config = Config::test_default();
    config.mock_data_fallback = mock_data_fallback;
    config.google = GoogleEndpoints::with_base("http://127.0.0.1:9");
    let state = build_state(config, Database::offline());
    (create_router(state.clone()), state)
}

/// Create a test JWT token.
#[allow(dead_code)]
pub fn create_test_jwt(user_id: &str, signing_key: &[u8]) -> String {
    creator_sync::middleware::auth::create_jwt(user_id, signing_key).unwrap()
}
