// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! HTTP route handlers.

pub mod api;
pub mod auth;

use crate::config::StorageBackend;
use crate::middleware::auth::require_auth;
use crate::AppState;
use axum::extract::State;
use axum::http::{header, HeaderValue, Method};
use axum::{middleware, routing::get, Json, Router};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct HealthResponse {
    pub status: String,
    pub build_id: String,
    /// "firestore" or "memory"
    pub storage: String,
}

/// Health check response
async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let build_id = option_env!("BUILD_ID").unwrap_or("unknown").to_string();
    let storage = match state.config.storage_backend {
        StorageBackend::Firestore => "firestore",
        StorageBackend::Memory => "memory",
    };
    Json(HealthResponse {
        status: "ok".to_string(),
        build_id,
        storage: storage.to_string(),
    })
}

/// Origins of local dev servers.
pub(crate) fn is_local_origin(origin: &str) -> bool {
    origin.starts_with("http://localhost") || origin.starts_with("http://127.0.0.1")
}

/// CORS for the dashboard: the configured frontend plus local dev servers,
/// with credentials so the session cookie is sent.
fn cors_layer(frontend_url: String) -> CorsLayer {
    CorsLayer::new()
        .allow_origin(AllowOrigin::predicate(
            move |origin: &HeaderValue, _request_parts: &axum::http::request::Parts| {
                let origin = origin.to_str().unwrap_or("");
                origin == frontend_url || is_local_origin(origin)
            },
        ))
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::ACCEPT])
}

/// Build the complete router with all routes.
pub fn create_router(state: Arc<AppState>) -> Router {
    let cors = cors_layer(state.config.frontend_url.clone());

    // Public routes (no auth required)
    let public_routes = Router::new()
        .route("/health", get(health_check))
        .merge(auth::routes());

    // Protected routes (auth required)
    let protected_routes =
        api::routes().route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(middleware::from_fn(
            crate::middleware::security::add_security_headers,
        ))
        .layer(cors)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .with_state(state)
}
