// src/api/routes.rs - Router assembly and shared handler state
use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use reqwest::Client;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};

use crate::api::{admin_handlers, dxtrade_handlers};
use crate::config::{GatewayConfig, IDENTITY_TIMEOUT};
use crate::identity::client::identity_http_client;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<GatewayConfig>,
    /// Identity-provider calls, bounded by the fixed helper timeout.
    pub identity_http: Client,
    pub http: Client,
}

impl AppState {
    pub fn new(config: GatewayConfig) -> Result<Self, reqwest::Error> {
        Self::with_identity_timeout(config, IDENTITY_TIMEOUT)
    }

    pub fn with_identity_timeout(config: GatewayConfig, timeout: Duration) -> Result<Self, reqwest::Error> {
        Ok(Self {
            config: Arc::new(config),
            identity_http: identity_http_client(timeout)?,
            http: Client::new(),
        })
    }
}

async fn health_check(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "demo_mode": state.config.demo_mode,
        "identity_configured": state.config.identity_configured(),
    }))
}

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_check))
        .route("/admin/grant-division", post(admin_handlers::grant_division))
        .route("/admin/users", get(admin_handlers::list_users))
        .route(
            "/admin/refresh-user-balance",
            post(admin_handlers::refresh_user_balance),
        )
        .route(
            "/admin/user-trading-analytics",
            post(admin_handlers::user_trading_analytics),
        )
        .route("/dxtrade/authenticate", post(dxtrade_handlers::authenticate))
        .route("/dxtrade/execute", post(dxtrade_handlers::execute))
        .route("/dxtrade/select-account", post(dxtrade_handlers::select_account))
        .layer(cors)
        .with_state(state)
}

/// Endpoint list logged at start-up.
pub const ROUTES: &[(&str, &str)] = &[
    ("GET", "/health"),
    ("POST", "/admin/grant-division"),
    ("GET", "/admin/users"),
    ("POST", "/admin/refresh-user-balance"),
    ("POST", "/admin/user-trading-analytics"),
    ("POST", "/dxtrade/authenticate"),
    ("POST", "/dxtrade/execute"),
    ("POST", "/dxtrade/select-account"),
];
