// src/api/dxtrade_handlers.rs - DxTrade pass-through routes
use axum::{extract::State, http::StatusCode, Json};
use serde_json::{json, Value};
use tracing::error;

use crate::api::routes::AppState;
use crate::dxtrade::{DxTradeProxy, ForwardedResponse};
use crate::errors::GatewayError;

fn proxy(state: &AppState) -> DxTradeProxy {
    DxTradeProxy::new(
        state.http.clone(),
        &state.config.backend_url,
        state.config.demo_mode,
    )
}

fn relay(tag: &str, result: Result<ForwardedResponse, GatewayError>) -> (StatusCode, Json<Value>) {
    match result {
        Ok(forwarded) => {
            let status = StatusCode::from_u16(forwarded.status).unwrap_or(StatusCode::BAD_GATEWAY);
            (status, Json(forwarded.body))
        }
        Err(e) => {
            error!("❌ [{}] {}", tag, e);
            (e.status(), Json(json!({ "error": e.to_string() })))
        }
    }
}

pub async fn authenticate(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    relay("/dxtrade/authenticate", proxy(&state).authenticate(&body).await)
}

pub async fn execute(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    relay("/dxtrade/execute", proxy(&state).execute(&body).await)
}

pub async fn select_account(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    relay("/dxtrade/select-account", proxy(&state).select_account(&body).await)
}
