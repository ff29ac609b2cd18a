// tests/common/mod.rs - Throw-away upstreams and a gateway instance on loopback ports
#![allow(dead_code)]

use axum::Router;
use tokio::net::TcpListener;

use verstige_gateway::api::{build_router, AppState};
use verstige_gateway::config::GatewayConfig;

/// Serve `app` on an ephemeral port and return its base URL.
pub async fn serve(app: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

pub async fn spawn_gateway(config: GatewayConfig) -> String {
    spawn_state(AppState::new(config).unwrap()).await
}

pub async fn spawn_state(state: AppState) -> String {
    serve(build_router(state)).await
}

/// A loopback URL nothing is listening on.
pub async fn closed_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}", addr)
}
