// src/main.rs - Verstige gateway: admin proxy handlers + DxTrade forwarders
use dotenv::dotenv;
use tracing::{info, warn};

use verstige_gateway::api::routes::{build_router, AppState, ROUTES};
use verstige_gateway::config::GatewayConfig;
use verstige_gateway::logging::{init_console_logging, init_logging};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let env_loaded = dotenv().is_ok();
    let config = GatewayConfig::from_env();

    let _log_guard = match init_logging(&config.log_dir, "verstige_gateway.log") {
        Ok(guard) => Some(guard),
        Err(e) => {
            init_console_logging();
            warn!("⚠️  File logging unavailable ({}), logging to console only", e);
            None
        }
    };
    if !env_loaded {
        warn!("⚠️  No .env file found, using process environment only");
    }

    if !config.identity_configured() {
        warn!("⚠️  Identity provider not configured: admin routes will return configuration errors");
    }
    if config.demo_mode {
        warn!("🧪 DEMO_MODE is on: DxTrade routes serve canned data when the backend is unreachable");
    }

    let addr = format!("{}:{}", config.host, config.port);
    info!("🌐 Verstige gateway starting on http://{}", addr);
    info!("   Backend: {} | API: {}", config.backend_url, config.api_url);
    info!("🔗 Available endpoints:");
    for (method, path) in ROUTES {
        info!("   {} http://{}{}", method, addr, path);
    }

    let app = build_router(AppState::new(config)?);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
