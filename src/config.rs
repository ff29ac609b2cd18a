// src/config.rs - Environment driven configuration for the gateway and the console
use std::env;
use std::time::Duration;

use crate::errors::GatewayError;

/// Fixed timeout for the identity-provider helper calls.
pub const IDENTITY_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub host: String,
    pub port: u16,
    pub identity_url: Option<String>,
    pub identity_service_key: Option<String>,
    pub identity_anon_key: Option<String>,
    /// External trading backend behind the DxTrade forwarders.
    pub backend_url: String,
    /// Public API / trading-data service.
    pub api_url: String,
    /// Execution engine: streaming endpoint + `/api/execute-signal`.
    pub execution_url: String,
    pub demo_mode: bool,
    pub admin_emails: Vec<String>,
    pub log_dir: String,
}

/// Identity-provider coordinates needed by the admin handlers.
#[derive(Debug, Clone)]
pub struct IdentityAdminConfig {
    pub base_url: String,
    pub service_key: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3005,
            identity_url: None,
            identity_service_key: None,
            identity_anon_key: None,
            backend_url: "http://localhost:8000".to_string(),
            api_url: "http://localhost:8000".to_string(),
            execution_url: "http://localhost:4000".to_string(),
            demo_mode: false,
            admin_emails: Vec::new(),
            log_dir: "logs".to_string(),
        }
    }
}

impl GatewayConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let port = env::var("GATEWAY_PORT")
            .ok()
            .and_then(|p| p.parse::<u16>().ok())
            .unwrap_or(defaults.port);

        Self {
            host: env::var("GATEWAY_HOST").unwrap_or(defaults.host),
            port,
            identity_url: non_empty_var("IDENTITY_URL").map(|u| u.trim_end_matches('/').to_string()),
            identity_service_key: non_empty_var("IDENTITY_SERVICE_KEY"),
            identity_anon_key: non_empty_var("IDENTITY_ANON_KEY"),
            backend_url: env::var("BACKEND_URL").unwrap_or(defaults.backend_url),
            api_url: env::var("API_URL").unwrap_or(defaults.api_url),
            execution_url: env::var("EXECUTION_URL").unwrap_or(defaults.execution_url),
            demo_mode: env::var("DEMO_MODE")
                .map(|v| parse_flag(&v))
                .unwrap_or(false),
            admin_emails: parse_admin_emails(&env::var("ADMIN_EMAILS").unwrap_or_default()),
            log_dir: env::var("LOG_DIR").unwrap_or(defaults.log_dir),
        }
    }

    /// Identity URL + service credential, or a configuration error naming what is missing.
    pub fn identity_admin(&self) -> Result<IdentityAdminConfig, GatewayError> {
        match (&self.identity_url, &self.identity_service_key) {
            (Some(url), Some(key)) => Ok(IdentityAdminConfig {
                base_url: url.clone(),
                service_key: key.clone(),
            }),
            (url, key) => Err(GatewayError::Config(format!(
                "Backend configuration error: IDENTITY_SERVICE_KEY or IDENTITY_URL is not defined in the environment. URL: {}, SERVICE_KEY: {}",
                if url.is_some() { "ok" } else { "MISSING" },
                if key.is_some() { "ok" } else { "MISSING" },
            ))),
        }
    }

    pub fn identity_configured(&self) -> bool {
        self.identity_url.is_some() && self.identity_service_key.is_some()
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parse_flag(value: &str) -> bool {
    matches!(value.trim().to_lowercase().as_str(), "true" | "1" | "yes" | "on")
}

pub fn parse_admin_emails(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|e| e.trim().to_lowercase())
        .filter(|e| !e.is_empty())
        .collect()
}
