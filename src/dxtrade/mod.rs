// src/dxtrade/mod.rs - Pass-through forwarders to the DxTrade backend
pub mod demo;

use reqwest::Client;
use serde_json::{json, Value};
use tracing::{debug, error, warn};

use crate::errors::GatewayError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DxTradeOp {
    Authenticate,
    Execute,
    SelectAccount,
}

impl DxTradeOp {
    pub fn path(&self) -> &'static str {
        match self {
            DxTradeOp::Authenticate => "/api/dxtrade/authenticate",
            DxTradeOp::Execute => "/api/dxtrade/execute",
            DxTradeOp::SelectAccount => "/api/dxtrade/select-account",
        }
    }
}

/// Upstream status + JSON body, relayed as-is by the handlers.
#[derive(Debug, Clone, PartialEq)]
pub struct ForwardedResponse {
    pub status: u16,
    pub body: Value,
}

#[derive(Debug, Clone)]
pub struct DxTradeProxy {
    http: Client,
    backend_url: String,
    demo_mode: bool,
}

impl DxTradeProxy {
    pub fn new(http: Client, backend_url: &str, demo_mode: bool) -> Self {
        Self {
            http,
            backend_url: backend_url.trim_end_matches('/').to_string(),
            demo_mode,
        }
    }

    pub fn demo_mode(&self) -> bool {
        self.demo_mode
    }

    /// Forward `body` to the backend. An unreachable backend or a non-JSON reply is an error.
    pub async fn forward(&self, op: DxTradeOp, body: &Value) -> Result<ForwardedResponse, GatewayError> {
        let url = format!("{}{}", self.backend_url, op.path());
        debug!("➡️  [DXTRADE] Forwarding to {}", url);

        let response = self.http.post(&url).json(body).send().await?;
        let status = response.status().as_u16();
        let text = response.text().await?;
        let body = serde_json::from_str(&text)?;
        Ok(ForwardedResponse { status, body })
    }

    pub async fn authenticate(&self, body: &Value) -> Result<ForwardedResponse, GatewayError> {
        match self.forward(DxTradeOp::Authenticate, body).await {
            Ok(forwarded) => Ok(forwarded),
            Err(e) if self.demo_mode => {
                warn!("🧪 [DXTRADE] Backend unavailable ({}), serving demo authentication payload", e);
                Ok(ForwardedResponse {
                    status: 200,
                    body: demo::demo_authenticate(),
                })
            }
            Err(e) => Err(e),
        }
    }

    pub async fn select_account(&self, body: &Value) -> Result<ForwardedResponse, GatewayError> {
        match self.forward(DxTradeOp::SelectAccount, body).await {
            Ok(forwarded) => Ok(forwarded),
            Err(e) if self.demo_mode => {
                let account_id = body.get("account_id").and_then(|a| a.as_str());
                warn!(
                    "🧪 [DXTRADE] Backend unavailable ({}), serving demo account payload for {:?}",
                    e, account_id
                );
                Ok(ForwardedResponse {
                    status: 200,
                    body: demo::demo_select_account(account_id),
                })
            }
            Err(e) => Err(e),
        }
    }

    /// Execution never falls back to canned data.
    pub async fn execute(&self, body: &Value) -> Result<ForwardedResponse, GatewayError> {
        let forwarded = self.forward(DxTradeOp::Execute, body).await.map_err(|e| {
            error!("❌ [DXTRADE] Execution proxy error: {}", e);
            GatewayError::Transport("Internal server error during execution proxy".to_string())
        })?;

        if (200..300).contains(&forwarded.status) {
            return Ok(forwarded);
        }

        let message = forwarded
            .body
            .get("detail")
            .and_then(|d| d.as_str())
            .unwrap_or("Execution failed")
            .to_string();
        Ok(ForwardedResponse {
            status: forwarded.status,
            body: json!({ "error": message }),
        })
    }
}
