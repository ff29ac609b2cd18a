// src/trading/trading_data.rs - Client for the external trading-data service (account data by e-mail)
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{error, info, warn};
use url::Url;

use crate::errors::GatewayError;

/// Inbound body of the balance-refresh and analytics routes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountDataRequest {
    pub user_id: Option<String>,
    pub email: Option<String>,
    pub provider: Option<String>,
}

impl AccountDataRequest {
    pub fn require_email(&self) -> Result<&str, GatewayError> {
        self.email
            .as_deref()
            .map(str::trim)
            .filter(|e| !e.is_empty())
            .ok_or_else(|| GatewayError::Validation("Email is required".to_string()))
    }
}

#[derive(Debug, Clone)]
pub struct TradingDataClient {
    http: Client,
    base_url: String,
}

impl TradingDataClient {
    pub fn new(http: Client, base_url: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn account_data_url(&self, email: &str, user_id: Option<&str>) -> Result<Url, GatewayError> {
        let mut url = Url::parse(&format!("{}/api/tradelocker/account-data", self.base_url))
            .map_err(|e| GatewayError::Config(format!("Invalid API_URL '{}': {}", self.base_url, e)))?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("email", email);
            if let Some(user_id) = user_id.filter(|u| !u.is_empty()) {
                query.append_pair("user_id", user_id);
            }
        }
        Ok(url)
    }

    async fn fetch(&self, url: &Url) -> Result<Response, GatewayError> {
        Ok(self
            .http
            .get(url.clone())
            .header("Content-Type", "application/json")
            .send()
            .await?)
    }

    /// Single attempt, no re-authentication.
    pub async fn refresh_balance(&self, request: &AccountDataRequest) -> Result<Value, GatewayError> {
        let email = request.require_email()?;
        let url = self.account_data_url(email, None)?;
        let response = self.fetch(&url).await?;

        let status = response.status();
        if !status.is_success() {
            let body: Value = response.json().await.unwrap_or(Value::Null);
            let message = body
                .get("detail")
                .and_then(|d| d.as_str())
                .unwrap_or("Failed to refresh balance from trading platform")
                .to_string();
            return Err(GatewayError::upstream(status.as_u16(), message));
        }

        Ok(response.json().await?)
    }

    /// Fetch account data; on a 401 re-authenticate once and retry once.
    pub async fn account_data_with_reauth(
        &self,
        request: &AccountDataRequest,
    ) -> Result<Value, GatewayError> {
        let email = request.require_email()?;
        let url = self.account_data_url(email, request.user_id.as_deref())?;

        let mut response = self.fetch(&url).await?;
        if response.status() == StatusCode::UNAUTHORIZED {
            info!("🔑 [TRADING_DATA] Session 401 for {}, attempting re-auth...", email);
            if self.reauthenticate(request).await {
                info!("🔑 [TRADING_DATA] Re-auth successful, retrying fetch...");
                response = self.fetch(&url).await?;
            } else {
                warn!("⚠️  [TRADING_DATA] Re-auth for {} failed, not retrying", email);
            }
        }

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            error!("❌ [TRADING_DATA] Upstream error ({}): {}", status.as_u16(), text);
            return Err(GatewayError::upstream(
                status.as_u16(),
                format!("Trading data service error: {} {}", status.as_u16(), text),
            ));
        }

        Ok(response.json().await?)
    }

    async fn reauthenticate(&self, request: &AccountDataRequest) -> bool {
        let url = format!("{}/api/admin/refresh-user-balance", self.base_url);
        let body = json!({
            "userId": request.user_id,
            "email": request.email,
            "provider": request.provider,
        });
        match self.http.post(&url).json(&body).send().await {
            Ok(resp) => resp.status().is_success(),
            Err(e) => {
                warn!("⚠️  [TRADING_DATA] Re-auth call failed: {}", e);
                false
            }
        }
    }
}
