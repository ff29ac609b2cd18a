// src/identity/client.rs - HTTP helpers for the hosted identity provider (admin + end-user auth)
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Map, Value};
use std::time::Duration;
use tracing::debug;
use url::Url;

use crate::config::IdentityAdminConfig;
use crate::errors::{GatewayError, SessionError};

/// Identity record as returned by the provider's user endpoints.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct IdentityUser {
    #[serde(default, deserialize_with = "null_as_default")]
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub last_sign_in_at: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub user_metadata: Map<String, Value>,
}

/// One row of the trading-account linkage table.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TradingAccountRow {
    #[serde(default, deserialize_with = "null_as_default")]
    pub user_id: String,
    #[serde(default)]
    pub balance: Option<f64>,
    #[serde(default)]
    pub is_active: Option<bool>,
    #[serde(default)]
    pub provider: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuthTokens {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Best human-readable message from a provider error body.
pub fn error_message(body: &Value) -> Option<String> {
    ["error_description", "msg", "message", "detail", "error"]
        .iter()
        .filter_map(|k| body.get(*k).and_then(|v| v.as_str()))
        .find(|s| !s.is_empty())
        .map(str::to_string)
}

/// Client for identity-provider calls; every request is bounded by `timeout`.
pub fn identity_http_client(timeout: Duration) -> Result<Client, reqwest::Error> {
    Client::builder().timeout(timeout).build()
}

async fn read_json(response: Response) -> Result<(StatusCode, Value), reqwest::Error> {
    let status = response.status();
    let text = response.text().await?;
    let body = if text.trim().is_empty() {
        Value::Null
    } else {
        serde_json::from_str(&text).unwrap_or(Value::String(text))
    };
    Ok((status, body))
}

/// Service-credential client for the admin endpoints.
#[derive(Debug, Clone)]
pub struct IdentityAdminClient {
    http: Client,
    base_url: String,
    service_key: String,
}

impl IdentityAdminClient {
    pub fn new(http: Client, config: IdentityAdminConfig) -> Self {
        Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            service_key: config.service_key,
        }
    }

    fn authed(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("apikey", &self.service_key)
            .bearer_auth(&self.service_key)
    }

    async fn send_json(&self, request: RequestBuilder) -> Result<Value, GatewayError> {
        let response = self.authed(request).send().await?;
        let (status, body) = read_json(response).await?;
        if !status.is_success() {
            let message = error_message(&body)
                .unwrap_or_else(|| format!("Identity provider returned {}", status.as_u16()));
            return Err(GatewayError::upstream(status.as_u16(), message));
        }
        Ok(body)
    }

    /// `<base>/auth/v1/admin/users/<id>` with the id as one encoded path segment.
    fn user_url(&self, user_id: &str) -> Result<Url, GatewayError> {
        if user_id.is_empty() || user_id == "." || user_id == ".." {
            return Err(GatewayError::NotFound("User not found".to_string()));
        }
        let invalid = || GatewayError::Config(format!("Invalid identity provider URL '{}'", self.base_url));
        let mut url = Url::parse(&self.base_url).map_err(|_| invalid())?;
        url.set_query(None);
        url.path_segments_mut()
            .map_err(|_| invalid())?
            .pop_if_empty()
            .extend(["auth", "v1", "admin", "users"])
            .push(user_id);
        Ok(url)
    }

    pub async fn get_user(&self, user_id: &str) -> Result<IdentityUser, GatewayError> {
        let url = self.user_url(user_id)?;
        debug!("[IDENTITY] GET {}", url);
        let body = match self.send_json(self.http.get(url)).await {
            Err(GatewayError::Upstream { status: Some(404), .. }) => {
                return Err(GatewayError::NotFound("User not found".to_string()))
            }
            other => other?,
        };
        let user: IdentityUser = serde_json::from_value(body)?;
        if user.id.is_empty() {
            return Err(GatewayError::NotFound("User not found".to_string()));
        }
        Ok(user)
    }

    /// Full `user_metadata` rewrite. Callers merge into the existing map first.
    pub async fn update_user_metadata(
        &self,
        user_id: &str,
        metadata: Map<String, Value>,
    ) -> Result<Value, GatewayError> {
        let url = self.user_url(user_id)?;
        debug!("[IDENTITY] PUT {}", url);
        self.send_json(self.http.put(url).json(&json!({ "user_metadata": metadata })))
            .await
    }

    pub async fn list_users(&self, per_page: u32) -> Result<Vec<IdentityUser>, GatewayError> {
        let url = format!(
            "{}/auth/v1/admin/users?page=1&per_page={}",
            self.base_url, per_page
        );
        let body = self.send_json(self.http.get(&url)).await?;
        let raw = match body {
            Value::Array(items) => items,
            Value::Object(mut obj) => match obj.remove("users") {
                Some(Value::Array(items)) => items,
                _ => Vec::new(),
            },
            _ => Vec::new(),
        };
        raw.into_iter()
            .map(|u| serde_json::from_value(u).map_err(GatewayError::from))
            .collect()
    }

    pub async fn trading_accounts(&self) -> Result<Vec<TradingAccountRow>, GatewayError> {
        let url = format!(
            "{}/rest/v1/trading_accounts?select=user_id,balance,is_active,provider",
            self.base_url
        );
        let body = self.send_json(self.http.get(&url)).await?;
        Ok(serde_json::from_value(body)?)
    }
}

/// Public-key client used by the session store for end-user authentication.
#[derive(Debug, Clone)]
pub struct IdentityAuthClient {
    http: Client,
    base_url: String,
    anon_key: String,
}

impl IdentityAuthClient {
    pub fn new(http: Client, base_url: &str, anon_key: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            anon_key: anon_key.to_string(),
        }
    }

    async fn send_json(&self, request: RequestBuilder) -> Result<Value, SessionError> {
        let response = request.header("apikey", &self.anon_key).send().await?;
        let (status, body) = read_json(response).await?;
        if !status.is_success() {
            let message = error_message(&body)
                .unwrap_or_else(|| format!("Authentication failed ({})", status.as_u16()));
            return Err(SessionError::Auth(message));
        }
        Ok(body)
    }

    pub async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<(IdentityUser, AuthTokens), SessionError> {
        let url = format!("{}/auth/v1/token?grant_type=password", self.base_url);
        let body = self
            .send_json(
                self.http
                    .post(&url)
                    .json(&json!({ "email": email, "password": password })),
            )
            .await?;
        split_session(body)?.ok_or_else(|| SessionError::Auth("No session returned".to_string()))
    }

    /// Returns the created user, plus tokens when the provider signs the user in immediately.
    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        metadata: Map<String, Value>,
    ) -> Result<(IdentityUser, Option<AuthTokens>), SessionError> {
        let url = format!("{}/auth/v1/signup", self.base_url);
        let body = self
            .send_json(self.http.post(&url).json(&json!({
                "email": email,
                "password": password,
                "data": metadata,
            })))
            .await?;

        if let Some((user, tokens)) = split_session(body.clone())? {
            return Ok((user, Some(tokens)));
        }
        Ok((serde_json::from_value(body)?, None))
    }

    pub async fn get_user(&self, access_token: &str) -> Result<IdentityUser, SessionError> {
        let url = format!("{}/auth/v1/user", self.base_url);
        let body = self
            .send_json(self.http.get(&url).bearer_auth(access_token))
            .await?;
        Ok(serde_json::from_value(body)?)
    }

    pub async fn sign_out(&self, access_token: &str) -> Result<(), SessionError> {
        let url = format!("{}/auth/v1/logout", self.base_url);
        self.send_json(self.http.post(&url).bearer_auth(access_token))
            .await?;
        Ok(())
    }
}

/// `{access_token, refresh_token, user}` → parts; `None` when the body carries no session.
fn split_session(mut body: Value) -> Result<Option<(IdentityUser, AuthTokens)>, SessionError> {
    if body.get("access_token").and_then(|t| t.as_str()).is_none() {
        return Ok(None);
    }
    let user = match body.get_mut("user").map(Value::take) {
        Some(user) => serde_json::from_value(user)?,
        None => IdentityUser::default(),
    };
    let tokens: AuthTokens = serde_json::from_value(body)?;
    Ok(Some((user, tokens)))
}
