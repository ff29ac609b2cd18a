// src/api/admin_handlers.rs - Admin proxy handlers (divisions, user list, balance, analytics)
use axum::{extract::State, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use tracing::{error, info, warn};

use crate::api::routes::AppState;
use crate::errors::GatewayError;
use crate::identity::metadata::{self, SELECTED_DIVISIONS};
use crate::identity::{IdentityAdminClient, IdentityUser, TradingAccountRow};
use crate::trading::analytics::{build_balance_refresh, build_report};
use crate::trading::trading_data::{AccountDataRequest, TradingDataClient};

pub const USER_PAGE_SIZE: u32 = 1000;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GrantDivisionRequest {
    pub user_id: Option<String>,
    pub division: Option<String>,
}

impl GrantDivisionRequest {
    fn required(&self) -> Result<(&str, &str), GatewayError> {
        let user_id = self.user_id.as_deref().map(str::trim).filter(|s| !s.is_empty());
        let division = self.division.as_deref().map(str::trim).filter(|s| !s.is_empty());
        match (user_id, division) {
            (Some(u), Some(d)) => Ok((u, d)),
            _ => Err(GatewayError::Validation(
                "userId and division are required".to_string(),
            )),
        }
    }
}

/// Display-ready row of the admin user list.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub id: String,
    pub email: Option<String>,
    pub full_name: String,
    pub first_name: String,
    pub last_name: String,
    pub divisions: Vec<String>,
    pub is_admin: bool,
    pub created_at: Option<String>,
    pub last_sign_in: Option<String>,
    pub trading_account_connected: bool,
    pub trading_balance: f64,
    pub trading_provider: Option<String>,
}

fn admin_client(state: &AppState) -> Result<IdentityAdminClient, GatewayError> {
    let config = state.config.identity_admin()?;
    Ok(IdentityAdminClient::new(state.identity_http.clone(), config))
}

fn log_and_return<T>(tag: &str, result: Result<T, GatewayError>) -> Result<T, GatewayError> {
    if let Err(e) = &result {
        error!("❌ [{}] {}", tag, e);
    }
    result
}

pub async fn grant_division(
    State(state): State<AppState>,
    Json(request): Json<GrantDivisionRequest>,
) -> Result<Json<Value>, GatewayError> {
    log_and_return("/admin/grant-division", grant_division_inner(&state, &request).await)
}

async fn grant_division_inner(
    state: &AppState,
    request: &GrantDivisionRequest,
) -> Result<Json<Value>, GatewayError> {
    let (user_id, division) = request.required()?;
    let client = admin_client(state)?;

    // NotFound renders as a 500 like the other top-level failures
    let user = client.get_user(user_id).await?;

    let current = metadata::selected_divisions(&user.user_metadata);
    let divisions = metadata::grant_division(&current, division);

    let mut merged = user.user_metadata.clone();
    merged.insert(SELECTED_DIVISIONS.to_string(), json!(divisions));
    client.update_user_metadata(&user.id, merged).await?;

    info!(
        "✅ [/admin/grant-division] {} now has divisions {:?}",
        user.id, divisions
    );
    Ok(Json(json!({ "success": true, "divisions": divisions })))
}

pub async fn list_users(State(state): State<AppState>) -> Result<Json<Value>, GatewayError> {
    log_and_return("/admin/users", list_users_inner(&state).await)
}

async fn list_users_inner(state: &AppState) -> Result<Json<Value>, GatewayError> {
    let client = admin_client(state)?;
    let (users, accounts) = tokio::join!(client.list_users(USER_PAGE_SIZE), client.trading_accounts());
    let users = users?;
    let accounts = accounts.unwrap_or_else(|e| {
        warn!("⚠️  [/admin/users] Trading accounts unavailable: {}", e);
        Vec::new()
    });

    let summaries = project_users(&users, &accounts);
    info!("📋 [/admin/users] Returning {} users", summaries.len());
    Ok(Json(json!({ "users": summaries })))
}

/// Left-join identity records with their first trading-account row and sort newest first.
///
/// `is_admin` reflects the stored `is_admin` metadata flag only; the operator email list
/// applies to the signed-in session, not to this listing.
pub fn project_users(users: &[IdentityUser], accounts: &[TradingAccountRow]) -> Vec<UserSummary> {
    let mut by_user: HashMap<&str, &TradingAccountRow> = HashMap::new();
    for row in accounts {
        by_user.entry(row.user_id.as_str()).or_insert(row);
    }

    let mut summaries: Vec<UserSummary> = users
        .iter()
        .map(|user| {
            let meta = &user.user_metadata;
            let account = by_user.get(user.id.as_str());
            UserSummary {
                id: user.id.clone(),
                email: user.email.clone(),
                full_name: metadata::display_name(meta, user.email.as_deref()),
                first_name: metadata::first_name(meta).to_string(),
                last_name: metadata::last_name(meta).to_string(),
                divisions: metadata::selected_divisions(meta),
                is_admin: metadata::is_admin_flag(meta),
                created_at: user.created_at.clone(),
                last_sign_in: user.last_sign_in_at.clone(),
                trading_account_connected: account
                    .map(|a| a.is_active == Some(true))
                    .unwrap_or(false),
                trading_balance: account.and_then(|a| a.balance).unwrap_or(0.0),
                trading_provider: account.and_then(|a| a.provider.clone()),
            }
        })
        .collect();

    summaries.sort_by_key(|s| std::cmp::Reverse(created_at_millis(s.created_at.as_deref())));
    summaries
}

fn created_at_millis(created_at: Option<&str>) -> i64 {
    created_at
        .and_then(|c| DateTime::parse_from_rfc3339(c).ok())
        .map(|dt| dt.timestamp_millis())
        .unwrap_or(i64::MIN)
}

pub async fn refresh_user_balance(
    State(state): State<AppState>,
    Json(request): Json<AccountDataRequest>,
) -> Result<Json<Value>, GatewayError> {
    log_and_return("/admin/refresh-user-balance", async {
        let client = TradingDataClient::new(state.http.clone(), &state.config.api_url);
        let data = client.refresh_balance(&request).await?;
        let refresh = build_balance_refresh(&data);
        Ok::<_, GatewayError>(Json(serde_json::to_value(refresh)?))
    }
    .await)
}

pub async fn user_trading_analytics(
    State(state): State<AppState>,
    Json(request): Json<AccountDataRequest>,
) -> Result<Json<Value>, GatewayError> {
    log_and_return("/admin/user-trading-analytics", async {
        let client = TradingDataClient::new(state.http.clone(), &state.config.api_url);
        let data = client.account_data_with_reauth(&request).await?;
        let report = build_report(&data, Utc::now());
        info!(
            "📈 [/admin/user-trading-analytics] {} growth points, {} recent trades",
            report.growth.len(),
            report.history.len()
        );
        Ok::<_, GatewayError>(Json(serde_json::to_value(report)?))
    }
    .await)
}
