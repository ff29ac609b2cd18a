// tests/admin_handlers_tests.rs
//
// Drives the admin routes against an in-process identity provider.

mod common;

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    routing::get,
    Json, Router,
};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

use verstige_gateway::api::AppState;
use verstige_gateway::config::GatewayConfig;

const SERVICE_KEY: &str = "service-key";

#[derive(Default)]
struct IdentityMock {
    users: Mutex<Vec<Value>>,
    puts: Mutex<Vec<Value>>,
    lookups: Mutex<Vec<String>>,
    accounts_fail: bool,
    lookup_delay: Option<Duration>,
}

type Shared = Arc<IdentityMock>;

fn authorised(headers: &HeaderMap) -> bool {
    headers.get("apikey").and_then(|v| v.to_str().ok()) == Some(SERVICE_KEY)
        && headers.get("authorization").and_then(|v| v.to_str().ok())
            == Some(&format!("Bearer {}", SERVICE_KEY)[..])
}

async fn get_user(
    State(mock): State<Shared>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> (StatusCode, Json<Value>) {
    if !authorised(&headers) {
        return (StatusCode::UNAUTHORIZED, Json(json!({"msg": "bad key"})));
    }
    mock.lookups.lock().push(id.clone());
    if let Some(delay) = mock.lookup_delay {
        tokio::time::sleep(delay).await;
    }
    let users = mock.users.lock();
    match users.iter().find(|u| u["id"] == id.as_str()) {
        Some(user) => (StatusCode::OK, Json(user.clone())),
        None => (StatusCode::NOT_FOUND, Json(json!({"msg": "User not found"}))),
    }
}

async fn put_user(
    State(mock): State<Shared>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    if !authorised(&headers) {
        return (StatusCode::UNAUTHORIZED, Json(json!({"msg": "bad key"})));
    }
    mock.puts.lock().push(body.clone());
    let mut users = mock.users.lock();
    let Some(user) = users.iter_mut().find(|u| u["id"] == id.as_str()) else {
        return (StatusCode::NOT_FOUND, Json(json!({"msg": "User not found"})));
    };
    user["user_metadata"] = body["user_metadata"].clone();
    (StatusCode::OK, Json(user.clone()))
}

async fn list_users(State(mock): State<Shared>) -> Json<Value> {
    Json(json!({ "users": mock.users.lock().clone() }))
}

async fn trading_accounts(State(mock): State<Shared>) -> (StatusCode, Json<Value>) {
    if mock.accounts_fail {
        return (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({"message": "relation missing"})));
    }
    (
        StatusCode::OK,
        Json(json!([
            {"user_id": "u-jane", "balance": 2500.5, "is_active": true, "provider": "tradelocker"},
            {"user_id": "u-jane", "balance": 1.0, "is_active": false, "provider": "dxtrade"}
        ])),
    )
}

async fn spawn_identity(mock: Shared) -> String {
    let app = Router::new()
        .route("/auth/v1/admin/users", get(list_users))
        .route("/auth/v1/admin/users/:id", get(get_user).put(put_user))
        .route("/rest/v1/trading_accounts", get(trading_accounts))
        .with_state(mock);
    common::serve(app).await
}

fn seeded_users() -> Vec<Value> {
    vec![
        json!({
            "id": "u-jane",
            "email": "jane@x.com",
            "created_at": "2025-03-01T10:00:00Z",
            "user_metadata": {"selected_divisions": ["trading"], "phone_country": "GB"}
        }),
        json!({
            "id": "u-bob",
            "email": "bob@x.com",
            "created_at": "2025-04-01T10:00:00Z",
            "last_sign_in_at": "2025-04-02T10:00:00Z",
            "user_metadata": {"first_name": "Bob", "last_name": "Stone", "is_admin": true}
        }),
    ]
}

async fn config_for(mock: Shared) -> GatewayConfig {
    let identity = spawn_identity(mock).await;
    GatewayConfig {
        identity_url: Some(identity),
        identity_service_key: Some(SERVICE_KEY.to_string()),
        ..GatewayConfig::default()
    }
}

async fn gateway_with(mock: Shared) -> String {
    common::spawn_gateway(config_for(mock).await).await
}

async fn grant(client: &reqwest::Client, gateway: &str, body: Value) -> (u16, Value) {
    let response = client
        .post(format!("{}/admin/grant-division", gateway))
        .json(&body)
        .send()
        .await
        .unwrap();
    let status = response.status().as_u16();
    (status, response.json().await.unwrap())
}

#[tokio::test]
async fn grant_division_is_idempotent_and_keeps_other_metadata() {
    let mock = Arc::new(IdentityMock {
        users: Mutex::new(seeded_users()),
        ..IdentityMock::default()
    });
    let gateway = gateway_with(Arc::clone(&mock)).await;
    let client = reqwest::Client::new();

    let (status, body) = grant(&client, &gateway, json!({"userId": "u-jane", "division": "Business"})).await;
    assert_eq!(status, 200);
    assert_eq!(body, json!({"success": true, "divisions": ["trading", "business"]}));

    let (status, body) = grant(&client, &gateway, json!({"userId": "u-jane", "division": "TRADING"})).await;
    assert_eq!(status, 200);
    assert_eq!(body["divisions"], json!(["trading", "business"]));

    let puts = mock.puts.lock();
    assert_eq!(puts.len(), 2);
    assert_eq!(puts[1]["user_metadata"]["phone_country"], "GB");
}

#[tokio::test]
async fn grant_division_validates_input() {
    let mock = Arc::new(IdentityMock::default());
    let gateway = gateway_with(mock).await;
    let client = reqwest::Client::new();

    let (status, body) = grant(&client, &gateway, json!({"userId": "u-jane"})).await;
    assert_eq!(status, 400);
    assert_eq!(body["error"], "userId and division are required");
}

#[tokio::test]
async fn grant_division_for_unknown_user_is_a_server_error() {
    let mock = Arc::new(IdentityMock {
        users: Mutex::new(seeded_users()),
        ..IdentityMock::default()
    });
    let gateway = gateway_with(Arc::clone(&mock)).await;
    let client = reqwest::Client::new();

    let (status, body) = grant(&client, &gateway, json!({"userId": "ghost", "division": "trading"})).await;
    assert_eq!(status, 500);
    assert_eq!(body["error"], "User not found");
    assert!(mock.puts.lock().is_empty());
}

#[tokio::test]
async fn grant_division_keeps_user_id_inside_the_user_path() {
    let mock = Arc::new(IdentityMock {
        users: Mutex::new(seeded_users()),
        ..IdentityMock::default()
    });
    let gateway = gateway_with(Arc::clone(&mock)).await;
    let client = reqwest::Client::new();

    let sneaky = "u-jane/../../../rest/v1/trading_accounts?select=*";
    let (status, body) = grant(&client, &gateway, json!({"userId": sneaky, "division": "trading"})).await;
    assert_eq!(status, 500);
    assert_eq!(body["error"], "User not found");
    assert_eq!(*mock.lookups.lock(), vec![sneaky.to_string()]);
    assert!(mock.puts.lock().is_empty());

    let (status, body) = grant(&client, &gateway, json!({"userId": "..", "division": "trading"})).await;
    assert_eq!(status, 500);
    assert_eq!(body["error"], "User not found");
    assert_eq!(mock.lookups.lock().len(), 1);
}

#[tokio::test]
async fn slow_identity_provider_times_out() {
    let mock = Arc::new(IdentityMock {
        users: Mutex::new(seeded_users()),
        lookup_delay: Some(Duration::from_millis(500)),
        ..IdentityMock::default()
    });
    let config = config_for(Arc::clone(&mock)).await;
    let state = AppState::with_identity_timeout(config, Duration::from_millis(100)).unwrap();
    let gateway = common::spawn_state(state).await;
    let client = reqwest::Client::new();

    let (status, body) = grant(&client, &gateway, json!({"userId": "u-jane", "division": "business"})).await;
    assert_eq!(status, 500);
    assert_eq!(body, json!({"error": "Request timed out"}));
    assert!(mock.puts.lock().is_empty());
}

#[tokio::test]
async fn missing_identity_configuration_names_what_is_missing() {
    let gateway = common::spawn_gateway(GatewayConfig::default()).await;
    let client = reqwest::Client::new();

    let (status, body) = grant(&client, &gateway, json!({"userId": "u", "division": "trading"})).await;
    assert_eq!(status, 500);
    let message = body["error"].as_str().unwrap();
    assert!(message.contains("URL: MISSING"), "{}", message);
    assert!(message.contains("SERVICE_KEY: MISSING"), "{}", message);

    let response = client.get(format!("{}/admin/users", gateway)).send().await.unwrap();
    assert_eq!(response.status().as_u16(), 500);
}

#[tokio::test]
async fn users_list_joins_accounts_and_sorts_newest_first() {
    let mock = Arc::new(IdentityMock {
        users: Mutex::new(seeded_users()),
        ..IdentityMock::default()
    });
    let gateway = gateway_with(mock).await;

    let body: Value = reqwest::get(format!("{}/admin/users", gateway))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let users = body["users"].as_array().unwrap();
    assert_eq!(users.len(), 2);

    assert_eq!(users[0]["id"], "u-bob");
    assert_eq!(users[0]["fullName"], "Bob Stone");
    assert_eq!(users[0]["isAdmin"], true);
    assert_eq!(users[0]["lastSignIn"], "2025-04-02T10:00:00Z");
    assert_eq!(users[0]["tradingAccountConnected"], false);

    assert_eq!(users[1]["fullName"], "jane");
    assert_eq!(users[1]["divisions"], json!(["trading"]));
    assert_eq!(users[1]["tradingAccountConnected"], true);
    assert_eq!(users[1]["tradingBalance"], 2500.5);
    assert_eq!(users[1]["tradingProvider"], "tradelocker");
}

#[tokio::test]
async fn users_list_admin_column_comes_from_metadata_only() {
    let mock = Arc::new(IdentityMock {
        users: Mutex::new(seeded_users()),
        ..IdentityMock::default()
    });
    let config = GatewayConfig {
        admin_emails: vec!["jane@x.com".to_string()],
        ..config_for(mock).await
    };
    let gateway = common::spawn_gateway(config).await;

    let body: Value = reqwest::get(format!("{}/admin/users", gateway))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let users = body["users"].as_array().unwrap();
    let jane = users.iter().find(|u| u["id"] == "u-jane").unwrap();
    let bob = users.iter().find(|u| u["id"] == "u-bob").unwrap();
    assert_eq!(jane["isAdmin"], false);
    assert_eq!(bob["isAdmin"], true);
}

#[tokio::test]
async fn users_list_survives_trading_account_failure() {
    let mock = Arc::new(IdentityMock {
        users: Mutex::new(seeded_users()),
        accounts_fail: true,
        ..IdentityMock::default()
    });
    let gateway = gateway_with(mock).await;

    let response = reqwest::get(format!("{}/admin/users", gateway)).await.unwrap();
    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await.unwrap();
    let users = body["users"].as_array().unwrap();
    assert_eq!(users.len(), 2);
    assert!(users.iter().all(|u| u["tradingAccountConnected"] == false));
    assert!(users.iter().all(|u| u["tradingBalance"] == 0.0));
}

#[tokio::test]
async fn health_reports_configuration() {
    let gateway = common::spawn_gateway(GatewayConfig {
        demo_mode: true,
        ..GatewayConfig::default()
    })
    .await;

    let body: Value = reqwest::get(format!("{}/health", gateway))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body, json!({"status": "ok", "demo_mode": true, "identity_configured": false}));
}
