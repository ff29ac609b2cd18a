// tests/session_store_tests.rs

mod common;

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Map, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use verstige_gateway::errors::SessionError;
use verstige_gateway::config::{GatewayConfig, IDENTITY_TIMEOUT};
use verstige_gateway::identity::client::identity_http_client;
use verstige_gateway::identity::session::{CACHED_USER_EMAIL, CACHED_USER_ID};
use verstige_gateway::identity::{IdentityAuthClient, SessionStore};

const ANON_KEY: &str = "anon-key";

#[derive(Default)]
struct AuthMock {
    logouts: AtomicUsize,
}

fn user_record() -> Value {
    json!({
        "id": "u-42",
        "email": "Ops@Verstige.io",
        "created_at": "2024-11-05T08:00:00Z",
        "user_metadata": {
            "full_name": "Ada Lovelace King",
            "selected_divisions": ["trading", "business"],
            "phone": "+44 20 0000"
        }
    })
}

async fn token(headers: HeaderMap, Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    if headers.get("apikey").and_then(|v| v.to_str().ok()) != Some(ANON_KEY) {
        return (StatusCode::UNAUTHORIZED, Json(json!({"message": "No API key found"})));
    }
    if body["password"] != "correct horse" {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "invalid_grant", "error_description": "Invalid login credentials"})),
        );
    }
    (
        StatusCode::OK,
        Json(json!({"access_token": "at-1", "refresh_token": "rt-1", "user": user_record()})),
    )
}

async fn current_user(headers: HeaderMap) -> (StatusCode, Json<Value>) {
    match headers.get("authorization").and_then(|v| v.to_str().ok()) {
        Some("Bearer at-1") => (StatusCode::OK, Json(user_record())),
        _ => (StatusCode::UNAUTHORIZED, Json(json!({"msg": "invalid JWT"}))),
    }
}

async fn logout(State(mock): State<Arc<AuthMock>>) -> StatusCode {
    mock.logouts.fetch_add(1, Ordering::SeqCst);
    StatusCode::NO_CONTENT
}

async fn store_with(mock: Arc<AuthMock>, admin_emails: Vec<String>) -> SessionStore {
    let app = Router::new()
        .route("/auth/v1/token", post(token))
        .route("/auth/v1/user", get(current_user))
        .route("/auth/v1/logout", post(logout))
        .with_state(mock);
    let base = common::serve(app).await;
    SessionStore::new(
        Some(IdentityAuthClient::new(identity_http_client(IDENTITY_TIMEOUT).unwrap(), &base, ANON_KEY)),
        admin_emails,
    )
}

#[tokio::test]
async fn sign_in_derives_profile_and_admin_flag() {
    let mock = Arc::new(AuthMock::default());
    let store = store_with(Arc::clone(&mock), vec!["ops@verstige.io".to_string()]).await;
    let mut updates = store.subscribe();

    let session = store.sign_in("ops@verstige.io", "correct horse").await.unwrap();
    assert!(session.is_admin);
    assert!(updates.has_changed().unwrap());
    assert!(updates.borrow_and_update().is_some());

    let profile = store.profile().unwrap();
    assert_eq!(profile.first_name, "Ada");
    assert_eq!(profile.last_name, "Lovelace King");
    assert_eq!(profile.join_date, "Nov 2024");
    assert_eq!(profile.phone.as_deref(), Some("+44 20 0000"));
    assert_eq!(
        profile.divisions.iter().map(String::as_str).collect::<Vec<_>>(),
        vec!["trading", "business"]
    );
    assert_eq!(store.access_token().as_deref(), Some("at-1"));
    assert_eq!(store.cached(CACHED_USER_ID).as_deref(), Some("u-42"));

    store.sign_out().await;
    assert_eq!(mock.logouts.load(Ordering::SeqCst), 1);
    assert!(store.session().is_none());
    assert!(!store.is_admin());
    assert!(store.cached(CACHED_USER_EMAIL).is_none());
}

#[tokio::test]
async fn bad_credentials_surface_provider_message() {
    let store = store_with(Arc::new(AuthMock::default()), Vec::new()).await;
    match store.sign_in("ops@verstige.io", "wrong").await {
        Err(SessionError::Auth(message)) => assert_eq!(message, "Invalid login credentials"),
        other => panic!("unexpected {:?}", other.map(|s| s.user.id)),
    }
    assert!(store.session().is_none());
}

#[tokio::test]
async fn restore_and_refresh_use_the_access_token() {
    let store = store_with(Arc::new(AuthMock::default()), Vec::new()).await;

    assert!(store.refresh_profile().await.unwrap().is_none());
    assert!(matches!(store.restore("stale").await, Err(SessionError::Auth(_))));

    let session = store.restore("at-1").await.unwrap();
    assert_eq!(session.user.id, "u-42");
    assert!(!session.is_admin);

    let refreshed = store.refresh_profile().await.unwrap().unwrap();
    assert_eq!(refreshed.profile.email, "Ops@Verstige.io");
}

#[tokio::test]
async fn unconfigured_store_refuses_sign_in() {
    let store = SessionStore::new(None, Vec::new());
    assert!(matches!(
        store.sign_in("a@b.com", "x").await,
        Err(SessionError::NotConfigured)
    ));
    assert!(matches!(
        store.sign_up("a@b.com", "x", Map::new()).await,
        Err(SessionError::NotConfigured)
    ));
    // sign-out without a session is a local no-op
    store.sign_out().await;
}

#[tokio::test]
async fn store_from_config_without_identity_settings_is_unconfigured() {
    let store = SessionStore::from_config(&GatewayConfig::default()).unwrap();
    assert!(matches!(
        store.sign_in("a@b.com", "x").await,
        Err(SessionError::NotConfigured)
    ));
}
