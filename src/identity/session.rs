// src/identity/session.rs - Authenticated identity + derived profile, shared by the client-side tools
use std::collections::HashMap;

use chrono::DateTime;
use indexmap::IndexSet;
use parking_lot::RwLock;
use serde::Serialize;
use serde_json::{Map, Value};
use tokio::sync::watch;
use tracing::{info, warn};

use crate::config::{GatewayConfig, IDENTITY_TIMEOUT};
use crate::errors::SessionError;
use crate::identity::client::{identity_http_client, AuthTokens, IdentityAuthClient, IdentityUser};
use crate::identity::metadata;

pub const CACHED_FIRST_NAME: &str = "cached_first_name";
pub const CACHED_LAST_NAME: &str = "cached_last_name";
pub const CACHED_USER_ID: &str = "user_id";
pub const CACHED_USER_EMAIL: &str = "user_email";

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub divisions: IndexSet<String>,
    pub join_date: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub user: IdentityUser,
    pub tokens: Option<AuthTokens>,
    pub profile: Profile,
    pub is_admin: bool,
}

pub struct SessionStore {
    auth: Option<IdentityAuthClient>,
    admin_emails: Vec<String>,
    current: watch::Sender<Option<Session>>,
    cache: RwLock<HashMap<String, String>>,
}

impl SessionStore {
    pub fn new(auth: Option<IdentityAuthClient>, admin_emails: Vec<String>) -> Self {
        let (current, _) = watch::channel(None);
        Self {
            auth,
            admin_emails,
            current,
            cache: RwLock::new(HashMap::new()),
        }
    }

    pub fn from_config(config: &GatewayConfig) -> Result<Self, SessionError> {
        let auth = match (&config.identity_url, &config.identity_anon_key) {
            (Some(url), Some(key)) => Some(IdentityAuthClient::new(
                identity_http_client(IDENTITY_TIMEOUT)?,
                url,
                key,
            )),
            _ => None,
        };
        Ok(Self::new(auth, config.admin_emails.clone()))
    }

    fn auth(&self) -> Result<&IdentityAuthClient, SessionError> {
        self.auth.as_ref().ok_or(SessionError::NotConfigured)
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> Result<Session, SessionError> {
        let (user, tokens) = self.auth()?.sign_in_with_password(email, password).await?;
        info!("🔐 [SESSION] Signed in {}", user.email.as_deref().unwrap_or(&user.id));
        self.apply_auth_state(Some(user), Some(tokens))
            .ok_or_else(|| SessionError::Auth("Sign-in produced no session".to_string()))
    }

    /// Creates the account. Returns `None` when the provider wants e-mail confirmation first.
    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        user_metadata: Map<String, Value>,
    ) -> Result<Option<Session>, SessionError> {
        let (user, tokens) = self.auth()?.sign_up(email, password, user_metadata).await?;
        match tokens {
            Some(tokens) => Ok(self.apply_auth_state(Some(user), Some(tokens))),
            None => {
                info!("📧 [SESSION] Sign-up for {} awaiting confirmation", email);
                Ok(None)
            }
        }
    }

    /// Restore a session from a previously issued access token.
    pub async fn restore(&self, access_token: &str) -> Result<Session, SessionError> {
        let user = self.auth()?.get_user(access_token).await?;
        let tokens = AuthTokens {
            access_token: access_token.to_string(),
            refresh_token: None,
        };
        self.apply_auth_state(Some(user), Some(tokens))
            .ok_or_else(|| SessionError::Auth("Session restore produced no session".to_string()))
    }

    /// Re-read the current user from the provider and re-derive the profile.
    pub async fn refresh_profile(&self) -> Result<Option<Session>, SessionError> {
        let Some(tokens) = self.current.borrow().as_ref().and_then(|s| s.tokens.clone()) else {
            return Ok(None);
        };
        let user = self.auth()?.get_user(&tokens.access_token).await?;
        Ok(self.apply_auth_state(Some(user), Some(tokens)))
    }

    /// Auth-state-change notification: recompute the derived state and publish it.
    pub fn apply_auth_state(
        &self,
        user: Option<IdentityUser>,
        tokens: Option<AuthTokens>,
    ) -> Option<Session> {
        let session = match user {
            Some(user) => {
                let profile = {
                    let mut cache = self.cache.write();
                    let profile = derive_profile(&user, &mut cache);
                    cache.insert(CACHED_USER_ID.to_string(), user.id.clone());
                    if let Some(email) = &user.email {
                        cache.insert(CACHED_USER_EMAIL.to_string(), email.clone());
                    }
                    profile
                };
                let is_admin = compute_is_admin(&user, &self.admin_emails);
                Some(Session {
                    user,
                    tokens,
                    profile,
                    is_admin,
                })
            }
            None => {
                let mut cache = self.cache.write();
                cache.remove(CACHED_USER_ID);
                cache.remove(CACHED_USER_EMAIL);
                None
            }
        };

        self.current.send_replace(session.clone());
        session
    }

    /// Best-effort upstream logout, then local state and every cached identifier is cleared.
    pub async fn sign_out(&self) {
        let tokens = self.current.borrow().as_ref().and_then(|s| s.tokens.clone());
        if let (Some(auth), Some(tokens)) = (&self.auth, tokens) {
            if let Err(e) = auth.sign_out(&tokens.access_token).await {
                warn!("⚠️  [SESSION] Upstream sign-out failed: {}", e);
            }
        }
        self.current.send_replace(None);
        self.cache.write().clear();
        info!("👋 [SESSION] Signed out");
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<Session>> {
        self.current.subscribe()
    }

    pub fn session(&self) -> Option<Session> {
        self.current.borrow().clone()
    }

    pub fn profile(&self) -> Option<Profile> {
        self.current.borrow().as_ref().map(|s| s.profile.clone())
    }

    pub fn is_admin(&self) -> bool {
        self.current.borrow().as_ref().map(|s| s.is_admin).unwrap_or(false)
    }

    pub fn access_token(&self) -> Option<String> {
        self.current
            .borrow()
            .as_ref()
            .and_then(|s| s.tokens.as_ref().map(|t| t.access_token.clone()))
    }

    pub fn cached(&self, key: &str) -> Option<String> {
        self.cache.read().get(key).cloned()
    }
}

pub fn compute_is_admin(user: &IdentityUser, admin_emails: &[String]) -> bool {
    if metadata::is_admin_flag(&user.user_metadata) {
        return true;
    }
    user.email
        .as_ref()
        .map(|e| admin_emails.contains(&e.to_lowercase()))
        .unwrap_or(false)
}

/// Derive the display profile, consulting and refreshing the cached name.
pub fn derive_profile(user: &IdentityUser, cache: &mut HashMap<String, String>) -> Profile {
    let meta = &user.user_metadata;
    let mut first_name = metadata::first_name(meta).to_string();
    let mut last_name = metadata::last_name(meta).to_string();

    if first_name.is_empty() {
        let full = metadata::full_name(meta).trim();
        if full.contains(char::is_whitespace) {
            (first_name, last_name) = metadata::split_full_name(full);
        } else if !full.is_empty() {
            first_name = full.to_string();
        }
    }

    if !first_name.is_empty() {
        cache.insert(CACHED_FIRST_NAME.to_string(), first_name.clone());
        cache.insert(CACHED_LAST_NAME.to_string(), last_name.clone());
    } else {
        first_name = cache.get(CACHED_FIRST_NAME).cloned().unwrap_or_default();
        last_name = cache.get(CACHED_LAST_NAME).cloned().unwrap_or_default();
    }

    if first_name.is_empty() {
        first_name = "Trader".to_string();
    }

    let phone = meta
        .get("phone")
        .and_then(|p| p.as_str())
        .map(str::to_string)
        .or_else(|| user.phone.clone().filter(|p| !p.is_empty()));

    Profile {
        first_name,
        last_name,
        email: user.email.clone().unwrap_or_default(),
        phone,
        divisions: metadata::selected_divisions(meta).into_iter().collect(),
        join_date: user
            .created_at
            .as_deref()
            .and_then(|ts| DateTime::parse_from_rfc3339(ts).ok())
            .map(|dt| dt.format("%b %Y").to_string())
            .unwrap_or_default(),
    }
}
