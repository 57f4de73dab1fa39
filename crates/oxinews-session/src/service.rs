//! Auth service and router seams.
//!
//! Two external collaborators are abstracted here: the hosted auth service
//! (session lookup, user lookup, credential flows, change notifications) and
//! the router (navigation plus current path).

use crate::AuthResult;
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use tokio::sync::broadcast;
use tracing::warn;

/// Linked login identity (email, google, github, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Identity {
    #[serde(default)]
    pub id: String,
    pub provider: String,
    #[serde(default)]
    pub identity_data: serde_json::Value,
}

/// Authenticated user profile as returned by the auth service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub identities: Vec<Identity>,
    #[serde(default)]
    pub user_metadata: serde_json::Value,
    #[serde(default)]
    pub app_metadata: serde_json::Value,
    #[serde(default)]
    pub created_at: Option<String>,
}

impl User {
    /// Display name from sign-up metadata, if any.
    pub fn full_name(&self) -> Option<&str> {
        self.user_metadata.get("full_name").and_then(|v| v.as_str())
    }
}

fn default_token_type() -> String {
    "bearer".to_string()
}

/// Auth-service-issued session.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    #[serde(default)]
    pub expires_in: Option<i64>,
    /// Absolute expiry in seconds since the Unix epoch.
    #[serde(default)]
    pub expires_at: Option<i64>,
    #[serde(default)]
    pub user: Option<User>,
}

impl Session {
    /// Expiry as a timestamp. `None` when missing or out of range.
    pub fn expires_at_utc(&self) -> Option<DateTime<Utc>> {
        self.expires_at
            .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user.as_ref().map(|u| u.id.as_str())
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .field("token_type", &self.token_type)
            .field("expires_in", &self.expires_in)
            .field("expires_at", &self.expires_at)
            .field("user_id", &self.user_id())
            .finish()
    }
}

/// Auth state change event kinds.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AuthEvent {
    InitialSession,
    SignedIn,
    SignedOut,
    TokenRefreshed,
    UserUpdated,
    PasswordRecovery,
    /// Anything the service emits that has no dedicated handling.
    Other(String),
}

impl AuthEvent {
    pub fn as_str(&self) -> &str {
        match self {
            AuthEvent::InitialSession => "INITIAL_SESSION",
            AuthEvent::SignedIn => "SIGNED_IN",
            AuthEvent::SignedOut => "SIGNED_OUT",
            AuthEvent::TokenRefreshed => "TOKEN_REFRESHED",
            AuthEvent::UserUpdated => "USER_UPDATED",
            AuthEvent::PasswordRecovery => "PASSWORD_RECOVERY",
            AuthEvent::Other(name) => name,
        }
    }
}

impl From<&str> for AuthEvent {
    fn from(name: &str) -> Self {
        match name {
            "INITIAL_SESSION" => AuthEvent::InitialSession,
            "SIGNED_IN" => AuthEvent::SignedIn,
            "SIGNED_OUT" => AuthEvent::SignedOut,
            "TOKEN_REFRESHED" => AuthEvent::TokenRefreshed,
            "USER_UPDATED" => AuthEvent::UserUpdated,
            "PASSWORD_RECOVERY" => AuthEvent::PasswordRecovery,
            other => AuthEvent::Other(other.to_string()),
        }
    }
}

impl fmt::Display for AuthEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for AuthEvent {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for AuthEvent {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        Ok(AuthEvent::from(name.as_str()))
    }
}

/// One notification from the auth service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthChange {
    pub event: AuthEvent,
    pub session: Option<Session>,
}

impl AuthChange {
    pub fn new(event: AuthEvent, session: Option<Session>) -> Self {
        Self { event, session }
    }
}

/// Supported OAuth providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OAuthProvider {
    Google,
    Github,
}

impl OAuthProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            OAuthProvider::Google => "google",
            OAuthProvider::Github => "github",
        }
    }
}

impl fmt::Display for OAuthProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OAuthProvider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "google" => Ok(OAuthProvider::Google),
            "github" => Ok(OAuthProvider::Github),
            other => Err(format!("unsupported OAuth provider: {}", other)),
        }
    }
}

/// Parameters for starting an OAuth sign-in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OAuthRequest {
    pub provider: OAuthProvider,
    /// Absolute URL the provider returns to.
    pub redirect_to: String,
    /// Extra provider query parameters.
    pub query_params: BTreeMap<String, String>,
}

/// Handle on the auth service's change stream.
///
/// Dropping the handle (or calling [`AuthSubscription::unsubscribe`]) detaches
/// the listener.
#[derive(Debug)]
pub struct AuthSubscription {
    receiver: broadcast::Receiver<AuthChange>,
}

impl AuthSubscription {
    pub fn new(receiver: broadcast::Receiver<AuthChange>) -> Self {
        Self { receiver }
    }

    /// Wait for the next change. Returns `None` once the service is gone.
    pub async fn recv(&mut self) -> Option<AuthChange> {
        loop {
            match self.receiver.recv().await {
                Ok(change) => return Some(change),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Auth change listener lagged, events dropped");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    pub fn unsubscribe(self) {}
}

/// Hosted auth service.
#[async_trait]
pub trait AuthService: Send + Sync {
    /// Current session, `None` when signed out.
    async fn get_session(&self) -> AuthResult<Option<Session>>;

    /// User behind the current session.
    async fn get_user(&self) -> AuthResult<User>;

    async fn sign_in_with_password(&self, email: &str, password: &str) -> AuthResult<()>;

    /// Register a new account. `metadata` is stored as the user's profile data.
    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        metadata: Option<serde_json::Value>,
    ) -> AuthResult<()>;

    /// Start an OAuth flow. Returns the provider URL to open, if any.
    async fn sign_in_with_oauth(&self, request: &OAuthRequest) -> AuthResult<Option<String>>;

    async fn sign_out(&self) -> AuthResult<()>;

    /// Subscribe to auth state changes.
    fn on_auth_state_change(&self) -> AuthSubscription;
}

/// Client-side router.
pub trait Router: Send + Sync {
    /// Push `path` onto the navigation history.
    fn navigate(&self, path: &str);

    fn current_path(&self) -> String;
}
