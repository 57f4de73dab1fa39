//! Supabase GoTrue client.
//!
//! Talks to the `/auth/v1` REST API, keeps the current session in memory and
//! broadcasts `AuthChange` notifications the way the Supabase SDKs do.

use crate::error::{summarize_response_body, SupabaseError, SupabaseResult};
use async_trait::async_trait;
use chrono::Utc;
use oxinews_config::Config;
use oxinews_session::{
    is_session_expired, AuthChange, AuthError, AuthEvent, AuthResult, AuthService,
    AuthSubscription, OAuthRequest, Session, User,
};
use parking_lot::RwLock;
use reqwest::StatusCode;
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};
use url::Url;

/// Capacity of the change notification channel.
const EVENT_CHANNEL_CAPACITY: usize = 32;

#[derive(Debug, Serialize)]
struct PasswordGrant<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Debug, Serialize)]
struct RefreshGrant<'a> {
    refresh_token: &'a str,
}

#[derive(Debug, Serialize)]
struct SignUpRequest<'a> {
    email: &'a str,
    password: &'a str,
    data: serde_json::Value,
}

/// Supabase auth client implementing [`AuthService`].
pub struct SupabaseAuthClient {
    http_client: reqwest::Client,
    auth_url: String,
    anon_key: String,
    auto_refresh: bool,
    session: RwLock<Option<Session>>,
    events: broadcast::Sender<AuthChange>,
}

impl SupabaseAuthClient {
    /// Create a new client.
    ///
    /// # Arguments
    /// * `api_url` - The Supabase project URL (e.g., `https://xyz.supabase.co`)
    /// * `anon_key` - The Supabase anonymous API key
    pub fn new(api_url: impl AsRef<str>, anon_key: impl Into<String>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            http_client: reqwest::Client::new(),
            auth_url: format!("{}/auth/v1", api_url.as_ref().trim_end_matches('/')),
            anon_key: anon_key.into(),
            auto_refresh: true,
            session: RwLock::new(None),
            events,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(&config.supabase_url, config.supabase_anon_key.clone())
    }

    pub fn with_http_client(mut self, http_client: reqwest::Client) -> Self {
        self.http_client = http_client;
        self
    }

    /// Disable refreshing an expired session inside `get_session`.
    pub fn without_auto_refresh(mut self) -> Self {
        self.auto_refresh = false;
        self
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.auth_url, path)
    }

    /// Current in-memory session, without refreshing.
    pub fn current_session(&self) -> Option<Session> {
        self.session.read().clone()
    }

    /// Adopt a session obtained elsewhere (e.g. an OAuth callback).
    pub fn set_session(&self, session: Session) {
        self.store_session(session, AuthEvent::SignedIn);
    }

    /// Provider authorization URL for an OAuth sign-in.
    pub fn authorize_url(&self, request: &OAuthRequest) -> SupabaseResult<String> {
        let mut url = Url::parse(&self.endpoint("/authorize"))?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("provider", request.provider.as_str());
            query.append_pair("redirect_to", &request.redirect_to);
            for (key, value) in &request.query_params {
                query.append_pair(key, value);
            }
        }
        Ok(url.into())
    }

    /// Exchange the stored refresh token for a new session.
    pub async fn refresh_session(&self) -> SupabaseResult<Session> {
        let refresh_token = self
            .session
            .read()
            .as_ref()
            .map(|s| s.refresh_token.clone())
            .filter(|t| !t.is_empty())
            .ok_or(SupabaseError::NoSession)?;

        debug!("Refreshing Supabase session");
        let session = self
            .token_grant("refresh_token", &RefreshGrant {
                refresh_token: &refresh_token,
            })
            .await?;

        info!(user_id = session.user_id().unwrap_or(""), "Session refreshed");
        self.store_session(session.clone(), AuthEvent::TokenRefreshed);
        Ok(session)
    }

    async fn token_grant<B: Serialize + ?Sized>(
        &self,
        grant_type: &str,
        body: &B,
    ) -> SupabaseResult<Session> {
        let url = format!("{}?grant_type={}", self.endpoint("/token"), grant_type);
        let response = self
            .http_client
            .post(&url)
            .header("apikey", &self.anon_key)
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await?;

        let response = check_response(response, "Token request failed").await?;
        let session: Session = response.json().await?;
        Ok(normalize_session(session))
    }

    fn access_token(&self) -> SupabaseResult<String> {
        self.session
            .read()
            .as_ref()
            .map(|s| s.access_token.clone())
            .ok_or(SupabaseError::NoSession)
    }

    fn store_session(&self, session: Session, event: AuthEvent) {
        *self.session.write() = Some(session.clone());
        self.emit(event, Some(session));
    }

    fn clear_session(&self) {
        let had_session = self.session.write().take().is_some();
        if had_session {
            self.emit(AuthEvent::SignedOut, None);
        }
    }

    fn emit(&self, event: AuthEvent, session: Option<Session>) {
        debug!(event = %event, "Emitting auth change");
        // No receivers is fine; nobody is listening yet.
        let _ = self.events.send(AuthChange::new(event, session));
    }
}

/// Pass 2xx responses through; turn anything else into [`SupabaseError::Api`].
async fn check_response(
    response: reqwest::Response,
    context: &'static str,
) -> SupabaseResult<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let body_summary = summarize_response_body(&body);
    warn!(status = %status, body_summary = %body_summary, "{}", context);
    Err(SupabaseError::from_response(status, &body))
}

/// Fill `expires_at` from `expires_in` when the server omitted it.
fn normalize_session(mut session: Session) -> Session {
    if session.expires_at.is_none() {
        session.expires_at = session
            .expires_in
            .map(|secs| Utc::now().timestamp() + secs);
    }
    session
}

fn to_credentials_error(err: SupabaseError) -> AuthError {
    match err {
        SupabaseError::Api {
            status: 400,
            message,
            ..
        } => AuthError::InvalidCredentials(message),
        other => other.into(),
    }
}

#[async_trait]
impl AuthService for SupabaseAuthClient {
    async fn get_session(&self) -> AuthResult<Option<Session>> {
        let Some(session) = self.current_session() else {
            return Ok(None);
        };
        if !self.auto_refresh || !is_session_expired(Some(&session), Utc::now()) {
            return Ok(Some(session));
        }
        if session.refresh_token.is_empty() {
            return Ok(Some(session));
        }

        match self.refresh_session().await {
            Ok(session) => Ok(Some(session)),
            Err(e) => {
                let err = AuthError::from(e);
                if !err.is_transient() {
                    warn!(error = %err, "Session refresh rejected, clearing session");
                    self.clear_session();
                }
                Err(AuthError::TokenRefresh(err.to_string()))
            }
        }
    }

    async fn get_user(&self) -> AuthResult<User> {
        let access_token = self.access_token()?;
        let response = self
            .http_client
            .get(self.endpoint("/user"))
            .header("apikey", &self.anon_key)
            .header("Authorization", format!("Bearer {}", access_token))
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(SupabaseError::from)?;

        let response = check_response(response, "User lookup failed").await?;
        let user: User = response.json().await.map_err(SupabaseError::from)?;
        debug!(user_id = %user.id, "User fetched");
        Ok(user)
    }

    async fn sign_in_with_password(&self, email: &str, password: &str) -> AuthResult<()> {
        debug!("Attempting email/password sign-in");
        let session = self
            .token_grant("password", &PasswordGrant { email, password })
            .await
            .map_err(to_credentials_error)?;

        info!(user_id = session.user_id().unwrap_or(""), "Sign-in successful");
        self.store_session(session, AuthEvent::SignedIn);
        Ok(())
    }

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        metadata: Option<serde_json::Value>,
    ) -> AuthResult<()> {
        let body = SignUpRequest {
            email,
            password,
            data: metadata.unwrap_or_else(|| serde_json::json!({})),
        };
        let response = self
            .http_client
            .post(self.endpoint("/signup"))
            .header("apikey", &self.anon_key)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(SupabaseError::from)?;

        let response = check_response(response, "Sign-up failed").await?;
        let reply: serde_json::Value = response.json().await.map_err(SupabaseError::from)?;

        // With autoconfirm the reply is a full session, otherwise only the user.
        if reply.get("access_token").is_some() {
            let session: Session = serde_json::from_value(reply)?;
            let session = normalize_session(session);
            info!(user_id = session.user_id().unwrap_or(""), "Sign-up created a session");
            self.store_session(session, AuthEvent::SignedIn);
        } else {
            info!("Sign-up accepted, awaiting email confirmation");
        }
        Ok(())
    }

    async fn sign_in_with_oauth(&self, request: &OAuthRequest) -> AuthResult<Option<String>> {
        let url = self.authorize_url(request)?;
        debug!(provider = %request.provider, "Built OAuth authorize URL");
        Ok(Some(url))
    }

    async fn sign_out(&self) -> AuthResult<()> {
        let Ok(access_token) = self.access_token() else {
            debug!("Sign out without a session");
            return Ok(());
        };

        let result = self
            .http_client
            .post(self.endpoint("/logout"))
            .header("apikey", &self.anon_key)
            .header("Authorization", format!("Bearer {}", access_token))
            .send()
            .await;

        // Local state is dropped even when the server call fails.
        self.clear_session();

        let response = result.map_err(SupabaseError::from)?;
        match response.status() {
            // Already invalid server-side
            StatusCode::UNAUTHORIZED | StatusCode::NOT_FOUND => Ok(()),
            _ => {
                check_response(response, "Sign out failed").await?;
                Ok(())
            }
        }
    }

    fn on_auth_state_change(&self) -> AuthSubscription {
        AuthSubscription::new(self.events.subscribe())
    }
}
