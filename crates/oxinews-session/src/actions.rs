//! Credential flows exposed to sign-in and sign-up forms.
//!
//! These only talk to the auth service. Any resulting state change arrives
//! through the service's change stream and is applied by the controller.
//! One credential flow runs at a time; a second caller gets
//! [`AuthError::AuthInProgress`].

use crate::{AuthError, AuthResult, AuthService, OAuthProvider, OAuthRequest};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

pub struct AuthActions {
    auth: Arc<dyn AuthService>,
    oauth_redirect_to: String,
    authenticating: AtomicBool,
}

/// Clears the in-flight flag on drop.
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl AuthActions {
    /// `oauth_redirect_to` is the absolute callback URL providers return to.
    pub fn new(auth: Arc<dyn AuthService>, oauth_redirect_to: impl Into<String>) -> Self {
        Self {
            auth,
            oauth_redirect_to: oauth_redirect_to.into(),
            authenticating: AtomicBool::new(false),
        }
    }

    /// Returns true while a credential flow is running.
    pub fn is_authenticating(&self) -> bool {
        self.authenticating.load(Ordering::Acquire)
    }

    fn begin(&self) -> AuthResult<InFlight<'_>> {
        self.authenticating
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| InFlight(&self.authenticating))
            .map_err(|_| AuthError::AuthInProgress)
    }

    pub fn oauth_redirect_to(&self) -> &str {
        &self.oauth_redirect_to
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> AuthResult<()> {
        let _in_flight = self.begin()?;
        match self.auth.sign_in_with_password(email, password).await {
            Ok(()) => {
                info!("Password sign-in accepted");
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "Password sign-in failed");
                Err(e)
            }
        }
    }

    /// Register an account. `metadata` is stored as profile data, e.g. `full_name`.
    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        metadata: Option<serde_json::Value>,
    ) -> AuthResult<()> {
        let _in_flight = self.begin()?;
        match self.auth.sign_up(email, password, metadata).await {
            Ok(()) => {
                info!("Sign-up accepted");
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "Sign-up failed");
                Err(e)
            }
        }
    }

    /// Build the OAuth request for `provider`.
    ///
    /// Google always shows its account chooser.
    pub fn oauth_request(&self, provider: OAuthProvider) -> OAuthRequest {
        let mut query_params = BTreeMap::new();
        if provider == OAuthProvider::Google {
            query_params.insert("prompt".to_string(), "select_account".to_string());
        }
        OAuthRequest {
            provider,
            redirect_to: self.oauth_redirect_to.clone(),
            query_params,
        }
    }

    /// Start an OAuth sign-in. Returns the provider URL to open, if any.
    pub async fn sign_in_with_oauth(&self, provider: OAuthProvider) -> AuthResult<Option<String>> {
        let _in_flight = self.begin()?;
        let request = self.oauth_request(provider);
        match self.auth.sign_in_with_oauth(&request).await {
            Ok(url) => {
                info!(provider = %provider, redirect_to = %request.redirect_to, "OAuth sign-in started");
                Ok(url)
            }
            Err(e) => {
                warn!(provider = %provider, error = %e, "OAuth sign-in failed");
                Err(e)
            }
        }
    }

    pub async fn sign_in_with_google(&self) -> AuthResult<Option<String>> {
        self.sign_in_with_oauth(OAuthProvider::Google).await
    }

    pub async fn sign_in_with_github(&self) -> AuthResult<Option<String>> {
        self.sign_in_with_oauth(OAuthProvider::Github).await
    }
}
