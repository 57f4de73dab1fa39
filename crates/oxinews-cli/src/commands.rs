//! Command handlers.
//!
//! Each command builds a fresh controller over the Supabase client, mounts
//! it, performs its action and reports the settled state as JSON. Sessions
//! live in memory, so state does not carry over between invocations.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use chrono::Utc;
use oxinews_config::Config;
use oxinews_session::{
    AuthSnapshot, AuthStatus, ControllerConfig, MemoryRouter, OAuthProvider, RouteGuard, Router,
    SessionController,
};
use serde_json::{json, Value};
use supabase_auth::SupabaseAuthClient;
use tracing::info;

/// Upper bound on waiting for the controller to react to a change.
const SETTLE_TIMEOUT: Duration = Duration::from_secs(10);

pub struct App {
    config: ControllerConfig,
    supabase_url: String,
    anon_key: String,
}

struct Mounted {
    client: Arc<SupabaseAuthClient>,
    router: Arc<MemoryRouter>,
    controller: SessionController,
}

impl Mounted {
    fn report(&self, snapshot: &AuthSnapshot) -> Value {
        json!({
            "auth": snapshot.summary(),
            "path": self.router.current_path(),
            "navigations": self.router.history(),
        })
    }
}

impl Drop for Mounted {
    fn drop(&mut self) {
        self.controller.teardown();
    }
}

impl App {
    pub fn new(config: &Config) -> Self {
        Self {
            config: ControllerConfig::from_config(config),
            supabase_url: config.supabase_url.clone(),
            anon_key: config.supabase_anon_key.clone(),
        }
    }

    async fn mount(&self, path: &str) -> Mounted {
        let client = Arc::new(SupabaseAuthClient::new(&self.supabase_url, self.anon_key.clone()));
        let router = Arc::new(MemoryRouter::new(path));
        let controller = SessionController::new(client.clone(), router.clone(), self.config.clone());
        controller.mount().await;
        info!(path, status = %controller.status(), "Controller mounted");
        Mounted {
            client,
            router,
            controller,
        }
    }

    async fn signed_in(&self, path: &str, email: &str, password: &str) -> anyhow::Result<Mounted> {
        let mounted = self.mount(path).await;
        mounted
            .controller
            .sign_in(email, password)
            .await
            .context("sign-in failed")?;
        mounted
            .controller
            .wait_for(SETTLE_TIMEOUT, AuthSnapshot::is_authenticated)
            .await
            .context("session was not established")?;
        Ok(mounted)
    }

    pub async fn status(&self, path: &str) -> anyhow::Result<Value> {
        let mounted = self.mount(path).await;
        Ok(mounted.report(&mounted.controller.snapshot()))
    }

    pub async fn login(
        &self,
        email: &str,
        password: &str,
        path: &str,
        sign_out: bool,
    ) -> anyhow::Result<Value> {
        let mounted = self.signed_in(path, email, password).await?;
        if sign_out {
            mounted.controller.sign_out().await;
        }
        Ok(mounted.report(&mounted.controller.snapshot()))
    }

    pub async fn signup(
        &self,
        email: &str,
        password: &str,
        name: Option<String>,
    ) -> anyhow::Result<Value> {
        let mounted = self.mount("/signup").await;
        let metadata = name.map(|full_name| json!({ "full_name": full_name }));
        mounted
            .controller
            .sign_up(email, password, metadata)
            .await
            .context("sign-up failed")?;

        // Projects with email confirmation reply without a session.
        let confirmed = mounted.client.current_session().is_some();
        let snapshot = if confirmed {
            mounted
                .controller
                .wait_for(SETTLE_TIMEOUT, AuthSnapshot::is_authenticated)
                .await?
        } else {
            mounted.controller.snapshot()
        };

        let mut report = mounted.report(&snapshot);
        report["confirmation_required"] = json!(!confirmed);
        Ok(report)
    }

    pub async fn oauth(&self, provider: OAuthProvider) -> anyhow::Result<Value> {
        let mounted = self.mount("/login").await;
        let url = mounted
            .controller
            .sign_in_with_oauth(provider)
            .await
            .context("OAuth sign-in failed")?;
        Ok(json!({
            "provider": provider,
            "redirect_to": self.config.oauth_redirect_to,
            "url": url,
        }))
    }

    pub async fn logout(&self, credentials: Option<(&str, &str)>) -> anyhow::Result<Value> {
        let mounted = match credentials {
            Some((email, password)) => self.signed_in("/dashboard", email, password).await?,
            None => self.mount("/dashboard").await,
        };
        mounted.controller.sign_out().await;
        let snapshot = mounted
            .controller
            .wait_for(SETTLE_TIMEOUT, |s| s.status == AuthStatus::Unauthenticated)
            .await?;
        Ok(mounted.report(&snapshot))
    }

    pub async fn guard(
        &self,
        path: &str,
        credentials: Option<(&str, &str)>,
    ) -> anyhow::Result<Value> {
        let mounted = match credentials {
            Some((email, password)) => self.signed_in("/login", email, password).await?,
            None => self.mount("/login").await,
        };
        let session = mounted.client.current_session();
        let decision = RouteGuard::default().evaluate(path, session.as_ref(), Utc::now());
        Ok(json!({
            "path": path,
            "signed_in": session.is_some(),
            "decision": decision,
            "location": decision.location(),
        }))
    }
}
