//! Session lifecycle controller.
//!
//! Owns the auth store and the session lock, runs the startup lookup, reacts
//! to auth service notifications and orchestrates sign-out. Session-mutating
//! flows are serialized through [`StateLock`]: a flow that finds the lock held
//! is skipped rather than queued.

use crate::actions::AuthActions;
use crate::auth_fsm::AuthStatus;
use crate::effects::{plan, Effect, EffectRunner, Observation, Plan, Trigger};
use crate::expiry::is_session_expired;
use crate::lock::{LockGuard, StateLock};
use crate::navigation::{DASHBOARD_PATH, LOGIN_PATH};
use crate::store::{AuthAction, AuthSnapshot, AuthStore};
use crate::{
    AuthChange, AuthError, AuthEvent, AuthResult, AuthService, OAuthProvider, Router, Session,
};
use chrono::Utc;
use oxinews_config::{Config, OAUTH_CALLBACK_PATH};
use parking_lot::Mutex;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error, info, warn};

/// Controller timings and the OAuth callback target.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    pub lock_timeout: Duration,
    pub init_timeout: Duration,
    pub frame_interval: Duration,
    pub settle_delay: Duration,
    /// Absolute URL OAuth providers redirect back to.
    pub oauth_redirect_to: String,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            lock_timeout: Duration::from_secs(5),
            init_timeout: Duration::from_secs(5),
            frame_interval: Duration::from_millis(16),
            settle_delay: Duration::from_millis(50),
            oauth_redirect_to: format!("http://localhost:3000{}", OAUTH_CALLBACK_PATH),
        }
    }
}

impl ControllerConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            lock_timeout: config.timing.lock_timeout(),
            init_timeout: config.timing.init_timeout(),
            frame_interval: config.timing.frame_interval(),
            settle_delay: config.timing.settle_delay(),
            oauth_redirect_to: config.oauth_callback_url(),
        }
    }
}

struct ControllerTasks {
    listener: Option<JoinHandle<()>>,
    watchdog: Option<JoinHandle<()>>,
    handlers: JoinSet<()>,
}

impl ControllerTasks {
    fn new() -> Self {
        Self {
            listener: None,
            watchdog: None,
            handlers: JoinSet::new(),
        }
    }
}

struct Inner {
    auth: Arc<dyn AuthService>,
    router: Arc<dyn Router>,
    store: AuthStore,
    lock: StateLock,
    actions: AuthActions,
    effects: EffectRunner,
    config: ControllerConfig,
    tasks: Mutex<ControllerTasks>,
}

/// Client session controller. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct SessionController {
    inner: Arc<Inner>,
}

impl SessionController {
    pub fn new(
        auth: Arc<dyn AuthService>,
        router: Arc<dyn Router>,
        config: ControllerConfig,
    ) -> Self {
        let actions = AuthActions::new(Arc::clone(&auth), config.oauth_redirect_to.clone());
        let effects = EffectRunner::new(Arc::clone(&router), config.frame_interval);
        Self {
            inner: Arc::new(Inner {
                auth,
                router,
                store: AuthStore::new(),
                lock: StateLock::new(config.lock_timeout),
                actions,
                effects,
                config,
                tasks: Mutex::new(ControllerTasks::new()),
            }),
        }
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.inner.config
    }

    pub fn snapshot(&self) -> AuthSnapshot {
        self.inner.store.snapshot()
    }

    pub fn status(&self) -> AuthStatus {
        self.inner.store.status()
    }

    pub fn subscribe(&self) -> watch::Receiver<AuthSnapshot> {
        self.inner.store.subscribe()
    }

    pub fn store(&self) -> &AuthStore {
        &self.inner.store
    }

    pub fn lock(&self) -> &StateLock {
        &self.inner.lock
    }

    /// Start listening for auth changes, arm the startup watchdog and run the
    /// startup lookup.
    ///
    /// Calling this again while mounted does nothing.
    pub async fn mount(&self) {
        {
            let mut tasks = self.inner.tasks.lock();
            if tasks.listener.is_some() {
                debug!("Session controller already mounted");
                return;
            }
            tasks.listener = Some(self.spawn_listener());
            tasks.watchdog = Some(self.spawn_watchdog());
        }
        info!("Session controller mounted");

        self.initialize().await;

        if self.status().is_settled() {
            if let Some(watchdog) = self.inner.tasks.lock().watchdog.take() {
                watchdog.abort();
            }
        }
    }

    /// Stop listening, disarm the watchdog and drop pending navigations.
    pub fn teardown(&self) {
        let mut tasks = self.inner.tasks.lock();
        if let Some(listener) = tasks.listener.take() {
            listener.abort();
        }
        if let Some(watchdog) = tasks.watchdog.take() {
            watchdog.abort();
        }
        tasks.handlers.abort_all();
        drop(tasks);

        self.inner.effects.cancel_pending();
        info!("Session controller torn down");
    }

    fn spawn_listener(&self) -> JoinHandle<()> {
        let mut subscription = self.inner.auth.on_auth_state_change();
        let weak = Arc::downgrade(&self.inner);
        tokio::spawn(async move {
            while let Some(change) = subscription.recv().await {
                let Some(controller) = upgrade(&weak) else {
                    break;
                };
                // Handlers run concurrently so the lock decides which one wins.
                let handler = controller.clone();
                let mut tasks = controller.inner.tasks.lock();
                while tasks.handlers.try_join_next().is_some() {}
                tasks.handlers.spawn(async move {
                    handler.handle_auth_change(change).await;
                });
            }
            debug!("Auth change listener stopped");
        })
    }

    fn spawn_watchdog(&self) -> JoinHandle<()> {
        let weak = Arc::downgrade(&self.inner);
        let timeout = self.inner.config.init_timeout;
        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            let Some(controller) = upgrade(&weak) else {
                return;
            };
            if controller.status().is_settled() {
                return;
            }
            match controller.inner.store.dispatch(AuthAction::InitTimedOut) {
                Ok(_) => warn!(
                    timeout_ms = timeout.as_millis() as u64,
                    "Session initialization timed out, treating visitor as signed out"
                ),
                Err(e) => debug!(error = %e, "Initialization settled before watchdog fired"),
            }
        })
    }

    /// Look up the current session once and commit the result.
    pub async fn initialize(&self) {
        let Some(guard) = self.inner.lock.try_lock() else {
            debug!("Initialization skipped, a session operation is in flight");
            return;
        };

        let observation = match self.inner.auth.get_session().await {
            Err(e) => {
                warn!(error = %e, "Failed to read session during initialization");
                Observation::SessionLookupFailed
            }
            Ok(Some(session)) if is_session_expired(Some(&session), Utc::now()) => {
                info!("Stored session has expired");
                Observation::SessionExpired
            }
            Ok(Some(session)) => self.observe_user(session).await,
            Ok(None) => Observation::NoSession,
        };

        let plan = plan(
            &Trigger::Initialize,
            observation,
            &self.inner.router.current_path(),
        );
        self.execute(guard, plan).await;
    }

    /// Apply one auth service notification.
    ///
    /// Dropped when another session operation holds the lock.
    pub async fn handle_auth_change(&self, change: AuthChange) {
        let AuthChange { event, session } = change;
        let Some(guard) = self.inner.lock.try_lock() else {
            debug!(event = %event, "Auth event dropped, a session operation is in flight");
            return;
        };
        info!(event = %event, has_session = session.is_some(), "Auth state change");

        let observation = match session {
            Some(session) if is_session_expired(Some(&session), Utc::now()) => {
                info!(event = %event, "Auth event carried an expired session");
                Observation::SessionExpired
            }
            _ if event == AuthEvent::SignedOut => Observation::SignedOut,
            Some(session) => self.observe_user(session).await,
            None => Observation::NoSession,
        };

        let plan = plan(
            &Trigger::Event(event),
            observation,
            &self.inner.router.current_path(),
        );
        self.execute(guard, plan).await;
    }

    async fn observe_user(&self, session: Session) -> Observation {
        match self.inner.auth.get_user().await {
            Ok(user) => Observation::Established { session, user },
            Err(e) => {
                warn!(error = %e, "Failed to fetch user for session");
                Observation::UserLookupFailed
            }
        }
    }

    async fn execute(&self, guard: LockGuard<'_>, plan: Plan) {
        if !guard.is_current() {
            warn!(
                generation = guard.ticket().generation(),
                "Discarding session update from a lock that timed out"
            );
            return;
        }

        if let Some(action) = plan.action {
            let name = action.name();
            match self.inner.store.dispatch(action) {
                Ok(snapshot) => info!(
                    action = name,
                    status = %snapshot.status,
                    user_id = snapshot.user_id().unwrap_or(""),
                    "Session state updated"
                ),
                Err(e) => warn!(action = name, error = %e, "Session state update rejected"),
            }
        }
        drop(guard);

        for effect in &plan.effects {
            if !self.inner.effects.perform(effect) {
                if let Effect::BeginSignOut = effect {
                    self.sign_out().await;
                }
            }
        }
    }

    /// Sign out and return to the login page.
    ///
    /// Skipped when another session operation holds the lock. Otherwise the
    /// visitor always ends up on the login page, even if the service call fails.
    pub async fn sign_out(&self) {
        let Some(guard) = self.inner.lock.try_lock() else {
            info!("Sign out already in progress, skipping");
            return;
        };
        info!("Starting sign out");

        match self.inner.auth.sign_out().await {
            Ok(()) => info!("Sign out successful"),
            Err(e) => error!(error = %e, "Error signing out"),
        }

        if guard.is_current() {
            if let Err(e) = self.inner.store.dispatch(AuthAction::Cleared) {
                warn!(error = %e, "Failed to clear session state");
            }
        } else {
            warn!(
                generation = guard.ticket().generation(),
                "Sign out outlived its lock, leaving state untouched"
            );
        }

        // Let one frame render before leaving the page.
        tokio::time::sleep(self.inner.config.frame_interval + self.inner.config.settle_delay).await;
        self.redirect_to_login();
        drop(guard);
    }

    pub fn redirect_to_login(&self) {
        info!("Redirecting to login");
        self.inner.router.navigate(LOGIN_PATH);
    }

    pub fn redirect_to_dashboard(&self) {
        info!("Redirecting to dashboard");
        self.inner.router.navigate(DASHBOARD_PATH);
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> AuthResult<()> {
        self.inner.actions.sign_in(email, password).await
    }

    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        metadata: Option<serde_json::Value>,
    ) -> AuthResult<()> {
        self.inner.actions.sign_up(email, password, metadata).await
    }

    pub async fn sign_in_with_oauth(&self, provider: OAuthProvider) -> AuthResult<Option<String>> {
        self.inner.actions.sign_in_with_oauth(provider).await
    }

    pub async fn sign_in_with_google(&self) -> AuthResult<Option<String>> {
        self.inner.actions.sign_in_with_google().await
    }

    pub async fn sign_in_with_github(&self) -> AuthResult<Option<String>> {
        self.inner.actions.sign_in_with_github().await
    }

    /// Wait until the status satisfies `predicate` or `timeout` elapses.
    pub async fn wait_for(
        &self,
        timeout: Duration,
        predicate: impl Fn(&AuthSnapshot) -> bool,
    ) -> AuthResult<AuthSnapshot> {
        wait_on(self.subscribe(), timeout, predicate).await
    }
}

/// Wait on `rx` until a published snapshot satisfies `predicate`.
pub(crate) async fn wait_on(
    mut rx: watch::Receiver<AuthSnapshot>,
    timeout: Duration,
    predicate: impl Fn(&AuthSnapshot) -> bool,
) -> AuthResult<AuthSnapshot> {
    let wait = async {
        loop {
            {
                let current = rx.borrow_and_update();
                if predicate(&current) {
                    return Ok(current.clone());
                }
            }
            if rx.changed().await.is_err() {
                return Err(AuthError::StateClosed);
            }
        }
    };
    tokio::time::timeout(timeout, wait)
        .await
        .map_err(|_| AuthError::Timeout)?
}

fn upgrade(weak: &Weak<Inner>) -> Option<SessionController> {
    weak.upgrade().map(|inner| SessionController { inner })
}
