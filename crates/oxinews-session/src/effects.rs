//! Maps what a session flow observed to a state action plus side effects.
//!
//! Planning is pure so every branch can be checked without a runtime; the
//! controller commits the action and hands navigation effects to
//! [`EffectRunner`].

use crate::navigation::{is_auth_route, is_login_or_signup, DASHBOARD_PATH, LOGIN_PATH};
use crate::store::AuthAction;
use crate::{AuthEvent, Router, Session, User};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tracing::debug;

/// What started a session flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Trigger {
    Initialize,
    Event(AuthEvent),
}

/// Result of the lookups a flow performed.
#[derive(Debug, Clone)]
pub enum Observation {
    /// Reading the current session errored.
    SessionLookupFailed,
    /// A session exists but has expired.
    SessionExpired,
    /// The service reported a sign-out.
    SignedOut,
    NoSession,
    /// A session exists but its user could not be fetched.
    UserLookupFailed,
    Established { session: Session, user: User },
}

/// Side effect to perform after the action is committed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    Navigate(String),
    /// Navigate after one frame has rendered.
    NavigateNextFrame(String),
    BeginSignOut,
}

#[derive(Debug, Clone)]
pub struct Plan {
    pub action: Option<AuthAction>,
    pub effects: Vec<Effect>,
}

impl Plan {
    fn commit(action: AuthAction) -> Self {
        Self {
            action: Some(action),
            effects: Vec::new(),
        }
    }

    fn with(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }
}

/// Decide the action and effects for `observation`.
pub fn plan(trigger: &Trigger, observation: Observation, current_path: &str) -> Plan {
    match observation {
        Observation::SessionLookupFailed | Observation::UserLookupFailed => {
            Plan::commit(AuthAction::LookupFailed)
        }
        Observation::SessionExpired => Plan {
            action: None,
            effects: vec![Effect::BeginSignOut],
        },
        Observation::NoSession => Plan::commit(AuthAction::Cleared),
        Observation::SignedOut => {
            let plan = Plan::commit(AuthAction::Cleared);
            if is_auth_route(current_path) {
                plan
            } else {
                plan.with(Effect::NavigateNextFrame(LOGIN_PATH.to_string()))
            }
        }
        Observation::Established { session, user } => {
            let redirect = match trigger {
                Trigger::Initialize => is_login_or_signup(current_path),
                Trigger::Event(event) => *event == AuthEvent::SignedIn,
            };
            let plan = Plan::commit(AuthAction::Established { session, user });
            if redirect {
                plan.with(Effect::Navigate(DASHBOARD_PATH.to_string()))
            } else {
                plan
            }
        }
    }
}

/// Performs navigation effects against the router.
pub struct EffectRunner {
    router: Arc<dyn Router>,
    frame_interval: Duration,
    pending: Mutex<JoinSet<()>>,
}

impl EffectRunner {
    pub fn new(router: Arc<dyn Router>, frame_interval: Duration) -> Self {
        Self {
            router,
            frame_interval,
            pending: Mutex::new(JoinSet::new()),
        }
    }

    /// Perform a navigation effect. Returns false for effects it does not own.
    pub fn perform(&self, effect: &Effect) -> bool {
        match effect {
            Effect::Navigate(path) => {
                debug!(path = %path, "navigating");
                self.router.navigate(path);
                true
            }
            Effect::NavigateNextFrame(path) => {
                let router = Arc::clone(&self.router);
                let delay = self.frame_interval;
                let path = path.clone();
                let mut pending = self.pending.lock();
                while pending.try_join_next().is_some() {}
                pending.spawn(async move {
                    tokio::time::sleep(delay).await;
                    debug!(path = %path, "navigating after frame");
                    router.navigate(&path);
                });
                true
            }
            Effect::BeginSignOut => false,
        }
    }

    /// Cancel navigations that have not fired yet.
    pub fn cancel_pending(&self) {
        self.pending.lock().abort_all();
    }
}
