//! Observable authentication state.
//!
//! Status, session and user live behind one mutex so readers never see a
//! session without its user or an authenticated status without a session.
//! Every committed action bumps a revision and is published on a watch channel.

use crate::auth_fsm::{AuthMachine, AuthMachineInput, AuthStatus};
use crate::expiry::time_until_expiry;
use crate::{AuthError, AuthResult, Session, User};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::debug;

/// State change requested by the controller.
#[derive(Debug, Clone)]
pub enum AuthAction {
    /// Session and user were both fetched successfully.
    Established { session: Session, user: User },
    /// There is no session.
    Cleared,
    /// Session or user lookup errored.
    LookupFailed,
    /// Startup did not settle in time.
    InitTimedOut,
}

impl AuthAction {
    pub fn name(&self) -> &'static str {
        match self {
            AuthAction::Established { .. } => "established",
            AuthAction::Cleared => "cleared",
            AuthAction::LookupFailed => "lookup_failed",
            AuthAction::InitTimedOut => "init_timed_out",
        }
    }

    fn input(&self) -> AuthMachineInput {
        match self {
            AuthAction::Established { .. } => AuthMachineInput::SessionEstablished,
            AuthAction::Cleared => AuthMachineInput::SessionCleared,
            AuthAction::LookupFailed => AuthMachineInput::LookupFailed,
            AuthAction::InitTimedOut => AuthMachineInput::InitTimedOut,
        }
    }
}

/// Consistent copy of the store.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthSnapshot {
    pub status: AuthStatus,
    pub session: Option<Session>,
    pub user: Option<User>,
    /// Number of committed actions.
    pub revision: u64,
}

impl AuthSnapshot {
    fn initial() -> Self {
        Self {
            status: AuthStatus::Loading,
            session: None,
            user: None,
            revision: 0,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.status.is_authenticated()
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user.as_ref().map(|u| u.id.as_str())
    }

    /// Token-free view for printing and logging.
    pub fn summary(&self) -> AuthSummary {
        AuthSummary {
            status: self.status,
            user_id: self.user_id().map(str::to_string),
            email: self.user.as_ref().and_then(|u| u.email.clone()),
            expires_at: self.session.as_ref().and_then(Session::expires_at_utc),
            expires_in_secs: time_until_expiry(self.session.as_ref(), Utc::now())
                .map(|left| left.num_seconds()),
            revision: self.revision,
        }
    }
}

/// Printable snapshot without tokens.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthSummary {
    pub status: AuthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    /// Seconds of validity left, absent once expired.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_in_secs: Option<i64>,
    pub revision: u64,
}

struct StoreState {
    fsm: AuthMachine,
    session: Option<Session>,
    user: Option<User>,
    revision: u64,
}

impl StoreState {
    fn snapshot(&self) -> AuthSnapshot {
        AuthSnapshot {
            status: AuthStatus::from(self.fsm.state()),
            session: self.session.clone(),
            user: self.user.clone(),
            revision: self.revision,
        }
    }
}

/// Holds status, session and user, and publishes every change.
pub struct AuthStore {
    state: Mutex<StoreState>,
    tx: watch::Sender<AuthSnapshot>,
}

impl Default for AuthStore {
    fn default() -> Self {
        Self::new()
    }
}

impl AuthStore {
    /// New store in `loading` with nothing held.
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(AuthSnapshot::initial());
        Self {
            state: Mutex::new(StoreState {
                fsm: AuthMachine::new(),
                session: None,
                user: None,
                revision: 0,
            }),
            tx,
        }
    }

    /// Apply `action` atomically.
    ///
    /// Fails with [`AuthError::InvalidStateTransition`] when the status machine
    /// rejects the action; nothing changes in that case.
    pub fn dispatch(&self, action: AuthAction) -> AuthResult<AuthSnapshot> {
        let mut state = self.state.lock();
        let old_status = AuthStatus::from(state.fsm.state());
        let input = action.input();

        state.fsm.consume(&input).map_err(|_| {
            AuthError::InvalidStateTransition(format!(
                "Cannot apply {:?} in state {:?}",
                input,
                state.fsm.state()
            ))
        })?;

        match action {
            AuthAction::Established { session, user } => {
                state.session = Some(session);
                state.user = Some(user);
            }
            AuthAction::Cleared | AuthAction::LookupFailed | AuthAction::InitTimedOut => {
                state.session = None;
                state.user = None;
            }
        }
        state.revision += 1;

        let snapshot = state.snapshot();
        self.tx.send_replace(snapshot.clone());
        drop(state);

        if old_status != snapshot.status {
            debug!(
                old_status = %old_status,
                new_status = %snapshot.status,
                revision = snapshot.revision,
                "Auth status transition"
            );
        }

        Ok(snapshot)
    }

    pub fn snapshot(&self) -> AuthSnapshot {
        self.state.lock().snapshot()
    }

    pub fn status(&self) -> AuthStatus {
        AuthStatus::from(self.state.lock().fsm.state())
    }

    pub fn revision(&self) -> u64 {
        self.state.lock().revision
    }

    /// Receiver that sees every published snapshot, starting with the current one.
    pub fn subscribe(&self) -> watch::Receiver<AuthSnapshot> {
        self.tx.subscribe()
    }
}
