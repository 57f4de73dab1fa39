//! Authentication status machine using rust-fsm.
//!
//! The controller never writes the status directly. Every change goes through
//! one of these inputs so illegal jumps (for example back into `Loading`) are
//! rejected instead of silently applied.
//!
//! ## State Diagram
//!
//! ```text
//!            ┌─────────────────┐
//!            │     Loading     │ (initial)
//!            └───┬─────────┬───┘
//!   SessionEstablished     │ SessionCleared / LookupFailed / InitTimedOut
//!                ▼         ▼
//! ┌─────────────────┐     ┌─────────────────┐
//! │  Authenticated  │ ◄─► │ Unauthenticated │
//! └─────────────────┘     └─────────────────┘
//!     SessionEstablished / SessionCleared / LookupFailed
//! ```

use rust_fsm::*;
use serde::{Deserialize, Serialize};
use std::fmt;

// Generates `auth_machine::{State, Input, StateMachine}`.
state_machine! {
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub auth_machine(Loading)

    Loading => {
        SessionEstablished => Authenticated,
        SessionCleared => Unauthenticated,
        LookupFailed => Unauthenticated,
        // Startup watchdog fired before any lookup settled
        InitTimedOut => Unauthenticated
    },
    Authenticated => {
        // Token refresh or profile update
        SessionEstablished => Authenticated,
        SessionCleared => Unauthenticated,
        LookupFailed => Unauthenticated
    },
    Unauthenticated => {
        SessionEstablished => Authenticated,
        SessionCleared => Unauthenticated,
        LookupFailed => Unauthenticated
    }
}

pub use auth_machine::Input as AuthMachineInput;
pub use auth_machine::State as AuthMachineState;
pub use auth_machine::StateMachine as AuthMachine;

/// Externally visible authentication status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthStatus {
    /// Startup lookup has not settled yet.
    Loading,
    /// A valid session and its user are held.
    Authenticated,
    /// No usable session.
    Unauthenticated,
}

impl AuthStatus {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, AuthStatus::Authenticated)
    }

    /// Returns true once the startup lookup has produced an answer.
    pub fn is_settled(&self) -> bool {
        !matches!(self, AuthStatus::Loading)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AuthStatus::Loading => "loading",
            AuthStatus::Authenticated => "authenticated",
            AuthStatus::Unauthenticated => "unauthenticated",
        }
    }
}

impl fmt::Display for AuthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&AuthMachineState> for AuthStatus {
    fn from(state: &AuthMachineState) -> Self {
        match state {
            AuthMachineState::Loading => AuthStatus::Loading,
            AuthMachineState::Authenticated => AuthStatus::Authenticated,
            AuthMachineState::Unauthenticated => AuthStatus::Unauthenticated,
        }
    }
}
