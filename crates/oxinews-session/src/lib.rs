//! Client session lifecycle for OxiNews.
//!
//! This crate provides:
//! - An observable auth store (status, session, user) driven by an explicit FSM
//! - A non-blocking session lock with an automatic release deadline
//! - Startup session lookup with a watchdog against hung lookups
//! - Reaction to auth service change notifications
//! - Sign-out orchestration and post-auth navigation
//! - Credential actions (password, sign-up, OAuth)
//! - A request-time route guard

pub mod actions;
mod auth_fsm;
pub mod controller;
mod error;
pub mod effects;
pub mod expiry;
pub mod lock;
pub mod navigation;
mod router;
mod service;
pub mod store;

pub use actions::AuthActions;
pub use auth_fsm::auth_machine;
pub use auth_fsm::{AuthMachine, AuthMachineInput, AuthMachineState, AuthStatus};
pub use controller::{ControllerConfig, SessionController};
pub use error::{AuthError, AuthResult};
pub use expiry::{is_session_expired, time_until_expiry};
pub use lock::{LockGuard, LockTicket, StateLock};
pub use navigation::{GuardDecision, RouteGuard};
pub use router::MemoryRouter;
pub use service::{
    AuthChange, AuthEvent, AuthService, AuthSubscription, Identity, OAuthProvider, OAuthRequest,
    Router, Session, User,
};
pub use store::{AuthAction, AuthSnapshot, AuthStore, AuthSummary};

#[cfg(test)]
mod tests;
