//! Behavioural tests for the session controller.
//!
//! - `harness.rs`   - FakeAuth service, fixtures and controller wiring
//! - `startup.rs`   - Startup lookup, expired sessions and the init watchdog
//! - `events.rs`    - Auth change notifications and lock contention
//! - `sign_out.rs`  - Sign-out orchestration and navigation
//! - `actions.rs`   - Credential flows

mod events;
