//! Session expiry checks.

use crate::Session;
use chrono::{DateTime, Duration, Utc};

/// Returns true when there is no usable session at `now`.
///
/// A missing session, a session without an expiry, and a session whose expiry
/// is at or before `now` all count as expired.
pub fn is_session_expired(session: Option<&Session>, now: DateTime<Utc>) -> bool {
    match session.and_then(Session::expires_at_utc) {
        Some(expires_at) => expires_at <= now,
        None => true,
    }
}

/// Time left before `session` expires, `None` if it already has.
pub fn time_until_expiry(session: Option<&Session>, now: DateTime<Utc>) -> Option<Duration> {
    if is_session_expired(session, now) {
        return None;
    }
    session
        .and_then(Session::expires_at_utc)
        .map(|expires_at| expires_at - now)
}
