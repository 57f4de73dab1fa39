//! Authentication error types.

use thiserror::Error;

/// Authentication error type.
#[derive(Error, Debug)]
pub enum AuthError {
    /// Invalid email or password
    #[error("Invalid credentials: {0}")]
    InvalidCredentials(String),

    /// The auth service refused the request (bad input, duplicate sign-up, ...)
    #[error("Request rejected ({status}): {message}")]
    Rejected { status: u16, message: String },

    /// Another credential flow is still running
    #[error("Authentication already in progress")]
    AuthInProgress,

    /// OAuth flow error
    #[error("OAuth error: {0}")]
    OAuth(String),

    /// Token refresh error
    #[error("Token refresh failed: {0}")]
    TokenRefresh(String),

    /// Session not found
    #[error("Not logged in")]
    NotLoggedIn,

    /// Session expired
    #[error("Session expired")]
    SessionExpired,

    /// Session was invalidated server-side (revoked, logged out elsewhere, etc.)
    #[error("Session invalid: {0}")]
    SessionInvalid(String),

    /// Invalid state transition in the auth FSM
    #[error("Invalid auth state transition: {0}")]
    InvalidStateTransition(String),

    /// The auth service failed on its side
    #[error("Auth service error ({status}): {message}")]
    Service { status: u16, message: String },

    /// The auth service could not be reached
    #[error("Network error: {0}")]
    Network(String),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Timeout error
    #[error("Operation timed out")]
    Timeout,

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// The auth store stopped publishing state
    #[error("Auth state channel closed")]
    StateClosed,
}

impl AuthError {
    /// Returns true if this error is transient and the operation can be retried.
    ///
    /// Transient errors include:
    /// - Network failures
    /// - Service errors with 5xx status codes
    /// - Timeouts
    pub fn is_transient(&self) -> bool {
        match self {
            AuthError::Network(_) | AuthError::Timeout => true,
            AuthError::Service { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

/// Result type alias using AuthError.
pub type AuthResult<T> = Result<T, AuthError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_transient_network() {
        assert!(AuthError::Network("connection refused".to_string()).is_transient());
    }

    #[test]
    fn test_is_transient_timeout() {
        assert!(AuthError::Timeout.is_transient());
    }

    #[test]
    fn test_is_transient_server_error_only() {
        let server = AuthError::Service {
            status: 503,
            message: "unavailable".to_string(),
        };
        let client = AuthError::Service {
            status: 429,
            message: "slow down".to_string(),
        };
        assert!(server.is_transient());
        assert!(!client.is_transient());
    }

    #[test]
    fn test_is_not_transient_invalid_credentials() {
        assert!(!AuthError::InvalidCredentials("bad password".to_string()).is_transient());
    }

    #[test]
    fn test_is_not_transient_rejected() {
        let err = AuthError::Rejected {
            status: 422,
            message: "User already registered".to_string(),
        };
        assert!(!err.is_transient());
        assert_eq!(
            err.to_string(),
            "Request rejected (422): User already registered"
        );
    }

    #[test]
    fn test_is_not_transient_session_errors() {
        assert!(!AuthError::NotLoggedIn.is_transient());
        assert!(!AuthError::SessionExpired.is_transient());
        assert!(!AuthError::SessionInvalid("revoked".to_string()).is_transient());
    }

    #[test]
    fn test_state_closed_is_not_transient() {
        assert!(!AuthError::StateClosed.is_transient());
        assert_eq!(AuthError::StateClosed.to_string(), "Auth state channel closed");
    }
}
