//! Supabase client errors and their mapping onto [`AuthError`].

use oxinews_session::AuthError;
use serde::Deserialize;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use thiserror::Error;

/// Length plus digest of a response body. Bodies may echo credentials, so
/// they are never logged verbatim.
pub(crate) fn summarize_response_body(body: &str) -> String {
    let mut hasher = DefaultHasher::new();
    body.hash(&mut hasher);
    format!("len={},digest={:016x}", body.len(), hasher.finish())
}

#[derive(Error, Debug)]
pub enum SupabaseError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Non-2xx reply from the auth API.
    #[error("Auth API error ({status}): {message}")]
    Api {
        status: u16,
        code: Option<String>,
        message: String,
        body_summary: String,
    },

    #[error("No session")]
    NoSession,
}

pub type SupabaseResult<T> = Result<T, SupabaseError>;

/// Error body shapes returned by GoTrue across versions.
#[derive(Debug, Default, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    error_code: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

impl SupabaseError {
    /// Build an API error from a status and raw body.
    pub(crate) fn from_response(status: reqwest::StatusCode, body: &str) -> Self {
        let parsed: ApiErrorBody = serde_json::from_str(body).unwrap_or_default();
        let message = parsed
            .error_description
            .or(parsed.msg)
            .or(parsed.message)
            .unwrap_or_else(|| {
                status
                    .canonical_reason()
                    .unwrap_or("unknown error")
                    .to_string()
            });
        SupabaseError::Api {
            status: status.as_u16(),
            code: parsed.error_code.or(parsed.error),
            message,
            body_summary: summarize_response_body(body),
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            SupabaseError::Api { status, .. } => Some(*status),
            SupabaseError::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

impl From<SupabaseError> for AuthError {
    fn from(err: SupabaseError) -> Self {
        match err {
            SupabaseError::Http(e) if e.is_timeout() => AuthError::Timeout,
            SupabaseError::Http(e) => match e.status() {
                Some(status) => AuthError::Service {
                    status: status.as_u16(),
                    message: e.to_string(),
                },
                None => AuthError::Network(e.to_string()),
            },
            SupabaseError::Json(e) => AuthError::Json(e),
            SupabaseError::InvalidUrl(e) => AuthError::Config(e.to_string()),
            SupabaseError::Api {
                status, message, ..
            } => match status {
                401 | 403 => AuthError::SessionInvalid(message),
                s if s >= 500 => AuthError::Service { status, message },
                _ => AuthError::Rejected { status, message },
            },
            SupabaseError::NoSession => AuthError::NotLoggedIn,
        }
    }
}
