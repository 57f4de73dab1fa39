//! Supabase GoTrue client for OxiNews.
//!
//! [`SupabaseAuthClient`] implements [`oxinews_session::AuthService`] over the
//! hosted `/auth/v1` REST API.

mod client;
mod error;

pub use client::SupabaseAuthClient;
pub use error::{SupabaseError, SupabaseResult};

#[cfg(test)]
mod tests;
