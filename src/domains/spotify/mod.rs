//! Spotify domain.
//!
//! - `credentials.rs` - persisted client identity and session tokens
//! - `provider.rs` - cached API client, rebuilt only after invalidation
//! - `executor.rs` - request executors (artifact suppression, player outcomes)
//! - `classify.rs` - failure classification table
//! - `api.rs` / `web_api.rs` - remote API trait and its `reqwest` client
//! - `oauth.rs` - authorization-code flow with a local callback server
//! - `service.rs` - application context shared by the tools

pub mod api;
pub mod classify;
pub mod credentials;
mod error;
pub mod executor;
pub mod models;
pub mod oauth;
pub mod provider;
mod service;
pub mod web_api;

#[cfg(test)]
pub(crate) mod testing;

pub use api::SpotifyApi;
pub use credentials::{CredentialStore, Credentials, CredentialsPatch};
pub use error::{ApiError, ApiResult, SpotifyError};
pub use executor::{PlayerOutcome, RequestExecutor};
pub use provider::{CachedClientProvider, ClientProvider};
pub use service::SpotifyService;
