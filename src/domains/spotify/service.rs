//! Spotify application context shared by the tools.

use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use super::credentials::{CredentialStore, Credentials, CredentialsPatch};
use super::error::SpotifyError;
use super::executor::RequestExecutor;
use super::oauth;
use super::provider::{CachedClientProvider, ClientProvider};
use crate::core::config::{DEFAULT_REDIRECT_URI, SpotifyConfig};

/// Owns the credential store, the client provider and the executor.
///
/// Every operation that changes persisted tokens invalidates the provider so
/// the next call builds a client from the new record.
pub struct SpotifyService {
    store: Arc<CredentialStore>,
    executor: RequestExecutor,
    http: reqwest::Client,
    auth_timeout: Duration,
}

impl SpotifyService {
    /// Build the production service from configuration.
    pub fn new(config: &SpotifyConfig) -> Self {
        let store = Arc::new(CredentialStore::from_config(config));
        let provider = Arc::new(CachedClientProvider::web(store.clone()));
        Self::with_provider(
            store,
            provider,
            Duration::from_secs(config.auth_timeout_secs),
        )
    }

    /// Build a service around an explicit provider.
    pub fn with_provider(
        store: Arc<CredentialStore>,
        provider: Arc<dyn ClientProvider>,
        auth_timeout: Duration,
    ) -> Self {
        Self {
            store,
            executor: RequestExecutor::new(provider),
            http: reqwest::Client::new(),
            auth_timeout,
        }
    }

    pub fn store(&self) -> &CredentialStore {
        &self.store
    }

    pub fn executor(&self) -> &RequestExecutor {
        &self.executor
    }

    pub fn provider(&self) -> &Arc<dyn ClientProvider> {
        self.executor.provider()
    }

    /// Store a new client identity. Existing tokens belong to the old
    /// identity and are cleared.
    ///
    /// Returns the redirect URI that was stored.
    pub fn configure(
        &self,
        client_id: &str,
        client_secret: &str,
        redirect_uri: Option<&str>,
    ) -> Result<String, SpotifyError> {
        let redirect_uri = redirect_uri
            .filter(|uri| !uri.is_empty())
            .unwrap_or(DEFAULT_REDIRECT_URI)
            .to_string();
        self.store.save(
            CredentialsPatch::new()
                .identity(client_id, client_secret, redirect_uri.clone())
                .clear_tokens(),
        )?;
        self.provider().invalidate();
        info!("Stored Spotify client identity");
        Ok(redirect_uri)
    }

    /// Forget the user session, keeping the client identity.
    pub fn logout(&self) -> Result<(), SpotifyError> {
        self.store.save(CredentialsPatch::new().clear_tokens())?;
        self.provider().invalidate();
        info!("Cleared Spotify session tokens");
        Ok(())
    }

    /// Authorize URL for the stored identity.
    pub fn authorize_url(&self) -> Result<(Credentials, String), SpotifyError> {
        let credentials = self.store.load()?;
        let url = oauth::authorize_url(&credentials.client_id, &credentials.redirect_uri, None)?;
        Ok((credentials, url))
    }

    /// Run the interactive authorization flow and persist the new session.
    pub async fn authorize(&self) -> Result<(), SpotifyError> {
        let credentials = self.store.load()?;
        let tokens =
            oauth::authorize_interactive(&self.http, &credentials, self.auth_timeout).await?;
        self.store_session(tokens.access_token, tokens.refresh_token)
    }

    fn store_session(
        &self,
        access_token: String,
        refresh_token: Option<String>,
    ) -> Result<(), SpotifyError> {
        let refresh_token = refresh_token
            .ok_or_else(|| SpotifyError::auth("Token response did not include a refresh token"))?;
        self.store
            .save(CredentialsPatch::new().tokens(access_token, refresh_token))?;
        self.provider().invalidate();
        info!("Stored new Spotify session");
        Ok(())
    }
}
