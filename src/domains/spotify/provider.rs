//! Process-wide cached API client.
//!
//! The provider hands out one shared client until it is explicitly
//! invalidated. There is no freshness check and no reset on error: a stale
//! token keeps being used until an auth action calls [`ClientProvider::invalidate`].

use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, info};

use super::api::SpotifyApi;
use super::credentials::{CredentialStore, Credentials};
use super::error::SpotifyError;
use super::web_api::WebApiClient;

/// Source of the API client used by the executors.
pub trait ClientProvider: Send + Sync {
    /// Return the cached client, building it from stored credentials if needed.
    fn get(&self) -> Result<Arc<dyn SpotifyApi>, SpotifyError>;

    /// Drop the cached client so the next `get` reloads credentials.
    fn invalidate(&self);
}

/// Builds a client from resolved credentials.
pub type ClientFactory = Box<dyn Fn(&Credentials) -> Arc<dyn SpotifyApi> + Send + Sync>;

/// [`ClientProvider`] backed by the credential store.
pub struct CachedClientProvider {
    store: Arc<CredentialStore>,
    factory: ClientFactory,
    cached: Mutex<Option<Arc<dyn SpotifyApi>>>,
}

impl CachedClientProvider {
    /// Create a provider with a custom client factory.
    pub fn new(store: Arc<CredentialStore>, factory: ClientFactory) -> Self {
        Self {
            store,
            factory,
            cached: Mutex::new(None),
        }
    }

    /// Create a provider that builds [`WebApiClient`]s.
    /// Refreshed sessions are written back to `store`.
    pub fn web(store: Arc<CredentialStore>) -> Self {
        let persist = store.clone();
        Self::new(
            store,
            Box::new(move |credentials: &Credentials| -> Arc<dyn SpotifyApi> {
                Arc::new(WebApiClient::from_credentials(credentials).persisting_to(persist.clone()))
            }),
        )
    }
}

impl ClientProvider for CachedClientProvider {
    fn get(&self) -> Result<Arc<dyn SpotifyApi>, SpotifyError> {
        // Held across check-then-create so concurrent callers build one client.
        let mut cached = self.cached.lock();
        if let Some(client) = cached.as_ref() {
            return Ok(client.clone());
        }

        let credentials = self.store.load()?;
        debug!("Building Spotify client for {}", credentials.masked_client_id());
        let client = (self.factory)(&credentials);
        *cached = Some(client.clone());
        Ok(client)
    }

    fn invalidate(&self) {
        if self.cached.lock().take().is_some() {
            info!("Spotify client invalidated");
        }
    }
}
