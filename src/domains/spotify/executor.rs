//! Request executors.
//!
//! Every remote call made by the tools goes through one of two entry points:
//!
//! - [`RequestExecutor::run`] returns the call's data, swallows response
//!   decoding artifacts (the change was applied, only the body was odd) and
//!   propagates every other failure unchanged.
//! - [`RequestExecutor::run_player`] applies the same artifact rule first and
//!   then classifies the failure into guidance text. Remote failures never
//!   escape as errors from this path.
//!
//! Both only fail outright when no client can be built (missing credentials).

use std::future::Future;
use std::sync::Arc;
use tracing::{debug, warn};

use super::api::SpotifyApi;
use super::classify::{is_parse_artifact, player_failure_message};
use super::error::{ApiResult, SpotifyError};
use super::provider::ClientProvider;

/// Result of a player call.
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerOutcome<T> {
    /// The call succeeded. `None` when only the response body failed to decode.
    Done(Option<T>),
    /// The call failed; carries the guidance message.
    Failed(String),
}

/// Runs remote calls against the provider's current client.
#[derive(Clone)]
pub struct RequestExecutor {
    provider: Arc<dyn ClientProvider>,
}

impl RequestExecutor {
    pub fn new(provider: Arc<dyn ClientProvider>) -> Self {
        Self { provider }
    }

    pub fn provider(&self) -> &Arc<dyn ClientProvider> {
        &self.provider
    }

    /// Run a single call.
    ///
    /// Returns `Ok(None)` when the failure was a decoding artifact.
    ///
    /// # Errors
    ///
    /// Configuration errors from the provider and every other remote failure.
    pub async fn run<T, F, Fut>(&self, call: F) -> Result<Option<T>, SpotifyError>
    where
        F: FnOnce(Arc<dyn SpotifyApi>) -> Fut,
        Fut: Future<Output = ApiResult<T>>,
    {
        let client = self.provider.get()?;
        match call(client).await {
            Ok(data) => Ok(Some(data)),
            Err(e) if is_parse_artifact(e.message()) => {
                debug!("Ignoring response decoding artifact: {}", e);
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Run a playback-control call and classify any failure.
    ///
    /// # Errors
    ///
    /// Only configuration errors from the provider.
    pub async fn run_player<T, F, Fut>(
        &self,
        action: &str,
        call: F,
    ) -> Result<PlayerOutcome<T>, SpotifyError>
    where
        F: FnOnce(Arc<dyn SpotifyApi>) -> Fut,
        Fut: Future<Output = ApiResult<T>>,
    {
        let client = self.provider.get()?;
        match call(client).await {
            Ok(data) => Ok(PlayerOutcome::Done(Some(data))),
            Err(e) if is_parse_artifact(e.message()) => {
                debug!("Ignoring response decoding artifact in {}: {}", action, e);
                Ok(PlayerOutcome::Done(None))
            }
            Err(e) => {
                warn!(action, status = ?e.status(), "Player call failed: {}", e);
                Ok(PlayerOutcome::Failed(player_failure_message(
                    action,
                    e.message(),
                )))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::spotify::error::ApiError;
    use crate::domains::spotify::testing::{FakeSpotify, FixedProvider, UnconfiguredProvider};

    fn executor_failing_with(message: &str) -> RequestExecutor {
        let fake = Arc::new(FakeSpotify::new());
        fake.fail_with(message);
        RequestExecutor::new(Arc::new(FixedProvider::new(fake)))
    }

    #[tokio::test]
    async fn test_run_returns_data() {
        let executor = RequestExecutor::new(Arc::new(FixedProvider::new(Arc::new(
            FakeSpotify::new(),
        ))));
        let profile = executor
            .run(|api| async move { api.current_user().await })
            .await
            .unwrap();
        assert_eq!(profile.map(|p| p.id), Some("user1".to_string()));
    }

    #[tokio::test]
    async fn test_run_swallows_parse_artifacts() {
        for message in [
            "Unexpected token < in JSON at position 0",
            "Unexpected non-whitespace character after JSON at position 2",
            "Exponent part is missing a number in JSON",
        ] {
            let executor = executor_failing_with(message);
            let result = executor
                .run(|api| async move { api.pause(None).await })
                .await
                .unwrap();
            assert_eq!(result, None, "{message}");
        }
    }

    #[tokio::test]
    async fn test_run_propagates_other_errors_unchanged() {
        let executor = executor_failing_with("500 Internal Server Error: boom");
        let err = executor
            .run(|api| async move { api.pause(None).await })
            .await
            .unwrap_err();
        match err {
            SpotifyError::Api(api) => {
                assert_eq!(api, ApiError::new("500 Internal Server Error: boom"))
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_run_player_classifies_failures() {
        let cases = [
            ("Player command failed: No active device found", "📵"),
            ("Restriction violated", "⭐"),
            ("404 Not Found", "❌ Resource not found for next"),
            ("401 Unauthorized", "🔐"),
            ("socket closed", "❌ Error in next: socket closed"),
        ];
        for (message, expected) in cases {
            let executor = executor_failing_with(message);
            let outcome = executor
                .run_player("next", |api| async move { api.next_track(None).await })
                .await
                .unwrap();
            match outcome {
                PlayerOutcome::Failed(text) => assert!(text.starts_with(expected), "{text}"),
                PlayerOutcome::Done(_) => panic!("expected failure for {message}"),
            }
        }
    }

    #[tokio::test]
    async fn test_run_player_artifact_is_success() {
        let executor = executor_failing_with("Unexpected token E in JSON at position 0");
        let outcome = executor
            .run_player("pause", |api| async move { api.pause(None).await })
            .await
            .unwrap();
        assert_eq!(outcome, PlayerOutcome::Done(None));
    }

    #[tokio::test]
    async fn test_configuration_error_is_raised() {
        let executor = RequestExecutor::new(Arc::new(UnconfiguredProvider));
        let err = executor
            .run_player("play", |api| async move { api.pause(None).await })
            .await
            .unwrap_err();
        assert!(err.is_configuration());
    }
}
