//! Spotify authentication tool.
//!
//! Manages the stored client identity and the user session. Every action that
//! changes persisted tokens goes through [`SpotifyService`], which invalidates
//! the cached client.

use futures::FutureExt;
use rmcp::{
    ErrorData as McpError,
    handler::server::tool::{ToolCallContext, ToolRoute, cached_schema_for_type},
    model::{CallToolResult, Tool},
};
use schemars::JsonSchema;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, instrument, warn};

use super::common::{error_result, non_empty, text_result};
use crate::domains::spotify::credentials::mask;
use crate::domains::spotify::{SpotifyError, SpotifyService};
use crate::domains::tools::ToolError;

const NOT_CONFIGURED: &str = "❌ Credentials not configured! Use accion=\"configurar\" first.";

/// Authentication actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, JsonSchema)]
pub enum AuthAction {
    /// Store client id and secret.
    #[serde(rename = "configurar")]
    Configure,
    /// Report credential and session status.
    #[serde(rename = "verificar")]
    Verify,
    /// Open the authorization page in the browser.
    #[serde(rename = "iniciar")]
    Start,
    /// Run the whole authorization flow.
    #[serde(rename = "ejecutar")]
    Run,
    /// Return the authorization URL.
    #[serde(rename = "urlAuth")]
    AuthUrl,
    /// Forget the user session.
    #[serde(rename = "cerrar")]
    Logout,
}

impl AuthAction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Configure => "configurar",
            Self::Verify => "verificar",
            Self::Start => "iniciar",
            Self::Run => "ejecutar",
            Self::AuthUrl => "urlAuth",
            Self::Logout => "cerrar",
        }
    }
}

/// Parameters for the authentication tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct SpotifyAuthParams {
    #[schemars(
        description = "configurar = save credentials, verificar = show status, iniciar = open browser, ejecutar = complete OAuth, urlAuth = get URL, cerrar = logout"
    )]
    pub accion: AuthAction,

    #[schemars(description = "Client ID (configurar only)")]
    #[serde(default, rename = "clientId")]
    pub client_id: Option<String>,

    #[schemars(description = "Client Secret (configurar only)")]
    #[serde(default, rename = "clientSecret")]
    pub client_secret: Option<String>,

    #[schemars(
        description = "Redirect URI (configurar only, default: http://127.0.0.1:8000/callback)"
    )]
    #[serde(default, rename = "redirectUri")]
    pub redirect_uri: Option<String>,
}

impl SpotifyAuthParams {
    pub fn new(accion: AuthAction) -> Self {
        Self {
            accion,
            client_id: None,
            client_secret: None,
            redirect_uri: None,
        }
    }
}

/// Spotify authentication tool.
#[derive(Debug, Clone)]
pub struct SpotifyAuthTool;

impl SpotifyAuthTool {
    /// Tool name as registered in MCP.
    pub const NAME: &'static str = "spotifyAuth";

    /// Tool description shown to clients.
    pub const DESCRIPTION: &'static str = "Manages Spotify authentication: configure credentials (configurar), check status (verificar), open the browser (iniciar), run the full OAuth flow (ejecutar), get the authorization URL (urlAuth), log out (cerrar).";

    /// Execute one authentication action.
    #[instrument(skip_all, fields(accion = params.accion.as_str()))]
    pub async fn execute(
        params: SpotifyAuthParams,
        service: &SpotifyService,
    ) -> Result<CallToolResult, ToolError> {
        info!("spotifyAuth: {}", params.accion.as_str());

        match params.accion {
            AuthAction::Configure => {
                let (Some(client_id), Some(client_secret)) = (
                    non_empty(&params.client_id),
                    non_empty(&params.client_secret),
                ) else {
                    return Ok(error_result("❌ clientId and clientSecret are required"));
                };
                let redirect_uri =
                    service.configure(client_id, client_secret, non_empty(&params.redirect_uri))?;
                Ok(text_result(format!(
                    "✓ Credentials saved!\n\nClient ID: {}\nRedirect URI: {}\n\nUse accion=\"ejecutar\" to connect.",
                    mask(client_id),
                    redirect_uri
                )))
            }

            AuthAction::Verify => {
                let credentials = match service.store().load() {
                    Ok(credentials) => credentials,
                    Err(e) if e.is_configuration() => {
                        return Ok(text_result(
                            "# Authentication Status\n\n❌ **Credentials**: Not configured\n\nUse accion=\"configurar\" with clientId and clientSecret.",
                        ));
                    }
                    Err(e) => return Err(e.into()),
                };
                let session = if credentials.has_session() {
                    "✓ **Session**: Connected".to_string()
                } else {
                    "❌ **Session**: Not connected\n\nUse accion=\"ejecutar\" to connect."
                        .to_string()
                };
                Ok(text_result(format!(
                    "# Authentication Status\n\n✓ **Credentials**: Configured\n  - Client ID: {}\n  - Redirect URI: {}\n\n{}",
                    credentials.masked_client_id(),
                    credentials.redirect_uri,
                    session
                )))
            }

            AuthAction::Start => {
                let url = match service.authorize_url() {
                    Ok((_, url)) => url,
                    Err(e) if e.is_configuration() => return Ok(error_result(NOT_CONFIGURED)),
                    Err(e) => return Err(e.into()),
                };
                let target = url.clone();
                let opened = tokio::task::spawn_blocking(move || open::that(&target))
                    .await
                    .map_err(|e| ToolError::execution_failed(format!("Launcher task failed: {}", e)))?;
                if let Err(e) = opened {
                    warn!("Could not open browser: {}", e);
                }
                Ok(text_result(format!(
                    "🌐 Opening browser...\n\nIf it doesn't open, visit:\n{}\n\nThen use accion=\"ejecutar\"",
                    url
                )))
            }

            AuthAction::Run => match service.authorize().await {
                Ok(()) => Ok(text_result("✅ Authentication complete!")),
                Err(e) if e.is_configuration() => Ok(error_result(NOT_CONFIGURED)),
                Err(SpotifyError::Auth(reason)) => {
                    Ok(error_result(&format!("❌ Authentication failed: {}", reason)))
                }
                Err(e) => Err(e.into()),
            },

            AuthAction::AuthUrl => match service.authorize_url() {
                Ok((_, url)) => Ok(text_result(format!("# Authorization URL\n\n{}", url))),
                Err(e) if e.is_configuration() => Ok(error_result(NOT_CONFIGURED)),
                Err(e) => Err(e.into()),
            },

            AuthAction::Logout => {
                service.logout()?;
                Ok(text_result(
                    "✓ Session closed. Use accion=\"ejecutar\" to reconnect.",
                ))
            }
        }
    }

    /// Create a Tool model for this tool (metadata).
    pub fn to_tool() -> Tool {
        Tool {
            name: Self::NAME.into(),
            description: Some(Self::DESCRIPTION.into()),
            input_schema: cached_schema_for_type::<SpotifyAuthParams>(),
            annotations: None,
            output_schema: None,
            icons: None,
            meta: None,
            title: None,
        }
    }

    /// Create a ToolRoute for the router.
    pub fn create_route<S>(service: Arc<SpotifyService>) -> ToolRoute<S>
    where
        S: Send + Sync + 'static,
    {
        ToolRoute::new_dyn(Self::to_tool(), move |ctx: ToolCallContext<'_, S>| {
            let args = ctx.arguments.clone().unwrap_or_default();
            let service = service.clone();
            async move {
                let params: SpotifyAuthParams =
                    serde_json::from_value(serde_json::Value::Object(args))
                        .map_err(|e| McpError::invalid_params(e.to_string(), None))?;
                Self::execute(params, &service)
                    .await
                    .or_else(ToolError::into_call_result)
            }
            .boxed()
        })
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::spotify::CredentialsPatch;
    use crate::domains::spotify::testing::{FakeSpotify, fake_service};
    use crate::domains::tools::definitions::common::first_text;
    use serde_json::json;

    fn configure_params() -> SpotifyAuthParams {
        serde_json::from_value(json!({
            "accion": "configurar",
            "clientId": "0123456789abcdef0123",
            "clientSecret": "secret"
        }))
        .unwrap()
    }

    #[test]
    fn test_action_names() {
        for (name, action) in [
            ("configurar", AuthAction::Configure),
            ("verificar", AuthAction::Verify),
            ("iniciar", AuthAction::Start),
            ("ejecutar", AuthAction::Run),
            ("urlAuth", AuthAction::AuthUrl),
            ("cerrar", AuthAction::Logout),
        ] {
            let params: SpotifyAuthParams =
                serde_json::from_value(json!({ "accion": name })).unwrap();
            assert_eq!(params.accion, action);
            assert_eq!(action.as_str(), name);
        }
    }

    #[tokio::test]
    async fn test_configure_masks_client_id_and_invalidates() {
        let (service, provider, _dir) = fake_service(Arc::new(FakeSpotify::new()));

        let result = SpotifyAuthTool::execute(configure_params(), &service).await.unwrap();
        let text = first_text(&result);
        assert!(text.contains("Client ID: 01234567...0123"));
        assert!(!text.contains("secret"));
        assert_eq!(provider.invalidations(), 1);
    }

    #[tokio::test]
    async fn test_configure_requires_id_and_secret() {
        let (service, provider, _dir) = fake_service(Arc::new(FakeSpotify::new()));

        let mut params = SpotifyAuthParams::new(AuthAction::Configure);
        params.client_id = Some("only-id".into());
        let result = SpotifyAuthTool::execute(params, &service).await.unwrap();

        assert!(result.is_error.unwrap_or(false));
        assert_eq!(provider.invalidations(), 0);
    }

    #[tokio::test]
    async fn test_verify_reports_status() {
        let (service, _, _dir) = fake_service(Arc::new(FakeSpotify::new()));

        let verify = || SpotifyAuthParams::new(AuthAction::Verify);
        let result = SpotifyAuthTool::execute(verify(), &service).await.unwrap();
        assert!(first_text(&result).contains("Not configured"));

        SpotifyAuthTool::execute(configure_params(), &service).await.unwrap();
        let result = SpotifyAuthTool::execute(verify(), &service).await.unwrap();
        assert!(first_text(&result).contains("**Session**: Not connected"));

        service
            .store()
            .save(CredentialsPatch::new().tokens("access", "refresh"))
            .unwrap();
        let result = SpotifyAuthTool::execute(verify(), &service).await.unwrap();
        assert!(first_text(&result).contains("**Session**: Connected"));
    }

    #[tokio::test]
    async fn test_auth_url() {
        let (service, _, _dir) = fake_service(Arc::new(FakeSpotify::new()));

        let result = SpotifyAuthTool::execute(SpotifyAuthParams::new(AuthAction::AuthUrl), &service)
            .await
            .unwrap();
        assert!(result.is_error.unwrap_or(false));

        SpotifyAuthTool::execute(configure_params(), &service).await.unwrap();
        let result = SpotifyAuthTool::execute(SpotifyAuthParams::new(AuthAction::AuthUrl), &service)
            .await
            .unwrap();
        let text = first_text(&result);
        assert!(text.starts_with("# Authorization URL"));
        assert!(text.contains("client_id=0123456789abcdef0123"));
        assert!(text.contains("show_dialog=true"));
    }

    #[tokio::test]
    async fn test_run_without_credentials() {
        let (service, provider, _dir) = fake_service(Arc::new(FakeSpotify::new()));

        let result = SpotifyAuthTool::execute(SpotifyAuthParams::new(AuthAction::Run), &service)
            .await
            .unwrap();
        assert_eq!(first_text(&result), NOT_CONFIGURED);
        assert_eq!(provider.invalidations(), 0);
    }

    #[tokio::test]
    async fn test_logout_clears_session() {
        let (service, provider, _dir) = fake_service(Arc::new(FakeSpotify::new()));
        SpotifyAuthTool::execute(configure_params(), &service).await.unwrap();
        service
            .store()
            .save(CredentialsPatch::new().tokens("access", "refresh"))
            .unwrap();

        let result = SpotifyAuthTool::execute(SpotifyAuthParams::new(AuthAction::Logout), &service)
            .await
            .unwrap();
        assert!(first_text(&result).contains("Session closed"));
        assert!(!service.store().load().unwrap().has_session());
        assert_eq!(provider.invalidations(), 2);
    }
}
