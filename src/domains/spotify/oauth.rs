//! OAuth authorization-code flow.
//!
//! Builds the authorize URL, runs a one-shot local callback server on the
//! redirect URI, and exchanges the returned code for a token pair.

use axum::{Router, extract::Query, response::Html, routing::get};
use futures::FutureExt;
use serde::Deserialize;
use std::future::IntoFuture;
use std::io;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, oneshot};
use tracing::{debug, info, warn};
use url::Url;

use super::credentials::Credentials;
use super::error::SpotifyError;
use super::web_api::{TOKEN_URL, TokenResponse, api_error};

pub const AUTHORIZE_URL: &str = "https://accounts.spotify.com/authorize";

/// Scopes requested for a user session.
pub const SCOPES: [&str; 12] = [
    "user-read-private",
    "user-read-email",
    "user-read-playback-state",
    "user-modify-playback-state",
    "user-read-currently-playing",
    "playlist-read-private",
    "playlist-modify-private",
    "playlist-modify-public",
    "user-library-read",
    "user-library-modify",
    "user-read-recently-played",
    "user-top-read",
];

/// Build the URL the user opens to grant access.
pub fn authorize_url(
    client_id: &str,
    redirect_uri: &str,
    state: Option<&str>,
) -> Result<String, SpotifyError> {
    let scope = SCOPES.join(" ");
    let mut params = vec![
        ("client_id", client_id),
        ("response_type", "code"),
        ("redirect_uri", redirect_uri),
        ("scope", scope.as_str()),
        ("show_dialog", "true"),
    ];
    if let Some(state) = state {
        params.push(("state", state));
    }
    let query = serde_urlencoded::to_string(&params)
        .map_err(|e| SpotifyError::auth(format!("Failed to encode authorize URL: {e}")))?;
    Ok(format!("{AUTHORIZE_URL}?{query}"))
}

/// Exchange an authorization code for tokens.
///
/// # Errors
///
/// Returns [`SpotifyError::Auth`] when the accounts service rejects the code.
pub async fn exchange_code(
    http: &reqwest::Client,
    credentials: &Credentials,
    code: &str,
) -> Result<TokenResponse, SpotifyError> {
    let form = [
        ("grant_type", "authorization_code"),
        ("code", code),
        ("redirect_uri", credentials.redirect_uri.as_str()),
    ];
    let response = http
        .post(TOKEN_URL)
        .basic_auth(&credentials.client_id, Some(&credentials.client_secret))
        .form(&form)
        .send()
        .await?;

    let status = response.status();
    let body = response.text().await?;
    if !status.is_success() {
        return Err(SpotifyError::auth(format!(
            "Token exchange failed: {}",
            api_error(status, &body)
        )));
    }
    Ok(serde_json::from_str(&body)?)
}

/// Where the callback server listens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackTarget {
    /// Loopback addresses the redirect host may resolve to.
    pub addrs: Vec<SocketAddr>,
    pub path: String,
}

/// Parse the redirect URI into local listen addresses.
///
/// Only loopback hosts are accepted: the server must be able to receive the
/// browser redirect itself. `localhost` listens on both `127.0.0.1` and
/// `::1` since browsers may resolve it to either.
pub fn callback_target(redirect_uri: &str) -> Result<CallbackTarget, SpotifyError> {
    let url = Url::parse(redirect_uri)
        .map_err(|e| SpotifyError::auth(format!("Invalid redirect URI: {e}")))?;

    let port = url.port_or_known_default().unwrap_or(80);
    let v4 = SocketAddr::from((Ipv4Addr::LOCALHOST, port));
    let v6 = SocketAddr::from((Ipv6Addr::LOCALHOST, port));
    let addrs = match url.host_str() {
        Some("localhost") => vec![v4, v6],
        Some("127.0.0.1") => vec![v4],
        Some("[::1]") => vec![v6],
        other => {
            return Err(SpotifyError::auth(format!(
                "Redirect URI host must be localhost, 127.0.0.1 or [::1] to run the flow here (got {})",
                other.unwrap_or("none")
            )));
        }
    };

    Ok(CallbackTarget {
        addrs,
        path: url.path().to_string(),
    })
}

/// Bind every address that is available.
///
/// A missing IPv6 stack is not fatal as long as one listener comes up.
pub async fn bind_all(addrs: &[SocketAddr]) -> Result<Vec<tokio::net::TcpListener>, SpotifyError> {
    let mut listeners = Vec::with_capacity(addrs.len());
    let mut last_error = None;
    for addr in addrs {
        match tokio::net::TcpListener::bind(addr).await {
            Ok(listener) => listeners.push(listener),
            Err(e) => {
                warn!("Failed to bind OAuth callback on {}: {}", addr, e);
                last_error = Some(format!("Failed to bind to {addr}: {e}"));
            }
        }
    }
    if listeners.is_empty() {
        return Err(SpotifyError::auth(
            last_error.unwrap_or_else(|| "No callback address to bind".to_string()),
        ));
    }
    Ok(listeners)
}

/// Open `url` with `launch` on the blocking pool.
///
/// Failure only logs: the user can still open the URL by hand.
pub async fn launch_browser<L>(url: String, launch: L)
where
    L: FnOnce(&str) -> io::Result<()> + Send + 'static,
{
    let result = tokio::task::spawn_blocking(move || {
        let outcome = launch(&url);
        (url, outcome)
    })
    .await;

    match result {
        Ok((_, Ok(()))) => {}
        Ok((url, Err(e))) => {
            warn!("Could not open browser automatically: {}", e);
            info!("Open this URL manually: {}", url);
        }
        Err(e) => warn!("Browser launch task failed: {}", e),
    }
}

/// Query parameters of the browser redirect.
#[derive(Debug, Default, Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub error: Option<String>,
    pub state: Option<String>,
}

/// Validate a callback and extract the authorization code.
pub fn validate_callback(
    params: &CallbackParams,
    expected_state: &str,
) -> Result<String, SpotifyError> {
    if let Some(error) = &params.error {
        return Err(SpotifyError::auth(format!("Authorization denied: {error}")));
    }
    if params.state.as_deref() != Some(expected_state) {
        return Err(SpotifyError::auth("State mismatch in authorization callback"));
    }
    match &params.code {
        Some(code) if !code.is_empty() => Ok(code.clone()),
        _ => Err(SpotifyError::auth("No authorization code received")),
    }
}

type CallbackSender = Arc<Mutex<Option<oneshot::Sender<Result<String, SpotifyError>>>>>;

fn callback_router(path: &str, expected_state: String, tx: CallbackSender) -> Router {
    Router::new().route(
        path,
        get(move |Query(params): Query<CallbackParams>| {
            let tx = tx.clone();
            let expected_state = expected_state.clone();
            async move {
                let result = validate_callback(&params, &expected_state);
                let page = match &result {
                    Ok(_) => SUCCESS_HTML.to_string(),
                    Err(e) => failure_html(&e.to_string()),
                };
                if let Some(sender) = tx.lock().await.take() {
                    let _ = sender.send(result);
                }
                Html(page)
            }
        }),
    )
}

/// Run the whole flow: callback server, browser, code exchange.
///
/// # Errors
///
/// Fails when the redirect URI is not local, the port cannot be bound, the
/// user denies access, the callback does not arrive within `timeout`, or the
/// code exchange fails.
pub async fn authorize_interactive(
    http: &reqwest::Client,
    credentials: &Credentials,
    timeout: Duration,
) -> Result<TokenResponse, SpotifyError> {
    let target = callback_target(&credentials.redirect_uri)?;
    let state = uuid::Uuid::new_v4().to_string();

    let (tx, rx) = oneshot::channel();
    let tx: CallbackSender = Arc::new(Mutex::new(Some(tx)));
    let app = callback_router(&target.path, state.clone(), tx);

    let listeners = bind_all(&target.addrs).await?;
    for listener in &listeners {
        if let Ok(addr) = listener.local_addr() {
            info!("OAuth callback server listening on http://{}{}", addr, target.path);
        }
    }

    let url = authorize_url(&credentials.client_id, &credentials.redirect_uri, Some(&state))?;
    launch_browser(url, |u| open::that(u)).await;

    let servers = listeners
        .into_iter()
        .map(|listener| axum::serve(listener, app.clone()).into_future().boxed());
    let server = futures::future::select_all(servers);
    let code = tokio::select! {
        result = rx => {
            result.map_err(|_| SpotifyError::auth("Callback channel closed unexpectedly"))??
        }
        _ = server => {
            return Err(SpotifyError::auth("Callback server stopped unexpectedly"));
        }
        () = tokio::time::sleep(timeout) => {
            return Err(SpotifyError::auth(format!(
                "Timed out after {}s waiting for authorization",
                timeout.as_secs()
            )));
        }
    };

    debug!("Received authorization code, exchanging for tokens");
    exchange_code(http, credentials, &code).await
}

fn failure_html(reason: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head><title>Authorization Failed</title></head>
<body style="font-family: sans-serif; text-align: center; padding: 50px;">
    <h1>Authorization Failed</h1>
    <p>{reason}</p>
    <p>Please close this window and try again.</p>
</body>
</html>"#
    )
}

const SUCCESS_HTML: &str = r#"<!DOCTYPE html>
<html>
<head><title>Authorization Successful</title></head>
<body style="font-family: sans-serif; text-align: center; padding: 50px; background: #191414; color: #1DB954;">
    <h1>Authorization Successful</h1>
    <p>Spotify is now connected. You can close this window.</p>
</body>
</html>"#;
