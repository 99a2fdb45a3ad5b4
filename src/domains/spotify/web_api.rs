//! Spotify Web API client over `reqwest`.
//!
//! Two authentication modes:
//! - **User session**: seeded with the stored access/refresh token pair and a
//!   nominal 30 day lifetime. The access token is only refreshed (through the
//!   refresh token) once that lifetime has passed.
//! - **App only**: a client-credentials token fetched lazily on the first call.
//!   Catalog queries work; anything needing a user fails at the remote API.
//!
//! A refreshed user session is written back to the [`CredentialStore`] when
//! one is attached, so a rotated refresh token survives a restart.
//!
//! Non-2xx responses are turned into [`ApiError`] text of the form
//! `"{status} {reason phrase}: {message} ({REASON})"`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::CONTENT_LENGTH;
use reqwest::{Method, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use url::Url;

use super::api::SpotifyApi;
use super::credentials::{CredentialStore, Credentials, CredentialsPatch};
use super::error::{ApiError, ApiResult};
use super::models::{
    Album, Artist, CurrentlyPlaying, Device, ItemType, NewPlaylist, Page, PlayHistory,
    PlaybackRequest, PlaybackState, PlaylistItem, Queue, RepeatMode, SavedTrack, SearchResults,
    SimplifiedPlaylist, TimeRange, Track, UserProfile,
};

const API_BASE: &str = "https://api.spotify.com/v1";

/// Token endpoint of the accounts service.
pub const TOKEN_URL: &str = "https://accounts.spotify.com/api/token";

/// Nominal lifetime given to a stored user session.
const SESSION_LIFETIME_SECS: i64 = 3600 * 24 * 30;

/// Refresh a token this many seconds before it expires.
const REFRESH_BUFFER_SECS: i64 = 60;

/// Response of the accounts token endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default = "default_expires_in")]
    pub expires_in: i64,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
}

fn default_expires_in() -> i64 {
    3600
}

#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,
    expires_at: DateTime<Utc>,
}

impl CachedToken {
    fn expiring_in(access_token: String, secs: i64) -> Self {
        Self {
            access_token,
            expires_at: Utc::now() + chrono::Duration::seconds(secs),
        }
    }

    fn is_expired(&self) -> bool {
        Utc::now() + chrono::Duration::seconds(REFRESH_BUFFER_SECS) >= self.expires_at
    }
}

#[derive(Debug)]
struct TokenState {
    current: Option<CachedToken>,
    /// Present only in user-session mode.
    refresh_token: Option<String>,
}

/// Spotify Web API client.
pub struct WebApiClient {
    http: reqwest::Client,
    client_id: String,
    client_secret: String,
    token: Mutex<TokenState>,
    store: Option<Arc<CredentialStore>>,
}

impl WebApiClient {
    /// Build a client for the given credentials, picking the mode from the
    /// presence of a stored session.
    pub fn from_credentials(credentials: &Credentials) -> Self {
        let state = match (&credentials.access_token, &credentials.refresh_token) {
            (Some(access), Some(refresh)) if credentials.has_session() => {
                info!("Spotify client in user-session mode");
                TokenState {
                    current: Some(CachedToken::expiring_in(
                        access.clone(),
                        SESSION_LIFETIME_SECS,
                    )),
                    refresh_token: Some(refresh.clone()),
                }
            }
            _ => {
                info!("Spotify client in app-only mode (no user session)");
                TokenState {
                    current: None,
                    refresh_token: None,
                }
            }
        };

        Self {
            http: reqwest::Client::new(),
            client_id: credentials.client_id.clone(),
            client_secret: credentials.client_secret.clone(),
            token: Mutex::new(state),
            store: None,
        }
    }

    /// Write refreshed session tokens to `store`.
    pub fn persisting_to(mut self, store: Arc<CredentialStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Whether the client acts on behalf of a user.
    pub async fn is_user_session(&self) -> bool {
        self.token.lock().await.refresh_token.is_some()
    }

    async fn access_token(&self) -> ApiResult<String> {
        let mut state = self.token.lock().await;
        if let Some(token) = state.current.as_ref().filter(|t| !t.is_expired()) {
            return Ok(token.access_token.clone());
        }

        let response = match &state.refresh_token {
            Some(refresh) => {
                info!("Refreshing Spotify user access token");
                let form = [
                    ("grant_type", "refresh_token"),
                    ("refresh_token", refresh.as_str()),
                ];
                self.request_token(&form).await?
            }
            None => {
                debug!("Requesting client-credentials token");
                self.request_token(&[("grant_type", "client_credentials")])
                    .await?
            }
        };

        if let Some(rotated) = response.refresh_token.clone() {
            state.refresh_token = Some(rotated);
        }
        let token = CachedToken::expiring_in(response.access_token, response.expires_in);
        let access = token.access_token.clone();
        state.current = Some(token);
        if let Some(refresh) = &state.refresh_token {
            self.persist_session(&access, refresh);
        }
        Ok(access)
    }

    fn persist_session(&self, access_token: &str, refresh_token: &str) {
        let Some(store) = &self.store else {
            return;
        };
        match store.save(CredentialsPatch::new().tokens(access_token, refresh_token)) {
            Ok(()) => debug!("Persisted refreshed Spotify session"),
            Err(e) => warn!("Failed to persist refreshed Spotify session: {}", e),
        }
    }

    async fn request_token(&self, form: &[(&str, &str)]) -> ApiResult<TokenResponse> {
        let response = self
            .http
            .post(TOKEN_URL)
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .form(form)
            .send()
            .await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(api_error(status, &body));
        }
        decode(&body)
    }

    fn endpoint(segments: &[&str]) -> ApiResult<Url> {
        let mut url =
            Url::parse(API_BASE).map_err(|e| ApiError::new(format!("Invalid endpoint: {e}")))?;
        url.path_segments_mut()
            .map_err(|_| ApiError::new("Invalid endpoint"))?
            .extend(segments);
        Ok(url)
    }

    /// Perform one request and return the raw body of a successful response.
    async fn call(
        &self,
        method: Method,
        segments: &[&str],
        query: &[(&str, String)],
        body: Option<Value>,
    ) -> ApiResult<String> {
        let url = Self::endpoint(segments)?;
        let token = self.access_token().await?;
        debug!(%method, %url, "Spotify API request");

        let mut request = self
            .http
            .request(method.clone(), url)
            .bearer_auth(token)
            .query(query);
        request = match body {
            Some(body) => request.json(&body),
            None if method != Method::GET => request.header(CONTENT_LENGTH, "0"),
            None => request,
        };

        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(api_error(status, &text));
        }
        Ok(text)
    }

    async fn get<T: DeserializeOwned>(
        &self,
        segments: &[&str],
        query: &[(&str, String)],
    ) -> ApiResult<T> {
        let body = self.call(Method::GET, segments, query, None).await?;
        decode(&body)
    }

    /// GET an endpoint that answers 204 when there is nothing to report.
    async fn get_optional<T: DeserializeOwned>(&self, segments: &[&str]) -> ApiResult<Option<T>> {
        let body = self.call(Method::GET, segments, &[], None).await?;
        if body.trim().is_empty() {
            return Ok(None);
        }
        decode(&body).map(Some)
    }

    /// Send a command whose response body is ignored.
    async fn command(
        &self,
        method: Method,
        segments: &[&str],
        query: &[(&str, String)],
        body: Option<Value>,
    ) -> ApiResult<()> {
        self.call(method, segments, query, body).await.map(|_| ())
    }
}

fn device_query(device_id: Option<&str>) -> Vec<(&'static str, String)> {
    device_id
        .filter(|id| !id.is_empty())
        .map(|id| vec![("device_id", id.to_string())])
        .unwrap_or_default()
}

fn decode<T: DeserializeOwned>(body: &str) -> ApiResult<T> {
    serde_json::from_str(body).map_err(|e| ApiError::new(format!("Failed to decode response: {e}")))
}

#[derive(Deserialize)]
struct ErrorBody {
    error: ErrorDetail,
    #[serde(default)]
    error_description: Option<String>,
}

/// Web API errors are objects; accounts service errors are bare codes.
#[derive(Deserialize)]
#[serde(untagged)]
enum ErrorDetail {
    Object {
        #[serde(default)]
        message: String,
        #[serde(default)]
        reason: Option<String>,
    },
    Code(String),
}

/// Build the error for a non-2xx response.
pub(crate) fn api_error(status: StatusCode, body: &str) -> ApiError {
    let (message, reason) = match serde_json::from_str::<ErrorBody>(body) {
        Ok(ErrorBody {
            error: ErrorDetail::Object { message, reason },
            ..
        }) => (message, reason),
        Ok(ErrorBody {
            error: ErrorDetail::Code(code),
            error_description,
        }) => (error_description.unwrap_or(code), None),
        Err(_) => (body.trim().to_string(), None),
    };

    let mut text = format!(
        "{} {}",
        status.as_u16(),
        status.canonical_reason().unwrap_or("Error")
    );
    if !message.is_empty() {
        text.push_str(": ");
        text.push_str(&message);
    }
    if let Some(reason) = reason {
        text.push_str(&format!(" ({reason})"));
    }
    ApiError::with_status(status.as_u16(), text)
}

#[derive(Deserialize)]
struct DevicesResponse {
    #[serde(default)]
    devices: Vec<Device>,
}

#[derive(Deserialize)]
struct TopTracksResponse {
    #[serde(default)]
    tracks: Vec<Track>,
}

#[async_trait]
impl SpotifyApi for WebApiClient {
    async fn search(
        &self,
        query: &str,
        kind: ItemType,
        limit: u32,
        offset: u32,
        market: &str,
    ) -> ApiResult<SearchResults> {
        let params = [
            ("q", query.to_string()),
            ("type", kind.as_str().to_string()),
            ("limit", limit.to_string()),
            ("offset", offset.to_string()),
            ("market", market.to_string()),
        ];
        self.get(&["search"], &params).await
    }

    async fn track(&self, id: &str) -> ApiResult<Track> {
        self.get(&["tracks", id], &[]).await
    }

    async fn album(&self, id: &str, market: &str) -> ApiResult<Album> {
        self.get(&["albums", id], &[("market", market.to_string())])
            .await
    }

    async fn artist_top_tracks(&self, id: &str, market: &str) -> ApiResult<Vec<Track>> {
        let response: TopTracksResponse = self
            .get(
                &["artists", id, "top-tracks"],
                &[("market", market.to_string())],
            )
            .await?;
        Ok(response.tracks)
    }

    async fn current_user(&self) -> ApiResult<UserProfile> {
        self.get(&["me"], &[]).await
    }

    async fn currently_playing(&self) -> ApiResult<Option<CurrentlyPlaying>> {
        self.get_optional(&["me", "player", "currently-playing"])
            .await
    }

    async fn playback_state(&self) -> ApiResult<Option<PlaybackState>> {
        self.get_optional(&["me", "player"]).await
    }

    async fn devices(&self) -> ApiResult<Vec<Device>> {
        let response: DevicesResponse = self.get(&["me", "player", "devices"], &[]).await?;
        Ok(response.devices)
    }

    async fn queue(&self) -> ApiResult<Queue> {
        self.get(&["me", "player", "queue"], &[]).await
    }

    async fn recently_played(&self, limit: u32) -> ApiResult<Page<PlayHistory>> {
        self.get(
            &["me", "player", "recently-played"],
            &[("limit", limit.to_string())],
        )
        .await
    }

    async fn saved_tracks(&self, limit: u32, offset: u32) -> ApiResult<Page<SavedTrack>> {
        self.get(
            &["me", "tracks"],
            &[("limit", limit.to_string()), ("offset", offset.to_string())],
        )
        .await
    }

    async fn current_user_playlists(
        &self,
        limit: u32,
        offset: u32,
    ) -> ApiResult<Page<SimplifiedPlaylist>> {
        self.get(
            &["me", "playlists"],
            &[("limit", limit.to_string()), ("offset", offset.to_string())],
        )
        .await
    }

    async fn playlist_items(
        &self,
        playlist_id: &str,
        limit: u32,
        offset: u32,
    ) -> ApiResult<Page<PlaylistItem>> {
        self.get(
            &["playlists", playlist_id, "tracks"],
            &[("limit", limit.to_string()), ("offset", offset.to_string())],
        )
        .await
    }

    async fn top_tracks(&self, range: TimeRange, limit: u32) -> ApiResult<Page<Track>> {
        self.get(
            &["me", "top", "tracks"],
            &[
                ("time_range", range.as_str().to_string()),
                ("limit", limit.to_string()),
            ],
        )
        .await
    }

    async fn top_artists(&self, range: TimeRange, limit: u32) -> ApiResult<Page<Artist>> {
        self.get(
            &["me", "top", "artists"],
            &[
                ("time_range", range.as_str().to_string()),
                ("limit", limit.to_string()),
            ],
        )
        .await
    }

    async fn start_playback(
        &self,
        device_id: Option<&str>,
        request: &PlaybackRequest,
    ) -> ApiResult<()> {
        let body = serde_json::to_value(request)
            .map_err(|e| ApiError::new(format!("Failed to encode request: {e}")))?;
        self.command(
            Method::PUT,
            &["me", "player", "play"],
            &device_query(device_id),
            Some(body),
        )
        .await
    }

    async fn pause(&self, device_id: Option<&str>) -> ApiResult<()> {
        self.command(
            Method::PUT,
            &["me", "player", "pause"],
            &device_query(device_id),
            None,
        )
        .await
    }

    async fn next_track(&self, device_id: Option<&str>) -> ApiResult<()> {
        self.command(
            Method::POST,
            &["me", "player", "next"],
            &device_query(device_id),
            None,
        )
        .await
    }

    async fn previous_track(&self, device_id: Option<&str>) -> ApiResult<()> {
        self.command(
            Method::POST,
            &["me", "player", "previous"],
            &device_query(device_id),
            None,
        )
        .await
    }

    async fn set_volume(&self, percent: u8, device_id: Option<&str>) -> ApiResult<()> {
        let mut query = device_query(device_id);
        query.push(("volume_percent", percent.to_string()));
        self.command(Method::PUT, &["me", "player", "volume"], &query, None)
            .await
    }

    async fn set_shuffle(&self, state: bool, device_id: Option<&str>) -> ApiResult<()> {
        let mut query = device_query(device_id);
        query.push(("state", state.to_string()));
        self.command(Method::PUT, &["me", "player", "shuffle"], &query, None)
            .await
    }

    async fn set_repeat(&self, mode: RepeatMode, device_id: Option<&str>) -> ApiResult<()> {
        let mut query = device_query(device_id);
        query.push(("state", mode.as_str().to_string()));
        self.command(Method::PUT, &["me", "player", "repeat"], &query, None)
            .await
    }

    async fn seek(&self, position_ms: u64, device_id: Option<&str>) -> ApiResult<()> {
        let mut query = device_query(device_id);
        query.push(("position_ms", position_ms.to_string()));
        self.command(Method::PUT, &["me", "player", "seek"], &query, None)
            .await
    }

    async fn add_to_queue(&self, uri: &str, device_id: Option<&str>) -> ApiResult<()> {
        let mut query = device_query(device_id);
        query.push(("uri", uri.to_string()));
        self.command(Method::POST, &["me", "player", "queue"], &query, None)
            .await
    }

    async fn transfer_playback(&self, device_id: &str, play: bool) -> ApiResult<()> {
        let body = json!({ "device_ids": [device_id], "play": play });
        self.command(Method::PUT, &["me", "player"], &[], Some(body))
            .await
    }

    async fn save_tracks(&self, ids: &[String]) -> ApiResult<()> {
        self.command(Method::PUT, &["me", "tracks"], &[], Some(json!({ "ids": ids })))
            .await
    }

    async fn remove_saved_tracks(&self, ids: &[String]) -> ApiResult<()> {
        self.command(
            Method::DELETE,
            &["me", "tracks"],
            &[],
            Some(json!({ "ids": ids })),
        )
        .await
    }

    async fn contains_saved_tracks(&self, ids: &[String]) -> ApiResult<Vec<bool>> {
        self.get(&["me", "tracks", "contains"], &[("ids", ids.join(","))])
            .await
    }

    async fn create_playlist(
        &self,
        user_id: &str,
        playlist: &NewPlaylist,
    ) -> ApiResult<SimplifiedPlaylist> {
        let body = serde_json::to_value(playlist)
            .map_err(|e| ApiError::new(format!("Failed to encode request: {e}")))?;
        let response = self
            .call(
                Method::POST,
                &["users", user_id, "playlists"],
                &[],
                Some(body),
            )
            .await?;
        decode(&response)
    }

    async fn add_playlist_items(
        &self,
        playlist_id: &str,
        uris: &[String],
        position: Option<u32>,
    ) -> ApiResult<()> {
        let mut body = json!({ "uris": uris });
        if let Some(position) = position {
            body["position"] = json!(position);
        }
        self.command(
            Method::POST,
            &["playlists", playlist_id, "tracks"],
            &[],
            Some(body),
        )
        .await
    }

    async fn remove_playlist_items(&self, playlist_id: &str, uris: &[String]) -> ApiResult<()> {
        let tracks: Vec<Value> = uris.iter().map(|uri| json!({ "uri": uri })).collect();
        self.command(
            Method::DELETE,
            &["playlists", playlist_id, "tracks"],
            &[],
            Some(json!({ "tracks": tracks })),
        )
        .await
    }

    async fn unfollow_playlist(&self, playlist_id: &str) -> ApiResult<()> {
        self.command(
            Method::DELETE,
            &["playlists", playlist_id, "followers"],
            &[],
            None,
        )
        .await
    }

    async fn change_playlist_details(
        &self,
        playlist_id: &str,
        name: &str,
        description: Option<&str>,
    ) -> ApiResult<()> {
        let mut body = json!({ "name": name });
        if let Some(description) = description {
            body["description"] = json!(description);
        }
        self.command(Method::PUT, &["playlists", playlist_id], &[], Some(body))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn credentials(access: Option<&str>, refresh: Option<&str>) -> Credentials {
        Credentials {
            client_id: "client-id".to_string(),
            client_secret: "client-secret".to_string(),
            redirect_uri: "http://127.0.0.1:8000/callback".to_string(),
            access_token: access.map(String::from),
            refresh_token: refresh.map(String::from),
        }
    }

    #[test]
    fn test_api_error_web_api_body() {
        let body = r#"{"error": {"status": 404, "message": "Player command failed: No active device found", "reason": "NO_ACTIVE_DEVICE"}}"#;
        let err = api_error(StatusCode::NOT_FOUND, body);
        assert_eq!(
            err.message(),
            "404 Not Found: Player command failed: No active device found (NO_ACTIVE_DEVICE)"
        );
        assert_eq!(err.status(), Some(404));
    }

    #[test]
    fn test_api_error_accounts_body() {
        let body = r#"{"error": "invalid_client", "error_description": "Invalid client secret"}"#;
        let err = api_error(StatusCode::BAD_REQUEST, body);
        assert_eq!(err.message(), "400 Bad Request: Invalid client secret");
    }

    #[test]
    fn test_api_error_plain_body() {
        let err = api_error(StatusCode::UNAUTHORIZED, "");
        assert_eq!(err.message(), "401 Unauthorized");

        let err = api_error(StatusCode::BAD_GATEWAY, "upstream down\n");
        assert_eq!(err.message(), "502 Bad Gateway: upstream down");
    }

    #[test]
    fn test_decode_failure_message() {
        let err = decode::<Track>("not json").unwrap_err();
        assert!(err.message().starts_with("Failed to decode response"));
    }

    #[test]
    fn test_endpoint_escapes_segments() {
        let url = WebApiClient::endpoint(&["playlists", "a b", "tracks"]).unwrap();
        assert_eq!(
            url.as_str(),
            "https://api.spotify.com/v1/playlists/a%20b/tracks"
        );
    }

    #[test]
    fn test_device_query_skips_empty() {
        assert!(device_query(None).is_empty());
        assert!(device_query(Some("")).is_empty());
        assert_eq!(device_query(Some("dev1")), vec![("device_id", "dev1".to_string())]);
    }

    #[test]
    fn test_cached_token_expiry() {
        assert!(!CachedToken::expiring_in("t".into(), SESSION_LIFETIME_SECS).is_expired());
        assert!(CachedToken::expiring_in("t".into(), 30).is_expired());
    }

    #[test]
    fn test_refreshed_session_is_persisted() {
        use crate::domains::spotify::credentials::IdentityFallback;
        use tempfile::TempDir;

        let dir = TempDir::new().unwrap();
        let store = Arc::new(CredentialStore::new(
            dir.path().join("tokens.json"),
            IdentityFallback::default(),
        ));
        store
            .save(
                CredentialsPatch::new()
                    .identity("client-id", "client-secret", "http://127.0.0.1:8000/callback")
                    .tokens("old-access", "old-refresh"),
            )
            .unwrap();

        let client = WebApiClient::from_credentials(&store.load().unwrap())
            .persisting_to(store.clone());
        client.persist_session("new-access", "rotated-refresh");

        let reloaded = store.load().unwrap();
        assert_eq!(reloaded.client_id, "client-id");
        assert_eq!(reloaded.access_token.as_deref(), Some("new-access"));
        assert_eq!(reloaded.refresh_token.as_deref(), Some("rotated-refresh"));
    }

    #[tokio::test]
    async fn test_mode_selection() {
        let session = WebApiClient::from_credentials(&credentials(Some("a"), Some("r")));
        assert!(session.is_user_session().await);
        assert_eq!(session.access_token().await.unwrap(), "a");

        let app_only = WebApiClient::from_credentials(&credentials(Some("a"), None));
        assert!(!app_only.is_user_session().await);
    }
}
