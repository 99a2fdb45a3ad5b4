//! Spotify playback control tool.
//!
//! Every remote action goes through the player executor, so remote failures
//! come back as guidance text rather than errors.

use futures::FutureExt;
use rmcp::{
    ErrorData as McpError,
    handler::server::tool::{ToolCallContext, ToolRoute, cached_schema_for_type},
    model::{CallToolResult, Tool},
};
use schemars::JsonSchema;
use serde::Deserialize;
use std::io;
use std::sync::Arc;
use tracing::{info, instrument, warn};

use super::common::{error_result, format_duration, missing_params, non_empty, text_result};
use crate::domains::spotify::models::{ItemType, PlaybackRequest, RepeatMode};
use crate::domains::spotify::{ApiError, PlayerOutcome, SpotifyService};
use crate::domains::tools::ToolError;

const SPOTIFY_APP_URI: &str = "spotify:";
const SPOTIFY_WEB_URL: &str = "https://open.spotify.com";

/// Playback actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub enum PlayerAction {
    Play,
    Pause,
    Resume,
    Next,
    Prev,
    Volume,
    Shuffle,
    Repeat,
    Seek,
    Queue,
    Transfer,
    PlayLiked,
    OpenApp,
}

impl PlayerAction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Play => "play",
            Self::Pause => "pause",
            Self::Resume => "resume",
            Self::Next => "next",
            Self::Prev => "prev",
            Self::Volume => "volume",
            Self::Shuffle => "shuffle",
            Self::Repeat => "repeat",
            Self::Seek => "seek",
            Self::Queue => "queue",
            Self::Transfer => "transfer",
            Self::PlayLiked => "playLiked",
            Self::OpenApp => "openApp",
        }
    }
}

/// Action-dependent value: a number, a flag or a word.
#[derive(Debug, Clone, PartialEq, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum PlayerValue {
    Number(f64),
    Flag(bool),
    Text(String),
}

impl PlayerValue {
    fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    fn as_flag(&self) -> Option<bool> {
        match self {
            Self::Flag(b) => Some(*b),
            _ => None,
        }
    }

    fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }
}

fn default_in_context() -> bool {
    true
}

/// Parameters for the playback tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct SpotifyPlayerParams {
    #[schemars(
        description = "play, pause/resume, next/prev, volume (0-100), shuffle (true/false), repeat (track/context/off), seek (ms), queue = add to queue, transfer = switch device, playLiked = Liked Songs, openApp = open Spotify"
    )]
    pub accion: PlayerAction,

    #[schemars(description = "Spotify URI (for play/queue)")]
    #[serde(default)]
    pub uri: Option<String>,

    #[schemars(description = "Content type (for play/queue)")]
    #[serde(default)]
    pub tipo: Option<ItemType>,

    #[schemars(description = "Content ID (for play/queue)")]
    #[serde(default)]
    pub id: Option<String>,

    #[schemars(
        description = "Action value: volume (0-100), shuffle (bool), repeat (track/context/off), seek (ms), playLiked (bool: shuffle), openApp (bool: force web)"
    )]
    #[serde(default)]
    pub valor: Option<PlayerValue>,

    #[schemars(description = "Device ID")]
    #[serde(default)]
    pub dispositivo: Option<String>,

    #[schemars(description = "For tracks: play within the album context (default: true)")]
    #[serde(default = "default_in_context", rename = "enContexto")]
    pub en_contexto: bool,
}

impl SpotifyPlayerParams {
    pub fn new(accion: PlayerAction) -> Self {
        Self {
            accion,
            uri: None,
            tipo: None,
            id: None,
            valor: None,
            dispositivo: None,
            en_contexto: true,
        }
    }

    /// `uri`, or `spotify:{tipo}:{id}` when both are given.
    fn target_uri(&self) -> Option<String> {
        if let Some(uri) = non_empty(&self.uri) {
            return Some(uri.to_string());
        }
        match (self.tipo, non_empty(&self.id)) {
            (Some(kind), Some(id)) => Some(kind.uri(id)),
            _ => None,
        }
    }

    /// Declared kind, or the one named in the URI.
    fn target_kind(&self) -> Option<ItemType> {
        self.tipo
            .or_else(|| non_empty(&self.uri).and_then(ItemType::from_uri))
    }

    fn number(&self) -> Option<f64> {
        self.valor.as_ref().and_then(PlayerValue::as_number)
    }

    fn flag(&self) -> Option<bool> {
        self.valor.as_ref().and_then(PlayerValue::as_flag)
    }

    fn text(&self) -> Option<&str> {
        self.valor.as_ref().and_then(PlayerValue::as_text)
    }
}

/// Turn a player outcome into the tool result.
fn player_result<T>(
    outcome: PlayerOutcome<T>,
    done: impl FnOnce(Option<T>) -> String,
) -> CallToolResult {
    match outcome {
        PlayerOutcome::Done(data) => text_result(done(data)),
        PlayerOutcome::Failed(guidance) => error_result(&guidance),
    }
}

/// Launch the desktop app, falling back to the web player.
///
/// Returns the message describing what was opened.
pub fn open_app<L>(force_web: bool, launch: L) -> Result<String, ToolError>
where
    L: Fn(&str) -> io::Result<()>,
{
    if !force_web {
        match launch(SPOTIFY_APP_URI) {
            Ok(()) => return Ok("🎵 Opening Spotify...".to_string()),
            Err(e) => warn!("Could not launch the Spotify app, using the web player: {}", e),
        }
    }
    launch(SPOTIFY_WEB_URL)
        .map(|()| "🌐 Opening Spotify Web...".to_string())
        .map_err(|e| ToolError::execution_failed(format!("Could not open Spotify: {}", e)))
}

/// Spotify playback control tool.
#[derive(Debug, Clone)]
pub struct SpotifyPlayerTool;

impl SpotifyPlayerTool {
    /// Tool name as registered in MCP.
    pub const NAME: &'static str = "spotifyPlayer";

    /// Tool description shown to clients.
    pub const DESCRIPTION: &'static str = "Controls playback: play, pause, resume, next, prev, volume, shuffle, repeat, seek, queue, transfer, playLiked, openApp. Requires an authenticated session and an active device.";

    /// Execute one playback action.
    #[instrument(skip_all, fields(accion = params.accion.as_str()))]
    pub async fn execute(
        params: SpotifyPlayerParams,
        service: &SpotifyService,
    ) -> Result<CallToolResult, ToolError> {
        let action = params.accion.as_str();
        info!("spotifyPlayer: {}", action);

        let executor = service.executor();
        let device = non_empty(&params.dispositivo).map(String::from);

        let result = match params.accion {
            PlayerAction::Play => {
                let Some(uri) = params.target_uri() else {
                    return Ok(missing_params("uri or tipo+id"));
                };
                let kind = params.target_kind();
                let in_context_track = match (params.tipo, non_empty(&params.id)) {
                    (Some(ItemType::Track), Some(id)) if params.en_contexto => {
                        Some(id.to_string())
                    }
                    _ => None,
                };
                let fallback = format!("▶️ Playing {}", kind.map_or("music", ItemType::as_str));

                let outcome = executor
                    .run_player(action, move |api| async move {
                        if let Some(id) = in_context_track {
                            let track = api.track(&id).await?;
                            let album = track.album.as_ref().and_then(|album| {
                                album.uri.as_deref().map(|album_uri| (album_uri, &album.name))
                            });
                            if let Some((album_uri, album_name)) = album {
                                let request = PlaybackRequest::context_at(album_uri, uri.clone());
                                api.start_playback(device.as_deref(), &request).await?;
                                return Ok(format!(
                                    "▶️ \"{}\" from album \"{}\"",
                                    track.name, album_name
                                ));
                            }
                        }
                        let request = if kind == Some(ItemType::Track) {
                            PlaybackRequest::tracks(vec![uri])
                        } else {
                            PlaybackRequest::context(uri)
                        };
                        api.start_playback(device.as_deref(), &request).await?;
                        Ok::<_, ApiError>(fallback)
                    })
                    .await?;
                player_result(outcome, |message| {
                    message.unwrap_or_else(|| "▶️ Playing".to_string())
                })
            }

            PlayerAction::Pause => {
                let outcome = executor
                    .run_player(action, move |api| async move {
                        api.pause(device.as_deref()).await
                    })
                    .await?;
                player_result(outcome, |_| "⏸️ Paused".to_string())
            }

            PlayerAction::Resume => {
                let outcome = executor
                    .run_player(action, move |api| async move {
                        api.start_playback(device.as_deref(), &PlaybackRequest::resume())
                            .await
                    })
                    .await?;
                player_result(outcome, |_| "▶️ Resumed".to_string())
            }

            PlayerAction::Next => {
                let outcome = executor
                    .run_player(action, move |api| async move {
                        api.next_track(device.as_deref()).await
                    })
                    .await?;
                player_result(outcome, |_| "⏭️ Next".to_string())
            }

            PlayerAction::Prev => {
                let outcome = executor
                    .run_player(action, move |api| async move {
                        api.previous_track(device.as_deref()).await
                    })
                    .await?;
                player_result(outcome, |_| "⏮️ Previous".to_string())
            }

            PlayerAction::Volume => {
                let volume = params.number().unwrap_or(50.0).round().clamp(0.0, 100.0) as u8;
                let outcome = executor
                    .run_player(action, move |api| async move {
                        api.set_volume(volume, device.as_deref()).await
                    })
                    .await?;
                player_result(outcome, |_| format!("🔊 Volume: {}%", volume))
            }

            PlayerAction::Shuffle => {
                let enabled = params.flag().unwrap_or(true);
                let outcome = executor
                    .run_player(action, move |api| async move {
                        api.set_shuffle(enabled, device.as_deref()).await
                    })
                    .await?;
                player_result(outcome, |_| {
                    format!("🔀 Shuffle {}", if enabled { "on" } else { "off" })
                })
            }

            PlayerAction::Repeat => {
                let mode = params
                    .text()
                    .and_then(RepeatMode::parse)
                    .unwrap_or(RepeatMode::Off);
                let outcome = executor
                    .run_player(action, move |api| async move {
                        api.set_repeat(mode, device.as_deref()).await
                    })
                    .await?;
                let label = match mode {
                    RepeatMode::Track => "track",
                    RepeatMode::Context => "album/playlist",
                    RepeatMode::Off => "off",
                };
                player_result(outcome, |_| format!("🔁 Repeat: {}", label))
            }

            PlayerAction::Seek => {
                let position_ms = params.number().unwrap_or(0.0).max(0.0) as u64;
                let outcome = executor
                    .run_player(action, move |api| async move {
                        api.seek(position_ms, device.as_deref()).await
                    })
                    .await?;
                player_result(outcome, |_| {
                    format!("⏩ Position: {}", format_duration(position_ms))
                })
            }

            PlayerAction::Queue => {
                let Some(uri) = params.target_uri() else {
                    return Ok(missing_params("uri or tipo+id"));
                };
                let outcome = executor
                    .run_player(action, move |api| async move {
                        api.add_to_queue(&uri, device.as_deref()).await
                    })
                    .await?;
                player_result(outcome, |_| "➕ Added to queue".to_string())
            }

            PlayerAction::Transfer => {
                let Some(target) = device else {
                    return Ok(missing_params("dispositivo"));
                };
                let outcome = executor
                    .run_player(action, move |api| async move {
                        api.transfer_playback(&target, true).await
                    })
                    .await?;
                player_result(outcome, |_| "📱 Playback transferred".to_string())
            }

            PlayerAction::PlayLiked => {
                let shuffle = params.flag().unwrap_or(false);
                let outcome = executor
                    .run_player(action, move |api| async move {
                        let profile = api.current_user().await?;
                        if shuffle {
                            api.set_shuffle(true, device.as_deref()).await?;
                        }
                        let collection = format!("spotify:user:{}:collection", profile.id);
                        api.start_playback(device.as_deref(), &PlaybackRequest::context(collection))
                            .await
                    })
                    .await?;
                player_result(outcome, |_| {
                    format!(
                        "💚 Playing Liked Songs{}",
                        if shuffle { " (shuffle)" } else { "" }
                    )
                })
            }

            PlayerAction::OpenApp => {
                let force_web = params.flag().unwrap_or(false);
                let message = tokio::task::spawn_blocking(move || {
                    open_app(force_web, |target| open::that(target))
                })
                .await
                .map_err(|e| ToolError::execution_failed(format!("Launcher task failed: {}", e)))??;
                text_result(message)
            }
        };

        Ok(result)
    }

    /// Create a Tool model for this tool (metadata).
    pub fn to_tool() -> Tool {
        Tool {
            name: Self::NAME.into(),
            description: Some(Self::DESCRIPTION.into()),
            input_schema: cached_schema_for_type::<SpotifyPlayerParams>(),
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
                let params: SpotifyPlayerParams =
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
    use crate::domains::spotify::testing::{FakeSpotify, fake_service, unconfigured_service};
    use crate::domains::tools::definitions::common::first_text;
    use serde_json::json;

    fn params(value: serde_json::Value) -> SpotifyPlayerParams {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_params_deserialize() {
        let p = params(json!({ "accion": "playLiked", "valor": true }));
        assert_eq!(p.accion, PlayerAction::PlayLiked);
        assert_eq!(p.valor, Some(PlayerValue::Flag(true)));
        assert!(p.en_contexto);

        let p = params(json!({ "accion": "volume", "valor": 30 }));
        assert_eq!(p.number(), Some(30.0));

        let p = params(json!({ "accion": "repeat", "valor": "track" }));
        assert_eq!(p.text(), Some("track"));

        assert!(serde_json::from_value::<SpotifyPlayerParams>(json!({ "accion": "rewind" })).is_err());
    }

    #[tokio::test]
    async fn test_play_track_in_album_context() {
        let fake = Arc::new(FakeSpotify::new());
        let (service, _, _dir) = fake_service(fake.clone());

        let p = params(json!({ "accion": "play", "tipo": "track", "id": "T" }));
        let result = SpotifyPlayerTool::execute(p, &service).await.unwrap();

        assert!(first_text(&result).contains("from album"));
        assert_eq!(
            fake.playback_requests(),
            vec![PlaybackRequest::context_at(
                "spotify:album:album1",
                "spotify:track:T"
            )]
        );
    }

    #[tokio::test]
    async fn test_play_track_without_album_uri_falls_back_to_single_track() {
        let fake = Arc::new(FakeSpotify::new().without_album_uri());
        let (service, _, _dir) = fake_service(fake.clone());

        let p = params(json!({ "accion": "play", "tipo": "track", "id": "T", "enContexto": true }));
        let result = SpotifyPlayerTool::execute(p, &service).await.unwrap();

        assert_eq!(first_text(&result), "▶️ Playing track");
        let requests = fake.playback_requests();
        assert_eq!(requests, vec![PlaybackRequest::tracks(vec!["spotify:track:T".into()])]);
        assert!(requests.iter().all(|r| r.context_uri.is_none()));
    }

    #[tokio::test]
    async fn test_play_track_out_of_context_skips_lookup() {
        let fake = Arc::new(FakeSpotify::new());
        let (service, _, _dir) = fake_service(fake.clone());

        let p = params(json!({ "accion": "play", "tipo": "track", "id": "T", "enContexto": false }));
        SpotifyPlayerTool::execute(p, &service).await.unwrap();

        assert_eq!(fake.calls(), vec!["start_playback"]);
    }

    #[tokio::test]
    async fn test_play_playlist_uri_uses_context() {
        let fake = Arc::new(FakeSpotify::new());
        let (service, _, _dir) = fake_service(fake.clone());

        let p = params(json!({ "accion": "play", "uri": "spotify:playlist:P" }));
        let result = SpotifyPlayerTool::execute(p, &service).await.unwrap();

        assert_eq!(first_text(&result), "▶️ Playing playlist");
        assert_eq!(
            fake.playback_requests(),
            vec![PlaybackRequest::context("spotify:playlist:P")]
        );
    }

    #[tokio::test]
    async fn test_play_requires_target() {
        let fake = Arc::new(FakeSpotify::new());
        let (service, _, _dir) = fake_service(fake.clone());

        let p = params(json!({ "accion": "play", "tipo": "album" }));
        let result = SpotifyPlayerTool::execute(p, &service).await.unwrap();

        assert!(result.is_error.unwrap_or(false));
        assert!(fake.calls().is_empty());
    }

    #[tokio::test]
    async fn test_volume_is_clamped() {
        let fake = Arc::new(FakeSpotify::new());
        let (service, _, _dir) = fake_service(fake.clone());

        let result = SpotifyPlayerTool::execute(params(json!({ "accion": "volume", "valor": 150 })), &service)
            .await
            .unwrap();
        assert_eq!(first_text(&result), "🔊 Volume: 100%");

        SpotifyPlayerTool::execute(params(json!({ "accion": "volume" })), &service)
            .await
            .unwrap();
        assert_eq!(fake.calls(), vec!["set_volume:100", "set_volume:50"]);
    }

    #[tokio::test]
    async fn test_seek_reports_position() {
        let fake = Arc::new(FakeSpotify::new());
        let (service, _, _dir) = fake_service(fake.clone());

        let result = SpotifyPlayerTool::execute(params(json!({ "accion": "seek", "valor": 90500 })), &service)
            .await
            .unwrap();
        assert_eq!(first_text(&result), "⏩ Position: 1:30");
        assert_eq!(fake.calls(), vec!["seek:90500"]);
    }

    #[tokio::test]
    async fn test_queue_builds_uri_from_type_and_id() {
        let fake = Arc::new(FakeSpotify::new());
        let (service, _, _dir) = fake_service(fake.clone());

        SpotifyPlayerTool::execute(
            params(json!({ "accion": "queue", "tipo": "track", "id": "abc" })),
            &service,
        )
        .await
        .unwrap();
        assert_eq!(fake.calls(), vec!["add_to_queue:spotify:track:abc"]);
    }

    #[tokio::test]
    async fn test_transfer_requires_device() {
        let fake = Arc::new(FakeSpotify::new());
        let (service, _, _dir) = fake_service(fake.clone());

        let result = SpotifyPlayerTool::execute(params(json!({ "accion": "transfer" })), &service)
            .await
            .unwrap();
        assert!(result.is_error.unwrap_or(false));

        SpotifyPlayerTool::execute(
            params(json!({ "accion": "transfer", "dispositivo": "dev1" })),
            &service,
        )
        .await
        .unwrap();
        assert_eq!(fake.calls(), vec!["transfer_playback:dev1:true"]);
    }

    #[tokio::test]
    async fn test_play_liked_with_shuffle() {
        let fake = Arc::new(FakeSpotify::new());
        let (service, _, _dir) = fake_service(fake.clone());

        let result = SpotifyPlayerTool::execute(
            params(json!({ "accion": "playLiked", "valor": true })),
            &service,
        )
        .await
        .unwrap();

        assert!(first_text(&result).contains("(shuffle)"));
        assert_eq!(
            fake.calls(),
            vec!["current_user", "set_shuffle:true", "start_playback"]
        );
        assert_eq!(
            fake.playback_requests(),
            vec![PlaybackRequest::context("spotify:user:user1:collection")]
        );
    }

    #[tokio::test]
    async fn test_failure_is_classified_not_raised() {
        let fake = Arc::new(FakeSpotify::new());
        fake.fail_with("404 Not Found: Player command failed: No active device found");
        let (service, _, _dir) = fake_service(fake);

        let result = SpotifyPlayerTool::execute(params(json!({ "accion": "next" })), &service)
            .await
            .unwrap();
        assert!(result.is_error.unwrap_or(false));
        assert!(first_text(&result).starts_with("📵"));
    }

    #[tokio::test]
    async fn test_parse_artifact_counts_as_success() {
        let fake = Arc::new(FakeSpotify::new());
        fake.fail_with("Unexpected token < in JSON at position 0");
        let (service, _, _dir) = fake_service(fake);

        let result = SpotifyPlayerTool::execute(params(json!({ "accion": "pause" })), &service)
            .await
            .unwrap();
        assert_eq!(first_text(&result), "⏸️ Paused");
    }

    #[tokio::test]
    async fn test_unconfigured_is_an_error() {
        let (service, _dir) = unconfigured_service();
        let err = SpotifyPlayerTool::execute(params(json!({ "accion": "pause" })), &service)
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::Spotify(ref e) if e.is_configuration()));
    }

    #[test]
    fn test_open_app_falls_back_to_web() {
        let opened = parking_lot::Mutex::new(Vec::new());
        let message = open_app(false, |target| {
            opened.lock().push(target.to_string());
            if target == SPOTIFY_APP_URI {
                Err(io::Error::new(io::ErrorKind::NotFound, "no handler"))
            } else {
                Ok(())
            }
        })
        .unwrap();

        assert_eq!(message, "🌐 Opening Spotify Web...");
        assert_eq!(*opened.lock(), vec![SPOTIFY_APP_URI, SPOTIFY_WEB_URL]);
    }

    #[test]
    fn test_open_app_forced_web() {
        let message = open_app(true, |target| {
            assert_eq!(target, SPOTIFY_WEB_URL);
            Ok(())
        })
        .unwrap();
        assert_eq!(message, "🌐 Opening Spotify Web...");
    }

    #[test]
    fn test_open_app_reports_launch_failure() {
        let result = open_app(false, |_| Err(io::Error::other("no display")));
        assert!(matches!(result, Err(ToolError::ExecutionFailed(_))));
    }
}
