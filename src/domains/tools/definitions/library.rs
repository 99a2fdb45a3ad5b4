//! Spotify library and playlist management tool.

use futures::FutureExt;
use rmcp::{
    ErrorData as McpError,
    handler::server::tool::{ToolCallContext, ToolRoute, cached_schema_for_type},
    model::{CallToolResult, Tool},
};
use schemars::JsonSchema;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, instrument};

use super::common::{clean_ids, missing_params, non_empty, text_result, track_uri};
use crate::domains::spotify::models::NewPlaylist;
use crate::domains::spotify::{ApiError, SpotifyService};
use crate::domains::tools::ToolError;

/// Library actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub enum LibraryAction {
    Save,
    Remove,
    Check,
    CreatePlaylist,
    AddToPlaylist,
    RemoveFromPlaylist,
    DeletePlaylist,
    RenamePlaylist,
}

impl LibraryAction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Save => "save",
            Self::Remove => "remove",
            Self::Check => "check",
            Self::CreatePlaylist => "createPlaylist",
            Self::AddToPlaylist => "addToPlaylist",
            Self::RemoveFromPlaylist => "removeFromPlaylist",
            Self::DeletePlaylist => "deletePlaylist",
            Self::RenamePlaylist => "renamePlaylist",
        }
    }
}

/// Parameters for the library tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct SpotifyLibraryParams {
    #[schemars(
        description = "save = add to Liked Songs, remove = remove from Liked Songs, check = whether saved, createPlaylist, addToPlaylist, removeFromPlaylist, deletePlaylist, renamePlaylist"
    )]
    pub accion: LibraryAction,

    #[schemars(description = "Track IDs (from spotifyInfo search/nowPlaying)")]
    #[serde(default)]
    pub ids: Vec<String>,

    #[schemars(description = "Playlist ID (from spotifyInfo playlists)")]
    #[serde(default, rename = "playlistId")]
    pub playlist_id: Option<String>,

    #[schemars(description = "Name for createPlaylist or renamePlaylist")]
    #[serde(default)]
    pub nombre: Option<String>,

    #[schemars(description = "Playlist description (optional)")]
    #[serde(default)]
    pub descripcion: Option<String>,

    #[schemars(description = "Whether the playlist is public (default: false)")]
    #[serde(default)]
    pub publica: bool,

    #[schemars(description = "Position to insert tracks in the playlist (0 = start)")]
    #[serde(default)]
    pub posicion: Option<u32>,
}

impl SpotifyLibraryParams {
    pub fn new(accion: LibraryAction) -> Self {
        Self {
            accion,
            ids: Vec::new(),
            playlist_id: None,
            nombre: None,
            descripcion: None,
            publica: false,
            posicion: None,
        }
    }

    pub fn with_ids(mut self, ids: &[&str]) -> Self {
        self.ids = ids.iter().map(|id| id.to_string()).collect();
        self
    }
}

/// Library endpoints take bare ids.
fn bare_track_id(id: String) -> String {
    match id.strip_prefix("spotify:track:") {
        Some(bare) => bare.to_string(),
        None => id,
    }
}

/// Spotify library and playlist tool.
#[derive(Debug, Clone)]
pub struct SpotifyLibraryTool;

impl SpotifyLibraryTool {
    /// Tool name as registered in MCP.
    pub const NAME: &'static str = "spotifyLibrary";

    /// Tool description shown to clients.
    pub const DESCRIPTION: &'static str = "Manages the user's library and playlists. COMMON FLOWS:
- Save the current track: first spotifyInfo(nowPlaying) to get its ID, then save(ids=[ID])
- Create a playlist with tracks: 1) createPlaylist(nombre=\"My Playlist\"), 2) addToPlaylist(playlistId=PLAYLIST_ID, ids=[track IDs])
- List the user's playlists: spotifyInfo(playlists)
- List a playlist's tracks: spotifyInfo(playlistTracks, id=PLAYLIST_ID)
NOTE: track IDs come from spotifyInfo(search) or spotifyInfo(nowPlaying).";

    /// Execute one library action.
    #[instrument(skip_all, fields(accion = params.accion.as_str()))]
    pub async fn execute(
        params: SpotifyLibraryParams,
        service: &SpotifyService,
    ) -> Result<CallToolResult, ToolError> {
        info!("spotifyLibrary: {}", params.accion.as_str());

        let executor = service.executor();
        let ids = clean_ids(&params.ids);
        let playlist_id = non_empty(&params.playlist_id).map(String::from);
        let name = non_empty(&params.nombre).map(String::from);
        let description = non_empty(&params.descripcion).map(String::from);

        let text = match params.accion {
            LibraryAction::Save => {
                if ids.is_empty() {
                    return Ok(missing_params("ids"));
                }
                let ids: Vec<String> = ids.into_iter().map(bare_track_id).collect();
                let count = ids.len();
                executor
                    .run(move |api| async move { api.save_tracks(&ids).await })
                    .await?;
                format!("💚 {} track(s) saved", count)
            }

            LibraryAction::Remove => {
                if ids.is_empty() {
                    return Ok(missing_params("ids"));
                }
                let ids: Vec<String> = ids.into_iter().map(bare_track_id).collect();
                let count = ids.len();
                executor
                    .run(move |api| async move { api.remove_saved_tracks(&ids).await })
                    .await?;
                format!("🗑️ {} track(s) removed", count)
            }

            LibraryAction::Check => {
                if ids.is_empty() {
                    return Ok(missing_params("ids"));
                }
                let ids: Vec<String> = ids.into_iter().map(bare_track_id).collect();
                let saved = {
                    let ids = ids.clone();
                    executor
                        .run(move |api| async move { api.contains_saved_tracks(&ids).await })
                        .await?
                        .unwrap_or_default()
                };
                let lines: Vec<String> = ids
                    .iter()
                    .enumerate()
                    .map(|(i, id)| {
                        let status = if saved.get(i).copied().unwrap_or(false) {
                            "✓ Saved"
                        } else {
                            "✗ Not saved"
                        };
                        format!("{}: {}", id, status)
                    })
                    .collect();
                format!("# Status\n\n{}", lines.join("\n"))
            }

            LibraryAction::CreatePlaylist => {
                let Some(name) = name else {
                    return Ok(missing_params("nombre"));
                };
                let new_playlist = NewPlaylist {
                    name: name.clone(),
                    description,
                    public: params.publica,
                };
                let created = executor
                    .run(move |api| async move {
                        let profile = api.current_user().await?;
                        let created = api.create_playlist(&profile.id, &new_playlist).await?;
                        Ok::<_, ApiError>(created)
                    })
                    .await?;
                match created {
                    Some(playlist) => format!("✓ Playlist \"{}\" created\nID: {}", name, playlist.id),
                    None => format!("✓ Playlist \"{}\" created", name),
                }
            }

            LibraryAction::AddToPlaylist => {
                let (Some(playlist_id), false) = (playlist_id, ids.is_empty()) else {
                    return Ok(missing_params("playlistId and ids"));
                };
                let uris: Vec<String> = ids.iter().map(|id| track_uri(id)).collect();
                let count = uris.len();
                let position = params.posicion;
                executor
                    .run(move |api| async move {
                        api.add_playlist_items(&playlist_id, &uris, position).await
                    })
                    .await?;
                format!("➕ {} track(s) added", count)
            }

            LibraryAction::RemoveFromPlaylist => {
                let (Some(playlist_id), false) = (playlist_id, ids.is_empty()) else {
                    return Ok(missing_params("playlistId and ids"));
                };
                let uris: Vec<String> = ids.iter().map(|id| track_uri(id)).collect();
                let count = uris.len();
                executor
                    .run(move |api| async move {
                        api.remove_playlist_items(&playlist_id, &uris).await
                    })
                    .await?;
                format!("🗑️ {} track(s) removed from playlist", count)
            }

            LibraryAction::DeletePlaylist => {
                let Some(playlist_id) = playlist_id else {
                    return Ok(missing_params("playlistId"));
                };
                executor
                    .run(move |api| async move { api.unfollow_playlist(&playlist_id).await })
                    .await?;
                "🗑️ Playlist deleted".to_string()
            }

            LibraryAction::RenamePlaylist => {
                let Some(playlist_id) = playlist_id else {
                    return Ok(missing_params("playlistId"));
                };
                let Some(name) = name else {
                    return Ok(missing_params("nombre"));
                };
                let new_name = name.clone();
                executor
                    .run(move |api| async move {
                        api.change_playlist_details(&playlist_id, &new_name, description.as_deref())
                            .await
                    })
                    .await?;
                format!("✏️ Playlist renamed to \"{}\"", name)
            }
        };

        Ok(text_result(text))
    }

    /// Create a Tool model for this tool (metadata).
    pub fn to_tool() -> Tool {
        Tool {
            name: Self::NAME.into(),
            description: Some(Self::DESCRIPTION.into()),
            input_schema: cached_schema_for_type::<SpotifyLibraryParams>(),
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
                let params: SpotifyLibraryParams =
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
