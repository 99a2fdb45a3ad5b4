//! Spotify search and information tool.
//!
//! Read-only queries. Remote failures are not classified here; they surface
//! as protocol errors from the route.

use futures::FutureExt;
use rmcp::{
    ErrorData as McpError,
    handler::server::tool::{ToolCallContext, ToolRoute, cached_schema_for_type},
    model::{CallToolResult, Tool},
};
use schemars::JsonSchema;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, info, instrument};

use super::common::{
    artist_names, default_limit, format_duration, missing_params, non_empty, text_result,
    track_line, validate_limit,
};
use crate::domains::spotify::SpotifyService;
use crate::domains::spotify::models::{
    Device, ItemType, PlayableItem, PlaybackState, SearchResults, TimeRange, Track, UserProfile,
};
use crate::domains::tools::ToolError;

const NO_RESULTS: &str = "No results";

/// Information actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub enum InfoAction {
    Search,
    NowPlaying,
    Devices,
    Profile,
    Queue,
    History,
    Saved,
    Playlists,
    PlaylistTracks,
    AlbumTracks,
    ArtistTop,
    TopTracks,
    TopArtists,
    State,
}

impl InfoAction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Search => "search",
            Self::NowPlaying => "nowPlaying",
            Self::Devices => "devices",
            Self::Profile => "profile",
            Self::Queue => "queue",
            Self::History => "history",
            Self::Saved => "saved",
            Self::Playlists => "playlists",
            Self::PlaylistTracks => "playlistTracks",
            Self::AlbumTracks => "albumTracks",
            Self::ArtistTop => "artistTop",
            Self::TopTracks => "topTracks",
            Self::TopArtists => "topArtists",
            Self::State => "state",
        }
    }
}

fn default_market() -> String {
    "ES".to_string()
}

/// Parameters for the information tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct SpotifyInfoParams {
    #[schemars(description = "Action to perform")]
    pub accion: InfoAction,

    #[schemars(description = "Search text (for search)")]
    #[serde(default)]
    pub consulta: Option<String>,

    #[schemars(description = "Search type")]
    #[serde(default)]
    pub tipo: Option<ItemType>,

    #[schemars(description = "Playlist/album/artist ID")]
    #[serde(default)]
    pub id: Option<String>,

    #[schemars(description = "Number of results (1-50, default: 20)")]
    #[serde(default = "default_limit")]
    pub limite: u32,

    #[schemars(description = "Starting position (default: 0)")]
    #[serde(default)]
    pub offset: u32,

    #[schemars(
        description = "Period for top items: short_term = 4 weeks, medium_term = 6 months, long_term = years"
    )]
    #[serde(default)]
    pub periodo: TimeRange,

    #[schemars(description = "ISO country code (ES, MX, US); default ES")]
    #[serde(default = "default_market")]
    pub mercado: String,
}

impl SpotifyInfoParams {
    pub fn new(accion: InfoAction) -> Self {
        Self {
            accion,
            consulta: None,
            tipo: None,
            id: None,
            limite: default_limit(),
            offset: 0,
            periodo: TimeRange::default(),
            mercado: default_market(),
        }
    }
}

/// Spotify information tool.
#[derive(Debug, Clone)]
pub struct SpotifyInfoTool;

impl SpotifyInfoTool {
    /// Tool name as registered in MCP.
    pub const NAME: &'static str = "spotifyInfo";

    /// Tool description shown to clients.
    pub const DESCRIPTION: &'static str = "Searches and reads information: search, nowPlaying, devices, profile, queue, history, saved, playlists, playlistTracks, albumTracks, artistTop, topTracks, topArtists, state. Results include IDs usable with spotifyPlayer and spotifyLibrary.";

    /// Execute one information action.
    #[instrument(skip_all, fields(accion = params.accion.as_str()))]
    pub async fn execute(
        params: SpotifyInfoParams,
        service: &SpotifyService,
    ) -> Result<CallToolResult, ToolError> {
        info!("spotifyInfo: {}", params.accion.as_str());

        let executor = service.executor();
        let limit = validate_limit(params.limite);
        let offset = params.offset;
        let id = non_empty(&params.id).map(String::from);

        let text = match params.accion {
            InfoAction::Search => {
                let (Some(query), Some(kind)) = (non_empty(&params.consulta), params.tipo) else {
                    return Ok(missing_params("consulta and tipo"));
                };
                let query = query.to_string();
                let market = params.mercado.clone();
                let results = {
                    let query = query.clone();
                    executor
                        .run(move |api| async move {
                            api.search(&query, kind, limit, offset, &market).await
                        })
                        .await?
                };
                let lines = results.map(|r| search_lines(r, kind)).unwrap_or_default();
                debug!(query = %query, count = lines.len(), "Search finished");
                if lines.is_empty() {
                    NO_RESULTS.to_string()
                } else {
                    format!("# Results: \"{}\"\n\n{}", query, lines.join("\n"))
                }
            }

            InfoAction::NowPlaying => {
                let current = executor
                    .run(|api| async move { api.currently_playing().await })
                    .await?
                    .flatten();
                match current.as_ref().and_then(|c| c.item.as_ref().map(|item| (c, item))) {
                    None => "🔇 Nothing playing".to_string(),
                    Some((current, item)) => match item.as_track() {
                        None => "🎙️ Playing a podcast".to_string(),
                        Some(track) => format!(
                            "# {} {}\n\n**Artist**: {}\n**Album**: {}\n**Progress**: {} / {}\n**ID**: {}",
                            if current.is_playing { "▶️" } else { "⏸️" },
                            track.name,
                            artist_names(&track.artists),
                            track.album.as_ref().map_or("?", |a| a.name.as_str()),
                            format_duration(current.progress_ms.unwrap_or(0)),
                            format_duration(track.duration_ms),
                            track.id
                        ),
                    },
                }
            }

            InfoAction::Devices => {
                let devices = executor
                    .run(|api| async move { api.devices().await })
                    .await?
                    .unwrap_or_default();
                if devices.is_empty() {
                    "📵 No devices. Open Spotify.".to_string()
                } else {
                    let lines: Vec<String> = devices
                        .iter()
                        .enumerate()
                        .map(|(i, d)| device_line(i + 1, d))
                        .collect();
                    format!("# Devices\n\n{}", lines.join("\n"))
                }
            }

            InfoAction::Profile => {
                let profile = executor
                    .run(|api| async move { api.current_user().await })
                    .await?
                    .unwrap_or_default();
                profile_text(&profile)
            }

            InfoAction::Queue => {
                let queue = executor
                    .run(|api| async move { api.queue().await })
                    .await?
                    .unwrap_or_default();
                if queue.queue.is_empty() {
                    "📭 Empty queue".to_string()
                } else {
                    let now = queue
                        .currently_playing
                        .as_ref()
                        .and_then(PlayableItem::as_track)
                        .map(|t| format!("**Now**: \"{}\" - {}\n\n", t.name, artist_names(&t.artists)))
                        .unwrap_or_default();
                    let lines: Vec<String> = queue
                        .queue
                        .iter()
                        .take(limit as usize)
                        .enumerate()
                        .map(|(i, item)| playable_line(i + 1, Some(item)))
                        .collect();
                    format!("# Queue\n\n{}**Up next:**\n{}", now, lines.join("\n"))
                }
            }

            InfoAction::History => {
                let history = executor
                    .run(move |api| async move { api.recently_played(limit).await })
                    .await?
                    .unwrap_or_default();
                if history.items.is_empty() {
                    "📭 No history".to_string()
                } else {
                    let lines: Vec<String> = history
                        .items
                        .iter()
                        .enumerate()
                        .map(|(i, h)| track_line(i + 1, &h.track))
                        .collect();
                    format!("# History\n\n{}", lines.join("\n"))
                }
            }

            InfoAction::Saved => {
                let saved = executor
                    .run(move |api| async move { api.saved_tracks(limit, offset).await })
                    .await?
                    .unwrap_or_default();
                if saved.items.is_empty() {
                    "📭 No saved tracks".to_string()
                } else {
                    let start = offset as usize;
                    let lines: Vec<String> = saved
                        .items
                        .iter()
                        .enumerate()
                        .map(|(i, s)| track_line(start + i + 1, &s.track))
                        .collect();
                    format!(
                        "# Saved tracks ({}-{} of {})\n\n{}",
                        start + 1,
                        start + saved.items.len(),
                        saved.total,
                        lines.join("\n")
                    )
                }
            }

            InfoAction::Playlists => {
                let playlists = executor
                    .run(move |api| async move { api.current_user_playlists(limit, offset).await })
                    .await?
                    .unwrap_or_default();
                if playlists.items.is_empty() {
                    "📭 No playlists".to_string()
                } else {
                    let lines: Vec<String> = playlists
                        .items
                        .iter()
                        .enumerate()
                        .map(|(i, p)| {
                            format!(
                                "{}. \"{}\" ({} tracks) | ID: {}",
                                i + 1,
                                p.name,
                                p.tracks.as_ref().map_or(0, |t| t.total),
                                p.id
                            )
                        })
                        .collect();
                    format!("# Your Playlists\n\n{}", lines.join("\n"))
                }
            }

            InfoAction::PlaylistTracks => {
                let Some(playlist_id) = id else {
                    return Ok(missing_params("playlist id"));
                };
                let items = executor
                    .run(move |api| async move {
                        api.playlist_items(&playlist_id, limit, offset).await
                    })
                    .await?
                    .unwrap_or_default();
                if items.items.is_empty() {
                    "📭 Empty playlist".to_string()
                } else {
                    let lines: Vec<String> = items
                        .items
                        .iter()
                        .enumerate()
                        .map(|(i, item)| playable_line(i + 1, item.track.as_ref()))
                        .collect();
                    format!("# Playlist Tracks\n\n{}", lines.join("\n"))
                }
            }

            InfoAction::AlbumTracks => {
                let Some(album_id) = id else {
                    return Ok(missing_params("album id"));
                };
                let market = params.mercado.clone();
                let album = executor
                    .run(move |api| async move { api.album(&album_id, &market).await })
                    .await?
                    .unwrap_or_default();
                if album.tracks.items.is_empty() {
                    "📭 No tracks".to_string()
                } else {
                    let lines = numbered_durations(album.tracks.items.iter().take(limit as usize));
                    format!("# Album: {}\n\n{}", album.name, lines)
                }
            }

            InfoAction::ArtistTop => {
                let Some(artist_id) = id else {
                    return Ok(missing_params("artist id"));
                };
                let market = params.mercado.clone();
                let tracks = executor
                    .run(move |api| async move { api.artist_top_tracks(&artist_id, &market).await })
                    .await?
                    .unwrap_or_default();
                if tracks.is_empty() {
                    "📭 No tracks".to_string()
                } else {
                    format!("# Artist Top Tracks\n\n{}", numbered_durations(tracks.iter()))
                }
            }

            InfoAction::TopTracks => {
                let range = params.periodo;
                let top = executor
                    .run(move |api| async move { api.top_tracks(range, limit).await })
                    .await?
                    .unwrap_or_default();
                if top.items.is_empty() {
                    "📭 No data".to_string()
                } else {
                    let lines: Vec<String> = top
                        .items
                        .iter()
                        .enumerate()
                        .map(|(i, t)| track_line(i + 1, t))
                        .collect();
                    format!("# Top Tracks ({})\n\n{}", range.label(), lines.join("\n"))
                }
            }

            InfoAction::TopArtists => {
                let range = params.periodo;
                let top = executor
                    .run(move |api| async move { api.top_artists(range, limit).await })
                    .await?
                    .unwrap_or_default();
                if top.items.is_empty() {
                    "📭 No data".to_string()
                } else {
                    let lines: Vec<String> = top
                        .items
                        .iter()
                        .enumerate()
                        .map(|(i, a)| {
                            let genres = if a.genres.is_empty() {
                                "N/A".to_string()
                            } else {
                                a.genres.iter().take(3).cloned().collect::<Vec<_>>().join(", ")
                            };
                            format!("{}. {} | Genres: {} | ID: {}", i + 1, a.name, genres, a.id)
                        })
                        .collect();
                    format!("# Top Artists ({})\n\n{}", range.label(), lines.join("\n"))
                }
            }

            InfoAction::State => {
                let state = executor
                    .run(|api| async move { api.playback_state().await })
                    .await?
                    .flatten();
                match state {
                    None => "📵 No active session".to_string(),
                    Some(state) => state_text(&state),
                }
            }
        };

        Ok(text_result(text))
    }

    /// Create a Tool model for this tool (metadata).
    pub fn to_tool() -> Tool {
        Tool {
            name: Self::NAME.into(),
            description: Some(Self::DESCRIPTION.into()),
            input_schema: cached_schema_for_type::<SpotifyInfoParams>(),
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
                let params: SpotifyInfoParams =
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
// Formatting
// ============================================================================

fn search_lines(results: SearchResults, kind: ItemType) -> Vec<String> {
    match kind {
        ItemType::Track => results
            .tracks
            .unwrap_or_default()
            .items
            .iter()
            .enumerate()
            .map(|(i, t)| {
                format!(
                    "{}. \"{}\" - {} ({}) | ID: {}",
                    i + 1,
                    t.name,
                    artist_names(&t.artists),
                    format_duration(t.duration_ms),
                    t.id
                )
            })
            .collect(),
        ItemType::Album => results
            .albums
            .unwrap_or_default()
            .items
            .iter()
            .enumerate()
            .map(|(i, a)| {
                format!(
                    "{}. \"{}\" - {} | ID: {}",
                    i + 1,
                    a.name,
                    artist_names(&a.artists),
                    a.id
                )
            })
            .collect(),
        ItemType::Artist => results
            .artists
            .unwrap_or_default()
            .items
            .iter()
            .enumerate()
            .map(|(i, a)| format!("{}. {} | ID: {}", i + 1, a.name, a.id))
            .collect(),
        ItemType::Playlist => results
            .playlists
            .unwrap_or_default()
            .items
            .into_iter()
            .flatten()
            .enumerate()
            .map(|(i, p)| {
                let owner = p
                    .owner
                    .and_then(|o| o.display_name)
                    .unwrap_or_else(|| "?".to_string());
                format!("{}. \"{}\" by {} | ID: {}", i + 1, p.name, owner, p.id)
            })
            .collect(),
    }
}

fn playable_line(position: usize, item: Option<&PlayableItem>) -> String {
    match item.and_then(PlayableItem::as_track) {
        Some(track) => track_line(position, track),
        None => format!("{}. ?", position),
    }
}

fn numbered_durations<'a>(tracks: impl Iterator<Item = &'a Track>) -> String {
    tracks
        .enumerate()
        .map(|(i, t)| {
            format!(
                "{}. \"{}\" ({}) | ID: {}",
                i + 1,
                t.name,
                format_duration(t.duration_ms),
                t.id
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn device_line(position: usize, device: &Device) -> String {
    format!(
        "{}. {} ({}){} | Vol: {} | ID: {}",
        position,
        device.name,
        device.kind,
        if device.is_active { " ✓" } else { "" },
        device
            .volume_percent
            .map_or_else(|| "N/A".to_string(), |v| format!("{}%", v)),
        device.id.as_deref().unwrap_or("?")
    )
}

fn profile_text(profile: &UserProfile) -> String {
    let or_na = |value: &Option<String>| value.clone().unwrap_or_else(|| "N/A".to_string());
    let mut text = format!(
        "# Profile\n\n**Name**: {}\n**Email**: {}\n**Country**: {}\n**Plan**: {}\n**ID**: {}",
        or_na(&profile.display_name),
        or_na(&profile.email),
        or_na(&profile.country),
        or_na(&profile.product),
        profile.id
    );
    if let Some(followers) = &profile.followers {
        text.push_str(&format!("\n**Followers**: {}", followers.total));
    }
    text
}

fn state_text(state: &PlaybackState) -> String {
    let yes_no = |b: bool| if b { "Yes" } else { "No" };
    let repeat = match state.repeat_state.as_str() {
        "track" => "Track",
        "context" => "Album/Playlist",
        "off" => "No",
        other => other,
    };
    format!(
        "# Playback State\n\n**Device**: {}\n**Volume**: {}\n**Shuffle**: {}\n**Repeat**: {}\n**Playing**: {}",
        state.device.as_ref().map_or("?", |d| d.name.as_str()),
        state
            .device
            .as_ref()
            .and_then(|d| d.volume_percent)
            .map_or_else(|| "N/A".to_string(), |v| format!("{}%", v)),
        yes_no(state.shuffle_state),
        repeat,
        yes_no(state.is_playing)
    )
}

// ============================================================================
// Tests
// ============================================================================
