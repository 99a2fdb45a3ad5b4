//! The remote Web API surface used by the tools.
//!
//! Every method maps to a single HTTP call. Implementations report failures as
//! [`ApiError`] whose message text is what the executors classify.

use async_trait::async_trait;

use super::error::ApiResult;
use super::models::{
    Album, Artist, CurrentlyPlaying, Device, ItemType, NewPlaylist, Page, PlayHistory,
    PlaybackRequest, PlaybackState, PlaylistItem, Queue, RepeatMode, SavedTrack, SearchResults,
    SimplifiedPlaylist, TimeRange, Track, UserProfile,
};

#[async_trait]
pub trait SpotifyApi: Send + Sync {
    // ------------------------------------------------------------------
    // Catalog and account queries
    // ------------------------------------------------------------------

    async fn search(
        &self,
        query: &str,
        kind: ItemType,
        limit: u32,
        offset: u32,
        market: &str,
    ) -> ApiResult<SearchResults>;

    async fn track(&self, id: &str) -> ApiResult<Track>;

    async fn album(&self, id: &str, market: &str) -> ApiResult<Album>;

    async fn artist_top_tracks(&self, id: &str, market: &str) -> ApiResult<Vec<Track>>;

    async fn current_user(&self) -> ApiResult<UserProfile>;

    /// `None` when nothing is playing (204 response).
    async fn currently_playing(&self) -> ApiResult<Option<CurrentlyPlaying>>;

    /// `None` when there is no active playback session.
    async fn playback_state(&self) -> ApiResult<Option<PlaybackState>>;

    async fn devices(&self) -> ApiResult<Vec<Device>>;

    async fn queue(&self) -> ApiResult<Queue>;

    async fn recently_played(&self, limit: u32) -> ApiResult<Page<PlayHistory>>;

    async fn saved_tracks(&self, limit: u32, offset: u32) -> ApiResult<Page<SavedTrack>>;

    async fn current_user_playlists(
        &self,
        limit: u32,
        offset: u32,
    ) -> ApiResult<Page<SimplifiedPlaylist>>;

    async fn playlist_items(
        &self,
        playlist_id: &str,
        limit: u32,
        offset: u32,
    ) -> ApiResult<Page<PlaylistItem>>;

    async fn top_tracks(&self, range: TimeRange, limit: u32) -> ApiResult<Page<Track>>;

    async fn top_artists(&self, range: TimeRange, limit: u32) -> ApiResult<Page<Artist>>;

    // ------------------------------------------------------------------
    // Player control
    // ------------------------------------------------------------------

    async fn start_playback(
        &self,
        device_id: Option<&str>,
        request: &PlaybackRequest,
    ) -> ApiResult<()>;

    async fn pause(&self, device_id: Option<&str>) -> ApiResult<()>;

    async fn next_track(&self, device_id: Option<&str>) -> ApiResult<()>;

    async fn previous_track(&self, device_id: Option<&str>) -> ApiResult<()>;

    async fn set_volume(&self, percent: u8, device_id: Option<&str>) -> ApiResult<()>;

    async fn set_shuffle(&self, state: bool, device_id: Option<&str>) -> ApiResult<()>;

    async fn set_repeat(&self, mode: RepeatMode, device_id: Option<&str>) -> ApiResult<()>;

    async fn seek(&self, position_ms: u64, device_id: Option<&str>) -> ApiResult<()>;

    async fn add_to_queue(&self, uri: &str, device_id: Option<&str>) -> ApiResult<()>;

    async fn transfer_playback(&self, device_id: &str, play: bool) -> ApiResult<()>;

    // ------------------------------------------------------------------
    // Library and playlists
    // ------------------------------------------------------------------

    async fn save_tracks(&self, ids: &[String]) -> ApiResult<()>;

    async fn remove_saved_tracks(&self, ids: &[String]) -> ApiResult<()>;

    async fn contains_saved_tracks(&self, ids: &[String]) -> ApiResult<Vec<bool>>;

    async fn create_playlist(
        &self,
        user_id: &str,
        playlist: &NewPlaylist,
    ) -> ApiResult<SimplifiedPlaylist>;

    async fn add_playlist_items(
        &self,
        playlist_id: &str,
        uris: &[String],
        position: Option<u32>,
    ) -> ApiResult<()>;

    async fn remove_playlist_items(&self, playlist_id: &str, uris: &[String]) -> ApiResult<()>;

    /// Deleting a playlist is unfollowing it.
    async fn unfollow_playlist(&self, playlist_id: &str) -> ApiResult<()>;

    async fn change_playlist_details(
        &self,
        playlist_id: &str,
        name: &str,
        description: Option<&str>,
    ) -> ApiResult<()>;
}
