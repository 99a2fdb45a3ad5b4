//! In-memory test doubles for the Web API and the client provider.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tempfile::TempDir;

use super::api::SpotifyApi;
use super::error::{ApiError, ApiResult, SpotifyError};
use super::models::{
    Album, AlbumRef, Artist, CurrentlyPlaying, Device, ItemType, NewPlaylist, Page, PlayHistory,
    PlayableItem, PlaybackRequest, PlaybackState, PlaylistItem, PlaylistOwner, PlaylistTracksRef,
    Queue, RepeatMode, SavedTrack, SearchResults, SimplifiedPlaylist, TimeRange, Track,
    UserProfile,
};
use super::credentials::{CredentialStore, IdentityFallback};
use super::provider::ClientProvider;
use super::service::SpotifyService;

pub fn track(id: &str, album_uri: Option<&str>) -> Track {
    Track {
        id: id.to_string(),
        name: format!("Song {id}"),
        duration_ms: 185_000,
        artists: vec![Artist {
            id: "artist1".to_string(),
            name: "Test Artist".to_string(),
            genres: vec!["rock".to_string()],
        }],
        album: Some(AlbumRef {
            id: "album1".to_string(),
            name: "Test Album".to_string(),
            uri: album_uri.map(String::from),
            artists: Vec::new(),
        }),
        uri: ItemType::Track.uri(id),
    }
}

pub fn playlist(id: &str, name: &str) -> SimplifiedPlaylist {
    SimplifiedPlaylist {
        id: id.to_string(),
        name: name.to_string(),
        owner: Some(PlaylistOwner {
            display_name: Some("Test User".to_string()),
        }),
        tracks: Some(PlaylistTracksRef { total: 12 }),
    }
}

struct FakeState {
    calls: Vec<String>,
    playback: Vec<PlaybackRequest>,
    saved: BTreeSet<String>,
    playlists: Vec<SimplifiedPlaylist>,
    album_uri: Option<String>,
    failure: Option<String>,
}

/// Fake Web API that records every call.
///
/// Saved tracks are kept in memory so save/check/remove compose. A failure
/// message set with [`FakeSpotify::fail_with`] is returned by every call.
pub struct FakeSpotify {
    state: Mutex<FakeState>,
}

impl Default for FakeSpotify {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeSpotify {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(FakeState {
                calls: Vec::new(),
                playback: Vec::new(),
                saved: BTreeSet::new(),
                playlists: Vec::new(),
                album_uri: Some("spotify:album:album1".to_string()),
                failure: None,
            }),
        }
    }

    /// Tracks looked up by id have no album URI.
    pub fn without_album_uri(self) -> Self {
        self.state.lock().album_uri = None;
        self
    }

    pub fn with_playlists(self, playlists: Vec<SimplifiedPlaylist>) -> Self {
        self.state.lock().playlists = playlists;
        self
    }

    pub fn fail_with(&self, message: &str) {
        self.state.lock().failure = Some(message.to_string());
    }

    /// Names of the methods called, in order.
    pub fn calls(&self) -> Vec<String> {
        self.state.lock().calls.clone()
    }

    /// Bodies passed to `start_playback`, in order.
    pub fn playback_requests(&self) -> Vec<PlaybackRequest> {
        self.state.lock().playback.clone()
    }

    fn record(&self, name: &str) -> ApiResult<()> {
        let mut state = self.state.lock();
        state.calls.push(name.to_string());
        match &state.failure {
            Some(message) => Err(ApiError::new(message.clone())),
            None => Ok(()),
        }
    }

    fn lookup(&self, id: &str) -> Track {
        track(id, self.state.lock().album_uri.as_deref())
    }
}

#[async_trait]
impl SpotifyApi for FakeSpotify {
    async fn search(
        &self,
        query: &str,
        kind: ItemType,
        _limit: u32,
        _offset: u32,
        _market: &str,
    ) -> ApiResult<SearchResults> {
        self.record("search")?;
        let mut results = SearchResults::default();
        match kind {
            ItemType::Track => results.tracks = Some(Page::new(vec![self.lookup("t1")])),
            ItemType::Album => {
                results.albums = Some(Page::new(vec![AlbumRef {
                    id: "album1".into(),
                    name: format!("{query} Album"),
                    uri: Some("spotify:album:album1".into()),
                    artists: self.lookup("t1").artists,
                }]))
            }
            ItemType::Artist => results.artists = Some(Page::new(self.lookup("t1").artists)),
            ItemType::Playlist => {
                results.playlists = Some(Page::new(vec![None, Some(playlist("p1", query))]))
            }
        }
        Ok(results)
    }

    async fn track(&self, id: &str) -> ApiResult<Track> {
        self.record("track")?;
        Ok(self.lookup(id))
    }

    async fn album(&self, id: &str, _market: &str) -> ApiResult<Album> {
        self.record("album")?;
        let mut first = self.lookup("a1");
        first.album = None;
        Ok(Album {
            id: id.to_string(),
            name: "Test Album".to_string(),
            tracks: Page::new(vec![first]),
        })
    }

    async fn artist_top_tracks(&self, _id: &str, _market: &str) -> ApiResult<Vec<Track>> {
        self.record("artist_top_tracks")?;
        Ok(vec![self.lookup("top1"), self.lookup("top2")])
    }

    async fn current_user(&self) -> ApiResult<UserProfile> {
        self.record("current_user")?;
        Ok(UserProfile {
            id: "user1".to_string(),
            display_name: Some("Test User".to_string()),
            email: Some("user@example.com".to_string()),
            country: Some("ES".to_string()),
            product: Some("premium".to_string()),
            followers: None,
        })
    }

    async fn currently_playing(&self) -> ApiResult<Option<CurrentlyPlaying>> {
        self.record("currently_playing")?;
        Ok(Some(CurrentlyPlaying {
            is_playing: true,
            progress_ms: Some(61_000),
            item: Some(PlayableItem::Track(self.lookup("now1"))),
        }))
    }

    async fn playback_state(&self) -> ApiResult<Option<PlaybackState>> {
        self.record("playback_state")?;
        Ok(None)
    }

    async fn devices(&self) -> ApiResult<Vec<Device>> {
        self.record("devices")?;
        Ok(vec![Device {
            id: Some("dev1".to_string()),
            name: "Laptop".to_string(),
            kind: "Computer".to_string(),
            is_active: true,
            volume_percent: Some(40),
        }])
    }

    async fn queue(&self) -> ApiResult<Queue> {
        self.record("queue")?;
        Ok(Queue {
            currently_playing: Some(PlayableItem::Track(self.lookup("now1"))),
            queue: vec![
                PlayableItem::Track(self.lookup("q1")),
                PlayableItem::Track(self.lookup("q2")),
                PlayableItem::Track(self.lookup("q3")),
            ],
        })
    }

    async fn recently_played(&self, _limit: u32) -> ApiResult<Page<PlayHistory>> {
        self.record("recently_played")?;
        Ok(Page::new(vec![PlayHistory {
            track: self.lookup("h1"),
        }]))
    }

    async fn saved_tracks(&self, _limit: u32, _offset: u32) -> ApiResult<Page<SavedTrack>> {
        self.record("saved_tracks")?;
        let ids: Vec<String> = self.state.lock().saved.iter().cloned().collect();
        Ok(Page::new(
            ids.iter()
                .map(|id| SavedTrack {
                    track: self.lookup(id),
                })
                .collect(),
        ))
    }

    async fn current_user_playlists(
        &self,
        _limit: u32,
        _offset: u32,
    ) -> ApiResult<Page<SimplifiedPlaylist>> {
        self.record("current_user_playlists")?;
        Ok(Page::new(self.state.lock().playlists.clone()))
    }

    async fn playlist_items(
        &self,
        _playlist_id: &str,
        _limit: u32,
        _offset: u32,
    ) -> ApiResult<Page<PlaylistItem>> {
        self.record("playlist_items")?;
        Ok(Page::new(vec![
            PlaylistItem {
                track: Some(PlayableItem::Track(self.lookup("pl1"))),
            },
            PlaylistItem { track: None },
        ]))
    }

    async fn top_tracks(&self, _range: TimeRange, _limit: u32) -> ApiResult<Page<Track>> {
        self.record("top_tracks")?;
        Ok(Page::new(vec![self.lookup("top1")]))
    }

    async fn top_artists(&self, _range: TimeRange, _limit: u32) -> ApiResult<Page<Artist>> {
        self.record("top_artists")?;
        Ok(Page::new(self.lookup("top1").artists))
    }

    async fn start_playback(
        &self,
        _device_id: Option<&str>,
        request: &PlaybackRequest,
    ) -> ApiResult<()> {
        self.record("start_playback")?;
        self.state.lock().playback.push(request.clone());
        Ok(())
    }

    async fn pause(&self, _device_id: Option<&str>) -> ApiResult<()> {
        self.record("pause")
    }

    async fn next_track(&self, _device_id: Option<&str>) -> ApiResult<()> {
        self.record("next_track")
    }

    async fn previous_track(&self, _device_id: Option<&str>) -> ApiResult<()> {
        self.record("previous_track")
    }

    async fn set_volume(&self, percent: u8, _device_id: Option<&str>) -> ApiResult<()> {
        self.record(&format!("set_volume:{percent}"))
    }

    async fn set_shuffle(&self, state: bool, _device_id: Option<&str>) -> ApiResult<()> {
        self.record(&format!("set_shuffle:{state}"))
    }

    async fn set_repeat(&self, mode: RepeatMode, _device_id: Option<&str>) -> ApiResult<()> {
        self.record(&format!("set_repeat:{}", mode.as_str()))
    }

    async fn seek(&self, position_ms: u64, _device_id: Option<&str>) -> ApiResult<()> {
        self.record(&format!("seek:{position_ms}"))
    }

    async fn add_to_queue(&self, uri: &str, _device_id: Option<&str>) -> ApiResult<()> {
        self.record(&format!("add_to_queue:{uri}"))
    }

    async fn transfer_playback(&self, device_id: &str, play: bool) -> ApiResult<()> {
        self.record(&format!("transfer_playback:{device_id}:{play}"))
    }

    async fn save_tracks(&self, ids: &[String]) -> ApiResult<()> {
        self.record("save_tracks")?;
        self.state.lock().saved.extend(ids.iter().cloned());
        Ok(())
    }

    async fn remove_saved_tracks(&self, ids: &[String]) -> ApiResult<()> {
        self.record("remove_saved_tracks")?;
        let mut state = self.state.lock();
        for id in ids {
            state.saved.remove(id);
        }
        Ok(())
    }

    async fn contains_saved_tracks(&self, ids: &[String]) -> ApiResult<Vec<bool>> {
        self.record("contains_saved_tracks")?;
        let state = self.state.lock();
        Ok(ids.iter().map(|id| state.saved.contains(id)).collect())
    }

    async fn create_playlist(
        &self,
        _user_id: &str,
        new: &NewPlaylist,
    ) -> ApiResult<SimplifiedPlaylist> {
        self.record("create_playlist")?;
        Ok(playlist("new-playlist", &new.name))
    }

    async fn add_playlist_items(
        &self,
        _playlist_id: &str,
        uris: &[String],
        _position: Option<u32>,
    ) -> ApiResult<()> {
        self.record(&format!("add_playlist_items:{}", uris.join(",")))
    }

    async fn remove_playlist_items(&self, _playlist_id: &str, uris: &[String]) -> ApiResult<()> {
        self.record(&format!("remove_playlist_items:{}", uris.join(",")))
    }

    async fn unfollow_playlist(&self, playlist_id: &str) -> ApiResult<()> {
        self.record(&format!("unfollow_playlist:{playlist_id}"))
    }

    async fn change_playlist_details(
        &self,
        playlist_id: &str,
        name: &str,
        _description: Option<&str>,
    ) -> ApiResult<()> {
        self.record(&format!("change_playlist_details:{playlist_id}:{name}"))
    }
}

/// Provider that always hands out the same fake.
pub struct FixedProvider {
    client: Arc<FakeSpotify>,
    invalidations: AtomicUsize,
}

impl FixedProvider {
    pub fn new(client: Arc<FakeSpotify>) -> Self {
        Self {
            client,
            invalidations: AtomicUsize::new(0),
        }
    }

    pub fn invalidations(&self) -> usize {
        self.invalidations.load(Ordering::SeqCst)
    }
}

impl ClientProvider for FixedProvider {
    fn get(&self) -> Result<Arc<dyn SpotifyApi>, SpotifyError> {
        Ok(self.client.clone())
    }

    fn invalidate(&self) {
        self.invalidations.fetch_add(1, Ordering::SeqCst);
    }
}

/// Provider with no client identity configured.
pub struct UnconfiguredProvider;

impl ClientProvider for UnconfiguredProvider {
    fn get(&self) -> Result<Arc<dyn SpotifyApi>, SpotifyError> {
        Err(SpotifyError::configuration("Credentials not configured"))
    }

    fn invalidate(&self) {}
}

/// Service over a fake client, with its credential file in a temp dir.
///
/// Keep the `TempDir` alive for as long as the service is used.
pub fn fake_service(fake: Arc<FakeSpotify>) -> (SpotifyService, Arc<FixedProvider>, TempDir) {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(CredentialStore::new(
        dir.path().join("tokens.json"),
        IdentityFallback::default(),
    ));
    let provider = Arc::new(FixedProvider::new(fake));
    let service = SpotifyService::with_provider(store, provider.clone(), Duration::from_secs(1));
    (service, provider, dir)
}

/// Service whose provider reports missing credentials.
pub fn unconfigured_service() -> (SpotifyService, TempDir) {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(CredentialStore::new(
        dir.path().join("tokens.json"),
        IdentityFallback::default(),
    ));
    let service = SpotifyService::with_provider(
        store,
        Arc::new(UnconfiguredProvider),
        Duration::from_secs(1),
    );
    (service, dir)
}
