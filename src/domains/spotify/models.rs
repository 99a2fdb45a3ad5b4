//! Response and request shapes for the Spotify Web API.
//!
//! Only the fields the tools read are modelled. Everything that Spotify may
//! send as `null` is either optional or defaulted.

use schemars::JsonSchema;
use serde::{Deserialize, Deserializer, Serialize};

/// Deserialize `null` as the type's default value.
fn nullable<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}

/// Kind of catalog item, used for search and for building `spotify:` URIs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ItemType {
    Track,
    Album,
    Artist,
    Playlist,
}

impl ItemType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Track => "track",
            Self::Album => "album",
            Self::Artist => "artist",
            Self::Playlist => "playlist",
        }
    }

    /// Parse the kind segment of a `spotify:{kind}:{id}` URI.
    pub fn from_uri(uri: &str) -> Option<Self> {
        let mut parts = uri.split(':');
        if parts.next() != Some("spotify") {
            return None;
        }
        match parts.next()? {
            "track" => Some(Self::Track),
            "album" => Some(Self::Album),
            "artist" => Some(Self::Artist),
            "playlist" => Some(Self::Playlist),
            _ => None,
        }
    }

    /// Build the `spotify:{kind}:{id}` URI for an id.
    pub fn uri(self, id: &str) -> String {
        format!("spotify:{}:{}", self.as_str(), id)
    }
}

/// Time window for top items.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum TimeRange {
    /// Roughly the last 4 weeks.
    ShortTerm,
    /// Roughly the last 6 months.
    #[default]
    MediumTerm,
    /// Several years.
    LongTerm,
}

impl TimeRange {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ShortTerm => "short_term",
            Self::MediumTerm => "medium_term",
            Self::LongTerm => "long_term",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::ShortTerm => "4 weeks",
            Self::MediumTerm => "6 months",
            Self::LongTerm => "all time",
        }
    }
}

/// Repeat mode of the player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepeatMode {
    Track,
    Context,
    Off,
}

impl RepeatMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Track => "track",
            Self::Context => "context",
            Self::Off => "off",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "track" => Some(Self::Track),
            "context" => Some(Self::Context),
            "off" => Some(Self::Off),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Artist {
    #[serde(default, deserialize_with = "nullable")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, deserialize_with = "nullable")]
    pub genres: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct AlbumRef {
    #[serde(default, deserialize_with = "nullable")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub uri: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub artists: Vec<Artist>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Track {
    #[serde(default, deserialize_with = "nullable")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub duration_ms: u64,
    #[serde(default, deserialize_with = "nullable")]
    pub artists: Vec<Artist>,
    /// Absent on album track listings.
    #[serde(default)]
    pub album: Option<AlbumRef>,
    #[serde(default, deserialize_with = "nullable")]
    pub uri: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Episode {
    #[serde(default, deserialize_with = "nullable")]
    pub id: String,
    #[serde(default)]
    pub name: String,
}

/// Something the player can play.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum PlayableItem {
    Track(Track),
    Episode(Episode),
}

impl PlayableItem {
    /// The track, if this item is a song with artist and album info.
    pub fn as_track(&self) -> Option<&Track> {
        match self {
            Self::Track(track) if !track.artists.is_empty() && track.album.is_some() => {
                Some(track)
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Device {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub is_active: bool,
    #[serde(default)]
    pub volume_percent: Option<u8>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct CurrentlyPlaying {
    #[serde(default)]
    pub is_playing: bool,
    #[serde(default)]
    pub progress_ms: Option<u64>,
    #[serde(default)]
    pub item: Option<PlayableItem>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct PlaybackState {
    #[serde(default)]
    pub device: Option<Device>,
    #[serde(default)]
    pub shuffle_state: bool,
    #[serde(default = "default_repeat_state")]
    pub repeat_state: String,
    #[serde(default)]
    pub is_playing: bool,
}

fn default_repeat_state() -> String {
    "off".to_string()
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Followers {
    #[serde(default)]
    pub total: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct UserProfile {
    pub id: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub product: Option<String>,
    #[serde(default)]
    pub followers: Option<Followers>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Queue {
    #[serde(default)]
    pub currently_playing: Option<PlayableItem>,
    #[serde(default, deserialize_with = "nullable")]
    pub queue: Vec<PlayableItem>,
}

/// A page of results. Cursor-based pages have no `total`.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct Page<T> {
    #[serde(default = "Vec::new", deserialize_with = "nullable")]
    pub items: Vec<T>,
    #[serde(default)]
    pub total: u64,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>) -> Self {
        let total = items.len() as u64;
        Self { items, total }
    }
}

impl<T> Default for Page<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            total: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct PlayHistory {
    pub track: Track,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SavedTrack {
    pub track: Track,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct PlaylistItem {
    /// `None` for tracks removed from the catalog.
    #[serde(default)]
    pub track: Option<PlayableItem>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct PlaylistOwner {
    #[serde(default)]
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct PlaylistTracksRef {
    #[serde(default)]
    pub total: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct SimplifiedPlaylist {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub owner: Option<PlaylistOwner>,
    #[serde(default)]
    pub tracks: Option<PlaylistTracksRef>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Album {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub tracks: Page<Track>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct SearchResults {
    #[serde(default)]
    pub tracks: Option<Page<Track>>,
    #[serde(default)]
    pub albums: Option<Page<AlbumRef>>,
    #[serde(default)]
    pub artists: Option<Page<Artist>>,
    /// Spotify returns `null` entries in playlist search pages.
    #[serde(default)]
    pub playlists: Option<Page<Option<SimplifiedPlaylist>>>,
}

/// Body of a start/resume playback request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PlaybackRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_uri: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uris: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<PlaybackOffset>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlaybackOffset {
    pub uri: String,
}

impl PlaybackRequest {
    /// Resume whatever was playing.
    pub fn resume() -> Self {
        Self::default()
    }

    /// Play an album, artist or playlist.
    pub fn context(uri: impl Into<String>) -> Self {
        Self {
            context_uri: Some(uri.into()),
            ..Self::default()
        }
    }

    /// Play a context starting at one of its tracks.
    pub fn context_at(uri: impl Into<String>, track_uri: impl Into<String>) -> Self {
        Self {
            context_uri: Some(uri.into()),
            offset: Some(PlaybackOffset {
                uri: track_uri.into(),
            }),
            ..Self::default()
        }
    }

    /// Play a bare list of tracks.
    pub fn tracks(uris: Vec<String>) -> Self {
        Self {
            uris: Some(uris),
            ..Self::default()
        }
    }
}

/// Body of a create playlist request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewPlaylist {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub public: bool,
}
