//! Common utilities shared across the Spotify tools.
//!
//! Result constructors, list formatting and the small argument helpers every
//! dispatcher needs.

use rmcp::model::{CallToolResult, Content};
use tracing::warn;

use crate::domains::spotify::models::{Artist, ItemType, Track};

/// Upper bound the Web API accepts for paged endpoints.
pub const MAX_LIMIT: u32 = 50;

/// Format a duration in milliseconds to M:SS format.
pub fn format_duration(length_ms: u64) -> String {
    let duration_secs = length_ms / 1000;
    let minutes = duration_secs / 60;
    let seconds = duration_secs % 60;
    format!("{}:{:02}", minutes, seconds)
}

/// Create an error result with a formatted message.
pub fn error_result(message: &str) -> CallToolResult {
    warn!("{}", message);
    CallToolResult::error(vec![Content::text(message.to_string())])
}

/// Create a success result with text content.
pub fn text_result(content: impl Into<String>) -> CallToolResult {
    CallToolResult::success(vec![Content::text(content.into())])
}

/// Short literal result for a missing or empty required field.
pub fn missing_params(what: &str) -> CallToolResult {
    error_result(&format!("Error: {} required", what))
}

/// Default page size for list actions.
pub fn default_limit() -> u32 {
    20
}

/// Clamp a page size to the allowed range (1-50).
pub fn validate_limit(limit: u32) -> u32 {
    limit.clamp(1, MAX_LIMIT)
}

/// Comma-separated artist names.
pub fn artist_names(artists: &[Artist]) -> String {
    artists
        .iter()
        .map(|a| a.name.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

/// `N. "name" - artists | ID: id`
pub fn track_line(position: usize, track: &Track) -> String {
    format!(
        "{}. \"{}\" - {} | ID: {}",
        position,
        track.name,
        artist_names(&track.artists),
        track.id
    )
}

/// Treat `Some("")` as absent.
pub fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Accept either a bare track id or a full `spotify:` URI.
pub fn track_uri(id_or_uri: &str) -> String {
    if id_or_uri.starts_with("spotify:") {
        id_or_uri.to_string()
    } else {
        ItemType::Track.uri(id_or_uri)
    }
}

/// Ids with surrounding whitespace trimmed and blanks dropped.
pub fn clean_ids(ids: &[String]) -> Vec<String> {
    ids.iter()
        .map(|id| id.trim())
        .filter(|id| !id.is_empty())
        .map(String::from)
        .collect()
}

/// Text of the first content block of a result.
#[cfg(test)]
pub fn first_text(result: &CallToolResult) -> &str {
    match &result.content[0].raw {
        rmcp::model::RawContent::Text(text) => &text.text,
        _ => panic!("Expected text content"),
    }
}
