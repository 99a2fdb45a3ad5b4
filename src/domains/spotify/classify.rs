//! Remote failure classification.
//!
//! The Web API reports failures as loosely structured text. These helpers map
//! that text onto a small, stable vocabulary of guidance messages, each with a
//! concrete next step for the calling agent.
//!
//! Matching is by substring. The upstream error strings are not a stable
//! contract, so the patterns live here as data and are tested as one unit.

/// Fragments of response-decoding errors raised on calls that succeeded.
///
/// Mutating endpoints often return an empty or non-JSON body; a client that
/// decodes eagerly reports that as a failure even though the change was applied.
pub const PARSE_ARTIFACTS: [&str; 3] = [
    "Unexpected token",
    "Unexpected non-whitespace character",
    "Exponent part is missing a number in JSON",
];

/// Whether `message` is a decoding artifact of an otherwise successful call.
pub fn is_parse_artifact(message: &str) -> bool {
    PARSE_ARTIFACTS
        .iter()
        .any(|pattern| message.contains(pattern))
}

/// Classified player failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    NoActiveDevice,
    PremiumRequired,
    NotFound,
    Unauthorized,
}

/// Ordered classification table: the first matching row wins.
///
/// "No active device" arrives as a 404, so it must come before `NotFound`.
const CLASSIFICATION: [(FailureKind, &[&str]); 4] = [
    (
        FailureKind::NoActiveDevice,
        &["No active device", "Player command failed: No active device"],
    ),
    (
        FailureKind::PremiumRequired,
        &["Restriction violated", "PREMIUM_REQUIRED"],
    ),
    (FailureKind::NotFound, &["Not found", "404"]),
    (
        FailureKind::Unauthorized,
        &["Unauthorized", "401", "access token"],
    ),
];

impl FailureKind {
    /// Classify an error message, or `None` if no row matches.
    pub fn classify(message: &str) -> Option<Self> {
        CLASSIFICATION
            .iter()
            .find(|(_, patterns)| patterns.iter().any(|p| message.contains(p)))
            .map(|(kind, _)| *kind)
    }

    /// Marker emoji leading the guidance text.
    pub fn marker(self) -> &'static str {
        match self {
            Self::NoActiveDevice => "📵",
            Self::PremiumRequired => "⭐",
            Self::NotFound => "❌",
            Self::Unauthorized => "🔐",
        }
    }

    /// Guidance text for this failure in the context of `action`.
    pub fn guidance(self, action: &str) -> String {
        match self {
            Self::NoActiveDevice => format!(
                "{} No active device. NEXT: use spotifyInfo(accion=\"devices\") to list devices \
                 and spotifyPlayer(accion=\"transfer\") to activate one. If there are none, use \
                 spotifyPlayer(accion=\"openApp\") to open Spotify. IMPORTANT: after opening it, \
                 ask the user to MANUALLY play any song to start a player session; once music is \
                 playing the tools will work.",
                self.marker()
            ),
            Self::PremiumRequired => format!(
                "{} Spotify Premium is required to control playback. The user needs a Premium \
                 account to use play/pause/next/prev/volume/etc.",
                self.marker()
            ),
            Self::NotFound => format!(
                "{} Resource not found for {}. NEXT: check the ID is correct using \
                 spotifyInfo(accion=\"search\").",
                self.marker(),
                action
            ),
            Self::Unauthorized => format!(
                "{} Session expired or not authenticated. NEXT: use \
                 spotifyAuth(accion=\"verificar\") to check the status, then \
                 spotifyAuth(accion=\"ejecutar\") to reconnect.",
                self.marker()
            ),
        }
    }
}

/// Turn a player failure into its user-facing message.
pub fn player_failure_message(action: &str, message: &str) -> String {
    match FailureKind::classify(message) {
        Some(kind) => kind.guidance(action),
        None => format!("❌ Error in {}: {}", action, message),
    }
}
