//! Tool definitions module.
//!
//! One file per consolidated tool. Each tool takes an `accion` discriminator
//! and dispatches to a single remote call (or a short fixed sequence).

pub mod auth;
pub mod common;
pub mod info;
pub mod library;
pub mod player;

pub use auth::{AuthAction, SpotifyAuthParams, SpotifyAuthTool};
pub use info::{InfoAction, SpotifyInfoParams, SpotifyInfoTool};
pub use library::{LibraryAction, SpotifyLibraryParams, SpotifyLibraryTool};
pub use player::{PlayerAction, PlayerValue, SpotifyPlayerParams, SpotifyPlayerTool};
