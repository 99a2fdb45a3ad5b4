//! MCP Server implementation and lifecycle management.
//!
//! The server is a thin shell: it owns the shared [`SpotifyService`] and the
//! tool router built from it. Every tool call is dispatched by the
//! `#[tool_handler]` macro.
//!
//! Tools are defined in `domains/tools/definitions/` with one file per tool.
//! The ToolRouter is built in `domains/tools/router.rs`, so adding a tool
//! does not touch this file.

use rmcp::{ServerHandler, handler::server::tool::ToolRouter, model::*, tool_handler};
use std::sync::Arc;

use super::config::Config;
use crate::domains::{spotify::SpotifyService, tools::build_tool_router};

const INSTRUCTIONS: &str = "\
Spotify control through four tools.\n\
- spotifyAuth: run accion=\"configurar\" with clientId/clientSecret first, then \
accion=\"ejecutar\" (or \"iniciar\"/\"urlAuth\") to connect your account. \
accion=\"verificar\" shows the current status.\n\
- spotifyPlayer: playback control (play, pause, next, previous, volume, shuffle, \
repeat, seek, queue, transfer, playLiked, openApp). Most actions need an active \
device: use spotifyInfo accion=\"devices\" and spotifyPlayer accion=\"transfer\" \
when nothing is playing.\n\
- spotifyInfo: search, now playing, devices, profile, queue, history, saved \
tracks, playlists, albums, artist top tracks, top items and playback state.\n\
- spotifyLibrary: save/remove/check tracks and manage your playlists.";

/// The main MCP server handler.
///
/// Clones share the same Spotify service, so TCP connections reuse one
/// cached API client.
#[derive(Clone)]
pub struct McpServer {
    /// Server configuration.
    config: Arc<Config>,

    /// Credential store, client cache and executors.
    service: Arc<SpotifyService>,

    /// Tool router for handling tool calls.
    tool_router: ToolRouter<Self>,
}

impl McpServer {
    /// Create a new MCP server with the given configuration.
    pub fn new(config: Config) -> Self {
        let service = SpotifyService::new(&config.spotify);
        Self::with_service(config, service)
    }

    /// Create a server around an already built service.
    pub fn with_service(config: Config, service: SpotifyService) -> Self {
        let service = Arc::new(service);

        Self {
            tool_router: build_tool_router::<Self>(service.clone()),
            config: Arc::new(config),
            service,
        }
    }

    /// Get the server name.
    pub fn name(&self) -> &str {
        &self.config.server.name
    }

    /// Get the server version.
    pub fn version(&self) -> &str {
        &self.config.server.version
    }

    /// Get the server configuration.
    pub fn config(&self) -> &Arc<Config> {
        &self.config
    }

    /// Shared Spotify service.
    pub fn service(&self) -> &Arc<SpotifyService> {
        &self.service
    }

    /// Names of the routed tools.
    pub fn tool_names(&self) -> Vec<String> {
        self.tool_router
            .list_all()
            .into_iter()
            .map(|t| t.name.to_string())
            .collect()
    }
}

#[tool_handler]
impl ServerHandler for McpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(INSTRUCTIONS.to_string()),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: self.config.server.name.clone(),
                version: self.config.server.version.clone(),
                ..Implementation::from_build_env()
            },
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::spotify::testing::{FakeSpotify, fake_service};

    fn test_server() -> (McpServer, tempfile::TempDir) {
        let (service, _, dir) = fake_service(Arc::new(FakeSpotify::new()));
        (McpServer::with_service(Config::default(), service), dir)
    }

    #[test]
    fn test_server_routes_four_tools() {
        let (server, _dir) = test_server();
        let mut names = server.tool_names();
        names.sort();
        assert_eq!(
            names,
            vec!["spotifyAuth", "spotifyInfo", "spotifyLibrary", "spotifyPlayer"]
        );
    }

    #[test]
    fn test_server_info_enables_tools_only() {
        let (server, _dir) = test_server();
        let info = server.get_info();
        assert!(info.capabilities.tools.is_some());
        assert!(info.capabilities.resources.is_none());
        assert!(info.capabilities.prompts.is_none());
        assert_eq!(info.server_info.name, "spotify-mcp");
        assert!(info.instructions.unwrap_or_default().contains("spotifyAuth"));
    }

    #[test]
    fn test_clones_share_service() {
        let (server, _dir) = test_server();
        let clone = server.clone();
        assert!(Arc::ptr_eq(server.service(), clone.service()));
    }
}
