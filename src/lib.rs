//! Spotify MCP Server Library
//!
//! A Model Context Protocol (MCP) server that lets an assistant control
//! Spotify: playback, catalog lookups, the user's library and the OAuth
//! session, exposed as four action-dispatching tools.
//!
//! # Architecture
//!
//! - **core**: configuration, error handling, the server handler and transports
//! - **domains**: business logic organized by bounded contexts
//!   - **spotify**: credential store, cached client provider, request executors,
//!     failure classification and the Web API client
//!   - **tools**: `spotifyPlayer`, `spotifyInfo`, `spotifyLibrary`, `spotifyAuth`
//!
//! # Example
//!
//! ```rust,no_run
//! use spotify_mcp_server::core::{Config, McpServer, TransportService};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::from_env();
//!     let server = McpServer::new(config.clone());
//!     TransportService::new(config.transport).run(server).await?;
//!     Ok(())
//! }
//! ```

pub mod core;
pub mod domains;

// Re-export commonly used types for convenience
pub use core::{Config, Error, McpServer, Result};
