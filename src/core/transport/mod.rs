//! Transport layer for the MCP server.
//!
//! - **STDIO**: standard input/output, the default MCP mode (feature `stdio`)
//! - **TCP**: line-delimited JSON-RPC over a TCP socket (feature `tcp`)
//!
//! Both hand every connection to the same cloned [`McpServer`](crate::core::McpServer),
//! so all clients share one Spotify client cache.

mod config;
mod error;
mod service;

#[cfg(feature = "tcp")]
pub mod tcp;

#[cfg(feature = "stdio")]
pub mod stdio;

pub use config::TransportConfig;
pub use error::{TransportError, TransportResult};
pub use service::TransportService;

#[cfg(feature = "tcp")]
pub use config::TcpConfig;
