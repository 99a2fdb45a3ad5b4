//! Domains module containing business logic organized by bounded contexts.
//!
//! - **spotify**: credentials, client cache, request executors and the Web API client
//! - **tools**: the MCP tools that dispatch actions onto the Spotify domain

pub mod spotify;
pub mod tools;
