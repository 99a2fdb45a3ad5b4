//! Tools domain module.
//!
//! The four Spotify tools exposed to MCP clients. Each tool is an action
//! dispatcher: it validates the action's required fields, then runs one
//! prepared call through the request executors.
//!
//! ## Architecture
//!
//! - `definitions/` - Individual tool implementations (one file per tool)
//! - `router.rs` - Dynamic ToolRouter builder
//! - `registry.rs` - Central tool registry (names and metadata)
//! - `error.rs` - Tool-specific error types
//!
//! ## Adding a New Tool
//!
//! 1. Create a new file in `definitions/` with params, `execute()`,
//!    `to_tool()` and `create_route()`
//! 2. Export it in `definitions/mod.rs`
//! 3. Add the route in `router.rs` and the entry in `registry.rs`

pub mod definitions;
mod error;
mod registry;
pub mod router;

pub use error::ToolError;
pub use registry::ToolRegistry;
pub use router::build_tool_router;
