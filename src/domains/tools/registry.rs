//! Tool Registry - central list of all tools.

use rmcp::model::Tool;

use super::definitions::{SpotifyAuthTool, SpotifyInfoTool, SpotifyLibraryTool, SpotifyPlayerTool};

/// Tool registry - names and metadata of every available tool.
#[derive(Debug, Default)]
pub struct ToolRegistry;

impl ToolRegistry {
    /// Create a new tool registry.
    pub fn new() -> Self {
        Self
    }

    /// Get all tool names.
    pub fn tool_names(&self) -> Vec<&'static str> {
        vec![
            SpotifyAuthTool::NAME,
            SpotifyInfoTool::NAME,
            SpotifyLibraryTool::NAME,
            SpotifyPlayerTool::NAME,
        ]
    }

    /// Get all tools as Tool models (metadata).
    pub fn get_all_tools() -> Vec<Tool> {
        vec![
            SpotifyAuthTool::to_tool(),
            SpotifyInfoTool::to_tool(),
            SpotifyLibraryTool::to_tool(),
            SpotifyPlayerTool::to_tool(),
        ]
    }
}
