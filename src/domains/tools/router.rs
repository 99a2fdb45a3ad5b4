//! Tool Router - builds the rmcp ToolRouter.
//!
//! Each tool knows how to create its own route; this module only wires the
//! shared service into them.

use std::sync::Arc;

use rmcp::handler::server::tool::ToolRouter;

use crate::domains::spotify::SpotifyService;

use super::definitions::{SpotifyAuthTool, SpotifyInfoTool, SpotifyLibraryTool, SpotifyPlayerTool};

/// Build the tool router with all registered tools.
pub fn build_tool_router<S>(service: Arc<SpotifyService>) -> ToolRouter<S>
where
    S: Send + Sync + 'static,
{
    ToolRouter::new()
        .with_route(SpotifyAuthTool::create_route(service.clone()))
        .with_route(SpotifyInfoTool::create_route(service.clone()))
        .with_route(SpotifyLibraryTool::create_route(service.clone()))
        .with_route(SpotifyPlayerTool::create_route(service))
}

#[cfg(test)]
mod tests {
    use super::super::registry::ToolRegistry;
    use super::*;
    use crate::domains::spotify::testing::{FakeSpotify, fake_service};

    struct TestServer {}

    #[test]
    fn test_build_router() {
        let (service, _, _dir) = fake_service(Arc::new(FakeSpotify::new()));
        let router: ToolRouter<TestServer> = build_tool_router(Arc::new(service));
        let tools = router.list_all();
        assert_eq!(tools.len(), 4);

        let names: Vec<_> = tools.iter().map(|t| t.name.as_ref()).collect();
        assert!(names.contains(&"spotifyPlayer"));
        assert!(names.contains(&"spotifyInfo"));
        assert!(names.contains(&"spotifyLibrary"));
        assert!(names.contains(&"spotifyAuth"));
    }

    #[test]
    fn test_registry_matches_router() {
        let registry_names = ToolRegistry::new().tool_names();

        let (service, _, _dir) = fake_service(Arc::new(FakeSpotify::new()));
        let router: ToolRouter<TestServer> = build_tool_router(Arc::new(service));
        let router_tools = router.list_all();
        let router_names: Vec<_> = router_tools.iter().map(|t| t.name.as_ref()).collect();

        assert_eq!(registry_names.len(), router_names.len());
        for name in registry_names {
            assert!(router_names.contains(&name));
        }
    }
}
