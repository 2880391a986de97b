use std::error::Error as _;

use trellis_core::{Fallback, Node, Result, SurfaceData, SurfaceRequest, TrellisError};
use trellis_plugins::PluginRegistry;
use trellis_surface::{RenderedNode, SurfaceResolver};

/// Plain error display: the message as a heading, the cause chain below it.
pub fn error_display(error: &TrellisError) -> Node {
    let mut causes = Vec::new();
    let mut source = error.source();
    while let Some(cause) = source {
        causes.push(cause.to_string());
        source = cause.source();
    }

    let mut node = Node::element("div").child(Node::element("h1").child(error.to_string()));
    if !causes.is_empty() {
        node = node.child(Node::element("pre").child(causes.join("\n")));
    }
    node
}

/// Boundary installed around the root surface.
pub fn default_fallback() -> Fallback {
    Fallback::new(|error: &TrellisError, _data: &SurfaceData| error_display(error))
}

/// Render an error without any plugin or app state, e.g. a failed boot.
pub fn render_error(error: &TrellisError) -> Result<Vec<RenderedNode>> {
    let request = SurfaceRequest::role("error").with_placeholder(error_display(error));
    SurfaceResolver::new(PluginRegistry::new()).render(&request)
}
