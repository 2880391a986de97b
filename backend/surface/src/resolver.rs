/// Surface resolver.
///
/// `resolve` composes one slot: every enabled plugin's surface component is
/// asked for a contribution, the contributions are stably sorted by
/// disposition (`hoist`, `default`, `fallback`) and cut to `limit`.
///
/// `render` expands the composed nodes into a [`RenderedNode`] tree,
/// re-entering `resolve` for every nested `Node::Surface`. A request that
/// carries a fallback is an error boundary for its whole subtree.
use std::collections::BTreeMap;

use anyhow::anyhow;
use tracing::{debug, warn};
use trellis_core::{Node, Result, SurfaceConfig, SurfaceData, SurfaceProps, SurfaceRequest, TrellisError};
use trellis_plugins::{filter_plugins, parse_surface_plugin, PluginRegistry};

use crate::debug::{RenderPass, SurfaceDebugInfo};
use crate::render::RenderedNode;

/// Default bound on surface nesting.
pub const DEFAULT_MAX_SURFACE_DEPTH: usize = 32;

/// What a surface passes down to the surfaces nested inside it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SurfaceContext {
    pub name: Option<String>,
    /// Nested slot configuration, keyed by slot name.
    pub surfaces: BTreeMap<String, SurfaceConfig>,
}

impl SurfaceContext {
    fn config_for(&self, name: Option<&str>) -> Option<&SurfaceConfig> {
        name.and_then(|name| self.surfaces.get(name))
    }
}

#[derive(Clone)]
pub struct SurfaceResolver {
    registry: PluginRegistry,
    max_depth: usize,
    debug: SurfaceDebugInfo,
}

impl SurfaceResolver {
    pub fn new(registry: PluginRegistry) -> Self {
        Self { registry, max_depth: DEFAULT_MAX_SURFACE_DEPTH, debug: SurfaceDebugInfo::default() }
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    pub fn debug_info(&self) -> &SurfaceDebugInfo {
        &self.debug
    }

    /// Data the components see: inherited slot data overlaid by the
    /// request's own data, key by key.
    pub fn effective_data(request: &SurfaceRequest, parent: Option<&SurfaceContext>) -> SurfaceData {
        let mut data = parent
            .and_then(|ctx| ctx.config_for(request.slot_name()))
            .and_then(|config| config.data.clone())
            .unwrap_or_default();
        if let Some(explicit) = &request.data {
            for (key, value) in explicit {
                data.insert(key.clone(), value.clone());
            }
        }
        data
    }

    /// Context for the surfaces nested inside `request`: the parent's nested
    /// configuration for this slot, overridden by the request's own.
    pub fn child_context(request: &SurfaceRequest, parent: Option<&SurfaceContext>) -> SurfaceContext {
        let mut surfaces = parent
            .and_then(|ctx| ctx.config_for(request.slot_name()))
            .map(|config| config.surfaces.clone())
            .unwrap_or_default();
        surfaces.extend(request.surfaces.iter().map(|(k, v)| (k.clone(), v.clone())));
        SurfaceContext { name: request.slot_name().map(str::to_string), surfaces }
    }

    /// Compose one slot. Nested surfaces in the returned nodes are left
    /// unresolved.
    pub fn resolve(&self, request: &SurfaceRequest, parent: Option<&SurfaceContext>) -> Result<Vec<Node>> {
        let surface = surface_label(request);
        let props = SurfaceProps {
            name: request.slot_name().map(str::to_string),
            role: request.role.clone(),
            data: Self::effective_data(request, parent),
        };

        let plugins = self.registry.get_enabled();
        let mut candidates = Vec::new();
        for (plugin, provider) in filter_plugins(&plugins, parse_surface_plugin) {
            match provider.component(&props) {
                Ok(Some(result)) => candidates.push(result),
                Ok(None) => {}
                Err(source) => {
                    return Err(TrellisError::SurfaceRender {
                        surface,
                        plugin: Some(plugin.id().to_string()),
                        source,
                    });
                }
            }
        }

        // Stable: equal dispositions keep registration order.
        candidates.sort_by_key(|result| result.disposition.rank());
        let mut nodes: Vec<Node> = candidates.into_iter().map(|result| result.node).collect();
        if let Some(limit) = request.limit.filter(|limit| *limit > 0) {
            nodes.truncate(limit);
        }
        debug!(surface = %surface, count = nodes.len(), "Resolved surface");
        Ok(nodes)
    }

    /// Resolve and fully expand a root surface.
    pub fn render(&self, request: &SurfaceRequest) -> Result<Vec<RenderedNode>> {
        let pass = self.debug.begin(request);
        let rendered = self.render_surface(request, None, 0, &pass);
        self.debug.finish(pass);
        rendered
    }

    fn render_surface(
        &self,
        request: &SurfaceRequest,
        parent: Option<&SurfaceContext>,
        depth: usize,
        pass: &RenderPass,
    ) -> Result<Vec<RenderedNode>> {
        self.debug.track(request, pass);
        match self.render_contents(request, parent, depth, pass) {
            Ok(nodes) => Ok(nodes),
            Err(error) => match &request.fallback {
                Some(fallback) => {
                    warn!(surface = %surface_label(request), error = %error, "Surface failed; rendering fallback");
                    let data = Self::effective_data(request, parent);
                    let replacement = fallback.render(&error, &data);
                    let mut out = Vec::new();
                    self.render_node(replacement, &SurfaceContext::default(), depth, pass, &mut out)?;
                    Ok(out)
                }
                None => Err(error),
            },
        }
    }

    fn render_contents(
        &self,
        request: &SurfaceRequest,
        parent: Option<&SurfaceContext>,
        depth: usize,
        pass: &RenderPass,
    ) -> Result<Vec<RenderedNode>> {
        if depth >= self.max_depth {
            return Err(TrellisError::SurfaceRender {
                surface: surface_label(request),
                plugin: None,
                source: anyhow!("surface nesting exceeded max depth of {}", self.max_depth),
            });
        }

        let mut nodes = self.resolve(request, parent)?;
        if nodes.is_empty() {
            if let Some(placeholder) = &request.placeholder {
                nodes.push(placeholder.as_ref().clone());
            }
        }

        let context = Self::child_context(request, parent);
        let mut out = Vec::new();
        for node in nodes {
            self.render_node(node, &context, depth, pass, &mut out)?;
        }
        Ok(out)
    }

    fn render_node(
        &self,
        node: Node,
        context: &SurfaceContext,
        depth: usize,
        pass: &RenderPass,
        out: &mut Vec<RenderedNode>,
    ) -> Result<()> {
        match node {
            Node::Text(text) => out.push(RenderedNode::Text { text }),
            Node::Element { tag, attrs, children } => {
                let mut rendered = Vec::with_capacity(children.len());
                for child in children {
                    self.render_node(child, context, depth, pass, &mut rendered)?;
                }
                out.push(RenderedNode::Element { tag, attrs, children: rendered });
            }
            Node::Fragment(children) => {
                for child in children {
                    self.render_node(child, context, depth, pass, out)?;
                }
            }
            Node::Surface(request) => {
                out.extend(self.render_surface(&request, Some(context), depth + 1, pass)?);
            }
        }
        Ok(())
    }
}

fn surface_label(request: &SurfaceRequest) -> String {
    request
        .slot_name()
        .or(request.id.as_deref())
        .unwrap_or("anonymous")
        .to_string()
}
