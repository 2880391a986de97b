//! Surface value types.
//!
//! A surface is a named slot that plugins populate with [`Node`]s. Nodes are
//! an abstract render tree; a `Node::Surface` child is a nested slot that the
//! renderer resolves lazily with the same mechanism.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::TrellisError;

/// Data handed to surface components, keyed by field name.
pub type SurfaceData = serde_json::Map<String, Value>;

/// Ordering hint among several results for one slot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Disposition {
    /// Always sorts first.
    Hoist,
    #[default]
    Default,
    /// Always sorts last.
    Fallback,
}

impl Disposition {
    /// Sort key: `hoist < default < fallback`.
    pub fn rank(self) -> u8 {
        match self {
            Self::Hoist => 0,
            Self::Default => 1,
            Self::Fallback => 2,
        }
    }
}

/// Layout hint for multiple results. Carried through, not interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Direction {
    Inline,
    InlineReverse,
    Block,
    BlockReverse,
}

/// An abstract render node.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Text(String),
    Element {
        tag: String,
        attrs: BTreeMap<String, String>,
        children: Vec<Node>,
    },
    Fragment(Vec<Node>),
    /// A nested slot, resolved when the tree is rendered.
    Surface(SurfaceRequest),
}

impl Node {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    pub fn element(tag: impl Into<String>) -> Self {
        Self::Element { tag: tag.into(), attrs: BTreeMap::new(), children: Vec::new() }
    }

    /// Add an attribute. No-op on anything but an element.
    pub fn attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        if let Self::Element { attrs, .. } = &mut self {
            attrs.insert(key.into(), value.into());
        }
        self
    }

    /// Append a child. No-op on text and nested surfaces.
    pub fn child(mut self, node: impl Into<Node>) -> Self {
        match &mut self {
            Self::Element { children, .. } | Self::Fragment(children) => children.push(node.into()),
            Self::Text(_) | Self::Surface(_) => {}
        }
        self
    }
}

impl From<&str> for Node {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<String> for Node {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<SurfaceRequest> for Node {
    fn from(request: SurfaceRequest) -> Self {
        Self::Surface(request)
    }
}

/// One plugin's contribution to a slot.
#[derive(Debug, Clone, PartialEq)]
pub struct SurfaceResult {
    pub node: Node,
    pub disposition: Disposition,
}

impl SurfaceResult {
    pub fn new(node: impl Into<Node>) -> Self {
        Self { node: node.into(), disposition: Disposition::Default }
    }

    pub fn hoist(node: impl Into<Node>) -> Self {
        Self { node: node.into(), disposition: Disposition::Hoist }
    }

    pub fn fallback(node: impl Into<Node>) -> Self {
        Self { node: node.into(), disposition: Disposition::Fallback }
    }
}

impl From<Node> for SurfaceResult {
    fn from(node: Node) -> Self {
        Self::new(node)
    }
}

/// What a surface component sees.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SurfaceProps {
    pub name: Option<String>,
    /// `None` when the slot has no role; components test for it themselves.
    pub role: Option<String>,
    pub data: SurfaceData,
}

impl SurfaceProps {
    pub fn role_is(&self, role: &str) -> bool {
        self.role.as_deref() == Some(role)
    }
}

/// Configuration for a nested slot, keyed by its name in the parent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SurfaceConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<SurfaceData>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub surfaces: BTreeMap<String, SurfaceConfig>,
}

type FallbackFn = dyn Fn(&TrellisError, &SurfaceData) -> Node + Send + Sync;

/// Replacement rendered when a surface subtree fails.
#[derive(Clone)]
pub struct Fallback(Arc<FallbackFn>);

impl Fallback {
    pub fn new<F>(render: F) -> Self
    where
        F: Fn(&TrellisError, &SurfaceData) -> Node + Send + Sync + 'static,
    {
        Self(Arc::new(render))
    }

    pub fn render(&self, error: &TrellisError, data: &SurfaceData) -> Node {
        (self.0)(error, data)
    }
}

impl fmt::Debug for Fallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Fallback(..)")
    }
}

impl PartialEq for Fallback {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

/// A rendering slot request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SurfaceRequest {
    /// Debug id; generated when absent.
    pub id: Option<String>,
    /// Slot name used to look up nested configuration. Defaults to `role`.
    pub name: Option<String>,
    pub role: Option<String>,
    /// Explicit data; wins over data inherited from the parent context.
    pub data: Option<SurfaceData>,
    /// Configuration for nested slots, keyed by name.
    pub surfaces: BTreeMap<String, SurfaceConfig>,
    /// Keep at most this many results. `Some(0)` means unlimited.
    pub limit: Option<usize>,
    pub direction: Option<Direction>,
    /// Error boundary for this surface's subtree.
    pub fallback: Option<Fallback>,
    /// Rendered when no plugin contributes anything.
    pub placeholder: Option<Box<Node>>,
}

impl SurfaceRequest {
    /// A slot whose name and role are both `role`.
    pub fn role(role: impl Into<String>) -> Self {
        Self { role: Some(role.into()), ..Default::default() }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_data(mut self, data: SurfaceData) -> Self {
        self.data = Some(data);
        self
    }

    pub fn with_surface(mut self, name: impl Into<String>, config: SurfaceConfig) -> Self {
        self.surfaces.insert(name.into(), config);
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_direction(mut self, direction: Direction) -> Self {
        self.direction = Some(direction);
        self
    }

    pub fn with_fallback(mut self, fallback: Fallback) -> Self {
        self.fallback = Some(fallback);
        self
    }

    pub fn with_placeholder(mut self, placeholder: impl Into<Node>) -> Self {
        self.placeholder = Some(Box::new(placeholder.into()));
        self
    }

    /// Effective slot name: `name`, else `role`.
    pub fn slot_name(&self) -> Option<&str> {
        self.name.as_deref().or(self.role.as_deref())
    }
}
