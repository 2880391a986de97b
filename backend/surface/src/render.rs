use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

/// A fully resolved node: nested surfaces have been expanded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum RenderedNode {
    Text { text: String },
    Element {
        tag: String,
        #[serde(skip_serializing_if = "BTreeMap::is_empty")]
        attrs: BTreeMap<String, String>,
        #[serde(skip_serializing_if = "Vec::is_empty")]
        children: Vec<RenderedNode>,
    },
}

impl RenderedNode {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    /// Concatenated text content, depth first.
    pub fn text_content(&self) -> String {
        match self {
            Self::Text { text } => text.clone(),
            Self::Element { children, .. } => children.iter().map(Self::text_content).collect(),
        }
    }
}

fn escape(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;").replace('"', "&quot;")
}

/// Compact markup, e.g. `<div class="x">hi</div>`.
impl fmt::Display for RenderedNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text { text } => f.write_str(&escape(text)),
            Self::Element { tag, attrs, children } => {
                write!(f, "<{tag}")?;
                for (key, value) in attrs {
                    write!(f, " {key}=\"{}\"", escape(value))?;
                }
                f.write_str(">")?;
                for child in children {
                    write!(f, "{child}")?;
                }
                write!(f, "</{tag}>")
            }
        }
    }
}
