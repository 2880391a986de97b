pub mod debug;
pub mod render;
pub mod resolver;

pub use debug::{RenderPass, SurfaceDebugEntry, SurfaceDebugInfo};
pub use render::RenderedNode;
pub use resolver::{SurfaceContext, SurfaceResolver, DEFAULT_MAX_SURFACE_DEPTH};
