pub mod error;
pub mod intent;
pub mod meta;
pub mod node;

pub use error::TrellisError;
pub use intent::{Intent, IntentResult};
pub use meta::PluginMeta;
pub use node::{
    Direction, Disposition, Fallback, Node, SurfaceConfig, SurfaceData, SurfaceProps,
    SurfaceRequest, SurfaceResult,
};

/// Convenience alias for results carrying a [`TrellisError`].
pub type Result<T, E = TrellisError> = std::result::Result<T, E>;
