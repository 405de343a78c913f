//! Render-time machinery: contexts, path resolution, operators and the callable registry.

pub mod accessors;
pub mod context;
pub mod eval;
pub mod ops;
pub mod path;
pub mod registry;

pub use context::{Callable, RenderContext};
pub use registry::{Function, Registry};
