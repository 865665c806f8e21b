mod error;
mod registry;
mod render;

pub use error::RegistryError;
pub use registry::{CollisionPolicy, ToolRegistry};
pub use render::render_result;
