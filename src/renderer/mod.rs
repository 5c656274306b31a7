pub mod camera;
pub mod mesh;
pub mod render;
pub mod renderer;
pub mod vertex;

pub use mesh::{MeshData, MeshResolver};
pub use render::RenderOptions;
pub use renderer::Renderer;
