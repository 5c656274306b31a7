//! Scene graph built from a rigid-body model: one entity per segment, one
//! child per visual mesh.

pub mod graph;
pub mod loader;
pub mod transform;

pub use graph::{Component, Entity, EntityId, EntitySnapshot, PhongMaterial, SceneGraph};
pub use loader::{LoadedModel, ModelLoader, OBJ_GROUP_PROPERTY};
pub use transform::Transform;
