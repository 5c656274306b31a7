use std::collections::BTreeMap;

use nalgebra_glm as glm;
use serde::Serialize;

use super::transform::{Transform, TransformSnapshot};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct EntityId(pub usize);

/// Phong surface parameters. Only `ambient` is set by the model loader.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PhongMaterial {
    pub ambient: [f32; 4],
    pub diffuse: [f32; 4],
    pub specular: [f32; 4],
    pub shininess: f32,
}

impl Default for PhongMaterial {
    fn default() -> Self {
        Self {
            ambient: [0.05, 0.05, 0.05, 1.0],
            diffuse: [0.7, 0.7, 0.7, 1.0],
            specular: [0.01, 0.01, 0.01, 1.0],
            shininess: 150.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Component {
    /// Mesh file path as written in the model file.
    Mesh { source: String },
    Material(PhongMaterial),
}

#[derive(Debug, Clone)]
pub struct Entity {
    pub name: String,
    pub parent: Option<EntityId>,
    pub children: Vec<EntityId>,
    pub transform: Transform,
    pub components: Vec<Component>,
    pub properties: BTreeMap<String, String>,
}

impl Entity {
    pub fn mesh_source(&self) -> Option<&str> {
        self.components.iter().find_map(|c| match c {
            Component::Mesh { source } => Some(source.as_str()),
            _ => None,
        })
    }

    pub fn material(&self) -> Option<&PhongMaterial> {
        self.components.iter().find_map(|c| match c {
            Component::Material(m) => Some(m),
            _ => None,
        })
    }
}

/// Entities stored in creation order. A parent is always created before
/// its children, so a single forward pass resolves world matrices.
#[derive(Debug, Clone, Default)]
pub struct SceneGraph {
    entities: Vec<Entity>,
}

impl SceneGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `None` when `parent` is not part of the graph.
    pub fn add_entity(&mut self, name: impl Into<String>, parent: Option<EntityId>) -> Option<EntityId> {
        let id = EntityId(self.entities.len());
        if let Some(p) = parent {
            self.entities.get_mut(p.0)?.children.push(id);
        }
        self.entities.push(Entity {
            name: name.into(),
            parent,
            children: Vec::new(),
            transform: Transform::default(),
            components: Vec::new(),
            properties: BTreeMap::new(),
        });
        Some(id)
    }

    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(id.0)
    }

    pub fn entity_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.entities.get_mut(id.0)
    }

    pub fn set_transform(&mut self, id: EntityId, transform: Transform) {
        if let Some(e) = self.entities.get_mut(id.0) {
            e.transform = transform;
        }
    }

    pub fn add_component(&mut self, id: EntityId, component: Component) {
        if let Some(e) = self.entities.get_mut(id.0) {
            e.components.push(component);
        }
    }

    pub fn set_property(&mut self, id: EntityId, key: impl Into<String>, value: impl Into<String>) {
        if let Some(e) = self.entities.get_mut(id.0) {
            e.properties.insert(key.into(), value.into());
        }
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (EntityId, &Entity)> {
        self.entities.iter().enumerate().map(|(i, e)| (EntityId(i), e))
    }

    /// Entities carrying a mesh.
    pub fn visuals(&self) -> impl Iterator<Item = (EntityId, &Entity)> {
        self.iter().filter(|(_, e)| e.mesh_source().is_some())
    }

    pub fn world_matrix(&self, id: EntityId) -> glm::Mat4 {
        let mut matrix = glm::Mat4::identity();
        let mut cursor = Some(id);
        while let Some(cur) = cursor {
            let Some(e) = self.entities.get(cur.0) else {
                break;
            };
            matrix = e.transform.matrix() * matrix;
            cursor = e.parent;
        }
        matrix
    }

    /// World matrix of every entity, indexed like `iter()`.
    pub fn world_matrices(&self) -> Vec<glm::Mat4> {
        let mut out: Vec<glm::Mat4> = Vec::with_capacity(self.entities.len());
        for e in &self.entities {
            let local = e.transform.matrix();
            let world = match e.parent {
                Some(p) => out[p.0] * local,
                None => local,
            };
            out.push(world);
        }
        out
    }

    /// Sphere around the visuals' world origins, padded by their scaled extent.
    pub fn bounding_sphere(&self) -> Option<([f32; 3], f32)> {
        let world = self.world_matrices();
        let points: Vec<(glm::Vec3, f32)> = self
            .visuals()
            .map(|(id, _)| {
                let m = &world[id.0];
                let origin = glm::vec3(m[(0, 3)], m[(1, 3)], m[(2, 3)]);
                let extent = (0..3)
                    .map(|c| glm::length(&m.fixed_view::<3, 1>(0, c).into_owned()))
                    .fold(0.0_f32, f32::max);
                (origin, extent * 0.5)
            })
            .collect();
        if points.is_empty() {
            return None;
        }
        let center = points.iter().fold(glm::Vec3::zeros(), |acc, (p, _)| acc + p) / points.len() as f32;
        let radius = points
            .iter()
            .map(|(p, r)| glm::distance(p, &center) + r)
            .fold(0.0_f32, f32::max);
        Some((center.into(), radius))
    }

    pub fn snapshot(&self, id: EntityId) -> Option<EntitySnapshot> {
        let e = self.entity(id)?;
        Some(EntitySnapshot {
            name: e.name.clone(),
            transform: TransformSnapshot::from(&e.transform),
            components: e.components.clone(),
            properties: e.properties.clone(),
            children: e.children.iter().filter_map(|c| self.snapshot(*c)).collect(),
        })
    }
}

/// Nested, serializable view of a subtree.
#[derive(Debug, Clone, Serialize)]
pub struct EntitySnapshot {
    pub name: String,
    pub transform: TransformSnapshot,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub components: Vec<Component>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<EntitySnapshot>,
}
