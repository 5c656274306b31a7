use nalgebra_glm as glm;
use serde::Serialize;

/// Translation, rotation and scale of an entity relative to its parent.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub translation: glm::Vec3,
    pub rotation: glm::Quat,
    pub scale: glm::Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            translation: glm::Vec3::zeros(),
            rotation: glm::quat_identity(),
            scale: glm::vec3(1.0, 1.0, 1.0),
        }
    }
}

impl Transform {
    /// `T * R * S`: scale first, then rotate, then translate.
    pub fn matrix(&self) -> glm::Mat4 {
        glm::translation(&self.translation) * glm::quat_to_mat4(&self.rotation) * glm::scaling(&self.scale)
    }

    pub fn with_translation(mut self, translation: glm::Vec3) -> Self {
        self.translation = translation;
        self
    }

    pub fn with_rotation(mut self, rotation: glm::Quat) -> Self {
        self.rotation = rotation;
        self
    }

    pub fn with_scale(mut self, scale: glm::Vec3) -> Self {
        self.scale = scale;
        self
    }
}

/// Plain-array form used for scene dumps.
#[derive(Debug, Clone, Serialize)]
pub struct TransformSnapshot {
    pub translation: [f32; 3],
    /// `[x, y, z, w]`
    pub rotation: [f32; 4],
    pub scale: [f32; 3],
}

impl From<&Transform> for TransformSnapshot {
    fn from(t: &Transform) -> Self {
        let q = t.rotation.coords;
        Self {
            translation: [t.translation.x, t.translation.y, t.translation.z],
            rotation: [q.x, q.y, q.z, q.w],
            scale: [t.scale.x, t.scale.y, t.scale.z],
        }
    }
}

pub(crate) fn to_f32_vec(v: &glm::DVec3) -> glm::Vec3 {
    glm::vec3(v.x as f32, v.y as f32, v.z as f32)
}

pub(crate) fn to_f32_quat(q: &glm::DQuat) -> glm::Quat {
    glm::quat(q.coords.x as f32, q.coords.y as f32, q.coords.z as f32, q.coords.w as f32)
}
