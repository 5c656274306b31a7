use nalgebra_glm as glm;

use super::joint::Joint;
use super::visual::VisualDesc;
use crate::error::VisError;
use crate::lua::LuaValue;

/// Placement of a child frame in its parent: origin `r` in parent
/// coordinates, `e` maps parent coordinates into child coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct JointFrame {
    pub r: glm::DVec3,
    pub e: glm::DMat3,
}

impl Default for JointFrame {
    fn default() -> Self {
        Self {
            r: glm::DVec3::zeros(),
            e: glm::DMat3::identity(),
        }
    }
}

impl JointFrame {
    pub fn from_lua(value: &LuaValue, path: &str) -> Result<Self, VisError> {
        Ok(Self {
            r: value["r"].vec3_or(&format!("{path}.r"), glm::DVec3::zeros())?,
            e: value["E"].mat3_or(&format!("{path}.E"), glm::DMat3::identity())?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Body {
    pub mass: f64,
    pub com: glm::DVec3,
    pub inertia: glm::DMat3,
}

impl Default for Body {
    fn default() -> Self {
        Self {
            mass: 0.0,
            com: glm::DVec3::zeros(),
            inertia: glm::DMat3::zeros(),
        }
    }
}

impl Body {
    pub fn from_lua(value: &LuaValue, path: &str) -> Result<Self, VisError> {
        Ok(Self {
            mass: value["mass"].f64_or(&format!("{path}.mass"), 0.0)?,
            com: value["com"].vec3_or(&format!("{path}.com"), glm::DVec3::zeros())?,
            inertia: value["inertia"].mat3_or(&format!("{path}.inertia"), glm::DMat3::zeros())?,
        })
    }
}

/// A named rigid body and the joint connecting it to its parent.
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    pub name: String,
    /// Body id of the parent, 0 for the base.
    pub parent: u32,
    pub joint_frame: JointFrame,
    pub joint: Joint,
    pub body: Body,
    pub visuals: Vec<VisualDesc>,
}
