use std::collections::HashMap;

use log::debug;
use nalgebra_glm as glm;

use super::joint::Joint;
use super::segment::{Body, JointFrame, Segment};
use super::visual::VisualDesc;
use crate::error::VisError;
use crate::lua::LuaValue;

/// Name model files use for the fixed base.
pub const ROOT_NAME: &str = "ROOT";

#[derive(Debug, Clone)]
pub struct RigidBodyModel {
    /// Segment of body id `i` lives at index `i - 1`.
    pub segments: Vec<Segment>,
    pub gravity: glm::DVec3,
    ids: HashMap<String, u32>,
    q_offsets: Vec<usize>,
    q_size: usize,
}

impl RigidBodyModel {
    /// Builds the model from the table a model file returns.
    pub fn from_lua(root: &LuaValue) -> Result<Self, VisError> {
        let frames = &root["frames"];
        if frames.as_table().is_none() {
            return Err(VisError::new("model-without-frames").with_arg("found", frames.type_name()));
        }

        let mut model = Self {
            segments: Vec::with_capacity(frames.len()),
            gravity: root["gravity"].vec3_or("gravity", glm::vec3(0.0, 0.0, -9.81))?,
            ids: HashMap::new(),
            q_offsets: Vec::with_capacity(frames.len()),
            q_size: 0,
        };

        for (i, frame) in frames.sequence().enumerate() {
            let path = format!("frames[{}]", i + 1);
            let name = frame["name"]
                .as_str()
                .ok_or_else(|| VisError::new("frame-without-name").with_arg("path", &path))?
                .to_string();
            let parent_name = frame["parent"].as_str().ok_or_else(|| {
                VisError::new("frame-without-parent")
                    .with_arg("path", &path)
                    .with_arg("frame", &name)
            })?;
            let parent = model.body_id(parent_name).ok_or_else(|| {
                VisError::new("unknown-parent")
                    .with_arg("frame", &name)
                    .with_arg("parent", parent_name)
            })?;

            let segment = Segment {
                parent,
                joint_frame: JointFrame::from_lua(&frame["joint_frame"], &format!("{path}.joint_frame"))?,
                joint: Joint::from_lua(&frame["joint"], &format!("{path}.joint"))?,
                body: Body::from_lua(&frame["body"], &format!("{path}.body"))?,
                visuals: frame["visuals"]
                    .sequence()
                    .enumerate()
                    .map(|(j, v)| VisualDesc::from_lua(v, &format!("{path}.visuals[{}]", j + 1)))
                    .collect::<Result<_, _>>()?,
                name,
            };
            model.add_segment(segment)?;
        }

        debug!(
            "model: {} segments, {} degrees of freedom",
            model.segments.len(),
            model.q_size
        );
        Ok(model)
    }

    /// Appends a segment; its parent must already be part of the model.
    pub fn add_segment(&mut self, segment: Segment) -> Result<u32, VisError> {
        if segment.name == ROOT_NAME || self.ids.contains_key(&segment.name) {
            return Err(VisError::new("duplicate-frame").with_arg("frame", &segment.name));
        }
        if segment.parent as usize > self.segments.len() {
            return Err(VisError::new("unknown-parent")
                .with_arg("frame", &segment.name)
                .with_arg("parent", segment.parent));
        }
        let id = self.segments.len() as u32 + 1;
        self.ids.insert(segment.name.clone(), id);
        self.q_offsets.push(self.q_size);
        self.q_size += segment.joint.dof_count();
        self.segments.push(segment);
        Ok(id)
    }

    pub fn q_size(&self) -> usize {
        self.q_size
    }

    pub fn zero_q(&self) -> Vec<f64> {
        vec![0.0; self.q_size]
    }

    /// Base is body 0, frames are numbered from 1 in file order.
    pub fn body_id(&self, name: &str) -> Option<u32> {
        if name == ROOT_NAME {
            Some(0)
        } else {
            self.ids.get(name).copied()
        }
    }

    pub fn body_name(&self, id: u32) -> Option<&str> {
        match id {
            0 => Some(ROOT_NAME),
            _ => self.segments.get(id as usize - 1).map(|s| s.name.as_str()),
        }
    }

    pub fn body_count(&self) -> usize {
        self.segments.len() + 1
    }

    pub fn total_mass(&self) -> f64 {
        self.segments.iter().map(|s| s.body.mass).sum()
    }

    /// Offset of the body's first coordinate in `q`.
    pub fn q_offset(&self, id: u32) -> Option<usize> {
        match id {
            0 => None,
            _ => self.q_offsets.get(id as usize - 1).copied(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lua::parse_str;

    const LEG: &str = r#"
        return {
          frames = {
            { name = "pelvis", parent = "ROOT", joint = "JointTypeFloatingBase",
              body = { mass = 10, com = { 0, 0, 0.1 } } },
            { name = "thigh", parent = "pelvis", joint = { { 0, 1, 0, 0, 0, 0 } },
              joint_frame = { r = { 0, -0.1, 0 } }, body = { mass = 5 } },
            { name = "foot_marker", parent = "thigh", joint_frame = { r = { 0, 0, -0.4 } } },
          },
        }
    "#;

    #[test]
    fn ids_offsets_and_dofs() {
        let model = RigidBodyModel::from_lua(&parse_str(LEG).unwrap()).unwrap();
        assert_eq!(model.q_size(), 7);
        assert_eq!(model.body_id("ROOT"), Some(0));
        assert_eq!(model.body_id("thigh"), Some(2));
        assert_eq!(model.body_id("nope"), None);
        assert_eq!(model.body_name(3), Some("foot_marker"));
        assert_eq!(model.q_offset(2), Some(6));
        assert_eq!(model.q_offset(3), Some(7));
        assert_eq!(model.total_mass(), 15.0);
        assert_eq!(model.gravity, glm::vec3(0.0, 0.0, -9.81));
        assert_eq!(model.segments[1].joint_frame.r, glm::vec3(0.0, -0.1, 0.0));
    }

    #[test]
    fn parents_must_be_defined_first() {
        let src = r#"return { frames = {
            { name = "shank", parent = "thigh" },
            { name = "thigh", parent = "ROOT" },
        } }"#;
        let err = RigidBodyModel::from_lua(&parse_str(src).unwrap()).unwrap_err();
        assert_eq!(err.key, "unknown-parent");
        assert_eq!(err.arg("parent"), Some("thigh"));
    }

    #[test]
    fn duplicate_and_unnamed_frames_are_rejected() {
        let dup = r#"return { frames = { { name = "a", parent = "ROOT" }, { name = "a", parent = "ROOT" } } }"#;
        assert_eq!(
            RigidBodyModel::from_lua(&parse_str(dup).unwrap()).unwrap_err().key,
            "duplicate-frame"
        );
        let unnamed = r#"return { frames = { { parent = "ROOT" } } }"#;
        assert_eq!(
            RigidBodyModel::from_lua(&parse_str(unnamed).unwrap()).unwrap_err().key,
            "frame-without-name"
        );
        assert_eq!(
            RigidBodyModel::from_lua(&parse_str("return {}").unwrap()).unwrap_err().key,
            "model-without-frames"
        );
    }
}
