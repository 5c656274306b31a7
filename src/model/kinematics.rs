use nalgebra_glm as glm;

use super::model::RigidBodyModel;
use crate::error::VisError;

/// World placement of a body.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BodyPose {
    pub position: glm::DVec3,
    /// Rotates body coordinates into world coordinates.
    pub orientation: glm::DMat3,
}

impl BodyPose {
    pub fn identity() -> Self {
        Self {
            position: glm::DVec3::zeros(),
            orientation: glm::DMat3::identity(),
        }
    }

    pub fn transform_point(&self, point: &glm::DVec3) -> glm::DVec3 {
        self.position + self.orientation * point
    }
}

impl RigidBodyModel {
    fn check_q<'a>(&self, q: &'a [f64]) -> Result<Option<&'a [f64]>, VisError> {
        if q.is_empty() {
            return Ok(None);
        }
        if q.len() != self.q_size() {
            return Err(VisError::new("q-size-mismatch")
                .with_arg("expected", self.q_size())
                .with_arg("got", q.len()));
        }
        Ok(Some(q))
    }

    /// Pose of every body for configuration `q`, indexed by body id.
    /// An empty `q` stands for the zero configuration.
    pub fn forward_kinematics(&self, q: &[f64]) -> Result<Vec<BodyPose>, VisError> {
        let q = self.check_q(q)?;
        let mut poses = Vec::with_capacity(self.body_count());
        poses.push(BodyPose::identity());

        for (i, segment) in self.segments.iter().enumerate() {
            let parent = poses[segment.parent as usize];
            let dofs = segment.joint.dof_count();
            let (joint_rotation, joint_translation) = match q {
                Some(q) => {
                    let offset = self.q_offset(i as u32 + 1).unwrap_or(0);
                    segment.joint.motion(&q[offset..offset + dofs])
                }
                None => (glm::DMat3::identity(), glm::DVec3::zeros()),
            };
            let frame_to_parent = segment.joint_frame.e.transpose();
            poses.push(BodyPose {
                position: parent.position
                    + parent.orientation * (segment.joint_frame.r + frame_to_parent * joint_translation),
                orientation: parent.orientation * frame_to_parent * joint_rotation,
            });
        }
        Ok(poses)
    }

    fn pose(&self, q: &[f64], body_id: u32) -> Result<BodyPose, VisError> {
        if body_id as usize >= self.body_count() {
            return Err(VisError::new("unknown-body").with_arg("id", body_id));
        }
        let poses = self.forward_kinematics(q)?;
        Ok(poses[body_id as usize])
    }

    /// World coordinates of a point given in body coordinates.
    pub fn body_to_base_coordinates(
        &self,
        q: &[f64],
        body_id: u32,
        point: &glm::DVec3,
    ) -> Result<glm::DVec3, VisError> {
        Ok(self.pose(q, body_id)?.transform_point(point))
    }

    /// Body-to-world rotation.
    pub fn body_world_orientation(&self, q: &[f64], body_id: u32) -> Result<glm::DMat3, VisError> {
        Ok(self.pose(q, body_id)?.orientation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lua::parse_str;
    use std::f64::consts::FRAC_PI_2;

    fn close(a: &glm::DVec3, b: &glm::DVec3) -> bool {
        glm::length(&(a - b)) < 1e-9
    }

    fn arm() -> RigidBodyModel {
        // shoulder rotates about z, elbow sits 1m along the upper arm's x axis
        let src = r#"return { frames = {
            { name = "upper", parent = "ROOT", joint = "JointTypeRevoluteZ",
              joint_frame = { r = { 0, 0, 1 } } },
            { name = "lower", parent = "upper", joint = "JointTypeRevoluteZ",
              joint_frame = { r = { 1, 0, 0 } } },
            { name = "hand", parent = "lower", joint_frame = { r = { 0.5, 0, 0 } } },
        } }"#;
        RigidBodyModel::from_lua(&parse_str(src).unwrap()).unwrap()
    }

    #[test]
    fn zero_configuration_stacks_offsets() {
        let model = arm();
        let hand = model.body_id("hand").unwrap();
        let p = model
            .body_to_base_coordinates(&[], hand, &glm::DVec3::zeros())
            .unwrap();
        assert!(close(&p, &glm::vec3(1.5, 0.0, 1.0)));
        let explicit = model
            .body_to_base_coordinates(&model.zero_q(), hand, &glm::DVec3::zeros())
            .unwrap();
        assert!(close(&p, &explicit));
    }

    #[test]
    fn joint_angles_propagate_down_the_chain() {
        let model = arm();
        let q = [FRAC_PI_2, FRAC_PI_2];
        let lower = model.body_id("lower").unwrap();
        let hand = model.body_id("hand").unwrap();
        let elbow = model
            .body_to_base_coordinates(&q, lower, &glm::DVec3::zeros())
            .unwrap();
        assert!(close(&elbow, &glm::vec3(0.0, 1.0, 1.0)));
        let tip = model
            .body_to_base_coordinates(&q, hand, &glm::DVec3::zeros())
            .unwrap();
        assert!(close(&tip, &glm::vec3(-0.5, 1.0, 1.0)));
        let r = model.body_world_orientation(&q, hand).unwrap();
        assert!(close(&(r * glm::vec3(1.0, 0.0, 0.0)), &glm::vec3(-1.0, 0.0, 0.0)));
    }

    #[test]
    fn joint_frame_rotation_is_applied_before_joint_motion() {
        // E rotates parent coordinates into child ones: child x axis is parent y
        let src = r#"return { frames = {
            { name = "b", parent = "ROOT", joint = "JointTypePrismaticX",
              joint_frame = { E = { { 0, 1, 0 }, { -1, 0, 0 }, { 0, 0, 1 } } } },
        } }"#;
        let model = RigidBodyModel::from_lua(&parse_str(src).unwrap()).unwrap();
        let p = model
            .body_to_base_coordinates(&[2.0], 1, &glm::vec3(0.0, 0.0, 0.0))
            .unwrap();
        assert!(close(&p, &glm::vec3(0.0, 2.0, 0.0)));
    }

    #[test]
    fn wrong_q_length_and_unknown_body_fail() {
        let model = arm();
        assert_eq!(
            model.forward_kinematics(&[0.0]).unwrap_err().key,
            "q-size-mismatch"
        );
        assert_eq!(
            model.body_world_orientation(&[], 9).unwrap_err().key,
            "unknown-body"
        );
    }
}
