use nalgebra_glm as glm;

use crate::error::VisError;
use crate::lua::LuaValue;

/// One degree of freedom: rotation about `angular`, translation along `linear`.
/// Stored in the `{wx, wy, wz, vx, vy, vz}` layout model files use.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpatialAxis {
    pub angular: glm::DVec3,
    pub linear: glm::DVec3,
}

impl SpatialAxis {
    pub fn revolute(x: f64, y: f64, z: f64) -> Self {
        Self {
            angular: glm::vec3(x, y, z),
            linear: glm::DVec3::zeros(),
        }
    }

    pub fn prismatic(x: f64, y: f64, z: f64) -> Self {
        Self {
            angular: glm::DVec3::zeros(),
            linear: glm::vec3(x, y, z),
        }
    }

    fn from_numbers(values: &[f64]) -> Option<Self> {
        match values {
            [wx, wy, wz, vx, vy, vz] => Some(Self {
                angular: glm::vec3(*wx, *wy, *wz),
                linear: glm::vec3(*vx, *vy, *vz),
            }),
            _ => None,
        }
    }

    /// Rotation and translation of this axis displaced by `q`.
    pub fn motion(&self, q: f64) -> (glm::DMat3, glm::DVec3) {
        let rotation = if glm::length(&self.angular) > f64::EPSILON {
            glm::quat_to_mat3(&glm::quat_angle_axis(q, &self.angular))
        } else {
            glm::DMat3::identity()
        };
        (rotation, self.linear * q)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JointKind {
    Fixed,
    RevoluteX,
    RevoluteY,
    RevoluteZ,
    PrismaticX,
    PrismaticY,
    PrismaticZ,
    TranslationXYZ,
    EulerZYX,
    EulerXYZ,
    EulerYXZ,
    Spherical,
    FloatingBase,
    Custom,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Joint {
    pub kind: JointKind,
    pub axes: Vec<SpatialAxis>,
}

impl Joint {
    pub fn fixed() -> Self {
        Self {
            kind: JointKind::Fixed,
            axes: Vec::new(),
        }
    }

    pub fn from_kind(kind: JointKind) -> Self {
        let rx = SpatialAxis::revolute(1.0, 0.0, 0.0);
        let ry = SpatialAxis::revolute(0.0, 1.0, 0.0);
        let rz = SpatialAxis::revolute(0.0, 0.0, 1.0);
        let tx = SpatialAxis::prismatic(1.0, 0.0, 0.0);
        let ty = SpatialAxis::prismatic(0.0, 1.0, 0.0);
        let tz = SpatialAxis::prismatic(0.0, 0.0, 1.0);
        let axes = match kind {
            JointKind::Fixed | JointKind::Custom => Vec::new(),
            JointKind::RevoluteX => vec![rx],
            JointKind::RevoluteY => vec![ry],
            JointKind::RevoluteZ => vec![rz],
            JointKind::PrismaticX => vec![tx],
            JointKind::PrismaticY => vec![ty],
            JointKind::PrismaticZ => vec![tz],
            JointKind::TranslationXYZ => vec![tx, ty, tz],
            JointKind::EulerZYX | JointKind::Spherical => vec![rz, ry, rx],
            JointKind::EulerXYZ => vec![rx, ry, rz],
            JointKind::EulerYXZ => vec![ry, rx, rz],
            JointKind::FloatingBase => vec![tx, ty, tz, rz, ry, rx],
        };
        Self { kind, axes }
    }

    /// Accepts nothing (fixed), a joint type name, a list of spatial axes, or
    /// a single bare spatial axis.
    pub fn from_lua(value: &LuaValue, path: &str) -> Result<Self, VisError> {
        match value {
            LuaValue::Nil => Ok(Self::fixed()),
            LuaValue::String(name) => {
                let kind = kind_from_name(name).ok_or_else(|| {
                    VisError::new("unknown-joint-type")
                        .with_arg("path", path)
                        .with_arg("type", name)
                })?;
                Ok(Self::from_kind(kind))
            }
            LuaValue::Table(table) if table.is_empty() => Ok(Self::fixed()),
            LuaValue::Table(_) => {
                let bad_axis = |p: String| {
                    VisError::new("bad-joint-axis")
                        .with_arg("path", p)
                        .with_arg("expected", "6 numbers")
                };
                let axes = if value[1].as_f64().is_some() {
                    let numbers = value.numbers(path)?;
                    vec![SpatialAxis::from_numbers(&numbers).ok_or_else(|| bad_axis(path.to_string()))?]
                } else {
                    value
                        .sequence()
                        .enumerate()
                        .map(|(i, axis)| {
                            let p = format!("{path}[{}]", i + 1);
                            let numbers = axis.numbers(&p)?;
                            SpatialAxis::from_numbers(&numbers).ok_or_else(|| bad_axis(p))
                        })
                        .collect::<Result<Vec<_>, VisError>>()?
                };
                Ok(Self {
                    kind: JointKind::Custom,
                    axes,
                })
            }
            other => Err(VisError::new("bad-joint")
                .with_arg("path", path)
                .with_arg("found", other.type_name())),
        }
    }

    pub fn dof_count(&self) -> usize {
        self.axes.len()
    }

    /// Joint motion for its slice of generalized coordinates. Each axis acts
    /// in the frame left by the previous one.
    pub fn motion(&self, q: &[f64]) -> (glm::DMat3, glm::DVec3) {
        let mut rotation = glm::DMat3::identity();
        let mut translation = glm::DVec3::zeros();
        for (axis, &qi) in self.axes.iter().zip(q) {
            let (r, t) = axis.motion(qi);
            translation += rotation * t;
            rotation *= r;
        }
        (rotation, translation)
    }
}

fn kind_from_name(name: &str) -> Option<JointKind> {
    Some(match name {
        "JointTypeFixed" => JointKind::Fixed,
        "JointTypeRevoluteX" => JointKind::RevoluteX,
        "JointTypeRevoluteY" => JointKind::RevoluteY,
        "JointTypeRevoluteZ" => JointKind::RevoluteZ,
        "JointTypePrismaticX" => JointKind::PrismaticX,
        "JointTypePrismaticY" => JointKind::PrismaticY,
        "JointTypePrismaticZ" => JointKind::PrismaticZ,
        "JointTypeTranslationXYZ" => JointKind::TranslationXYZ,
        "JointTypeEulerZYX" => JointKind::EulerZYX,
        "JointTypeEulerXYZ" => JointKind::EulerXYZ,
        "JointTypeEulerYXZ" => JointKind::EulerYXZ,
        "JointTypeSpherical" => JointKind::Spherical,
        "JointTypeFloatingBase" => JointKind::FloatingBase,
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lua::parse_str;
    use std::f64::consts::FRAC_PI_2;

    fn close(a: &glm::DVec3, b: &glm::DVec3) -> bool {
        glm::length(&(a - b)) < 1e-9
    }

    #[test]
    fn parses_axis_lists_names_and_fixed() {
        let v = parse_str(
            r#"return {
                hinge = { { 0, 0, 1, 0, 0, 0 } },
                bare = { 0, 1, 0, 0, 0, 0 },
                planar = { { 0, 0, 0, 1, 0, 0 }, { 0, 0, 0, 0, 1, 0 }, { 0, 0, 1, 0, 0, 0 } },
                named = "JointTypeEulerZYX",
                empty = {},
            }"#,
        )
        .unwrap();
        let hinge = Joint::from_lua(&v["hinge"], "hinge").unwrap();
        assert_eq!(hinge.dof_count(), 1);
        assert_eq!(hinge.axes[0], SpatialAxis::revolute(0.0, 0.0, 1.0));
        assert_eq!(Joint::from_lua(&v["bare"], "bare").unwrap().dof_count(), 1);
        assert_eq!(Joint::from_lua(&v["planar"], "planar").unwrap().dof_count(), 3);
        let named = Joint::from_lua(&v["named"], "named").unwrap();
        assert_eq!(named.kind, JointKind::EulerZYX);
        assert_eq!(named.dof_count(), 3);
        assert_eq!(Joint::from_lua(&v["empty"], "empty").unwrap().kind, JointKind::Fixed);
        assert_eq!(Joint::from_lua(&v["missing"], "missing").unwrap().dof_count(), 0);
    }

    #[test]
    fn rejects_short_axes_and_unknown_names() {
        let v = parse_str(r#"return { short = { { 0, 0, 1 } }, odd = "JointTypeHelical" }"#).unwrap();
        assert_eq!(Joint::from_lua(&v["short"], "short").unwrap_err().key, "bad-joint-axis");
        assert_eq!(Joint::from_lua(&v["odd"], "odd").unwrap_err().key, "unknown-joint-type");
    }

    #[test]
    fn revolute_motion_rotates_counter_clockwise() {
        let (r, t) = Joint::from_kind(JointKind::RevoluteZ).motion(&[FRAC_PI_2]);
        assert!(close(&(r * glm::vec3(1.0, 0.0, 0.0)), &glm::vec3(0.0, 1.0, 0.0)));
        assert!(close(&t, &glm::DVec3::zeros()));
    }

    #[test]
    fn later_axes_act_in_the_rotated_frame() {
        // rotate about z by 90 degrees, then slide along the new x axis
        let joint = Joint {
            kind: JointKind::Custom,
            axes: vec![SpatialAxis::revolute(0.0, 0.0, 1.0), SpatialAxis::prismatic(1.0, 0.0, 0.0)],
        };
        let (_, t) = joint.motion(&[FRAC_PI_2, 2.0]);
        assert!(close(&t, &glm::vec3(0.0, 2.0, 0.0)));
    }

    #[test]
    fn zero_configuration_is_identity() {
        let (r, t) = Joint::from_kind(JointKind::FloatingBase).motion(&[0.0; 6]);
        assert_eq!(r, glm::DMat3::identity());
        assert_eq!(t, glm::DVec3::zeros());
    }
}
