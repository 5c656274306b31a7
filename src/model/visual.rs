use log::warn;
use nalgebra_glm as glm;

use crate::error::VisError;
use crate::lua::LuaValue;

/// Which model-file axes point front, up and right.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisConvention {
    pub front: glm::DVec3,
    pub up: glm::DVec3,
    pub right: glm::DVec3,
}

impl Default for AxisConvention {
    fn default() -> Self {
        Self {
            front: glm::vec3(1.0, 0.0, 0.0),
            up: glm::vec3(0.0, 1.0, 0.0),
            right: glm::vec3(0.0, 0.0, 1.0),
        }
    }
}

impl AxisConvention {
    /// Reads `axis_front`, `axis_up` and `axis_right` from the `configuration` table.
    pub fn from_lua(configuration: &LuaValue) -> Result<Self, VisError> {
        let d = Self::default();
        Ok(Self {
            front: configuration["axis_front"].vec3_or("configuration.axis_front", d.front)?,
            up: configuration["axis_up"].vec3_or("configuration.axis_up", d.up)?,
            right: configuration["axis_right"].vec3_or("configuration.axis_right", d.right)?,
        })
    }

    /// Basis change with columns `front, right, up`.
    pub fn remap_matrix(&self) -> glm::DMat3 {
        glm::DMat3::from_columns(&[self.front, self.right, self.up])
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VisualRotation {
    pub angle_deg: f64,
    pub axis: glm::DVec3,
}

/// Mesh attached to a segment, as written in the model file.
#[derive(Debug, Clone, PartialEq)]
pub struct VisualDesc {
    pub src: String,
    pub color: glm::DVec3,
    pub scale: glm::DVec3,
    pub dimensions: glm::DVec3,
    pub translate: glm::DVec3,
    pub mesh_center: glm::DVec3,
    pub rotate: Option<VisualRotation>,
}

impl VisualDesc {
    pub fn from_lua(value: &LuaValue, path: &str) -> Result<Self, VisError> {
        let src = value["src"].as_str().ok_or_else(|| {
            VisError::new("visual-without-src")
                .with_arg("path", path)
                .with_arg("found", value["src"].type_name())
        })?;
        let ones = glm::vec3(1.0, 1.0, 1.0);
        let rotate = &value["rotate"];
        let rotate = if rotate.exists() {
            Some(VisualRotation {
                angle_deg: rotate["angle"].f64_or(&format!("{path}.rotate.angle"), 0.0)?,
                axis: rotate["axis"].vec3_or(&format!("{path}.rotate.axis"), glm::vec3(1.0, 0.0, 0.0))?,
            })
        } else {
            None
        };
        Ok(Self {
            src: src.to_string(),
            color: value["color"].vec3_or(&format!("{path}.color"), ones)?,
            scale: value["scale"].vec3_or(&format!("{path}.scale"), ones)?,
            dimensions: value["dimensions"].vec3_or(&format!("{path}.dimensions"), ones)?,
            translate: value["translate"].vec3_or(&format!("{path}.translate"), glm::DVec3::zeros())?,
            mesh_center: value["mesh_center"].vec3_or(&format!("{path}.mesh_center"), glm::DVec3::zeros())?,
            rotate,
        })
    }

    /// Scale, rotation and translation of the mesh in segment coordinates
    /// after the axis remap `a`.
    pub fn placement(&self, a: &glm::DMat3) -> (glm::DVec3, glm::DQuat, glm::DVec3) {
        let scale = (a * self.scale).abs();
        let dimensions = (a * self.dimensions).abs();
        let translate = a * self.translate;
        let center = a * self.mesh_center;

        let rotation = match self.rotate {
            Some(rot) => {
                let axis = a * rot.axis;
                if glm::length(&axis) > f64::EPSILON {
                    glm::quat_angle_axis(rot.angle_deg.to_radians(), &glm::normalize(&axis))
                } else {
                    warn!("visual '{}' has a zero rotation axis, ignoring rotation", self.src);
                    glm::quat_identity()
                }
            }
            None => glm::quat_identity(),
        };

        (center + translate, rotation, dimensions.component_mul(&scale))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lua::parse_str;

    #[test]
    fn default_convention_swaps_up_and_right() {
        let a = AxisConvention::default().remap_matrix();
        assert_eq!(a * glm::vec3(1.0, 2.0, 3.0), glm::vec3(1.0, 3.0, 2.0));
    }

    #[test]
    fn convention_reads_configuration() {
        let cfg = parse_str("return { axis_front = { 0, 1, 0 }, axis_up = { 0, 0, 1 }, axis_right = { 1, 0, 0 } }").unwrap();
        let a = AxisConvention::from_lua(&cfg).unwrap().remap_matrix();
        assert_eq!(a.column(0).into_owned(), glm::vec3(0.0, 1.0, 0.0));
        assert_eq!(a.column(1).into_owned(), glm::vec3(1.0, 0.0, 0.0));
        assert_eq!(a.column(2).into_owned(), glm::vec3(0.0, 0.0, 1.0));
    }

    #[test]
    fn visual_defaults_and_required_src() {
        let v = VisualDesc::from_lua(&parse_str(r#"return { src = "box.obj" }"#).unwrap(), "v").unwrap();
        assert_eq!(v.color, glm::vec3(1.0, 1.0, 1.0));
        assert_eq!(v.mesh_center, glm::DVec3::zeros());
        assert!(v.rotate.is_none());

        let err = VisualDesc::from_lua(&parse_str("return { color = { 1, 0, 0 } }").unwrap(), "v").unwrap_err();
        assert_eq!(err.key, "visual-without-src");
    }

    #[test]
    fn placement_combines_dimensions_scale_and_offsets() {
        let v = VisualDesc::from_lua(
            &parse_str(
                r#"return { src = "m.obj", dimensions = { 2, 4, 6 }, scale = { 1, 0.5, 2 },
                    translate = { 0, 0, 1 }, mesh_center = { 1, 0, 0 },
                    rotate = { angle = 90, axis = { 0, 0, 1 } } }"#,
            )
            .unwrap(),
            "v",
        )
        .unwrap();
        let a = AxisConvention::default().remap_matrix();
        let (translation, rotation, scale) = v.placement(&a);
        assert_eq!(translation, glm::vec3(1.0, 1.0, 0.0));
        assert_eq!(scale, glm::vec3(2.0, 12.0, 2.0));
        // authored z axis is the renderer's y axis after the remap
        let turned = glm::quat_rotate_vec3(&rotation, &glm::vec3(1.0, 0.0, 0.0));
        assert!(glm::length(&(turned - glm::vec3(0.0, 0.0, -1.0))) < 1e-9);
    }
}
