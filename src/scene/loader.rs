use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use nalgebra_glm as glm;

use super::graph::{Component, EntityId, PhongMaterial, SceneGraph};
use super::transform::{Transform, to_f32_quat, to_f32_vec};
use crate::animation::AnimationClip;
use crate::error::VisError;
use crate::lua::{self, LuaValue};
use crate::model::{AxisConvention, RigidBodyModel};

/// Property marking the root of a loaded model.
pub const OBJ_GROUP_PROPERTY: &str = "Scene.ObjGroup";

/// A model file turned into a scene graph, plus what is needed to re-pose it.
#[derive(Debug, Clone)]
pub struct LoadedModel {
    pub model_file: PathBuf,
    pub model: RigidBodyModel,
    pub description: LuaValue,
    pub axis_transform: glm::DMat3,
    pub scene: SceneGraph,
    pub root: EntityId,
    /// Segment entity of each frame, by frame name.
    pub body_entities: BTreeMap<String, EntityId>,
    /// Segment entity of each body id; index 0 (the base) is unused.
    segment_entities: Vec<Option<EntityId>>,
    pub q: Vec<f64>,
    pub animation: Option<AnimationClip>,
}

pub struct ModelLoader;

impl ModelLoader {
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<LoadedModel, VisError> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(VisError::new("model-not-found").with_arg("path", path.display()));
        }
        let description = lua::parse_file(path)?;
        let loaded = LoadedModel::build(description, path.to_path_buf())
            .map_err(|e| VisError::new("model-load").with_arg("path", path.display()).push_vis(e))?;
        info!(
            "loaded {}: {} segments, {} visuals, {} dofs",
            path.display(),
            loaded.model.segments.len(),
            loaded.scene.visuals().count(),
            loaded.model.q_size()
        );
        Ok(loaded)
    }

    /// Same as `load_from_file` for source text; meshes resolve against `model_file`'s directory.
    pub fn from_source(src: &str, model_file: impl Into<PathBuf>) -> Result<LoadedModel, VisError> {
        LoadedModel::build(lua::parse_str(src)?, model_file.into())
    }
}

impl LoadedModel {
    fn build(description: LuaValue, model_file: PathBuf) -> Result<Self, VisError> {
        let model = RigidBodyModel::from_lua(&description)?;
        let q = model.zero_q();
        debug!("model description:\n{}", description.serialize());

        let axis_transform = AxisConvention::from_lua(&description["configuration"])?.remap_matrix();
        if axis_transform.try_inverse().is_none() {
            warn!("axis convention is singular, segment rotations are not remapped");
        }

        let mut scene = SceneGraph::new();
        let root = scene
            .add_entity("Model", None)
            .ok_or_else(|| VisError::new("scene-root"))?;

        let mut body_entities = BTreeMap::new();
        let mut segment_entities = vec![None; model.body_count()];

        for (i, segment) in model.segments.iter().enumerate() {
            let segment_entity = scene
                .add_entity(segment.name.clone(), Some(root))
                .ok_or_else(|| VisError::new("scene-segment").with_arg("frame", &segment.name))?;

            for (j, visual) in segment.visuals.iter().enumerate() {
                let (translation, rotation, scale) = visual.placement(&axis_transform);
                let entity = scene
                    .add_entity(format!("{}.visual{}", segment.name, j + 1), Some(segment_entity))
                    .ok_or_else(|| VisError::new("scene-visual").with_arg("frame", &segment.name))?;
                scene.set_transform(
                    entity,
                    Transform {
                        translation: to_f32_vec(&translation),
                        rotation: to_f32_quat(&rotation),
                        scale: to_f32_vec(&scale),
                    },
                );
                scene.add_component(
                    entity,
                    Component::Material(PhongMaterial {
                        ambient: [visual.color.x as f32, visual.color.y as f32, visual.color.z as f32, 1.0],
                        ..PhongMaterial::default()
                    }),
                );
                scene.add_component(entity, Component::Mesh { source: visual.src.clone() });
            }

            body_entities.insert(segment.name.clone(), segment_entity);
            segment_entities[i + 1] = Some(segment_entity);
        }

        // Z-up model, Y-up renderer
        let base = model.body_to_base_coordinates(&q, 0, &glm::DVec3::zeros())?;
        scene.set_transform(
            root,
            Transform::default()
                .with_translation(to_f32_vec(&base))
                .with_rotation(glm::quat_angle_axis(-std::f32::consts::FRAC_PI_2, &glm::vec3(1.0, 0.0, 0.0))),
        );
        scene.set_property(root, OBJ_GROUP_PROPERTY, "Model");

        let mut loaded = Self {
            model_file,
            model,
            description,
            axis_transform,
            scene,
            root,
            body_entities,
            segment_entities,
            q,
            animation: None,
        };
        loaded.place_segments()?;
        Ok(loaded)
    }

    pub fn model_dir(&self) -> &Path {
        self.model_file.parent().unwrap_or_else(|| Path::new("."))
    }

    pub fn display_name(&self) -> String {
        self.model_file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Re-places every segment for configuration `q`.
    pub fn update_pose(&mut self, q: &[f64]) -> Result<(), VisError> {
        if q.len() != self.model.q_size() {
            return Err(VisError::new("q-size-mismatch")
                .with_arg("expected", self.model.q_size())
                .with_arg("got", q.len()));
        }
        self.q.clear();
        self.q.extend_from_slice(q);
        self.place_segments()
    }

    fn place_segments(&mut self) -> Result<(), VisError> {
        let poses = self.model.forward_kinematics(&self.q)?;
        let a = self.axis_transform;
        let a_inv = a.try_inverse();

        for (body_id, entity) in self.segment_entities.iter().enumerate() {
            let Some(entity) = entity else {
                continue;
            };
            let pose = &poses[body_id];
            let translation = a * pose.position;
            let rotation = match &a_inv {
                Some(a_inv) => glm::mat3_to_quat(&(a * pose.orientation * a_inv)),
                None => glm::mat3_to_quat(&pose.orientation),
            };
            if let Some(e) = self.scene.entity_mut(*entity) {
                e.transform.translation = to_f32_vec(&translation);
                e.transform.rotation = to_f32_quat(&rotation);
            }
        }
        Ok(())
    }

    pub fn attach_animation(&mut self, clip: AnimationClip) -> Result<(), VisError> {
        clip.check_compatible(&self.model)?;
        info!("animation '{}' attached ({:.3}s)", clip.name, clip.duration());
        self.animation = Some(clip);
        Ok(())
    }

    /// Drops the animation and returns the model to its load-time pose.
    pub fn detach_animation(&mut self) -> Result<(), VisError> {
        self.animation = None;
        let q = self.model.zero_q();
        self.update_pose(&q)
    }

    pub fn animation_duration(&self) -> f64 {
        self.animation.as_ref().map_or(0.0, AnimationClip::duration)
    }

    /// Poses the model at animation time `t`. Without an animation this is a no-op.
    pub fn apply_time(&mut self, t: f64) -> Result<(), VisError> {
        let Some(clip) = &self.animation else {
            return Ok(());
        };
        let q = clip.sample(t);
        self.update_pose(&q)
    }

    pub fn segment_entity(&self, name: &str) -> Option<EntityId> {
        self.body_entities.get(name).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PENDULUM: &str = r#"
        return {
          configuration = {
            axis_front = { 1, 0, 0 },
            axis_up = { 0, 0, 1 },
            axis_right = { 0, -1, 0 },
          },
          frames = {
            { name = "base", parent = "ROOT",
              joint_frame = { r = { 0, 0, 1 } },
              visuals = { { src = "meshes/unit_cube.obj", color = { 0.2, 0.4, 0.6 }, dimensions = { 0.1, 0.1, 0.1 } } } },
            { name = "arm", parent = "base", joint = "JointTypeRevoluteY",
              visuals = {
                { src = "meshes/unit_cube.obj", dimensions = { 0.05, 0.05, 0.5 }, mesh_center = { 0, 0, -0.25 } },
                { src = "meshes/sphere.obj", translate = { 0, 0, -0.5 }, rotate = { angle = 45, axis = { 0, 0, 1 } } },
              } },
          },
        }
    "#;

    fn load() -> LoadedModel {
        ModelLoader::from_source(PENDULUM, "models/pendulum.lua").unwrap()
    }

    fn close(a: &glm::Vec3, b: &glm::Vec3) -> bool {
        glm::length(&(a - b)) < 1e-5
    }

    #[test]
    fn builds_segments_and_visual_children() {
        let m = load();
        assert_eq!(m.body_entities.len(), 2);
        let arm = m.segment_entity("arm").unwrap();
        assert_eq!(m.scene.entity(arm).unwrap().children.len(), 2);
        assert_eq!(m.scene.visuals().count(), 3);
        assert_eq!(m.model_dir(), Path::new("models"));

        let root = m.scene.entity(m.root).unwrap();
        assert_eq!(root.properties.get(OBJ_GROUP_PROPERTY).map(String::as_str), Some("Model"));
        assert_eq!(root.children.len(), 2);
    }

    #[test]
    fn visual_material_and_placement() {
        let m = load();
        let base = m.segment_entity("base").unwrap();
        let cube = m.scene.entity(base).unwrap().children[0];
        let cube = m.scene.entity(cube).unwrap();
        assert_eq!(cube.mesh_source(), Some("meshes/unit_cube.obj"));
        assert_eq!(cube.material().unwrap().ambient, [0.2, 0.4, 0.6, 1.0]);
        assert!(close(&cube.transform.scale, &glm::vec3(0.1, 0.1, 0.1)));

        let arm = m.segment_entity("arm").unwrap();
        let rod = m.scene.entity(m.scene.entity(arm).unwrap().children[0]).unwrap();
        // A maps authored z to renderer z (axis_up = z), right = -y
        assert!(close(&rod.transform.scale, &glm::vec3(0.05, 0.05, 0.5)));
        assert!(close(&rod.transform.translation, &glm::vec3(0.0, 0.0, -0.25)));
    }

    #[test]
    fn segments_follow_forward_kinematics() {
        let mut m = load();
        let arm = m.segment_entity("arm").unwrap();
        assert!(close(&m.scene.entity(arm).unwrap().transform.translation, &glm::vec3(0.0, 0.0, 1.0)));

        // rod tip hangs 0.5 below the pivot; a quarter turn about y swings it to -x
        let tip_local = glm::vec4(0.0, 0.0, -0.5, 1.0);
        m.update_pose(&[std::f64::consts::FRAC_PI_2]).unwrap();
        let seg = m.scene.entity(arm).unwrap().transform.matrix();
        let tip = seg * tip_local;
        assert!(close(&tip.xyz(), &glm::vec3(-0.5, 0.0, 1.0)));

        assert_eq!(m.update_pose(&[]).unwrap_err().key, "q-size-mismatch");
    }

    #[test]
    fn animation_drives_pose() {
        let mut m = load();
        let clip = AnimationClip::parse("0, 0\n1, 1.5707963267948966\n").unwrap();
        m.attach_animation(clip).unwrap();
        assert_eq!(m.animation_duration(), 1.0);
        m.apply_time(1.0).unwrap();
        assert!((m.q[0] - std::f64::consts::FRAC_PI_2).abs() < 1e-12);

        let wide = AnimationClip::parse("0, 0, 0\n").unwrap();
        assert_eq!(m.attach_animation(wide).unwrap_err().key, "animation-model-mismatch");
    }

    #[test]
    fn detaching_restores_the_rest_pose() {
        let mut m = load();
        let arm = m.segment_entity("arm").unwrap();
        let rest = m.scene.entity(arm).unwrap().transform;

        m.attach_animation(AnimationClip::parse("0, 0\n1, 1.2\n").unwrap()).unwrap();
        m.apply_time(1.0).unwrap();
        assert_ne!(m.scene.entity(arm).unwrap().transform.rotation, rest.rotation);

        m.detach_animation().unwrap();
        assert!(m.animation.is_none());
        assert_eq!(m.q, m.model.zero_q());
        let after = m.scene.entity(arm).unwrap().transform;
        assert!(close(&after.translation, &rest.translation));
        assert!(glm::length(&(after.rotation.coords - rest.rotation.coords)) < 1e-6);

        // time events after the detach leave the rest pose alone
        m.apply_time(0.5).unwrap();
        assert_eq!(m.q, m.model.zero_q());
    }

    #[test]
    fn singular_axis_convention_still_loads() {
        let src = r#"
            return {
              configuration = { axis_front = { 0, 0, 1 }, axis_up = { 0, 0, 1 } },
              frames = {
                { name = "link", parent = "ROOT", joint = "JointTypeRevoluteX",
                  joint_frame = { r = { 0, 0, 1 } },
                  visuals = { { src = "meshes/unit_cube.obj", rotate = { angle = 30, axis = { 1, 0, 0 } } } } },
              },
            }
        "#;
        let mut m = ModelLoader::from_source(src, "degenerate.lua").unwrap();
        assert!(m.axis_transform.try_inverse().is_none());
        m.update_pose(&[0.7]).unwrap();

        let link = m.segment_entity("link").unwrap();
        let t = m.scene.entity(link).unwrap().transform;
        assert!(t.rotation.coords.iter().all(|c| c.is_finite()));
        // unremapped world rotation: 0.7 rad about x
        let expected = glm::quat_angle_axis(0.7_f32, &glm::vec3(1.0, 0.0, 0.0));
        assert!(glm::length(&(t.rotation.coords - expected.coords)) < 1e-5);
        assert!(t.translation.iter().all(|c| c.is_finite()));
        let visual = m.scene.entity(link).unwrap().children[0];
        let v = m.scene.entity(visual).unwrap().transform;
        assert!(v.rotation.coords.iter().all(|c| c.is_finite()));
        assert!(v.scale.iter().all(|c| c.is_finite()));
    }

    #[test]
    fn missing_file_is_an_error() {
        let err = ModelLoader::load_from_file("does/not/exist.lua").unwrap_err();
        assert_eq!(err.key, "model-not-found");
    }
}
