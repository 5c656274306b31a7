use std::path::{Path, PathBuf};

use nalgebra_glm as glm;
use rbvis::animation::AnimationClip;
use rbvis::cli::{CliArgs, scene_dump};
use rbvis::renderer::{MeshData, MeshResolver};
use rbvis::scene::{LoadedModel, ModelLoader, OBJ_GROUP_PROPERTY};

fn data(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/data").join(name)
}

fn world_origin(model: &LoadedModel, frame: &str) -> glm::Vec3 {
    let id = model.segment_entity(frame).unwrap();
    let m = model.scene.world_matrix(id);
    glm::vec3(m[(0, 3)], m[(1, 3)], m[(2, 3)])
}

fn assert_near(a: glm::Vec3, b: glm::Vec3) {
    assert!(glm::distance(&a, &b) < 1e-4, "{a:?} != {b:?}");
}

#[test]
fn pendulum_loads_with_visuals() {
    let model = ModelLoader::load_from_file(data("pendulum.lua")).unwrap();

    assert_eq!(model.model.segments.len(), 3);
    assert_eq!(model.model.q_size(), 2);
    assert_eq!(model.q, vec![0.0, 0.0]);
    assert_eq!(model.display_name(), "pendulum.lua");
    assert_eq!(model.scene.visuals().count(), 4);

    let root = model.scene.entity(model.root).unwrap();
    assert_eq!(root.properties.get(OBJ_GROUP_PROPERTY).map(String::as_str), Some("Model"));
    assert_eq!(root.children.len(), 3);

    let lower = model.scene.entity(model.segment_entity("lower").unwrap()).unwrap();
    assert_eq!(lower.children.len(), 2);
}

#[test]
fn z_up_model_stands_upright() {
    let model = ModelLoader::load_from_file(data("pendulum.lua")).unwrap();

    assert_near(world_origin(&model, "mount"), glm::vec3(0.0, 1.5, 0.0));
    assert_near(world_origin(&model, "upper"), glm::vec3(0.0, 1.5, 0.0));
    assert_near(world_origin(&model, "lower"), glm::vec3(0.0, 1.0, 0.0));
}

#[test]
fn visual_placement_uses_axis_convention() {
    let model = ModelLoader::load_from_file(data("pendulum.lua")).unwrap();
    let upper = model.scene.entity(model.segment_entity("upper").unwrap()).unwrap();
    let rod = model.scene.entity(upper.children[0]).unwrap();

    assert_eq!(rod.mesh_source(), Some("meshes/unit_cube.obj"));
    assert_near(rod.transform.scale, glm::vec3(0.04, 0.04, 0.5));
    assert_near(rod.transform.translation, glm::vec3(0.0, 0.0, -0.25));

    let color = rod.material().unwrap().ambient;
    assert!((color[0] - 0.8).abs() < 1e-6);
    assert_eq!(color[3], 1.0);
}

#[test]
fn animation_drives_the_pose() {
    let mut model = ModelLoader::load_from_file(data("pendulum.lua")).unwrap();
    model.attach_animation(AnimationClip::load(data("swing.csv")).unwrap()).unwrap();
    assert!((model.animation_duration() - 2.0).abs() < 1e-9);

    model.apply_time(0.5).unwrap();
    assert!((model.q[0] - 0.7854).abs() < 1e-9);
    assert!((model.q[1] + 0.5).abs() < 1e-9);

    // the upper rod swings a quarter turn out of plumb
    let lower = world_origin(&model, "lower");
    let offset = 0.5 * std::f32::consts::FRAC_1_SQRT_2;
    assert!((lower.x.abs() - offset).abs() < 1e-3, "{lower:?}");
    assert!((lower.y - (1.5 - offset)).abs() < 1e-3, "{lower:?}");
    assert!(lower.z.abs() < 1e-4);

    model.apply_time(1.0).unwrap();
    assert_near(world_origin(&model, "lower"), glm::vec3(0.0, 1.0, 0.0));

    model.detach_animation().unwrap();
    assert_eq!(model.q, vec![0.0, 0.0]);
    assert_near(world_origin(&model, "lower"), glm::vec3(0.0, 1.0, 0.0));
    assert_eq!(model.animation_duration(), 0.0);
}

#[test]
fn mismatched_configuration_is_rejected() {
    let mut model = ModelLoader::load_from_file(data("pendulum.lua")).unwrap();
    let err = model.update_pose(&[0.1]).unwrap_err();
    assert_eq!(err.key, "q-size-mismatch");
    assert_eq!(err.arg("expected"), Some("2"));
    assert_eq!(model.q, vec![0.0, 0.0]);

    let clip = AnimationClip::parse("0.0 1.0\n1.0 2.0\n").unwrap();
    let err = model.attach_animation(clip).unwrap_err();
    assert_eq!(err.key, "animation-model-mismatch");
    assert!(model.animation.is_none());
}

#[test]
fn load_errors_name_the_cause() {
    let err = ModelLoader::load_from_file(data("missing.lua")).unwrap_err();
    assert_eq!(err.key, "model-not-found");

    let err = ModelLoader::load_from_file(data("broken_parent.lua")).unwrap_err();
    assert_eq!(err.key, "model-load");
    let message = err.to_string();
    assert!(message.contains("unknown-parent"), "{message}");
    assert!(message.contains("thigh"), "{message}");
}

#[test]
fn meshes_resolve_next_to_the_model() {
    let model = ModelLoader::load_from_file(data("pendulum.lua")).unwrap();
    let resolver = MeshResolver::new(model.model_dir(), &[]);

    let path = resolver.resolve("meshes/unit_cube.obj").unwrap();
    assert!(path.ends_with("meshes/unit_cube.obj"));
    assert!(resolver.resolve("meshes/no_such_mesh.obj").is_none());

    let mesh = MeshData::load_obj(&path).unwrap();
    assert_eq!(mesh.indices.len(), 36);
    for v in &mesh.vertices {
        let n = glm::make_vec3(&v.normal);
        assert!((glm::length(&n) - 1.0).abs() < 1e-4);
    }
}

#[test]
fn scene_dump_describes_the_graph() {
    let args = CliArgs::parse(
        ["--dump-scene", data("pendulum.lua").to_str().unwrap(), data("swing.csv").to_str().unwrap()]
            .map(String::from),
    )
    .unwrap();
    let json: serde_json::Value = serde_json::from_str(&scene_dump(&args).unwrap()).unwrap();

    assert_eq!(json["name"], "Model");
    assert_eq!(json["properties"][OBJ_GROUP_PROPERTY], "Model");
    let frames: Vec<_> = json["children"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["name"].as_str().unwrap())
        .collect();
    assert_eq!(frames, vec!["mount", "upper", "lower"]);

    let bob = &json["children"][2]["children"][1];
    assert_eq!(bob["name"], "lower.visual2");
    let types: Vec<_> = bob["components"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["type"].as_str().unwrap())
        .collect();
    assert_eq!(types, vec!["material", "mesh"]);
    assert_eq!(bob["transform"]["rotation"].as_array().unwrap().len(), 4);
}
