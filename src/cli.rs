use std::path::PathBuf;

use crate::animation::AnimationClip;
use crate::error::VisError;
use crate::scene::ModelLoader;

pub const USAGE: &str = "usage: rbvis-rs [--dump-scene] [MODEL.lua] [ANIMATION.csv]";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CliArgs {
    pub model: Option<PathBuf>,
    pub animation: Option<PathBuf>,
    /// Print the scene graph as JSON and exit instead of opening a window.
    pub dump_scene: bool,
    pub help: bool,
}

impl CliArgs {
    /// Parses arguments without the program name.
    pub fn parse(args: impl IntoIterator<Item = String>) -> Result<Self, VisError> {
        let mut out = Self::default();
        let mut positional = Vec::new();
        for arg in args {
            match arg.as_str() {
                "--dump-scene" => out.dump_scene = true,
                "-h" | "--help" => out.help = true,
                s if s.starts_with('-') && s.len() > 1 => {
                    return Err(VisError::new("unknown-option").with_arg("option", s));
                }
                _ => positional.push(PathBuf::from(arg)),
            }
        }
        if positional.len() > 2 {
            return Err(VisError::new("too-many-arguments").with_arg("count", positional.len()));
        }
        let mut positional = positional.into_iter();
        out.model = positional.next();
        out.animation = positional.next();
        if out.dump_scene && out.model.is_none() {
            return Err(VisError::new("dump-scene-without-model"));
        }
        Ok(out)
    }
}

/// Loads the model (and animation, posed at its start) and renders the
/// scene graph as pretty JSON.
pub fn scene_dump(args: &CliArgs) -> Result<String, VisError> {
    let path = args
        .model
        .as_ref()
        .ok_or_else(|| VisError::new("dump-scene-without-model"))?;
    let mut model = ModelLoader::load_from_file(path)?;
    if let Some(anim) = &args.animation {
        model.attach_animation(AnimationClip::load(anim)?)?;
        model.apply_time(0.0)?;
    }
    let snapshot = model
        .scene
        .snapshot(model.root)
        .ok_or_else(|| VisError::new("scene-root"))?;
    serde_json::to_string_pretty(&snapshot).map_err(|e| VisError::new("scene-dump").push_std(e))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Result<CliArgs, VisError> {
        CliArgs::parse(list.iter().map(|s| s.to_string()))
    }

    #[test]
    fn positional_model_and_animation() {
        let a = args(&["robot.lua", "walk.csv"]).unwrap();
        assert_eq!(a.model, Some(PathBuf::from("robot.lua")));
        assert_eq!(a.animation, Some(PathBuf::from("walk.csv")));
        assert!(!a.dump_scene);
        assert_eq!(args(&[]).unwrap(), CliArgs::default());
    }

    #[test]
    fn flags_and_errors() {
        assert!(args(&["--dump-scene", "m.lua"]).unwrap().dump_scene);
        assert_eq!(args(&["--dump-scene"]).unwrap_err().key, "dump-scene-without-model");
        assert_eq!(args(&["--fast", "m.lua"]).unwrap_err().key, "unknown-option");
        assert_eq!(args(&["a", "b", "c"]).unwrap_err().key, "too-many-arguments");
        assert!(args(&["-h"]).unwrap().help);
    }
}
