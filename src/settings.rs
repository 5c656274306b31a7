use std::path::PathBuf;

use crate::CONFY_APP_NAME;

use log::warn;
use serde::{Deserialize, Serialize};

fn load_or_default<T>(name: &str) -> T
where
    T: Default + Serialize + for<'de> Deserialize<'de>,
{
    confy::load(CONFY_APP_NAME, name).unwrap_or_else(|e| {
        warn!("settings '{name}' unreadable, using defaults: {e}");
        T::default()
    })
}

fn store<T: Serialize>(name: &str, value: &T) {
    if let Err(e) = confy::store(CONFY_APP_NAME, name, value) {
        warn!("failed to store settings '{name}': {e}");
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplaySettings {
    pub wireframe_mode: bool,
    pub show_grid: bool,
    pub show_axes: bool,
    pub far_plane: f32,
    /// Directories tried after the model directory and the working directory
    /// when resolving mesh files.
    pub mesh_search_paths: Vec<PathBuf>,
}

impl Default for DisplaySettings {
    fn default() -> Self {
        Self {
            wireframe_mode: false,
            show_grid: true,
            show_axes: true,
            far_plane: 100.0,
            mesh_search_paths: Vec::new(),
        }
    }
}

impl DisplaySettings {
    pub fn load() -> Self {
        load_or_default("display")
    }

    pub fn save(&self) {
        store("display", self);
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ColorSettings {
    pub background_color: [f32; 3],
    pub grid_major_color: [f32; 3],
    pub grid_minor_color: [f32; 3],
    pub light_direction: [f32; 3],
}

impl Default for ColorSettings {
    fn default() -> Self {
        Self {
            background_color: [0.12, 0.12, 0.14],
            grid_major_color: [0.35, 0.35, 0.35],
            grid_minor_color: [0.22, 0.22, 0.22],
            light_direction: [0.4, 1.0, 0.6],
        }
    }
}

impl ColorSettings {
    pub fn load() -> Self {
        load_or_default("colors")
    }

    pub fn save(&self) {
        store("colors", self);
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct UiSettings {
    pub show_display_settings: bool,
    pub show_colors: bool,
    pub show_model_info: bool,
}

impl UiSettings {
    pub fn load() -> Self {
        load_or_default("ui")
    }

    pub fn save(&self) {
        store("ui", self);
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackSettings {
    pub speed_factor: f32,
    pub slider_granularity: u32,
    pub autoplay: bool,
}

impl Default for PlaybackSettings {
    fn default() -> Self {
        Self {
            speed_factor: 1.0,
            slider_granularity: crate::timeline::DEFAULT_SLIDER_GRANULARITY,
            autoplay: false,
        }
    }
}

impl PlaybackSettings {
    pub fn load() -> Self {
        load_or_default("playback")
    }

    pub fn save(&self) {
        store("playback", self);
    }
}

pub struct Settings {
    pub display: DisplaySettings,
    pub colors: ColorSettings,
    pub ui: UiSettings,
    pub playback: PlaybackSettings,
}

impl Settings {
    pub fn load() -> Self {
        Self {
            display: DisplaySettings::load(),
            colors: ColorSettings::load(),
            ui: UiSettings::load(),
            playback: PlaybackSettings::load(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_settings_fill_in_defaults() {
        let display: DisplaySettings = serde_json::from_str(r#"{ "show_grid": false }"#).unwrap();
        assert!(!display.show_grid);
        assert!(display.show_axes);
        assert!(display.mesh_search_paths.is_empty());

        let playback: PlaybackSettings = serde_json::from_str("{}").unwrap();
        assert_eq!(playback.slider_granularity, crate::timeline::DEFAULT_SLIDER_GRANULARITY);
    }
}
