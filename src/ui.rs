use std::path::{Path, PathBuf};

use nalgebra_glm as glm;

use crate::renderer::camera::CameraState;
use crate::scene::LoadedModel;
use crate::settings::Settings;
use crate::timeline::Timeline;

/// Requests collected while drawing the UI, handled by the app afterwards.
#[derive(Debug, Default)]
pub struct UiActions {
    pub reset_camera: bool,
    pub colors_changed: bool,
    /// Set by the menu; the app opens the file dialog after the frame.
    pub pick_model: bool,
    pub pick_animation: bool,
    pub open_model: Option<PathBuf>,
    pub open_animation: Option<PathBuf>,
    pub reload_model: bool,
    pub detach_animation: bool,
}

pub const MODEL_EXTENSIONS: &[&str] = &["lua"];
pub const ANIMATION_EXTENSIONS: &[&str] = &["csv", "txt"];

pub struct Ui {
    /// Directory the file dialogs start in.
    last_dir: Option<PathBuf>,
}

fn toggle_button(ui: &mut egui::Ui, open: &mut bool, label: &str) -> bool {
    let text = if *open {
        format!("✅ {label}")
    } else {
        format!("⬜ {label}")
    };
    if ui.button(text).clicked() {
        *open = !*open;
        return true;
    }
    false
}

impl Ui {
    pub fn new() -> Self {
        Self { last_dir: None }
    }

    /// Makes the next file dialog start next to `path`.
    pub fn remember_dir(&mut self, path: &Path) {
        self.last_dir = path
            .parent()
            .filter(|dir| !dir.as_os_str().is_empty())
            .map(Path::to_path_buf);
    }

    pub fn last_dir(&self) -> Option<&Path> {
        self.last_dir.as_deref()
    }

    fn file_dialog(&self, title: &str, filter: &str, extensions: &[&str]) -> rfd::FileDialog {
        let dialog = rfd::FileDialog::new()
            .set_title(title)
            .add_filter(filter, extensions);
        match &self.last_dir {
            Some(dir) => dialog.set_directory(dir),
            None => dialog,
        }
    }

    pub fn pick_model_file(&self) -> Option<PathBuf> {
        self.file_dialog("Open model", "Rigid body model", MODEL_EXTENSIONS)
            .pick_file()
    }

    pub fn pick_animation_file(&self) -> Option<PathBuf> {
        self.file_dialog("Open animation", "Animation", ANIMATION_EXTENSIONS)
            .pick_file()
    }

    pub fn show(
        &mut self,
        ctx: &egui::Context,
        model: Option<&LoadedModel>,
        timeline: &mut Timeline,
        camera: &CameraState,
        settings: &mut Settings,
        wireframe_supported: bool,
    ) -> UiActions {
        let mut actions = UiActions::default();

        egui::TopBottomPanel::top("menu_bar").show(ctx, |ui| {
            ui.horizontal_wrapped(|ui| {
                if ui.button("📁 Open Model").clicked() {
                    actions.pick_model = true;
                }
                if ui
                    .add_enabled(model.is_some(), egui::Button::new("🎞 Open Animation"))
                    .clicked()
                {
                    actions.pick_animation = true;
                }
                if ui
                    .add_enabled(model.is_some(), egui::Button::new("🔄 Reload"))
                    .clicked()
                {
                    actions.reload_model = true;
                }

                ui.separator();
                ui.label("📋 Windows:");

                let mut changed = false;
                changed |= toggle_button(ui, &mut settings.ui.show_display_settings, "Display");
                changed |= toggle_button(ui, &mut settings.ui.show_colors, "Colors");
                changed |= toggle_button(ui, &mut settings.ui.show_model_info, "Model Info");
                if changed {
                    settings.ui.save();
                }
            });
        });

        egui::TopBottomPanel::bottom("timeline").show(ctx, |ui| {
            ui.add_space(2.0);
            timeline.show(ui);
            ui.add_space(2.0);
        });

        if settings.ui.show_display_settings {
            actions.reset_camera |= self.show_display_settings_window(ctx, settings, wireframe_supported);
        }

        if settings.ui.show_colors {
            actions.colors_changed |= self.show_colors_window(ctx, settings);
        }

        if settings.ui.show_model_info {
            actions.detach_animation |= self.show_model_info_window(ctx, model, settings);
        }

        self.draw_axis_gizmo(ctx, camera);

        actions
    }

    fn show_display_settings_window(
        &mut self,
        ctx: &egui::Context,
        settings: &mut Settings,
        wireframe_supported: bool,
    ) -> bool {
        let mut reset_camera = false;

        egui::Window::new("🎨 Display Settings")
            .default_width(300.0)
            .resizable(true)
            .open(&mut settings.ui.show_display_settings)
            .show(ctx, |ui| {
                let mut changed = false;

                ui.add_enabled_ui(wireframe_supported, |ui| {
                    changed |= ui
                        .checkbox(&mut settings.display.wireframe_mode, "Wireframe Mode")
                        .changed();
                });
                changed |= ui
                    .checkbox(&mut settings.display.show_grid, "Show Grid")
                    .changed();
                changed |= ui
                    .checkbox(&mut settings.display.show_axes, "Show Axes")
                    .changed();

                ui.separator();
                ui.label("Far Plane (View Distance):");
                changed |= ui
                    .add(
                        egui::Slider::new(&mut settings.display.far_plane, 5.0..=1000.0)
                            .suffix(" m")
                            .logarithmic(true),
                    )
                    .changed();

                ui.separator();
                ui.label("Playback:");
                let mut playback_changed = ui
                    .checkbox(&mut settings.playback.autoplay, "Play animations on load")
                    .changed();
                playback_changed |= ui
                    .add(
                        egui::DragValue::new(&mut settings.playback.speed_factor)
                            .speed(0.05)
                            .range(0.0..=10.0)
                            .prefix("default speed "),
                    )
                    .changed();
                if playback_changed {
                    settings.playback.save();
                }

                if changed {
                    settings.display.save();
                }

                ui.separator();

                if ui.button("Reset Camera").clicked() {
                    reset_camera = true;
                }
            });

        if !settings.ui.show_display_settings {
            settings.ui.save();
        }

        reset_camera
    }

    fn show_colors_window(&mut self, ctx: &egui::Context, settings: &mut Settings) -> bool {
        let mut colors_changed = false;

        egui::Window::new("🌈 Colors")
            .default_width(300.0)
            .resizable(true)
            .open(&mut settings.ui.show_colors)
            .show(ctx, |ui| {
                let mut changed = false;

                ui.label("Background:");
                changed |= ui
                    .color_edit_button_rgb(&mut settings.colors.background_color)
                    .changed();

                ui.label("Grid Major Lines:");
                changed |= ui
                    .color_edit_button_rgb(&mut settings.colors.grid_major_color)
                    .changed();

                ui.label("Grid Minor Lines:");
                changed |= ui
                    .color_edit_button_rgb(&mut settings.colors.grid_minor_color)
                    .changed();

                ui.label("Light Direction:");
                ui.horizontal(|ui| {
                    for c in settings.colors.light_direction.iter_mut() {
                        changed |= ui.add(egui::DragValue::new(c).speed(0.02).range(-1.0..=1.0)).changed();
                    }
                });

                ui.separator();

                if ui.button("Reset to Defaults").clicked() {
                    settings.colors = crate::settings::ColorSettings::default();
                    changed = true;
                }

                if changed {
                    settings.colors.save();
                    colors_changed = true;
                }
            });

        if !settings.ui.show_colors {
            settings.ui.save();
        }

        colors_changed
    }

    /// Returns true when the user asked to drop the animation.
    fn show_model_info_window(
        &mut self,
        ctx: &egui::Context,
        model: Option<&LoadedModel>,
        settings: &mut Settings,
    ) -> bool {
        let mut detach = false;

        egui::Window::new("ℹ️ Model Info")
            .default_width(320.0)
            .resizable(true)
            .open(&mut settings.ui.show_model_info)
            .show(ctx, |ui| {
                let Some(model) = model else {
                    ui.label("No model loaded");
                    return;
                };

                ui.label(format!("File: {}", model.display_name()));
                ui.separator();
                ui.label(format!("Segments: {}", model.model.segments.len()));
                ui.label(format!("Degrees of freedom: {}", model.model.q_size()));
                ui.label(format!("Visuals: {}", model.scene.visuals().count()));
                ui.label(format!("Total mass: {:.3} kg", model.model.total_mass()));
                let g = model.model.gravity;
                ui.label(format!("Gravity: ({:.2}, {:.2}, {:.2})", g.x, g.y, g.z));

                egui::CollapsingHeader::new("Segments").show(ui, |ui| {
                    egui::Grid::new("segments_grid").striped(true).show(ui, |ui| {
                        ui.strong("Name");
                        ui.strong("Parent");
                        ui.strong("Joint");
                        ui.strong("Visuals");
                        ui.end_row();
                        for segment in &model.model.segments {
                            ui.label(&segment.name);
                            ui.label(model.model.body_name(segment.parent).unwrap_or("?"));
                            ui.label(format!("{:?} ({})", segment.joint.kind, segment.joint.dof_count()));
                            ui.label(segment.visuals.len().to_string());
                            ui.end_row();
                        }
                    });
                });

                egui::CollapsingHeader::new("Configuration q").show(ui, |ui| {
                    if model.q.is_empty() {
                        ui.label("(no degrees of freedom)");
                    }
                    for (i, value) in model.q.iter().enumerate() {
                        ui.monospace(format!("q[{i:>2}] = {value:>9.4}"));
                    }
                });

                ui.separator();
                match &model.animation {
                    Some(clip) => {
                        ui.label(format!("Animation: {}", clip.name));
                        ui.label(format!(
                            "  {} frames, {:.3} s",
                            clip.frames.len(),
                            clip.duration()
                        ));
                        if ui.button("Remove animation").clicked() {
                            detach = true;
                        }
                    }
                    None => {
                        ui.label("No animation");
                    }
                }
            });

        if !settings.ui.show_model_info {
            settings.ui.save();
        }

        detach
    }

    /// World axes as seen from the camera, bottom-right corner.
    fn draw_axis_gizmo(&self, ctx: &egui::Context, camera: &CameraState) {
        let gizmo_size = 90.0;
        let gizmo_margin = 20.0;
        let bottom_panel = 48.0;

        let screen_rect = ctx.viewport_rect();
        let center = egui::pos2(
            screen_rect.max.x - gizmo_size / 2.0 - gizmo_margin,
            screen_rect.max.y - gizmo_size / 2.0 - gizmo_margin - bottom_panel,
        );
        let radius = gizmo_size / 2.8;
        let circle_radius = 10.0;

        let view = glm::look_at(&camera.eye(), &glm::Vec3::from(camera.target), &glm::vec3(0.0, 1.0, 0.0));

        let painter = ctx.layer_painter(egui::LayerId::new(
            egui::Order::Foreground,
            egui::Id::new("axis_gizmo_painter"),
        ));
        let font_id = egui::FontId::proportional(13.0);

        painter.circle_filled(
            center,
            gizmo_size / 2.0,
            egui::Color32::from_rgba_premultiplied(40, 40, 42, 220),
        );
        painter.circle_stroke(
            center,
            gizmo_size / 2.0,
            egui::Stroke::new(1.5, egui::Color32::from_gray(70)),
        );

        let mut axes = [
            (glm::vec4(1.0, 0.0, 0.0, 0.0), egui::Color32::from_rgb(220, 38, 38), "X"),
            (glm::vec4(0.0, 1.0, 0.0, 0.0), egui::Color32::from_rgb(102, 204, 102), "Y"),
            (glm::vec4(0.0, 0.0, 1.0, 0.0), egui::Color32::from_rgb(64, 128, 255), "Z"),
        ]
        .map(|(axis, color, label)| {
            let v = view * axis;
            (v.z, color, center + egui::vec2(v.x, -v.y) * radius, label)
        });
        // back to front
        axes.sort_by(|a, b| a.0.total_cmp(&b.0));

        for (depth, color, end, label) in axes {
            if depth >= 0.0 {
                painter.line_segment([center, end], egui::Stroke::new(3.0, color));
                painter.circle_filled(end, circle_radius, color);
                painter.text(
                    end,
                    egui::Align2::CENTER_CENTER,
                    label,
                    font_id.clone(),
                    egui::Color32::WHITE,
                );
            } else {
                let darker = egui::Color32::from_rgba_premultiplied(
                    (color.r() as f32 * 0.4) as u8,
                    (color.g() as f32 * 0.4) as u8,
                    (color.b() as f32 * 0.4) as u8,
                    180,
                );
                painter.line_segment([center, end], egui::Stroke::new(2.0, darker));
                painter.circle_filled(end, circle_radius * 0.7, darker);
            }
        }
    }
}
