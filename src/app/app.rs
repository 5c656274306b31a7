use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use egui_wgpu::ScreenDescriptor;
use egui_winit::State;
use log::{error, info, warn};
use winit::window::Window;

use crate::animation::AnimationClip;
use crate::error::VisError;
use crate::renderer::camera::{CameraController, CameraState};
use crate::renderer::{MeshResolver, RenderOptions, Renderer};
use crate::scene::{LoadedModel, ModelLoader};
use crate::settings::Settings;
use crate::timeline::{Timeline, TimelineEvent};
use crate::ui::{Ui, UiActions};

pub struct EventResponse {
    pub repaint: bool,
    pub exit: bool,
}

pub struct App {
    pub window: Arc<Window>,
    ui: Ui,
    model: Option<LoadedModel>,
    animation_path: Option<PathBuf>,
    renderer: Renderer,
    camera_controller: CameraController,
    timeline: Timeline,
    egui_state: State,
    egui_wants_pointer: bool,
    settings: Settings,
    last_frame: Instant,
}

impl App {
    pub async fn new(window: Arc<Window>) -> Result<Self, VisError> {
        let renderer = Renderer::new(window.clone()).await?;

        let egui_ctx = renderer.egui_context();
        let egui_state = State::new(
            egui_ctx.clone(),
            egui::viewport::ViewportId::ROOT,
            &window,
            None,
            None,
            None,
        );

        let settings = Settings::load();
        let mut timeline = Timeline::new(settings.playback.slider_granularity);
        timeline.speed_changed(settings.playback.speed_factor);

        let mut app = Self {
            window,
            ui: Ui::new(),
            model: None,
            animation_path: None,
            renderer,
            camera_controller: CameraController::new(CameraState::default()),
            timeline,
            egui_state,
            egui_wants_pointer: false,
            settings,
            last_frame: Instant::now(),
        };

        app.renderer.update_colors(&app.settings.colors);

        Ok(app)
    }

    pub fn handle_event(&mut self, event: &winit::event::WindowEvent) -> EventResponse {
        let egui_response = self.egui_state.on_window_event(&self.window, event);
        let ignored = EventResponse {
            repaint: egui_response.repaint,
            exit: false,
        };

        match event {
            winit::event::WindowEvent::CloseRequested => {
                return EventResponse {
                    repaint: false,
                    exit: true,
                };
            }
            winit::event::WindowEvent::KeyboardInput { event, .. } => {
                if egui_response.consumed {
                    return ignored;
                }
                if event.state == winit::event::ElementState::Pressed {
                    match &event.logical_key {
                        winit::keyboard::Key::Named(winit::keyboard::NamedKey::Escape) => {
                            return EventResponse {
                                repaint: false,
                                exit: true,
                            };
                        }
                        winit::keyboard::Key::Named(winit::keyboard::NamedKey::Space) => {
                            self.timeline.toggle_playing();
                        }
                        winit::keyboard::Key::Character(c) if c.as_str() == "r" => {
                            self.camera_controller.reset();
                        }
                        _ => {}
                    }
                }
            }
            winit::event::WindowEvent::Resized(size) => {
                self.renderer.resize(*size);
            }
            winit::event::WindowEvent::MouseInput { state, button, .. } => {
                let is_pressed = *state == winit::event::ElementState::Pressed;
                // releases always reach the camera so a drag never sticks
                if self.egui_wants_pointer && is_pressed {
                    return ignored;
                }
                self.camera_controller.on_mouse_button(*button, is_pressed);
            }
            winit::event::WindowEvent::ModifiersChanged(modifiers) => {
                let state = modifiers.state();
                self.camera_controller
                    .on_modifiers(state.shift_key(), state.alt_key(), state.control_key());
            }
            winit::event::WindowEvent::CursorMoved { position, .. } => {
                if self.egui_wants_pointer {
                    return ignored;
                }
                self.camera_controller.on_mouse_move((position.x, position.y));
            }
            winit::event::WindowEvent::MouseWheel { delta, .. } => {
                if self.egui_wants_pointer {
                    return ignored;
                }
                match delta {
                    winit::event::MouseScrollDelta::LineDelta(_, y) => {
                        self.camera_controller.simple_zoom(*y);
                    }
                    winit::event::MouseScrollDelta::PixelDelta(pos) => {
                        let control = self.camera_controller.is_control_pressed();
                        let shift = self.camera_controller.is_shift_pressed();
                        self.camera_controller.on_pan_gesture(
                            pos.x as f32 * 0.05,
                            -pos.y as f32 * 0.05,
                            control,
                            shift,
                        );
                    }
                }
            }
            winit::event::WindowEvent::PanGesture { delta, phase, .. } => {
                if self.egui_wants_pointer {
                    return ignored;
                }
                if matches!(phase, winit::event::TouchPhase::Moved) {
                    let control = self.camera_controller.is_control_pressed();
                    let shift = self.camera_controller.is_shift_pressed();
                    self.camera_controller
                        .on_pan_gesture(delta.x, -delta.y, control, shift);
                }
            }
            _ => {}
        }

        EventResponse {
            repaint: false,
            exit: false,
        }
    }

    /// Forwards timeline time changes to the model and the GPU transforms.
    fn apply_timeline_events(&mut self) {
        let events = self.timeline.take_events();
        let Some(TimelineEvent::TimeChanged(t)) = events.last().copied() else {
            return;
        };
        let Some(model) = self.model.as_mut() else {
            return;
        };
        match model.apply_time(t as f64) {
            Ok(()) => self.renderer.update_transforms(&model.scene),
            Err(e) => error!("failed to pose model at t={t}: {e}"),
        }
    }

    fn handle_ui_actions(&mut self, actions: UiActions) {
        if actions.reset_camera {
            self.camera_controller.reset();
        }
        if actions.colors_changed {
            self.renderer.update_colors(&self.settings.colors);
        }
        if actions.detach_animation {
            if let Some(model) = self.model.as_mut() {
                match model.detach_animation() {
                    Ok(()) => self.renderer.update_transforms(&model.scene),
                    Err(e) => error!("failed to restore rest pose: {e}"),
                }
            }
            self.animation_path = None;
            self.timeline.reset();
        }

        let model_path = if actions.reload_model {
            self.model.as_ref().map(|m| m.model_file.clone())
        } else {
            actions.open_model
        };
        let animation_path = actions.open_animation.or_else(|| {
            actions
                .reload_model
                .then(|| self.animation_path.clone())
                .flatten()
        });

        if let Some(path) = model_path {
            if let Err(e) = self.load_model(&path) {
                error!("failed to load model '{}': {e}", path.display());
                return;
            }
        }
        if let Some(path) = animation_path {
            if let Err(e) = self.load_animation(&path) {
                error!("failed to load animation '{}': {e}", path.display());
            }
        }
    }

    pub fn render(&mut self) -> Result<(), wgpu::SurfaceError> {
        let now = Instant::now();
        let dt = now.duration_since(self.last_frame).as_secs_f32();
        self.last_frame = now;
        self.timeline.tick(dt);

        let raw_input = self.egui_state.take_egui_input(&self.window);
        let egui_ctx = self.renderer.egui_context();

        let mut actions = UiActions::default();
        let full_output = egui_ctx.run(raw_input, |ctx| {
            actions = self.ui.show(
                ctx,
                self.model.as_ref(),
                &mut self.timeline,
                self.camera_controller.state(),
                &mut self.settings,
                self.renderer.supports_wireframe(),
            );
        });

        self.egui_wants_pointer = egui_ctx.wants_pointer_input();

        if actions.pick_model {
            actions.open_model = self.ui.pick_model_file();
        }
        if actions.pick_animation {
            actions.open_animation = self.ui.pick_animation_file();
        }
        self.handle_ui_actions(actions);
        self.apply_timeline_events();

        self.egui_state
            .handle_platform_output(&self.window, full_output.platform_output);

        let paint_jobs = egui_ctx.tessellate(full_output.shapes, full_output.pixels_per_point);

        let screen_descriptor = ScreenDescriptor {
            size_in_pixels: [self.window.inner_size().width, self.window.inner_size().height],
            pixels_per_point: self.window.scale_factor() as f32,
        };

        self.renderer.camera = self.camera_controller.state().clone();

        self.renderer.render(
            RenderOptions {
                show_grid: self.settings.display.show_grid,
                show_axes: self.settings.display.show_axes,
                wireframe_mode: self.settings.display.wireframe_mode,
                far_plane: self.settings.display.far_plane,
            },
            paint_jobs,
            full_output.textures_delta,
            screen_descriptor,
        )
    }

    pub fn load_model(&mut self, path: &Path) -> Result<(), VisError> {
        let model = ModelLoader::load_from_file(path)?;

        let resolver = MeshResolver::new(model.model_dir(), &self.settings.display.mesh_search_paths);
        let missing = self.renderer.set_model(&model, &resolver);
        if missing > 0 {
            warn!("{missing} visual(s) of '{}' could not be displayed", path.display());
        }

        if let Some((center, radius)) = model.scene.bounding_sphere() {
            self.camera_controller.state_mut().focus(center, radius);
        }

        self.window
            .set_title(&format!("RBVis-RS - {}", model.display_name()));
        self.ui.remember_dir(path);
        self.animation_path = None;
        self.timeline.reset();
        self.timeline.take_events();
        self.model = Some(model);
        Ok(())
    }

    pub fn load_animation(&mut self, path: &Path) -> Result<(), VisError> {
        let Some(model) = self.model.as_mut() else {
            return Err(VisError::new("animation-without-model").with_arg("path", path.display()));
        };
        let clip = AnimationClip::load(path)?;
        model.attach_animation(clip)?;

        info!("playing '{}' over {:.3}s", path.display(), model.animation_duration());
        self.animation_path = Some(path.to_path_buf());
        self.ui.remember_dir(path);

        self.timeline.reset();
        self.timeline.set_max_time(model.animation_duration() as f32);
        self.timeline.speed_changed(self.settings.playback.speed_factor);
        self.timeline.set_current_time(0.0);
        if self.settings.playback.autoplay && !self.timeline.is_playing() {
            self.timeline.toggle_playing();
        }
        self.apply_timeline_events();
        Ok(())
    }
}
