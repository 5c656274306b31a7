use std::path::PathBuf;
use std::sync::Arc;

use log::error;
use tokio::runtime::Runtime;
use winit::application::ApplicationHandler;
use winit::event::WindowEvent;
use winit::event_loop::ActiveEventLoop;
use winit::window::{Window, WindowId};

use crate::app::app::App;

pub struct AppHandler {
    pub app: Option<App>,
    pub model_path: Option<PathBuf>,
    pub animation_path: Option<PathBuf>,
    pub runtime: Runtime,
}

impl AppHandler {
    pub fn new(model_path: Option<PathBuf>, animation_path: Option<PathBuf>, runtime: Runtime) -> Self {
        Self {
            app: None,
            model_path,
            animation_path,
            runtime,
        }
    }
}

impl ApplicationHandler for AppHandler {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.app.is_some() {
            return;
        }

        let window_attrs = Window::default_attributes()
            .with_title("RBVis-RS - Rigid Body Model Viewer")
            .with_inner_size(winit::dpi::LogicalSize::new(1200.0, 800.0));

        let window = match event_loop.create_window(window_attrs) {
            Ok(window) => Arc::new(window),
            Err(e) => {
                error!("failed to create window: {e}");
                event_loop.exit();
                return;
            }
        };

        let mut app = match self.runtime.block_on(App::new(window)) {
            Ok(app) => app,
            Err(e) => {
                error!("failed to initialise renderer: {e}");
                event_loop.exit();
                return;
            }
        };

        if let Some(path) = &self.model_path {
            if let Err(e) = app.load_model(path) {
                error!("failed to load model '{}': {e}", path.display());
            } else if let Some(anim) = &self.animation_path {
                if let Err(e) = app.load_animation(anim) {
                    error!("failed to load animation '{}': {e}", anim.display());
                }
            }
        }

        self.app = Some(app);
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        if let Some(app) = &mut self.app {
            let response = app.handle_event(&event);
            if response.repaint {
                app.window.request_redraw();
            }
            if response.exit {
                event_loop.exit();
            }
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(app) = &mut self.app {
            if let Err(e) = app.render() {
                error!("render error: {e:?}");
            }
            app.window.request_redraw();
        }
    }
}
