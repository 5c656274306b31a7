use nalgebra_glm as glm;

use super::CameraState;

const MIN_DISTANCE: f32 = 0.05;
const MAX_DISTANCE: f32 = 500.0;

/// Handles camera input and transformations
pub struct CameraController {
    state: CameraState,
    left_mouse_pressed: bool,
    middle_mouse_pressed: bool,
    right_mouse_pressed: bool,
    alt_pressed: bool,
    shift_pressed: bool,
    control_pressed: bool,
    last_mouse_pos: Option<(f64, f64)>,
}

impl CameraController {
    pub fn new(state: CameraState) -> Self {
        Self {
            state,
            left_mouse_pressed: false,
            middle_mouse_pressed: false,
            right_mouse_pressed: false,
            alt_pressed: false,
            shift_pressed: false,
            control_pressed: false,
            last_mouse_pos: None,
        }
    }

    pub fn state(&self) -> &CameraState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut CameraState {
        &mut self.state
    }

    pub fn is_shift_pressed(&self) -> bool {
        self.shift_pressed
    }

    pub fn is_control_pressed(&self) -> bool {
        self.control_pressed
    }

    pub fn on_mouse_button(&mut self, button: winit::event::MouseButton, pressed: bool) {
        let slot = match button {
            winit::event::MouseButton::Left => &mut self.left_mouse_pressed,
            winit::event::MouseButton::Middle => &mut self.middle_mouse_pressed,
            winit::event::MouseButton::Right => &mut self.right_mouse_pressed,
            _ => return,
        };
        *slot = pressed;
        if !pressed {
            self.last_mouse_pos = None;
        }
    }

    pub fn on_modifiers(&mut self, shift: bool, alt: bool, control: bool) {
        self.shift_pressed = shift;
        self.alt_pressed = alt;
        self.control_pressed = control;
    }

    /// Left drag orbits, middle or shift+left drag pans. Returns whether the camera moved.
    pub fn on_mouse_move(&mut self, position: (f64, f64)) -> bool {
        let should_pan =
            self.middle_mouse_pressed || (self.shift_pressed && self.left_mouse_pressed);
        let should_rotate = !should_pan && (self.left_mouse_pressed || self.right_mouse_pressed);

        if !should_pan && !should_rotate {
            self.last_mouse_pos = None;
            return false;
        }

        let handled = if let Some(last_pos) = self.last_mouse_pos {
            let delta_x = (position.0 - last_pos.0) as f32;
            let delta_y = (position.1 - last_pos.1) as f32;
            if should_pan {
                self.pan(delta_x, delta_y);
            } else {
                self.rotate(delta_x, delta_y);
            }
            true
        } else {
            false
        };
        self.last_mouse_pos = Some(position);
        handled
    }

    fn rotate(&mut self, delta_x: f32, delta_y: f32) {
        self.state.yaw -= delta_x * 0.01;
        self.state.pitch += delta_y * 0.01;
        self.state.pitch = self.state.pitch.clamp(-1.5, 1.5);
    }

    /// Moves the target in the view plane.
    fn pan(&mut self, delta_x: f32, delta_y: f32) {
        let eye = self.state.eye();
        let target = glm::Vec3::from(self.state.target);
        let forward = glm::normalize(&(target - eye));
        let right = glm::normalize(&glm::cross(&forward, &glm::vec3(0.0, 1.0, 0.0)));
        let up = glm::cross(&right, &forward);

        let pan_speed = self.state.distance * 0.0015;
        let moved = target - right * delta_x * pan_speed + up * delta_y * pan_speed;
        self.state.target = moved.into();
    }

    /// Two-finger trackpad gesture: plain orbits, shift pans, control zooms.
    pub fn on_pan_gesture(&mut self, delta_x: f32, delta_y: f32, control: bool, shift: bool) {
        if control {
            self.simple_zoom(-delta_y * 0.5);
        } else if shift {
            self.pan(delta_x, delta_y);
        } else {
            self.rotate(delta_x, delta_y);
        }
    }

    pub fn simple_zoom(&mut self, delta: f32) {
        let zoom_factor = (1.0 - delta * 0.1).max(0.1);
        self.state.distance = (self.state.distance * zoom_factor).clamp(MIN_DISTANCE, MAX_DISTANCE);
    }

    pub fn reset(&mut self) {
        self.state.reset();
        self.last_mouse_pos = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use winit::event::MouseButton;

    #[test]
    fn drag_rotates_and_pitch_is_clamped() {
        let mut c = CameraController::new(CameraState::new(0.0, 0.0, 4.0, [0.0; 3]));
        assert!(!c.on_mouse_move((0.0, 0.0)));
        c.on_mouse_button(MouseButton::Left, true);
        assert!(!c.on_mouse_move((0.0, 0.0)));
        assert!(c.on_mouse_move((10.0, 1000.0)));
        assert!((c.state().yaw + 0.1).abs() < 1e-6);
        assert_eq!(c.state().pitch, 1.5);
    }

    #[test]
    fn shift_drag_pans_target() {
        let mut c = CameraController::new(CameraState::new(0.0, 0.0, 4.0, [0.0; 3]));
        c.on_modifiers(true, false, false);
        c.on_mouse_button(MouseButton::Left, true);
        c.on_mouse_move((0.0, 0.0));
        c.on_mouse_move((0.0, 100.0));
        assert!(c.state().target[1] > 0.0);
        assert_eq!(c.state().yaw, 0.0);
    }

    #[test]
    fn zoom_is_clamped_and_reset_restores() {
        let mut c = CameraController::new(CameraState::new(0.0, 0.0, 4.0, [0.0; 3]));
        for _ in 0..200 {
            c.simple_zoom(5.0);
        }
        assert_eq!(c.state().distance, MIN_DISTANCE);
        c.reset();
        assert_eq!(c.state().distance, 4.0);
    }
}
