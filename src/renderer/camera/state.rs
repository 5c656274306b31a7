use nalgebra_glm as glm;

/// Orbit camera around `target`, Y up. `yaw` turns around Y, `pitch`
/// lifts the eye above the XZ plane.
#[derive(Debug, Clone)]
pub struct CameraState {
    pub yaw: f32,
    pub pitch: f32,
    pub distance: f32,
    pub target: [f32; 3],
    pub default_yaw: f32,
    pub default_pitch: f32,
    pub default_distance: f32,
    pub default_target: [f32; 3],
}

impl CameraState {
    pub fn new(yaw: f32, pitch: f32, distance: f32, target: [f32; 3]) -> Self {
        Self {
            yaw,
            pitch,
            distance,
            target,
            default_yaw: yaw,
            default_pitch: pitch,
            default_distance: distance,
            default_target: target,
        }
    }

    pub fn reset(&mut self) {
        self.yaw = self.default_yaw;
        self.pitch = self.default_pitch;
        self.distance = self.default_distance;
        self.target = self.default_target;
    }

    /// Re-centres on a bounding sphere and makes that the reset position.
    pub fn focus(&mut self, center: [f32; 3], radius: f32) {
        self.default_target = center;
        self.default_distance = (radius * 3.0).max(0.5);
        self.target = self.default_target;
        self.distance = self.default_distance;
    }

    pub fn eye(&self) -> glm::Vec3 {
        let target = glm::Vec3::from(self.target);
        target
            + self.distance
                * glm::vec3(
                    self.pitch.cos() * self.yaw.sin(),
                    self.pitch.sin(),
                    self.pitch.cos() * self.yaw.cos(),
                )
    }

    pub fn view_proj(&self, aspect: f32, far_plane: f32) -> glm::Mat4 {
        let proj = glm::perspective(aspect, 45.0_f32.to_radians(), 0.01, far_plane);
        let view = glm::look_at(&self.eye(), &glm::Vec3::from(self.target), &glm::vec3(0.0, 1.0, 0.0));
        proj * view
    }
}

impl Default for CameraState {
    fn default() -> Self {
        Self::new(std::f32::consts::FRAC_PI_4, 0.35, 4.0, [0.0, 0.5, 0.0])
    }
}
