use glam::{Vec2, Vec3};

/// State of the renderer-side perspective camera.
///
/// Every setter bumps a revision counter, which is how callers (and tests)
/// observe whether a camera update actually reached the renderer.
#[derive(Debug, Clone, PartialEq)]
pub struct PerspectiveCamera {
    eye: Vec3,
    target: Vec3,
    up: Vec3,
    focal_length: f32,
    focus_distance: f32,
    aperture: f32,
    sensor_size: Vec2,
    depth_range: Vec2,
    revision: u64,
}

impl PerspectiveCamera {
    /// Creates a camera oriented from `eye` towards `target`.
    pub fn new(eye: Vec3, target: Vec3, up: Vec3) -> Self {
        Self {
            eye,
            target,
            up,
            focal_length: 0.0,
            focus_distance: 0.0,
            aperture: 0.0,
            sensor_size: Vec2::ZERO,
            depth_range: Vec2::ZERO,
            revision: 0,
        }
    }

    pub fn eye(&self) -> Vec3 {
        self.eye
    }

    pub fn target(&self) -> Vec3 {
        self.target
    }

    pub fn up(&self) -> Vec3 {
        self.up
    }

    pub fn look_at(&mut self, eye: Vec3, target: Vec3, up: Vec3) {
        self.eye = eye;
        self.target = target;
        self.up = up;
        self.revision += 1;
    }

    pub fn aperture(&self) -> f32 {
        self.aperture
    }

    pub fn set_aperture(&mut self, aperture: f32) {
        self.aperture = aperture;
        self.revision += 1;
    }

    pub fn focal_length(&self) -> f32 {
        self.focal_length
    }

    pub fn set_focal_length(&mut self, focal_length: f32) {
        self.focal_length = focal_length;
        self.revision += 1;
    }

    pub fn focus_distance(&self) -> f32 {
        self.focus_distance
    }

    pub fn set_focus_distance(&mut self, focus_distance: f32) {
        self.focus_distance = focus_distance;
        self.revision += 1;
    }

    pub fn sensor_size(&self) -> Vec2 {
        self.sensor_size
    }

    pub fn set_sensor_size(&mut self, sensor_size: Vec2) {
        self.sensor_size = sensor_size;
        self.revision += 1;
    }

    pub fn depth_range(&self) -> Vec2 {
        self.depth_range
    }

    pub fn set_depth_range(&mut self, depth_range: Vec2) {
        self.depth_range = depth_range;
        self.revision += 1;
    }

    /// Number of state changes applied since construction.
    pub fn revision(&self) -> u64 {
        self.revision
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn setters_bump_revision() {
        let mut camera = PerspectiveCamera::new(Vec3::ZERO, Vec3::Z, Vec3::Y);
        assert_eq!(camera.revision(), 0);
        camera.set_aperture(0.5);
        camera.set_focal_length(0.035);
        assert_eq!(camera.revision(), 2);
        camera.look_at(Vec3::ONE, Vec3::ZERO, Vec3::Y);
        assert_eq!(camera.revision(), 3);
        assert_eq!(camera.eye(), Vec3::ONE);
    }

    #[test]
    fn getters_reflect_applied_state() {
        let mut camera = PerspectiveCamera::new(Vec3::ZERO, Vec3::Z, Vec3::Y);
        camera.set_sensor_size(Vec2::splat(0.036));
        camera.set_depth_range(Vec2::new(0.0, 100_000.0));
        camera.set_focus_distance(1.0);
        assert_eq!(camera.sensor_size(), Vec2::splat(0.036));
        assert_eq!(camera.depth_range(), Vec2::new(0.0, 100_000.0));
        assert_eq!(camera.focus_distance(), 1.0);
    }
}
