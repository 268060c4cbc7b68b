/// Perspective camera producing Vulkan-ready view and projection matrices
///
/// Right-handed, depth range [0, 1], with the projection's Y axis flipped so
/// that +Y points up in clip space on Vulkan.

use glam::{Mat4, Vec3};

#[derive(Debug, Clone)]
pub struct PerspectiveCamera {
    position: Vec3,
    target: Vec3,
    up: Vec3,
    fov_y: f32,
    aspect: f32,
    near: f32,
    far: f32,
    view: Mat4,
    projection: Mat4,
}

impl PerspectiveCamera {
    /// `fov_y_degrees` is the vertical field of view
    pub fn new(fov_y_degrees: f32, aspect: f32, near: f32, far: f32) -> Self {
        let mut camera = Self {
            position: Vec3::new(0.0, 0.0, 5.0),
            target: Vec3::ZERO,
            up: Vec3::Y,
            fov_y: fov_y_degrees.to_radians(),
            aspect,
            near,
            far,
            view: Mat4::IDENTITY,
            projection: Mat4::IDENTITY,
        };
        camera.update_view();
        camera.update_projection();
        camera
    }

    pub fn set_position(&mut self, position: Vec3) {
        self.position = position;
        self.update_view();
    }

    pub fn look_at(&mut self, target: Vec3) {
        self.target = target;
        self.update_view();
    }

    /// Called on window resize
    pub fn set_aspect(&mut self, aspect: f32) {
        self.aspect = aspect;
        self.update_projection();
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn target(&self) -> Vec3 {
        self.target
    }

    pub fn aspect(&self) -> f32 {
        self.aspect
    }

    pub fn view_matrix(&self) -> Mat4 {
        self.view
    }

    pub fn projection_matrix(&self) -> Mat4 {
        self.projection
    }

    pub fn view_projection_matrix(&self) -> Mat4 {
        self.projection * self.view
    }

    fn update_view(&mut self) {
        self.view = Mat4::look_at_rh(self.position, self.target, self.up);
    }

    fn update_projection(&mut self) {
        let mut projection = Mat4::perspective_rh(self.fov_y, self.aspect, self.near, self.far);
        projection.y_axis.y *= -1.0;
        self.projection = projection;
    }
}

#[cfg(test)]
#[path = "camera_tests.rs"]
mod tests;
