//! A simple look-at camera for 3D scenes.

use glam::{Mat4, Vec3};

/// Position, target, and projection parameters.
///
/// The renderer reads [`view_matrix`](Camera::view_matrix) and
/// [`projection_matrix`](Camera::projection_matrix) once per frame; anything
/// driving the camera (controls, animation) mutates the public fields
/// between frames.
#[derive(Clone, Copy, Debug)]
pub struct Camera {
    pub position: Vec3,
    pub target: Vec3,
    pub up: Vec3,
    /// Vertical field of view in radians.
    pub fov_y: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            position: Vec3::new(0.0, 0.0, 5.0),
            target: Vec3::ZERO,
            up: Vec3::Y,
            fov_y: 45f32.to_radians(),
            near: 0.01,
            far: 100.0,
        }
    }
}

impl Camera {
    pub fn new(position: Vec3, target: Vec3) -> Self {
        Self {
            position,
            target,
            ..Default::default()
        }
    }

    pub fn with_fov(mut self, fov_degrees: f32) -> Self {
        self.fov_y = fov_degrees.to_radians();
        self
    }

    /// World-to-camera transform.
    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.target, self.up)
    }

    /// Camera-to-clip transform with [0, 1] depth (wgpu convention).
    pub fn projection_matrix(&self, aspect: f32) -> Mat4 {
        Mat4::perspective_rh(self.fov_y, aspect, self.near, self.far)
    }
}
