//! Scene container: meshes, lights, and per-mesh transforms.
//!
//! The scene is plain data. External code mutates it freely *between*
//! frames (spinning a mesh, moving a light); during one
//! [`Renderer::render`](crate::Renderer::render) call every pass reads it
//! through a shared borrow, which makes the per-frame snapshot immutable by
//! construction.

use crate::geometry::Geometry;
use glam::{Mat4, Quat, Vec3};

/// Position, rotation, and scale for placing a mesh in the world.
#[derive(Clone, Copy, Debug)]
pub struct Transform {
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
        }
    }
}

impl Transform {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            ..Default::default()
        }
    }

    /// Applies an additional rotation of `angle` radians around `axis`.
    pub fn rotate(&mut self, angle: f32, axis: Vec3) {
        self.rotation = Quat::from_axis_angle(axis.normalize_or_zero(), angle) * self.rotation;
    }

    /// The model matrix, scale then rotation then translation.
    pub fn matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.position)
    }
}

/// A mesh: geometry plus its world transform.
#[derive(Debug, Clone)]
pub struct Mesh {
    pub geometry: Geometry,
    pub transform: Transform,
}

impl Mesh {
    pub fn new(geometry: Geometry) -> Self {
        Self {
            geometry,
            transform: Transform::default(),
        }
    }

    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }

    /// The mesh's current model matrix.
    pub fn model_matrix(&self) -> Mat4 {
        self.transform.matrix()
    }
}

/// The set of meshes and lights rendered each frame.
#[derive(Debug, Default)]
pub struct Scene {
    meshes: Vec<Mesh>,
    lights: Vec<crate::light::Light>,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_mesh(&mut self, mesh: Mesh) {
        self.meshes.push(mesh);
    }

    pub fn add_light(&mut self, light: crate::light::Light) {
        self.lights.push(light);
    }

    pub fn meshes(&self) -> &[Mesh] {
        &self.meshes
    }

    /// Mutable access for between-frame animation.
    pub fn meshes_mut(&mut self) -> &mut [Mesh] {
        &mut self.meshes
    }

    pub fn lights(&self) -> &[crate::light::Light] {
        &self.lights
    }
}
