//! # Umbra
//!
//! **A small real-time 3D renderer built around variance shadow maps.**
//!
//! Umbra draws a scene of meshes and lights from a camera's viewpoint with a
//! two-pass wgpu pipeline: a shadow pass renders packed depth moments from
//! the light's point of view into an off-screen target, and a display pass
//! shades the scene from the camera, sampling that map through a pluggable
//! shadow technique (VSM is the one that ships).
//!
//! ## Quick Start
//!
//! ```no_run
//! use umbra::*;
//!
//! let gpu = GpuContext::headless(800, 600).expect("no GPU adapter");
//!
//! let mut scene = Scene::new();
//! scene.add_mesh(Mesh::new(Geometry::plane(10.0, 10.0)));
//! scene.add_mesh(Mesh::new(Geometry::cube(Vec3::new(0.0, 1.5, 0.0), 1.0, 1.0, 1.0)));
//! scene.add_light(Light::Directional {
//!     direction: Vec3::new(0.0, -1.0, 0.0),
//!     model: LightModel::new(Vec3::splat(0.2), Vec3::splat(0.4), Vec3::splat(0.5)),
//! });
//!
//! let camera = Camera::new(Vec3::new(0.0, 7.0, 9.0), Vec3::ZERO);
//!
//! let mut renderer = Renderer::new();
//! renderer.add_pass(ShadowPass::new());
//! renderer.add_pass(DisplayPass::new(&Vsm).unwrap());
//! // every tick: renderer.render(&gpu, &scene, &camera);
//! ```
//!
//! ## Pipeline Shape
//!
//! Passes run strictly in registration order; the display pass consumes the
//! shadow map the shadow pass produced in the same frame. A failed pass is
//! logged and skipped, never panicking the frame loop, and a missing shadow
//! map falls back to a fully lit scene.

mod camera;
mod display_pass;
mod error;
mod framebuffer;
mod geometry;
mod gpu;
mod light;
mod program;
mod renderer;
mod scene;
pub mod shadow;
mod shadow_pass;

pub use camera::Camera;
pub use display_pass::{DisplayPass, MAX_LIGHTS};
pub use error::{RenderError, ShaderStage};
pub use framebuffer::{COLOR_FORMAT, DEPTH_FORMAT, OffscreenTarget};
pub use geometry::Geometry;
pub use gpu::GpuContext;
pub use light::{Attenuation, Light, LightModel};
pub use program::{
    PreparedDraw, ProgramDesc, ShaderProgram, UniformBlock, UniformBlockBuilder, UniformKind,
    UniformValue, VertexAttribute,
};
pub use renderer::{FrameContext, RenderPass, Renderer, ShadowMap};
pub use scene::{Mesh, Scene, Transform};
pub use shadow::{ShaderTemplate, ShadowTechnique, Vsm};
pub use shadow_pass::{SHADOW_MAP_SIZE, ShadowPass};

// Re-export glam math types for convenience
pub use glam::{Mat4, Quat, Vec2, Vec3, Vec4};

// Re-export wgpu so callers can name raw GPU types without keeping a
// version-matched dependency of their own
pub use wgpu;
