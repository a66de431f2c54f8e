//! Light sources and their shading models.
//!
//! Three variants carry the same [`LightModel`] (Phong ambient / diffuse /
//! specular terms plus optional distance attenuation) and differ only in
//! geometry: a direction, a position, or a position with a cone. Lights are
//! immutable once constructed and are read each frame by both passes.

use glam::{Mat4, Vec3};

/// Distance attenuation coefficients: `1 / (1 + linear*d + quadratic*d^2)`.
#[derive(Debug, Clone, Copy)]
pub struct Attenuation {
    pub linear: f32,
    pub quadratic: f32,
}

/// Phong shading terms shared by every light variant.
#[derive(Debug, Clone, Copy)]
pub struct LightModel {
    pub ambient: Vec3,
    pub diffuse: Vec3,
    pub specular: Vec3,
    /// Distance attenuation; meaningless for directional lights.
    pub attenuation: Option<Attenuation>,
}

impl LightModel {
    pub fn new(ambient: Vec3, diffuse: Vec3, specular: Vec3) -> Self {
        Self {
            ambient,
            diffuse,
            specular,
            attenuation: None,
        }
    }

    pub fn with_attenuation(mut self, linear: f32, quadratic: f32) -> Self {
        self.attenuation = Some(Attenuation { linear, quadratic });
        self
    }
}

/// How far along its (reversed) direction a directional light's virtual eye
/// sits when rendering the shadow map, and the half-extent of its
/// orthographic window. Sized for scenes within a ~10 unit radius.
const DIRECTIONAL_EYE_DISTANCE: f32 = 15.0;
const DIRECTIONAL_EXTENT: f32 = 10.0;

/// A light source.
#[derive(Debug, Clone, Copy)]
pub enum Light {
    /// Parallel rays along `direction`.
    Directional { direction: Vec3, model: LightModel },
    /// Omnidirectional from `position`.
    Point { position: Vec3, model: LightModel },
    /// A cone from `position` along `direction`; `angle` is the half-cone
    /// angle in degrees, `exponent` sharpens the falloff toward the rim.
    Spot {
        position: Vec3,
        direction: Vec3,
        angle: f32,
        exponent: f32,
        model: LightModel,
    },
}

impl Light {
    /// The shading model shared by all variants.
    pub fn model(&self) -> &LightModel {
        match self {
            Light::Directional { model, .. } => model,
            Light::Point { model, .. } => model,
            Light::Spot { model, .. } => model,
        }
    }

    /// View-projection matrix for rendering the shadow map from this light.
    ///
    /// Directional lights get an orthographic window looking down their
    /// direction at the origin; point and spot lights get a perspective
    /// frustum. Depth range is [0, 1] (wgpu convention).
    pub fn view_projection(&self) -> Mat4 {
        match self {
            Light::Directional { direction, .. } => {
                let dir = direction.normalize_or_zero();
                let eye = -dir * DIRECTIONAL_EYE_DISTANCE;
                let view = Mat4::look_at_rh(eye, Vec3::ZERO, up_for(dir));
                let proj = Mat4::orthographic_rh(
                    -DIRECTIONAL_EXTENT,
                    DIRECTIONAL_EXTENT,
                    -DIRECTIONAL_EXTENT,
                    DIRECTIONAL_EXTENT,
                    0.1,
                    2.0 * DIRECTIONAL_EYE_DISTANCE,
                );
                proj * view
            }
            Light::Point { position, .. } => {
                let dir = (Vec3::ZERO - *position).normalize_or_zero();
                let view = Mat4::look_at_rh(*position, Vec3::ZERO, up_for(dir));
                let proj =
                    Mat4::perspective_rh(std::f32::consts::FRAC_PI_2, 1.0, 0.5, 50.0);
                proj * view
            }
            Light::Spot {
                position,
                direction,
                angle,
                ..
            } => {
                let dir = direction.normalize_or_zero();
                let view = Mat4::look_at_rh(*position, *position + dir, up_for(dir));
                let fov = (2.0 * angle.to_radians()).clamp(0.05, std::f32::consts::PI - 0.05);
                let proj = Mat4::perspective_rh(fov, 1.0, 0.5, 50.0);
                proj * view
            }
        }
    }
}

/// An up vector not parallel to `dir`, for look-at construction.
fn up_for(dir: Vec3) -> Vec3 {
    if dir.y.abs() > 0.99 {
        Vec3::Z
    } else {
        Vec3::Y
    }
}
