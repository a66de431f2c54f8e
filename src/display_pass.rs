//! The display pass: lit, shadowed scene from the camera's point of view.
//!
//! Shades each fragment with Phong ambient/diffuse/specular terms for up to
//! [`MAX_LIGHTS`] lights, modulated by distance attenuation (when the light
//! model carries one), spot-cone falloff, and the shadow visibility computed
//! by the active [`ShadowTechnique`]. The fragment shader is composed at
//! construction time from the display template plus the technique's WGSL
//! fragments; a malformed pairing fails in `new`, before any GPU work.
//!
//! When no shadow map was published this frame (no shadow pass registered,
//! or its target failed to allocate) the pass binds a 1x1 white fallback
//! texture and disables shadowing in the shader: a missing shadow map means
//! fully lit, never a crash and never a black frame.

use crate::error::RenderError;
use crate::framebuffer::DEPTH_FORMAT;
use crate::light::Light;
use crate::program::{ProgramDesc, ShaderProgram, UniformBlockBuilder, UniformKind, UniformValue, VertexAttribute};
use crate::renderer::{FrameContext, RenderPass};
use crate::shadow::{ShaderTemplate, ShadowTechnique};
use glam::Vec3;
use wgpu::util::DeviceExt;

/// Fixed light budget of the display uniform block.
pub const MAX_LIGHTS: usize = 4;

/// Default depth bias subtracted from the fragment's light-space depth
/// before the shadow comparison.
const SHADOW_BIAS: f32 = 0.005;

/// Background color behind the scene.
const CLEAR_COLOR: wgpu::Color = wgpu::Color {
    r: 0.0,
    g: 0.0,
    b: 0.0,
    a: 1.0,
};

const DISPLAY_TEMPLATE: ShaderTemplate =
    ShaderTemplate::new(include_str!("shaders/display.frag.wgsl"));

struct Fallback {
    view: wgpu::TextureView,
    sampler: wgpu::Sampler,
}

pub struct DisplayPass {
    program: ShaderProgram,
    technique_name: &'static str,
    depth: Option<(wgpu::Texture, wgpu::TextureView)>,
    depth_size: (u32, u32),
    fallback: Option<Fallback>,
    warned_light_budget: bool,
}

impl DisplayPass {
    /// Composes the fragment shader from the display template and the given
    /// technique, and sets up the (still uninitialized) program.
    ///
    /// Fails with [`RenderError::ShaderCompile`] when the technique violates
    /// the composition contract.
    pub fn new(technique: &dyn ShadowTechnique) -> Result<Self, RenderError> {
        let fragment_source = DISPLAY_TEMPLATE.compose(technique)?;

        let light_members: [(&str, UniformKind); 10] = [
            ("position", UniformKind::Vec3),
            ("kind", UniformKind::Scalar),
            ("direction", UniformKind::Vec3),
            ("cone_cos", UniformKind::Scalar),
            ("ambient", UniformKind::Vec3),
            ("exponent", UniformKind::Scalar),
            ("diffuse", UniformKind::Vec3),
            ("atten_linear", UniformKind::Scalar),
            ("specular", UniformKind::Vec3),
            ("atten_quadratic", UniformKind::Scalar),
        ];
        let uniforms = UniformBlockBuilder::new()
            .field("mvp", UniformKind::Mat4)
            .field("model", UniformKind::Mat4)
            .field("normal_mat", UniformKind::Mat4)
            .field("light_mvp", UniformKind::Mat4)
            .field("camera_pos", UniformKind::Vec3)
            .field("light_count", UniformKind::Scalar)
            .field("shadow_bias", UniformKind::Scalar)
            .field("shadow_enabled", UniformKind::Scalar)
            .struct_array("lights", MAX_LIGHTS, &light_members)
            .build();

        let program = ShaderProgram::new(ProgramDesc {
            label: "Display Program",
            vertex_source: include_str!("shaders/display.vert.wgsl").to_string(),
            fragment_source,
            attributes: vec![
                VertexAttribute {
                    name: "position",
                    format: wgpu::VertexFormat::Float32x3,
                },
                VertexAttribute {
                    name: "normal",
                    format: wgpu::VertexFormat::Float32x3,
                },
                VertexAttribute {
                    name: "color",
                    format: wgpu::VertexFormat::Float32x3,
                },
            ],
            uniforms,
            // Placeholder; replaced with the real output format at first
            // draw, when the context is known.
            color_format: wgpu::TextureFormat::Rgba8Unorm,
            depth_format: Some(DEPTH_FORMAT),
            texture_binding: true,
        });

        Ok(Self {
            program,
            technique_name: technique.name(),
            depth: None,
            depth_size: (0, 0),
            fallback: None,
            warned_light_budget: false,
        })
    }

    /// Recreates the depth texture when the output size changed.
    fn ensure_depth(&mut self, device: &wgpu::Device, size: (u32, u32)) {
        if self.depth.is_none() || self.depth_size != size {
            let texture = device.create_texture(&wgpu::TextureDescriptor {
                label: Some("Display Depth"),
                size: wgpu::Extent3d {
                    width: size.0,
                    height: size.1,
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: DEPTH_FORMAT,
                usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
                view_formats: &[],
            });
            let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
            self.depth = Some((texture, view));
            self.depth_size = size;
        }
    }

    /// The 1x1 white texture bound when no shadow map exists. White moments
    /// read as "farthest possible occluder", but shadowing is additionally
    /// disabled through the `shadow_enabled` uniform.
    fn ensure_fallback(&mut self, device: &wgpu::Device, queue: &wgpu::Queue) {
        if self.fallback.is_some() {
            return;
        }
        let texture = device.create_texture_with_data(
            queue,
            &wgpu::TextureDescriptor {
                label: Some("Shadow Fallback Texture"),
                size: wgpu::Extent3d {
                    width: 1,
                    height: 1,
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: wgpu::TextureFormat::Rgba8Unorm,
                usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
                view_formats: &[],
            },
            wgpu::util::TextureDataOrder::LayerMajor,
            &[255, 255, 255, 255],
        );
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Shadow Fallback Sampler"),
            mag_filter: wgpu::FilterMode::Nearest,
            min_filter: wgpu::FilterMode::Nearest,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });
        self.fallback = Some(Fallback { view, sampler });
    }

    /// Writes one light's fields into the uniform block under `lights[i]`.
    fn set_light_uniforms(&mut self, index: usize, light: &Light) {
        let model = *light.model();
        let (kind, position, direction, cone_cos, exponent) = match light {
            Light::Directional { direction, .. } => (0.0, Vec3::ZERO, *direction, -1.0, 0.0),
            Light::Point { position, .. } => (1.0, *position, Vec3::NEG_Y, -1.0, 0.0),
            Light::Spot {
                position,
                direction,
                angle,
                exponent,
                ..
            } => (
                2.0,
                *position,
                *direction,
                angle.to_radians().cos(),
                *exponent,
            ),
        };
        let (linear, quadratic) = model
            .attenuation
            .map(|a| (a.linear, a.quadratic))
            .unwrap_or((0.0, 0.0));

        let set = |program: &mut ShaderProgram, member: &str, value: UniformValue| {
            program.set_uniform(&format!("lights[{index}].{member}"), value);
        };
        set(&mut self.program, "position", UniformValue::Vec3(position));
        set(&mut self.program, "kind", UniformValue::Scalar(kind));
        set(&mut self.program, "direction", UniformValue::Vec3(direction));
        set(&mut self.program, "cone_cos", UniformValue::Scalar(cone_cos));
        set(&mut self.program, "ambient", UniformValue::Vec3(model.ambient));
        set(&mut self.program, "exponent", UniformValue::Scalar(exponent));
        set(&mut self.program, "diffuse", UniformValue::Vec3(model.diffuse));
        set(&mut self.program, "atten_linear", UniformValue::Scalar(linear));
        set(&mut self.program, "specular", UniformValue::Vec3(model.specular));
        set(
            &mut self.program,
            "atten_quadratic",
            UniformValue::Scalar(quadratic),
        );
    }
}

impl RenderPass for DisplayPass {
    fn name(&self) -> &str {
        "display"
    }

    fn draw(&mut self, ctx: &mut FrameContext<'_>) -> Result<(), RenderError> {
        let device = &ctx.gpu.device;

        if !self.program.is_initialized() {
            self.program.set_color_format(ctx.gpu.config.format);
            self.program.init(device)?;
            log::debug!(
                "display pass linked with `{}` shadow technique",
                self.technique_name
            );
        }
        self.ensure_depth(device, ctx.target_size);
        self.ensure_fallback(device, &ctx.gpu.queue);

        // Shadow-map binding: the published map, or the fallback (fully lit).
        let (shadow_view, shadow_sampler, light_mvp, shadow_enabled) = match &ctx.shadow_map {
            Some(map) => (map.view.clone(), map.sampler.clone(), map.view_proj, 1.0),
            None => {
                let fallback = self.fallback.as_ref().expect("created above");
                (
                    fallback.view.clone(),
                    fallback.sampler.clone(),
                    glam::Mat4::IDENTITY,
                    0.0,
                )
            }
        };
        let Some(texture_group) = self
            .program
            .bind_texture(device, &shadow_view, &shadow_sampler)
        else {
            return Ok(());
        };

        let lights = ctx.scene.lights();
        let light_count = lights.len().min(MAX_LIGHTS);
        if lights.len() > MAX_LIGHTS && !self.warned_light_budget {
            log::warn!(
                "scene has {} lights, display pass shades the first {MAX_LIGHTS}",
                lights.len()
            );
            self.warned_light_budget = true;
        }

        let view = ctx.camera.view_matrix();
        let aspect = ctx.target_size.0 as f32 / ctx.target_size.1 as f32;
        let proj = ctx.camera.projection_matrix(aspect);
        let view_proj = proj * view;

        // Frame-constant uniforms.
        self.program.set_uniforms(&[
            ("camera_pos", UniformValue::Vec3(ctx.camera.position)),
            ("light_count", UniformValue::Scalar(light_count as f32)),
            ("shadow_bias", UniformValue::Scalar(SHADOW_BIAS)),
            ("shadow_enabled", UniformValue::Scalar(shadow_enabled)),
        ]);
        for (i, light) in lights.iter().take(MAX_LIGHTS).enumerate() {
            self.set_light_uniforms(i, light);
        }

        // Per-mesh uniforms and attribute uploads.
        let mut draws = Vec::with_capacity(ctx.scene.meshes().len());
        for mesh in ctx.scene.meshes() {
            let model = mesh.model_matrix();
            self.program.set_uniforms(&[
                ("mvp", UniformValue::Mat4(view_proj * model)),
                ("model", UniformValue::Mat4(model)),
                ("normal_mat", UniformValue::Mat4(model.inverse().transpose())),
                ("light_mvp", UniformValue::Mat4(light_mvp * model)),
            ]);
            self.program
                .bind_vertex_attribute(device, "position", &mesh.geometry.positions);
            self.program
                .bind_vertex_attribute(device, "normal", &mesh.geometry.normals);
            self.program
                .bind_vertex_attribute(device, "color", &mesh.geometry.colors);
            let Some(prepared) = self.program.prepare_draw(device) else {
                continue;
            };
            let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Display Index Buffer"),
                contents: bytemuck::cast_slice(&mesh.geometry.indices),
                usage: wgpu::BufferUsages::INDEX,
            });
            draws.push((prepared, index_buffer, mesh.geometry.index_count()));
        }

        let pipeline = self
            .program
            .pipeline()
            .expect("initialized above")
            .clone();
        let depth_view = &self.depth.as_ref().expect("created above").1;

        let mut render_pass = ctx.encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Display Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: ctx.target,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(CLEAR_COLOR),
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: depth_view,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(1.0),
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
        });

        render_pass.set_pipeline(&pipeline);
        render_pass.set_bind_group(1, &texture_group, &[]);
        for (prepared, index_buffer, index_count) in &draws {
            render_pass.set_bind_group(0, &prepared.uniforms, &[]);
            for (slot, buffer) in prepared.vertex_buffers.iter().enumerate() {
                render_pass.set_vertex_buffer(slot as u32, buffer.slice(..));
            }
            render_pass.set_index_buffer(index_buffer.slice(..), wgpu::IndexFormat::Uint32);
            render_pass.draw_indexed(0..*index_count, 0, 0..1);
        }

        Ok(())
    }
}
