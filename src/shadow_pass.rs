//! The shadow pass: scene depth moments from the light's point of view.
//!
//! Renders every mesh with the first scene light's view-projection into an
//! [`OffscreenTarget`] the pass owns, writing packed depth moments
//! (`d`, `d²`) into the color channels. The target's color view, sampler and
//! the light matrix are published into the frame context as a
//! [`ShadowMap`](crate::ShadowMap) for the display pass to sample.
//!
//! The pass writes only to its own off-screen target and never reads the
//! canvas; its resolution is independent of the canvas size.

use crate::error::RenderError;
use crate::framebuffer::{COLOR_FORMAT, DEPTH_FORMAT, OffscreenTarget};
use crate::program::{ProgramDesc, ShaderProgram, UniformBlockBuilder, UniformKind, UniformValue, VertexAttribute};
use crate::renderer::{FrameContext, RenderPass, ShadowMap};
use wgpu::util::DeviceExt;

/// Default shadow-map resolution.
pub const SHADOW_MAP_SIZE: u32 = 1024;

pub struct ShadowPass {
    program: ShaderProgram,
    target: Option<OffscreenTarget>,
    resolution: u32,
}

impl Default for ShadowPass {
    fn default() -> Self {
        Self::new()
    }
}

impl ShadowPass {
    pub fn new() -> Self {
        let uniforms = UniformBlockBuilder::new()
            .field("mvp", UniformKind::Mat4)
            .build();
        let program = ShaderProgram::new(ProgramDesc {
            label: "Shadow Program",
            vertex_source: include_str!("shaders/shadow.vert.wgsl").to_string(),
            fragment_source: include_str!("shaders/shadow.frag.wgsl").to_string(),
            attributes: vec![VertexAttribute {
                name: "position",
                format: wgpu::VertexFormat::Float32x3,
            }],
            uniforms,
            color_format: COLOR_FORMAT,
            depth_format: Some(DEPTH_FORMAT),
            texture_binding: false,
        });

        Self {
            program,
            target: None,
            resolution: SHADOW_MAP_SIZE,
        }
    }

    /// Requests a different shadow-map resolution; the target is recreated
    /// on the next frame.
    pub fn set_resolution(&mut self, resolution: u32) {
        if resolution != self.resolution {
            self.resolution = resolution;
            self.target = None;
        }
    }

    /// The pass's off-screen target, once a frame has been drawn. Exposed
    /// so callers can inspect or copy the raw shadow map.
    pub fn target(&self) -> Option<&OffscreenTarget> {
        self.target.as_ref()
    }
}

impl RenderPass for ShadowPass {
    fn name(&self) -> &str {
        "shadow"
    }

    fn draw(&mut self, ctx: &mut FrameContext<'_>) -> Result<(), RenderError> {
        let device = &ctx.gpu.device;

        if !self.program.is_initialized() {
            self.program.init(device)?;
        }

        // (Re)create the target when missing or the resolution changed.
        let needs_target = match &self.target {
            Some(target) => target.width() != self.resolution,
            None => true,
        };
        if needs_target {
            self.target = None;
            self.target = Some(OffscreenTarget::create(
                device,
                self.resolution,
                self.resolution,
            )?);
        }
        let target = self.target.as_ref().unwrap();

        // No light, no shadow map; the display pass falls back to fully lit.
        let Some(light) = ctx.scene.lights().first() else {
            return Ok(());
        };
        let light_vp = light.view_projection();

        // Prepare per-mesh resources before opening the render pass.
        let mut draws = Vec::with_capacity(ctx.scene.meshes().len());
        for mesh in ctx.scene.meshes() {
            let mvp = light_vp * mesh.model_matrix();
            self.program.set_uniforms(&[("mvp", UniformValue::Mat4(mvp))]);
            self.program
                .bind_vertex_attribute(device, "position", &mesh.geometry.positions);
            let Some(prepared) = self.program.prepare_draw(device) else {
                continue;
            };
            let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Shadow Index Buffer"),
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

        {
            let mut render_pass = ctx.encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Shadow Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &target.color_view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        // Background texels read as depth 1.0 (farthest):
                        // pack_half(1.0) = (1, 0) per moment.
                        load: wgpu::LoadOp::Clear(wgpu::Color {
                            r: 1.0,
                            g: 0.0,
                            b: 1.0,
                            a: 0.0,
                        }),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &target.depth_view,
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
            for (prepared, index_buffer, index_count) in &draws {
                render_pass.set_bind_group(0, &prepared.uniforms, &[]);
                for (slot, buffer) in prepared.vertex_buffers.iter().enumerate() {
                    render_pass.set_vertex_buffer(slot as u32, buffer.slice(..));
                }
                render_pass.set_index_buffer(index_buffer.slice(..), wgpu::IndexFormat::Uint32);
                render_pass.draw_indexed(0..*index_count, 0, 0..1);
            }
        }

        ctx.shadow_map = Some(ShadowMap {
            view: target.color_view.clone(),
            sampler: target.sampler.clone(),
            view_proj: light_vp,
        });
        Ok(())
    }
}
