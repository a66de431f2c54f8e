//! The renderer: an ordered list of passes executed once per frame.
//!
//! Pass order is a correctness requirement, not a performance hint. The
//! display pass samples the shadow map the shadow pass produced *this
//! frame*, so passes run strictly in registration order, one after another,
//! on a single thread. The shadow map travels between them through
//! [`FrameContext::shadow_map`]: the shadow pass publishes cheap handle
//! clones of its own target, later passes read them.
//!
//! A pass that fails is logged and skipped; the rest of the frame still
//! runs, and nothing propagates out of [`Renderer::render`]. A failed frame
//! simply re-executes the full pass sequence on the next tick.

use crate::camera::Camera;
use crate::error::RenderError;
use crate::gpu::GpuContext;
use crate::scene::Scene;
use glam::Mat4;

/// Shadow-map handle published by the shadow pass for the display pass.
///
/// The fields are clones of handles owned by the shadow pass's off-screen
/// target; cloning a wgpu resource handle is reference-counted and cheap.
#[derive(Clone)]
pub struct ShadowMap {
    /// Color texture view holding packed depth moments.
    pub view: wgpu::TextureView,
    /// Nearest-neighbor sampler for the moment texture.
    pub sampler: wgpu::Sampler,
    /// The light view-projection the map was rendered with, used to project
    /// fragments into light space for the lookup.
    pub view_proj: Mat4,
}

/// Everything a pass needs during one frame.
///
/// Borrowing `scene` and `camera` shared for the lifetime of the context is
/// what freezes the per-frame snapshot: collaborators may mutate the scene
/// between frames, never during one.
pub struct FrameContext<'a> {
    pub gpu: &'a GpuContext,
    /// Command encoder all passes record into; submitted once per frame.
    pub encoder: &'a mut wgpu::CommandEncoder,
    /// The frame's output view (surface texture or off-screen target).
    pub target: &'a wgpu::TextureView,
    /// Output dimensions in pixels.
    pub target_size: (u32, u32),
    pub scene: &'a Scene,
    pub camera: &'a Camera,
    /// Set by the shadow pass when its map is available this frame.
    pub shadow_map: Option<ShadowMap>,
}

/// One drawable pass in the pipeline.
///
/// The pass set is closed (shadow, display), but the trait keeps the
/// renderer ignorant of concrete pass types and lets tests register
/// recording stubs.
pub trait RenderPass {
    /// Name used in log messages.
    fn name(&self) -> &str;

    /// Record this pass's work for the current frame.
    ///
    /// Called exactly once per frame, in registration order. An `Err` skips
    /// the pass for this frame only.
    fn draw(&mut self, ctx: &mut FrameContext<'_>) -> Result<(), RenderError>;
}

/// Owns the ordered pass list and drives one frame per `render` call.
#[derive(Default)]
pub struct Renderer {
    passes: Vec<Box<dyn RenderPass>>,
}

impl Renderer {
    pub fn new() -> Self {
        Self { passes: Vec::new() }
    }

    /// Registers a pass at the end of the draw order.
    pub fn add_pass<P: RenderPass + 'static>(&mut self, pass: P) {
        self.passes.push(Box::new(pass));
    }

    /// Renders one frame to the window surface.
    ///
    /// Invoked once per animation tick by the external frame driver. Never
    /// panics on pass failure; a pass error is logged and the frame
    /// continues with the remaining passes.
    pub fn render(&mut self, gpu: &GpuContext, scene: &Scene, camera: &Camera) {
        let Some(surface) = &gpu.surface else {
            log::error!("render() called on a headless context; use render_to_target()");
            return;
        };
        let output = match surface.get_current_texture() {
            Ok(output) => output,
            Err(err) => {
                log::warn!("surface texture unavailable, dropping frame: {err}");
                return;
            }
        };
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        self.execute(gpu, scene, camera, &view, (gpu.width(), gpu.height()));
        output.present();
    }

    /// Renders one frame into an arbitrary texture view instead of the
    /// surface. Used headless (tests, capture); behavior is otherwise
    /// identical to [`render`](Self::render).
    pub fn render_to_target(
        &mut self,
        gpu: &GpuContext,
        scene: &Scene,
        camera: &Camera,
        target: &wgpu::TextureView,
        target_size: (u32, u32),
    ) {
        self.execute(gpu, scene, camera, target, target_size);
    }

    fn execute(
        &mut self,
        gpu: &GpuContext,
        scene: &Scene,
        camera: &Camera,
        target: &wgpu::TextureView,
        target_size: (u32, u32),
    ) {
        let mut encoder = gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Frame Encoder"),
            });

        {
            let mut ctx = FrameContext {
                gpu,
                encoder: &mut encoder,
                target,
                target_size,
                scene,
                camera,
                shadow_map: None,
            };

            for pass in &mut self.passes {
                if let Err(err) = pass.draw(&mut ctx) {
                    log::error!("pass `{}` failed, skipping this frame: {err}", pass.name());
                }
            }
        }

        gpu.queue.submit(std::iter::once(encoder.finish()));
    }
}
