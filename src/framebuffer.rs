//! Off-screen render targets with all-or-nothing creation.
//!
//! An [`OffscreenTarget`] bundles a color texture, a depth texture and a
//! nearest-neighbor sampler into one render destination, sized independently
//! of the canvas. The shadow pass renders into one of these and the display
//! pass samples its color texture.
//!
//! Creation is atomic: every sub-resource is allocated inside a wgpu error
//! scope, and the first failure destroys whatever was created before it and
//! reports [`RenderError::ResourceAllocation`]. No partial resource escapes.

use crate::error::RenderError;

/// Color format of off-screen targets. The shadow pass packs two depth
/// moments into the four 8-bit channels, so the format is not negotiable.
pub const COLOR_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

/// Depth format of off-screen targets.
pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

/// An off-screen color+depth render target.
///
/// Sampling uses nearest-neighbor filtering: shadow-map texels carry packed
/// moment data that must not be interpolated across texel boundaries.
pub struct OffscreenTarget {
    pub color: wgpu::Texture,
    pub color_view: wgpu::TextureView,
    pub depth: wgpu::Texture,
    pub depth_view: wgpu::TextureView,
    pub sampler: wgpu::Sampler,
    width: u32,
    height: u32,
}

impl OffscreenTarget {
    /// Creates a target with the standard formats.
    pub fn create(device: &wgpu::Device, width: u32, height: u32) -> Result<Self, RenderError> {
        Self::create_with_formats(device, width, height, COLOR_FORMAT, DEPTH_FORMAT)
    }

    /// Creates a target with explicit formats.
    ///
    /// Parameterizing the formats lets tests drive the rollback path with a
    /// depth format that cannot be a render attachment.
    pub fn create_with_formats(
        device: &wgpu::Device,
        width: u32,
        height: u32,
        color_format: wgpu::TextureFormat,
        depth_format: wgpu::TextureFormat,
    ) -> Result<Self, RenderError> {
        // Completeness check up front: zero-sized or over-limit dimensions
        // would produce an unusable attachment pair.
        let max = device.limits().max_texture_dimension_2d;
        if width == 0 || height == 0 || width > max || height > max {
            return Err(RenderError::ResourceAllocation(format!(
                "target dimensions {width}x{height} outside device limits (max {max})"
            )));
        }

        let color = try_create_texture(
            device,
            "Offscreen Color",
            width,
            height,
            color_format,
            wgpu::TextureUsages::RENDER_ATTACHMENT
                | wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_SRC,
        )?;

        let depth = match try_create_texture(
            device,
            "Offscreen Depth",
            width,
            height,
            depth_format,
            wgpu::TextureUsages::RENDER_ATTACHMENT,
        ) {
            Ok(depth) => depth,
            Err(err) => {
                // Rollback: the color texture must not outlive the failed
                // composition.
                color.destroy();
                return Err(err);
            }
        };

        let color_view = color.create_view(&wgpu::TextureViewDescriptor::default());
        let depth_view = depth.create_view(&wgpu::TextureViewDescriptor::default());

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Offscreen Sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Nearest,
            min_filter: wgpu::FilterMode::Nearest,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        Ok(Self {
            color,
            color_view,
            depth,
            depth_view,
            sampler,
            width,
            height,
        })
    }

    /// Target width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Target height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }
}

/// Creates one texture inside a validation error scope, converting a device
/// validation failure into a recoverable allocation error.
fn try_create_texture(
    device: &wgpu::Device,
    label: &str,
    width: u32,
    height: u32,
    format: wgpu::TextureFormat,
    usage: wgpu::TextureUsages,
) -> Result<wgpu::Texture, RenderError> {
    device.push_error_scope(wgpu::ErrorFilter::Validation);
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size: wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format,
        usage,
        view_formats: &[],
    });
    if let Some(err) = pollster::block_on(device.pop_error_scope()) {
        texture.destroy();
        return Err(RenderError::ResourceAllocation(format!(
            "{label}: {err}"
        )));
    }
    Ok(texture)
}
