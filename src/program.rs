//! Shader program abstraction: compile/link lifecycle and the name-based
//! attribute/uniform binding protocol.
//!
//! A [`ShaderProgram`] owns a pair of WGSL source strings and, once
//! [`init`](ShaderProgram::init) succeeds, the linked render pipeline built
//! from them. Passes talk to their program exclusively by *name*:
//!
//! - vertex attributes are declared up front as `(name, format)` pairs, and
//!   [`bind_vertex_attribute`](ShaderProgram::bind_vertex_attribute) uploads
//!   data for one of them per call;
//! - uniforms live in a single uniform block whose byte layout follows WGSL
//!   rules, and [`set_uniforms`](ShaderProgram::set_uniforms) writes typed
//!   values into it by field name.
//!
//! Unknown names are never fatal. They are logged and skipped, so a pass can
//! hand the same uniform map to programs that consume different subsets of
//! it. Compile and link failures are fatal to the owning pass for the frame
//! but leave any previously linked pipeline in place.
//!
//! # Lifecycle
//!
//! ```text
//! new (uninitialized) ──init ok──▶ linked ──init ok──▶ relinked (old released)
//!        │                          │
//!        └──init err──▶ still       └──init err──▶ previous pipeline kept
//!                       uninitialized
//! ```

use crate::error::{RenderError, ShaderStage};
use glam::{Mat4, Vec3};
use wgpu::util::DeviceExt;

/// A typed uniform value.
///
/// The binding protocol dispatches on this tag, never on raw data shape, to
/// choose the byte encoding uploaded to the GPU.
#[derive(Debug, Clone, Copy)]
pub enum UniformValue {
    /// A single float.
    Scalar(f32),
    /// Three floats, stored in a 16-byte aligned slot.
    Vec3(Vec3),
    /// A 4x4 matrix, stored column-major as 16 floats.
    Mat4(Mat4),
}

impl UniformValue {
    fn kind(&self) -> UniformKind {
        match self {
            UniformValue::Scalar(_) => UniformKind::Scalar,
            UniformValue::Vec3(_) => UniformKind::Vec3,
            UniformValue::Mat4(_) => UniformKind::Mat4,
        }
    }
}

/// The declared type of a uniform block field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniformKind {
    Scalar,
    Vec3,
    Mat4,
}

impl UniformKind {
    /// Alignment of this kind in the uniform address space (WGSL rules).
    fn align(self) -> usize {
        match self {
            UniformKind::Scalar => 4,
            UniformKind::Vec3 => 16,
            UniformKind::Mat4 => 16,
        }
    }

    /// Byte size of this kind. Note that `vec3<f32>` occupies 12 bytes; a
    /// following scalar packs into its trailing pad, exactly as WGSL lays
    /// out the struct on the shader side.
    fn size(self) -> usize {
        match self {
            UniformKind::Scalar => 4,
            UniformKind::Vec3 => 12,
            UniformKind::Mat4 => 64,
        }
    }

    fn name(self) -> &'static str {
        match self {
            UniformKind::Scalar => "scalar",
            UniformKind::Vec3 => "vec3",
            UniformKind::Mat4 => "mat4",
        }
    }
}

fn align_up(offset: usize, align: usize) -> usize {
    (offset + align - 1) / align * align
}

#[derive(Debug, Clone)]
struct UniformField {
    name: String,
    kind: UniformKind,
    offset: usize,
}

/// Builder computing the byte layout of a uniform block.
///
/// Fields are appended in declaration order and placed at offsets following
/// WGSL uniform address space rules, so the resulting block matches a WGSL
/// `struct` declared with the same fields in the same order. The layout is
/// verified against hand-computed offsets in this module's tests.
#[derive(Debug, Default)]
pub struct UniformBlockBuilder {
    fields: Vec<UniformField>,
    cursor: usize,
}

impl UniformBlockBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a plain field.
    pub fn field(mut self, name: &str, kind: UniformKind) -> Self {
        let offset = align_up(self.cursor, kind.align());
        self.fields.push(UniformField {
            name: name.to_string(),
            kind,
            offset,
        });
        self.cursor = offset + kind.size();
        self
    }

    /// Appends an array of structs, addressable as `name[i].member`.
    ///
    /// Element stride is rounded up to 16 bytes and the array base is
    /// 16-aligned, matching the constraints WGSL places on struct members
    /// and array strides in the uniform address space.
    pub fn struct_array(mut self, name: &str, count: usize, members: &[(&str, UniformKind)]) -> Self {
        let base = align_up(self.cursor, 16);

        let mut element = Vec::with_capacity(members.len());
        let mut cursor = 0usize;
        for (member, kind) in members {
            let offset = align_up(cursor, kind.align());
            element.push((*member, *kind, offset));
            cursor = offset + kind.size();
        }
        let stride = align_up(cursor, 16);

        for i in 0..count {
            for (member, kind, offset) in &element {
                self.fields.push(UniformField {
                    name: format!("{name}[{i}].{member}"),
                    kind: *kind,
                    offset: base + i * stride + offset,
                });
            }
        }
        self.cursor = base + count * stride;
        self
    }

    /// Finalizes the layout.
    pub fn build(self) -> UniformBlock {
        // wgpu rejects zero-sized uniform bindings; an empty block still
        // uploads 16 bytes of padding.
        let size = align_up(self.cursor, 16).max(16);
        UniformBlock {
            fields: self.fields,
            staging: vec![0u8; size],
        }
    }
}

/// A uniform block: named, typed fields over a CPU staging buffer whose byte
/// layout mirrors the WGSL-side struct.
#[derive(Debug, Clone)]
pub struct UniformBlock {
    fields: Vec<UniformField>,
    staging: Vec<u8>,
}

impl UniformBlock {
    /// Total byte size of the block (and of the GPU buffer bound for it).
    pub fn size(&self) -> usize {
        self.staging.len()
    }

    /// Byte offset of a field, if declared. Exposed for layout tests.
    pub fn offset_of(&self, name: &str) -> Option<usize> {
        self.fields.iter().find(|f| f.name == name).map(|f| f.offset)
    }

    /// Writes one value into the staging buffer.
    ///
    /// Returns `false` (after logging) for an unknown name or a value whose
    /// tag does not match the declared field kind. Neither case touches any
    /// other field.
    pub fn set(&mut self, name: &str, value: UniformValue) -> bool {
        let Some(field) = self.fields.iter().find(|f| f.name == name) else {
            log::warn!("uniform block has no field named `{name}`; skipping");
            return false;
        };
        if field.kind != value.kind() {
            log::warn!(
                "uniform `{name}` is declared {} but was given a {} value; skipping",
                field.kind.name(),
                value.kind().name()
            );
            return false;
        }
        let offset = field.offset;
        match value {
            UniformValue::Scalar(v) => {
                self.staging[offset..offset + 4].copy_from_slice(bytemuck::bytes_of(&v));
            }
            UniformValue::Vec3(v) => {
                let arr = v.to_array();
                self.staging[offset..offset + 12].copy_from_slice(bytemuck::cast_slice(&arr));
            }
            UniformValue::Mat4(m) => {
                let arr = m.to_cols_array();
                self.staging[offset..offset + 64].copy_from_slice(bytemuck::cast_slice(&arr));
            }
        }
        true
    }

    /// The current staging bytes, ready for upload.
    pub fn bytes(&self) -> &[u8] {
        &self.staging
    }
}

/// A vertex attribute declared by a program: bound by name, fed from its own
/// vertex buffer slot.
#[derive(Debug, Clone, Copy)]
pub struct VertexAttribute {
    pub name: &'static str,
    pub format: wgpu::VertexFormat,
}

/// Everything needed to construct a [`ShaderProgram`] (still uninitialized).
pub struct ProgramDesc {
    pub label: &'static str,
    pub vertex_source: String,
    pub fragment_source: String,
    pub attributes: Vec<VertexAttribute>,
    pub uniforms: UniformBlock,
    /// Target color format. May be set later via
    /// [`ShaderProgram::set_color_format`], before `init`.
    pub color_format: wgpu::TextureFormat,
    pub depth_format: Option<wgpu::TextureFormat>,
    /// Whether the fragment stage samples a texture at group 1
    /// (binding 0 texture, binding 1 sampler).
    pub texture_binding: bool,
}

struct LinkedProgram {
    pipeline: wgpu::RenderPipeline,
    uniform_layout: wgpu::BindGroupLayout,
    texture_layout: Option<wgpu::BindGroupLayout>,
}

/// GPU resources prepared for a single draw: the uniform snapshot and the
/// vertex buffers bound since the last snapshot.
pub struct PreparedDraw {
    pub uniforms: wgpu::BindGroup,
    pub vertex_buffers: Vec<wgpu::Buffer>,
}

/// A shader program: compiled sources plus the binding state for one pass.
///
/// Owned exclusively by the pass that created it. See the module docs for
/// the lifecycle and the binding protocol.
pub struct ShaderProgram {
    label: &'static str,
    vertex_source: String,
    fragment_source: String,
    attributes: Vec<VertexAttribute>,
    uniforms: UniformBlock,
    color_format: wgpu::TextureFormat,
    depth_format: Option<wgpu::TextureFormat>,
    texture_binding: bool,
    bound: Vec<Option<wgpu::Buffer>>,
    link: Option<LinkedProgram>,
}

impl ShaderProgram {
    /// Creates an uninitialized program. No GPU work happens here.
    pub fn new(desc: ProgramDesc) -> Self {
        let slots = desc.attributes.len();
        Self {
            label: desc.label,
            vertex_source: desc.vertex_source,
            fragment_source: desc.fragment_source,
            attributes: desc.attributes,
            uniforms: desc.uniforms,
            color_format: desc.color_format,
            depth_format: desc.depth_format,
            texture_binding: desc.texture_binding,
            bound: vec![None; slots],
            link: None,
        }
    }

    /// Whether a linked pipeline exists and drawing is permitted.
    pub fn is_initialized(&self) -> bool {
        self.link.is_some()
    }

    /// Overrides the target color format. Only meaningful before `init`;
    /// passes that render to the canvas call this once the real surface
    /// format is known.
    pub fn set_color_format(&mut self, format: wgpu::TextureFormat) {
        self.color_format = format;
    }

    /// Compiles both shader stages and links them into a render pipeline.
    ///
    /// Stage validation failures are captured through wgpu error scopes and
    /// reported as [`RenderError::ShaderCompile`] with the failing stage and
    /// the driver's log. On failure any previously linked pipeline is kept;
    /// on success it is replaced (and thereby released). A fresh program
    /// whose first `init` fails therefore stays uninitialized.
    pub fn init(&mut self, device: &wgpu::Device) -> Result<(), RenderError> {
        let vertex = compile_stage(
            device,
            self.label,
            &self.vertex_source,
            ShaderStage::Vertex,
        )?;
        let fragment = compile_stage(
            device,
            self.label,
            &self.fragment_source,
            ShaderStage::Fragment,
        )?;

        let uniform_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some(self.label),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });

        let texture_layout = if self.texture_binding {
            Some(
                device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                    label: Some(self.label),
                    entries: &[
                        wgpu::BindGroupLayoutEntry {
                            binding: 0,
                            visibility: wgpu::ShaderStages::FRAGMENT,
                            ty: wgpu::BindingType::Texture {
                                sample_type: wgpu::TextureSampleType::Float { filterable: true },
                                view_dimension: wgpu::TextureViewDimension::D2,
                                multisampled: false,
                            },
                            count: None,
                        },
                        wgpu::BindGroupLayoutEntry {
                            binding: 1,
                            visibility: wgpu::ShaderStages::FRAGMENT,
                            ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                            count: None,
                        },
                    ],
                }),
            )
        } else {
            None
        };

        let mut layouts: Vec<&wgpu::BindGroupLayout> = vec![&uniform_layout];
        if let Some(texture_layout) = &texture_layout {
            layouts.push(texture_layout);
        }
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some(self.label),
            bind_group_layouts: &layouts,
            push_constant_ranges: &[],
        });

        // One vertex buffer per declared attribute; slot index is the
        // attribute's position in the declaration order.
        let attribute_descs: Vec<[wgpu::VertexAttribute; 1]> = self
            .attributes
            .iter()
            .enumerate()
            .map(|(slot, attr)| {
                [wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: slot as u32,
                    format: attr.format,
                }]
            })
            .collect();
        let buffers: Vec<wgpu::VertexBufferLayout> = attribute_descs
            .iter()
            .zip(&self.attributes)
            .map(|(desc, attr)| wgpu::VertexBufferLayout {
                array_stride: attr.format.size(),
                step_mode: wgpu::VertexStepMode::Vertex,
                attributes: desc,
            })
            .collect();

        device.push_error_scope(wgpu::ErrorFilter::Validation);
        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some(self.label),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &vertex,
                entry_point: Some("vs_main"),
                buffers: &buffers,
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &fragment,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: self.color_format,
                    blend: Some(wgpu::BlendState::REPLACE),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                cull_mode: None,
                ..Default::default()
            },
            depth_stencil: self.depth_format.map(|format| wgpu::DepthStencilState {
                format,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::Less,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });
        if let Some(err) = pollster::block_on(device.pop_error_scope()) {
            return Err(RenderError::ShaderCompile {
                stage: ShaderStage::Link,
                log: err.to_string(),
            });
        }

        self.link = Some(LinkedProgram {
            pipeline,
            uniform_layout,
            texture_layout,
        });
        Ok(())
    }

    /// Uploads `data` into a fresh GPU buffer and binds it to the attribute
    /// slot declared under `name`.
    ///
    /// Returns `false` (after logging) when no attribute of that name was
    /// declared; callers treat that as "this pass does not use this
    /// attribute", never as an error.
    pub fn bind_vertex_attribute(&mut self, device: &wgpu::Device, name: &str, data: &[f32]) -> bool {
        let Some(slot) = self.attributes.iter().position(|a| a.name == name) else {
            log::warn!(
                "program `{}` has no vertex attribute named `{name}`; skipping",
                self.label
            );
            return false;
        };
        let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(name),
            contents: bytemuck::cast_slice(data),
            usage: wgpu::BufferUsages::VERTEX,
        });
        self.bound[slot] = Some(buffer);
        true
    }

    /// Writes a set of named values into the uniform block.
    ///
    /// Unknown names and mismatched tags are logged and skipped without
    /// affecting the remaining entries.
    pub fn set_uniforms(&mut self, entries: &[(&str, UniformValue)]) {
        for (name, value) in entries {
            self.uniforms.set(name, *value);
        }
    }

    /// Writes a single named value into the uniform block.
    pub fn set_uniform(&mut self, name: &str, value: UniformValue) -> bool {
        self.uniforms.set(name, value)
    }

    /// Snapshots the current uniform block and bound attributes into
    /// resources for one draw.
    ///
    /// Each draw gets its own uniform buffer so that sequential draws inside
    /// a single submission do not trample each other's values. Returns
    /// `None` when the program is not initialized or an attribute slot was
    /// never bound.
    pub fn prepare_draw(&self, device: &wgpu::Device) -> Option<PreparedDraw> {
        let link = self.link.as_ref()?;

        let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(self.label),
            contents: self.uniforms.bytes(),
            usage: wgpu::BufferUsages::UNIFORM,
        });
        let uniforms = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(self.label),
            layout: &link.uniform_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: buffer.as_entire_binding(),
            }],
        });

        let mut vertex_buffers = Vec::with_capacity(self.bound.len());
        for (slot, buffer) in self.bound.iter().enumerate() {
            match buffer {
                Some(buffer) => vertex_buffers.push(buffer.clone()),
                None => {
                    log::warn!(
                        "program `{}`: attribute `{}` (slot {slot}) has no data bound; skipping draw",
                        self.label,
                        self.attributes[slot].name
                    );
                    return None;
                }
            }
        }

        Some(PreparedDraw {
            uniforms,
            vertex_buffers,
        })
    }

    /// Creates the group-1 bind group for programs that sample a texture.
    ///
    /// Returns `None` when the program is uninitialized or was declared
    /// without a texture binding.
    pub fn bind_texture(
        &self,
        device: &wgpu::Device,
        view: &wgpu::TextureView,
        sampler: &wgpu::Sampler,
    ) -> Option<wgpu::BindGroup> {
        let link = self.link.as_ref()?;
        let layout = link.texture_layout.as_ref()?;
        Some(device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(self.label),
            layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(sampler),
                },
            ],
        }))
    }

    /// The linked pipeline, if `init` has succeeded.
    pub fn pipeline(&self) -> Option<&wgpu::RenderPipeline> {
        self.link.as_ref().map(|l| &l.pipeline)
    }

    /// Read access to the uniform block, for layout assertions in tests.
    pub fn uniform_block(&self) -> &UniformBlock {
        &self.uniforms
    }
}

/// Compiles one shader stage, capturing validation failures via an error
/// scope so a bad source string becomes a reportable error instead of an
/// uncaptured device error.
fn compile_stage(
    device: &wgpu::Device,
    label: &str,
    source: &str,
    stage: ShaderStage,
) -> Result<wgpu::ShaderModule, RenderError> {
    device.push_error_scope(wgpu::ErrorFilter::Validation);
    let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(label),
        source: wgpu::ShaderSource::Wgsl(source.into()),
    });
    if let Some(err) = pollster::block_on(device.pop_error_scope()) {
        return Err(RenderError::ShaderCompile {
            stage,
            log: err.to_string(),
        });
    }
    Ok(module)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn light_members() -> Vec<(&'static str, UniformKind)> {
        vec![
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
        ]
    }

    #[test]
    fn scalar_packs_into_vec3_pad() {
        // WGSL: vec3<f32> is align 16 / size 12, so a following f32 lands
        // at offset 12, not 16.
        let block = UniformBlockBuilder::new()
            .field("color", UniformKind::Vec3)
            .field("intensity", UniformKind::Scalar)
            .build();
        assert_eq!(block.offset_of("color"), Some(0));
        assert_eq!(block.offset_of("intensity"), Some(12));
        assert_eq!(block.size(), 16);
    }

    #[test]
    fn mat4_realigns_after_scalar() {
        let block = UniformBlockBuilder::new()
            .field("t", UniformKind::Scalar)
            .field("mvp", UniformKind::Mat4)
            .build();
        assert_eq!(block.offset_of("t"), Some(0));
        assert_eq!(block.offset_of("mvp"), Some(16));
        assert_eq!(block.size(), 80);
    }

    #[test]
    fn struct_array_matches_wgsl_layout() {
        // Mirrors the display pass block; offsets hand-computed against the
        // WGSL struct in display.frag.wgsl.
        let block = UniformBlockBuilder::new()
            .field("mvp", UniformKind::Mat4)
            .field("model", UniformKind::Mat4)
            .field("normal_mat", UniformKind::Mat4)
            .field("light_mvp", UniformKind::Mat4)
            .field("camera_pos", UniformKind::Vec3)
            .field("light_count", UniformKind::Scalar)
            .field("shadow_bias", UniformKind::Scalar)
            .field("shadow_enabled", UniformKind::Scalar)
            .struct_array("lights", 4, &light_members())
            .build();

        assert_eq!(block.offset_of("camera_pos"), Some(256));
        assert_eq!(block.offset_of("light_count"), Some(268));
        assert_eq!(block.offset_of("shadow_bias"), Some(272));
        assert_eq!(block.offset_of("shadow_enabled"), Some(276));
        // Array of structs: base 16-aligned, 80-byte stride.
        assert_eq!(block.offset_of("lights[0].position"), Some(288));
        assert_eq!(block.offset_of("lights[0].kind"), Some(300));
        assert_eq!(block.offset_of("lights[0].atten_quadratic"), Some(364));
        assert_eq!(block.offset_of("lights[1].position"), Some(368));
        assert_eq!(block.offset_of("lights[3].atten_quadratic"), Some(604));
        assert_eq!(block.size(), 608);
    }

    #[test]
    fn unknown_name_is_skipped_without_touching_others() {
        let mut block = UniformBlockBuilder::new()
            .field("known", UniformKind::Scalar)
            .build();
        assert!(block.set("known", UniformValue::Scalar(2.5)));
        assert!(!block.set("bogus", UniformValue::Scalar(9.0)));

        let bytes = block.bytes();
        let known = f32::from_le_bytes(bytes[0..4].try_into().unwrap());
        assert_eq!(known, 2.5);
    }

    #[test]
    fn kind_mismatch_is_skipped() {
        let mut block = UniformBlockBuilder::new()
            .field("mvp", UniformKind::Mat4)
            .build();
        assert!(!block.set("mvp", UniformValue::Scalar(1.0)));
        // The field is untouched (still zero).
        assert!(block.bytes().iter().all(|b| *b == 0));
    }

    #[test]
    fn mat4_written_column_major() {
        let mut block = UniformBlockBuilder::new()
            .field("m", UniformKind::Mat4)
            .build();
        let m = Mat4::from_cols_array(&[
            1.0, 2.0, 3.0, 4.0, //
            5.0, 6.0, 7.0, 8.0, //
            9.0, 10.0, 11.0, 12.0, //
            13.0, 14.0, 15.0, 16.0,
        ]);
        assert!(block.set("m", UniformValue::Mat4(m)));
        let floats: &[f32] = bytemuck::cast_slice(&block.bytes()[0..64]);
        assert_eq!(floats[0], 1.0);
        assert_eq!(floats[4], 5.0);
        assert_eq!(floats[15], 16.0);
    }

    #[test]
    fn empty_block_still_has_upload_size() {
        let block = UniformBlockBuilder::new().build();
        assert_eq!(block.size(), 16);
    }
}
