//! Error taxonomy for the rendering pipeline.
//!
//! Two failure classes are fatal to a single pass for a single frame:
//! shader compilation/linking and off-screen resource allocation. Neither
//! is allowed to escape [`Renderer::render`](crate::Renderer::render); the
//! renderer logs the failure, skips the pass, and keeps ticking.
//!
//! Binding problems (an unknown attribute or uniform name) are not errors
//! at all. They are logged through the `log` facade and the draw proceeds
//! with that binding absent.

use thiserror::Error;

/// The pipeline stage at which shader processing failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShaderStage {
    /// The vertex shader module failed validation.
    Vertex,
    /// The fragment shader module failed validation.
    Fragment,
    /// Both modules validated but could not be linked into a pipeline
    /// (e.g. mismatched inter-stage interfaces).
    Link,
}

impl std::fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ShaderStage::Vertex => write!(f, "vertex"),
            ShaderStage::Fragment => write!(f, "fragment"),
            ShaderStage::Link => write!(f, "link"),
        }
    }
}

/// Errors produced while initializing or drawing a render pass.
#[derive(Debug, Error)]
pub enum RenderError {
    /// Shader compilation or pipeline linking failed.
    ///
    /// Carries the failing [`ShaderStage`] and the driver's validation
    /// message. The owning pass is skipped for the current frame; a
    /// previously linked pipeline (if any) stays usable until a later
    /// `init` succeeds.
    #[error("shader {stage} stage failed: {log}")]
    ShaderCompile { stage: ShaderStage, log: String },

    /// An off-screen target or one of its sub-resources could not be
    /// allocated, or the composed target failed its completeness check.
    ///
    /// By the time this is returned every partially created sub-resource
    /// has already been destroyed; no partial resource escapes.
    #[error("resource allocation failed: {0}")]
    ResourceAllocation(String),
}
