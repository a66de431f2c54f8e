//! Shadow techniques and the shader template they plug into.
//!
//! The display pass does not know how its shadow map was produced. It
//! compiles a fragment shader from a fixed WGSL template with two slots, and
//! the active [`ShadowTechnique`] fills them:
//!
//! - the **declaration** slot receives module-scope helper functions,
//!   including the technique's occlusion test;
//! - the **calculation** slot becomes the body of the template's
//!   `shadow_test` wrapper function.
//!
//! The wrapper's signature is the textual contract between template and
//! technique: `(texture, sampler, uv, compare depth, bias)`, spelled out in
//! [`SHADOW_TEST_SIGNATURE`]. [`ShaderTemplate::compose`] validates the
//! contract once, at pass-compile time, so a malformed pairing surfaces as a
//! shader error during `init` rather than a draw-time surprise.

mod vsm;

pub use vsm::{Vsm, chebyshev_upper_bound, linstep, pack_half, unpack_half};

use crate::error::{RenderError, ShaderStage};

/// The shadow-test wrapper signature the display template must define and
/// every technique's calculation is spliced into.
pub const SHADOW_TEST_SIGNATURE: &str = "fn shadow_test(shadow_map: texture_2d<f32>, shadow_samp: sampler, uv: vec2<f32>, compare: f32, bias: f32) -> f32";

pub(crate) const DECLARATION_SLOT: &str = "//{{SHADOW_DECLARATION}}";
pub(crate) const CALCULATION_SLOT: &str = "//{{SHADOW_CALCULATION}}";

/// A shadow-occlusion strategy, expressed as WGSL source fragments.
///
/// Implementations are stateless policies. Alternative algorithms (a plain
/// depth compare, percentage-closer filtering) slot in by providing a
/// different declaration/calculation pair against the same wrapper
/// signature; [`Vsm`] is the variant this crate ships.
pub trait ShadowTechnique {
    /// Short name used in logs and labels.
    fn name(&self) -> &'static str;

    /// Module-scope WGSL spliced above the shadow-test wrapper. Must define
    /// whatever functions the calculation calls.
    fn declaration(&self) -> &'static str;

    /// Statements forming the body of the shadow-test wrapper. Must return
    /// a visibility in [0, 1].
    fn calculation(&self) -> &'static str;
}

/// A fragment shader source with the two technique slots.
pub struct ShaderTemplate {
    source: &'static str,
}

impl ShaderTemplate {
    pub const fn new(source: &'static str) -> Self {
        Self { source }
    }

    /// Splices a technique into the template, validating the composition
    /// contract.
    ///
    /// Checks, in order: each slot marker occurs exactly once; the technique
    /// declares at least one function; the calculation returns a value; and
    /// the composed source still defines the documented wrapper signature.
    /// Violations are reported as fragment-stage shader errors.
    pub fn compose(&self, technique: &dyn ShadowTechnique) -> Result<String, RenderError> {
        let invalid = |log: String| RenderError::ShaderCompile {
            stage: ShaderStage::Fragment,
            log,
        };

        if self.source.matches(DECLARATION_SLOT).count() != 1 {
            return Err(invalid(format!(
                "template must contain the marker `{DECLARATION_SLOT}` exactly once"
            )));
        }
        if self.source.matches(CALCULATION_SLOT).count() != 1 {
            return Err(invalid(format!(
                "template must contain the marker `{CALCULATION_SLOT}` exactly once"
            )));
        }
        if !technique.declaration().contains("fn ") {
            return Err(invalid(format!(
                "technique `{}` declares no functions",
                technique.name()
            )));
        }
        if !technique.calculation().contains("return") {
            return Err(invalid(format!(
                "technique `{}` calculation does not return a visibility",
                technique.name()
            )));
        }

        let composed = self
            .source
            .replacen(DECLARATION_SLOT, technique.declaration(), 1)
            .replacen(CALCULATION_SLOT, technique.calculation(), 1);

        if !composed.contains(SHADOW_TEST_SIGNATURE) {
            return Err(invalid(format!(
                "template does not define the shadow-test call site `{SHADOW_TEST_SIGNATURE}`"
            )));
        }

        Ok(composed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NullTechnique {
        declaration: &'static str,
        calculation: &'static str,
    }

    impl ShadowTechnique for NullTechnique {
        fn name(&self) -> &'static str {
            "null"
        }
        fn declaration(&self) -> &'static str {
            self.declaration
        }
        fn calculation(&self) -> &'static str {
            self.calculation
        }
    }

    const TEMPLATE: &str = "\
//{{SHADOW_DECLARATION}}
fn shadow_test(shadow_map: texture_2d<f32>, shadow_samp: sampler, uv: vec2<f32>, compare: f32, bias: f32) -> f32 {
    //{{SHADOW_CALCULATION}}
}
";

    #[test]
    fn compose_splices_both_slots() {
        let technique = NullTechnique {
            declaration: "fn always_lit() -> f32 { return 1.0; }",
            calculation: "return always_lit();",
        };
        let composed = ShaderTemplate::new(TEMPLATE).compose(&technique).unwrap();
        assert!(composed.contains("fn always_lit()"));
        assert!(composed.contains("return always_lit();"));
        assert!(composed.contains(SHADOW_TEST_SIGNATURE));
        assert!(!composed.contains("{{SHADOW_DECLARATION}}"));
        assert!(!composed.contains("{{SHADOW_CALCULATION}}"));
    }

    #[test]
    fn compose_rejects_template_missing_a_slot() {
        let technique = NullTechnique {
            declaration: "fn f() -> f32 { return 1.0; }",
            calculation: "return f();",
        };
        let no_calc = "//{{SHADOW_DECLARATION}}\nfn shadow_test() -> f32 { return 1.0; }";
        let err = ShaderTemplate::new(no_calc).compose(&technique).unwrap_err();
        assert!(matches!(
            err,
            RenderError::ShaderCompile {
                stage: ShaderStage::Fragment,
                ..
            }
        ));
    }

    #[test]
    fn compose_rejects_calculation_without_return() {
        let technique = NullTechnique {
            declaration: "fn f() -> f32 { return 1.0; }",
            calculation: "let v = f();",
        };
        assert!(ShaderTemplate::new(TEMPLATE).compose(&technique).is_err());
    }

    #[test]
    fn compose_rejects_template_without_call_site() {
        let technique = NullTechnique {
            declaration: "fn f() -> f32 { return 1.0; }",
            calculation: "return f();",
        };
        // Wrapper renamed: the documented call-site contract is broken.
        let renamed = "\
//{{SHADOW_DECLARATION}}
fn shadow_lookup(uv: vec2<f32>) -> f32 {
    //{{SHADOW_CALCULATION}}
}
";
        assert!(ShaderTemplate::new(renamed).compose(&technique).is_err());
    }

    #[test]
    fn vsm_composes_against_display_template() {
        let template = ShaderTemplate::new(include_str!("../shaders/display.frag.wgsl"));
        let composed = template.compose(&Vsm).unwrap();
        assert!(composed.contains("fn vsm("));
        assert!(composed.contains("chebyshev_upper_bound"));
    }
}
