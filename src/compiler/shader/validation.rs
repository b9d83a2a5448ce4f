//! Optional GLSL validation of transpiled stages using the naga library.

use anyhow::{Context, Result, anyhow};

use crate::compiler::shader::ShaderStage;

/// Parse and validate one GLSL 450 stage with naga's GLSL front-end.
///
/// naga is stricter than `glslc` in a few corners (combined image samplers,
/// some implicit conversions), so a failure here is reported, not fatal.
pub fn validate_glsl(source: &str, stage: ShaderStage) -> Result<naga::Module> {
    let shader_stage = match stage {
        ShaderStage::Vertex => naga::ShaderStage::Vertex,
        ShaderStage::Fragment => naga::ShaderStage::Fragment,
    };

    let mut parser = naga::front::glsl::Frontend::default();
    let options = naga::front::glsl::Options {
        stage: shader_stage,
        defines: Default::default(),
    };

    let module = parser
        .parse(&options, source)
        .map_err(|e| anyhow!("GLSL parse failed: {e:?}"))?;

    naga::valid::Validator::new(
        naga::valid::ValidationFlags::all(),
        naga::valid::Capabilities::all(),
    )
    .validate(&module)
    .map_err(|e| anyhow!("GLSL validation failed: {e:?}"))?;

    Ok(module)
}

pub fn validate_glsl_with_context(source: &str, stage: ShaderStage, context: &str) -> Result<naga::Module> {
    validate_glsl(source, stage).with_context(|| format!("{context} produced invalid {stage} GLSL"))
}
