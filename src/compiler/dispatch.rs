//! Maps reflected uniforms to value-producing instructions for the runtime.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::compiler::diagnostics::{Diagnostics, WarningKind};
use crate::compiler::shader::{GlslType, ShaderStage, TranspiledShader, UniformDescriptor};

/// Size of whatever is bound to a sampler slot.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SlotSize {
    Fixed { width: u32, height: u32 },
    ScreenScaled { scale_x: f32, scale_y: f32 },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum UniformSource {
    /// Runtime model matrix of the drawn object.
    ModelMatrix,
    ViewProjectionMatrix,
    ModelViewProjectionMatrix,
    Identity,
    Time,
    ParallaxPosition,
    ScreenSize,
    EyePosition,
    ObjectColor { values: Vec<f32> },
    ObjectAlpha { values: Vec<f32> },
    ObjectBrightness { values: Vec<f32> },
    /// `width, height, width, height` of the slot's binding.
    TextureResolution { slot: usize, size: SlotSize },
    Literal { values: Vec<f32> },
    /// Value of the material constant named `constant`.
    Constant { constant: String, values: Vec<f32> },
    Default { values: Vec<f32> },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UniformSetup {
    pub stage: ShaderStage,
    pub name: String,
    pub glsl_type: GlslType,
    /// Byte offset inside the stage's `uniforms_t` block.
    pub offset: u32,
    #[serde(flatten)]
    pub source: UniformSource,
}

/// Per-object values copied into uniforms.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ObjectUniforms {
    pub color: [f32; 3],
    pub alpha: f32,
    pub brightness: f32,
}

impl Default for ObjectUniforms {
    fn default() -> Self {
        Self {
            color: [1.0, 1.0, 1.0],
            alpha: 1.0,
            brightness: 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatrixMode {
    /// Drawing onto the compositing surface with the object's transform.
    Engine,
    /// Drawing a full quad into an intermediate buffer.
    Identity,
}

pub struct DispatchContext<'a> {
    pub matrices: MatrixMode,
    pub object: ObjectUniforms,
    pub slot_sizes: &'a [SlotSize],
    pub constants: &'a BTreeMap<String, Vec<f32>>,
}

/// Zero-pad or truncate `values` to the component count of `ty`.
pub fn fit_values(values: &[f32], ty: GlslType) -> Vec<f32> {
    let n = ty.component_count();
    let mut out: Vec<f32> = values.iter().copied().take(n).collect();
    out.resize(n, 0.0);
    out
}

fn texture_slot(name: &str, suffix: &str) -> Option<usize> {
    name.strip_prefix("g_Texture")?
        .strip_suffix(suffix)?
        .parse()
        .ok()
}

fn semantic_source(
    uniform: &UniformDescriptor,
    ctx: &DispatchContext<'_>,
) -> Option<UniformSource> {
    let ty = uniform.glsl_type;
    let engine = |source: UniformSource| match ctx.matrices {
        MatrixMode::Engine => source,
        MatrixMode::Identity => UniformSource::Identity,
    };
    let source = match uniform.name.as_str() {
        "g_ModelMatrix" => engine(UniformSource::ModelMatrix),
        "g_ViewProjectionMatrix" => engine(UniformSource::ViewProjectionMatrix),
        "g_ModelViewProjectionMatrix" => engine(UniformSource::ModelViewProjectionMatrix),
        "g_EffectTextureProjectionMatrix"
        | "g_EffectTextureProjectionMatrixInverse"
        | "g_EffectModelViewProjectionMatrix"
        | "g_EffectModelViewProjectionMatrixInverse"
        | "g_ModelViewProjectionMatrixInverse" => UniformSource::Identity,
        "g_Time" => UniformSource::Time,
        "g_ParallaxPosition" => UniformSource::ParallaxPosition,
        "g_Screen" => UniformSource::ScreenSize,
        "g_EyePosition" => UniformSource::EyePosition,
        "g_Color" | "g_UserColor" => {
            let [r, g, b] = ctx.object.color;
            // a vec4 colour carries the object alpha
            UniformSource::ObjectColor {
                values: fit_values(&[r, g, b, ctx.object.alpha], ty),
            }
        }
        "g_Alpha" | "g_UserAlpha" => UniformSource::ObjectAlpha {
            values: fit_values(&[ctx.object.alpha], ty),
        },
        "g_Brightness" => UniformSource::ObjectBrightness {
            values: fit_values(&[ctx.object.brightness], ty),
        },
        name => {
            if let Some(slot) = texture_slot(name, "Resolution") {
                let size = *ctx.slot_sizes.get(slot)?;
                UniformSource::TextureResolution { slot, size }
            } else if texture_slot(name, "Rotation").is_some() {
                UniformSource::Literal {
                    values: fit_values(&[1.0, 0.0, 0.0, 1.0], ty),
                }
            } else if texture_slot(name, "Translation").is_some() {
                UniformSource::Literal {
                    values: fit_values(&[0.0, 0.0], ty),
                }
            } else {
                return None;
            }
        }
    };
    Some(source)
}

/// Instruction for one uniform, or `None` (with a warning) when nothing provides a value.
pub fn dispatch_uniform(
    stage: ShaderStage,
    uniform: &UniformDescriptor,
    offset: u32,
    ctx: &DispatchContext<'_>,
    diagnostics: &mut Diagnostics,
) -> Option<UniformSetup> {
    let source = semantic_source(uniform, ctx)
        .or_else(|| {
            ctx.constants
                .get(&uniform.constant_name)
                .map(|values| UniformSource::Constant {
                    constant: uniform.constant_name.clone(),
                    values: fit_values(values, uniform.glsl_type),
                })
        })
        .or_else(|| {
            uniform.default.as_ref().map(|values| UniformSource::Default {
                values: fit_values(values, uniform.glsl_type),
            })
        });

    let Some(source) = source else {
        diagnostics.warn(
            WarningKind::UnrecognizedUniform,
            format!(
                "{stage} uniform {} {} has no semantic, constant or default; left unset",
                uniform.glsl_type, uniform.name
            ),
        );
        return None;
    };

    Some(UniformSetup {
        stage,
        name: uniform.name.clone(),
        glsl_type: uniform.glsl_type,
        offset,
        source,
    })
}

/// Setup instructions for every reflected uniform, vertex stage first.
pub fn uniform_setup(
    shader: &TranspiledShader,
    ctx: &DispatchContext<'_>,
    diagnostics: &mut Diagnostics,
) -> Vec<UniformSetup> {
    let mut out = Vec::new();
    for stage in [ShaderStage::Vertex, ShaderStage::Fragment] {
        let layout = shader.layout(stage);
        for uniform in shader.uniforms(stage) {
            let offset = layout.field(&uniform.name).map_or(0, |f| f.offset);
            out.extend(dispatch_uniform(stage, uniform, offset, ctx, diagnostics));
        }
    }
    out
}
