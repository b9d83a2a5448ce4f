use serde::Serialize;

use crate::compiler::diagnostics::Diagnostics;
use crate::compiler::dispatch::UniformSetup;
use crate::compiler::pool::BufferPools;
use crate::compiler::shader::TranspiledShader;

/// Where a pass writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RenderTarget {
    LocalBuffer { index: usize },
    ScreenBuffer { index: usize },
    /// The output surface every object is composited onto.
    Compositing,
}

/// What a sampler slot reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TextureSource {
    Texture { id: usize },
    LocalBuffer { index: usize },
    ScreenBuffer { index: usize },
    /// Whatever has been composited so far.
    FullFrame,
}

impl TextureSource {
    /// The buffer a target writes, seen as a sampling source.
    pub fn from_target(target: RenderTarget) -> Option<TextureSource> {
        match target {
            RenderTarget::LocalBuffer { index } => Some(TextureSource::LocalBuffer { index }),
            RenderTarget::ScreenBuffer { index } => Some(TextureSource::ScreenBuffer { index }),
            RenderTarget::Compositing => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ColorFormat {
    Rgba8Unorm,
    Rgba16Float,
    /// The presentation surface's native format.
    Swapchain,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BlendMode {
    None,
    Alpha,
    Add,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TextureBinding {
    pub slot: usize,
    pub source: TextureSource,
}

/// Compile-time transform parameters of an object; the runtime turns them
/// into matrices once it knows the screen size and pointer position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ObjectTransform {
    pub origin: [f32; 3],
    pub size: [f32; 2],
    pub scale: [f32; 3],
    pub parallax_depth: [f32; 2],
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderPassDescriptor {
    pub object_id: usize,
    pub pass_id: usize,
    pub shader_id: usize,
    pub color_target: RenderTarget,
    pub color_target_format: ColorFormat,
    pub clear_color: bool,
    pub blend_mode: BlendMode,
    pub texture_bindings: Vec<TextureBinding>,
    pub uniform_setup: Vec<UniformSetup>,
    /// Set on passes drawing onto the compositing surface.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transform: Option<ObjectTransform>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ShaderDescriptor {
    pub id: usize,
    pub name: String,
    #[serde(flatten)]
    pub shader: TranspiledShader,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TextureDescriptor {
    pub id: usize,
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub clamp_uvs: bool,
    pub no_interpolation: bool,
    /// Asset path the pixels were read from.
    pub source_path: String,
}

/// The flat program handed to the emitter; `passes` order is execution order.
#[derive(Debug, Clone, Serialize)]
pub struct CompiledScene {
    pub clear_color: [f32; 3],
    /// Scene coordinate space (orthographic projection size).
    pub projection: [u32; 2],
    pub textures: Vec<TextureDescriptor>,
    pub shaders: Vec<ShaderDescriptor>,
    pub passes: Vec<RenderPassDescriptor>,
    pub buffer_pools: BufferPools,
    pub diagnostics: Diagnostics,
}

impl CompiledScene {
    pub fn shader(&self, id: usize) -> Option<&ShaderDescriptor> {
        self.shaders.iter().find(|s| s.id == id)
    }

    pub fn passes_of(&self, object_id: usize) -> impl Iterator<Item = &RenderPassDescriptor> + '_ {
        self.passes.iter().filter(move |p| p.object_id == object_id)
    }
}
