//! Scene to render-pass program compiler.

pub mod assembler;
pub mod diagnostics;
pub mod dispatch;
pub mod error;
pub mod layout;
pub mod pool;
pub mod session;
pub mod shader;

pub use assembler::{CompileOptions, SceneCompiler};
pub use assembler::types::{
    BlendMode, ColorFormat, CompiledScene, RenderPassDescriptor, RenderTarget, ShaderDescriptor,
    TextureBinding, TextureDescriptor, TextureSource,
};
pub use diagnostics::{Diagnostics, Warning, WarningKind};
pub use error::{ResolutionError, TranspileError};
pub use session::CompileSession;
