use thiserror::Error;

use crate::asset_store::AssetError;
use crate::compiler::layout::LayoutError;
use crate::compiler::shader::ShaderStage;

/// Fatal to one shader compile request.
#[derive(Debug, Error)]
pub enum TranspileError {
    #[error("varying '{name}' is {vertex_type} in the vertex stage but {fragment_type} in the fragment stage")]
    VaryingTypeMismatch {
        name: String,
        vertex_type: String,
        fragment_type: String,
    },

    #[error("{stage} preprocessor failed:\n{diagnostic}")]
    Preprocessor { stage: ShaderStage, diagnostic: String },

    #[error("{stage} uniform block cannot be laid out")]
    UnsupportedUniform {
        stage: ShaderStage,
        #[source]
        source: LayoutError,
    },
}

/// Fatal to one scene object or one effect; the assembler skips it.
#[derive(Debug, Error)]
pub enum ResolutionError {
    #[error("cannot load '{path}'")]
    MissingAsset {
        path: String,
        #[source]
        source: AssetError,
    },

    #[error("invalid document '{path}': {reason}")]
    InvalidDocument { path: String, reason: String },

    #[error("cannot import texture '{name}': {reason}")]
    TextureImport { name: String, reason: String },

    #[error("pass targets unknown buffer '{target}'")]
    UnknownTarget { target: String },

    #[error("shader '{shader}' failed to compile")]
    Shader {
        shader: String,
        #[source]
        source: TranspileError,
    },
}

impl ResolutionError {
    pub(crate) fn invalid(path: &str, err: anyhow::Error) -> Self {
        ResolutionError::InvalidDocument {
            path: path.to_string(),
            reason: format!("{err:#}"),
        }
    }
}

/// Render an error with its `source()` chain, the way `anyhow`'s `{:#}` does.
pub fn error_chain(err: &dyn std::error::Error) -> String {
    let mut out = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        out.push_str(": ");
        out.push_str(&cause.to_string());
        source = cause.source();
    }
    out
}
