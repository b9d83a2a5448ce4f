//! Typed reflection of a transpiled shader's interface.

use std::fmt;

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl ShaderStage {
    /// Descriptor set of the stage's uniform block.
    pub fn uniform_set(self) -> u32 {
        match self {
            ShaderStage::Vertex => 1,
            ShaderStage::Fragment => 3,
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            ShaderStage::Vertex => "vert",
            ShaderStage::Fragment => "frag",
        }
    }
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ShaderStage::Vertex => "vertex",
            ShaderStage::Fragment => "fragment",
        })
    }
}

/// Uniform types the std140 layout engine accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GlslType {
    Float,
    Int,
    Uint,
    Bool,
    Vec2,
    Vec3,
    Vec4,
    Mat4,
}

impl GlslType {
    pub fn parse(token: &str) -> Option<GlslType> {
        Some(match token {
            "float" => GlslType::Float,
            "int" => GlslType::Int,
            "uint" => GlslType::Uint,
            "bool" => GlslType::Bool,
            "vec2" => GlslType::Vec2,
            "vec3" => GlslType::Vec3,
            "vec4" => GlslType::Vec4,
            "mat4" => GlslType::Mat4,
            _ => return None,
        })
    }

    pub fn as_str(self) -> &'static str {
        match self {
            GlslType::Float => "float",
            GlslType::Int => "int",
            GlslType::Uint => "uint",
            GlslType::Bool => "bool",
            GlslType::Vec2 => "vec2",
            GlslType::Vec3 => "vec3",
            GlslType::Vec4 => "vec4",
            GlslType::Mat4 => "mat4",
        }
    }

    /// std140 `(size, alignment)` in bytes.
    pub fn size_and_alignment(self) -> (u32, u32) {
        match self {
            GlslType::Float | GlslType::Int | GlslType::Uint | GlslType::Bool => (4, 4),
            GlslType::Vec2 => (8, 8),
            GlslType::Vec3 => (12, 16),
            GlslType::Vec4 => (16, 16),
            // four contiguous vec4 columns
            GlslType::Mat4 => (64, 16),
        }
    }

    pub fn component_count(self) -> usize {
        match self {
            GlslType::Float | GlslType::Int | GlslType::Uint | GlslType::Bool => 1,
            GlslType::Vec2 => 2,
            GlslType::Vec3 => 3,
            GlslType::Vec4 => 4,
            GlslType::Mat4 => 16,
        }
    }
}

impl fmt::Display for GlslType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UniformDescriptor {
    pub name: String,
    /// Key into a material's `constantshadervalues`.
    pub constant_name: String,
    pub glsl_type: GlslType,
    pub array_size: Option<u32>,
    pub default: Option<Vec<f32>>,
}

impl UniformDescriptor {
    /// Constant name derived from the uniform name: `g_Speed` -> `speed`.
    pub fn derived_constant_name(name: &str) -> String {
        name.strip_prefix("g_").unwrap_or(name).to_lowercase()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SamplerDescriptor {
    pub name: String,
    /// Texture bound when nothing else resolves the slot.
    pub default_texture: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VaryingDescriptor {
    pub name: String,
    pub glsl_type: String,
    pub array_size: Option<u32>,
    pub location: u32,
}

impl VaryingDescriptor {
    /// Type as written in the declaration, `vec4[2]` for arrays.
    pub fn declared_type(&self) -> String {
        match self.array_size {
            Some(n) => format!("{}[{n}]", self.glsl_type),
            None => self.glsl_type.clone(),
        }
    }

    /// Interface locations the varying occupies.
    pub fn location_count(&self) -> u32 {
        let per_element = match self.glsl_type.as_str() {
            "mat2" => 2,
            "mat3" => 3,
            "mat4" => 4,
            _ => 1,
        };
        per_element * self.array_size.unwrap_or(1)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttributeDescriptor {
    pub name: String,
    pub glsl_type: String,
    pub location: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derived_constant_name_strips_prefix_and_lowercases() {
        assert_eq!(UniformDescriptor::derived_constant_name("g_ScrollSpeed"), "scrollspeed");
        assert_eq!(UniformDescriptor::derived_constant_name("Strength"), "strength");
        assert_eq!(UniformDescriptor::derived_constant_name("g_"), "");
    }

    #[test]
    fn parse_rejects_types_outside_the_table() {
        assert_eq!(GlslType::parse("vec3"), Some(GlslType::Vec3));
        assert_eq!(GlslType::parse("mat3"), None);
        assert_eq!(GlslType::parse("ivec2"), None);
    }
}
