//! std140 layout of a stage's `uniforms_t` block.

use serde::Serialize;
use thiserror::Error;

use crate::compiler::shader::GlslType;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LayoutError {
    #[error("uniform '{name}' has unsupported type '{glsl_type}'")]
    UnsupportedType { name: String, glsl_type: String },
    #[error("uniform '{name}' is an array of {len}; uniform arrays are not supported")]
    Array { name: String, len: u32 },
}

/// A uniform declaration as it appears in the source, before validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeclaredField<'a> {
    pub name: &'a str,
    pub glsl_type: &'a str,
    pub array_size: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LayoutField {
    pub name: String,
    pub ty: GlslType,
    pub offset: u32,
    pub size: u32,
    /// Bytes inserted before this field to satisfy its alignment.
    pub padding_before: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StructLayout {
    pub fields: Vec<LayoutField>,
    /// Block size rounded up to 16 bytes.
    pub size: u32,
}

/// One entry of the native struct mirroring the block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayoutMember<'a> {
    Padding { id: usize, bytes: u32 },
    Field(&'a LayoutField),
}

fn align_up(offset: u32, align: u32) -> u32 {
    offset.div_ceil(align) * align
}

impl StructLayout {
    pub fn compute<'a, I>(fields: I) -> Result<StructLayout, LayoutError>
    where
        I: IntoIterator<Item = DeclaredField<'a>>,
    {
        let mut offset = 0u32;
        let mut out = Vec::new();
        for decl in fields {
            if let Some(len) = decl.array_size {
                return Err(LayoutError::Array {
                    name: decl.name.to_string(),
                    len,
                });
            }
            let ty = GlslType::parse(decl.glsl_type).ok_or_else(|| LayoutError::UnsupportedType {
                name: decl.name.to_string(),
                glsl_type: decl.glsl_type.to_string(),
            })?;
            let (size, align) = ty.size_and_alignment();
            let aligned = align_up(offset, align);
            out.push(LayoutField {
                name: decl.name.to_string(),
                ty,
                offset: aligned,
                size,
                padding_before: aligned - offset,
            });
            offset = aligned + size;
        }
        Ok(StructLayout {
            fields: out,
            size: align_up(offset, 16),
        })
    }

    pub fn field(&self, name: &str) -> Option<&LayoutField> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Fields interleaved with explicit padding, including tail padding up to `size`.
    pub fn members(&self) -> impl Iterator<Item = LayoutMember<'_>> + '_ {
        let mut members = Vec::with_capacity(self.fields.len() * 2 + 1);
        let mut next_pad = 0usize;
        for field in &self.fields {
            if field.padding_before > 0 {
                members.push(LayoutMember::Padding {
                    id: next_pad,
                    bytes: field.padding_before,
                });
                next_pad += 1;
            }
            members.push(LayoutMember::Field(field));
        }
        let end = self.fields.last().map(|f| f.offset + f.size).unwrap_or(0);
        if self.size > end {
            members.push(LayoutMember::Padding {
                id: next_pad,
                bytes: self.size - end,
            });
        }
        members.into_iter()
    }
}
