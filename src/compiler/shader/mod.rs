//! Legacy dual-stage shader -> Vulkan-style GLSL 450 transpiler.

pub mod annotations;
pub mod header;
pub mod preprocessor;
pub mod reflect;
pub mod scan;
pub mod validation;

use std::collections::BTreeMap;

use serde::Serialize;

use crate::compiler::diagnostics::Diagnostics;
use crate::compiler::error::TranspileError;
use crate::compiler::layout::{DeclaredField, StructLayout};

pub use preprocessor::{GlslcPreprocessor, PassThroughPreprocessor, TextPreprocessor};
pub use reflect::{
    AttributeDescriptor, GlslType, SamplerDescriptor, ShaderStage, UniformDescriptor,
    VaryingDescriptor,
};

use annotations::StageAnnotations;
use scan::{Declaration, parse_declaration};

/// Vertex + fragment text of one legacy shader, as stored under `shaders/`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderSource {
    pub name: String,
    pub vertex: String,
    pub fragment: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct TranspiledShader {
    #[serde(skip)]
    pub vertex_text: String,
    #[serde(skip)]
    pub fragment_text: String,
    pub vertex_uniforms: Vec<UniformDescriptor>,
    pub fragment_uniforms: Vec<UniformDescriptor>,
    pub samplers: Vec<SamplerDescriptor>,
    pub varyings: Vec<VaryingDescriptor>,
    pub attributes: Vec<AttributeDescriptor>,
    /// Combo values the stages were preprocessed with.
    pub combos: BTreeMap<String, i32>,
    pub vertex_layout: StructLayout,
    pub fragment_layout: StructLayout,
}

impl TranspiledShader {
    pub fn uniforms(&self, stage: ShaderStage) -> &[UniformDescriptor] {
        match stage {
            ShaderStage::Vertex => &self.vertex_uniforms,
            ShaderStage::Fragment => &self.fragment_uniforms,
        }
    }

    pub fn layout(&self, stage: ShaderStage) -> &StructLayout {
        match stage {
            ShaderStage::Vertex => &self.vertex_layout,
            ShaderStage::Fragment => &self.fragment_layout,
        }
    }

    pub fn text(&self, stage: ShaderStage) -> &str {
        match stage {
            ShaderStage::Vertex => &self.vertex_text,
            ShaderStage::Fragment => &self.fragment_text,
        }
    }
}

pub struct ShaderTranspiler {
    preprocessor: Box<dyn TextPreprocessor>,
}

impl ShaderTranspiler {
    pub fn new(preprocessor: Box<dyn TextPreprocessor>) -> Self {
        Self { preprocessor }
    }

    /// Rewrite both stages and reflect their interface.
    ///
    /// `bound_flags[i]` activates the combo of the sampler bound at slot `i`;
    /// `combo_overrides` only replace combos the shader declares.
    pub fn transpile(
        &self,
        source: &ShaderSource,
        bound_flags: &[bool],
        combo_overrides: &BTreeMap<String, i32>,
        diagnostics: &mut Diagnostics,
    ) -> Result<TranspiledShader, TranspileError> {
        let normalize = |text: &str| {
            let text = scan::rename_reserved_identifiers(text, scan::RESERVED_RENAMES);
            scan::strip_uniform_precision(&scan::strip_require_directives(&text))
        };
        let vertex = normalize(&source.vertex);
        let fragment = normalize(&source.fragment);

        let vertex_notes = annotations::extract(&vertex, ShaderStage::Vertex, diagnostics);
        let fragment_notes = annotations::extract(&fragment, ShaderStage::Fragment, diagnostics);

        let vertex = scan::wrap_pow_base_in_abs(&header::prepend_compat_header(&vertex));
        let fragment = scan::wrap_pow_base_in_abs(&header::prepend_compat_header(&fragment));

        let combos = resolve_combos(&vertex_notes, &fragment_notes, bound_flags, combo_overrides);
        log::debug!("shader {} combos {:?}", source.name, combos);

        let vertex = scan::collapse_blank_lines(&self.preprocessor.preprocess(
            &vertex,
            ShaderStage::Vertex,
            &combos,
        )?);
        let fragment = scan::collapse_blank_lines(&self.preprocessor.preprocess(
            &fragment,
            ShaderStage::Fragment,
            &combos,
        )?);

        let (vertex, attributes) = rewrite_attributes(&vertex);

        let (vertex, vertex_varyings) = remove_declarations(&vertex, "varying");
        let (fragment, fragment_varyings) = remove_declarations(&fragment, "varying");
        let varyings = merge_varyings(&vertex_varyings, &fragment_varyings)?;
        let vertex = scan::insert_after_prologue(&vertex, &varying_block(&varyings, "out"));
        let fragment = scan::insert_after_prologue(&fragment, &varying_block(&varyings, "in"));

        let mut sampler_names = Vec::new();
        let fragment = rewrite_samplers(&fragment, &mut sampler_names);
        let vertex = rewrite_samplers(&vertex, &mut sampler_names);

        let (vertex, vertex_layout) = rewrite_uniform_block(&vertex, ShaderStage::Vertex)?;
        let (fragment, fragment_layout) = rewrite_uniform_block(&fragment, ShaderStage::Fragment)?;

        let vertex_uniforms = describe_uniforms(&vertex_layout, &vertex_notes);
        let fragment_uniforms = describe_uniforms(&fragment_layout, &fragment_notes);

        let samplers = sampler_names
            .into_iter()
            .map(|name| {
                let default_texture = fragment_notes
                    .sampler(&name)
                    .and_then(|s| s.default_texture.clone())
                    .or_else(|| vertex_notes.sampler(&name).and_then(|s| s.default_texture.clone()));
                SamplerDescriptor {
                    name,
                    default_texture,
                }
            })
            .collect();

        let fragment = rewrite_frag_color(&fragment);

        Ok(TranspiledShader {
            vertex_text: scan::collapse_blank_lines(&vertex),
            fragment_text: scan::collapse_blank_lines(&fragment),
            vertex_uniforms,
            fragment_uniforms,
            samplers,
            varyings,
            attributes,
            combos,
            vertex_layout,
            fragment_layout,
        })
    }
}

fn resolve_combos(
    vertex: &StageAnnotations,
    fragment: &StageAnnotations,
    bound_flags: &[bool],
    overrides: &BTreeMap<String, i32>,
) -> BTreeMap<String, i32> {
    let mut combos = vertex.combos.clone();
    combos.extend(fragment.combos.iter().map(|(k, v)| (k.clone(), *v)));

    let slots = sampler_slots(vertex, fragment);
    for sampler in vertex.samplers.iter().chain(&fragment.samplers) {
        let Some(combo) = &sampler.combo else {
            continue;
        };
        let slot = slots.iter().position(|name| *name == sampler.name);
        if slot.and_then(|i| bound_flags.get(i)).copied().unwrap_or(false) {
            combos.insert(combo.clone(), 1);
        }
    }

    for (name, value) in overrides {
        match combos.get_mut(name) {
            Some(slot) => *slot = *value,
            None => log::debug!("ignoring override for undeclared combo {name}"),
        }
    }
    combos
}

/// Binding order of the samplers: fragment declarations first, then samplers
/// only the vertex stage declares. `rewrite_samplers` assigns the same order.
fn sampler_slots<'a>(vertex: &'a StageAnnotations, fragment: &'a StageAnnotations) -> Vec<&'a str> {
    let mut slots: Vec<&str> = Vec::new();
    for sampler in fragment.samplers.iter().chain(&vertex.samplers) {
        if !slots.contains(&sampler.name.as_str()) {
            slots.push(&sampler.name);
        }
    }
    slots
}

fn rewrite_attributes(source: &str) -> (String, Vec<AttributeDescriptor>) {
    let mut attributes = Vec::new();
    let mut out = String::with_capacity(source.len());
    for line in source.split_inclusive('\n') {
        match parse_declaration(line, "attribute") {
            Some(Declaration {
                glsl_type, name, ..
            }) => {
                let location = attributes.len() as u32;
                out.push_str(&format!("layout(location = {location}) in {glsl_type} {name};\n"));
                attributes.push(AttributeDescriptor {
                    name: name.to_string(),
                    glsl_type: glsl_type.to_string(),
                    location,
                });
            }
            None => out.push_str(line),
        }
    }
    (out, attributes)
}

/// Remove `varying <type> <name>[N];` lines, returning the declarations in
/// order. Locations are assigned when the stages are merged.
fn remove_declarations(source: &str, keyword: &str) -> (String, Vec<VaryingDescriptor>) {
    let mut found: Vec<VaryingDescriptor> = Vec::new();
    let mut out = String::with_capacity(source.len());
    for line in source.split_inclusive('\n') {
        match parse_declaration(line, keyword) {
            Some(decl) => {
                if !found.iter().any(|v| v.name == decl.name) {
                    found.push(VaryingDescriptor {
                        name: decl.name.to_string(),
                        glsl_type: decl.glsl_type.to_string(),
                        array_size: decl.array_size,
                        location: 0,
                    });
                }
            }
            None => out.push_str(line),
        }
    }
    (scan::collapse_blank_lines(&out), found)
}

fn merge_varyings(
    vertex: &[VaryingDescriptor],
    fragment: &[VaryingDescriptor],
) -> Result<Vec<VaryingDescriptor>, TranspileError> {
    let mut merged: Vec<VaryingDescriptor> = vertex.to_vec();
    for varying in fragment {
        match merged.iter().find(|v| v.name == varying.name) {
            Some(existing)
                if existing.glsl_type != varying.glsl_type
                    || existing.array_size != varying.array_size =>
            {
                return Err(TranspileError::VaryingTypeMismatch {
                    name: varying.name.clone(),
                    vertex_type: existing.declared_type(),
                    fragment_type: varying.declared_type(),
                });
            }
            Some(_) => {}
            None => merged.push(varying.clone()),
        }
    }
    let mut location = 0;
    for varying in &mut merged {
        varying.location = location;
        location += varying.location_count();
    }
    Ok(merged)
}

fn varying_block(varyings: &[VaryingDescriptor], direction: &str) -> String {
    varyings
        .iter()
        .map(|v| {
            let suffix = v.array_size.map(|n| format!("[{n}]")).unwrap_or_default();
            format!(
                "layout(location = {}) {direction} {} {}{suffix};\n",
                v.location, v.glsl_type, v.name
            )
        })
        .collect()
}

/// Rewrite `uniform sampler2D` lines; `bindings` is shared across stages so a
/// sampler keeps one binding in both.
fn rewrite_samplers(source: &str, bindings: &mut Vec<String>) -> String {
    let mut out = String::with_capacity(source.len());
    for line in source.split_inclusive('\n') {
        match parse_declaration(line, "uniform").filter(|d| d.glsl_type == "sampler2D") {
            Some(decl) => {
                let binding = match bindings.iter().position(|n| n == decl.name) {
                    Some(i) => i,
                    None => {
                        bindings.push(decl.name.to_string());
                        bindings.len() - 1
                    }
                };
                out.push_str(&format!(
                    "layout(set = 2, binding = {binding}) uniform sampler2D {};\n",
                    decl.name
                ));
            }
            None => out.push_str(line),
        }
    }
    out
}

fn rewrite_uniform_block(
    source: &str,
    stage: ShaderStage,
) -> Result<(String, StructLayout), TranspileError> {
    let lines: Vec<&str> = source.split_inclusive('\n').collect();
    let mut decl_lines = Vec::new();
    let mut declared: Vec<DeclaredField> = Vec::new();
    for (i, line) in lines.iter().enumerate() {
        let Some(decl) = parse_declaration(line, "uniform") else {
            continue;
        };
        if decl.glsl_type == "sampler2D" || declared.iter().any(|d| d.name == decl.name) {
            if decl.glsl_type != "sampler2D" {
                decl_lines.push(i);
            }
            continue;
        }
        decl_lines.push(i);
        declared.push(DeclaredField {
            name: decl.name,
            glsl_type: decl.glsl_type,
            array_size: decl.array_size,
        });
    }

    let layout = StructLayout::compute(declared.iter().cloned())
        .map_err(|source| TranspileError::UnsupportedUniform { stage, source })?;

    let Some(&first) = decl_lines.first() else {
        return Ok((source.to_string(), layout));
    };

    let mut block = format!(
        "layout(std140, set = {}, binding = 0) uniform uniforms_t {{\n",
        stage.uniform_set()
    );
    for field in &layout.fields {
        block.push_str(&format!("    {} {};\n", field.ty, field.name));
    }
    block.push_str("};\n\n");

    let mut out = String::with_capacity(source.len() + block.len());
    for (i, line) in lines.iter().enumerate() {
        if i == first {
            out.push_str(&block);
        } else if !decl_lines.contains(&i) {
            out.push_str(line);
        }
    }
    Ok((scan::collapse_blank_lines(&out), layout))
}

fn describe_uniforms(layout: &StructLayout, notes: &StageAnnotations) -> Vec<UniformDescriptor> {
    layout
        .fields
        .iter()
        .map(|field| {
            let note = notes.uniforms.get(&field.name);
            UniformDescriptor {
                name: field.name.clone(),
                constant_name: note
                    .and_then(|n| n.material.clone())
                    .unwrap_or_else(|| UniformDescriptor::derived_constant_name(&field.name)),
                glsl_type: field.ty,
                array_size: None,
                default: note.and_then(|n| n.default.clone()),
            }
        })
        .collect()
}

fn rewrite_frag_color(source: &str) -> String {
    let replaced = scan::replace_identifier(source, "gl_FragColor", "f_color");
    if replaced == source {
        return replaced;
    }
    scan::insert_after_prologue(&replaced, "layout(location = 0) out vec4 f_color;")
}
