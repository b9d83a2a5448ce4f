//! Trailing-comment JSON annotations of the legacy shader dialect.
//!
//! ```text
//! uniform float g_Speed; // {"material":"speed","default":1}
//! uniform sampler2D g_Texture1; // {"combo":"MASK","default":"util/white"}
//! // [COMBO] {"combo":"BLENDMODE","default":2}
//! ```

use std::collections::BTreeMap;

use serde_json::{Map, Value};

use crate::compiler::diagnostics::{Diagnostics, WarningKind};
use crate::compiler::shader::ShaderStage;
use crate::compiler::shader::scan::parse_declaration;
use crate::scene::lenient;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct UniformAnnotation {
    pub material: Option<String>,
    pub default: Option<Vec<f32>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SamplerAnnotation {
    pub name: String,
    pub combo: Option<String>,
    pub default_texture: Option<String>,
}

/// Everything the annotation pass extracts from one stage.
#[derive(Debug, Clone, Default)]
pub struct StageAnnotations {
    pub uniforms: BTreeMap<String, UniformAnnotation>,
    pub samplers: Vec<SamplerAnnotation>,
    pub combos: BTreeMap<String, i32>,
}

impl StageAnnotations {
    pub fn sampler(&self, name: &str) -> Option<&SamplerAnnotation> {
        self.samplers.iter().find(|s| s.name == name)
    }
}

fn parse_json_object(
    text: &str,
    what: &str,
    stage: ShaderStage,
    diagnostics: &mut Diagnostics,
) -> Option<Map<String, Value>> {
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(obj)) => Some(obj),
        Ok(_) => {
            diagnostics.warn(
                WarningKind::MalformedAnnotation,
                format!("{stage} annotation for {what} is not a JSON object"),
            );
            None
        }
        Err(e) => {
            diagnostics.warn(
                WarningKind::MalformedAnnotation,
                format!("{stage} annotation for {what}: {e}"),
            );
            None
        }
    }
}

fn non_empty(s: Option<String>) -> Option<String> {
    s.filter(|s| !s.is_empty())
}

pub fn extract(source: &str, stage: ShaderStage, diagnostics: &mut Diagnostics) -> StageAnnotations {
    let mut out = StageAnnotations::default();

    for line in source.lines() {
        let trimmed = line.trim_start();

        if let Some(rest) = trimmed.strip_prefix("//") {
            let rest = rest.trim_start();
            if let Some(json) = rest.strip_prefix("[COMBO]") {
                extract_combo(json.trim(), stage, diagnostics, &mut out.combos);
            }
            continue;
        }

        let Some(decl) = parse_declaration(line, "uniform") else {
            continue;
        };

        if decl.glsl_type == "sampler2D" {
            let meta = decl
                .comment
                .filter(|c| c.starts_with('{'))
                .and_then(|c| parse_json_object(c, decl.name, stage, diagnostics));
            let (combo, default_texture) = match &meta {
                Some(obj) => (
                    non_empty(lenient::parse_str(obj, "combo")),
                    non_empty(lenient::parse_str(obj, "default")),
                ),
                None => (None, None),
            };
            out.samplers.push(SamplerAnnotation {
                name: decl.name.to_string(),
                combo,
                default_texture,
            });
            continue;
        }

        let Some(comment) = decl.comment.filter(|c| c.starts_with('{')) else {
            continue;
        };
        let Some(obj) = parse_json_object(comment, decl.name, stage, diagnostics) else {
            continue;
        };

        let material = non_empty(lenient::parse_str(&obj, "material"));
        let default = match lenient::field(&obj, "default") {
            Some(v) => match lenient::float_slice(v) {
                Ok(values) => Some(values),
                Err(e) => {
                    diagnostics.warn(
                        WarningKind::MalformedAnnotation,
                        format!("{stage} default for {}: {e:#}", decl.name),
                    );
                    None
                }
            },
            None => None,
        };
        out.uniforms
            .insert(decl.name.to_string(), UniformAnnotation { material, default });
    }

    out
}

fn extract_combo(
    json: &str,
    stage: ShaderStage,
    diagnostics: &mut Diagnostics,
    combos: &mut BTreeMap<String, i32>,
) {
    let Some(obj) = parse_json_object(json, "[COMBO]", stage, diagnostics) else {
        return;
    };
    let Some(name) = non_empty(lenient::parse_str(&obj, "combo")) else {
        diagnostics.warn(
            WarningKind::MalformedAnnotation,
            format!("{stage} [COMBO] without a combo name: {json}"),
        );
        return;
    };
    let value = lenient::parse_i32(&obj, "default").unwrap_or(0);
    combos.insert(name, value);
}
