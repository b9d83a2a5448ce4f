//! Material documents, per-pass overrides and model documents.

use std::collections::BTreeMap;

use anyhow::{Context, Result, anyhow, bail};
use serde_json::{Map, Value};

use super::lenient;

/// First pass of a `materials/*.json` document.
#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    pub shader: String,
    pub blending: String,
    /// `None` entries are holes (`null` in the document).
    pub textures: Vec<Option<String>>,
    pub combos: BTreeMap<String, i32>,
    pub constants: BTreeMap<String, Vec<f32>>,
}

/// One `bind` entry: sampler `index` reads buffer `name`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindEntry {
    pub name: String,
    pub index: usize,
}

/// Per-pass data found in effect files and in scene effect instances.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MaterialPass {
    pub textures: Vec<Option<String>>,
    pub combos: BTreeMap<String, i32>,
    pub constants: BTreeMap<String, Vec<f32>>,
    pub target: Option<String>,
    pub bind: Vec<BindEntry>,
}

fn parse_textures(obj: &Map<String, Value>) -> Result<Vec<Option<String>>> {
    let Some(v) = lenient::field(obj, "textures") else {
        return Ok(Vec::new());
    };
    let items = v
        .as_array()
        .ok_or_else(|| anyhow!("textures is not an array"))?;
    Ok(items
        .iter()
        .map(|item| lenient::as_string(item).ok().filter(|s| !s.is_empty()))
        .collect())
}

fn parse_combos(obj: &Map<String, Value>) -> Result<BTreeMap<String, i32>> {
    let mut out = BTreeMap::new();
    let Some(v) = lenient::field(obj, "combos") else {
        return Ok(out);
    };
    for (name, value) in lenient::as_object(v, "combos")? {
        let parsed = match lenient::unwrap_value(value) {
            Value::String(s) if s.trim().is_empty() => 0,
            _ => lenient::as_i32(value).with_context(|| format!("combos[{name}]"))?,
        };
        out.insert(name.clone(), parsed);
    }
    Ok(out)
}

fn parse_constants(obj: &Map<String, Value>) -> Result<BTreeMap<String, Vec<f32>>> {
    let mut out = BTreeMap::new();
    let Some(v) = lenient::field(obj, "constantshadervalues") else {
        return Ok(out);
    };
    for (name, value) in lenient::as_object(v, "constantshadervalues")? {
        let values =
            lenient::float_slice(value).with_context(|| format!("constantshadervalues[{name}]"))?;
        out.insert(name.clone(), values);
    }
    Ok(out)
}

fn parse_bind(obj: &Map<String, Value>) -> Result<Vec<BindEntry>> {
    let Some(v) = lenient::field(obj, "bind") else {
        return Ok(Vec::new());
    };
    let items = v.as_array().ok_or_else(|| anyhow!("bind is not an array"))?;
    let mut out: Vec<BindEntry> = Vec::with_capacity(items.len());
    for (i, item) in items.iter().enumerate() {
        let entry = lenient::as_object(item, "bind entry")?;
        let name = lenient::parse_str(entry, "name").unwrap_or_default();
        if name.trim().is_empty() {
            bail!("bind entry {i} has an empty name");
        }
        let index = lenient::parse_i32(entry, "index").unwrap_or(0);
        if index < 0 {
            bail!("bind entry '{name}' has a negative index");
        }
        out.push(BindEntry {
            name,
            index: index as usize,
        });
    }
    Ok(out)
}

/// Copy non-empty texture names of `overrides` over `base`, growing it as needed.
fn overlay_textures(base: &mut Vec<Option<String>>, overrides: &[Option<String>]) {
    if overrides.len() > base.len() {
        base.resize(overrides.len(), None);
    }
    for (slot, name) in overrides.iter().enumerate() {
        if let Some(name) = name {
            base[slot] = Some(name.clone());
        }
    }
}

impl Material {
    pub fn parse(bytes: &[u8]) -> Result<Material> {
        let root: Value = serde_json::from_slice(bytes).context("material is not valid JSON")?;
        let root = lenient::as_object(&root, "material")?;
        let passes = lenient::field(root, "passes")
            .and_then(Value::as_array)
            .ok_or_else(|| anyhow!("material has no passes array"))?;
        let first = passes
            .first()
            .ok_or_else(|| anyhow!("material has an empty passes array"))?;
        let pass = lenient::as_object(first, "material pass")?;

        let shader = lenient::parse_str(pass, "shader")
            .filter(|s| !s.is_empty())
            .ok_or_else(|| anyhow!("material pass has no shader"))?;

        Ok(Material {
            shader,
            blending: lenient::parse_str(pass, "blending").unwrap_or_else(|| "translucent".into()),
            textures: parse_textures(pass)?,
            combos: parse_combos(pass)?,
            constants: parse_constants(pass)?,
        })
    }

    /// Apply an effect-pass or instance override onto the material.
    pub fn merge_pass(&mut self, pass: &MaterialPass) {
        overlay_textures(&mut self.textures, &pass.textures);
        self.combos
            .extend(pass.combos.iter().map(|(k, v)| (k.clone(), *v)));
        self.constants
            .extend(pass.constants.iter().map(|(k, v)| (k.clone(), v.clone())));
    }
}

impl MaterialPass {
    pub fn from_value(v: &Value) -> Result<MaterialPass> {
        let obj = lenient::as_object(v, "material pass")?;
        Ok(MaterialPass {
            textures: parse_textures(obj)?,
            combos: parse_combos(obj)?,
            constants: parse_constants(obj)?,
            target: lenient::parse_str(obj, "target").filter(|s| !s.is_empty()),
            bind: parse_bind(obj)?,
        })
    }

    /// Layer `other` over `self`; later values win, holes keep ours.
    pub fn update_from(&mut self, other: &MaterialPass) {
        overlay_textures(&mut self.textures, &other.textures);
        self.combos
            .extend(other.combos.iter().map(|(k, v)| (k.clone(), *v)));
        self.constants
            .extend(other.constants.iter().map(|(k, v)| (k.clone(), v.clone())));
        if other.target.is_some() {
            self.target = other.target.clone();
        }
        if !other.bind.is_empty() {
            self.bind = other.bind.clone();
        }
    }

    pub fn bind_for_slot(&self, slot: usize) -> Option<&BindEntry> {
        self.bind.iter().find(|b| b.index == slot)
    }
}

/// `models/*.json`: what an image object draws.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelDocument {
    pub material: String,
    pub fullscreen: bool,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

impl ModelDocument {
    pub fn parse(bytes: &[u8]) -> Result<ModelDocument> {
        let root: Value = serde_json::from_slice(bytes).context("model is not valid JSON")?;
        let obj = lenient::as_object(&root, "model")?;
        let material = lenient::parse_str(obj, "material")
            .filter(|s| !s.is_empty())
            .ok_or_else(|| anyhow!("model has no material"))?;
        let dim = |key: &str| lenient::parse_i32(obj, key).filter(|v| *v > 0).map(|v| v as u32);
        Ok(ModelDocument {
            material,
            fullscreen: lenient::parse_bool(obj, "fullscreen").unwrap_or(false),
            width: dim("width"),
            height: dim("height"),
        })
    }

    pub fn size(&self) -> Option<[u32; 2]> {
        Some([self.width?, self.height?])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_material_with_defaults_and_holes() {
        let doc = br#"{"passes":[{"shader":"genericimage2","textures":["bg",null,"util/noise"],
            "combos":{"TINT":"1","EMPTY":""},"constantshadervalues":{"alpha":{"value":"0.5"},"scroll":"1 2"}}]}"#;
        let m = Material::parse(doc).unwrap();
        assert_eq!(m.shader, "genericimage2");
        assert_eq!(m.blending, "translucent");
        assert_eq!(
            m.textures,
            vec![Some("bg".to_string()), None, Some("util/noise".to_string())]
        );
        assert_eq!(m.combos.get("TINT"), Some(&1));
        assert_eq!(m.combos.get("EMPTY"), Some(&0));
        assert_eq!(m.constants["alpha"], vec![0.5]);
        assert_eq!(m.constants["scroll"], vec![1.0, 2.0]);
    }

    #[test]
    fn material_without_shader_is_rejected() {
        let err = Material::parse(br#"{"passes":[{"blending":"additive"}]}"#).unwrap_err();
        assert!(format!("{err:#}").contains("no shader"));
        assert!(Material::parse(br#"{"passes":[]}"#).is_err());
    }

    #[test]
    fn merge_pass_overlays_non_empty_textures() {
        let mut m = Material::parse(br#"{"passes":[{"shader":"s","textures":["a","b"]}]}"#).unwrap();
        let pass = MaterialPass::from_value(&json!({
            "textures": [null, "mask", "extra"],
            "combos": {"MODE": 2},
            "constantshadervalues": {"speed": 3}
        }))
        .unwrap();
        m.merge_pass(&pass);
        assert_eq!(
            m.textures,
            vec![
                Some("a".to_string()),
                Some("mask".to_string()),
                Some("extra".to_string())
            ]
        );
        assert_eq!(m.combos["MODE"], 2);
        assert_eq!(m.constants["speed"], vec![3.0]);
    }

    #[test]
    fn update_from_replaces_target_and_bind() {
        let mut base = MaterialPass::from_value(&json!({
            "target": "_rt_HalfBuffer",
            "bind": [{"name": "previous", "index": 0}]
        }))
        .unwrap();
        let other = MaterialPass::from_value(&json!({
            "bind": [{"name": "_rt_HalfBuffer", "index": 1}]
        }))
        .unwrap();
        base.update_from(&other);
        assert_eq!(base.target.as_deref(), Some("_rt_HalfBuffer"));
        assert_eq!(base.bind.len(), 1);
        assert_eq!(base.bind_for_slot(1).unwrap().name, "_rt_HalfBuffer");
        assert!(base.bind_for_slot(0).is_none());
    }

    #[test]
    fn bind_entry_needs_a_name() {
        assert!(MaterialPass::from_value(&json!({"bind": [{"index": 0}]})).is_err());
    }

    #[test]
    fn parses_model_document() {
        let m = ModelDocument::parse(br#"{"material":"materials/bg.json","width":"1920","height":1080}"#).unwrap();
        assert_eq!(m.size(), Some([1920, 1080]));
        assert!(!m.fullscreen);

        let m = ModelDocument::parse(br#"{"material":"materials/fs.json","fullscreen":true}"#).unwrap();
        assert!(m.fullscreen);
        assert_eq!(m.size(), None);
        assert!(ModelDocument::parse(br#"{"fullscreen":true}"#).is_err());
    }

    #[test]
    fn render_state_keys_are_accepted_and_ignored() {
        let m = ModelDocument::parse(
            br#"{"material":"materials/bg.json","nopadding":true,"puppet":"models/bg.mdl","width":64,"height":32}"#,
        )
        .unwrap();
        assert_eq!(
            m,
            ModelDocument {
                material: "materials/bg.json".to_string(),
                fullscreen: false,
                width: Some(64),
                height: Some(32),
            }
        );

        let mat = Material::parse(
            br#"{"passes":[{"shader":"genericimage2","blending":"additive","cullmode":"normal","depthtest":"enabled","depthwrite":"enabled"}]}"#,
        )
        .unwrap();
        assert_eq!(
            mat,
            Material {
                shader: "genericimage2".to_string(),
                blending: "additive".to_string(),
                textures: Vec::new(),
                combos: BTreeMap::new(),
                constants: BTreeMap::new(),
            }
        );
    }
}
