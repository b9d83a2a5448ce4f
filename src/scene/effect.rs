//! `effects/*/effect.json` documents.

use anyhow::{Context, Result, anyhow, bail};
use serde_json::Value;

use super::lenient;
use super::material::{BindEntry, MaterialPass};

/// FBO created by the implicit two-pass `compose` layout.
pub const COMPOSE_BUFFER: &str = "_rt_FullCompoBuffer1";

#[derive(Debug, Clone, PartialEq)]
pub struct EffectFbo {
    pub name: String,
    /// Divisor of the object's size.
    pub scale: f32,
    pub format: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EffectPass {
    /// Path of the pass material.
    pub material: String,
    pub overrides: MaterialPass,
}

/// A non-drawing pass entry (`copy`, `swap`, ...).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EffectCommand {
    pub command: String,
    pub target: String,
    pub source: String,
    /// Number of drawing passes declared before this command.
    pub after_pass: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EffectFile {
    pub name: String,
    pub fbos: Vec<EffectFbo>,
    pub passes: Vec<EffectPass>,
    pub commands: Vec<EffectCommand>,
}

impl EffectFile {
    pub fn parse(bytes: &[u8]) -> Result<EffectFile> {
        let root: Value = serde_json::from_slice(bytes).context("effect is not valid JSON")?;
        let root = lenient::as_object(&root, "effect")?;

        let name = lenient::parse_str(root, "name").unwrap_or_default();

        let mut fbos: Vec<EffectFbo> = Vec::new();
        if let Some(v) = lenient::field(root, "fbos") {
            let items = v.as_array().ok_or_else(|| anyhow!("fbos is not an array"))?;
            for item in items {
                let obj = lenient::as_object(item, "fbo")?;
                let fbo_name = lenient::parse_str(obj, "name")
                    .filter(|s| !s.trim().is_empty())
                    .ok_or_else(|| anyhow!("fbo has no name"))?;
                if fbos.iter().any(|f| f.name == fbo_name) {
                    bail!("duplicate fbo '{fbo_name}'");
                }
                fbos.push(EffectFbo {
                    name: fbo_name,
                    scale: lenient::parse_f32(obj, "scale").filter(|s| *s > 0.0).unwrap_or(1.0),
                    format: lenient::parse_str(obj, "format").filter(|s| !s.is_empty()),
                });
            }
        }

        let entries = lenient::field(root, "passes")
            .and_then(Value::as_array)
            .filter(|p| !p.is_empty())
            .ok_or_else(|| anyhow!("effect has no passes"))?;

        let mut passes = Vec::new();
        let mut commands = Vec::new();
        let mut compose = false;
        for (i, entry) in entries.iter().enumerate() {
            let obj = lenient::as_object(entry, "effect pass")?;
            let material = lenient::parse_str(obj, "material").filter(|s| !s.is_empty());
            let Some(material) = material else {
                let command = lenient::parse_str(obj, "command")
                    .filter(|s| !s.is_empty())
                    .ok_or_else(|| anyhow!("pass {i} has neither material nor command"))?;
                commands.push(EffectCommand {
                    command,
                    target: lenient::parse_str(obj, "target").unwrap_or_default(),
                    source: lenient::parse_str(obj, "source").unwrap_or_default(),
                    after_pass: passes.len(),
                });
                continue;
            };
            compose |= lenient::parse_bool(obj, "compose").unwrap_or(false);
            let overrides = MaterialPass::from_value(entry).with_context(|| format!("pass {i}"))?;
            passes.push(EffectPass {
                material,
                overrides,
            });
        }

        if compose {
            apply_compose_layout(&mut fbos, &mut passes)?;
        }

        Ok(EffectFile {
            name,
            fbos,
            passes,
            commands,
        })
    }

    pub fn fbo_index(&self, name: &str) -> Option<usize> {
        self.fbos.iter().position(|f| f.name == name)
    }
}

/// `compose: true`: pass 0 copies the previous image into a full-size FBO,
/// pass 1 reads it back.
fn apply_compose_layout(fbos: &mut Vec<EffectFbo>, passes: &mut [EffectPass]) -> Result<()> {
    let [first, second] = passes else {
        bail!("compose effects need exactly 2 passes, found {}", passes.len());
    };
    if !fbos.iter().any(|f| f.name == COMPOSE_BUFFER) {
        fbos.push(EffectFbo {
            name: COMPOSE_BUFFER.to_string(),
            scale: 1.0,
            format: None,
        });
    }
    first.overrides.bind.push(BindEntry {
        name: "previous".to_string(),
        index: 0,
    });
    first.overrides.target = Some(COMPOSE_BUFFER.to_string());
    second.overrides.bind.push(BindEntry {
        name: COMPOSE_BUFFER.to_string(),
        index: 0,
    });
    Ok(())
}
