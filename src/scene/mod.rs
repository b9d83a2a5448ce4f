//! The scene contract: `scene.json` plus the model, material and effect
//! documents it references.
//!
//! Only `scene.json` is parsed eagerly. Models, materials and effects are
//! resolved per object by the assembler so one broken reference skips one
//! object instead of the whole scene.

pub mod effect;
pub mod lenient;
pub mod material;

use anyhow::{Context, Result, anyhow};
use serde_json::{Map, Value};

use crate::asset_store::AssetSource;

pub use effect::{COMPOSE_BUFFER, EffectCommand, EffectFbo, EffectFile, EffectPass};
pub use material::{BindEntry, Material, MaterialPass, ModelDocument};

pub const DEFAULT_PROJECTION: [u32; 2] = [1920, 1080];

#[derive(Debug, Clone, PartialEq)]
pub struct General {
    pub clear_color: [f32; 3],
    /// Orthographic projection size; `None` when the scene asks for `auto`.
    pub projection: Option<[u32; 2]>,
    pub parallax: bool,
    pub parallax_amount: f32,
    pub parallax_mouse_influence: f32,
}

impl Default for General {
    fn default() -> Self {
        Self {
            clear_color: [0.0, 0.0, 0.0],
            projection: Some(DEFAULT_PROJECTION),
            parallax: false,
            parallax_amount: 0.0,
            parallax_mouse_influence: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EffectInstance {
    pub file: String,
    pub id: Option<String>,
    pub name: Option<String>,
    pub visible: bool,
    /// Per-pass overrides, applied in order onto the effect's passes.
    pub passes: Vec<MaterialPass>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImageObject {
    pub id: i32,
    pub name: String,
    pub visible: bool,
    /// Path of the model document.
    pub model: String,
    pub origin: [f32; 3],
    pub scale: [f32; 3],
    pub angles: [f32; 3],
    pub size: Option<[f32; 2]>,
    pub parallax_depth: [f32; 2],
    pub color: [f32; 3],
    pub alpha: f32,
    pub brightness: f32,
    pub passthrough: bool,
    pub effects: Vec<EffectInstance>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParticleObject {
    pub id: i32,
    pub name: String,
    pub particle: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SoundObject {
    pub id: i32,
    pub name: String,
    pub sounds: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LightObject {
    pub id: i32,
    pub name: String,
    pub light: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SceneObject {
    Image(ImageObject),
    Particle(ParticleObject),
    Sound(SoundObject),
    Light(LightObject),
}

impl SceneObject {
    pub fn name(&self) -> &str {
        match self {
            SceneObject::Image(o) => &o.name,
            SceneObject::Particle(o) => &o.name,
            SceneObject::Sound(o) => &o.name,
            SceneObject::Light(o) => &o.name,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Scene {
    pub general: General,
    pub objects: Vec<SceneObject>,
}

impl Scene {
    pub fn image_objects(&self) -> impl Iterator<Item = &ImageObject> + '_ {
        self.objects.iter().filter_map(|o| match o {
            SceneObject::Image(image) => Some(image),
            _ => None,
        })
    }
}

/// Accepts one component (splatted) or three.
fn parse_vec3(obj: &Map<String, Value>, key: &str, default: [f32; 3]) -> [f32; 3] {
    match lenient::field(obj, key).map(lenient::float_slice) {
        Some(Ok(v)) if v.len() == 1 => [v[0]; 3],
        Some(Ok(v)) if v.len() == 3 => [v[0], v[1], v[2]],
        _ => default,
    }
}

fn parse_general(v: Option<&Value>) -> Result<General> {
    let mut general = General::default();
    let Some(v) = v else {
        return Ok(general);
    };
    let obj = lenient::as_object(v, "general")?;
    general.clear_color = parse_vec3(obj, "clearcolor", general.clear_color);
    general.parallax = lenient::parse_bool(obj, "cameraparallax").unwrap_or(false);
    general.parallax_amount = lenient::parse_f32(obj, "cameraparallaxamount").unwrap_or(0.0);
    general.parallax_mouse_influence =
        lenient::parse_f32(obj, "cameraparallaxmouseinfluence").unwrap_or(0.0);

    if let Some(p) = obj.get("orthogonalprojection") {
        general.projection = match p {
            Value::Null => None,
            p => {
                let p = lenient::as_object(p, "orthogonalprojection")?;
                if lenient::parse_bool(p, "auto").unwrap_or(false) {
                    None
                } else {
                    let dim = |k: &str| lenient::parse_i32(p, k).filter(|v| *v > 0).map(|v| v as u32);
                    match (dim("width"), dim("height")) {
                        (Some(w), Some(h)) => Some([w, h]),
                        _ => Some(DEFAULT_PROJECTION),
                    }
                }
            }
        };
    }
    Ok(general)
}

fn parse_effect_instance(v: &Value) -> Result<EffectInstance> {
    let obj = lenient::as_object(v, "effect entry")?;
    let file = lenient::parse_str(obj, "file")
        .filter(|s| !s.is_empty())
        .ok_or_else(|| anyhow!("effect entry has no file"))?;
    let passes = match lenient::field(obj, "passes") {
        Some(Value::Array(items)) => items
            .iter()
            .enumerate()
            .map(|(i, p)| {
                MaterialPass::from_value(p).with_context(|| format!("override for pass {i} of {file}"))
            })
            .collect::<Result<Vec<_>>>()?,
        _ => Vec::new(),
    };
    Ok(EffectInstance {
        id: lenient::field(obj, "id").and_then(|v| match lenient::unwrap_value(v) {
            Value::Number(n) => Some(n.to_string()),
            other => lenient::as_string(other).ok().filter(|s| !s.is_empty()),
        }),
        name: lenient::parse_str(obj, "name").filter(|s| !s.trim().is_empty()),
        visible: lenient::parse_bool(obj, "visible").unwrap_or(true),
        passes,
        file,
    })
}

fn parse_image_object(obj: &Map<String, Value>, model: String) -> Result<ImageObject> {
    let effects = match lenient::field(obj, "effects") {
        Some(Value::Array(items)) => items
            .iter()
            .map(parse_effect_instance)
            .collect::<Result<Vec<_>>>()?,
        _ => Vec::new(),
    };
    let config = lenient::field(obj, "config").and_then(Value::as_object);
    Ok(ImageObject {
        id: lenient::parse_i32(obj, "id").unwrap_or(0),
        name: lenient::parse_str(obj, "name").unwrap_or_default(),
        visible: lenient::parse_bool(obj, "visible").unwrap_or(true),
        model,
        origin: parse_vec3(obj, "origin", [0.0; 3]),
        scale: parse_vec3(obj, "scale", [1.0; 3]),
        angles: parse_vec3(obj, "angles", [0.0; 3]),
        size: lenient::parse_vec::<2>(obj, "size").filter(|s| s[0] > 0.0 && s[1] > 0.0),
        parallax_depth: lenient::parse_vec::<2>(obj, "parallaxDepth").unwrap_or([0.0, 0.0]),
        color: parse_vec3(obj, "color", [1.0; 3]),
        alpha: lenient::parse_f32(obj, "alpha").unwrap_or(1.0),
        brightness: lenient::parse_f32(obj, "brightness").unwrap_or(1.0),
        passthrough: config
            .and_then(|c| lenient::parse_bool(c, "passthrough"))
            .unwrap_or(false),
        effects,
    })
}

fn parse_object(v: &Value) -> Result<Option<SceneObject>> {
    let obj = lenient::as_object(v, "object")?;
    let id = lenient::parse_i32(obj, "id").unwrap_or(0);
    let name = lenient::parse_str(obj, "name").unwrap_or_default();

    if let Some(particle) = lenient::parse_str(obj, "particle").filter(|s| !s.is_empty()) {
        return Ok(Some(SceneObject::Particle(ParticleObject { id, name, particle })));
    }
    if let Some(model) = lenient::parse_str(obj, "image").filter(|s| !s.is_empty()) {
        let image = parse_image_object(obj, model)
            .with_context(|| format!("image object {id} '{name}'"))?;
        return Ok(Some(SceneObject::Image(image)));
    }
    if let Some(sound) = lenient::field(obj, "sound") {
        let sounds = match lenient::unwrap_value(sound) {
            Value::Array(items) => items.iter().filter_map(|s| lenient::as_string(s).ok()).collect(),
            other => lenient::as_string(other).map(|s| vec![s]).unwrap_or_default(),
        };
        return Ok(Some(SceneObject::Sound(SoundObject { id, name, sounds })));
    }
    if let Some(light) = lenient::parse_str(obj, "light").filter(|s| !s.is_empty()) {
        return Ok(Some(SceneObject::Light(LightObject { id, name, light })));
    }
    Ok(None)
}

/// Parse `scene.json`; unknown object kinds are dropped.
pub fn parse_scene(bytes: &[u8]) -> Result<Scene> {
    let root: Value = serde_json::from_slice(bytes).context("failed to parse scene json")?;
    let root = lenient::as_object(&root, "scene")?;
    let general = parse_general(lenient::field(root, "general"))?;

    let mut objects = Vec::new();
    if let Some(items) = lenient::field(root, "objects") {
        let items = items
            .as_array()
            .ok_or_else(|| anyhow!("scene objects is not an array"))?;
        for (i, item) in items.iter().enumerate() {
            match parse_object(item).with_context(|| format!("scene object #{i}"))? {
                Some(object) => objects.push(object),
                None => log::debug!("scene object #{i} has no known kind; ignored"),
            }
        }
    }
    Ok(Scene { general, objects })
}

pub fn load_scene(assets: &dyn AssetSource, path: &str) -> Result<Scene> {
    let bytes = assets
        .get_asset_bytes(path)
        .with_context(|| format!("failed to read scene at {path}"))?;
    parse_scene(&bytes).with_context(|| format!("failed to parse {path}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCENE: &str = r#"{
        "camera": {"center": "0 0 -1", "eye": "0 0 0", "up": "0 1 0"},
        "general": {"clearcolor": "0.1 0.2 0.3", "orthogonalprojection": {"width": 2560, "height": 1440}},
        "objects": [
            {"id": 5, "name": "bg", "image": "models/bg.json", "origin": "1280 720 0",
             "scale": {"value": "2"}, "alpha": "0.5", "config": {"passthrough": true},
             "effects": [{"file": "effects/shake/effect.json", "id": 12, "visible": {"value": false},
                          "passes": [{"textures": [null, "masks/m1"], "constantshadervalues": {"speed": 2}}]}]},
            {"id": 6, "name": "dust", "particle": "particles/dust.json"},
            {"id": 7, "name": "rain", "sound": ["sounds/rain.mp3"]},
            {"id": 8, "name": "sun", "light": "point"},
            {"id": 9, "name": "group"}
        ]
    }"#;

    #[test]
    fn parses_objects_by_kind() {
        let scene = parse_scene(SCENE.as_bytes()).unwrap();
        assert_eq!(scene.general.clear_color, [0.1, 0.2, 0.3]);
        assert_eq!(scene.general.projection, Some([2560, 1440]));
        assert_eq!(scene.objects.len(), 4);
        assert!(matches!(scene.objects[1], SceneObject::Particle(_)));
        assert!(matches!(scene.objects[2], SceneObject::Sound(ref s) if s.sounds == vec!["sounds/rain.mp3".to_string()]));
        assert!(matches!(scene.objects[3], SceneObject::Light(_)));
        assert_eq!(scene.objects[3].name(), "sun");
    }

    #[test]
    fn parses_image_object_leniently() {
        let scene = parse_scene(SCENE.as_bytes()).unwrap();
        let bg = scene.image_objects().next().unwrap();
        assert_eq!(bg.id, 5);
        assert_eq!(bg.model, "models/bg.json");
        assert_eq!(bg.origin, [1280.0, 720.0, 0.0]);
        assert_eq!(bg.scale, [2.0, 2.0, 2.0]);
        assert_eq!(bg.alpha, 0.5);
        assert_eq!(bg.brightness, 1.0);
        assert_eq!(bg.color, [1.0, 1.0, 1.0]);
        assert!(bg.passthrough);
        assert!(bg.visible);
        assert_eq!(bg.size, None);

        let fx = &bg.effects[0];
        assert_eq!(fx.file, "effects/shake/effect.json");
        assert_eq!(fx.id.as_deref(), Some("12"));
        assert!(!fx.visible);
        assert_eq!(fx.passes[0].textures, vec![None, Some("masks/m1".to_string())]);
        assert_eq!(fx.passes[0].constants["speed"], vec![2.0]);
    }

    #[test]
    fn auto_projection_and_missing_general() {
        let scene = parse_scene(br#"{"general":{"orthogonalprojection":{"auto":true}}}"#).unwrap();
        assert_eq!(scene.general.projection, None);
        let scene = parse_scene(br#"{"objects":[]}"#).unwrap();
        assert_eq!(scene.general.projection, Some(DEFAULT_PROJECTION));
    }

    #[test]
    fn effect_without_file_fails_with_context() {
        let err = parse_scene(br#"{"objects":[{"id":1,"name":"x","image":"models/x.json","effects":[{"name":"e"}]}]}"#)
            .unwrap_err();
        let msg = format!("{err:#}");
        assert!(msg.contains("scene object #0"), "{msg}");
        assert!(msg.contains("no file"), "{msg}");
    }
}
