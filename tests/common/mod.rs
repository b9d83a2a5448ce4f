#![allow(dead_code)]

use anyhow::{Result, bail};
use wallpaper_pass_compiler::asset_store::AssetStore;
use wallpaper_pass_compiler::compiler::assembler::textures::{ImportedTexture, TextureImporter};
use wallpaper_pass_compiler::compiler::shader::{PassThroughPreprocessor, ShaderTranspiler};
use wallpaper_pass_compiler::compiler::{CompiledScene, RenderTarget, SceneCompiler};
use wallpaper_pass_compiler::scene::parse_scene;

pub const VERT: &str = r#"
uniform mat4 g_ModelViewProjectionMatrix;
attribute vec3 a_Position;
attribute vec2 a_TexCoord;
varying vec2 v_TexCoord;
void main() {
    gl_Position = mul(vec4(a_Position, 1.0), g_ModelViewProjectionMatrix);
    v_TexCoord = a_TexCoord;
}
"#;

pub const IMAGE_FRAG: &str = r#"
varying vec2 v_TexCoord;
uniform sampler2D g_Texture0;
uniform float g_Alpha;
void main() {
    gl_FragColor = texSample2D(g_Texture0, v_TexCoord) * g_Alpha;
}
"#;

pub const TINT_FRAG: &str = r#"
// [COMBO] {"material":"Mode","combo":"MODE","default":0}
varying vec2 v_TexCoord;
uniform sampler2D g_Texture0; // {"hidden":true}
uniform sampler2D g_Texture1; // {"combo":"MASK","default":"util/white"}
uniform float g_Strength; // {"material":"strength","default":0.5}
uniform vec4 g_Texture0Resolution;
void main() {
    vec4 base = texSample2D(g_Texture0, v_TexCoord);
    gl_FragColor = base * texSample2D(g_Texture1, v_TexCoord).r * g_Strength;
}
"#;

pub const COPY_FRAG: &str = r#"
varying vec2 v_TexCoord;
uniform sampler2D g_Texture0;
void main() {
    gl_FragColor = texSample2D(g_Texture0, v_TexCoord);
}
"#;

pub const MYSTERY_FRAG: &str = r#"
varying vec2 v_TexCoord;
uniform sampler2D g_Texture0;
uniform sampler2D g_Texture1; // {"default":"missing/noise"}
uniform float g_Mystery;
void main() {
    gl_FragColor = texSample2D(g_Texture0, v_TexCoord) * g_Mystery;
}
"#;

/// Imports anything except names starting with `missing`.
pub struct StubImporter;

impl TextureImporter for StubImporter {
    fn import_texture(&self, name: &str) -> Result<ImportedTexture> {
        if name.starts_with("missing") {
            bail!("'{name}' is not in the package");
        }
        Ok(ImportedTexture {
            width: 64,
            height: 32,
            clamp_uvs: false,
            no_interpolation: false,
            source_path: format!("materials/{name}.png"),
        })
    }
}

/// A small package: one image model, a fullscreen model and a handful of effects.
pub fn package() -> AssetStore {
    let store = AssetStore::new();
    for (name, frag) in [
        ("genericimage2", IMAGE_FRAG),
        ("effect_tint", TINT_FRAG),
        ("effect_copy", COPY_FRAG),
        ("effect_mystery", MYSTERY_FRAG),
    ] {
        store.insert(format!("shaders/{name}.vert"), VERT);
        store.insert(format!("shaders/{name}.frag"), frag);
    }

    store.insert(
        "models/bg.json",
        r#"{"material":"materials/bg.json","width":640,"height":480}"#,
    );
    store.insert(
        "models/fullscreen.json",
        r#"{"material":"materials/bg.json","fullscreen":true}"#,
    );
    store.insert(
        "models/broken.json",
        r#"{"material":"materials/broken.json"}"#,
    );
    store.insert(
        "materials/bg.json",
        r#"{"passes":[{"shader":"genericimage2","textures":["bg"]}]}"#,
    );
    store.insert(
        "materials/broken.json",
        r#"{"passes":[{"shader":"genericimage2","textures":["missing/bg"]}]}"#,
    );
    store.insert(
        "materials/effects/tint.json",
        r#"{"passes":[{"shader":"effect_tint","combos":{"MODE":1,"UNDECLARED":7}}]}"#,
    );
    store.insert(
        "materials/effects/copy.json",
        r#"{"passes":[{"shader":"effect_copy"}]}"#,
    );
    store.insert(
        "materials/effects/mystery.json",
        r#"{"passes":[{"shader":"effect_mystery"}]}"#,
    );

    store.insert(
        "effects/tint/effect.json",
        r#"{"name":"tint","passes":[{"material":"materials/effects/tint.json"}]}"#,
    );
    store.insert(
        "effects/half/effect.json",
        r#"{"name":"half",
            "fbos":[{"name":"_rt_HalfCompoBuffer1","scale":2,"format":"rgba8888"}],
            "passes":[
                {"material":"materials/effects/copy.json","target":"_rt_HalfCompoBuffer1"},
                {"material":"materials/effects/tint.json","bind":[{"name":"_rt_HalfCompoBuffer1","index":0}]}
            ]}"#,
    );
    store.insert(
        "effects/selfbind/effect.json",
        r#"{"name":"selfbind",
            "fbos":[{"name":"scratch"}],
            "passes":[
                {"material":"materials/effects/copy.json","target":"scratch","bind":[{"name":"scratch","index":0}]},
                {"material":"materials/effects/copy.json","bind":[{"name":"scratch","index":0}]}
            ]}"#,
    );
    store.insert(
        "effects/badtarget/effect.json",
        r#"{"name":"badtarget","passes":[{"material":"materials/effects/copy.json","target":"nowhere"}]}"#,
    );
    store.insert(
        "effects/commands/effect.json",
        r#"{"name":"commands","passes":[
            {"material":"materials/effects/copy.json"},
            {"command":"copy","target":"_rt_FullCompoBuffer2","source":"previous"}
        ]}"#,
    );
    store.insert(
        "effects/mystery/effect.json",
        r#"{"name":"mystery","passes":[{"material":"materials/effects/mystery.json"}]}"#,
    );
    store
}

pub fn compiler(store: AssetStore) -> SceneCompiler {
    SceneCompiler::new(
        Box::new(store),
        Box::new(StubImporter),
        ShaderTranspiler::new(Box::new(PassThroughPreprocessor)),
    )
}

pub fn compile(scene_json: &str) -> CompiledScene {
    let scene = parse_scene(scene_json.as_bytes()).expect("scene parses");
    compiler(package()).compile(&scene)
}

/// `scene.json` with one image object per `(model, effects)` entry.
pub fn scene_with(objects: &[(&str, &[&str])]) -> String {
    let objects: Vec<String> = objects
        .iter()
        .enumerate()
        .map(|(i, (model, effects))| {
            let effects: Vec<String> = effects
                .iter()
                .map(|e| format!(r#"{{"file":"effects/{e}/effect.json"}}"#))
                .collect();
            format!(
                r#"{{"id":{},"name":"layer{}","image":"models/{model}.json","origin":"320 240 0","effects":[{}]}}"#,
                i + 1,
                i + 1,
                effects.join(",")
            )
        })
        .collect();
    format!(r#"{{"objects":[{}]}}"#, objects.join(","))
}

pub fn local(index: usize) -> RenderTarget {
    RenderTarget::LocalBuffer { index }
}
