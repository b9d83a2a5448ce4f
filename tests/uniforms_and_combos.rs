mod common;

use common::{compile, scene_with};
use serde_json::json;
use wallpaper_pass_compiler::compiler::WarningKind;

fn uniform(
    out: &wallpaper_pass_compiler::compiler::CompiledScene,
    pass: usize,
    name: &str,
) -> Option<serde_json::Value> {
    out.passes[pass]
        .uniform_setup
        .iter()
        .find(|u| u.name == name)
        .map(|u| serde_json::to_value(u).unwrap())
}

#[test]
fn material_combos_only_override_declared_combos() {
    let out = compile(&scene_with(&[("bg", &["tint"])]));
    let tint = out.shader(out.passes[1].shader_id).unwrap();
    assert_eq!(tint.shader.combos.get("MODE"), Some(&1));
    assert!(!tint.shader.combos.contains_key("UNDECLARED"));
    // no explicit texture in slot 1, so the mask combo stays off
    assert!(!tint.shader.combos.contains_key("MASK"));
}

#[test]
fn instance_textures_activate_sampler_combos() {
    let out = compile(
        r#"{"objects":[{"id":1,"name":"bg","image":"models/bg.json","effects":[
            {"file":"effects/tint/effect.json","passes":[
                {"textures":[null,"masks/edge"],"combos":{"MODE":3},"constantshadervalues":{"strength":"2"}}
            ]}
        ]}]}"#,
    );
    let tint = out.shader(out.passes[1].shader_id).unwrap();
    assert_eq!(tint.shader.combos.get("MASK"), Some(&1));
    assert_eq!(tint.shader.combos.get("MODE"), Some(&3));

    let mask = out.textures.iter().find(|t| t.name == "masks/edge").unwrap();
    let binding = serde_json::to_value(out.passes[1].texture_bindings[1]).unwrap();
    assert_eq!(binding["source"], json!({"kind": "texture", "id": mask.id}));

    let strength = uniform(&out, 1, "g_Strength").unwrap();
    assert_eq!(strength["source"], "constant");
    assert_eq!(strength["constant"], "strength");
    assert_eq!(strength["name"], "g_Strength");
    assert_eq!(strength["values"], json!([2.0]));
}

#[test]
fn uniforms_fall_back_to_defaults_then_warn() {
    let out = compile(&scene_with(&[("bg", &["tint", "mystery"])]));

    let strength = uniform(&out, 1, "g_Strength").unwrap();
    assert_eq!(strength["source"], "default");
    assert_eq!(strength["values"], json!([0.5]));

    assert!(uniform(&out, 2, "g_Mystery").is_none());
    assert_eq!(out.diagnostics.count(WarningKind::UnrecognizedUniform), 1);
    assert!(
        out.diagnostics
            .warnings()
            .iter()
            .any(|w| w.kind == WarningKind::UnrecognizedUniform && w.message.contains("g_Mystery"))
    );
}

#[test]
fn texture_resolution_reports_the_bound_buffer() {
    let out = compile(&scene_with(&[("bg", &["tint"])]));
    let res = uniform(&out, 1, "g_Texture0Resolution").unwrap();
    assert_eq!(res["source"], "texture_resolution");
    assert_eq!(res["slot"], 0);
    assert_eq!(res["size"], json!({"kind": "fixed", "width": 640, "height": 480}));
}

#[test]
fn terminal_pass_gets_engine_matrices_and_buffers_get_identity() {
    let out = compile(&scene_with(&[("bg", &["tint"])]));
    let base = uniform(&out, 0, "g_ModelViewProjectionMatrix").unwrap();
    let terminal = uniform(&out, 1, "g_ModelViewProjectionMatrix").unwrap();
    assert_eq!(base["source"], "identity");
    assert_eq!(terminal["source"], "model_view_projection_matrix");
    assert_eq!(terminal["stage"], "vertex");
}
