mod common;

use common::{compile, local, scene_with};
use wallpaper_pass_compiler::compiler::{
    BlendMode, ColorFormat, RenderTarget, TextureSource, WarningKind,
};

#[test]
fn ping_pong_alternates_across_effect_passes() {
    let out = compile(&scene_with(&[("bg", &["tint", "tint"])]));
    let targets: Vec<RenderTarget> = out.passes.iter().map(|p| p.color_target).collect();
    assert_eq!(targets, vec![local(0), local(1), RenderTarget::Compositing]);

    assert_eq!(out.passes[1].texture_bindings[0].source, TextureSource::LocalBuffer { index: 0 });
    assert_eq!(out.passes[2].texture_bindings[0].source, TextureSource::LocalBuffer { index: 1 });
    assert_eq!(out.passes[0].color_target_format, ColorFormat::Rgba8Unorm);
    assert_eq!(out.passes[0].blend_mode, BlendMode::None);
    assert_eq!(out.passes[2].color_target_format, ColorFormat::Swapchain);
    assert_eq!(out.passes[2].blend_mode, BlendMode::Alpha);

    let ids: Vec<usize> = out.passes.iter().map(|p| p.pass_id).collect();
    assert_eq!(ids, vec![0, 1, 2]);
    assert_eq!(out.buffer_pools.local.len(), 2);
}

#[test]
fn fbo_writes_do_not_rotate_the_pair() {
    let out = compile(&scene_with(&[("bg", &["half", "tint"])]));
    let targets: Vec<RenderTarget> = out.passes.iter().map(|p| p.color_target).collect();
    // base -> A, copy -> half FBO, tint -> B, tint -> surface
    assert_eq!(
        targets,
        vec![local(0), local(2), local(1), RenderTarget::Compositing]
    );
    assert_eq!(out.buffer_pools.local[2].width, 320);
    assert_eq!(out.buffer_pools.local[2].height, 240);
    assert_eq!(out.buffer_pools.local[2].generation, 2);

    // copy reads the base image, the tint pass reads the FBO through its bind entry
    assert_eq!(out.passes[1].texture_bindings[0].source, TextureSource::LocalBuffer { index: 0 });
    assert_eq!(out.passes[2].texture_bindings[0].source, TextureSource::LocalBuffer { index: 2 });
    // the final tint reads what the previous tint wrote
    assert_eq!(out.passes[3].texture_bindings[0].source, TextureSource::LocalBuffer { index: 1 });
}

#[test]
fn bindings_match_sampler_count_and_fall_back_to_defaults() {
    let out = compile(&scene_with(&[("bg", &["tint", "half", "mystery"])]));
    for pass in &out.passes {
        let shader = out.shader(pass.shader_id).expect("pass shader is emitted");
        assert_eq!(
            pass.texture_bindings.len(),
            shader.shader.samplers.len(),
            "pass {} of shader {}",
            pass.pass_id,
            shader.name
        );
    }

    // tint slot 1 uses the sampler default texture
    let white = out.textures.iter().find(|t| t.name == "util/white").expect("default imported");
    assert_eq!(out.passes[1].texture_bindings[1].source, TextureSource::Texture { id: white.id });

    // mystery slot 1 default cannot be imported; it reads the previous image instead
    let last = out.passes.last().unwrap();
    assert_eq!(out.diagnostics.count(WarningKind::MissingDefaultTexture), 1);
    assert_eq!(last.texture_bindings[1].source, last.texture_bindings[0].source);
}

#[test]
fn a_pass_never_samples_its_own_target() {
    let out = compile(&scene_with(&[("bg", &["selfbind"])]));
    assert_eq!(out.diagnostics.count(WarningKind::IgnoredBinding), 1);
    for pass in &out.passes {
        let own = match pass.color_target {
            RenderTarget::LocalBuffer { index } => Some(TextureSource::LocalBuffer { index }),
            RenderTarget::ScreenBuffer { index } => Some(TextureSource::ScreenBuffer { index }),
            RenderTarget::Compositing => None,
        };
        assert!(
            pass.texture_bindings.iter().all(|b| Some(b.source) != own),
            "pass {} samples its own target",
            pass.pass_id
        );
    }
    // the FBO pass got the base image instead of itself
    assert_eq!(out.passes[1].texture_bindings[0].source, TextureSource::LocalBuffer { index: 0 });
    // and the following pass reads the FBO as asked
    assert_eq!(out.passes[2].texture_bindings[0].source, TextureSource::LocalBuffer { index: 2 });
}

#[test]
fn failed_effect_leaves_no_trace() {
    let out = compile(&scene_with(&[("bg", &["tint", "badtarget", "tint"])]));
    assert_eq!(out.diagnostics.count(WarningKind::SkippedEffect), 1);
    assert!(out.diagnostics.warnings().iter().any(|w| w.message.contains("nowhere")));

    let targets: Vec<RenderTarget> = out.passes.iter().map(|p| p.color_target).collect();
    assert_eq!(targets, vec![local(0), local(1), RenderTarget::Compositing]);
    assert_eq!(out.passes[2].texture_bindings[0].source, TextureSource::LocalBuffer { index: 1 });
    for pass in &out.passes {
        assert!(out.shader(pass.shader_id).is_some());
    }
    assert_eq!(out.shaders.len(), 3);
}

#[test]
fn commands_are_reported_and_skipped() {
    let out = compile(&scene_with(&[("bg", &["commands"])]));
    assert_eq!(out.diagnostics.count(WarningKind::IgnoredCommand), 1);
    assert_eq!(out.passes.len(), 2);
}

#[test]
fn fullscreen_objects_use_screen_buffers_and_identity_matrices() {
    let out = compile(&scene_with(&[("fullscreen", &["half"])]));
    assert_eq!(out.buffer_pools.local.len(), 0);
    assert_eq!(out.buffer_pools.screen.len(), 3);
    assert_eq!(out.buffer_pools.screen[2].scale_x, 0.5);
    assert_eq!(out.passes[0].color_target, RenderTarget::ScreenBuffer { index: 0 });
    assert_eq!(out.passes[1].color_target, RenderTarget::ScreenBuffer { index: 2 });

    let terminal = out.passes.last().unwrap();
    let mvp = terminal
        .uniform_setup
        .iter()
        .find(|u| u.name == "g_ModelViewProjectionMatrix")
        .unwrap();
    let json = serde_json::to_value(mvp).unwrap();
    assert_eq!(json["source"], "identity");
}
