//! Render-pass graph assembly: one scene in, one flat pass program out.
//!
//! Per visible image object the assembler resolves model and material,
//! draws the base image into a ping-pong buffer, runs every effect pass on
//! top of it and finally redirects the last pass onto the compositing
//! surface. Objects and effects that fail to resolve are skipped with a
//! warning; the scene compile itself never fails.

pub mod blend;
pub mod effect;
pub mod textures;
pub mod types;

use std::collections::BTreeMap;

use anyhow::Result as AnyResult;

use crate::asset_store::AssetSource;
use crate::compiler::diagnostics::WarningKind;
use crate::compiler::dispatch::{
    DispatchContext, MatrixMode, ObjectUniforms, SlotSize, uniform_setup,
};
use crate::compiler::error::{ResolutionError, error_chain};
use crate::compiler::pool::{
    LocalBufferKey, PING, PONG, ScreenBufferKey, scaled_local_size, screen_scale,
};
use crate::compiler::session::CompileSession;
use crate::compiler::shader::{ShaderSource, ShaderStage, ShaderTranspiler};
use crate::scene::{
    DEFAULT_PROJECTION, ImageObject, Material, ModelDocument, Scene, SceneObject,
};

use blend::blend_mode_for_material;
use effect::PingPong;
use textures::{TextureImporter, sentinel};
use types::{
    BlendMode, ColorFormat, CompiledScene, ObjectTransform, RenderPassDescriptor, RenderTarget,
    ShaderDescriptor, TextureBinding, TextureSource,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompileOptions {
    /// Format of ping-pong buffers and effect FBOs.
    pub intermediate_format: ColorFormat,
    /// Format of the compositing surface.
    pub presentation_format: ColorFormat,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            intermediate_format: ColorFormat::Rgba8Unorm,
            presentation_format: ColorFormat::Swapchain,
        }
    }
}

/// A pass whose uniforms are not set up yet; the terminal redirect decides
/// which matrices it gets.
struct PendingPass {
    shader_id: usize,
    target: RenderTarget,
    bindings: Vec<TextureSource>,
    constants: BTreeMap<String, Vec<f32>>,
}

/// Shaders and passes of one object (or one effect) before commit.
#[derive(Default)]
struct ObjectBuild {
    shaders: Vec<ShaderDescriptor>,
    passes: Vec<PendingPass>,
}

impl ObjectBuild {
    fn shader(&self, id: usize) -> Option<&ShaderDescriptor> {
        self.shaders.iter().find(|s| s.id == id)
    }

    fn append(&mut self, other: ObjectBuild) {
        self.shaders.extend(other.shaders);
        self.passes.extend(other.passes);
    }
}

/// Per-object facts shared by all of its passes.
struct ObjectFrame {
    object_id: usize,
    size: [u32; 2],
    fullscreen: bool,
}

pub struct SceneCompiler {
    assets: Box<dyn AssetSource>,
    importer: Box<dyn TextureImporter>,
    transpiler: ShaderTranspiler,
    options: CompileOptions,
}

/// Pixel size of an image object: the model's, else the object's, else
/// twice its origin (objects are usually centred on their own size).
fn object_size(image: &ImageObject, model: &ModelDocument) -> [u32; 2] {
    if let Some(size) = model.size() {
        return size;
    }
    let [w, h] = image
        .size
        .unwrap_or([image.origin[0] * 2.0, image.origin[1] * 2.0]);
    [(w.round() as u32).max(1), (h.round() as u32).max(1)]
}

impl SceneCompiler {
    pub fn new(
        assets: Box<dyn AssetSource>,
        importer: Box<dyn TextureImporter>,
        transpiler: ShaderTranspiler,
    ) -> Self {
        Self {
            assets,
            importer,
            transpiler,
            options: CompileOptions::default(),
        }
    }

    pub fn with_options(mut self, options: CompileOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &CompileOptions {
        &self.options
    }

    pub fn compile(&self, scene: &Scene) -> CompiledScene {
        let mut session = CompileSession::new();
        for object in &scene.objects {
            match object {
                SceneObject::Image(image) => self.compile_image(&mut session, image),
                other => log::debug!("object '{}' is not an image; skipped", other.name()),
            }
        }
        log::info!(
            "compiled {} passes, {} shaders, {} textures ({} warnings)",
            session.passes().len(),
            session.shader_count(),
            session.texture_count(),
            session.diagnostics.len()
        );
        let projection = scene.general.projection.unwrap_or(DEFAULT_PROJECTION);
        session.finish(scene.general.clear_color, projection)
    }

    fn compile_image(&self, session: &mut CompileSession, image: &ImageObject) {
        if !image.visible {
            log::debug!("object {} '{}' is hidden; skipped", image.id, image.name);
            return;
        }
        let object_id = session.next_object_id();
        match self.assemble_object(session, object_id, image) {
            Ok((shaders, passes)) => {
                session.commit(shaders, passes);
                session.compositing_cleared = true;
            }
            Err(err) => session.diagnostics.warn(
                WarningKind::SkippedObject,
                format!("object {} '{}': {}", image.id, image.name, error_chain(&err)),
            ),
        }
    }

    fn assemble_object(
        &self,
        session: &mut CompileSession,
        object_id: usize,
        image: &ImageObject,
    ) -> Result<(Vec<ShaderDescriptor>, Vec<RenderPassDescriptor>), ResolutionError> {
        let model: ModelDocument = self.load_document(&image.model, ModelDocument::parse)?;
        let material: Material = self.load_document(&model.material, Material::parse)?;
        let frame = ObjectFrame {
            object_id,
            size: object_size(image, &model),
            fullscreen: model.fullscreen,
        };

        let mut pingpong = PingPong::new(
            self.alloc_buffer(session, &frame, 1.0, PING),
            self.alloc_buffer(session, &frame, 1.0, PONG),
        );
        let mut build = ObjectBuild::default();

        let mut imported = Vec::new();
        for name in material.textures.iter().flatten() {
            if sentinel(name).is_some() {
                continue;
            }
            let id = self.import_named_texture(session, name)?;
            imported.push(TextureSource::Texture { id });
        }

        let shader_id = self.compile_shader(
            session,
            &mut build.shaders,
            &material.shader,
            &[],
            &material.combos,
        )?;
        let sampler_count = build.shader(shader_id).map_or(0, |s| s.shader.samplers.len());
        let mut bindings = if imported.is_empty() || image.passthrough {
            vec![TextureSource::FullFrame]
        } else {
            imported
        };
        bindings.resize(sampler_count, TextureSource::FullFrame);
        build.passes.push(PendingPass {
            shader_id,
            target: pingpong.write_target(),
            bindings,
            constants: material.constants.clone(),
        });
        pingpong.rotate();

        for instance in &image.effects {
            if !instance.visible {
                log::debug!("object {object_id}: effect {} is hidden; skipped", instance.file);
                continue;
            }
            let mut scratch_pingpong = pingpong;
            let mut scratch = ObjectBuild::default();
            match self.assemble_effect(session, &frame, instance, &mut scratch_pingpong, &mut scratch) {
                Ok(()) => {
                    pingpong = scratch_pingpong;
                    build.append(scratch);
                }
                Err(err) => session.diagnostics.warn(
                    WarningKind::SkippedEffect,
                    format!(
                        "object {} '{}' effect {}: {}",
                        image.id,
                        image.name,
                        instance.file,
                        error_chain(&err)
                    ),
                ),
            }
        }
        log::debug!(
            "object {object_id} '{}': {} passes after {} rotations",
            image.name,
            build.passes.len(),
            pingpong.rotations()
        );

        let blend_mode = blend_mode_for_material(&material.blending).unwrap_or_else(|| {
            session.diagnostics.warn(
                WarningKind::UnrecognizedBlendMode,
                format!("object {} '{}': blending '{}' treated as translucent", image.id, image.name, material.blending),
            );
            BlendMode::Alpha
        });
        let transform = ObjectTransform {
            origin: image.origin,
            size: [frame.size[0] as f32, frame.size[1] as f32],
            scale: image.scale,
            parallax_depth: image.parallax_depth,
        };
        let object = ObjectUniforms {
            color: image.color,
            alpha: image.alpha,
            brightness: image.brightness,
        };

        let terminal = build.passes.len() - 1;
        let mut passes = Vec::with_capacity(build.passes.len());
        for (pass_id, pending) in build.passes.iter().enumerate() {
            let is_terminal = pass_id == terminal;
            let shader = build.shader(pending.shader_id).ok_or_else(|| {
                ResolutionError::InvalidDocument {
                    path: material.shader.clone(),
                    reason: format!("shader {} vanished during assembly", pending.shader_id),
                }
            })?;
            let slot_sizes: Vec<SlotSize> =
                pending.bindings.iter().map(|b| self.slot_size(session, *b)).collect();
            let ctx = DispatchContext {
                matrices: if is_terminal && !frame.fullscreen {
                    MatrixMode::Engine
                } else {
                    MatrixMode::Identity
                },
                object,
                slot_sizes: &slot_sizes,
                constants: &pending.constants,
            };
            let uniform_setup = uniform_setup(&shader.shader, &ctx, &mut session.diagnostics);
            let texture_bindings = pending
                .bindings
                .iter()
                .enumerate()
                .map(|(slot, source)| TextureBinding {
                    slot,
                    source: *source,
                })
                .collect();

            passes.push(if is_terminal {
                RenderPassDescriptor {
                    object_id,
                    pass_id,
                    shader_id: pending.shader_id,
                    color_target: RenderTarget::Compositing,
                    color_target_format: self.options.presentation_format,
                    clear_color: !session.compositing_cleared,
                    blend_mode,
                    texture_bindings,
                    uniform_setup,
                    transform: Some(transform),
                }
            } else {
                RenderPassDescriptor {
                    object_id,
                    pass_id,
                    shader_id: pending.shader_id,
                    color_target: pending.target,
                    color_target_format: self.options.intermediate_format,
                    clear_color: true,
                    blend_mode: BlendMode::None,
                    texture_bindings,
                    uniform_setup,
                    transform: None,
                }
            });
        }
        Ok((build.shaders, passes))
    }

    fn load_document<T>(
        &self,
        path: &str,
        parse: fn(&[u8]) -> AnyResult<T>,
    ) -> Result<T, ResolutionError> {
        let bytes = self
            .assets
            .get_asset_bytes(path)
            .map_err(|source| ResolutionError::MissingAsset {
                path: path.to_string(),
                source,
            })?;
        parse(&bytes).map_err(|err| ResolutionError::invalid(path, err))
    }

    fn load_shader_source(&self, name: &str) -> Result<ShaderSource, ResolutionError> {
        let stage_text = |stage: ShaderStage| {
            let path = format!("shaders/{name}.{}", stage.extension());
            self.assets
                .get_asset_text(&path)
                .map_err(|source| ResolutionError::MissingAsset { path, source })
        };
        Ok(ShaderSource {
            name: name.to_string(),
            vertex: stage_text(ShaderStage::Vertex)?,
            fragment: stage_text(ShaderStage::Fragment)?,
        })
    }

    /// Transpile `name` into a new shader; every request gets a fresh id.
    fn compile_shader(
        &self,
        session: &mut CompileSession,
        shaders: &mut Vec<ShaderDescriptor>,
        name: &str,
        bound_flags: &[bool],
        combos: &BTreeMap<String, i32>,
    ) -> Result<usize, ResolutionError> {
        let source = self.load_shader_source(name)?;
        let shader = self
            .transpiler
            .transpile(&source, bound_flags, combos, &mut session.diagnostics)
            .map_err(|source| ResolutionError::Shader {
                shader: name.to_string(),
                source,
            })?;
        let id = session.next_shader_id();
        shaders.push(ShaderDescriptor {
            id,
            name: name.to_string(),
            shader,
        });
        Ok(id)
    }

    fn import_named_texture(
        &self,
        session: &mut CompileSession,
        name: &str,
    ) -> Result<usize, ResolutionError> {
        if let Some(id) = session.texture_id(name) {
            return Ok(id);
        }
        let imported = self
            .importer
            .import_texture(name)
            .map_err(|err| ResolutionError::TextureImport {
                name: name.to_string(),
                reason: format!("{err:#}"),
            })?;
        Ok(session.register_texture(name, imported))
    }

    /// Pooled buffer for `frame`; `scale` divides the object (or screen) size.
    fn alloc_buffer(
        &self,
        session: &mut CompileSession,
        frame: &ObjectFrame,
        scale: f32,
        generation: u32,
    ) -> RenderTarget {
        if frame.fullscreen {
            let s = screen_scale(scale);
            let index = session.pools.screen_slot(ScreenBufferKey {
                scale_x: s,
                scale_y: s,
                generation,
            });
            RenderTarget::ScreenBuffer { index }
        } else {
            let [width, height] = scaled_local_size(frame.size, scale);
            let index = session.pools.local_slot(LocalBufferKey {
                width,
                height,
                generation,
            });
            RenderTarget::LocalBuffer { index }
        }
    }

    fn slot_size(&self, session: &CompileSession, source: TextureSource) -> SlotSize {
        let full = SlotSize::ScreenScaled {
            scale_x: 1.0,
            scale_y: 1.0,
        };
        match source {
            TextureSource::Texture { id } => session.texture(id).map_or(full, |t| SlotSize::Fixed {
                width: t.width,
                height: t.height,
            }),
            TextureSource::LocalBuffer { index } => {
                session.pools.local.get(index).map_or(full, |k| SlotSize::Fixed {
                    width: k.width,
                    height: k.height,
                })
            }
            TextureSource::ScreenBuffer { index } => {
                session.pools.screen.get(index).map_or(full, |k| SlotSize::ScreenScaled {
                    scale_x: k.scale_x,
                    scale_y: k.scale_y,
                })
            }
            TextureSource::FullFrame => full,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset_store::AssetStore;
    use crate::compiler::shader::PassThroughPreprocessor;
    use crate::scene::parse_scene;
    use anyhow::bail;
    use textures::ImportedTexture;

    const VERT: &str = r#"
uniform mat4 g_ModelViewProjectionMatrix;
attribute vec3 a_Position;
attribute vec2 a_TexCoord;
varying vec2 v_TexCoord;
void main() {
    gl_Position = mul(vec4(a_Position, 1.0), g_ModelViewProjectionMatrix);
    v_TexCoord = a_TexCoord;
}
"#;

    const IMAGE_FRAG: &str = r#"
varying vec2 v_TexCoord;
uniform sampler2D g_Texture0;
uniform float g_Alpha;
void main() {
    gl_FragColor = texSample2D(g_Texture0, v_TexCoord) * g_Alpha;
}
"#;

    struct StubImporter;

    impl TextureImporter for StubImporter {
        fn import_texture(&self, name: &str) -> AnyResult<ImportedTexture> {
            if name.starts_with("missing") {
                bail!("no such texture");
            }
            Ok(ImportedTexture {
                width: 256,
                height: 128,
                clamp_uvs: false,
                no_interpolation: false,
                source_path: format!("materials/{name}.png"),
            })
        }
    }

    fn store() -> AssetStore {
        let store = AssetStore::new();
        store.insert("shaders/genericimage2.vert", VERT);
        store.insert("shaders/genericimage2.frag", IMAGE_FRAG);
        store.insert(
            "materials/bg.json",
            r#"{"passes":[{"shader":"genericimage2","textures":["bg"],"blending":"additive"}]}"#,
        );
        store.insert(
            "models/bg.json",
            r#"{"material":"materials/bg.json","width":640,"height":480}"#,
        );
        store
    }

    fn compiler(store: AssetStore) -> SceneCompiler {
        SceneCompiler::new(
            Box::new(store),
            Box::new(StubImporter),
            ShaderTranspiler::new(Box::new(PassThroughPreprocessor)),
        )
    }

    #[test]
    fn single_object_draws_straight_to_the_surface() {
        let scene = parse_scene(
            br#"{"objects":[{"id":1,"name":"bg","image":"models/bg.json","origin":"320 240 0"}]}"#,
        )
        .unwrap();
        let out = compiler(store()).compile(&scene);

        assert_eq!(out.passes.len(), 1);
        let pass = &out.passes[0];
        assert_eq!(pass.color_target, RenderTarget::Compositing);
        assert_eq!(pass.color_target_format, ColorFormat::Swapchain);
        assert!(pass.clear_color);
        assert_eq!(pass.blend_mode, BlendMode::Add);
        assert_eq!(pass.texture_bindings.len(), 1);
        assert_eq!(pass.texture_bindings[0].source, TextureSource::Texture { id: 0 });
        assert_eq!(pass.transform.map(|t| t.size), Some([640.0, 480.0]));
        assert_eq!(out.buffer_pools.local.len(), 2);
        assert!(out.diagnostics.is_empty(), "{:?}", out.diagnostics);
    }

    #[test]
    fn object_size_falls_back_to_origin() {
        let model = ModelDocument::parse(br#"{"material":"m.json"}"#).unwrap();
        let scene = parse_scene(
            br#"{"objects":[{"id":1,"image":"models/x.json","origin":"100.4 50 0"}]}"#,
        )
        .unwrap();
        let image = scene.image_objects().next().unwrap();
        assert_eq!(object_size(image, &model), [201, 100]);
    }

    #[test]
    fn missing_model_skips_object_without_passes() {
        let scene = parse_scene(
            br#"{"objects":[{"id":3,"name":"ghost","image":"models/none.json"},
                            {"id":4,"name":"bg","image":"models/bg.json"}]}"#,
        )
        .unwrap();
        let out = compiler(store()).compile(&scene);
        assert_eq!(out.diagnostics.count(WarningKind::SkippedObject), 1);
        assert_eq!(out.passes.len(), 1);
        assert_eq!(out.passes[0].object_id, 1);
        assert!(out.passes[0].clear_color);
    }

    #[test]
    fn unknown_blending_falls_back_to_alpha() {
        let store = store();
        store.insert_or_replace(
            "materials/bg.json",
            r#"{"passes":[{"shader":"genericimage2","textures":["bg"],"blending":"multiply"}]}"#,
        );
        let scene =
            parse_scene(br#"{"objects":[{"id":1,"image":"models/bg.json"}]}"#).unwrap();
        let out = compiler(store).compile(&scene);
        assert_eq!(out.passes[0].blend_mode, BlendMode::Alpha);
        assert_eq!(out.diagnostics.count(WarningKind::UnrecognizedBlendMode), 1);
    }
}
