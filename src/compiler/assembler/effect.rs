//! Effect chains: ping-pong scheduling and per-pass slot resolution.

use crate::compiler::diagnostics::WarningKind;
use crate::compiler::error::ResolutionError;
use crate::compiler::pool::fbo_generation;
use crate::compiler::session::CompileSession;
use crate::scene::{EffectFile, EffectInstance, Material, MaterialPass};

use super::textures::{Sentinel, sentinel};
use super::types::{RenderTarget, TextureSource};
use super::{ObjectBuild, ObjectFrame, PendingPass, SceneCompiler};

/// The object's two alternating intermediate buffers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PingPong {
    slots: [RenderTarget; 2],
    read: usize,
    rotations: usize,
}

impl PingPong {
    /// The first write goes to `a`.
    pub fn new(a: RenderTarget, b: RenderTarget) -> Self {
        Self {
            slots: [a, b],
            read: 1,
            rotations: 0,
        }
    }

    /// Buffer holding the object's latest image.
    pub fn read_target(&self) -> RenderTarget {
        self.slots[self.read]
    }

    pub fn write_target(&self) -> RenderTarget {
        self.slots[1 - self.read]
    }

    pub fn read_source(&self) -> TextureSource {
        TextureSource::from_target(self.read_target()).unwrap_or(TextureSource::FullFrame)
    }

    pub fn rotate(&mut self) {
        self.read = 1 - self.read;
        self.rotations += 1;
    }

    pub fn rotations(&self) -> usize {
        self.rotations
    }
}

/// Named FBOs of one effect, resolved to pooled buffers.
struct EffectBuffers<'a> {
    effect: &'a EffectFile,
    targets: Vec<RenderTarget>,
}

impl EffectBuffers<'_> {
    fn target(&self, name: &str) -> Option<RenderTarget> {
        self.effect.fbo_index(name).map(|i| self.targets[i])
    }

    fn source(&self, name: &str) -> Option<TextureSource> {
        self.target(name).and_then(TextureSource::from_target)
    }
}

fn sentinel_source(
    kind: Sentinel,
    name: &str,
    buffers: &EffectBuffers<'_>,
    read: TextureSource,
) -> TextureSource {
    match kind {
        Sentinel::FullFrame => TextureSource::FullFrame,
        Sentinel::PreviousImage => read,
        Sentinel::ComposeBuffer => buffers.source(name).unwrap_or(read),
    }
}

fn effect_label(instance: &EffectInstance, effect: &EffectFile) -> String {
    instance
        .name
        .clone()
        .or_else(|| (!effect.name.is_empty()).then(|| effect.name.clone()))
        .unwrap_or_else(|| instance.file.clone())
}

impl SceneCompiler {
    /// Append the passes of one effect instance to `out`.
    ///
    /// `pingpong` and `out` are scratch copies; the caller only keeps them
    /// when this returns `Ok`.
    pub(super) fn assemble_effect(
        &self,
        session: &mut CompileSession,
        frame: &ObjectFrame,
        instance: &EffectInstance,
        pingpong: &mut PingPong,
        out: &mut ObjectBuild,
    ) -> Result<(), ResolutionError> {
        let effect: EffectFile = self.load_document(&instance.file, EffectFile::parse)?;
        let label = effect_label(instance, &effect);

        for command in &effect.commands {
            session.diagnostics.warn(
                WarningKind::IgnoredCommand,
                format!(
                    "effect '{label}': '{}' {} -> {} after pass {} is not supported",
                    command.command, command.source, command.target, command.after_pass
                ),
            );
        }

        let targets = effect
            .fbos
            .iter()
            .enumerate()
            .map(|(i, fbo)| {
                if let Some(format) = &fbo.format {
                    log::debug!("effect '{label}' fbo {} asks for {format}; using the intermediate format", fbo.name);
                }
                self.alloc_buffer(session, frame, fbo.scale, fbo_generation(i))
            })
            .collect();
        let buffers = EffectBuffers {
            effect: &effect,
            targets,
        };

        for (index, pass) in effect.passes.iter().enumerate() {
            let mut overrides = pass.overrides.clone();
            if let Some(instance_pass) = instance.passes.get(index) {
                overrides.update_from(instance_pass);
            }
            let mut material: Material = self.load_document(&pass.material, Material::parse)?;
            material.merge_pass(&overrides);

            let bound_flags: Vec<bool> = material.textures.iter().map(Option::is_some).collect();
            let shader_id = self.compile_shader(
                session,
                &mut out.shaders,
                &material.shader,
                &bound_flags,
                &material.combos,
            )?;

            let target = match &overrides.target {
                Some(name) => buffers
                    .target(name)
                    .ok_or_else(|| ResolutionError::UnknownTarget {
                        target: name.clone(),
                    })?,
                None => pingpong.write_target(),
            };
            let written = TextureSource::from_target(target);
            let read = pingpong.read_source();

            let defaults: Vec<Option<String>> = out
                .shader(shader_id)
                .map(|s| s.shader.samplers.iter().map(|s| s.default_texture.clone()).collect())
                .unwrap_or_default();

            let mut bindings = Vec::with_capacity(defaults.len());
            for (slot, default) in defaults.iter().enumerate() {
                let source = self.resolve_slot(
                    session,
                    &buffers,
                    &material,
                    &overrides,
                    slot,
                    default.as_deref(),
                    read,
                )?;
                if Some(source) == written {
                    session.diagnostics.warn(
                        WarningKind::IgnoredBinding,
                        format!("effect '{label}' pass {index} slot {slot} samples its own target; reading the previous image instead"),
                    );
                    bindings.push(read);
                } else {
                    bindings.push(source);
                }
            }

            out.passes.push(PendingPass {
                shader_id,
                target,
                bindings,
                constants: material.constants,
            });
            if overrides.target.is_none() {
                pingpong.rotate();
            }
        }
        log::debug!(
            "object {} effect '{label}': {} passes, {} fbos",
            frame.object_id,
            effect.passes.len(),
            effect.fbos.len()
        );
        Ok(())
    }

    /// Explicit texture, then `bind` entry, then the sampler's default
    /// texture, then the previous image.
    #[allow(clippy::too_many_arguments)]
    fn resolve_slot(
        &self,
        session: &mut CompileSession,
        buffers: &EffectBuffers<'_>,
        material: &Material,
        overrides: &MaterialPass,
        slot: usize,
        default_texture: Option<&str>,
        read: TextureSource,
    ) -> Result<TextureSource, ResolutionError> {
        if let Some(Some(name)) = material.textures.get(slot) {
            if let Some(kind) = sentinel(name) {
                return Ok(sentinel_source(kind, name, buffers, read));
            }
            let id = self.import_named_texture(session, name)?;
            return Ok(TextureSource::Texture { id });
        }

        if let Some(bind) = overrides.bind_for_slot(slot) {
            if bind.name == "previous" {
                return Ok(read);
            }
            if let Some(source) = buffers.source(&bind.name) {
                return Ok(source);
            }
            session.diagnostics.warn(
                WarningKind::IgnoredBinding,
                format!("slot {slot} binds unknown buffer '{}'", bind.name),
            );
        }

        if let Some(name) = default_texture {
            if let Some(kind) = sentinel(name) {
                return Ok(sentinel_source(kind, name, buffers, read));
            }
            match self.import_named_texture(session, name) {
                Ok(id) => return Ok(TextureSource::Texture { id }),
                Err(err) => session.diagnostics.warn(
                    WarningKind::MissingDefaultTexture,
                    format!("slot {slot} default '{name}' unavailable ({err}); reading the previous image"),
                ),
            }
        }

        Ok(read)
    }
}
