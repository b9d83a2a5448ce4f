use std::collections::HashMap;

use crate::compiler::assembler::textures::ImportedTexture;
use crate::compiler::assembler::types::{
    CompiledScene, RenderPassDescriptor, ShaderDescriptor, TextureDescriptor,
};
use crate::compiler::diagnostics::Diagnostics;
use crate::compiler::pool::BufferPools;

/// All mutable state of one scene compile.
///
/// Ids handed out here are never reused, even when the object or effect that
/// asked for them is later dropped.
#[derive(Debug, Default)]
pub struct CompileSession {
    next_object_id: usize,
    next_shader_id: usize,
    textures: Vec<TextureDescriptor>,
    texture_ids: HashMap<String, usize>,
    shaders: Vec<ShaderDescriptor>,
    passes: Vec<RenderPassDescriptor>,
    pub pools: BufferPools,
    /// Set once some object's terminal pass has cleared the compositing surface.
    pub compositing_cleared: bool,
    pub diagnostics: Diagnostics,
}

impl CompileSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_object_id(&mut self) -> usize {
        let id = self.next_object_id;
        self.next_object_id += 1;
        id
    }

    pub fn next_shader_id(&mut self) -> usize {
        let id = self.next_shader_id;
        self.next_shader_id += 1;
        id
    }

    pub fn texture_id(&self, name: &str) -> Option<usize> {
        self.texture_ids.get(name).copied()
    }

    pub fn texture(&self, id: usize) -> Option<&TextureDescriptor> {
        self.textures.get(id)
    }

    /// Register an imported texture under `name`; a name is registered once.
    pub fn register_texture(&mut self, name: &str, imported: ImportedTexture) -> usize {
        if let Some(id) = self.texture_id(name) {
            return id;
        }
        let id = self.textures.len();
        log::debug!(
            "texture {id} '{name}' {}x{} from {}",
            imported.width,
            imported.height,
            imported.source_path
        );
        self.textures.push(TextureDescriptor {
            id,
            name: name.to_string(),
            width: imported.width,
            height: imported.height,
            clamp_uvs: imported.clamp_uvs,
            no_interpolation: imported.no_interpolation,
            source_path: imported.source_path,
        });
        self.texture_ids.insert(name.to_string(), id);
        id
    }

    /// Append the work of one fully assembled object.
    pub fn commit(&mut self, shaders: Vec<ShaderDescriptor>, passes: Vec<RenderPassDescriptor>) {
        self.shaders.extend(shaders);
        self.passes.extend(passes);
    }

    pub fn texture_count(&self) -> usize {
        self.textures.len()
    }

    pub fn shader_count(&self) -> usize {
        self.shaders.len()
    }

    pub fn passes(&self) -> &[RenderPassDescriptor] {
        &self.passes
    }

    pub fn finish(self, clear_color: [f32; 3], projection: [u32; 2]) -> CompiledScene {
        CompiledScene {
            clear_color,
            projection,
            textures: self.textures,
            shaders: self.shaders,
            passes: self.passes,
            buffer_pools: self.pools,
            diagnostics: self.diagnostics,
        }
    }
}
