//! Material texture names: engine sentinels and imported images.

use std::io::Cursor;

use anyhow::{Context, Result, bail};
use serde_json::Value;

use crate::asset_store::{AssetError, AssetSource};
use crate::scene::lenient;

pub const FULL_FRAME_BUFFER: &str = "_rt_FullFrameBuffer";
pub const IMAGE_LAYER_COMPOSITE_PREFIX: &str = "_rt_imageLayerComposite_";
pub const FULL_COMPO_BUFFER_PREFIX: &str = "_rt_FullCompoBuffer";

const IMAGE_EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];

/// Texture names the engine resolves to its own buffers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sentinel {
    /// Everything composited so far.
    FullFrame,
    /// The image produced by the object's previous pass.
    PreviousImage,
    /// An effect compose buffer; falls back to the previous image when the
    /// effect declares no FBO of that name.
    ComposeBuffer,
}

pub fn sentinel(name: &str) -> Option<Sentinel> {
    if name == FULL_FRAME_BUFFER {
        Some(Sentinel::FullFrame)
    } else if name.starts_with(IMAGE_LAYER_COMPOSITE_PREFIX) {
        Some(Sentinel::PreviousImage)
    } else if name.starts_with(FULL_COMPO_BUFFER_PREFIX) {
        Some(Sentinel::ComposeBuffer)
    } else {
        None
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportedTexture {
    pub width: u32,
    pub height: u32,
    pub clamp_uvs: bool,
    pub no_interpolation: bool,
    pub source_path: String,
}

/// Turns a material texture name into pixel data the runtime can load.
pub trait TextureImporter {
    fn import_texture(&self, name: &str) -> Result<ImportedTexture>;
}

/// Reads `materials/<name>.png|jpg|jpeg` for its dimensions, plus an
/// optional `materials/<name>.tex-json` carrying sampler flags.
#[derive(Debug, Clone)]
pub struct ImageTextureImporter<S> {
    assets: S,
}

impl<S: AssetSource> ImageTextureImporter<S> {
    pub fn new(assets: S) -> Self {
        Self { assets }
    }

    fn find_image(&self, name: &str) -> Result<(String, Vec<u8>)> {
        for ext in IMAGE_EXTENSIONS {
            let path = format!("materials/{name}.{ext}");
            match self.assets.get_asset_bytes(&path) {
                Ok(bytes) => return Ok((path, bytes)),
                Err(AssetError::NotFound { .. }) => continue,
                Err(e) => return Err(e.into()),
            }
        }
        bail!("no materials/{name}.png, .jpg or .jpeg in the package");
    }

    fn sampler_flags(&self, name: &str) -> Result<(bool, bool)> {
        let path = format!("materials/{name}.tex-json");
        let bytes = match self.assets.get_asset_bytes(&path) {
            Ok(bytes) => bytes,
            Err(AssetError::NotFound { .. }) => return Ok((false, false)),
            Err(e) => return Err(e.into()),
        };
        let root: Value =
            serde_json::from_slice(&bytes).with_context(|| format!("failed to parse {path}"))?;
        let obj = lenient::as_object(&root, "texture settings")?;
        Ok((
            lenient::parse_bool(obj, "clampuvs").unwrap_or(false),
            lenient::parse_bool(obj, "nointerpolation").unwrap_or(false),
        ))
    }
}

impl<S: AssetSource> TextureImporter for ImageTextureImporter<S> {
    fn import_texture(&self, name: &str) -> Result<ImportedTexture> {
        let (source_path, bytes) = self.find_image(name)?;
        let (width, height) = image::ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()
            .with_context(|| format!("failed to sniff {source_path}"))?
            .into_dimensions()
            .with_context(|| format!("failed to read dimensions of {source_path}"))?;
        let (clamp_uvs, no_interpolation) = self.sampler_flags(name)?;
        Ok(ImportedTexture {
            width,
            height,
            clamp_uvs,
            no_interpolation,
            source_path,
        })
    }
}
