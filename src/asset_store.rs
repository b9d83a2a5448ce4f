use std::collections::HashMap;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AssetError {
    #[error("asset '{path}' not found")]
    NotFound { path: String },
    #[error("failed to read asset '{path}' at {}", file.display())]
    Read {
        path: String,
        file: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Read access to package assets by their package-relative path.
pub trait AssetSource {
    fn get_asset_bytes(&self, path: &str) -> Result<Vec<u8>, AssetError>;

    fn get_asset_text(&self, path: &str) -> Result<String, AssetError> {
        let bytes = self.get_asset_bytes(path)?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

/// Thread-safe, clone-friendly asset map with an optional on-disk fallback.
///
/// Lookups try the virtual map first (as `path`, `assets/path` and
/// `/assets/path`, matching how packages store built-in assets), then the
/// same spellings under the disk root.
#[derive(Debug, Clone, Default)]
pub struct AssetStore {
    inner: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    root: Option<PathBuf>,
}

fn candidates(path: &str) -> [String; 3] {
    let path = path.trim_start_matches("./");
    [
        path.to_string(),
        format!("assets/{path}"),
        format!("/assets/{path}"),
    ]
}

impl AssetStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store that also reads from files under `root`.
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            inner: Arc::default(),
            root: Some(root.into()),
        }
    }

    pub fn root(&self) -> Option<&Path> {
        self.root.as_deref()
    }

    /// Insert an asset. If `path` already exists this is a no-op.
    pub fn insert(&self, path: impl Into<String>, bytes: impl Into<Vec<u8>>) {
        let Ok(mut map) = self.inner.lock() else {
            return;
        };
        map.entry(path.into()).or_insert_with(|| bytes.into());
    }

    /// Insert or replace an asset unconditionally.
    pub fn insert_or_replace(&self, path: impl Into<String>, bytes: impl Into<Vec<u8>>) {
        let Ok(mut map) = self.inner.lock() else {
            return;
        };
        map.insert(path.into(), bytes.into());
    }

    /// Check the virtual map without cloning bytes.
    pub fn contains(&self, path: &str) -> bool {
        self.inner
            .lock()
            .ok()
            .is_some_and(|map| candidates(path).iter().any(|c| map.contains_key(c)))
    }

    pub fn len(&self) -> usize {
        self.inner.lock().map(|map| map.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn get_virtual(&self, path: &str) -> Option<Vec<u8>> {
        let map = self.inner.lock().ok()?;
        candidates(path).iter().find_map(|c| map.get(c).cloned())
    }

    fn get_disk(&self, path: &str) -> Result<Option<Vec<u8>>, AssetError> {
        let Some(root) = &self.root else {
            return Ok(None);
        };
        let path = path.trim_start_matches("./");
        for file in [root.join(path), root.join("assets").join(path)] {
            match std::fs::read(&file) {
                Ok(bytes) => return Ok(Some(bytes)),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(source) => {
                    return Err(AssetError::Read {
                        path: path.to_string(),
                        file,
                        source,
                    });
                }
            }
        }
        Ok(None)
    }
}

impl AssetSource for AssetStore {
    fn get_asset_bytes(&self, path: &str) -> Result<Vec<u8>, AssetError> {
        if let Some(bytes) = self.get_virtual(path) {
            return Ok(bytes);
        }
        self.get_disk(path)?.ok_or_else(|| AssetError::NotFound {
            path: path.to_string(),
        })
    }
}

// ---------------------------------------------------------------------------
// Convenience loaders
// ---------------------------------------------------------------------------

/// Load every file of a zipped wallpaper package into a new `AssetStore`.
///
/// `fallback_root` is consulted for assets the package does not carry (the
/// shared `shaders/`, `materials/` and `effects/` of the application).
pub fn load_from_zip(zip_path: &Path, fallback_root: Option<&Path>) -> Result<AssetStore> {
    let file = std::fs::File::open(zip_path)
        .with_context(|| format!("failed to open package at {}", zip_path.display()))?;
    let mut archive = zip::ZipArchive::new(file)
        .with_context(|| format!("failed to read zip archive {}", zip_path.display()))?;

    let store = match fallback_root {
        Some(root) => AssetStore::with_root(root),
        None => AssetStore::new(),
    };
    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .with_context(|| format!("failed to read entry #{i} of {}", zip_path.display()))?;
        if entry.is_dir() {
            continue;
        }
        let name = entry.name().trim_start_matches("./").to_string();
        let mut bytes = Vec::with_capacity(entry.size() as usize);
        entry
            .read_to_end(&mut bytes)
            .with_context(|| format!("failed to read '{name}' from archive"))?;
        store.insert(name, bytes);
    }
    log::info!("loaded {} assets from {}", store.len(), zip_path.display());
    Ok(store)
}
