//! Asset providers: resolve a relative asset path to its bytes.

use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
};

use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ReadError {
    #[error("invalid asset path '{0}'")]
    InvalidPath(String),
    #[error("asset not found: '{0}'")]
    NotFound(String),
}

/// Capability to read a whole asset into memory.
pub trait AssetProvider {
    fn read_to_buffer(&self, path: &str) -> Result<Vec<u8>, ReadError>;
}

/// `true` if the path tries to climb out of the asset root.
fn escapes_root(path: &str) -> bool {
    path.contains("../") || path.contains("..\\") || path.ends_with("..")
}

fn check_path(path: &str) -> Result<(), ReadError> {
    if path.is_empty() || escapes_root(path) || Path::new(path).is_absolute() {
        return Err(ReadError::InvalidPath(path.to_owned()));
    }
    Ok(())
}

/// Reads assets from an ordered list of directories; the first hit wins.
#[derive(Clone, Debug, Default)]
pub struct FileAssets {
    roots: Vec<PathBuf>,
}

impl FileAssets {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        let mut assets = Self::new();
        assets.add_path(root);
        assets
    }

    /// Append a search directory. Earlier directories take precedence.
    pub fn add_path(&mut self, root: impl Into<PathBuf>) {
        let root = root.into();
        log::info!("Asset search path: {}", root.display());
        self.roots.push(root);
    }

    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }
}

impl AssetProvider for FileAssets {
    fn read_to_buffer(&self, path: &str) -> Result<Vec<u8>, ReadError> {
        check_path(path)?;
        for root in &self.roots {
            let full = root.join(path);
            match fs::read(&full) {
                Ok(bytes) => {
                    log::debug!("Read {} ({} bytes)", full.display(), bytes.len());
                    return Ok(bytes);
                }
                Err(e) => log::debug!("Skipping {}: {}", full.display(), e),
            }
        }
        Err(ReadError::NotFound(path.to_owned()))
    }
}

/// In-memory asset store, keyed by path.
#[derive(Clone, Debug, Default)]
pub struct MemoryAssets {
    files: HashMap<String, Vec<u8>>,
}

impl MemoryAssets {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: impl Into<String>, bytes: impl Into<Vec<u8>>) {
        self.files.insert(path.into(), bytes.into());
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

impl AssetProvider for MemoryAssets {
    fn read_to_buffer(&self, path: &str) -> Result<Vec<u8>, ReadError> {
        check_path(path)?;
        self.files
            .get(path)
            .cloned()
            .ok_or_else(|| ReadError::NotFound(path.to_owned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_parent_escapes() {
        let assets = MemoryAssets::new();
        for bad in ["../secret", "maps/../../x", "maps\\..\\..\\x", "maps/..", ""] {
            assert_eq!(
                assets.read_to_buffer(bad),
                Err(ReadError::InvalidPath(bad.to_owned())),
                "{bad}"
            );
        }
    }

    #[test]
    fn memory_assets_lookup() {
        let mut assets = MemoryAssets::new();
        assets.insert("maps/e1m1.json", b"{}".to_vec());
        assert_eq!(assets.read_to_buffer("maps/e1m1.json").unwrap(), b"{}");
        assert_eq!(
            assets.read_to_buffer("maps/e1m2.json"),
            Err(ReadError::NotFound("maps/e1m2.json".into()))
        );
    }

    #[test]
    fn file_assets_search_order() {
        let first = tempfile::tempdir().unwrap();
        let second = tempfile::tempdir().unwrap();
        fs::create_dir_all(second.path().join("textures")).unwrap();
        fs::write(second.path().join("textures/wall.png"), b"second").unwrap();
        fs::write(second.path().join("only.txt"), b"only").unwrap();
        fs::create_dir_all(first.path().join("textures")).unwrap();
        fs::write(first.path().join("textures/wall.png"), b"first").unwrap();

        let mut assets = FileAssets::with_root(first.path());
        assets.add_path(second.path());

        assert_eq!(assets.read_to_buffer("textures/wall.png").unwrap(), b"first");
        assert_eq!(assets.read_to_buffer("only.txt").unwrap(), b"only");
        assert_eq!(
            assets.read_to_buffer("missing.txt"),
            Err(ReadError::NotFound("missing.txt".into()))
        );
    }

    #[test]
    fn file_assets_reject_absolute_paths() {
        let root = tempfile::tempdir().unwrap();
        let assets = FileAssets::with_root(root.path());
        let abs = root.path().join("x").to_string_lossy().into_owned();
        assert!(matches!(
            assets.read_to_buffer(&abs),
            Err(ReadError::InvalidPath(_))
        ));
    }
}
