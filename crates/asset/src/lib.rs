//! Asset access and loaders (levels, textures).
//! Everything reads through an injected [`AssetProvider`], so tests can swap
//! the filesystem for an in-memory store.

pub mod level;
pub mod provider;
pub mod texture;

pub use level::{LoadLevelError, load_level, parse_level};
pub use provider::{AssetProvider, FileAssets, MemoryAssets, ReadError};
pub use texture::{DecodeError, TextureData};
