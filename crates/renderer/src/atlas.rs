//! Texture atlas: every wall/flat texture packed into one square canvas.

use std::{collections::HashMap, sync::Arc};

use asset::{AssetProvider, DecodeError, ReadError, TextureData};
use glam::{UVec2, Vec2};
use image::{RgbaImage, imageops};
use thiserror::Error;

use crate::backend::{BackendError, RenderBackend, TextureHandle};
use crate::packer::{PackRect, SkylinePacker};

pub const DEFAULT_ATLAS_SIZE: u32 = 2048;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TextureId(pub usize);

/// Read-only description of one packed texture.
#[derive(Clone, Debug, PartialEq)]
pub struct TextureInfo {
    pub id: TextureId,
    /// Asset path the texture was registered under.
    pub name: String,
    pub pixel_size: UVec2,
    /// Normalized atlas coordinates; zero until the atlas is baked.
    pub atlas_min: Vec2,
    pub atlas_max: Vec2,
}

impl TextureInfo {
    /// Atlas sub-rectangle as `[min.x, min.y, size.x, size.y]`.
    pub fn atlas_rect(&self) -> [f32; 4] {
        let size = self.atlas_max - self.atlas_min;
        [self.atlas_min.x, self.atlas_min.y, size.x, size.y]
    }
}

#[derive(Debug, Error)]
pub enum AtlasError {
    #[error("cannot read texture '{path}': {source}")]
    Read {
        path: String,
        #[source]
        source: ReadError,
    },
    #[error("cannot decode texture '{path}': {source}")]
    Decode {
        path: String,
        #[source]
        source: DecodeError,
    },
    #[error("{textures} textures do not fit into a {size}x{size} atlas")]
    Capacity { textures: usize, size: u32 },
    #[error("atlas has not been baked")]
    NotBaked,
    #[error("atlas upload failed: {0}")]
    Upload(#[from] BackendError),
}

struct Entry {
    info: TextureInfo,
    image: TextureData,
}

pub struct TextureAtlas {
    assets: Arc<dyn AssetProvider>,
    size: u32,
    textures: Vec<Entry>,
    names: HashMap<String, usize>,
    canvas: RgbaImage,
    baked: bool,
}

impl TextureAtlas {
    pub fn new(assets: Arc<dyn AssetProvider>) -> Self {
        Self::with_size(assets, DEFAULT_ATLAS_SIZE)
    }

    pub fn with_size(assets: Arc<dyn AssetProvider>, size: u32) -> Self {
        Self {
            assets,
            size,
            textures: Vec::new(),
            names: HashMap::new(),
            canvas: RgbaImage::new(0, 0),
            baked: false,
        }
    }

    /// Load, decode and register a texture. Nothing is registered on error.
    /// Registering a path twice returns the existing id.
    pub fn add_asset(&mut self, path: &str) -> Result<TextureId, AtlasError> {
        if let Some(&index) = self.names.get(path) {
            return Ok(TextureId(index));
        }

        let bytes = self.assets.read_to_buffer(path).map_err(|source| AtlasError::Read {
            path: path.to_owned(),
            source,
        })?;
        let image = TextureData::decode(&bytes).map_err(|source| AtlasError::Decode {
            path: path.to_owned(),
            source,
        })?;

        let id = TextureId(self.textures.len());
        log::debug!("Registered texture '{}' as {:?} ({}x{})", path, id, image.width(), image.height());
        self.textures.push(Entry {
            info: TextureInfo {
                id,
                name: path.to_owned(),
                pixel_size: image.size(),
                atlas_min: Vec2::ZERO,
                atlas_max: Vec2::ZERO,
            },
            image,
        });
        self.names.insert(path.to_owned(), id.0);
        self.baked = false;
        Ok(id)
    }

    /// Pack every registered texture and compose the canvas.
    /// On failure the previous layout is kept.
    pub fn bake(&mut self) -> Result<(), AtlasError> {
        let capacity = self.size as u64 * self.size as u64;
        let used: u64 = self
            .textures
            .iter()
            .map(|t| t.image.width() as u64 * t.image.height() as u64)
            .sum();
        let overflow = AtlasError::Capacity {
            textures: self.textures.len(),
            size: self.size,
        };
        if used > capacity {
            return Err(overflow);
        }

        let rects: Vec<PackRect> = self
            .textures
            .iter()
            .enumerate()
            .map(|(id, t)| PackRect {
                id,
                width: t.image.width(),
                height: t.image.height(),
            })
            .collect();
        let placed = SkylinePacker::new(self.size, self.size)
            .pack_all(&rects)
            .ok_or(overflow)?;

        let mut canvas = RgbaImage::new(self.size, self.size);
        let scale = self.size as f32;
        for p in placed {
            let entry = &mut self.textures[p.id];
            entry.info.atlas_min = Vec2::new(p.x as f32, p.y as f32) / scale;
            entry.info.atlas_max = Vec2::new((p.x + p.width) as f32, (p.y + p.height) as f32) / scale;
            imageops::replace(&mut canvas, entry.image.image(), p.x.into(), p.y.into());
        }

        self.canvas = canvas;
        self.baked = true;
        log::info!(
            "Baked {} textures into {}x{} atlas ({:.1}% used)",
            self.textures.len(),
            self.size,
            self.size,
            used as f64 * 100.0 / capacity as f64
        );
        Ok(())
    }

    /// Upload the baked canvas through the rendering backend.
    pub fn to_gpu(&self, backend: &mut dyn RenderBackend) -> Result<TextureHandle, AtlasError> {
        if !self.baked {
            return Err(AtlasError::NotBaked);
        }
        Ok(backend.upload_texture("texture atlas", self.size, self.size, self.canvas.as_raw())?)
    }

    pub fn find_by_id(&self, id: TextureId) -> Option<&TextureInfo> {
        self.textures.get(id.0).map(|t| &t.info)
    }

    pub fn find_by_name(&self, name: &str) -> Option<&TextureInfo> {
        self.names.get(name).map(|&i| &self.textures[i].info)
    }

    pub fn iter(&self) -> impl Iterator<Item = &TextureInfo> {
        self.textures.iter().map(|t| &t.info)
    }

    #[inline]
    pub fn size(&self) -> u32 {
        self.size
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.textures.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.textures.is_empty()
    }

    #[inline]
    pub fn is_baked(&self) -> bool {
        self.baked
    }

    /// Composed canvas; `size` x `size` once baked, empty before.
    pub fn canvas(&self) -> &RgbaImage {
        &self.canvas
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::HeadlessBackend;
    use asset::MemoryAssets;

    fn solid_png(width: u32, height: u32, rgba: [u8; 4]) -> Vec<u8> {
        let data = rgba.repeat(width as usize * height as usize);
        TextureData::from_rgba8(width, height, data)
            .expect("solid texture")
            .encode_png()
            .expect("encode")
    }

    fn provider(textures: &[(&str, u32, u32)]) -> Arc<MemoryAssets> {
        let mut assets = MemoryAssets::new();
        for (i, &(name, w, h)) in textures.iter().enumerate() {
            assets.insert(name, solid_png(w, h, [i as u8 * 40, 255, 0, 255]));
        }
        assets.insert("textures/broken.png", b"not a png".to_vec());
        Arc::new(assets)
    }

    #[test]
    fn bake_assigns_disjoint_unit_rects() {
        let sizes = [
            ("textures/a.png", 64, 64),
            ("textures/b.png", 128, 32),
            ("textures/c.png", 16, 100),
            ("textures/d.png", 30, 30),
            ("textures/e.png", 64, 128),
        ];
        let mut atlas = TextureAtlas::with_size(provider(&sizes), 256);
        for (name, _, _) in sizes {
            atlas.add_asset(name).expect("register");
        }
        atlas.bake().expect("bake");
        assert!(atlas.is_baked());
        assert_eq!(atlas.canvas().dimensions(), (256, 256));

        let infos: Vec<&TextureInfo> = atlas.iter().collect();
        for (info, (_, w, h)) in infos.iter().zip(sizes) {
            assert!(info.atlas_min.cmpge(Vec2::ZERO).all());
            assert!(info.atlas_min.cmplt(info.atlas_max).all());
            assert!(info.atlas_max.cmple(Vec2::ONE).all());
            assert_eq!(info.pixel_size, UVec2::new(w, h));
            let span = (info.atlas_max - info.atlas_min) * 256.0;
            assert!((span - Vec2::new(w as f32, h as f32)).abs().max_element() < 1e-3);
        }
        for (i, a) in infos.iter().enumerate() {
            for b in &infos[i + 1..] {
                let apart = a.atlas_max.x <= b.atlas_min.x
                    || b.atlas_max.x <= a.atlas_min.x
                    || a.atlas_max.y <= b.atlas_min.y
                    || b.atlas_max.y <= a.atlas_min.y;
                assert!(apart, "{} overlaps {}", a.name, b.name);
            }
        }
    }

    #[test]
    fn canvas_holds_texture_pixels() {
        let mut atlas = TextureAtlas::with_size(provider(&[("textures/a.png", 4, 4)]), 8);
        atlas.add_asset("textures/a.png").unwrap();
        atlas.bake().unwrap();
        let info = atlas.find_by_name("textures/a.png").unwrap();
        let x = (info.atlas_min.x * 8.0) as u32;
        let y = (info.atlas_min.y * 8.0) as u32;
        for (dx, dy) in [(0, 0), (3, 0), (0, 3), (3, 3)] {
            assert_eq!(atlas.canvas().get_pixel(x + dx, y + dy).0, [0, 255, 0, 255]);
        }
        let painted = atlas.canvas().pixels().filter(|p| p.0 != [0, 0, 0, 0]).count();
        assert_eq!(painted, 4 * 4);
    }

    #[test]
    fn lookups_by_id_and_name() {
        let mut atlas = TextureAtlas::with_size(provider(&[("a.png", 8, 8), ("b.png", 8, 8)]), 64);
        let a = atlas.add_asset("a.png").unwrap();
        let b = atlas.add_asset("b.png").unwrap();
        assert_eq!((a, b), (TextureId(0), TextureId(1)));
        assert_eq!(atlas.add_asset("a.png").unwrap(), a);
        assert_eq!(atlas.len(), 2);

        assert_eq!(atlas.find_by_name("b.png").unwrap().id, b);
        assert_eq!(atlas.find_by_id(a).unwrap().name, "a.png");
        assert!(atlas.find_by_name("c.png").is_none());
        assert!(atlas.find_by_id(TextureId(2)).is_none());
    }

    #[test]
    fn failed_add_registers_nothing() {
        let mut atlas = TextureAtlas::with_size(provider(&[]), 64);
        assert!(matches!(
            atlas.add_asset("textures/missing.png"),
            Err(AtlasError::Read { source: ReadError::NotFound(_), .. })
        ));
        assert!(matches!(
            atlas.add_asset("textures/broken.png"),
            Err(AtlasError::Decode { .. })
        ));
        assert!(atlas.is_empty());
        assert!(atlas.find_by_name("textures/broken.png").is_none());
    }

    #[test]
    fn empty_bake_is_valid() {
        let mut atlas = TextureAtlas::with_size(provider(&[]), 16);
        atlas.bake().expect("empty bake");
        assert!(atlas.canvas().as_raw().iter().all(|&b| b == 0));
        let mut backend = HeadlessBackend::new();
        atlas.to_gpu(&mut backend).expect("upload");
        assert_eq!(backend.textures[0].width, 16);
    }

    #[test]
    fn texture_wider_than_canvas_overflows() {
        let mut atlas = TextureAtlas::with_size(provider(&[("wide.png", 65, 1)]), 64);
        atlas.add_asset("wide.png").unwrap();
        assert!(matches!(
            atlas.bake(),
            Err(AtlasError::Capacity { textures: 1, size: 64 })
        ));
        assert!(!atlas.is_baked());
    }

    #[test]
    fn shape_overflow_with_spare_area() {
        // 3200 of 4096 pixels, but two 40px squares never fit side by side.
        let sizes = [("a.png", 40, 40), ("b.png", 40, 40)];
        let mut atlas = TextureAtlas::with_size(provider(&sizes), 64);
        atlas.add_asset("a.png").unwrap();
        atlas.add_asset("b.png").unwrap();
        assert!(matches!(atlas.bake(), Err(AtlasError::Capacity { .. })));
    }

    #[test]
    fn failed_bake_keeps_previous_layout() {
        let sizes = [("huge.png", 100, 100), ("also.png", 100, 100)];
        let mut atlas = TextureAtlas::with_size(provider(&sizes), 128);
        atlas.add_asset("huge.png").unwrap();
        atlas.bake().unwrap();
        let kept = atlas.find_by_name("huge.png").unwrap().clone();

        atlas.add_asset("also.png").unwrap();
        assert!(matches!(atlas.bake(), Err(AtlasError::Capacity { .. })));
        assert_eq!(atlas.find_by_name("huge.png").unwrap(), &kept);
        assert_eq!(atlas.find_by_name("also.png").unwrap().atlas_max, Vec2::ZERO);
    }

    #[test]
    fn upload_requires_bake() {
        let mut atlas = TextureAtlas::with_size(provider(&[("a.png", 4, 4)]), 16);
        atlas.add_asset("a.png").unwrap();
        let mut backend = HeadlessBackend::new();
        assert!(matches!(atlas.to_gpu(&mut backend), Err(AtlasError::NotBaked)));
        atlas.bake().unwrap();
        assert!(atlas.to_gpu(&mut backend).is_ok());
        assert_eq!(backend.textures.len(), 1);
    }
}
