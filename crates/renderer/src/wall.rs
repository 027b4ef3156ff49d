//! Wall and flat vertex assembly against a baked texture atlas.

use glam::{Vec2, Vec3};
use thiserror::Error;

use crate::WorldVertex;
use crate::atlas::{TextureAtlas, TextureInfo};
use crate::backend::{BackendError, MeshHandle, RenderBackend};

/// Two triangles per wall quad.
const QUAD_INDICES: [u32; 6] = [0, 1, 2, 2, 3, 0];

/// Strength of the direction-based shading, in 1/256 brightness steps.
const FAKE_CONTRAST: f32 = 16.0;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum WallError {
    #[error("no texture atlas bound")]
    NoAtlas,
    #[error("texture atlas is not baked")]
    AtlasNotBaked,
    #[error("unknown texture '{0}'")]
    UnknownTexture(String),
    #[error("flat index {index} out of range for {vertices} vertices")]
    BadIndex { index: usize, vertices: usize },
}

/// Brightness offset for a wall running from `a` to `b`: walls parallel to
/// the X axis get darker, walls parallel to the Y axis brighter.
// TODO: a triangle wave over the angle would give more even steps than cos.
pub fn fake_contrast(a: Vec2, b: Vec2) -> f32 {
    let d = b - a;
    (2.0 * d.y.atan2(d.x)).cos() * -FAKE_CONTRAST
}

/// Apply an offset (in 1/256 steps) to normalized brightness.
fn shade(brightness: Vec3, offset: f32) -> [f32; 3] {
    ((brightness * 256.0 + Vec3::splat(offset)) / 256.0)
        .clamp(Vec3::ZERO, Vec3::ONE)
        .to_array()
}

/// Transient vertex/index buffers for one frame's world geometry.
#[derive(Default)]
pub struct WallMeshBuilder<'a> {
    atlas: Option<&'a TextureAtlas>,
    vertices: Vec<WorldVertex>,
    indices: Vec<u32>,
}

impl<'a> WallMeshBuilder<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_atlas(atlas: &'a TextureAtlas) -> Self {
        let mut builder = Self::new();
        builder.bind_atlas(atlas);
        builder
    }

    pub fn bind_atlas(&mut self, atlas: &'a TextureAtlas) {
        self.atlas = Some(atlas);
    }

    fn texture(&self, name: &str) -> Result<&'a TextureInfo, WallError> {
        let atlas = self.atlas.ok_or(WallError::NoAtlas)?;
        if !atlas.is_baked() {
            return Err(WallError::AtlasNotBaked);
        }
        atlas
            .find_by_name(name)
            .ok_or_else(|| WallError::UnknownTexture(name.to_owned()))
    }

    /// Append a textured quad from `a` to `b`, spanning `floor_z..ceil_z`.
    ///
    /// Texture coordinates are texel exact: one texture repeat per
    /// `pixel_size` world units. `brightness` is the sector's normalized RGB.
    pub fn add_wall(
        &mut self,
        a: Vec2,
        b: Vec2,
        floor_z: f32,
        ceil_z: f32,
        texture: &str,
        brightness: Vec3,
    ) -> Result<(), WallError> {
        let tex = self.texture(texture)?;
        let atlas = tex.atlas_rect();
        let pixels = tex.pixel_size.as_vec2();

        let u = (b - a).length() / pixels.x;
        let v = (ceil_z - floor_z) / pixels.y;
        let bright = shade(brightness, fake_contrast(a, b));

        // a/floor is the lower-left corner when facing the wall.
        let base = self.vertices.len() as u32;
        let corners = [
            ([a.x, a.y, floor_z], [0.0, v]),
            ([b.x, b.y, floor_z], [u, v]),
            ([b.x, b.y, ceil_z], [u, 0.0]),
            ([a.x, a.y, ceil_z], [0.0, 0.0]),
        ];
        self.vertices.extend(corners.map(|(pos, uv)| WorldVertex {
            pos,
            atlas,
            uv,
            bright,
        }));
        self.indices.extend(QUAD_INDICES.map(|i| base + i));
        Ok(())
    }

    /// Append a horizontal polygon at height `z` from a sector outline and
    /// its tessellation. UVs follow world X/Y, texel exact. Every index must
    /// point into `points`; otherwise nothing is appended.
    pub fn add_flat(
        &mut self,
        points: &[Vec2],
        indices: &[usize],
        z: f32,
        texture: &str,
        brightness: Vec3,
    ) -> Result<(), WallError> {
        let tex = self.texture(texture)?;
        if let Some(&index) = indices.iter().find(|&&i| i >= points.len()) {
            return Err(WallError::BadIndex {
                index,
                vertices: points.len(),
            });
        }
        let atlas = tex.atlas_rect();
        let pixels = tex.pixel_size.as_vec2();
        let bright = shade(brightness, 0.0);

        let base = self.vertices.len() as u32;
        self.vertices.extend(points.iter().map(|p| WorldVertex {
            pos: [p.x, p.y, z],
            atlas,
            uv: (*p / pixels).to_array(),
            bright,
        }));
        self.indices.extend(indices.iter().map(|&i| base + i as u32));
        Ok(())
    }

    pub fn vertices(&self) -> &[WorldVertex] {
        &self.vertices
    }

    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    /// Drop the buffered geometry but keep allocations.
    pub fn clear(&mut self) {
        self.vertices.clear();
        self.indices.clear();
    }

    /// Hand the buffers to the backend, then clear them for the next frame.
    pub fn submit(&mut self, backend: &mut dyn RenderBackend) -> Result<MeshHandle, BackendError> {
        let handle = backend.submit_mesh(&self.vertices, &self.indices)?;
        log::debug!(
            "Submitted world mesh: {} vertices, {} indices",
            self.vertices.len(),
            self.indices.len()
        );
        self.clear();
        Ok(handle)
    }
}
