//! Renderer: texture atlas, wall/flat mesh building, backend abstraction.
//! wgpu = 26.x

use bytemuck::{Pod, Zeroable};
use glam::Vec2;
use wgpu::{VertexBufferLayout, VertexStepMode};

pub mod atlas;
pub mod backend;
pub mod camera;
pub mod gpu;
pub mod packer;
pub mod wall;
pub mod world;

pub use atlas::{AtlasError, DEFAULT_ATLAS_SIZE, TextureAtlas, TextureId, TextureInfo};
pub use backend::{
    BackendError, HeadlessBackend, MeshHandle, ProgramHandle, RenderBackend, TextureHandle,
};
pub use camera::Camera;
pub use gpu::{Frame, GpuBackend};
pub use wall::{WallError, WallMeshBuilder};
pub use world::{MeshStats, build_level_mesh};

/// World shader: samples the atlas sub-rectangle and applies brightness.
pub const WORLD_SHADER: &str = include_str!("shaders/world.wgsl");

/// Vertex: position + atlas rect + repeat-space uv + brightness.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct WorldVertex {
    pub pos: [f32; 3],
    /// Atlas sub-rectangle: min.xy, size.xy (normalized).
    pub atlas: [f32; 4],
    /// Texture coordinate in texture repeats; wraps inside `atlas`.
    pub uv: [f32; 2],
    pub bright: [f32; 3],
}

impl WorldVertex {
    pub const LAYOUT: VertexBufferLayout<'static> = VertexBufferLayout {
        array_stride: std::mem::size_of::<WorldVertex>() as u64,
        step_mode: VertexStepMode::Vertex,
        attributes: &wgpu::vertex_attr_array![
            0 => Float32x3, 1 => Float32x4, 2 => Float32x2, 3 => Float32x3
        ],
    };

    /// Final atlas coordinate, as computed by the fragment shader.
    pub fn atlas_uv(&self) -> Vec2 {
        let [x, y, w, h] = self.atlas;
        Vec2::new(x, y) + Vec2::from_array(self.uv).fract_gl() * Vec2::new(w, h)
    }
}
