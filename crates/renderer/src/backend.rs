//! Rendering backend capability: program creation, texture upload, mesh
//! submission. [`HeadlessBackend`] records calls without a GPU;
//! [`crate::gpu::GpuBackend`] drives wgpu.

use thiserror::Error;

use crate::WorldVertex;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ProgramHandle(pub u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TextureHandle(pub u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MeshHandle(pub u32);

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("no suitable GPU adapter: {0}")]
    NoAdapter(String),
    #[error("device request failed: {0}")]
    Device(String),
    #[error("shader '{label}': {message}")]
    Shader { label: String, message: String },
    #[error("texture '{label}' has {got} bytes, expected {expected}")]
    TextureSize {
        label: String,
        expected: usize,
        got: usize,
    },
    #[error("texture '{label}' is {size}px wide, device limit is {limit}px")]
    TextureTooLarge { label: String, size: u32, limit: u32 },
    #[error("index {index} out of range for {vertices} vertices")]
    IndexOutOfRange { index: u32, vertices: usize },
    #[error("no {kind} with handle {index}")]
    UnknownHandle { kind: &'static str, index: u32 },
    #[error("render failed: {0}")]
    Render(String),
}

pub trait RenderBackend {
    fn create_program(&mut self, label: &str, wgsl: &str) -> Result<ProgramHandle, BackendError>;

    /// Upload tightly packed RGBA8 pixels.
    fn upload_texture(
        &mut self,
        label: &str,
        width: u32,
        height: u32,
        rgba: &[u8],
    ) -> Result<TextureHandle, BackendError>;

    fn submit_mesh(
        &mut self,
        vertices: &[WorldVertex],
        indices: &[u32],
    ) -> Result<MeshHandle, BackendError>;
}

pub(crate) fn check_texture(
    label: &str,
    width: u32,
    height: u32,
    rgba: &[u8],
) -> Result<(), BackendError> {
    let expected = width as usize * height as usize * 4;
    if rgba.len() != expected {
        return Err(BackendError::TextureSize {
            label: label.to_owned(),
            expected,
            got: rgba.len(),
        });
    }
    Ok(())
}

pub(crate) fn check_mesh(vertices: &[WorldVertex], indices: &[u32]) -> Result<(), BackendError> {
    match indices.iter().find(|&&i| i as usize >= vertices.len()) {
        Some(&index) => Err(BackendError::IndexOutOfRange {
            index,
            vertices: vertices.len(),
        }),
        None => Ok(()),
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct UploadedTexture {
    pub label: String,
    pub width: u32,
    pub height: u32,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SubmittedMesh {
    pub vertices: Vec<WorldVertex>,
    pub indices: Vec<u32>,
}

/// Backend that keeps everything on the CPU. Used by tests and dry runs.
#[derive(Default)]
pub struct HeadlessBackend {
    pub programs: Vec<String>,
    pub textures: Vec<UploadedTexture>,
    pub meshes: Vec<SubmittedMesh>,
}

impl HeadlessBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RenderBackend for HeadlessBackend {
    fn create_program(&mut self, label: &str, wgsl: &str) -> Result<ProgramHandle, BackendError> {
        for entry in ["vs_main", "fs_main"] {
            if !wgsl.contains(entry) {
                return Err(BackendError::Shader {
                    label: label.to_owned(),
                    message: format!("missing entry point {entry}"),
                });
            }
        }
        self.programs.push(label.to_owned());
        Ok(ProgramHandle(self.programs.len() as u32 - 1))
    }

    fn upload_texture(
        &mut self,
        label: &str,
        width: u32,
        height: u32,
        rgba: &[u8],
    ) -> Result<TextureHandle, BackendError> {
        check_texture(label, width, height, rgba)?;
        self.textures.push(UploadedTexture {
            label: label.to_owned(),
            width,
            height,
        });
        Ok(TextureHandle(self.textures.len() as u32 - 1))
    }

    fn submit_mesh(
        &mut self,
        vertices: &[WorldVertex],
        indices: &[u32],
    ) -> Result<MeshHandle, BackendError> {
        check_mesh(vertices, indices)?;
        self.meshes.push(SubmittedMesh {
            vertices: vertices.to_vec(),
            indices: indices.to_vec(),
        });
        Ok(MeshHandle(self.meshes.len() as u32 - 1))
    }
}
