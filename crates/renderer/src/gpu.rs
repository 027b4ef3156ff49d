//! wgpu implementation of [`RenderBackend`].

use std::num::NonZeroU64;

use bytemuck::{Pod, Zeroable};
use glam::Mat4;
use wgpu::{
    util::DeviceExt,
    BindGroup, BindGroupLayout, BindGroupLayoutDescriptor, BindGroupLayoutEntry, BindingType, BlendState,
    Buffer, BufferBindingType, BufferUsages, ColorTargetState, ColorWrites,
    CommandEncoderDescriptor, DepthBiasState, DepthStencilState, Device, DeviceDescriptor,
    ErrorFilter, Extent3d, Features, FragmentState, Instance, InstanceDescriptor, Limits, LoadOp,
    Operations, Origin3d, PipelineLayoutDescriptor, PowerPreference, Queue,
    RenderPassColorAttachment, RenderPassDescriptor, RenderPipeline, RenderPipelineDescriptor,
    Sampler, SamplerBindingType, ShaderModuleDescriptor, ShaderSource, ShaderStages, StoreOp,
    TexelCopyBufferLayout, TexelCopyTextureInfo, Texture,
    TextureAspect, TextureDescriptor, TextureDimension, TextureFormat, TextureSampleType,
    TextureUsages, TextureView, TextureViewDescriptor, TextureViewDimension, VertexState,
};

use crate::WorldVertex;
use crate::camera::Camera;
use crate::backend::{
    BackendError, MeshHandle, ProgramHandle, RenderBackend, TextureHandle, check_mesh,
    check_texture,
};

const DEPTH_FORMAT: TextureFormat = TextureFormat::Depth32Float;
const ATLAS_FORMAT: TextureFormat = TextureFormat::Rgba8UnormSrgb;

/// Camera UBO (16-byte aligned).
#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
struct CameraUniform {
    view_proj: [[f32; 4]; 4],
}

struct GpuTexture {
    #[allow(dead_code)]
    texture: Texture,
    view: TextureView,
}

struct GpuMesh {
    vertex_buf: Buffer,
    index_buf: Buffer,
    index_count: u32,
}

/// Everything one offscreen frame needs.
#[derive(Clone, Copy, Debug)]
pub struct Frame {
    pub program: ProgramHandle,
    pub atlas: TextureHandle,
    pub mesh: MeshHandle,
    pub camera: Camera,
    pub width: u32,
    pub height: u32,
}

pub struct GpuBackend {
    device: Device,
    queue: Queue,
    target_format: TextureFormat,
    world_bgl: BindGroupLayout,
    sampler: Sampler,
    programs: Vec<RenderPipeline>,
    textures: Vec<GpuTexture>,
    meshes: Vec<GpuMesh>,
}

impl GpuBackend {
    /// Wrap an existing device, rendering into `target_format`.
    pub fn new(device: Device, queue: Queue, target_format: TextureFormat) -> Self {
        let world_bgl = device.create_bind_group_layout(&BindGroupLayoutDescriptor {
            label: Some("World BGL"),
            entries: &[
                BindGroupLayoutEntry {
                    binding: 0,
                    visibility: ShaderStages::VERTEX,
                    ty: BindingType::Buffer {
                        ty: BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: NonZeroU64::new(
                            std::mem::size_of::<CameraUniform>() as u64
                        ),
                    },
                    count: None,
                },
                BindGroupLayoutEntry {
                    binding: 1,
                    visibility: ShaderStages::FRAGMENT,
                    ty: BindingType::Texture {
                        sample_type: TextureSampleType::Float { filterable: true },
                        view_dimension: TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                BindGroupLayoutEntry {
                    binding: 2,
                    visibility: ShaderStages::FRAGMENT,
                    ty: BindingType::Sampler(SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        // Nearest filtering keeps texels crisp; wrapping happens in the shader.
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Atlas Sampler"),
            mag_filter: wgpu::FilterMode::Nearest,
            min_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        Self {
            device,
            queue,
            target_format,
            world_bgl,
            sampler,
            programs: Vec::new(),
            textures: Vec::new(),
            meshes: Vec::new(),
        }
    }

    /// Request an adapter and device without a surface. Blocks.
    pub fn headless(backends: wgpu::Backends) -> Result<Self, BackendError> {
        pollster::block_on(Self::request(backends))
    }

    async fn request(backends: wgpu::Backends) -> Result<Self, BackendError> {
        let instance = Instance::new(&InstanceDescriptor {
            backends,
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .map_err(|e| BackendError::NoAdapter(e.to_string()))?;
        log::info!("Using adapter: {:?}", adapter.get_info());

        let (device, queue) = adapter
            .request_device(&DeviceDescriptor {
                label: Some("Kamen3D Device"),
                required_features: Features::empty(),
                required_limits: Limits::downlevel_webgl2_defaults()
                    .using_resolution(adapter.limits()),
                ..Default::default()
            })
            .await
            .map_err(|e| BackendError::Device(e.to_string()))?;

        Ok(Self::new(device, queue, ATLAS_FORMAT))
    }

    fn pipeline(&self, handle: ProgramHandle) -> Result<&RenderPipeline, BackendError> {
        self.programs
            .get(handle.0 as usize)
            .ok_or(BackendError::UnknownHandle {
                kind: "program",
                index: handle.0,
            })
    }

    fn texture_view(&self, handle: TextureHandle) -> Result<&TextureView, BackendError> {
        self.textures
            .get(handle.0 as usize)
            .map(|t| &t.view)
            .ok_or(BackendError::UnknownHandle {
                kind: "texture",
                index: handle.0,
            })
    }

    fn mesh(&self, handle: MeshHandle) -> Result<&GpuMesh, BackendError> {
        self.meshes
            .get(handle.0 as usize)
            .ok_or(BackendError::UnknownHandle {
                kind: "mesh",
                index: handle.0,
            })
    }

    fn create_camera_buffer(&self, view_proj: Mat4) -> Buffer {
        let camera = CameraUniform {
            view_proj: view_proj.to_cols_array_2d(),
        };
        self.device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Camera UBO"),
                contents: bytemuck::bytes_of(&camera),
                usage: BufferUsages::UNIFORM,
            })
    }

    fn world_bind_group(&self, camera: &Buffer, atlas: &TextureView) -> BindGroup {
        self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("World BG"),
            layout: &self.world_bgl,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: camera.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(atlas),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::Sampler(&self.sampler),
                },
            ],
        })
    }

    /// Draw one frame of `frame.mesh` into an offscreen color + depth target
    /// and wait for the GPU to finish.
    pub fn render_offscreen(&self, frame: &Frame) -> Result<(), BackendError> {
        let pipeline = self.pipeline(frame.program)?;
        let atlas = self.texture_view(frame.atlas)?;
        let mesh = self.mesh(frame.mesh)?;
        let (width, height) = (frame.width.max(1), frame.height.max(1));

        self.device.push_error_scope(ErrorFilter::Validation);

        let camera_buf =
            self.create_camera_buffer(frame.camera.view_proj(width as f32 / height as f32));
        let bind_group = self.world_bind_group(&camera_buf, atlas);
        let color_view = create_target_view(&self.device, self.target_format, width, height);
        let depth_view = create_target_view(&self.device, DEPTH_FORMAT, width, height);

        let mut encoder = self
            .device
            .create_command_encoder(&CommandEncoderDescriptor {
                label: Some("OffscreenEncoder"),
            });
        {
            let mut rpass = encoder.begin_render_pass(&RenderPassDescriptor {
                label: Some("WorldPass"),
                color_attachments: &[Some(RenderPassColorAttachment {
                    view: &color_view,
                    depth_slice: None,
                    resolve_target: None,
                    ops: Operations {
                        load: LoadOp::Clear(wgpu::Color::BLACK),
                        store: StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &depth_view,
                    depth_ops: Some(Operations {
                        load: LoadOp::Clear(1.0),
                        store: StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                occlusion_query_set: None,
                timestamp_writes: None,
            });

            // Empty buffers cannot be sliced.
            if mesh.index_count > 0 {
                rpass.set_pipeline(pipeline);
                rpass.set_bind_group(0, &bind_group, &[]);
                rpass.set_vertex_buffer(0, mesh.vertex_buf.slice(..));
                rpass.set_index_buffer(mesh.index_buf.slice(..), wgpu::IndexFormat::Uint32);
                rpass.draw_indexed(0..mesh.index_count, 0, 0..1);
            }
        }
        self.queue.submit(Some(encoder.finish()));

        if let Some(err) = pollster::block_on(self.device.pop_error_scope()) {
            return Err(BackendError::Render(err.to_string()));
        }
        self.device
            .poll(wgpu::PollType::Wait)
            .map_err(|e| BackendError::Render(e.to_string()))?;

        log::info!(
            "Rendered {} indices into {}x{} offscreen target",
            mesh.index_count,
            width,
            height
        );
        Ok(())
    }
}

/// Create a render-attachment view (color or depth) of the given size.
fn create_target_view(device: &Device, format: TextureFormat, width: u32, height: u32) -> TextureView {
    let tex = device.create_texture(&TextureDescriptor {
        label: Some("OffscreenTarget"),
        size: Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: TextureDimension::D2,
        format,
        usage: TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    });
    tex.create_view(&TextureViewDescriptor::default())
}

impl RenderBackend for GpuBackend {
    fn create_program(&mut self, label: &str, wgsl: &str) -> Result<ProgramHandle, BackendError> {
        self.device.push_error_scope(ErrorFilter::Validation);

        let shader = self.device.create_shader_module(ShaderModuleDescriptor {
            label: Some(label),
            source: ShaderSource::Wgsl(wgsl.into()),
        });
        let layout = self.device.create_pipeline_layout(&PipelineLayoutDescriptor {
            label: Some(label),
            bind_group_layouts: &[&self.world_bgl],
            push_constant_ranges: &[],
        });
        let pipeline = self.device.create_render_pipeline(&RenderPipelineDescriptor {
            label: Some(label),
            layout: Some(&layout),
            vertex: VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                buffers: &[WorldVertex::LAYOUT],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            fragment: Some(FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                targets: &[Some(ColorTargetState {
                    format: self.target_format,
                    blend: Some(BlendState::REPLACE),
                    write_mask: ColorWrites::ALL,
                })],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            primitive: wgpu::PrimitiveState {
                cull_mode: Some(wgpu::Face::Back),
                ..Default::default()
            },
            depth_stencil: Some(DepthStencilState {
                format: DEPTH_FORMAT,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::LessEqual,
                stencil: wgpu::StencilState::default(),
                bias: DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        if let Some(err) = pollster::block_on(self.device.pop_error_scope()) {
            return Err(BackendError::Shader {
                label: label.to_owned(),
                message: err.to_string(),
            });
        }

        self.programs.push(pipeline);
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
        let limit = self.device.limits().max_texture_dimension_2d;
        if width > limit || height > limit {
            return Err(BackendError::TextureTooLarge {
                label: label.to_owned(),
                size: width.max(height),
                limit,
            });
        }

        let size = Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        };
        let texture = self.device.create_texture(&TextureDescriptor {
            label: Some(label),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: TextureDimension::D2,
            format: ATLAS_FORMAT,
            usage: TextureUsages::TEXTURE_BINDING | TextureUsages::COPY_DST,
            view_formats: &[],
        });
        self.queue.write_texture(
            TexelCopyTextureInfo {
                texture: &texture,
                mip_level: 0,
                origin: Origin3d::ZERO,
                aspect: TextureAspect::All,
            },
            rgba,
            TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(4 * width),
                rows_per_image: Some(height),
            },
            size,
        );
        let view = texture.create_view(&TextureViewDescriptor::default());
        log::info!("Uploaded texture '{}' ({}x{})", label, width, height);

        self.textures.push(GpuTexture { texture, view });
        Ok(TextureHandle(self.textures.len() as u32 - 1))
    }

    fn submit_mesh(
        &mut self,
        vertices: &[WorldVertex],
        indices: &[u32],
    ) -> Result<MeshHandle, BackendError> {
        check_mesh(vertices, indices)?;

        let vertex_buf = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("World VB"),
                contents: bytemuck::cast_slice(vertices),
                usage: BufferUsages::VERTEX,
            });
        let index_buf = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("World IB"),
                contents: bytemuck::cast_slice(indices),
                usage: BufferUsages::INDEX,
            });

        self.meshes.push(GpuMesh {
            vertex_buf,
            index_buf,
            index_count: indices.len() as u32,
        });
        Ok(MeshHandle(self.meshes.len() as u32 - 1))
    }
}
