//! Entry point for Kamen3D.
//! Loads a level, bakes its texture atlas and uploads the world mesh.

use std::collections::BTreeSet;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use asset::{AssetProvider, FileAssets, load_level};
use corelib::{Level, Quat, Vec2, Vec3};
use renderer::{
    Camera, DEFAULT_ATLAS_SIZE, Frame, GpuBackend, HeadlessBackend, MeshHandle, ProgramHandle,
    RenderBackend, TextureAtlas, TextureHandle, WORLD_SHADER, WallMeshBuilder, build_level_mesh,
};

struct Args {
    assets: Vec<String>,
    level: Option<String>,
    atlas_size: u32,
    backend: Option<wgpu::Backends>,
    size: (u32, u32),
}

fn parse_backend(val: &str) -> wgpu::Backends {
    match val.to_ascii_lowercase().as_str() {
        "auto" => wgpu::Backends::all(),
        "vulkan" | "vk" => wgpu::Backends::VULKAN,
        "dx12" | "d3d12" => wgpu::Backends::DX12,
        "metal" | "mtl" => wgpu::Backends::METAL,
        "gl" | "opengl" | "gles" => wgpu::Backends::GL,
        other => {
            log::warn!("Unknown backend '{}', falling back to auto.", other);
            wgpu::Backends::all()
        }
    }
}

fn parse_args(args: impl IntoIterator<Item = String>) -> Args {
    // Accept: --assets=DIR (repeatable), --level=PATH, --atlas-size=N,
    // --gpu-backend=auto|vulkan|dx12|metal|gl, --size=WxH
    let mut parsed = Args {
        assets: Vec::new(),
        level: None,
        atlas_size: DEFAULT_ATLAS_SIZE,
        backend: None,
        size: (1280, 720),
    };

    for arg in args {
        if let Some(v) = arg.strip_prefix("--assets=") {
            parsed.assets.push(v.to_owned());
        } else if let Some(v) = arg.strip_prefix("--level=") {
            parsed.level = Some(v.to_owned());
        } else if let Some(v) = arg.strip_prefix("--atlas-size=") {
            match v.parse::<u32>() {
                Ok(n) if n > 0 => parsed.atlas_size = n,
                _ => log::warn!("Bad atlas size '{}', keeping {}.", v, parsed.atlas_size),
            }
        } else if let Some(v) = arg.strip_prefix("--gpu-backend=") {
            parsed.backend = Some(parse_backend(v));
        } else if let Some(v) = arg.strip_prefix("--size=") {
            match v
                .split_once(['x', 'X'])
                .map(|(w, h)| (w.parse::<u32>(), h.parse::<u32>()))
            {
                Some((Ok(w), Ok(h))) => parsed.size = (w.max(1), h.max(1)),
                _ => log::warn!("Bad size '{}', keeping {:?}.", v, parsed.size),
            }
        }
    }

    if parsed.assets.is_empty() {
        parsed.assets.push("assets".to_owned());
    }
    parsed
}

/// Every non-empty texture name the level refers to, sorted and deduplicated.
fn level_textures(level: &Level) -> BTreeSet<&str> {
    let edges = level
        .edges()
        .iter()
        .flat_map(|e| [&e.upper_tex, &e.middle_tex, &e.lower_tex]);
    let flats = level
        .sectors()
        .iter()
        .flat_map(|s| [&s.floor_tex, &s.ceil_tex]);
    edges
        .chain(flats)
        .map(String::as_str)
        .filter(|name| !name.is_empty())
        .collect()
}

/// Camera at the first player start, else the first location, else the
/// middle of sector 0.
fn start_camera(level: &Level) -> Camera {
    let locations = level.locations();
    let start = locations
        .iter()
        .find(|l| l.kind == "player")
        .or_else(|| locations.first());
    if let Some(l) = start {
        return Camera::new(l.position, l.rotation);
    }
    match level.sectors().first() {
        Some(s) => {
            let sum: Vec2 = s.vertices.iter().copied().sum();
            let center = sum / s.vertices.len().max(1) as f32;
            let z = (s.floor_height + s.ceil_height) * 0.5;
            Camera::new(center.extend(z), Quat::IDENTITY)
        }
        None => Camera::new(Vec3::ZERO, Quat::IDENTITY),
    }
}

fn upload(
    backend: &mut dyn RenderBackend,
    atlas: &TextureAtlas,
    builder: &mut WallMeshBuilder<'_>,
) -> Result<(ProgramHandle, TextureHandle, MeshHandle)> {
    let program = backend
        .create_program("world", WORLD_SHADER)
        .context("creating world program")?;
    let texture = atlas.to_gpu(backend).context("uploading atlas")?;
    let mesh = builder.submit(backend).context("submitting world mesh")?;
    Ok((program, texture, mesh))
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = parse_args(std::env::args().skip(1));
    let Some(level_path) = args.level.as_deref() else {
        bail!("missing --level=PATH");
    };
    log::info!(
        "Starting Kamen3D. Level: {}, assets: {:?}, atlas_size={}, backend: {:?}",
        level_path,
        args.assets,
        args.atlas_size,
        args.backend
    );

    let mut files = FileAssets::new();
    for root in &args.assets {
        files.add_path(root);
    }
    let assets: Arc<dyn AssetProvider> = Arc::new(files);

    let level = load_level(&*assets, level_path)
        .with_context(|| format!("loading level '{}'", level_path))?;

    let mut atlas = TextureAtlas::with_size(Arc::clone(&assets), args.atlas_size);
    for name in level_textures(&level) {
        if let Err(e) = atlas.add_asset(name) {
            log::warn!("Texture '{}' unavailable: {}", name, e);
        }
    }
    atlas.bake().context("baking texture atlas")?;

    let mut builder = WallMeshBuilder::with_atlas(&atlas);
    let stats = build_level_mesh(&level, &mut builder);
    let (vertices, indices) = (builder.vertices().len(), builder.indices().len());

    match args.backend {
        Some(backends) => {
            let mut gpu = GpuBackend::headless(backends).context("creating GPU backend")?;
            let (program, atlas_tex, mesh) = upload(&mut gpu, &atlas, &mut builder)?;
            let (width, height) = args.size;
            let frame = Frame {
                program,
                atlas: atlas_tex,
                mesh,
                camera: start_camera(&level),
                width,
                height,
            };
            gpu.render_offscreen(&frame).context("rendering first frame")?;
        }
        None => {
            let mut headless = HeadlessBackend::default();
            upload(&mut headless, &atlas, &mut builder)?;
        }
    }

    log::info!(
        "Level ready: {} sectors, {} textures, {} walls, {} flats, {} vertices, {} indices",
        level.sectors().len(),
        atlas.len(),
        stats.walls,
        stats.flats,
        vertices,
        indices
    );
    Ok(())
}
