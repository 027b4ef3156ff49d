//! Whole-level mesh assembly: walls for every edge, flats for every sector.

use corelib::{Level, Sector};

use crate::wall::{WallError, WallMeshBuilder};

/// Counters from one [`build_level_mesh`] pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MeshStats {
    pub walls: usize,
    pub flats: usize,
    /// Pieces dropped because their texture could not be used.
    pub skipped: usize,
}

impl MeshStats {
    fn record(&mut self, result: Result<(), WallError>, what: &str, sector: usize) -> bool {
        match result {
            Ok(()) => true,
            Err(e) => {
                log::warn!("Skipping {} in sector {}: {}", what, sector, e);
                self.skipped += 1;
                false
            }
        }
    }
}

/// Emit every wall and flat of `level` into `builder`.
///
/// Solid edges get one full-height wall with the middle texture. Portals get
/// an upper piece where the neighbour's ceiling is lower and a lower piece
/// where the neighbour's floor is higher. Pieces with an empty texture name
/// are not drawn; pieces that fail are logged and skipped.
pub fn build_level_mesh(level: &Level, builder: &mut WallMeshBuilder<'_>) -> MeshStats {
    let mut stats = MeshStats::default();

    for (index, sector) in level.sectors().iter().enumerate() {
        for edge in level.sector_edges(sector) {
            let (a, b) = (edge.vertex, edge.next_vertex);
            let mut wall = |bottom: f32, top: f32, texture: &str, what: &str| {
                if texture.is_empty() || top <= bottom {
                    return;
                }
                let result = builder.add_wall(a, b, bottom, top, texture, sector.brightness);
                if stats.record(result, what, index) {
                    stats.walls += 1;
                }
            };

            match level.back_sector(edge) {
                None => wall(sector.floor_height, sector.ceil_height, edge.middle_tex.as_str(), "wall"),
                Some(back) => {
                    wall(back.ceil_height, sector.ceil_height, edge.upper_tex.as_str(), "upper wall");
                    wall(sector.floor_height, back.floor_height, edge.lower_tex.as_str(), "lower wall");
                }
            }
        }

        add_flats(index, sector, builder, &mut stats);
    }

    log::info!(
        "World mesh: {} walls, {} flats, {} skipped",
        stats.walls,
        stats.flats,
        stats.skipped
    );
    stats
}

fn add_flats(index: usize, sector: &Sector, builder: &mut WallMeshBuilder<'_>, stats: &mut MeshStats) {
    let flats = [
        (&sector.floor_indices, sector.floor_height, &sector.floor_tex, "floor"),
        (&sector.ceil_indices, sector.ceil_height, &sector.ceil_tex, "ceiling"),
    ];
    for (indices, z, texture, what) in flats {
        if texture.is_empty() {
            continue;
        }
        let result = builder.add_flat(&sector.vertices, indices, z, texture, sector.brightness);
        if stats.record(result, what, index) {
            stats.flats += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::atlas::TextureAtlas;
    use asset::{MemoryAssets, TextureData, parse_level};

    const STEP: &str = r#"{
        "polygons": [
            {
                "edges": [
                    { "vertex": [0, 0], "middleTex": "stone.png" },
                    { "vertex": [64, 0], "upperTex": "trim.png", "lowerTex": "trim.png", "backPoly": 1 },
                    { "vertex": [64, 64], "middleTex": "stone.png" },
                    { "vertex": [0, 64], "middleTex": "missing.png" }
                ],
                "floorHeight": 0, "ceilHeight": 128,
                "floorTex": "floor.png", "ceilTex": "floor.png",
                "brightness": [128, 128, 128]
            },
            {
                "edges": [
                    { "vertex": [64, 0], "middleTex": "stone.png" },
                    { "vertex": [128, 0], "middleTex": "stone.png" },
                    { "vertex": [128, 64], "middleTex": "stone.png" },
                    { "vertex": [64, 64], "upperTex": "trim.png", "lowerTex": "trim.png", "backPoly": 0 }
                ],
                "floorHeight": 16, "ceilHeight": 96,
                "floorTex": "floor.png", "ceilTex": "",
                "brightness": [200, 200, 200]
            }
        ]
    }"#;

    fn atlas() -> TextureAtlas {
        let mut assets = MemoryAssets::new();
        for name in ["stone.png", "trim.png", "floor.png"] {
            let png = TextureData::create_test_texture(32, 32).encode_png().unwrap();
            assets.insert(name, png);
        }
        let mut atlas = TextureAtlas::with_size(Arc::new(assets), 128);
        for name in ["stone.png", "trim.png", "floor.png"] {
            atlas.add_asset(name).unwrap();
        }
        atlas.bake().unwrap();
        atlas
    }

    #[test]
    fn portal_walls_split_by_neighbour_heights() {
        let level = parse_level(STEP.as_bytes()).unwrap();
        let atlas = atlas();
        let mut builder = WallMeshBuilder::with_atlas(&atlas);
        let stats = build_level_mesh(&level, &mut builder);

        // Sector 0: 2 solid walls + upper + lower (one solid wall skipped).
        // Sector 1: 3 solid walls; its portal faces a taller room.
        assert_eq!(
            stats,
            MeshStats {
                walls: 7,
                flats: 3,
                skipped: 1
            }
        );

        let quads: Vec<[f32; 2]> = builder
            .vertices()
            .chunks_exact(4)
            .take(4)
            .map(|q| [q[0].pos[2], q[2].pos[2]])
            .collect();
        assert_eq!(quads[0], [0.0, 128.0]);
        assert_eq!(quads[1], [96.0, 128.0]);
        assert_eq!(quads[2], [0.0, 16.0]);
        assert_eq!(quads[3], [0.0, 128.0]);
    }

    #[test]
    fn flats_reuse_sector_tessellation() {
        let level = parse_level(STEP.as_bytes()).unwrap();
        let atlas = atlas();
        let mut builder = WallMeshBuilder::with_atlas(&atlas);
        build_level_mesh(&level, &mut builder);

        // Sector 0's four walls come first, then its floor and ceiling.
        let walls = 4 * 4;
        let floor = &builder.vertices()[walls..walls + 4];
        assert!(floor.iter().all(|v| v.pos[2] == 0.0));
        let ceiling = &builder.vertices()[walls + 4..walls + 8];
        assert!(ceiling.iter().all(|v| v.pos[2] == 128.0));
        assert_eq!(builder.indices().len(), 7 * 6 + 3 * 6);
    }
}
