//! Core types: math re-exports, level data model, geometry caches.

pub use glam::{EulerRot, Quat, UVec2, Vec2, Vec3, vec2, vec3};

pub mod error;
pub mod level;
pub mod triangulate;

pub use error::{GeometryError, LevelError};
pub use level::{Edge, EdgeDef, Level, LevelBuilder, Location, Sector, SectorDef};

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_square() -> LevelBuilder {
        let mut builder = LevelBuilder::new();
        let def = SectorDef {
            floor_height: 0.0,
            ceil_height: 64.0,
            floor_tex: "FLOOR".into(),
            ceil_tex: "CEIL".into(),
            brightness: vec3(0.5, 0.5, 0.5),
        };
        let outline = [vec2(0.0, 0.0), vec2(1.0, 0.0), vec2(1.0, 1.0), vec2(0.0, 1.0)];
        builder.add_sector(def, outline.map(|v| EdgeDef::wall(v, "WALL")));
        builder
    }

    #[test]
    fn unit_square_level_counts() {
        let level = unit_square().finish().expect("unit square is valid");
        assert_eq!(level.sectors().len(), 1);
        assert_eq!(level.edges().len(), 4);
        assert!(level.locations().is_empty());

        let sector = &level.sectors()[0];
        assert_eq!(sector.floor_indices.len(), 6);
        assert_eq!(sector.vertices.len(), 4);
        assert!((sector.brightness - vec3(0.5, 0.5, 0.5)).length() < 1e-6);
    }

    #[test]
    fn ceiling_is_reversed_floor() {
        let level = unit_square().finish().expect("unit square is valid");
        let sector = &level.sectors()[0];
        let mut reversed = sector.floor_indices.clone();
        reversed.reverse();
        assert_eq!(sector.ceil_indices, reversed);
    }
}
