//! JSON level loader.
//!
//! ```json
//! { "polygons": [ { "edges": [ { "vertex": [0, 0], "middleTex": "WALL" }, ... ],
//!                   "floorHeight": 0, "ceilHeight": 64,
//!                   "floorTex": "FLOOR", "ceilTex": "CEIL",
//!                   "brightness": [128, 128, 128] } ],
//!   "locations": [ { "type": "player", "polygon": 0,
//!                    "position": [0, 0, 0], "rotation": [0, 0, 0] } ] }
//! ```

use corelib::{EdgeDef, Level, LevelBuilder, LevelError, Location, SectorDef, Vec2, Vec3};
use serde::Deserialize;
use thiserror::Error;

use crate::provider::{AssetProvider, ReadError};

#[derive(Debug, Error)]
pub enum LoadLevelError {
    #[error("missing level asset: {0}")]
    MissingAsset(#[from] ReadError),
    #[error("level parse error: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid level: {0}")]
    Invalid(#[from] LevelError),
}

#[derive(Deserialize)]
struct LevelDoc {
    polygons: Vec<PolygonDoc>,
    #[serde(default)]
    locations: Vec<LocationDoc>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PolygonDoc {
    edges: Vec<EdgeDoc>,
    floor_height: f32,
    ceil_height: f32,
    floor_tex: String,
    ceil_tex: String,
    brightness: [u8; 3],
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct EdgeDoc {
    vertex: [f32; 2],
    #[serde(default)]
    upper_tex: String,
    #[serde(default)]
    middle_tex: String,
    #[serde(default)]
    lower_tex: String,
    back_poly: Option<usize>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LocationDoc {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    entity_config: String,
    polygon: usize,
    position: [f32; 3],
    /// Pitch, yaw, roll.
    #[serde(default)]
    rotation: [f32; 3],
}

/// Load a level through the asset provider.
pub fn load_level<P: AssetProvider + ?Sized>(
    assets: &P,
    path: &str,
) -> Result<Level, LoadLevelError> {
    let bytes = assets.read_to_buffer(path)?;
    let level = parse_level(&bytes)?;
    log::info!(
        "Loaded level '{}': {} sectors, {} edges, {} locations",
        path,
        level.sectors().len(),
        level.edges().len(),
        level.locations().len()
    );
    Ok(level)
}

/// Parse a level from an in-memory JSON payload.
pub fn parse_level(bytes: &[u8]) -> Result<Level, LoadLevelError> {
    let doc: LevelDoc = serde_json::from_slice(bytes)?;

    let mut builder = LevelBuilder::new();
    for polygon in doc.polygons {
        let [r, g, b] = polygon.brightness;
        let def = SectorDef {
            floor_height: polygon.floor_height,
            ceil_height: polygon.ceil_height,
            floor_tex: polygon.floor_tex,
            ceil_tex: polygon.ceil_tex,
            brightness: Vec3::new(r as f32, g as f32, b as f32) / 256.0,
        };
        let edges = polygon.edges.into_iter().map(|e| EdgeDef {
            vertex: Vec2::from_array(e.vertex),
            upper_tex: e.upper_tex,
            middle_tex: e.middle_tex,
            lower_tex: e.lower_tex,
            back_poly: e.back_poly,
        });
        builder.add_sector(def, edges);
    }

    for location in doc.locations {
        builder.add_location(Location::new(
            location.kind,
            location.entity_config,
            location.polygon,
            Vec3::from_array(location.position),
            Vec3::from_array(location.rotation),
        ));
    }

    Ok(builder.finish()?)
}
