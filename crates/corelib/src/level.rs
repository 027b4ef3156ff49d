//! Level data model: sectors, edges, locations.
//!
//! A [`Level`] can only be produced by [`LevelBuilder::finish`], which resolves
//! every edge loop and computes the derived caches (next vertices, normals,
//! floor/ceiling tessellation) exactly once. After that the level is read-only.

use crate::error::{GeometryError, LevelError, LevelResult};
use crate::triangulate::triangulate;
use crate::{EulerRot, Quat, Vec2, Vec3};

/// One boundary segment of a sector: a solid wall or a portal.
#[derive(Clone, Debug, PartialEq)]
pub struct Edge {
    pub vertex: Vec2,
    /// Vertex of the following edge in the owning sector's loop.
    pub next_vertex: Vec2,
    /// Drawn above a portal opening.
    pub upper_tex: String,
    /// Drawn on solid walls.
    pub middle_tex: String,
    /// Drawn below a portal opening.
    pub lower_tex: String,
    /// Sector on the other side; `None` for a solid wall.
    pub back_poly: Option<usize>,
    /// Unit normal, `(dy, -dx)` of the edge direction.
    pub normal: Vec2,
}

impl Edge {
    #[inline]
    pub fn is_portal(&self) -> bool {
        self.back_poly.is_some()
    }

    #[inline]
    pub fn length(&self) -> f32 {
        (self.next_vertex - self.vertex).length()
    }
}

/// Closed 2D area with floor and ceiling.
#[derive(Clone, Debug, PartialEq)]
pub struct Sector {
    pub edge_ids: Vec<usize>,
    pub floor_height: f32,
    pub ceil_height: f32,
    pub floor_tex: String,
    pub ceil_tex: String,
    /// Normalized RGB brightness.
    pub brightness: Vec3,
    /// Outline vertices in loop order; the tessellation indexes into these.
    pub vertices: Vec<Vec2>,
    pub floor_indices: Vec<usize>,
    /// Same triangles as the floor with opposite winding.
    pub ceil_indices: Vec<usize>,
}

/// Spawn point or other placed marker.
#[derive(Clone, Debug, PartialEq)]
pub struct Location {
    pub kind: String,
    pub entity_config: String,
    pub polygon: usize,
    pub position: Vec3,
    /// Pitch, yaw, roll in radians, as stored in the level.
    pub euler: Vec3,
    pub rotation: Quat,
}

impl Location {
    pub fn new(
        kind: impl Into<String>,
        entity_config: impl Into<String>,
        polygon: usize,
        position: Vec3,
        euler: Vec3,
    ) -> Self {
        // Pitch is applied first, then yaw, then roll.
        let rotation = Quat::from_euler(EulerRot::ZYX, euler.z, euler.y, euler.x);
        Self {
            kind: kind.into(),
            entity_config: entity_config.into(),
            polygon,
            position,
            euler,
            rotation,
        }
    }
}

/// Source data for one sector, before caches are derived.
#[derive(Clone, Debug, Default)]
pub struct SectorDef {
    pub floor_height: f32,
    pub ceil_height: f32,
    pub floor_tex: String,
    pub ceil_tex: String,
    pub brightness: Vec3,
}

/// Source data for one edge, before caches are derived.
#[derive(Clone, Debug, Default)]
pub struct EdgeDef {
    pub vertex: Vec2,
    pub upper_tex: String,
    pub middle_tex: String,
    pub lower_tex: String,
    pub back_poly: Option<usize>,
}

impl EdgeDef {
    /// Solid wall with only a middle texture.
    pub fn wall(vertex: Vec2, middle_tex: impl Into<String>) -> Self {
        Self {
            vertex,
            middle_tex: middle_tex.into(),
            ..Default::default()
        }
    }

    /// Portal into `back_poly` with upper/lower textures.
    pub fn portal(
        vertex: Vec2,
        back_poly: usize,
        upper_tex: impl Into<String>,
        lower_tex: impl Into<String>,
    ) -> Self {
        Self {
            vertex,
            upper_tex: upper_tex.into(),
            lower_tex: lower_tex.into(),
            back_poly: Some(back_poly),
            ..Default::default()
        }
    }
}

/// Collects raw level data; `finish` turns it into an immutable [`Level`].
#[derive(Default)]
pub struct LevelBuilder {
    sectors: Vec<Sector>,
    edges: Vec<Edge>,
    locations: Vec<Location>,
}

impl LevelBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a sector and its edge loop. Returns the sector index.
    pub fn add_sector(&mut self, def: SectorDef, edges: impl IntoIterator<Item = EdgeDef>) -> usize {
        let mut edge_ids = Vec::new();
        for e in edges {
            edge_ids.push(self.edges.len());
            self.edges.push(Edge {
                vertex: e.vertex,
                next_vertex: e.vertex,
                upper_tex: e.upper_tex,
                middle_tex: e.middle_tex,
                lower_tex: e.lower_tex,
                back_poly: e.back_poly,
                normal: Vec2::ZERO,
            });
        }

        self.sectors.push(Sector {
            edge_ids,
            floor_height: def.floor_height,
            ceil_height: def.ceil_height,
            floor_tex: def.floor_tex,
            ceil_tex: def.ceil_tex,
            brightness: def.brightness,
            vertices: Vec::new(),
            floor_indices: Vec::new(),
            ceil_indices: Vec::new(),
        });
        self.sectors.len() - 1
    }

    pub fn add_location(&mut self, location: Location) -> usize {
        self.locations.push(location);
        self.locations.len() - 1
    }

    /// Validate references and compute every derived cache.
    pub fn finish(mut self) -> LevelResult<Level> {
        let sector_count = self.sectors.len();

        for (edge, e) in self.edges.iter().enumerate() {
            if let Some(back_poly) = e.back_poly {
                if back_poly >= sector_count {
                    return Err(LevelError::PortalOutOfRange {
                        edge,
                        back_poly,
                        sectors: sector_count,
                    });
                }
            }
        }

        for (location, l) in self.locations.iter().enumerate() {
            if l.polygon >= sector_count {
                return Err(LevelError::LocationOutOfRange {
                    location,
                    polygon: l.polygon,
                    sectors: sector_count,
                });
            }
        }

        for (index, sector) in self.sectors.iter_mut().enumerate() {
            cache_sector(index, sector, &mut self.edges)?;
        }

        log::debug!(
            "Level finalized: {} sectors, {} edges, {} locations",
            self.sectors.len(),
            self.edges.len(),
            self.locations.len()
        );

        Ok(Level {
            sectors: self.sectors,
            edges: self.edges,
            locations: self.locations,
        })
    }
}

/// Fill next vertices, normals and tessellation for one sector.
fn cache_sector(index: usize, sector: &mut Sector, edges: &mut [Edge]) -> LevelResult<()> {
    let geometry = |source| LevelError::Geometry {
        sector: index,
        source,
    };

    let vertices: Vec<Vec2> = sector.edge_ids.iter().map(|&id| edges[id].vertex).collect();
    let n = vertices.len();
    if n < 3 {
        return Err(geometry(GeometryError::TooFewVertices { count: n }));
    }

    for k in 0..n {
        let id = sector.edge_ids[k];
        let next = vertices[(k + 1) % n];
        let delta = next - vertices[k];
        if delta.length_squared() <= f32::EPSILON {
            return Err(geometry(GeometryError::ZeroLengthEdge { index: id }));
        }
        let edge = &mut edges[id];
        edge.next_vertex = next;
        edge.normal = Vec2::new(delta.y, -delta.x).normalize();
    }

    let floor = triangulate(&vertices).map_err(geometry)?;

    sector.ceil_indices = floor.iter().rev().copied().collect();
    sector.floor_indices = floor;
    sector.vertices = vertices;
    Ok(())
}

/// A fully loaded level. Immutable: caches never go stale.
#[derive(Clone, Debug, PartialEq)]
pub struct Level {
    sectors: Vec<Sector>,
    edges: Vec<Edge>,
    locations: Vec<Location>,
}

impl Level {
    #[inline]
    pub fn sectors(&self) -> &[Sector] {
        &self.sectors
    }

    #[inline]
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    #[inline]
    pub fn locations(&self) -> &[Location] {
        &self.locations
    }

    pub fn sector(&self, index: usize) -> Option<&Sector> {
        self.sectors.get(index)
    }

    /// Edges of `sector` in loop order.
    pub fn sector_edges<'a>(&'a self, sector: &'a Sector) -> impl Iterator<Item = &'a Edge> + 'a {
        sector.edge_ids.iter().map(move |&id| &self.edges[id])
    }

    /// Sector on the far side of a portal edge.
    pub fn back_sector(&self, edge: &Edge) -> Option<&Sector> {
        edge.back_poly.and_then(|i| self.sectors.get(i))
    }
}
