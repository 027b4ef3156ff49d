//! Geometry and level construction errors (renderer-agnostic).

use thiserror::Error;

/// A sector outline that cannot be tessellated.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum GeometryError {
    #[error("polygon needs at least 3 vertices, got {count}")]
    TooFewVertices { count: usize },

    #[error("polygon has zero area")]
    ZeroArea,

    #[error("edge {index} has zero length")]
    ZeroLengthEdge { index: usize },

    #[error("edges {a} and {b} cross or touch")]
    SelfIntersecting { a: usize, b: usize },

    #[error("outline of {remaining} vertices could not be tessellated")]
    NoEar { remaining: usize },
}

/// A level that violates a structural precondition at load time.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum LevelError {
    #[error("sector {sector}: {source}")]
    Geometry {
        sector: usize,
        #[source]
        source: GeometryError,
    },

    #[error("edge {edge} points at back sector {back_poly}, but only {sectors} sectors exist")]
    PortalOutOfRange {
        edge: usize,
        back_poly: usize,
        sectors: usize,
    },

    #[error("location {location} lies in sector {polygon}, but only {sectors} sectors exist")]
    LocationOutOfRange {
        location: usize,
        polygon: usize,
        sectors: usize,
    },
}

pub type LevelResult<T> = Result<T, LevelError>;
