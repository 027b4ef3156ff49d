//! Sector tessellation for simple polygons (no holes), backed by `earcutr`.
//!
//! Output triangles keep the winding of the input outline, so a
//! counter-clockwise sector yields counter-clockwise floor triangles.

use crate::{GeometryError, Vec2};

/// Relative tolerance; scaled by the outline's extent before use.
const EPSILON: f32 = 1e-6;

/// Signed area of a closed outline; positive for counter-clockwise loops.
pub fn signed_area(points: &[Vec2]) -> f32 {
    let n = points.len();
    let twice: f32 = (0..n).map(|i| points[i].perp_dot(points[(i + 1) % n])).sum();
    twice * 0.5
}

/// Largest side of the outline's bounding box.
fn extent(points: &[Vec2]) -> f32 {
    let (min, max) = points
        .iter()
        .fold((Vec2::splat(f32::MAX), Vec2::splat(f32::MIN)), |(lo, hi), &p| {
            (lo.min(p), hi.max(p))
        });
    (max - min).max_element()
}

/// Triangulate a simple polygon.
///
/// Returns at most `3 * (n - 2)` indices into `points`; exactly that many
/// unless some vertices lie on a straight run.
pub fn triangulate(points: &[Vec2]) -> Result<Vec<usize>, GeometryError> {
    let n = points.len();
    if n < 3 {
        return Err(GeometryError::TooFewVertices { count: n });
    }

    let size = extent(points);
    let area = signed_area(points);
    if size <= 0.0 || area.abs() <= EPSILON * size * size {
        return Err(GeometryError::ZeroArea);
    }
    if let Some((a, b)) = find_crossing(points, EPSILON * size * size) {
        return Err(GeometryError::SelfIntersecting { a, b });
    }

    let flat: Vec<f64> = points
        .iter()
        .flat_map(|p| [p.x as f64, p.y as f64])
        .collect();
    let mut indices = earcutr::earcut(&flat, &[], 2)
        .map_err(|_| GeometryError::NoEar { remaining: n })?;
    if indices.is_empty() || indices.len() % 3 != 0 || indices.len() > 3 * (n - 2) {
        return Err(GeometryError::NoEar { remaining: n });
    }

    // earcut emits one fixed orientation; flip to match the outline.
    let winding = area.signum();
    for t in indices.chunks_exact_mut(3) {
        let tri = signed_area(&[points[t[0]], points[t[1]], points[t[2]]]);
        if tri * winding < 0.0 {
            t.swap(1, 2);
        }
    }

    Ok(indices)
}

/// First pair of non-adjacent edges that touch or cross, as edge indices.
/// Edge `i` runs from `points[i]` to `points[i + 1]`.
fn find_crossing(points: &[Vec2], eps: f32) -> Option<(usize, usize)> {
    let n = points.len();
    for i in 0..n {
        for j in i + 2..n {
            // Edge n-1 shares vertex 0 with edge 0.
            if i == 0 && j == n - 1 {
                continue;
            }
            let (a, b) = (points[i], points[(i + 1) % n]);
            let (c, d) = (points[j], points[(j + 1) % n]);
            if segments_touch(a, b, c, d, eps) {
                return Some((i, j));
            }
        }
    }
    None
}

#[inline]
fn orient(a: Vec2, b: Vec2, c: Vec2) -> f32 {
    (b - a).perp_dot(c - a)
}

/// `p` lies within the bounding box of segment `a..b`.
#[inline]
fn within(a: Vec2, b: Vec2, p: Vec2) -> bool {
    p.cmpge(a.min(b)).all() && p.cmple(a.max(b)).all()
}

fn segments_touch(a: Vec2, b: Vec2, c: Vec2, d: Vec2, eps: f32) -> bool {
    let d1 = orient(c, d, a);
    let d2 = orient(c, d, b);
    let d3 = orient(a, b, c);
    let d4 = orient(a, b, d);

    let straddles = |p: f32, q: f32| (p > eps && q < -eps) || (p < -eps && q > eps);
    if straddles(d1, d2) && straddles(d3, d4) {
        return true;
    }

    (d1.abs() <= eps && within(c, d, a))
        || (d2.abs() <= eps && within(c, d, b))
        || (d3.abs() <= eps && within(a, b, c))
        || (d4.abs() <= eps && within(a, b, d))
}
