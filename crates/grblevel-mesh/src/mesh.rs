//! A Delaunay-triangulated bed map and the bounded XY→Z offset lookup over
//! it.
//!
//! The original program never triangulated; it picked the nearest three
//! probe points by XY distance and interpolated a plane through them, a
//! heuristic that can pick a neighbour twice when two candidates tie on
//! distance and produces a degenerate (non-planar, or duplicate-vertex)
//! plane. Building an actual 2-D Delaunay triangulation up front avoids
//! that class of bug entirely and gives every XY position inside the hull
//! exactly one well-defined covering triangle.

use grblevel_core::point::Point;
use grblevel_core::triangle::{Triangle, EPSILON};

#[derive(Debug, Clone, Copy)]
struct BBox {
    min_x: f64,
    min_y: f64,
    max_x: f64,
    max_y: f64,
}

impl BBox {
    fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.min_x && x <= self.max_x && y >= self.min_y && y <= self.max_y
    }
}

#[derive(Debug, Clone)]
pub struct Mesh {
    bbox: BBox,
    triangles: Vec<Triangle>,
}

#[derive(Debug, thiserror::Error)]
pub enum MeshError {
    #[error("mesh requires at least 3 points, got {0}")]
    TooFewPoints(usize),
}

impl Mesh {
    /// Builds a mesh from `points`' XY projection via an incremental
    /// (Bowyer-Watson) Delaunay triangulation, then lifts each resulting
    /// triangle's vertices back to their original Z.
    pub fn new(points: &[Point]) -> Result<Mesh, MeshError> {
        if points.len() < 3 {
            tracing::warn!(count = points.len(), "too few points to triangulate a bed map");
            return Err(MeshError::TooFewPoints(points.len()));
        }
        tracing::debug!(count = points.len(), "triangulating bed map");

        let (min_x, max_x) = min_max(points.iter().map(|p| p.x));
        let (min_y, max_y) = min_max(points.iter().map(|p| p.y));
        let bbox = BBox {
            min_x: min_x - EPSILON,
            min_y: min_y - EPSILON,
            max_x: max_x + EPSILON,
            max_y: max_y + EPSILON,
        };

        let index_triangles = bowyer_watson(points);
        let triangles = index_triangles
            .into_iter()
            .map(|(i, j, k)| Triangle::new(points[i], points[j], points[k]))
            .collect();

        Ok(Mesh { bbox, triangles })
    }

    /// `(true, z)` from the first triangle covering `(x, y)`, else
    /// `(false, 0.0)`. Ties on a shared edge resolve to whichever triangle
    /// is scanned first — acceptable since both give identical Z there.
    pub fn offset_z(&self, x: f64, y: f64) -> (bool, f64) {
        if !self.bbox.contains(x, y) {
            return (false, 0.0);
        }
        for t in &self.triangles {
            if t.contains_xy(x, y) {
                return (true, t.z_at(x, y));
            }
        }
        (false, 0.0)
    }

    pub fn triangles(&self) -> &[Triangle] {
        &self.triangles
    }
}

impl crate::leveller::ZOffsetter for Mesh {
    fn offset_z(&self, x: f64, y: f64) -> (bool, f64) {
        Mesh::offset_z(self, x, y)
    }
}

fn min_max(values: impl Iterator<Item = f64>) -> (f64, f64) {
    values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    })
}

/// Incremental Delaunay triangulation over the XY projection of `points`,
/// via a super-triangle and point-by-point insertion (Bowyer-Watson).
/// Returns triangles as index triples into `points`. Appropriate for the
/// small point counts (a few hundred at most) a bed map realistically has.
fn bowyer_watson(points: &[Point]) -> Vec<(usize, usize, usize)> {
    #[derive(Clone, Copy)]
    struct Tri {
        // indices into `verts`; the last 3 entries are the super-triangle
        a: usize,
        b: usize,
        c: usize,
    }

    let (min_x, max_x) = min_max(points.iter().map(|p| p.x));
    let (min_y, max_y) = min_max(points.iter().map(|p| p.y));
    let dx = (max_x - min_x).max(1.0);
    let dy = (max_y - min_y).max(1.0);
    let delta = dx.max(dy) * 20.0;
    let mid_x = (min_x + max_x) / 2.0;
    let mid_y = (min_y + max_y) / 2.0;

    let mut verts: Vec<(f64, f64)> = points.iter().map(|p| (p.x, p.y)).collect();
    let super_a = verts.len();
    verts.push((mid_x - delta, mid_y - delta));
    let super_b = verts.len();
    verts.push((mid_x + delta, mid_y - delta));
    let super_c = verts.len();
    verts.push((mid_x, mid_y + delta));

    let mut tris = vec![Tri { a: super_a, b: super_b, c: super_c }];

    for (pi, &(px, py)) in points.iter().enumerate() {
        let mut bad = Vec::new();
        for (ti, t) in tris.iter().enumerate() {
            if in_circumcircle(verts[t.a], verts[t.b], verts[t.c], (px, py)) {
                bad.push(ti);
            }
        }

        let mut edges = Vec::new();
        for &ti in &bad {
            let t = tris[ti];
            for e in [(t.a, t.b), (t.b, t.c), (t.c, t.a)] {
                edges.push(e);
            }
        }
        let boundary: Vec<(usize, usize)> = edges
            .iter()
            .copied()
            .filter(|&(u, v)| {
                edges
                    .iter()
                    .filter(|&&(a, b)| (a == u && b == v) || (a == v && b == u))
                    .count()
                    == 1
            })
            .collect();

        for &ti in bad.iter().rev() {
            tris.remove(ti);
        }

        for (u, v) in boundary {
            tris.push(Tri { a: u, b: v, c: pi });
        }
    }

    tris.retain(|t| t.a < super_a && t.b < super_a && t.c < super_a);
    tris.into_iter().map(|t| (t.a, t.b, t.c)).collect()
}

fn in_circumcircle(a: (f64, f64), b: (f64, f64), c: (f64, f64), p: (f64, f64)) -> bool {
    let ax = a.0 - p.0;
    let ay = a.1 - p.1;
    let bx = b.0 - p.0;
    let by = b.1 - p.1;
    let cx = c.0 - p.0;
    let cy = c.1 - p.1;

    let det = (ax * ax + ay * ay) * (bx * cy - cx * by)
        - (bx * bx + by * by) * (ax * cy - cx * ay)
        + (cx * cx + cy * cy) * (ax * by - bx * ay);

    // Orientation-dependent sign: positive for a CCW triangle means p is
    // inside. Normalise against triangle orientation so insertion order
    // doesn't flip the test.
    let orient = (b.0 - a.0) * (c.1 - a.1) - (b.1 - a.1) * (c.0 - a.0);
    if orient > 0.0 {
        det > 0.0
    } else {
        det < 0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_fewer_than_three_points() {
        let pts = [Point::new(0.0, 0.0, 0.0), Point::new(1.0, 0.0, 0.0)];
        assert!(matches!(Mesh::new(&pts), Err(MeshError::TooFewPoints(2))));
    }

    #[test]
    fn offset_z_recovers_original_z_at_each_probe_point() {
        let pts = vec![
            Point::new(0.0, 0.0, 1.0),
            Point::new(10.0, 0.0, 2.0),
            Point::new(0.0, 10.0, 3.0),
            Point::new(10.0, 10.0, 4.0),
        ];
        let mesh = Mesh::new(&pts).unwrap();
        for p in &pts {
            let (found, z) = mesh.offset_z(p.x, p.y);
            assert!(found);
            assert!((z - p.z).abs() < 1e-6);
        }
    }

    #[test]
    fn offset_z_misses_outside_the_bounding_box() {
        let pts = vec![
            Point::new(0.0, 0.0, 0.0),
            Point::new(10.0, 0.0, 0.0),
            Point::new(0.0, 10.0, 0.0),
        ];
        let mesh = Mesh::new(&pts).unwrap();
        let (found, _) = mesh.offset_z(1000.0, 1000.0);
        assert!(!found);
    }

    #[test]
    fn offset_z_interpolates_a_flat_rising_plane() {
        // mirrors the spec's mesh-leveller scenario: a grid rising 30mm per 100mm in X
        let pts = vec![
            Point::new(-700.0, -450.0, -80.0),
            Point::new(-700.0, -550.0, -80.0),
            Point::new(-600.0, -450.0, -50.0),
            Point::new(-600.0, -550.0, -50.0),
        ];
        let mesh = Mesh::new(&pts).unwrap();
        let (found, z) = mesh.offset_z(-650.0, -500.0);
        assert!(found);
        assert!((z - -65.0).abs() < 1e-6);
    }
}
