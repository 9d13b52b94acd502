//! Delaunay triangulation
//!
//! A thin adapter over `spade`, whose exact geometric predicates give the
//! same answer at any coordinate scale. Positions are rescaled by a power
//! of two before they are handed over, which keeps every finite input
//! inside the range spade accepts without perturbing any predicate.
//!
//! Output triangles are index triples into the input slice, each rotated
//! so its smallest index comes first, listed in ascending order. The same
//! points always produce the same triangles.

use spade::{DelaunayTriangulation, HasPosition, Point2, Triangulation};
use tracing::debug;
use weft_core::Position;

/// Three indices into the point slice a triangulation was computed over
pub type Triangle = [usize; 3];

/// Largest binary exponent the scaled coordinates are pulled away from
const MAX_EXPONENT: i32 = 1020;

/// An input point tagged with its index
#[derive(Debug, Clone, Copy)]
struct Site {
    position: Point2<f64>,
    index: usize,
}

impl HasPosition for Site {
    type Scalar = f64;

    fn position(&self) -> Point2<f64> {
        self.position
    }
}

/// Triangulate `points`
///
/// Returns an empty vector when fewer than three distinct points are
/// given or when every point is collinear; callers treat that as "no
/// geometric graph available". Coincident points are triangulated once:
/// only the lowest-index occurrence receives triangles.
///
/// Non-finite coordinates must be rejected by the caller.
pub fn triangulate(points: &[Position]) -> Vec<Triangle> {
    let sites = distinct_sites(points);
    if sites.len() < 3 {
        return Vec::new();
    }

    let triangulation = match DelaunayTriangulation::<Site>::bulk_load(sites) {
        Ok(triangulation) => triangulation,
        Err(e) => {
            debug!(error = ?e, points = points.len(), "Triangulation rejected input");
            return Vec::new();
        }
    };

    let mut triangles: Vec<Triangle> = triangulation
        .inner_faces()
        .map(|face| canonical(face.vertices().map(|v| v.data().index)))
        .collect();
    triangles.sort_unstable();
    triangles
}

/// Scaled sites for every distinct point, lowest index first among equals
fn distinct_sites(points: &[Position]) -> Vec<Site> {
    let factor = scale_factor(points);
    let mut sites: Vec<Site> = points
        .iter()
        .enumerate()
        .map(|(index, p)| Site {
            position: spade::mitigate_underflow(Point2::new(p.x * factor, p.y * factor)),
            index,
        })
        .collect();

    sites.sort_by(|a, b| {
        a.position
            .x
            .total_cmp(&b.position.x)
            .then_with(|| a.position.y.total_cmp(&b.position.y))
            .then_with(|| a.index.cmp(&b.index))
    });
    sites.dedup_by(|later, earlier| later.position == earlier.position);
    sites.sort_by_key(|site| site.index);
    sites
}

/// Power of two bringing the largest coordinate magnitude near 1
///
/// Multiplying by a power of two is exact, so the scaled points keep the
/// orientation and incircle relations of the originals.
fn scale_factor(points: &[Position]) -> f64 {
    let largest = points
        .iter()
        .flat_map(|p| [p.x.abs(), p.y.abs()])
        .fold(0.0_f64, f64::max);
    if largest == 0.0 || !largest.is_finite() {
        return 1.0;
    }

    let exponent = largest.log2().ceil() as i32;
    2.0_f64.powi(-exponent.clamp(-MAX_EXPONENT, MAX_EXPONENT))
}

/// Rotate so the smallest index leads, preserving orientation
fn canonical(mut triangle: Triangle) -> Triangle {
    let lead = (0..3).min_by_key(|&i| triangle[i]).unwrap_or(0);
    triangle.rotate_left(lead);
    triangle
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use std::collections::BTreeSet;

    fn pts(coords: &[(f64, f64)]) -> Vec<Position> {
        coords.iter().map(|&c| Position::from(c)).collect()
    }

    fn edge_set(triangles: &[Triangle]) -> BTreeSet<(usize, usize)> {
        let mut edges = BTreeSet::new();
        for t in triangles {
            for (a, b) in [(t[0], t[1]), (t[1], t[2]), (t[2], t[0])] {
                edges.insert((a.min(b), a.max(b)));
            }
        }
        edges
    }

    fn random_points(seed: u64, count: usize, origin: (f64, f64), extent: f64) -> Vec<Position> {
        let mut rng = StdRng::seed_from_u64(seed);
        (0..count)
            .map(|_| {
                Position::new(
                    origin.0 + rng.random_range(0.0..extent),
                    origin.1 + rng.random_range(0.0..extent),
                )
            })
            .collect()
    }

    /// Whether `p` lies strictly inside the circumcircle of `a`, `b`, `c`
    ///
    /// Coordinates are taken relative to `a` and divided by the triangle's
    /// extent, so the tolerance is relative to the triangle's own size.
    fn inside_circumcircle(a: Position, b: Position, c: Position, p: Position) -> bool {
        let extent = [b, c]
            .iter()
            .flat_map(|q| [(q.x - a.x).abs(), (q.y - a.y).abs()])
            .fold(0.0_f64, f64::max);
        let rel = |q: Position| ((q.x - a.x) / extent, (q.y - a.y) / extent);
        let (bx, by) = rel(b);
        let (cx, cy) = rel(c);
        let (px, py) = rel(p);

        let orient = bx * cy - by * cx;
        let det = (bx * bx + by * by) * (cx * py - cy * px)
            - (cx * cx + cy * cy) * (bx * py - by * px)
            + (px * px + py * py) * (bx * cy - by * cx);
        det * orient.signum() > 1e-9
    }

    fn assert_delaunay(points: &[Position], label: &str) {
        let triangles = triangulate(points);
        assert!(!triangles.is_empty(), "{label}: no triangles");

        for t in &triangles {
            let [a, b, c] = t.map(|i| points[i]);
            for (i, p) in points.iter().enumerate() {
                if t.contains(&i) {
                    continue;
                }
                assert!(
                    !inside_circumcircle(a, b, c, *p),
                    "{label}: point {i} lies inside circumcircle of {t:?}"
                );
            }
        }

        let used: BTreeSet<usize> = triangles.iter().flatten().copied().collect();
        assert_eq!(used.len(), points.len(), "{label}: unused points");
    }

    #[test]
    fn test_fewer_than_three_points_is_empty() {
        assert!(triangulate(&[]).is_empty());
        assert!(triangulate(&pts(&[(0.0, 0.0)])).is_empty());
        assert!(triangulate(&pts(&[(0.0, 0.0), (1.0, 1.0)])).is_empty());
        assert!(triangulate(&pts(&[(2.0, 2.0), (2.0, 2.0), (2.0, 2.0)])).is_empty());
    }

    #[test]
    fn test_single_triangle() {
        let triangles = triangulate(&pts(&[(0.0, 0.0), (10.0, 0.0), (5.0, 8.0)]));
        assert_eq!(triangles.len(), 1);
        assert_eq!(triangles[0][0], 0);

        let mut vertices = triangles[0];
        vertices.sort();
        assert_eq!(vertices, [0, 1, 2]);
    }

    #[test]
    fn test_collinear_points_are_empty() {
        let triangles = triangulate(&pts(&[(0.0, 0.0), (1.0, 1.0), (2.0, 2.0), (3.0, 3.0)]));
        assert!(triangles.is_empty());
    }

    #[test]
    fn test_square_has_five_edges() {
        let triangles = triangulate(&pts(&[(0.0, 0.0), (10.0, 0.0), (10.0, 10.0), (0.0, 10.0)]));
        assert_eq!(triangles.len(), 2);
        assert_eq!(edge_set(&triangles).len(), 5);
    }

    #[test]
    fn test_interior_point_connects_to_hull() {
        let triangles = triangulate(&pts(&[
            (0.0, 0.0),
            (100.0, 0.0),
            (50.0, 100.0),
            (50.0, 30.0),
        ]));
        assert_eq!(triangles.len(), 3);

        let edges = edge_set(&triangles);
        assert!(edges.contains(&(0, 3)));
        assert!(edges.contains(&(1, 3)));
        assert!(edges.contains(&(2, 3)));
    }

    #[test]
    fn test_duplicate_point_is_ignored() {
        let triangles = triangulate(&pts(&[
            (0.0, 0.0),
            (10.0, 0.0),
            (5.0, 8.0),
            (10.0, 0.0),
        ]));
        assert_eq!(triangles.len(), 1);
        assert!(triangles[0].iter().all(|&i| i != 3));
    }

    #[test]
    fn test_deterministic_output() {
        let points = random_points(7, 40, (0.0, 0.0), 1000.0);
        assert_eq!(triangulate(&points), triangulate(&points));
    }

    #[test]
    fn test_empty_circumcircle_at_every_scale() {
        for (seed, extent) in [(42, 1e3), (43, 1e-1), (44, 1e-2), (45, 1e-3), (46, 1e-5), (47, 1e9)] {
            let points = random_points(seed, 60, (0.0, 0.0), extent);
            assert_delaunay(&points, &format!("extent {extent:e}"));
        }
    }

    #[test]
    fn test_geographic_coordinates() {
        // A cluster a few hundred meters wide, in degrees
        let points = random_points(11, 50, (51.5, -0.12), 5e-3);
        assert_delaunay(&points, "lat/long");
    }

    #[test]
    fn test_huge_coordinates() {
        let points: Vec<Position> = random_points(5, 30, (0.0, 0.0), 1.0)
            .into_iter()
            .map(|p| Position::new(p.x * 1e300, p.y * 1e300))
            .collect();
        let triangles = triangulate(&points);

        let used: BTreeSet<usize> = triangles.iter().flatten().copied().collect();
        assert_eq!(used.len(), points.len());
    }

    #[test]
    fn test_scaling_preserves_topology() {
        let points = random_points(9, 40, (0.0, 0.0), 1.0);
        let shrunk: Vec<Position> = points
            .iter()
            .map(|p| Position::new(p.x * 1e-6, p.y * 1e-6))
            .collect();
        assert_eq!(edge_set(&triangulate(&points)), edge_set(&triangulate(&shrunk)));
    }

    #[test]
    fn test_canonical_rotation() {
        assert_eq!(canonical([4, 1, 7]), [1, 7, 4]);
        assert_eq!(canonical([2, 9, 5]), [2, 9, 5]);
    }
}
