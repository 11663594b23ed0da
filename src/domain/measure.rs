//! Planar measurements shared by snapping, selection and vertex picking

use geo_types::Coord;

use super::geometry::Envelope;

/// Euclidean distance between two coordinates
#[inline]
pub fn distance(a: Coord, b: Coord) -> f64 {
    (a.x - b.x).hypot(a.y - b.y)
}

/// Project `p` onto the segment `a`-`b`, clamped to the segment ends
pub fn closest_point_on_segment(p: Coord, a: Coord, b: Coord) -> Coord {
    let dx = b.x - a.x;
    let dy = b.y - a.y;
    let len2 = dx * dx + dy * dy;
    if len2 == 0.0 {
        return a;
    }
    let t = (((p.x - a.x) * dx + (p.y - a.y) * dy) / len2).clamp(0.0, 1.0);
    Coord {
        x: a.x + t * dx,
        y: a.y + t * dy,
    }
}

/// Distance from `p` to the segment `a`-`b`
#[inline]
pub fn distance_to_segment(p: Coord, a: Coord, b: Coord) -> f64 {
    distance(p, closest_point_on_segment(p, a, b))
}

/// Liang-Barsky clip test of a segment against an envelope
pub fn segment_intersects_envelope(a: Coord, b: Coord, env: &Envelope) -> bool {
    if env.contains(a) || env.contains(b) {
        return true;
    }
    let dx = b.x - a.x;
    let dy = b.y - a.y;
    let mut t0 = 0.0_f64;
    let mut t1 = 1.0_f64;
    let edges = [
        (-dx, a.x - env.min_x),
        (dx, env.max_x - a.x),
        (-dy, a.y - env.min_y),
        (dy, env.max_y - a.y),
    ];
    for (p, q) in edges {
        if p == 0.0 {
            // Parallel to this edge and outside of it
            if q < 0.0 {
                return false;
            }
            continue;
        }
        let r = q / p;
        if p < 0.0 {
            if r > t1 {
                return false;
            }
            t0 = t0.max(r);
        } else {
            if r < t0 {
                return false;
            }
            t1 = t1.min(r);
        }
    }
    t0 <= t1
}

/// Even-odd point in polygon test; the ring may be open or closed
pub fn point_in_ring(p: Coord, ring: &[Coord]) -> bool {
    let n = ring.len();
    if n < 3 {
        return false;
    }
    let mut inside = false;
    let mut j = n - 1;
    for i in 0..n {
        let a = ring[i];
        let b = ring[j];
        if (a.y > p.y) != (b.y > p.y) && p.x < (b.x - a.x) * (p.y - a.y) / (b.y - a.y) + a.x {
            inside = !inside;
        }
        j = i;
    }
    inside
}

/// Number of pairwise distinct coordinates
pub fn distinct_count(coords: &[Coord]) -> usize {
    let mut seen: Vec<Coord> = Vec::with_capacity(coords.len());
    for c in coords {
        if !seen.contains(c) {
            seen.push(*c);
        }
    }
    seen.len()
}

/// Approximate a circle as an open ring of `4 * segments_per_quadrant` vertices
pub fn circle_ring(center: Coord, radius: f64, segments_per_quadrant: usize) -> Vec<Coord> {
    let count = 4 * segments_per_quadrant.max(1);
    let step = std::f64::consts::TAU / count as f64;
    (0..count)
        .map(|i| {
            let angle = step * i as f64;
            Coord {
                x: center.x + radius * angle.cos(),
                y: center.y + radius * angle.sin(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo_types::coord;

    #[test]
    fn test_closest_point_clamps_to_segment_ends() {
        let a = coord! { x: 0.0, y: 0.0 };
        let b = coord! { x: 10.0, y: 0.0 };
        assert_eq!(
            closest_point_on_segment(coord! { x: 4.0, y: 3.0 }, a, b),
            coord! { x: 4.0, y: 0.0 }
        );
        assert_eq!(closest_point_on_segment(coord! { x: -5.0, y: 1.0 }, a, b), a);
        assert_eq!(closest_point_on_segment(coord! { x: 15.0, y: 1.0 }, a, b), b);
        assert_eq!(distance_to_segment(coord! { x: 4.0, y: 3.0 }, a, b), 3.0);
    }

    #[test]
    fn test_degenerate_segment_projects_to_start() {
        let a = coord! { x: 2.0, y: 2.0 };
        assert_eq!(closest_point_on_segment(coord! { x: 5.0, y: 6.0 }, a, a), a);
    }

    #[test]
    fn test_segment_crossing_envelope_without_vertices_inside() {
        let env = Envelope::new(0.0, 0.0, 10.0, 10.0);
        let a = coord! { x: -5.0, y: 5.0 };
        let b = coord! { x: 15.0, y: 5.0 };
        assert!(segment_intersects_envelope(a, b, &env));
        let c = coord! { x: -5.0, y: 20.0 };
        let d = coord! { x: 15.0, y: 20.0 };
        assert!(!segment_intersects_envelope(c, d, &env));
        // Diagonal passing beside the corner
        let e = coord! { x: 9.0, y: 12.0 };
        let f = coord! { x: 12.0, y: 9.0 };
        assert!(!segment_intersects_envelope(e, f, &env));
    }

    #[test]
    fn test_point_in_ring() {
        let ring = vec![
            coord! { x: 0.0, y: 0.0 },
            coord! { x: 10.0, y: 0.0 },
            coord! { x: 10.0, y: 10.0 },
            coord! { x: 0.0, y: 10.0 },
        ];
        assert!(point_in_ring(coord! { x: 5.0, y: 5.0 }, &ring));
        assert!(!point_in_ring(coord! { x: 15.0, y: 5.0 }, &ring));
        assert!(!point_in_ring(coord! { x: 5.0, y: 5.0 }, &ring[..2]));
    }

    #[test]
    fn test_distinct_count_ignores_repeats() {
        let a = coord! { x: 1.0, y: 1.0 };
        let b = coord! { x: 2.0, y: 1.0 };
        assert_eq!(distinct_count(&[a, a, b, a]), 2);
        assert_eq!(distinct_count(&[]), 0);
    }

    #[test]
    fn test_circle_ring_stays_on_radius() {
        let center = coord! { x: 3.0, y: -2.0 };
        let ring = circle_ring(center, 5.0, 4);
        assert_eq!(ring.len(), 16);
        for c in ring {
            assert!((distance(center, c) - 5.0).abs() < 1e-9);
        }
    }
}
