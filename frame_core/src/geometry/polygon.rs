//! Plan-view (XY) polygon helpers.

use serde::{Deserialize, Serialize};

/// Plan coordinate in feet
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PlanPoint {
    pub x: f64,
    pub y: f64,
}

impl PlanPoint {
    pub fn new(x: f64, y: f64) -> Self {
        PlanPoint { x, y }
    }

    pub fn distance(&self, other: &PlanPoint) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    /// Direction to `other` in radians, counter-clockwise from +X
    pub fn angle_to(&self, other: &PlanPoint) -> f64 {
        (other.y - self.y).atan2(other.x - self.x)
    }

    pub fn approx_eq(&self, other: &PlanPoint, tol: f64) -> bool {
        self.distance(other) <= tol
    }
}

/// Signed area by the shoelace formula. Counter-clockwise is positive.
pub fn signed_area(points: &[PlanPoint]) -> f64 {
    let n = points.len();
    if n < 3 {
        return 0.0;
    }
    let twice: f64 = (0..n)
        .map(|i| {
            let (a, b) = (points[i], points[(i + 1) % n]);
            a.x * b.y - b.x * a.y
        })
        .sum();
    twice / 2.0
}

/// Area centroid of a simple polygon (vertex average when degenerate)
pub fn centroid(points: &[PlanPoint]) -> PlanPoint {
    let a = signed_area(points);
    let n = points.len();
    if a.abs() < 1e-12 || n < 3 {
        let (sx, sy) = points.iter().fold((0.0, 0.0), |(sx, sy), p| (sx + p.x, sy + p.y));
        let count = n.max(1) as f64;
        return PlanPoint::new(sx / count, sy / count);
    }
    let (mut cx, mut cy) = (0.0, 0.0);
    for i in 0..n {
        let (p, q) = (points[i], points[(i + 1) % n]);
        let cross = p.x * q.y - q.x * p.y;
        cx += (p.x + q.x) * cross;
        cy += (p.y + q.y) * cross;
    }
    PlanPoint::new(cx / (6.0 * a), cy / (6.0 * a))
}

/// Even-odd ray casting test. Points on the boundary are unspecified.
pub fn contains_point(polygon: &[PlanPoint], p: &PlanPoint) -> bool {
    let n = polygon.len();
    let mut inside = false;
    let mut j = n.wrapping_sub(1);
    for i in 0..n {
        let (a, b) = (polygon[i], polygon[j]);
        if (a.y > p.y) != (b.y > p.y) {
            let x_cross = (b.x - a.x) * (p.y - a.y) / (b.y - a.y) + a.x;
            if p.x < x_cross {
                inside = !inside;
            }
        }
        j = i;
    }
    inside
}

fn orientation(a: &PlanPoint, b: &PlanPoint, c: &PlanPoint) -> f64 {
    (b.x - a.x) * (c.y - a.y) - (b.y - a.y) * (c.x - a.x)
}

fn on_segment(a: &PlanPoint, b: &PlanPoint, p: &PlanPoint, tol: f64) -> bool {
    p.x >= a.x.min(b.x) - tol && p.x <= a.x.max(b.x) + tol && p.y >= a.y.min(b.y) - tol && p.y <= a.y.max(b.y) + tol
}

/// Whether closed segments `ab` and `cd` touch or cross.
pub fn segments_intersect(a: &PlanPoint, b: &PlanPoint, c: &PlanPoint, d: &PlanPoint, tol: f64) -> bool {
    let scale = a.distance(b).max(c.distance(d)).max(1.0);
    let eps = tol * scale;
    let d1 = orientation(c, d, a);
    let d2 = orientation(c, d, b);
    let d3 = orientation(a, b, c);
    let d4 = orientation(a, b, d);

    if ((d1 > eps && d2 < -eps) || (d1 < -eps && d2 > eps)) && ((d3 > eps && d4 < -eps) || (d3 < -eps && d4 > eps)) {
        return true;
    }
    (d1.abs() <= eps && on_segment(c, d, a, tol))
        || (d2.abs() <= eps && on_segment(c, d, b, tol))
        || (d3.abs() <= eps && on_segment(a, b, c, tol))
        || (d4.abs() <= eps && on_segment(a, b, d, tol))
}

/// Axis-aligned plan bounds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min: PlanPoint,
    pub max: PlanPoint,
}

impl Bounds {
    pub fn of(points: impl IntoIterator<Item = PlanPoint>) -> Option<Bounds> {
        points.into_iter().fold(None, |acc, p| {
            Some(match acc {
                None => Bounds { min: p, max: p },
                Some(b) => Bounds {
                    min: PlanPoint::new(b.min.x.min(p.x), b.min.y.min(p.y)),
                    max: PlanPoint::new(b.max.x.max(p.x), b.max.y.max(p.y)),
                },
            })
        })
    }

    /// Whether `p` lies on the x-extremes and/or y-extremes within `tol`
    pub fn extremes(&self, p: &PlanPoint, tol: f64) -> (bool, bool) {
        let on_x = (p.x - self.min.x).abs() < tol || (p.x - self.max.x).abs() < tol;
        let on_y = (p.y - self.min.y).abs() < tol || (p.y - self.max.y).abs() < tol;
        (on_x, on_y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(size: f64) -> Vec<PlanPoint> {
        vec![
            PlanPoint::new(0.0, 0.0),
            PlanPoint::new(size, 0.0),
            PlanPoint::new(size, size),
            PlanPoint::new(0.0, size),
        ]
    }

    #[test]
    fn test_signed_area_orientation() {
        let mut sq = square(10.0);
        assert_eq!(signed_area(&sq), 100.0);
        sq.reverse();
        assert_eq!(signed_area(&sq), -100.0);
    }

    #[test]
    fn test_centroid() {
        let c = centroid(&square(10.0));
        assert!((c.x - 5.0).abs() < 1e-12 && (c.y - 5.0).abs() < 1e-12);
    }

    #[test]
    fn test_contains_point() {
        let sq = square(10.0);
        assert!(contains_point(&sq, &PlanPoint::new(3.0, 4.0)));
        assert!(!contains_point(&sq, &PlanPoint::new(13.0, 4.0)));
    }

    #[test]
    fn test_segment_crossing() {
        let tol = 1e-6;
        let (a, b) = (PlanPoint::new(0.0, 0.0), PlanPoint::new(10.0, 10.0));
        let (c, d) = (PlanPoint::new(0.0, 10.0), PlanPoint::new(10.0, 0.0));
        assert!(segments_intersect(&a, &b, &c, &d, tol));

        // T-junction without a shared joint
        let (e, f) = (PlanPoint::new(5.0, 5.0), PlanPoint::new(5.0, 20.0));
        assert!(segments_intersect(&a, &b, &e, &f, tol));

        // parallel, apart
        let (g, h) = (PlanPoint::new(0.0, 1.0), PlanPoint::new(10.0, 11.0));
        assert!(!segments_intersect(&a, &b, &g, &h, tol));
    }

    #[test]
    fn test_bounds_extremes() {
        let b = Bounds::of(square(10.0)).unwrap();
        assert_eq!(b.extremes(&PlanPoint::new(0.0, 10.0), 0.01), (true, true));
        assert_eq!(b.extremes(&PlanPoint::new(5.0, 10.0), 0.01), (false, true));
        assert_eq!(b.extremes(&PlanPoint::new(5.0, 5.0), 0.01), (false, false));
    }
}
