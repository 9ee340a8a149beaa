//! Free-standing geometry helpers shared by hit-testing, binding and snapping.

use kurbo::{Point, Rect, Vec2};

/// Rotate `point` around `center` by `angle` radians.
pub fn rotate_point(point: Point, center: Point, angle: f64) -> Point {
    if angle == 0.0 {
        return point;
    }
    let (sin, cos) = angle.sin_cos();
    let d = point - center;
    Point::new(
        center.x + d.x * cos - d.y * sin,
        center.y + d.x * sin + d.y * cos,
    )
}

/// Rotate a vector by `angle` radians.
pub fn rotate_vec(v: Vec2, angle: f64) -> Vec2 {
    let (sin, cos) = angle.sin_cos();
    Vec2::new(v.x * cos - v.y * sin, v.x * sin + v.y * cos)
}

/// Normalize an angle into `[0, 2π)`.
pub fn normalize_angle(angle: f64) -> f64 {
    let tau = std::f64::consts::TAU;
    let a = angle % tau;
    if a < 0.0 { a + tau } else { a }
}

/// Calculate distance from a point to a line segment.
pub fn point_to_segment_dist(point: Point, a: Point, b: Point) -> f64 {
    let ab = b - a;
    let ap = point - a;
    let len_sq = ab.hypot2();
    if len_sq < f64::EPSILON {
        return ap.hypot();
    }
    let t = (ap.dot(ab) / len_sq).clamp(0.0, 1.0);
    let proj = a + ab * t;
    (point - proj).hypot()
}

/// Calculate minimum distance from a point to a polyline.
pub fn point_to_polyline_dist(point: Point, points: &[Point]) -> f64 {
    match points {
        [] => f64::INFINITY,
        [single] => (point - *single).hypot(),
        _ => points
            .windows(2)
            .map(|w| point_to_segment_dist(point, w[0], w[1]))
            .fold(f64::INFINITY, f64::min),
    }
}

/// Distance from a point to the closed outline of a polygon.
pub fn point_to_polygon_outline_dist(point: Point, polygon: &[Point]) -> f64 {
    if polygon.len() < 2 {
        return point_to_polyline_dist(point, polygon);
    }
    let closing = point_to_segment_dist(point, polygon[polygon.len() - 1], polygon[0]);
    point_to_polyline_dist(point, polygon).min(closing)
}

/// Even-odd point-in-polygon test.
pub fn polygon_contains(polygon: &[Point], point: Point) -> bool {
    let n = polygon.len();
    if n < 3 {
        return false;
    }
    let mut inside = false;
    let mut j = n - 1;
    for i in 0..n {
        let (pi, pj) = (polygon[i], polygon[j]);
        if (pi.y > point.y) != (pj.y > point.y)
            && point.x < (pj.x - pi.x) * (point.y - pi.y) / (pj.y - pi.y) + pi.x
        {
            inside = !inside;
        }
        j = i;
    }
    inside
}

/// Check if two segments (p1-p2 and p3-p4) intersect.
pub fn segments_intersect(p1: Point, p2: Point, p3: Point, p4: Point) -> bool {
    segment_intersection(p1, p2, p3, p4).is_some()
}

/// Intersection point of two segments, if any.
pub fn segment_intersection(p1: Point, p2: Point, p3: Point, p4: Point) -> Option<Point> {
    let d1 = p2 - p1;
    let d2 = p4 - p3;
    let denom = d1.cross(d2);
    if denom.abs() < 1e-12 {
        return None;
    }
    let d3 = p3 - p1;
    let t = d3.cross(d2) / denom;
    let u = d3.cross(d1) / denom;
    if (0.0..=1.0).contains(&t) && (0.0..=1.0).contains(&u) {
        Some(p1 + d1 * t)
    } else {
        None
    }
}

/// First intersection (closest to `a`) of segment `a`-`b` with a closed polygon.
pub fn segment_polygon_intersection(a: Point, b: Point, polygon: &[Point]) -> Option<Point> {
    let n = polygon.len();
    if n < 2 {
        return None;
    }
    (0..n)
        .filter_map(|i| segment_intersection(a, b, polygon[i], polygon[(i + 1) % n]))
        .min_by(|p, q| {
            (*p - a)
                .hypot2()
                .partial_cmp(&(*q - a).hypot2())
                .unwrap_or(std::cmp::Ordering::Equal)
        })
}

/// Bounding box of a set of points. Returns `None` for an empty slice.
pub fn points_bounds(points: &[Point]) -> Option<Rect> {
    let first = points.first()?;
    Some(
        points
            .iter()
            .skip(1)
            .fold(Rect::from_points(*first, *first), |r, p| r.union_pt(*p)),
    )
}

/// Check if two rectangles overlap (touching edges count).
pub fn rects_overlap(a: Rect, b: Rect) -> bool {
    a.x0 <= b.x1 && b.x0 <= a.x1 && a.y0 <= b.y1 && b.y0 <= a.y1
}

/// Check if `inner` lies fully inside `outer`.
pub fn rect_contains_rect(outer: Rect, inner: Rect) -> bool {
    inner.x0 >= outer.x0 && inner.x1 <= outer.x1 && inner.y0 >= outer.y0 && inner.y1 <= outer.y1
}

/// Whether a polyline crosses itself (non-adjacent segments intersect).
pub fn polyline_self_intersects(points: &[Point]) -> bool {
    let n = points.len();
    if n < 4 {
        return false;
    }
    for i in 0..n - 1 {
        for j in (i + 2)..n - 1 {
            if i == 0 && j == n - 2 && points[0] == points[n - 1] {
                continue;
            }
            if segments_intersect(points[i], points[i + 1], points[j], points[j + 1]) {
                return true;
            }
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::FRAC_PI_2;

    #[test]
    fn test_rotate_point_quarter_turn() {
        let p = rotate_point(Point::new(10.0, 0.0), Point::ZERO, FRAC_PI_2);
        assert!(p.x.abs() < 1e-9);
        assert!((p.y - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_normalize_angle() {
        assert!((normalize_angle(-FRAC_PI_2) - 3.0 * FRAC_PI_2).abs() < 1e-9);
        assert!(normalize_angle(std::f64::consts::TAU).abs() < 1e-9);
    }

    #[test]
    fn test_point_to_segment_dist() {
        let d = point_to_segment_dist(Point::new(5.0, 5.0), Point::ZERO, Point::new(10.0, 0.0));
        assert!((d - 5.0).abs() < f64::EPSILON);
        let end = point_to_segment_dist(Point::new(13.0, 4.0), Point::ZERO, Point::new(10.0, 0.0));
        assert!((end - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_polygon_contains() {
        let square = [
            Point::new(0.0, 0.0),
            Point::new(10.0, 0.0),
            Point::new(10.0, 10.0),
            Point::new(0.0, 10.0),
        ];
        assert!(polygon_contains(&square, Point::new(5.0, 5.0)));
        assert!(!polygon_contains(&square, Point::new(15.0, 5.0)));
    }

    #[test]
    fn test_segment_polygon_intersection_closest() {
        let square = [
            Point::new(0.0, 0.0),
            Point::new(10.0, 0.0),
            Point::new(10.0, 10.0),
            Point::new(0.0, 10.0),
        ];
        let hit = segment_polygon_intersection(Point::new(-5.0, 5.0), Point::new(20.0, 5.0), &square);
        let hit = hit.expect("segment crosses the square");
        assert!(hit.x.abs() < 1e-9);
        assert!((hit.y - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_self_intersection() {
        let zigzag = [
            Point::new(0.0, 0.0),
            Point::new(10.0, 10.0),
            Point::new(10.0, 0.0),
            Point::new(0.0, 10.0),
        ];
        assert!(polyline_self_intersects(&zigzag));
        let open = [Point::new(0.0, 0.0), Point::new(10.0, 0.0), Point::new(10.0, 10.0)];
        assert!(!polyline_self_intersects(&open));
    }
}
