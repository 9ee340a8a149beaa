//! Orthogonal routing for elbow connectors.

use kurbo::{Point, Rect, Vec2};

/// Direction a connector leaves or enters an endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Heading {
    Up,
    Down,
    Left,
    Right,
}

impl Heading {
    pub fn vector(self) -> Vec2 {
        match self {
            Heading::Up => Vec2::new(0.0, -1.0),
            Heading::Down => Vec2::new(0.0, 1.0),
            Heading::Left => Vec2::new(-1.0, 0.0),
            Heading::Right => Vec2::new(1.0, 0.0),
        }
    }

    pub fn is_horizontal(self) -> bool {
        matches!(self, Heading::Left | Heading::Right)
    }

    /// Dominant axis direction of a vector.
    pub fn from_vector(v: Vec2) -> Self {
        if v.x.abs() >= v.y.abs() {
            if v.x >= 0.0 { Heading::Right } else { Heading::Left }
        } else if v.y >= 0.0 {
            Heading::Down
        } else {
            Heading::Up
        }
    }

    /// The side of `bounds` that `point` faces, normalized by the box
    /// aspect so thin shapes still get sensible sides.
    pub fn from_bounds(bounds: Rect, point: Point) -> Self {
        let c = bounds.center();
        let half_w = (bounds.width() / 2.0).max(f64::EPSILON);
        let half_h = (bounds.height() / 2.0).max(f64::EPSILON);
        Self::from_vector(Vec2::new((point.x - c.x) / half_w, (point.y - c.y) / half_h))
    }
}

/// Simple three-segment orthogonal path between two free points.
///
/// Goes horizontal first when the points are further apart horizontally,
/// turning at the midpoint. The result includes both endpoints.
pub fn compute_elbow_path(start: Point, end: Point) -> Vec<Point> {
    let d = end - start;
    let mid = start.midpoint(end);
    let path = if d.x.abs() > d.y.abs() {
        vec![start, Point::new(mid.x, start.y), Point::new(mid.x, end.y), end]
    } else {
        vec![start, Point::new(start.x, mid.y), Point::new(end.x, mid.y), end]
    };
    simplify(path)
}

/// Route between two endpoints with optional headings.
///
/// A bound endpoint's heading is the side of its target it sits on; the
/// path first steps `padding` away from that side so it never runs along
/// the shape.
pub fn route(
    start: Point,
    start_heading: Option<Heading>,
    end: Point,
    end_heading: Option<Heading>,
    padding: f64,
) -> Vec<Point> {
    if start_heading.is_none() && end_heading.is_none() {
        return compute_elbow_path(start, end);
    }
    let start_heading = start_heading.unwrap_or_else(|| Heading::from_vector(end - start));
    let end_heading = end_heading.unwrap_or_else(|| Heading::from_vector(start - end));
    let s1 = start + start_heading.vector() * padding;
    let e1 = end + end_heading.vector() * padding;

    let mut path = vec![start, s1];
    match (start_heading.is_horizontal(), end_heading.is_horizontal()) {
        (true, true) => {
            let mx = (s1.x + e1.x) / 2.0;
            path.extend([Point::new(mx, s1.y), Point::new(mx, e1.y)]);
        }
        (false, false) => {
            let my = (s1.y + e1.y) / 2.0;
            path.extend([Point::new(s1.x, my), Point::new(e1.x, my)]);
        }
        (true, false) => path.push(Point::new(e1.x, s1.y)),
        (false, true) => path.push(Point::new(s1.x, e1.y)),
    }
    path.extend([e1, end]);
    simplify(path)
}

/// Drop repeated points and interior points on a straight run.
fn simplify(points: Vec<Point>) -> Vec<Point> {
    let mut out: Vec<Point> = Vec::with_capacity(points.len());
    for p in points {
        if out.last().is_some_and(|last| (*last - p).hypot() < 1e-9) {
            continue;
        }
        if let [.., a, b] = out.as_slice() {
            let collinear = ((a.x - b.x).abs() < 1e-9 && (b.x - p.x).abs() < 1e-9)
                || ((a.y - b.y).abs() < 1e-9 && (b.y - p.y).abs() < 1e-9);
            if collinear {
                out.pop();
            }
        }
        out.push(p);
    }
    out
}

/// Whether every segment is horizontal or vertical.
pub fn is_orthogonal(points: &[Point]) -> bool {
    points
        .windows(2)
        .all(|w| (w[0].x - w[1].x).abs() < 1e-9 || (w[0].y - w[1].y).abs() < 1e-9)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_free_path_horizontal_first() {
        let path = compute_elbow_path(Point::new(0.0, 0.0), Point::new(100.0, 40.0));
        assert_eq!(path.len(), 4);
        assert_eq!(path[1], Point::new(50.0, 0.0));
        assert!(is_orthogonal(&path));
    }

    #[test]
    fn test_aligned_points_make_a_single_segment() {
        let path = compute_elbow_path(Point::new(0.0, 10.0), Point::new(100.0, 10.0));
        assert_eq!(path, vec![Point::new(0.0, 10.0), Point::new(100.0, 10.0)]);
    }

    #[test]
    fn test_route_with_headings() {
        let start = Point::new(100.0, 50.0);
        let end = Point::new(200.0, 150.0);
        let path = route(start, Some(Heading::Right), end, Some(Heading::Up), 20.0);
        assert_eq!(path.first(), Some(&start));
        assert_eq!(path.last(), Some(&end));
        assert!(is_orthogonal(&path));
        // Enters the end from above.
        let before_end = path[path.len() - 2];
        assert!(before_end.y < end.y);
        assert!((before_end.x - end.x).abs() < 1e-9);
    }

    #[test]
    fn test_heading_from_bounds() {
        let bounds = Rect::new(0.0, 0.0, 200.0, 20.0);
        assert_eq!(Heading::from_bounds(bounds, Point::new(100.0, -5.0)), Heading::Up);
        assert_eq!(Heading::from_bounds(bounds, Point::new(210.0, 10.0)), Heading::Right);
    }
}
