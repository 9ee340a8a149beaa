//! Snapping: grid alignment, angle steps, and alignment to other elements.
//!
//! [`SnapEngine`] caches reference points and visible gaps once per gesture
//! and computes a 2-D offset plus guide lines on every move.

use crate::element::geometry::rects_overlap;
use crate::element::ElementId;
use crate::scene::Scene;
use kurbo::{Point, Rect, Vec2};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Snap mode for aligning elements to grid or other elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SnapMode {
    /// No snapping.
    #[default]
    None,
    /// Snap to grid lines.
    Grid,
    /// Snap to other element edges, centers and gaps.
    Shapes,
    /// Element snapping first, grid as fallback per axis.
    All,
}

impl SnapMode {
    /// Cycle to the next snap mode.
    pub fn next(self) -> Self {
        match self {
            SnapMode::None => SnapMode::Grid,
            SnapMode::Grid => SnapMode::Shapes,
            SnapMode::Shapes => SnapMode::All,
            SnapMode::All => SnapMode::None,
        }
    }

    pub fn snaps_to_grid(self) -> bool {
        matches!(self, SnapMode::Grid | SnapMode::All)
    }

    pub fn snaps_to_shapes(self) -> bool {
        matches!(self, SnapMode::Shapes | SnapMode::All)
    }

    pub fn is_enabled(self) -> bool {
        self != SnapMode::None
    }
}

/// Snap a point to the nearest grid intersection.
pub fn snap_to_grid(point: Point, grid_size: f64) -> Point {
    if grid_size <= 0.0 {
        return point;
    }
    Point::new(
        (point.x / grid_size).round() * grid_size,
        (point.y / grid_size).round() * grid_size,
    )
}

/// Angle snap increment in degrees.
pub const ANGLE_SNAP_INCREMENT: f64 = 15.0;

/// Snap an angle to the nearest increment. Returns degrees in `[0, 360)`.
pub fn snap_angle(angle_degrees: f64, increment: f64) -> f64 {
    let snapped = (angle_degrees / increment).round() * increment;
    snapped.rem_euclid(360.0)
}

/// Snap a line endpoint to angle increments around `start`, keeping the
/// distance.
pub fn snap_line_endpoint(start: Point, end: Point) -> Point {
    let delta = end - start;
    let distance = delta.hypot();
    if distance < 0.001 {
        return end;
    }
    let angle = snap_angle(delta.y.atan2(delta.x).to_degrees(), ANGLE_SNAP_INCREMENT).to_radians();
    Point::new(start.x + distance * angle.cos(), start.y + distance * angle.sin())
}

/// A point that can be snapped to.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SnapTarget {
    pub point: Point,
    pub kind: SnapTargetKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapTargetKind {
    Corner,
    Midpoint,
    Center,
}

/// Corners, edge midpoints and center of a bounding box.
pub fn snap_targets_from_bounds(bounds: Rect) -> Vec<SnapTarget> {
    let c = bounds.center();
    let corner = |x, y| SnapTarget {
        point: Point::new(x, y),
        kind: SnapTargetKind::Corner,
    };
    let midpoint = |x, y| SnapTarget {
        point: Point::new(x, y),
        kind: SnapTargetKind::Midpoint,
    };
    vec![
        corner(bounds.x0, bounds.y0),
        corner(bounds.x1, bounds.y0),
        corner(bounds.x1, bounds.y1),
        corner(bounds.x0, bounds.y1),
        midpoint(c.x, bounds.y0),
        midpoint(bounds.x1, c.y),
        midpoint(c.x, bounds.y1),
        midpoint(bounds.x0, c.y),
        SnapTarget {
            point: c,
            kind: SnapTargetKind::Center,
        },
    ]
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Axis {
    Horizontal,
    Vertical,
}

/// Empty space between two elements that overlap on the other axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Gap {
    pub axis: Axis,
    /// Element before the gap (left or above).
    pub before: Rect,
    /// Element after the gap (right or below).
    pub after: Rect,
    /// Shared extent on the other axis.
    pub overlap: (f64, f64),
}

impl Gap {
    pub fn length(&self) -> f64 {
        match self.axis {
            Axis::Horizontal => self.after.x0 - self.before.x1,
            Axis::Vertical => self.after.y0 - self.before.y1,
        }
    }
}

/// What produced a guide line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SnapLineKind {
    Points,
    Gap,
}

/// A guide segment to display while snapped.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SnapLine {
    pub from: Point,
    pub to: Point,
    pub kind: SnapLineKind,
}

/// Offset to apply and guides to draw.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SnapOutcome {
    pub offset: Vec2,
    pub snapped_x: bool,
    pub snapped_y: bool,
    pub lines: Vec<SnapLine>,
}

impl SnapOutcome {
    pub fn is_snapped(&self) -> bool {
        self.snapped_x || self.snapped_y
    }
}

/// Parameters of a single snap query.
#[derive(Debug, Clone, Copy)]
pub struct SnapQuery {
    pub mode: SnapMode,
    pub grid_size: f64,
    /// Scene-space distance within which a reference attracts.
    pub threshold: f64,
}

#[derive(Debug, Clone)]
struct SnapCache {
    scene_version: u64,
    excluded: HashSet<ElementId>,
    targets: Vec<SnapTarget>,
    gaps: Vec<Gap>,
}

/// Per-gesture snap reference cache.
#[derive(Debug, Default)]
pub struct SnapEngine {
    cache: Option<SnapCache>,
}

#[derive(Debug, Clone, Copy)]
struct AxisCandidate {
    delta: f64,
    from_gap: Option<Gap>,
}

impl SnapEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the reference cache from every live element not in `excluded`.
    ///
    /// Kept as long as the excluded set is unchanged; `visible` limits gap
    /// detection to what the user can see.
    pub fn prepare(&mut self, scene: &Scene, excluded: &HashSet<ElementId>, visible: Option<Rect>) {
        if self.cache.as_ref().is_some_and(|c| c.excluded == *excluded) {
            return;
        }
        let bounds: Vec<Rect> = scene
            .non_deleted()
            .filter(|e| !excluded.contains(&e.id) && e.container_id().is_none())
            .map(|e| e.bounds())
            .filter(|b| visible.is_none_or(|v| rects_overlap(v, *b)))
            .collect();
        let targets = bounds.iter().flat_map(|b| snap_targets_from_bounds(*b)).collect();
        let gaps = visible_gaps(&bounds);
        log::trace!(
            "Snap cache built: {} references, {} gaps",
            bounds.len(),
            gaps.len()
        );
        self.cache = Some(SnapCache {
            scene_version: scene.version(),
            excluded: excluded.clone(),
            targets,
            gaps,
        });
    }

    /// Drop the cache; the next `prepare` recomputes.
    pub fn invalidate(&mut self) {
        self.cache = None;
    }

    pub fn is_prepared(&self) -> bool {
        self.cache.is_some()
    }

    /// Scene version the cache was built at.
    pub fn built_at(&self) -> Option<u64> {
        self.cache.as_ref().map(|c| c.scene_version)
    }

    /// Snap moving bounds (edges, centers and gaps).
    pub fn snap_bounds(&self, moving: Rect, query: SnapQuery) -> SnapOutcome {
        let points: Vec<Point> = snap_targets_from_bounds(moving).iter().map(|t| t.point).collect();
        self.snap(&points, Some(moving), query)
    }

    /// Snap a single point (creation, resize handles, linear points).
    pub fn snap_point(&self, point: Point, query: SnapQuery) -> SnapOutcome {
        self.snap(&[point], None, query)
    }

    fn snap(&self, points: &[Point], moving: Option<Rect>, query: SnapQuery) -> SnapOutcome {
        let mut outcome = SnapOutcome::default();
        let mut best_x: Option<AxisCandidate> = None;
        let mut best_y: Option<AxisCandidate> = None;

        if query.mode.snaps_to_shapes() {
            if let Some(cache) = &self.cache {
                for target in &cache.targets {
                    for p in points {
                        consider(&mut best_x, target.point.x - p.x, None, query.threshold);
                        consider(&mut best_y, target.point.y - p.y, None, query.threshold);
                    }
                }
                if let Some(moving) = moving {
                    for gap in &cache.gaps {
                        for (axis, delta) in gap_deltas(gap, moving) {
                            let best = match axis {
                                Axis::Horizontal => &mut best_x,
                                Axis::Vertical => &mut best_y,
                            };
                            consider(best, delta, Some(*gap), query.threshold);
                        }
                    }
                }
            }
        }

        let anchor = moving.map_or_else(|| points.first().copied().unwrap_or(Point::ZERO), |r| r.origin());
        if query.mode.snaps_to_grid() && query.grid_size > 0.0 {
            let grid = snap_to_grid(anchor, query.grid_size) - anchor;
            best_x.get_or_insert(AxisCandidate { delta: grid.x, from_gap: None });
            best_y.get_or_insert(AxisCandidate { delta: grid.y, from_gap: None });
        }

        if let Some(x) = best_x {
            outcome.offset.x = x.delta;
            outcome.snapped_x = true;
        }
        if let Some(y) = best_y {
            outcome.offset.y = y.delta;
            outcome.snapped_y = true;
        }
        if let Some(cache) = &self.cache {
            outcome.lines = guide_lines(cache, points, outcome.offset, best_x, best_y, moving);
        }
        outcome
    }
}

fn consider(best: &mut Option<AxisCandidate>, delta: f64, from_gap: Option<Gap>, threshold: f64) {
    if delta.abs() > threshold {
        return;
    }
    if best.is_none_or(|b| delta.abs() < b.delta.abs()) {
        *best = Some(AxisCandidate { delta, from_gap });
    }
}

/// Offsets that would make `moving` repeat or center in `gap`.
fn gap_deltas(gap: &Gap, moving: Rect) -> Vec<(Axis, f64)> {
    let len = gap.length();
    let mut deltas = Vec::with_capacity(3);
    match gap.axis {
        Axis::Horizontal => {
            if moving.y1 < gap.overlap.0 || moving.y0 > gap.overlap.1 {
                return deltas;
            }
            deltas.push((Axis::Horizontal, gap.after.x1 + len - moving.x0));
            deltas.push((Axis::Horizontal, gap.before.x0 - len - moving.x1));
            if moving.width() < len {
                let center = (gap.before.x1 + gap.after.x0) / 2.0;
                deltas.push((Axis::Horizontal, center - moving.center().x));
            }
        }
        Axis::Vertical => {
            if moving.x1 < gap.overlap.0 || moving.x0 > gap.overlap.1 {
                return deltas;
            }
            deltas.push((Axis::Vertical, gap.after.y1 + len - moving.y0));
            deltas.push((Axis::Vertical, gap.before.y0 - len - moving.y1));
            if moving.height() < len {
                let center = (gap.before.y1 + gap.after.y0) / 2.0;
                deltas.push((Axis::Vertical, center - moving.center().y));
            }
        }
    }
    deltas
}

/// Gaps between element pairs with no third element in between.
fn visible_gaps(bounds: &[Rect]) -> Vec<Gap> {
    let mut gaps = Vec::new();
    for (i, a) in bounds.iter().enumerate() {
        for (j, b) in bounds.iter().enumerate() {
            if i == j {
                continue;
            }
            if a.x1 < b.x0 {
                let overlap = (a.y0.max(b.y0), a.y1.min(b.y1));
                if overlap.0 < overlap.1 {
                    let blocked = bounds.iter().enumerate().any(|(k, c)| {
                        k != i && k != j && c.x0 < b.x0 && c.x1 > a.x1 && c.y0 < overlap.1 && c.y1 > overlap.0
                    });
                    if !blocked {
                        gaps.push(Gap { axis: Axis::Horizontal, before: *a, after: *b, overlap });
                    }
                }
            }
            if a.y1 < b.y0 {
                let overlap = (a.x0.max(b.x0), a.x1.min(b.x1));
                if overlap.0 < overlap.1 {
                    let blocked = bounds.iter().enumerate().any(|(k, c)| {
                        k != i && k != j && c.y0 < b.y0 && c.y1 > a.y1 && c.x0 < overlap.1 && c.x1 > overlap.0
                    });
                    if !blocked {
                        gaps.push(Gap { axis: Axis::Vertical, before: *a, after: *b, overlap });
                    }
                }
            }
        }
    }
    gaps
}

const ALIGN_EPSILON: f64 = 0.01;

fn guide_lines(
    cache: &SnapCache,
    points: &[Point],
    offset: Vec2,
    best_x: Option<AxisCandidate>,
    best_y: Option<AxisCandidate>,
    moving: Option<Rect>,
) -> Vec<SnapLine> {
    let shifted: Vec<Point> = points.iter().map(|p| *p + offset).collect();
    let mut lines = Vec::new();

    if best_x.is_some_and(|c| c.from_gap.is_none()) {
        let mut xs: Vec<f64> = Vec::new();
        for p in &shifted {
            if !xs.iter().any(|x| (x - p.x).abs() < ALIGN_EPSILON) {
                xs.push(p.x);
            }
        }
        for x in xs {
            let ys: Vec<f64> = cache
                .targets
                .iter()
                .map(|t| t.point)
                .chain(shifted.iter().copied())
                .filter(|p| (p.x - x).abs() < ALIGN_EPSILON)
                .map(|p| p.y)
                .collect();
            let has_reference = cache.targets.iter().any(|t| (t.point.x - x).abs() < ALIGN_EPSILON);
            if has_reference && ys.len() > 1 {
                let (lo, hi) = min_max(&ys);
                lines.push(SnapLine { from: Point::new(x, lo), to: Point::new(x, hi), kind: SnapLineKind::Points });
            }
        }
    }
    if best_y.is_some_and(|c| c.from_gap.is_none()) {
        let mut ys: Vec<f64> = Vec::new();
        for p in &shifted {
            if !ys.iter().any(|y| (y - p.y).abs() < ALIGN_EPSILON) {
                ys.push(p.y);
            }
        }
        for y in ys {
            let xs: Vec<f64> = cache
                .targets
                .iter()
                .map(|t| t.point)
                .chain(shifted.iter().copied())
                .filter(|p| (p.y - y).abs() < ALIGN_EPSILON)
                .map(|p| p.x)
                .collect();
            let has_reference = cache.targets.iter().any(|t| (t.point.y - y).abs() < ALIGN_EPSILON);
            if has_reference && xs.len() > 1 {
                let (lo, hi) = min_max(&xs);
                lines.push(SnapLine { from: Point::new(lo, y), to: Point::new(hi, y), kind: SnapLineKind::Points });
            }
        }
    }

    let moved = moving.map(|r| r + offset);
    for gap in [best_x, best_y].into_iter().flatten().filter_map(|c| c.from_gap) {
        lines.extend(gap_lines(&gap, moved));
    }
    lines
}

fn gap_lines(gap: &Gap, moved: Option<Rect>) -> Vec<SnapLine> {
    let mid = (gap.overlap.0 + gap.overlap.1) / 2.0;
    let mut lines = Vec::new();
    match gap.axis {
        Axis::Horizontal => {
            lines.push(SnapLine {
                from: Point::new(gap.before.x1, mid),
                to: Point::new(gap.after.x0, mid),
                kind: SnapLineKind::Gap,
            });
            if let Some(r) = moved {
                let (from, to) = if r.x0 >= gap.after.x1 {
                    (gap.after.x1, r.x0)
                } else if r.x1 <= gap.before.x0 {
                    (r.x1, gap.before.x0)
                } else {
                    (gap.before.x1, r.x0)
                };
                lines.push(SnapLine { from: Point::new(from, mid), to: Point::new(to, mid), kind: SnapLineKind::Gap });
            }
        }
        Axis::Vertical => {
            lines.push(SnapLine {
                from: Point::new(mid, gap.before.y1),
                to: Point::new(mid, gap.after.y0),
                kind: SnapLineKind::Gap,
            });
            if let Some(r) = moved {
                let (from, to) = if r.y0 >= gap.after.y1 {
                    (gap.after.y1, r.y0)
                } else if r.y1 <= gap.before.y0 {
                    (r.y1, gap.before.y0)
                } else {
                    (gap.before.y1, r.y0)
                };
                lines.push(SnapLine { from: Point::new(mid, from), to: Point::new(mid, to), kind: SnapLineKind::Gap });
            }
        }
    }
    lines
}

fn min_max(values: &[f64]) -> (f64, f64) {
    values
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(*v), hi.max(*v)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::Element;

    fn query(mode: SnapMode) -> SnapQuery {
        SnapQuery { mode, grid_size: 20.0, threshold: 8.0 }
    }

    #[test]
    fn test_snap_to_grid() {
        assert_eq!(snap_to_grid(Point::new(23.0, 47.0), 20.0), Point::new(20.0, 40.0));
        assert_eq!(snap_to_grid(Point::new(31.0, 51.0), 20.0), Point::new(40.0, 60.0));
        assert_eq!(snap_to_grid(Point::new(31.0, 51.0), 0.0), Point::new(31.0, 51.0));
    }

    #[test]
    fn test_snap_mode_cycle() {
        assert_eq!(SnapMode::None.next(), SnapMode::Grid);
        assert_eq!(SnapMode::Grid.next(), SnapMode::Shapes);
        assert_eq!(SnapMode::Shapes.next(), SnapMode::All);
        assert_eq!(SnapMode::All.next(), SnapMode::None);
    }

    #[test]
    fn test_snap_mode_flags() {
        assert!(!SnapMode::None.snaps_to_grid());
        assert!(SnapMode::Grid.snaps_to_grid());
        assert!(!SnapMode::Shapes.snaps_to_grid());
        assert!(SnapMode::All.snaps_to_shapes());
        assert!(!SnapMode::Grid.snaps_to_shapes());
    }

    #[test]
    fn test_snap_angle() {
        assert!((snap_angle(7.0, 15.0) - 0.0).abs() < 0.01);
        assert!((snap_angle(8.0, 15.0) - 15.0).abs() < 0.01);
        assert!((snap_angle(359.0, 15.0) - 0.0).abs() < 0.01);
        assert!((snap_angle(-10.0, 15.0) - 345.0).abs() < 0.01);
    }

    #[test]
    fn test_snap_line_endpoint_preserves_distance() {
        let end = snap_line_endpoint(Point::ZERO, Point::new(100.0, 5.0));
        assert!(end.y.abs() < 1e-9);
        assert!((end.x - 100.0_f64.hypot(5.0)).abs() < 1e-9);
    }

    #[test]
    fn test_snap_bounds_to_reference_edge() {
        let other = Element::rectangle(100.0, 0.0, 50.0, 50.0);
        let scene = Scene::from_elements(vec![other]).unwrap();
        let mut engine = SnapEngine::new();
        engine.prepare(&scene, &HashSet::new(), None);

        let moving = Rect::new(0.0, 95.0, 46.0, 145.0);
        let outcome = engine.snap_bounds(moving, query(SnapMode::Shapes));
        assert!(outcome.snapped_x);
        assert!((outcome.offset.x - 4.0).abs() < 1e-9);
        assert!(!outcome.lines.is_empty());
        assert!(outcome.lines.iter().all(|l| l.kind == SnapLineKind::Points));
    }

    #[test]
    fn test_no_snap_outside_threshold() {
        let other = Element::rectangle(100.0, 0.0, 50.0, 50.0);
        let scene = Scene::from_elements(vec![other]).unwrap();
        let mut engine = SnapEngine::new();
        engine.prepare(&scene, &HashSet::new(), None);

        let moving = Rect::new(300.0, 300.0, 330.0, 330.0);
        let outcome = engine.snap_bounds(moving, query(SnapMode::Shapes));
        assert!(!outcome.is_snapped());
        assert_eq!(outcome.offset, Vec2::ZERO);
    }

    #[test]
    fn test_gap_repetition() {
        let a = Element::rectangle(0.0, 0.0, 50.0, 50.0);
        let b = Element::rectangle(100.0, 0.0, 50.0, 50.0);
        let scene = Scene::from_elements(vec![a, b]).unwrap();
        let mut engine = SnapEngine::new();
        engine.prepare(&scene, &HashSet::new(), None);

        // Place a third box 50 units right of b, slightly off.
        let moving = Rect::new(203.0, 10.0, 233.0, 40.0);
        let outcome = engine.snap_bounds(moving, query(SnapMode::Shapes));
        assert!(outcome.snapped_x);
        assert!((outcome.offset.x + 3.0).abs() < 1e-9);
        assert!(outcome.lines.iter().any(|l| l.kind == SnapLineKind::Gap));
    }

    #[test]
    fn test_grid_fallback() {
        let scene = Scene::new();
        let mut engine = SnapEngine::new();
        engine.prepare(&scene, &HashSet::new(), None);
        let outcome = engine.snap_point(Point::new(23.0, 47.0), query(SnapMode::Grid));
        assert!((outcome.offset.x + 3.0).abs() < 1e-9);
        assert!((outcome.offset.y + 7.0).abs() < 1e-9);
    }

    #[test]
    fn test_excluded_elements_are_not_references() {
        let moving = Element::rectangle(0.0, 0.0, 50.0, 50.0);
        let id = moving.id;
        let scene = Scene::from_elements(vec![moving]).unwrap();
        let mut engine = SnapEngine::new();
        engine.prepare(&scene, &HashSet::from([id]), None);
        let outcome = engine.snap_bounds(Rect::new(2.0, 2.0, 52.0, 52.0), query(SnapMode::Shapes));
        assert!(!outcome.is_snapped());
    }

    #[test]
    fn test_cache_rebuilt_when_excluded_set_changes() {
        let a = Element::rectangle(0.0, 0.0, 50.0, 50.0);
        let a_id = a.id;
        let scene = Scene::from_elements(vec![a]).unwrap();
        let mut engine = SnapEngine::new();
        engine.prepare(&scene, &HashSet::new(), None);
        engine.prepare(&scene, &HashSet::from([a_id]), None);
        let outcome = engine.snap_point(Point::new(1.0, 1.0), query(SnapMode::Shapes));
        assert!(!outcome.is_snapped());

        engine.invalidate();
        assert!(!engine.is_prepared());
    }
}
