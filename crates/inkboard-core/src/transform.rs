//! Transform engine: resize, rotate, crop and point edits.
//!
//! Every function takes the snapshot taken at gesture start and the current
//! pointer, so repeated moves never accumulate rounding error. Results are
//! fresh copies; the caller writes them back through the scene.

use crate::element::geometry::{normalize_angle, rotate_point};
use crate::element::{Element, ElementKind, ImageCrop};
use crate::handles::HandleKind;
use kurbo::{Point, Rect, Vec2};
use std::f64::consts::{FRAC_PI_2, PI};

/// Rotation snapping step with shift held (15 degrees).
pub const ROTATION_SNAP: f64 = PI / 12.0;

/// Smallest uniform factor for multi-element scaling.
const MIN_GROUP_SCALE: f64 = 0.01;

/// Modifier state relevant to resizing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResizeModifiers {
    /// Shift: keep the aspect ratio.
    pub keep_aspect: bool,
    /// Alt: resize symmetrically around the center.
    pub from_center: bool,
}

/// Resize a single element by dragging `handle` to `pointer`.
///
/// Works in the element's unrotated frame so the opposite corner (or the
/// center) stays fixed in the scene. Dragging past the fixed side flips the
/// box; width and height stay non-negative. Returns `None` for handles that
/// do not resize and for non-finite results.
pub fn resize_element(
    original: &Element,
    handle: HandleKind,
    pointer: Point,
    mods: ResizeModifiers,
) -> Option<Element> {
    let dir = handle.direction();
    if dir == Vec2::ZERO {
        return None;
    }
    let rect = original.local_rect();
    let center = rect.center();
    let half = Vec2::new(rect.width() / 2.0, rect.height() / 2.0);
    let fixed = if mods.from_center {
        center
    } else {
        Point::new(center.x - dir.x * half.x, center.y - dir.y * half.y)
    };
    let edge = Point::new(center.x + dir.x * half.x, center.y + dir.y * half.y);
    let local = original.to_local(pointer);

    let mut sx = axis_scale(dir.x, local.x, fixed.x, edge.x);
    let mut sy = axis_scale(dir.y, local.y, fixed.y, edge.y);

    if mods.keep_aspect || original.is_text() {
        if handle.is_corner() {
            let s = sx.abs().max(sy.abs());
            sx = s.copysign(sx);
            sy = s.copysign(sy);
        } else if dir.x != 0.0 {
            sy = sx.abs();
        } else {
            sx = sy.abs();
        }
    }
    scale_in_local_frame(original, fixed, sx, sy)
}

fn axis_scale(direction: f64, pointer: f64, fixed: f64, edge: f64) -> f64 {
    let span = edge - fixed;
    if direction == 0.0 || span.abs() < f64::EPSILON {
        1.0
    } else {
        (pointer - fixed) / span
    }
}

fn scale_in_local_frame(original: &Element, fixed: Point, sx: f64, sy: f64) -> Option<Element> {
    if !(sx.is_finite() && sy.is_finite()) {
        return None;
    }
    let map = |p: Point| Point::new(fixed.x + (p.x - fixed.x) * sx, fixed.y + (p.y - fixed.y) * sy);
    let rect = original.local_rect();
    let next_rect = Rect::from_points(map(Point::new(rect.x0, rect.y0)), map(Point::new(rect.x1, rect.y1)));
    let world_center = original.to_world(next_rect.center());

    let mut next = original.clone();
    next.width = next_rect.width();
    next.height = next_rect.height();
    next.x = world_center.x - next.width / 2.0;
    next.y = world_center.y - next.height / 2.0;

    let origin = original.origin().to_vec2();
    let next_origin = next_rect.origin().to_vec2();
    if let Some(points) = next.relative_points_mut() {
        for p in points.iter_mut() {
            *p = map(*p + origin) - next_origin;
        }
    }
    if let ElementKind::Text(text) = &mut next.kind {
        text.font_size *= sy.abs();
    }
    next.normalize_points();
    next.has_valid_pose().then_some(next)
}

/// Scale several elements proportionally inside their common bounds.
///
/// The factor is uniform and positive; each element keeps its angle and
/// its position relative to the fixed anchor.
pub fn resize_elements(
    originals: &[Element],
    bounds: Rect,
    handle: HandleKind,
    pointer: Point,
    from_center: bool,
) -> Vec<Element> {
    let dir = handle.direction();
    if dir == Vec2::ZERO {
        return originals.to_vec();
    }
    let center = bounds.center();
    let half = Vec2::new(bounds.width() / 2.0, bounds.height() / 2.0);
    let fixed = if from_center {
        center
    } else {
        Point::new(center.x - dir.x * half.x, center.y - dir.y * half.y)
    };
    let edge = Point::new(center.x + dir.x * half.x, center.y + dir.y * half.y);
    let sx = axis_scale(dir.x, pointer.x, fixed.x, edge.x);
    let sy = axis_scale(dir.y, pointer.y, fixed.y, edge.y);
    let scale = match (dir.x != 0.0, dir.y != 0.0) {
        (true, true) => sx.max(sy),
        (true, false) => sx,
        _ => sy,
    };
    if !scale.is_finite() {
        return originals.to_vec();
    }
    let scale = scale.max(MIN_GROUP_SCALE);
    originals
        .iter()
        .map(|original| scale_uniform(original, fixed, scale))
        .collect()
}

fn scale_uniform(original: &Element, fixed: Point, scale: f64) -> Element {
    let mut next = original.clone();
    let center = fixed + (original.center() - fixed) * scale;
    next.width = original.width * scale;
    next.height = original.height * scale;
    next.x = center.x - next.width / 2.0;
    next.y = center.y - next.height / 2.0;
    if let Some(points) = next.relative_points_mut() {
        for p in points.iter_mut() {
            *p = (p.to_vec2() * scale).to_point();
        }
    }
    if let ElementKind::Text(text) = &mut next.kind {
        text.font_size *= scale;
    }
    next
}

/// Point the element's top towards `pointer`.
///
/// With `snap`, the angle is rounded to 15 degree steps.
pub fn rotate_element(original: &Element, pointer: Point, snap: bool) -> Element {
    let center = original.center();
    let mut angle = (pointer.y - center.y).atan2(pointer.x - center.x) + FRAC_PI_2;
    if snap {
        angle = (angle / ROTATION_SNAP).round() * ROTATION_SNAP;
    }
    let mut next = original.clone();
    next.angle = normalize_angle(angle);
    next
}

/// Rotate several elements around `pivot` by the angle the pointer swept
/// since `start`. Frames keep their pose.
pub fn rotate_elements(originals: &[Element], pivot: Point, start: Point, pointer: Point, snap: bool) -> Vec<Element> {
    let sweep = |p: Point| (p.y - pivot.y).atan2(p.x - pivot.x);
    let mut delta = sweep(pointer) - sweep(start);
    if snap {
        delta = (delta / ROTATION_SNAP).round() * ROTATION_SNAP;
    }
    originals
        .iter()
        .map(|original| {
            let mut next = original.clone();
            if original.is_frame() {
                return next;
            }
            let center = rotate_point(original.center(), pivot, delta);
            next.x = center.x - original.width / 2.0;
            next.y = center.y - original.height / 2.0;
            next.angle = normalize_angle(original.angle + delta);
            next
        })
        .collect()
}

/// Move one point of a line or connector to `pointer`.
pub fn move_linear_point(original: &Element, index: usize, pointer: Point) -> Option<Element> {
    let mut points = original.world_points();
    let slot = points.get_mut(index)?;
    *slot = pointer;
    let mut next = original.clone();
    next.set_world_points(&points);
    Some(next)
}

/// Crop an image by dragging `handle` to `pointer`.
///
/// The visible region shrinks or grows over the natural image without
/// rescaling it; the crop never leaves the natural bounds and never gets
/// smaller than `min_size` on screen.
pub fn crop_image(original: &Element, handle: HandleKind, pointer: Point, min_size: f64) -> Option<Element> {
    let data = original.image_data()?;
    let dir = handle.direction();
    if dir == Vec2::ZERO {
        return None;
    }
    let mut crop = data
        .crop
        .unwrap_or_else(|| ImageCrop::full(original.width, original.height));
    if crop.width <= 0.0 || crop.height <= 0.0 {
        return None;
    }
    let scale_x = original.width / crop.width;
    let scale_y = original.height / crop.height;
    let rect = original.local_rect();
    let local = original.to_local(pointer);
    let (mut x0, mut y0, mut x1, mut y1) = (rect.x0, rect.y0, rect.x1, rect.y1);

    if dir.x > 0.0 {
        let max = x0 + (crop.natural_width - crop.x) * scale_x;
        x1 = bounded(local.x, x0 + min_size, max);
        crop.width = (x1 - x0) / scale_x;
    } else if dir.x < 0.0 {
        let min = x1 - (crop.x + crop.width) * scale_x;
        x0 = bounded(local.x, min, x1 - min_size);
        crop.x += (x0 - rect.x0) / scale_x;
        crop.width = (x1 - x0) / scale_x;
    }
    if dir.y > 0.0 {
        let max = y0 + (crop.natural_height - crop.y) * scale_y;
        y1 = bounded(local.y, y0 + min_size, max);
        crop.height = (y1 - y0) / scale_y;
    } else if dir.y < 0.0 {
        let min = y1 - (crop.y + crop.height) * scale_y;
        y0 = bounded(local.y, min, y1 - min_size);
        crop.y += (y0 - rect.y0) / scale_y;
        crop.height = (y1 - y0) / scale_y;
    }

    let next_rect = Rect::new(x0, y0, x1, y1);
    let world_center = original.to_world(next_rect.center());
    let mut next = original.clone();
    next.width = next_rect.width();
    next.height = next_rect.height();
    next.x = world_center.x - next.width / 2.0;
    next.y = world_center.y - next.height / 2.0;
    if let Some(image) = next.image_data_mut() {
        image.crop = Some(crop);
    }
    next.has_valid_pose().then_some(next)
}

/// Clamp that tolerates `lo > hi` by preferring `lo`.
fn bounded(value: f64, lo: f64, hi: f64) -> f64 {
    value.min(hi).max(lo)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handles::{Corner, Edge};

    const EPS: f64 = 1e-9;

    #[test]
    fn test_corner_resize() {
        let rect = Element::rectangle(0.0, 0.0, 100.0, 100.0);
        let next = resize_element(
            &rect,
            HandleKind::Corner(Corner::BottomRight),
            Point::new(150.0, 150.0),
            ResizeModifiers::default(),
        )
        .unwrap();
        assert!((next.width - 150.0).abs() < EPS);
        assert!((next.height - 150.0).abs() < EPS);
        assert!(next.x.abs() < EPS && next.y.abs() < EPS);
    }

    #[test]
    fn test_resize_past_anchor_flips_without_negative_size() {
        let rect = Element::rectangle(0.0, 0.0, 100.0, 100.0);
        let next = resize_element(
            &rect,
            HandleKind::Corner(Corner::BottomRight),
            Point::new(-50.0, -20.0),
            ResizeModifiers::default(),
        )
        .unwrap();
        assert!((next.x + 50.0).abs() < EPS);
        assert!((next.y + 20.0).abs() < EPS);
        assert!((next.width - 50.0).abs() < EPS);
        assert!((next.height - 20.0).abs() < EPS);
    }

    #[test]
    fn test_rotated_resize_keeps_opposite_corner() {
        let rect = Element::rectangle(0.0, 0.0, 100.0, 50.0).with_angle(0.7);
        let anchor = rect.corners()[0];
        let pointer = rect.corners()[2] + Vec2::new(30.0, 10.0);
        let next = resize_element(
            &rect,
            HandleKind::Corner(Corner::BottomRight),
            pointer,
            ResizeModifiers::default(),
        )
        .unwrap();
        assert!((next.corners()[0] - anchor).hypot() < 1e-6);
        assert!((next.angle - 0.7).abs() < EPS);
    }

    #[test]
    fn test_aspect_ratio_resize() {
        let rect = Element::rectangle(0.0, 0.0, 100.0, 50.0);
        let next = resize_element(
            &rect,
            HandleKind::Corner(Corner::BottomRight),
            Point::new(200.0, 60.0),
            ResizeModifiers { keep_aspect: true, from_center: false },
        )
        .unwrap();
        assert!((next.width - 200.0).abs() < EPS);
        assert!((next.height - 100.0).abs() < EPS);
    }

    #[test]
    fn test_resize_from_center() {
        let rect = Element::rectangle(0.0, 0.0, 100.0, 100.0);
        let next = resize_element(
            &rect,
            HandleKind::Edge(Edge::Right),
            Point::new(110.0, 50.0),
            ResizeModifiers { keep_aspect: false, from_center: true },
        )
        .unwrap();
        assert!((next.width - 120.0).abs() < EPS);
        assert!((next.height - 100.0).abs() < EPS);
        assert!((next.center() - Point::new(50.0, 50.0)).hypot() < EPS);
    }

    #[test]
    fn test_rotate_handle_does_not_resize() {
        let rect = Element::rectangle(0.0, 0.0, 100.0, 100.0);
        assert!(resize_element(&rect, HandleKind::Rotate, Point::ZERO, ResizeModifiers::default()).is_none());
    }

    #[test]
    fn test_freehand_resize_scales_points() {
        let stroke = Element::freehand(&[Point::new(0.0, 0.0), Point::new(50.0, 50.0), Point::new(100.0, 0.0)]);
        let next = resize_element(
            &stroke,
            HandleKind::Corner(Corner::BottomRight),
            Point::new(200.0, 100.0),
            ResizeModifiers::default(),
        )
        .unwrap();
        let points = next.world_points();
        assert!((points[1] - Point::new(100.0, 100.0)).hypot() < EPS);
        assert!((points[2] - Point::new(200.0, 0.0)).hypot() < EPS);
    }

    #[test]
    fn test_multi_resize_is_uniform() {
        let a = Element::rectangle(0.0, 0.0, 50.0, 50.0);
        let b = Element::rectangle(50.0, 50.0, 50.0, 50.0);
        let bounds = Rect::new(0.0, 0.0, 100.0, 100.0);
        let next = resize_elements(
            &[a, b],
            bounds,
            HandleKind::Corner(Corner::BottomRight),
            Point::new(200.0, 150.0),
            false,
        );
        assert!((next[0].width - 100.0).abs() < EPS);
        assert!((next[1].x - 100.0).abs() < EPS);
        assert!((next[1].height - 100.0).abs() < EPS);
    }

    #[test]
    fn test_multi_resize_never_collapses() {
        let a = Element::rectangle(0.0, 0.0, 50.0, 50.0);
        let bounds = a.bounds();
        let next = resize_elements(
            &[a],
            bounds,
            HandleKind::Corner(Corner::BottomRight),
            Point::new(-100.0, -100.0),
            false,
        );
        assert!(next[0].width > 0.0);
        assert!(next[0].has_valid_pose());
    }

    #[test]
    fn test_rotation_snaps_to_15_degrees() {
        let rect = Element::rectangle(0.0, 0.0, 100.0, 100.0);
        // Pointer slightly off the right side: about 90 degrees.
        let next = rotate_element(&rect, Point::new(200.0, 55.0), true);
        assert!((next.angle - FRAC_PI_2).abs() < EPS);
        let free = rotate_element(&rect, Point::new(200.0, 55.0), false);
        assert!((free.angle - FRAC_PI_2).abs() > 1e-3);
    }

    #[test]
    fn test_multi_rotation_moves_centers() {
        let a = Element::rectangle(0.0, 0.0, 10.0, 10.0);
        let next = rotate_elements(&[a], Point::new(50.0, 5.0), Point::new(100.0, 5.0), Point::new(50.0, 55.0), false);
        assert!((next[0].center() - Point::new(50.0, -40.0)).hypot() < 1e-6);
        assert!((next[0].angle - FRAC_PI_2).abs() < 1e-9);
    }

    #[test]
    fn test_frames_do_not_rotate() {
        let frame = Element::frame(0.0, 0.0, 100.0, 100.0);
        let next = rotate_elements(&[frame.clone()], Point::ZERO, Point::new(10.0, 0.0), Point::new(0.0, 10.0), false);
        assert_eq!(next[0], frame);
    }

    #[test]
    fn test_move_linear_point() {
        let line = Element::line(&[Point::new(0.0, 0.0), Point::new(100.0, 100.0)]);
        let next = move_linear_point(&line, 1, Point::new(120.0, 80.0)).unwrap();
        assert!((next.world_points()[1] - Point::new(120.0, 80.0)).hypot() < EPS);
        assert!(move_linear_point(&line, 5, Point::ZERO).is_none());
    }

    #[test]
    fn test_crop_shrinks_visible_region() {
        let mut image = Element::image(0.0, 0.0, 200.0, 100.0, "file");
        if let Some(data) = image.image_data_mut() {
            data.crop = Some(ImageCrop::full(400.0, 200.0));
        }
        let next = crop_image(&image, HandleKind::Edge(Edge::Left), Point::new(50.0, 50.0), 1.0).unwrap();
        let crop = next.image_data().and_then(|d| d.crop).unwrap();
        assert!((next.x - 50.0).abs() < EPS);
        assert!((next.width - 150.0).abs() < EPS);
        assert!((crop.x - 100.0).abs() < EPS);
        assert!((crop.width - 300.0).abs() < EPS);
    }

    #[test]
    fn test_crop_is_bounded_by_natural_size() {
        let image = Element::image(0.0, 0.0, 200.0, 100.0, "file");
        let next = crop_image(&image, HandleKind::Edge(Edge::Right), Point::new(500.0, 50.0), 1.0).unwrap();
        assert!((next.width - 200.0).abs() < EPS);
    }
}
