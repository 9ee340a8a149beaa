//! Viewport camera: pan/zoom between screen and scene coordinates.

use kurbo::{Affine, Point, Rect, Size, Vec2};
use serde::{Deserialize, Serialize};

/// Maps screen pixels to scene units.
///
/// Hit thresholds and snap distances are divided by `zoom` so their
/// screen-space size stays constant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Camera {
    /// Screen-space translation (scroll).
    pub offset: Vec2,
    /// Scene units to screen pixels.
    pub zoom: f64,
    pub min_zoom: f64,
    pub max_zoom: f64,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            offset: Vec2::ZERO,
            zoom: 1.0,
            min_zoom: 0.1,
            max_zoom: 30.0,
        }
    }
}

impl Camera {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scene to screen transform.
    pub fn transform(&self) -> Affine {
        Affine::translate(self.offset) * Affine::scale(self.zoom)
    }

    /// Screen to scene transform.
    pub fn inverse_transform(&self) -> Affine {
        Affine::scale(1.0 / self.zoom) * Affine::translate(-self.offset)
    }

    pub fn screen_to_scene(&self, screen_point: Point) -> Point {
        self.inverse_transform() * screen_point
    }

    pub fn scene_to_screen(&self, scene_point: Point) -> Point {
        self.transform() * scene_point
    }

    /// Convert a screen-pixel length into scene units.
    pub fn screen_len(&self, pixels: f64) -> f64 {
        pixels / self.zoom
    }

    /// Pan the camera by a delta in screen coordinates.
    pub fn pan(&mut self, delta: Vec2) {
        self.offset += delta;
    }

    /// Zoom, keeping the given screen point fixed. Returns whether the zoom
    /// changed.
    pub fn zoom_at(&mut self, screen_point: Point, factor: f64) -> bool {
        let new_zoom = (self.zoom * factor).clamp(self.min_zoom, self.max_zoom);
        if (new_zoom - self.zoom).abs() < f64::EPSILON {
            return false;
        }
        let anchor = self.screen_to_scene(screen_point);
        self.zoom = new_zoom;
        let drifted = self.scene_to_screen(anchor);
        self.offset += screen_point - drifted;
        true
    }

    /// The scene rectangle visible in a viewport of the given size.
    pub fn visible_rect(&self, viewport: Size) -> Rect {
        let p0 = self.screen_to_scene(Point::ZERO);
        let p1 = self.screen_to_scene(Point::new(viewport.width, viewport.height));
        Rect::from_points(p0, p1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_identity() {
        let camera = Camera::new();
        let p = Point::new(100.0, 200.0);
        assert_eq!(camera.screen_to_scene(p), p);
    }

    #[test]
    fn test_screen_to_scene_with_offset_and_zoom() {
        let mut camera = Camera::new();
        camera.offset = Vec2::new(50.0, 100.0);
        camera.zoom = 2.0;
        let scene = camera.screen_to_scene(Point::new(150.0, 300.0));
        assert!((scene.x - 50.0).abs() < 1e-10);
        assert!((scene.y - 100.0).abs() < 1e-10);
        assert!((camera.screen_len(10.0) - 5.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_zoom_at_keeps_anchor() {
        let mut camera = Camera::new();
        let anchor = Point::new(300.0, 200.0);
        let before = camera.screen_to_scene(anchor);
        assert!(camera.zoom_at(anchor, 2.0));
        let after = camera.screen_to_scene(anchor);
        assert!((before - after).hypot() < 1e-9);
    }

    #[test]
    fn test_zoom_clamp() {
        let mut camera = Camera::new();
        camera.zoom_at(Point::ZERO, 0.001);
        assert!((camera.zoom - camera.min_zoom).abs() < f64::EPSILON);
        assert!(!camera.zoom_at(Point::ZERO, 0.5));
    }

    #[test]
    fn test_visible_rect() {
        let mut camera = Camera::new();
        camera.pan(Vec2::new(-100.0, 0.0));
        let rect = camera.visible_rect(Size::new(800.0, 600.0));
        assert!((rect.x0 - 100.0).abs() < 1e-9);
        assert!((rect.width() - 800.0).abs() < 1e-9);
    }
}
