//! Element model: the unit stored in the scene.

pub mod geometry;
mod kind;
mod style;

pub use kind::{
    Arrowhead, BoundElement, BoundKind, ElementKind, EmbedData, Endpoint, FrameData,
    FreehandData, ImageCrop, ImageData, ImageStatus, LinearData, PointBinding, TextData,
};
pub use style::{ElementStyle, SerializableColor, StrokeStyle};

pub(crate) use style::generate_seed;

use geometry::{points_bounds, rotate_point, rotate_vec};
use kurbo::{Point, Rect, Vec2};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for elements.
pub type ElementId = Uuid;
/// Unique identifier for groups.
pub type GroupId = Uuid;

/// Number of segments used to approximate an ellipse outline.
const ELLIPSE_SEGMENTS: usize = 32;

/// A scene element.
///
/// The pose is the unrotated box `(x, y, width, height)` rotated by `angle`
/// radians around its center. Point-based kinds keep their points relative
/// to `(x, y)`, normalized so the points' bounding box starts at the origin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Element {
    pub id: ElementId,
    pub kind: ElementKind,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    #[serde(default)]
    pub angle: f64,
    #[serde(default)]
    pub style: ElementStyle,
    /// Ordered outermost-first, innermost-last.
    #[serde(default)]
    pub group_ids: Vec<GroupId>,
    #[serde(default)]
    pub frame_id: Option<ElementId>,
    #[serde(default)]
    pub bound_elements: Vec<BoundElement>,
    #[serde(default)]
    pub locked: bool,
    #[serde(default)]
    pub version: u32,
    #[serde(default)]
    pub version_nonce: u32,
    #[serde(default)]
    pub is_deleted: bool,
}

impl Element {
    /// Create a new element with a fresh id.
    pub fn new(kind: ElementKind, x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            x,
            y,
            width,
            height,
            angle: 0.0,
            style: ElementStyle::default(),
            group_ids: Vec::new(),
            frame_id: None,
            bound_elements: Vec::new(),
            locked: false,
            version: 1,
            version_nonce: generate_seed(),
            is_deleted: false,
        }
    }

    pub fn rectangle(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self::new(ElementKind::Rectangle, x, y, width, height)
    }

    pub fn ellipse(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self::new(ElementKind::Ellipse, x, y, width, height)
    }

    pub fn diamond(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self::new(ElementKind::Diamond, x, y, width, height)
    }

    pub fn frame(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self::new(ElementKind::Frame(FrameData::default()), x, y, width, height)
    }

    pub fn embed(x: f64, y: f64, width: f64, height: f64, link: impl Into<String>) -> Self {
        let data = EmbedData { link: link.into() };
        Self::new(ElementKind::Embed(data), x, y, width, height)
    }

    pub fn image(x: f64, y: f64, width: f64, height: f64, file_id: impl Into<String>) -> Self {
        let data = ImageData {
            file_id: file_id.into(),
            ..Default::default()
        };
        Self::new(ElementKind::Image(data), x, y, width, height)
    }

    /// Create a text element sized by a rough glyph estimate.
    pub fn text(x: f64, y: f64, content: impl Into<String>, font_size: f64) -> Self {
        let content = content.into();
        let size = estimate_text_size(&content, font_size);
        let data = TextData {
            content,
            font_size,
            container_id: None,
        };
        Self::new(ElementKind::Text(data), x, y, size.x, size.y)
    }

    /// Create a line from scene-space points.
    pub fn line(points: &[Point]) -> Self {
        Self::from_scene_points(ElementKind::Line(LinearData::default()), points)
    }

    /// Create a connector from scene-space points.
    pub fn arrow(points: &[Point]) -> Self {
        let data = LinearData {
            end_arrowhead: Some(Arrowhead::Arrow),
            ..Default::default()
        };
        Self::from_scene_points(ElementKind::Arrow(data), points)
    }

    /// Create a freehand stroke from scene-space points.
    pub fn freehand(points: &[Point]) -> Self {
        Self::from_scene_points(ElementKind::Freehand(FreehandData::default()), points)
    }

    fn from_scene_points(kind: ElementKind, points: &[Point]) -> Self {
        let origin = points.first().copied().unwrap_or(Point::ZERO);
        let mut element = Self::new(kind, origin.x, origin.y, 0.0, 0.0);
        let relative: Vec<Point> = points.iter().map(|p| (*p - origin).to_point()).collect();
        if let Some(pts) = element.relative_points_mut() {
            *pts = relative;
        }
        element.normalize_points();
        element
    }

    pub fn with_style(mut self, style: ElementStyle) -> Self {
        self.style = style;
        self
    }

    pub fn with_angle(mut self, angle: f64) -> Self {
        self.angle = angle;
        self
    }

    /// Assign a new random id, returning the old one.
    pub fn regenerate_id(&mut self) -> ElementId {
        std::mem::replace(&mut self.id, Uuid::new_v4())
    }

    /// Record a mutation: bump the version and reroll the nonce.
    pub fn bump_version(&mut self) {
        self.version = self.version.wrapping_add(1);
        self.version_nonce = generate_seed();
    }

    pub fn is_linear(&self) -> bool {
        matches!(self.kind, ElementKind::Line(_) | ElementKind::Arrow(_))
    }

    pub fn is_connector(&self) -> bool {
        matches!(self.kind, ElementKind::Arrow(_))
    }

    pub fn is_elbow(&self) -> bool {
        matches!(&self.kind, ElementKind::Arrow(data) if data.elbowed)
    }

    pub fn is_freehand(&self) -> bool {
        matches!(self.kind, ElementKind::Freehand(_))
    }

    pub fn is_text(&self) -> bool {
        matches!(self.kind, ElementKind::Text(_))
    }

    pub fn is_image(&self) -> bool {
        matches!(self.kind, ElementKind::Image(_))
    }

    pub fn is_frame(&self) -> bool {
        matches!(self.kind, ElementKind::Frame(_))
    }

    pub fn is_embed(&self) -> bool {
        matches!(self.kind, ElementKind::Embed(_))
    }

    /// Rectangle, ellipse or diamond.
    pub fn is_generic_shape(&self) -> bool {
        matches!(
            self.kind,
            ElementKind::Rectangle | ElementKind::Ellipse | ElementKind::Diamond
        )
    }

    pub fn linear(&self) -> Option<&LinearData> {
        match &self.kind {
            ElementKind::Line(data) | ElementKind::Arrow(data) => Some(data),
            _ => None,
        }
    }

    pub fn linear_mut(&mut self) -> Option<&mut LinearData> {
        match &mut self.kind {
            ElementKind::Line(data) | ElementKind::Arrow(data) => Some(data),
            _ => None,
        }
    }

    pub fn text_data(&self) -> Option<&TextData> {
        match &self.kind {
            ElementKind::Text(data) => Some(data),
            _ => None,
        }
    }

    pub fn image_data(&self) -> Option<&ImageData> {
        match &self.kind {
            ElementKind::Image(data) => Some(data),
            _ => None,
        }
    }

    pub fn image_data_mut(&mut self) -> Option<&mut ImageData> {
        match &mut self.kind {
            ElementKind::Image(data) => Some(data),
            _ => None,
        }
    }

    /// Container of a bound text element.
    pub fn container_id(&self) -> Option<ElementId> {
        self.text_data().and_then(|t| t.container_id)
    }

    /// Bound text of a container.
    pub fn bound_text_id(&self) -> Option<ElementId> {
        self.bound_elements
            .iter()
            .find(|b| b.kind == BoundKind::Text)
            .map(|b| b.id)
    }

    /// Points relative to the origin for point-based kinds.
    pub fn relative_points(&self) -> Option<&[Point]> {
        match &self.kind {
            ElementKind::Line(data) | ElementKind::Arrow(data) => Some(&data.points),
            ElementKind::Freehand(data) => Some(&data.points),
            _ => None,
        }
    }

    pub fn relative_points_mut(&mut self) -> Option<&mut Vec<Point>> {
        match &mut self.kind {
            ElementKind::Line(data) | ElementKind::Arrow(data) => Some(&mut data.points),
            ElementKind::Freehand(data) => Some(&mut data.points),
            _ => None,
        }
    }

    pub fn origin(&self) -> Point {
        Point::new(self.x, self.y)
    }

    pub fn center(&self) -> Point {
        Point::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    /// The unrotated box.
    pub fn local_rect(&self) -> Rect {
        Rect::new(self.x, self.y, self.x + self.width, self.y + self.height)
    }

    /// Map an unrotated scene point into the rotated frame.
    pub fn to_world(&self, point: Point) -> Point {
        rotate_point(point, self.center(), self.angle)
    }

    /// Map a scene point into the unrotated frame.
    pub fn to_local(&self, point: Point) -> Point {
        rotate_point(point, self.center(), -self.angle)
    }

    /// Rotated corners: top-left, top-right, bottom-right, bottom-left.
    pub fn corners(&self) -> [Point; 4] {
        let r = self.local_rect();
        [
            self.to_world(Point::new(r.x0, r.y0)),
            self.to_world(Point::new(r.x1, r.y0)),
            self.to_world(Point::new(r.x1, r.y1)),
            self.to_world(Point::new(r.x0, r.y1)),
        ]
    }

    /// Point-based kinds in scene coordinates, empty otherwise.
    pub fn world_points(&self) -> Vec<Point> {
        let origin = self.origin().to_vec2();
        self.relative_points()
            .map(|pts| pts.iter().map(|p| self.to_world(*p + origin)).collect())
            .unwrap_or_default()
    }

    /// Replace the points with scene-space positions, keeping the rotation.
    pub fn set_world_points(&mut self, points: &[Point]) {
        let origin = self.origin().to_vec2();
        let relative: Vec<Point> = points.iter().map(|p| self.to_local(*p) - origin).collect();
        if let Some(pts) = self.relative_points_mut() {
            *pts = relative;
        }
        self.normalize_points();
    }

    /// Re-anchor point-based kinds so their bounding box starts at the
    /// origin, preserving every point's scene position.
    pub fn normalize_points(&mut self) {
        let Some(bounds) = self.relative_points().and_then(points_bounds) else {
            return;
        };
        let min = Vec2::new(bounds.x0, bounds.y0);
        let old_half = Vec2::new(self.width / 2.0, self.height / 2.0);
        let new_half = Vec2::new(bounds.width() / 2.0, bounds.height() / 2.0);
        let shift = old_half - new_half + rotate_vec(min + new_half - old_half, self.angle);

        if let Some(pts) = self.relative_points_mut() {
            for p in pts.iter_mut() {
                *p -= min;
            }
        }
        if let Some(p) = self.linear_mut().and_then(|d| d.last_committed_point.as_mut()) {
            *p -= min;
        }
        self.x += shift.x;
        self.y += shift.y;
        self.width = bounds.width();
        self.height = bounds.height();
    }

    /// Axis-aligned bounds of the rotated element.
    pub fn bounds(&self) -> Rect {
        if self.relative_points().is_some() {
            let pts = self.world_points();
            if let Some(bounds) = points_bounds(&pts) {
                return bounds;
            }
        }
        points_bounds(&self.corners()).unwrap_or_else(|| self.local_rect())
    }

    pub fn translate(&mut self, delta: Vec2) {
        self.x += delta.x;
        self.y += delta.y;
    }

    /// Whether the interior is part of the shape.
    pub fn is_closed_shape(&self) -> bool {
        !matches!(
            self.kind,
            ElementKind::Line(_) | ElementKind::Arrow(_) | ElementKind::Freehand(_)
        )
    }

    /// Outline in scene coordinates: a closed polygon for area kinds, the
    /// polyline itself for point-based kinds.
    pub fn outline(&self) -> Vec<Point> {
        match &self.kind {
            ElementKind::Line(_) | ElementKind::Arrow(_) | ElementKind::Freehand(_) => {
                self.world_points()
            }
            ElementKind::Diamond => {
                let r = self.local_rect();
                let c = r.center();
                [
                    Point::new(c.x, r.y0),
                    Point::new(r.x1, c.y),
                    Point::new(c.x, r.y1),
                    Point::new(r.x0, c.y),
                ]
                .into_iter()
                .map(|p| self.to_world(p))
                .collect()
            }
            ElementKind::Ellipse => {
                let c = self.center();
                let (rx, ry) = (self.width / 2.0, self.height / 2.0);
                (0..ELLIPSE_SEGMENTS)
                    .map(|i| {
                        let t = i as f64 / ELLIPSE_SEGMENTS as f64 * std::f64::consts::TAU;
                        self.to_world(Point::new(c.x + rx * t.cos(), c.y + ry * t.sin()))
                    })
                    .collect()
            }
            _ => self.corners().to_vec(),
        }
    }

    /// Whether the element is too small to keep.
    pub fn is_degenerate(&self, min_size: f64) -> bool {
        if self.is_linear() || self.is_freehand() {
            self.width.hypot(self.height) < min_size
        } else {
            self.width < min_size || self.height < min_size
        }
    }

    /// Whether pose values are finite and sizes non-negative.
    pub fn has_valid_pose(&self) -> bool {
        [self.x, self.y, self.width, self.height, self.angle]
            .iter()
            .all(|v| v.is_finite())
            && self.width >= 0.0
            && self.height >= 0.0
    }
}

/// Rough text box estimate used until the host reports a measured size.
pub fn estimate_text_size(content: &str, font_size: f64) -> Vec2 {
    let lines = content.lines().count().max(1);
    let longest = content.lines().map(|l| l.chars().count()).max().unwrap_or(0).max(1);
    Vec2::new(longest as f64 * font_size * 0.55, lines as f64 * font_size * 1.25)
}
