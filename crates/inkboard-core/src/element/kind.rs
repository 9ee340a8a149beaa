//! Per-type payloads carried by [`ElementKind`].

use super::ElementId;
use kurbo::Point;
use serde::{Deserialize, Serialize};

/// Type tag plus type-specific data of an element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ElementKind {
    Rectangle,
    Ellipse,
    Diamond,
    /// Free polyline without binding support.
    Line(LinearData),
    /// Connector; endpoints may bind to shapes.
    Arrow(LinearData),
    Freehand(FreehandData),
    Text(TextData),
    Image(ImageData),
    Frame(FrameData),
    Embed(EmbedData),
}

impl ElementKind {
    /// Short name used in logs and scripts.
    pub fn name(&self) -> &'static str {
        match self {
            ElementKind::Rectangle => "rectangle",
            ElementKind::Ellipse => "ellipse",
            ElementKind::Diamond => "diamond",
            ElementKind::Line(_) => "line",
            ElementKind::Arrow(_) => "arrow",
            ElementKind::Freehand(_) => "freehand",
            ElementKind::Text(_) => "text",
            ElementKind::Image(_) => "image",
            ElementKind::Frame(_) => "frame",
            ElementKind::Embed(_) => "embed",
        }
    }
}

/// Arrowhead decoration at a connector end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Arrowhead {
    #[default]
    Arrow,
    Triangle,
    Bar,
    Dot,
}

/// Attachment of one connector endpoint to a bindable element.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PointBinding {
    pub element_id: ElementId,
    /// Anchor inside the target's local box, each coordinate in `[0, 1]`.
    pub focus: Point,
    /// Clearance kept between the endpoint and the target outline.
    pub gap: f64,
}

/// Which end of a connector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Endpoint {
    Start,
    End,
}

impl Endpoint {
    pub fn other(self) -> Self {
        match self {
            Endpoint::Start => Endpoint::End,
            Endpoint::End => Endpoint::Start,
        }
    }
}

/// Points and bindings of a line or connector.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LinearData {
    /// Points relative to the element origin.
    pub points: Vec<Point>,
    pub start_binding: Option<PointBinding>,
    pub end_binding: Option<PointBinding>,
    /// Orthogonally routed connector.
    pub elbowed: bool,
    pub start_arrowhead: Option<Arrowhead>,
    pub end_arrowhead: Option<Arrowhead>,
    /// Last point confirmed while multi-point editing, relative to the origin.
    pub last_committed_point: Option<Point>,
}

impl LinearData {
    pub fn binding(&self, endpoint: Endpoint) -> Option<&PointBinding> {
        match endpoint {
            Endpoint::Start => self.start_binding.as_ref(),
            Endpoint::End => self.end_binding.as_ref(),
        }
    }

    pub fn binding_mut(&mut self, endpoint: Endpoint) -> &mut Option<PointBinding> {
        match endpoint {
            Endpoint::Start => &mut self.start_binding,
            Endpoint::End => &mut self.end_binding,
        }
    }

    /// Straight two-point path.
    pub fn is_simple(&self) -> bool {
        self.points.len() <= 2
    }

    /// Elbow connector with both ends attached.
    pub fn is_fully_connected_elbow(&self) -> bool {
        self.elbowed && self.start_binding.is_some() && self.end_binding.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FreehandData {
    /// Points relative to the element origin.
    pub points: Vec<Point>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextData {
    pub content: String,
    pub font_size: f64,
    /// Container this text is bound to.
    pub container_id: Option<ElementId>,
}

impl Default for TextData {
    fn default() -> Self {
        Self {
            content: String::new(),
            font_size: 20.0,
            container_id: None,
        }
    }
}

/// Load state of an image's backing file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageStatus {
    #[default]
    Pending,
    Ready,
    Error,
}

/// Visible sub-rectangle of an image in natural pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ImageCrop {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub natural_width: f64,
    pub natural_height: f64,
}

impl ImageCrop {
    /// Crop covering the whole image.
    pub fn full(natural_width: f64, natural_height: f64) -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            width: natural_width,
            height: natural_height,
            natural_width,
            natural_height,
        }
    }

    pub fn is_full(&self) -> bool {
        self.x <= 0.0
            && self.y <= 0.0
            && self.width >= self.natural_width
            && self.height >= self.natural_height
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageData {
    /// Host-side identifier of the image bytes.
    pub file_id: String,
    pub status: ImageStatus,
    pub crop: Option<ImageCrop>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FrameData {
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbedData {
    pub link: String,
}

/// Kind of a back-reference stored on a bindable element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoundKind {
    Text,
    Connector,
}

/// Back-reference from a bindable element to something attached to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundElement {
    pub id: ElementId,
    pub kind: BoundKind,
}
