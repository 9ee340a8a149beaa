//! Tool selection.

use serde::{Deserialize, Serialize};

/// Available tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ToolKind {
    #[default]
    Select,
    Hand,
    Rectangle,
    Ellipse,
    Diamond,
    Line,
    Arrow,
    Freehand,
    Text,
    Image,
    Frame,
    Embed,
    Eraser,
    Laser,
}

impl ToolKind {
    pub const ALL: [ToolKind; 14] = [
        ToolKind::Select,
        ToolKind::Hand,
        ToolKind::Rectangle,
        ToolKind::Ellipse,
        ToolKind::Diamond,
        ToolKind::Line,
        ToolKind::Arrow,
        ToolKind::Freehand,
        ToolKind::Text,
        ToolKind::Image,
        ToolKind::Frame,
        ToolKind::Embed,
        ToolKind::Eraser,
        ToolKind::Laser,
    ];

    /// Single-key shortcut.
    pub fn shortcut(self) -> Option<char> {
        match self {
            ToolKind::Select => Some('v'),
            ToolKind::Hand => Some('h'),
            ToolKind::Rectangle => Some('r'),
            ToolKind::Ellipse => Some('o'),
            ToolKind::Diamond => Some('d'),
            ToolKind::Line => Some('l'),
            ToolKind::Arrow => Some('a'),
            ToolKind::Freehand => Some('p'),
            ToolKind::Text => Some('t'),
            ToolKind::Image => None,
            ToolKind::Frame => Some('f'),
            ToolKind::Embed => None,
            ToolKind::Eraser => Some('e'),
            ToolKind::Laser => Some('k'),
        }
    }

    pub fn from_shortcut(key: char) -> Option<Self> {
        let key = key.to_ascii_lowercase();
        Self::ALL.into_iter().find(|t| t.shortcut() == Some(key))
    }

    /// Rectangle, ellipse or diamond.
    pub fn is_generic_shape(self) -> bool {
        matches!(self, ToolKind::Rectangle | ToolKind::Ellipse | ToolKind::Diamond)
    }

    pub fn is_linear(self) -> bool {
        matches!(self, ToolKind::Line | ToolKind::Arrow)
    }

    /// Whether the tool draws a box by dragging.
    pub fn draws_box(self) -> bool {
        self.is_generic_shape() || matches!(self, ToolKind::Frame | ToolKind::Embed)
    }

    pub fn name(self) -> &'static str {
        match self {
            ToolKind::Select => "select",
            ToolKind::Hand => "hand",
            ToolKind::Rectangle => "rectangle",
            ToolKind::Ellipse => "ellipse",
            ToolKind::Diamond => "diamond",
            ToolKind::Line => "line",
            ToolKind::Arrow => "arrow",
            ToolKind::Freehand => "freehand",
            ToolKind::Text => "text",
            ToolKind::Image => "image",
            ToolKind::Frame => "frame",
            ToolKind::Embed => "embed",
            ToolKind::Eraser => "eraser",
            ToolKind::Laser => "laser",
        }
    }
}

/// The current tool and whether it stays active after a creation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveTool {
    pub kind: ToolKind,
    pub locked: bool,
}

impl ActiveTool {
    /// Switch tools. The lock is kept.
    pub fn set(&mut self, kind: ToolKind) {
        self.kind = kind;
    }

    /// The tool after finishing a creation gesture.
    pub fn after_creation(&self) -> ToolKind {
        if self.locked || matches!(self.kind, ToolKind::Freehand | ToolKind::Eraser | ToolKind::Laser) {
            self.kind
        } else {
            ToolKind::Select
        }
    }
}
