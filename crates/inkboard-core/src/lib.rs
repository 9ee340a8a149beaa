//! Inkboard Core Library
//!
//! Pointer-driven scene editing for an infinite-canvas whiteboard: the
//! element model, hit-testing, snapping, bindings and the gesture engine.
//! Rendering is left to the host, which reads [`RenderState`].

pub mod binding;
pub mod camera;
pub mod config;
pub mod elbow;
pub mod element;
pub mod engine;
pub mod frame;
pub mod group;
pub mod handles;
pub mod history;
pub mod input;
pub mod platform;
pub mod scene;
pub mod selection;
pub mod session;
pub mod snap;
pub mod tools;
pub mod transform;

pub use camera::Camera;
pub use config::{ArrowType, ConfigError, EngineConfig};
pub use element::{Element, ElementId, ElementKind, ElementStyle, GroupId};
pub use engine::{Engine, EngineEvent, RenderState};
pub use history::History;
pub use input::{Key, Modifiers, PointerButton, PointerEvent};
pub use platform::WinitAdapter;
pub use scene::{CommitDirective, Scene, SceneChange, SceneError, SceneResult};
pub use selection::Selection;
pub use snap::{SnapLine, SnapMode};
pub use tools::ToolKind;
