//! Inkboard Gesture Replay
//!
//! Feeds a recorded gesture script through the engine and prints the
//! resulting live elements as JSON.
//!
//! ## Script format
//!
//! ```json
//! {
//!   "viewport": { "width": 1280, "height": 720 },
//!   "steps": [
//!     { "type": "tool", "tool": "rectangle" },
//!     { "type": "pointer_down", "position": { "x": 0, "y": 0 } },
//!     { "type": "pointer_move", "position": { "x": 100, "y": 50 } },
//!     { "type": "pointer_up", "position": { "x": 100, "y": 50 } },
//!     { "type": "key_down", "key": "escape" },
//!     { "type": "undo" }
//!   ]
//! }
//! ```

use clap::Parser;
use inkboard_core::{
    ConfigError, Element, ElementId, Engine, EngineConfig, EngineEvent, History, Key, Modifiers, PointerEvent,
    ToolKind,
};
use kurbo::{Point, Size, Vec2};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Parser)]
#[command(name = "inkboard-replay", version, about = "Replay a gesture script through the inkboard engine")]
struct Args {
    /// Gesture script (JSON).
    script: PathBuf,

    /// Engine configuration (JSON). Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level filter; overrides RUST_LOG.
    #[arg(long)]
    log_level: Option<log::LevelFilter>,

    /// Pretty-print the output.
    #[arg(long)]
    pretty: bool,
}

#[derive(Debug, Error)]
enum ReplayError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid script: {0}")]
    Script(#[from] serde_json::Error),
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("step {step}: no text element is being edited")]
    NoTextTarget { step: usize },
}

#[derive(Debug, Deserialize)]
struct Script {
    #[serde(default)]
    viewport: Option<Viewport>,
    #[serde(default)]
    initial: Vec<Element>,
    steps: Vec<Step>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
struct Viewport {
    width: f64,
    height: f64,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum Step {
    Tool {
        tool: ToolKind,
        #[serde(default)]
        locked: Option<bool>,
    },
    PointerDown(PointerEvent),
    PointerMove(PointerEvent),
    PointerUp(PointerEvent),
    /// Apply queued moves, as a redraw would.
    Frame,
    KeyDown {
        key: Key,
        #[serde(default)]
        modifiers: Modifiers,
    },
    KeyUp {
        key: Key,
        #[serde(default)]
        modifiers: Modifiers,
    },
    Wheel {
        delta: Vec2,
        position: Point,
        #[serde(default)]
        modifiers: Modifiers,
    },
    Blur,
    SubmitText {
        /// Defaults to the element currently being edited.
        #[serde(default)]
        element: Option<ElementId>,
        content: String,
    },
    PlaceImage {
        file_id: String,
        width: f64,
        height: f64,
    },
    ResolveImage {
        file_id: String,
        #[serde(default)]
        size: Option<Viewport>,
        #[serde(default)]
        error: Option<String>,
    },
    Undo,
    Redo,
}

fn read(path: &Path) -> Result<String, ReplayError> {
    std::fs::read_to_string(path).map_err(|source| ReplayError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Feed engine notifications to the history. Returns how many were seen.
fn record(engine: &mut Engine, history: &mut History) -> usize {
    let events = engine.drain_events();
    for event in &events {
        match event {
            EngineEvent::SceneChanged(change) => history.record(change, engine.scene().snapshot()),
            EngineEvent::Notice { message } => log::info!("{}", message),
            EngineEvent::TextEditRequested { element_id } => log::debug!("Text edit requested for {}", element_id),
            _ => {}
        }
    }
    events.len()
}

fn apply(engine: &mut Engine, history: &mut History, index: usize, step: Step) -> Result<(), ReplayError> {
    match step {
        Step::Tool { tool, locked } => {
            engine.set_tool(tool);
            if let Some(locked) = locked {
                engine.set_tool_locked(locked);
            }
        }
        Step::PointerDown(event) => engine.on_pointer_down(event),
        Step::PointerMove(event) => engine.queue_pointer_move(event),
        Step::PointerUp(event) => engine.on_pointer_up(event),
        Step::Frame => engine.flush_frame(),
        Step::KeyDown { key, modifiers } => engine.on_key_down(key, modifiers),
        Step::KeyUp { key, modifiers } => engine.on_key_up(key, modifiers),
        Step::Wheel {
            delta,
            position,
            modifiers,
        } => engine.on_wheel(delta, position, modifiers),
        Step::Blur => engine.on_blur(),
        Step::SubmitText { element, content } => {
            let id = element
                .or(engine.editing_text())
                .ok_or(ReplayError::NoTextTarget { step: index })?;
            engine.submit_text(id, &content);
        }
        Step::PlaceImage { file_id, width, height } => {
            engine.begin_image_placement(file_id, Size::new(width, height));
        }
        Step::ResolveImage { file_id, size, error } => {
            let result = match (size, error) {
                (_, Some(error)) => Err(error),
                (Some(size), None) => Ok(Size::new(size.width, size.height)),
                (None, None) => Err("no image data".to_string()),
            };
            engine.resolve_image(&file_id, result);
        }
        Step::Undo => match history.undo() {
            Some(elements) => engine.replace_elements(elements),
            None => log::warn!("Step {}: nothing to undo", index),
        },
        Step::Redo => match history.redo() {
            Some(elements) => engine.replace_elements(elements),
            None => log::warn!("Step {}: nothing to redo", index),
        },
    }
    Ok(())
}

fn run(args: &Args) -> Result<String, ReplayError> {
    let config = match &args.config {
        Some(path) => EngineConfig::from_json_str(&read(path)?)?,
        None => EngineConfig::default(),
    };
    let script: Script = serde_json::from_str(&read(&args.script)?)?;

    let mut engine = Engine::new(config);
    if let Some(viewport) = script.viewport {
        engine.set_viewport(Size::new(viewport.width, viewport.height));
    }
    engine.replace_elements(script.initial);
    let mut history = History::new(engine.scene().snapshot());
    engine.drain_events();

    let total = script.steps.len();
    let mut events = 0;
    for (index, step) in script.steps.into_iter().enumerate() {
        log::trace!("Step {}: {:?}", index, step);
        apply(&mut engine, &mut history, index, step)?;
        events += record(&mut engine, &mut history);
    }
    engine.on_blur();
    events += record(&mut engine, &mut history);
    log::info!(
        "Replayed {} step(s), {} event(s), {} live element(s)",
        total,
        events,
        engine.scene().live_count()
    );

    let live: Vec<&Element> = engine.scene().non_deleted().collect();
    let output = if args.pretty {
        serde_json::to_string_pretty(&live)?
    } else {
        serde_json::to_string(&live)?
    };
    Ok(output)
}

fn main() {
    let args = Args::parse();

    let mut logger = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if let Some(level) = args.log_level {
        logger.filter_level(level);
    }
    logger.init();

    match run(&args) {
        Ok(output) => println!("{output}"),
        Err(err) => {
            log::error!("{}", err);
            std::process::exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn replay(json: &str) -> Engine {
        let script: Script = serde_json::from_str(json).unwrap();
        let mut engine = Engine::default();
        let mut history = History::default();
        engine.replace_elements(script.initial);
        engine.drain_events();
        for (index, step) in script.steps.into_iter().enumerate() {
            apply(&mut engine, &mut history, index, step).unwrap();
            record(&mut engine, &mut history);
        }
        engine
    }

    #[test]
    fn test_script_draws_rectangle() {
        let engine = replay(
            r#"{"steps": [
                {"type": "tool", "tool": "rectangle"},
                {"type": "pointer_down", "position": {"x": 0, "y": 0}},
                {"type": "pointer_move", "position": {"x": 100, "y": 50}},
                {"type": "frame"},
                {"type": "pointer_up", "position": {"x": 100, "y": 50}}
            ]}"#,
        );
        let rect = engine.scene().non_deleted().next().unwrap();
        assert_eq!((rect.width, rect.height), (100.0, 50.0));
    }

    #[test]
    fn test_undo_step_restores_previous_scene() {
        let engine = replay(
            r#"{"steps": [
                {"type": "tool", "tool": "ellipse"},
                {"type": "pointer_down", "position": {"x": 0, "y": 0}},
                {"type": "pointer_up", "position": {"x": 40, "y": 40}},
                {"type": "undo"}
            ]}"#,
        );
        assert!(engine.scene().is_empty());
    }

    #[test]
    fn test_submit_text_without_target_fails() {
        let script: Script =
            serde_json::from_str(r#"{"steps": [{"type": "submit_text", "content": "hi"}]}"#).unwrap();
        let mut engine = Engine::default();
        let mut history = History::default();
        let step = script.steps.into_iter().next().unwrap();
        let err = apply(&mut engine, &mut history, 0, step).unwrap_err();
        assert!(matches!(err, ReplayError::NoTextTarget { step: 0 }));
    }

    #[test]
    fn test_args_parse() {
        let args = Args::parse_from(["inkboard-replay", "script.json", "--log-level", "debug", "--pretty"]);
        assert_eq!(args.log_level, Some(log::LevelFilter::Debug));
        assert!(args.pretty);
        assert!(args.config.is_none());
    }
}
