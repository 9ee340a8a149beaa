//! Engine configuration.

use crate::element::ElementStyle;
use crate::snap::SnapMode;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Path style of newly drawn connectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArrowType {
    /// Freely placed points.
    #[default]
    Sharp,
    /// Orthogonally routed.
    Elbow,
}

/// Tunables of the interaction engine. Distances marked "px" are screen
/// pixels and are divided by the camera zoom before use.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Grid cell size in scene units.
    pub grid_size: f64,
    pub snap_mode: SnapMode,
    /// Snap distance (px).
    pub snap_distance: f64,
    /// Element hit tolerance (px).
    pub hit_threshold: f64,
    /// Transform handle hit tolerance (px).
    pub handle_threshold: f64,
    /// Movement needed before a linear element registers a drag (px).
    pub drag_threshold: f64,
    /// Distance from the last committed point that confirms or removes a
    /// point while multi-point editing (px).
    pub line_confirm_threshold: f64,
    pub arrow_type: ArrowType,
    pub bindings_enabled: bool,
    /// Clip hit-testing of frame members to their frame.
    pub frame_clipping: bool,
    /// Arrow-key nudge in scene units.
    pub translate_amount: f64,
    /// Arrow-key nudge with shift held.
    pub shift_translate_amount: f64,
    /// Elements smaller than this on finalize are discarded.
    pub min_element_size: f64,
    pub double_click_ms: u64,
    /// Double-click max distance (px).
    pub double_click_distance: f64,
    /// Max points kept in the laser trail.
    pub laser_trail_length: usize,
    /// Holding alt while erasing unmarks elements instead of marking them.
    pub eraser_alt_restores: bool,
    /// Style applied to newly created elements.
    pub default_style: ElementStyle,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            grid_size: 20.0,
            snap_mode: SnapMode::None,
            snap_distance: 8.0,
            hit_threshold: 10.0,
            handle_threshold: 12.0,
            drag_threshold: 10.0,
            line_confirm_threshold: 8.0,
            arrow_type: ArrowType::Sharp,
            bindings_enabled: true,
            frame_clipping: true,
            translate_amount: 1.0,
            shift_translate_amount: 5.0,
            min_element_size: 1.0,
            double_click_ms: 500,
            double_click_distance: 5.0,
            laser_trail_length: 64,
            eraser_alt_restores: true,
            default_style: ElementStyle::default(),
        }
    }
}

impl EngineConfig {
    /// Parse and validate a JSON document. Missing fields use defaults.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path.as_ref())?;
        log::debug!("Loading engine config from {}", path.as_ref().display());
        Self::from_json_str(&json)
    }

    /// Check value ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("hit_threshold", self.hit_threshold),
            ("handle_threshold", self.handle_threshold),
            ("snap_distance", self.snap_distance),
            ("line_confirm_threshold", self.line_confirm_threshold),
        ];
        for (field, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(ConfigError::Invalid {
                    field,
                    reason: format!("must be positive, got {value}"),
                });
            }
        }
        let non_negative = [
            ("grid_size", self.grid_size),
            ("drag_threshold", self.drag_threshold),
            ("translate_amount", self.translate_amount),
            ("shift_translate_amount", self.shift_translate_amount),
            ("min_element_size", self.min_element_size),
            ("double_click_distance", self.double_click_distance),
        ];
        for (field, value) in non_negative {
            if !(value.is_finite() && value >= 0.0) {
                return Err(ConfigError::Invalid {
                    field,
                    reason: format!("must be non-negative, got {value}"),
                });
            }
        }
        if self.snap_mode.snaps_to_grid() && self.grid_size <= 0.0 {
            return Err(ConfigError::Invalid {
                field: "grid_size",
                reason: "grid snapping needs a positive grid size".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        assert!(EngineConfig::default().validate().is_ok());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = EngineConfig::from_json_str(r#"{ "grid_size": 10, "arrow_type": "elbow" }"#).unwrap();
        assert!((config.grid_size - 10.0).abs() < f64::EPSILON);
        assert_eq!(config.arrow_type, ArrowType::Elbow);
        assert!((config.hit_threshold - 10.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_invalid_threshold_rejected() {
        let err = EngineConfig::from_json_str(r#"{ "hit_threshold": 0 }"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "hit_threshold", .. }));
    }

    #[test]
    fn test_malformed_json() {
        assert!(matches!(
            EngineConfig::from_json_str("{ not json"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "snap_mode": "grid", "grid_size": 25 }}"#).unwrap();
        let config = EngineConfig::load(file.path()).unwrap();
        assert_eq!(config.snap_mode, SnapMode::Grid);
        assert!((config.grid_size - 25.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = EngineConfig::load(dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
