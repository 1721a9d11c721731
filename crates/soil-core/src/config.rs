//! Session configuration, read from JSON. Every field is optional.
//!
//! ```json
//! {
//!   "mode": "normalized",
//!   "weights": { "clay": 0.5, "available_water_capacity": 0.3, "depth": 0.2 },
//!   "view": { "lon": 115.86, "lat": -31.95, "zoom": 6 }
//! }
//! ```

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigurationError;
use crate::scoring::{ScoreDefinition, ScoreMode, SoilAttribute};
use crate::surface::ViewCenter;

/// Per-attribute weights overriding the 0.4 / 0.4 / 0.2 default.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Weights {
    pub clay: f64,
    pub available_water_capacity: f64,
    pub depth: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SessionConfig {
    pub mode: ScoreMode,
    pub weights: Option<Weights>,
    pub view: ViewCenter,
}

impl SessionConfig {
    pub fn from_json_str(text: &str) -> Result<Self, ConfigurationError> {
        serde_json::from_str(text).map_err(|e| ConfigurationError::Parse(e.to_string()))
    }

    pub fn load(path: &Path) -> Result<Self, ConfigurationError> {
        let text = fs::read_to_string(path).map_err(|e| ConfigurationError::Read {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        Self::from_json_str(&text)
    }

    /// The validated score definition this configuration describes.
    pub fn score_definition(&self) -> Result<ScoreDefinition, ConfigurationError> {
        match self.weights {
            None => Ok(ScoreDefinition::with_default_weights(self.mode)),
            Some(w) => ScoreDefinition::new(
                self.mode,
                vec![
                    (SoilAttribute::Clay, w.clay),
                    (SoilAttribute::AvailableWaterCapacity, w.available_water_capacity),
                    (SoilAttribute::Depth, w.depth),
                ],
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn empty_object_gives_defaults() {
        let cfg = SessionConfig::from_json_str("{}").unwrap();
        assert_eq!(cfg, SessionConfig::default());
        assert_eq!(cfg.score_definition().unwrap(), ScoreDefinition::with_default_weights(ScoreMode::Tiered));
        assert_eq!(cfg.view, ViewCenter { lon: 115.86, lat: -31.95, zoom: 6 });
    }

    #[test]
    fn weights_and_mode_override() {
        let cfg = SessionConfig::from_json_str(
            r#"{"mode": "normalized", "weights": {"clay": 0.5, "available_water_capacity": 0.3, "depth": 0.2}}"#,
        )
        .unwrap();
        let def = cfg.score_definition().unwrap();
        assert_eq!(def.mode(), ScoreMode::Normalized);
        assert_relative_eq!(def.weight(SoilAttribute::Clay), 0.5);
        assert_relative_eq!(def.weight(SoilAttribute::AvailableWaterCapacity), 0.3);
    }

    #[test]
    fn unknown_fields_and_modes_are_parse_errors() {
        assert!(matches!(SessionConfig::from_json_str(r#"{"mood": "tiered"}"#), Err(ConfigurationError::Parse(_))));
        assert!(matches!(SessionConfig::from_json_str(r#"{"mode": "linear"}"#), Err(ConfigurationError::Parse(_))));
    }

    #[test]
    fn load_reports_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = SessionConfig::load(&dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, ConfigurationError::Read { .. }));

        let path = dir.path().join("session.json");
        fs::write(&path, r#"{"view": {"lon": 120.0, "lat": -28.0, "zoom": 5}}"#).unwrap();
        assert_eq!(SessionConfig::load(&path).unwrap().view.zoom, 5);
    }
}
