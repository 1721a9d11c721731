//! Catalogue of selectable analysis layers.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigurationError, NotFound};
use crate::scoring::{ScoreScale, SoilAttribute, SourceSpec};

// ── Colours ──────────────────────────────────────────────────────────────────

/// A palette colour. Keeps the text it was written as (`"d73027"`,
/// `"#1a9850"`, `"brown"`) alongside the parsed RGB triple.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Color {
    text: String,
    rgb: [u8; 3],
}

impl Color {
    pub fn parse(text: &str) -> Result<Self, ConfigurationError> {
        let invalid = || ConfigurationError::InvalidColor(text.to_string());
        let rgb = match named_rgb(text) {
            Some(rgb) => rgb,
            None => {
                let hex = text.strip_prefix('#').unwrap_or(text);
                if hex.len() != 6 || !hex.is_ascii() {
                    return Err(invalid());
                }
                let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).map_err(|_| invalid());
                [channel(0)?, channel(2)?, channel(4)?]
            }
        };
        Ok(Self { text: text.to_string(), rgb })
    }

    pub fn rgb(&self) -> [u8; 3] {
        self.rgb
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// `#rrggbb` form, whatever the colour was written as.
    pub fn hex(&self) -> String {
        let [r, g, b] = self.rgb;
        format!("#{r:02x}{g:02x}{b:02x}")
    }
}

fn named_rgb(name: &str) -> Option<[u8; 3]> {
    let rgb = match name.to_ascii_lowercase().as_str() {
        "black" => [0, 0, 0],
        "white" => [255, 255, 255],
        "red" => [255, 0, 0],
        "orange" => [255, 165, 0],
        "yellow" => [255, 255, 0],
        "green" => [0, 128, 0],
        "cyan" => [0, 255, 255],
        "blue" => [0, 0, 255],
        "brown" => [165, 42, 42],
        _ => return None,
    };
    Some(rgb)
}

impl TryFrom<String> for Color {
    type Error = ConfigurationError;

    fn try_from(text: String) -> Result<Self, Self::Error> {
        Color::parse(&text)
    }
}

impl From<Color> for String {
    fn from(color: Color) -> Self {
        color.text
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Parse a whole palette.
pub fn palette(colors: &[&str]) -> Result<Vec<Color>, ConfigurationError> {
    colors.iter().map(|c| Color::parse(c)).collect()
}

// ── Layer configuration ──────────────────────────────────────────────────────

/// How raster values map onto colours.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Visualization {
    pub min: f64,
    pub max: f64,
    pub palette: Vec<Color>,
}

impl Visualization {
    /// Palette colour for `value`, linearly interpolated between stops.
    /// None for NaN or an empty palette.
    pub fn color_for(&self, value: f32) -> Option<[u8; 3]> {
        if value.is_nan() || self.palette.is_empty() {
            return None;
        }
        let t = ((f64::from(value) - self.min) / (self.max - self.min)).clamp(0.0, 1.0);
        let pos = t * (self.palette.len() - 1) as f64;
        let lo = pos.floor() as usize;
        let hi = (lo + 1).min(self.palette.len() - 1);
        let frac = pos - lo as f64;

        let (a, b) = (self.palette[lo].rgb(), self.palette[hi].rgb());
        let mix = |i: usize| (f64::from(a[i]) + (f64::from(b[i]) - f64::from(a[i])) * frac).round() as u8;
        Some([mix(0), mix(1), mix(2)])
    }
}

/// Composite or raw attribute layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LayerKind {
    /// The derived suitability score.
    Composite { scale: ScoreScale },
    /// A single attribute read straight from the source.
    RawAttribute { source: SourceSpec },
}

/// One selectable analysis layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerConfig {
    pub label: String,
    pub kind: LayerKind,
    pub visualization: Visualization,
    pub unit: String,
    /// Classification boundaries shown verbatim in the legend.
    pub thresholds: Option<String>,
}

impl LayerConfig {
    pub fn is_composite(&self) -> bool {
        matches!(self.kind, LayerKind::Composite { .. })
    }

    pub fn source_spec(&self) -> Option<&SourceSpec> {
        match &self.kind {
            LayerKind::RawAttribute { source } => Some(source),
            LayerKind::Composite { .. } => None,
        }
    }

    fn validate(&self) -> Result<(), ConfigurationError> {
        if self.label.is_empty() {
            return Err(ConfigurationError::EmptyLabel);
        }
        let vis = &self.visualization;
        if !(vis.min < vis.max) {
            return Err(ConfigurationError::InvalidRange { label: self.label.clone(), min: vis.min, max: vis.max });
        }
        if vis.palette.is_empty() {
            return Err(ConfigurationError::EmptyPalette(self.label.clone()));
        }
        Ok(())
    }
}

// ── Registry ─────────────────────────────────────────────────────────────────

/// Ordered, label-keyed catalogue of layers. Immutable once built.
#[derive(Debug, Clone)]
pub struct LayerRegistry {
    layers: Vec<LayerConfig>,
    index: HashMap<String, usize>,
}

impl LayerRegistry {
    /// Validate and index `layers`, keeping registration order.
    ///
    /// Exactly one layer must be composite, labels must be unique and every
    /// visualization must have `min < max` and a non-empty palette.
    pub fn new(layers: Vec<LayerConfig>) -> Result<Self, ConfigurationError> {
        let mut index = HashMap::with_capacity(layers.len());
        for (i, layer) in layers.iter().enumerate() {
            layer.validate()?;
            if index.insert(layer.label.clone(), i).is_some() {
                return Err(ConfigurationError::DuplicateLabel(layer.label.clone()));
            }
        }
        let composites = layers.iter().filter(|l| l.is_composite()).count();
        if composites != 1 {
            return Err(ConfigurationError::CompositeCount(composites));
        }
        Ok(Self { layers, index })
    }

    /// The default catalogue: the composite score followed by the raw soil
    /// attributes, surface layer unless noted.
    pub fn standard(scale: &ScoreScale) -> Result<Self, ConfigurationError> {
        let soil = palette(&["FFFFE5", "FFF7BC", "FEE391", "FEC44F", "FE9929", "EC7014", "CC4C02", "8C2D04"])?;
        let water = palette(&["brown", "white", "blue"])?;
        let score = palette(&["#d73027", "#fc8d59", "#fee08b", "#d9ef8b", "#91cf60", "#1a9850"])?;

        let raw = |label: &str, spec: SourceSpec, min: f64, max: f64, palette: Vec<Color>, unit: &str, thresholds: Option<&str>| {
            LayerConfig {
                label: label.to_string(),
                kind: LayerKind::RawAttribute { source: spec },
                visualization: Visualization { min, max, palette },
                unit: unit.to_string(),
                thresholds: thresholds.map(str::to_string),
            }
        };

        Self::new(vec![
            LayerConfig {
                label: "Carbon Sequestration Potential".to_string(),
                kind: LayerKind::Composite { scale: scale.clone() },
                visualization: Visualization { min: scale.min, max: scale.max, palette: score },
                unit: scale.unit.clone(),
                thresholds: None,
            },
            raw("Bulk Density", SourceSpec::new("BDW", "BDW_000_005_EV"), 1.0, 1.8, soil.clone(), "g/cm³", None),
            raw(
                "Organic Carbon",
                SourceSpec::new("SOC", "SOC_000_005_EV"),
                0.0,
                5.0,
                palette(&["black", "brown", "orange", "yellow"])?,
                "%",
                None,
            ),
            raw(
                "Clay Content",
                SoilAttribute::Clay.source_spec(),
                0.0,
                60.0,
                soil,
                "%",
                Some("0-15% (Low) | 15-25% (Medium) | >25% (High)"),
            ),
            raw(
                "Available Water Capacity",
                SoilAttribute::AvailableWaterCapacity.source_spec(),
                0.0,
                20.0,
                water,
                "%",
                Some("0-8% (Low) | 8-15% (Medium) | >15% (High)"),
            ),
            raw(
                "Depth of Soil",
                SoilAttribute::Depth.source_spec(),
                0.1,
                2.0,
                palette(&["8d6738", "252525"])?,
                "m",
                Some("0-0.5m (Low) | 0.5-1.0m (Medium) | >1.0m (High)"),
            ),
        ])
    }

    /// Exact-match lookup.
    pub fn find_by_label(&self, label: &str) -> Result<&LayerConfig, NotFound> {
        self.index
            .get(label)
            .map(|&i| &self.layers[i])
            .ok_or_else(|| NotFound { label: label.to_string() })
    }

    /// All layers in registration order.
    pub fn all(&self) -> &[LayerConfig] {
        &self.layers
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.layers.iter().map(|l| l.label.as_str())
    }

    /// The default selection.
    pub fn first(&self) -> &LayerConfig {
        // Construction rejects an empty list (it must hold a composite).
        &self.layers[0]
    }

    pub fn composite(&self) -> &LayerConfig {
        self.layers.iter().find(|l| l.is_composite()).unwrap_or_else(|| self.first())
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }
}
