//! Legend descriptions derived from a layer's configuration.

use std::fmt::Write as _;

use serde::Serialize;

use crate::registry::{Color, LayerConfig, LayerKind};

/// Colour ramp shown under the legend title.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Gradient {
    pub palette: Vec<Color>,
    pub min: f64,
    pub max: f64,
}

/// A labelled point on the composite score ramp.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BandLabel {
    pub value: f64,
    pub text: String,
    pub color: Color,
}

/// Numeric end labels of a raw-attribute ramp.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RangeLabels {
    pub min: String,
    pub max: String,
}

/// Everything a legend panel needs to describe the displayed layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LegendDescription {
    pub title: String,
    pub unit: String,
    pub gradient: Gradient,
    /// Composite layer only.
    pub band_labels: Option<Vec<BandLabel>>,
    /// Raw attribute layers only.
    pub range_labels: Option<RangeLabels>,
    pub threshold_text: Option<String>,
}

/// Build the legend for `config`. Pure: same config, same legend.
///
/// The composite legend carries one band label per palette colour, evenly
/// spaced from `min` to `max` and named after the nearest score band.
pub fn render(config: &LayerConfig) -> LegendDescription {
    let vis = &config.visualization;
    let gradient = Gradient { palette: vis.palette.clone(), min: vis.min, max: vis.max };

    let (band_labels, range_labels) = match &config.kind {
        LayerKind::Composite { scale } => {
            let n = vis.palette.len();
            let step = if n > 1 { (vis.max - vis.min) / (n - 1) as f64 } else { 0.0 };
            let labels = vis
                .palette
                .iter()
                .enumerate()
                .map(|(i, color)| {
                    let value = vis.min + step * i as f64;
                    let text = match scale.band_name(value) {
                        Some(name) => format!("{value:.1} - {name}"),
                        None => format!("{value:.1}"),
                    };
                    BandLabel { value, text, color: color.clone() }
                })
                .collect();
            (Some(labels), None)
        }
        LayerKind::RawAttribute { .. } => {
            (None, Some(RangeLabels { min: vis.min.to_string(), max: vis.max.to_string() }))
        }
    };

    LegendDescription {
        title: config.label.clone(),
        unit: config.unit.clone(),
        gradient,
        band_labels,
        range_labels,
        threshold_text: config.thresholds.clone(),
    }
}

impl LegendDescription {
    /// Plain-text rendering for hosts without a graphical legend panel.
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "{} ({})", self.title, self.unit);

        let stops: Vec<&str> = self.gradient.palette.iter().map(Color::as_str).collect();
        let _ = writeln!(out, "  palette: {}", stops.join(" > "));

        if let Some(bands) = &self.band_labels {
            for band in bands {
                let _ = writeln!(out, "  {} [{}]", band.text, band.color.hex());
            }
        }
        if let Some(range) = &self.range_labels {
            let _ = writeln!(out, "  {} .. {}", range.min, range.max);
        }
        if let Some(thresholds) = &self.threshold_text {
            let _ = writeln!(out, "  Scoring: {thresholds}");
        }
        out
    }
}
