//! Composite carbon-sequestration suitability score.
//!
//! Two scoring algorithms are kept side by side and selected per definition:
//!
//! * `Tiered`: each attribute is binned into ordinal tiers 1–3 and the tiers
//!   are weighted-summed, giving a continuous 1.0–3.0 rating.
//! * `Normalized`: each attribute is divided by a reference maximum, the
//!   results are weighted-summed and scaled to a 0–100 index.
//!
//! Inputs outside an attribute's reference domain (e.g. clay above 60 %)
//! push the normalized index above 100; that is expected, not clamped.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ConfigurationError;
use crate::raster::{classify_value, Raster};
use crate::source::AttributeSource;

/// Tolerance on the weight sum.
pub const WEIGHT_TOLERANCE: f64 = 1e-6;

/// Source code/band pair identifying one raster at the attribute source.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceSpec {
    pub code: String,
    pub band: String,
}

impl SourceSpec {
    pub fn new(code: impl Into<String>, band: impl Into<String>) -> Self {
        Self { code: code.into(), band: band.into() }
    }
}

/// Soil attributes that feed the composite score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SoilAttribute {
    Clay,
    AvailableWaterCapacity,
    Depth,
}

impl SoilAttribute {
    pub const ALL: [SoilAttribute; 3] = [Self::Clay, Self::AvailableWaterCapacity, Self::Depth];

    /// Surface-layer band used when the composite reads its inputs.
    pub fn source_spec(self) -> SourceSpec {
        match self {
            Self::Clay => SourceSpec::new("CLY", "CLY_000_005_EV"),
            Self::AvailableWaterCapacity => SourceSpec::new("AWC", "AWC_000_005_EV"),
            Self::Depth => SourceSpec::new("DES", "DES_000_200_EV"),
        }
    }

    /// Lower-inclusive tier boundaries: below the first → 1, at or above the last → 3.
    pub fn tier_breaks(self) -> [f64; 2] {
        match self {
            Self::Clay => [15.0, 25.0],
            Self::AvailableWaterCapacity => [8.0, 15.0],
            Self::Depth => [0.5, 1.0],
        }
    }

    /// Divisor mapping the attribute onto [0, 1] in normalized mode.
    pub fn reference_max(self) -> f64 {
        match self {
            Self::Clay => 60.0,
            Self::AvailableWaterCapacity => 0.15,
            Self::Depth => 2.0,
        }
    }
}

impl fmt::Display for SoilAttribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Clay => "clay content",
            Self::AvailableWaterCapacity => "available water capacity",
            Self::Depth => "soil depth",
        };
        f.write_str(name)
    }
}

/// Tier (1, 2 or 3) of a single sample; NaN for an undefined sample.
pub fn tier(attribute: SoilAttribute, value: f32) -> f32 {
    classify_value(value, &attribute.tier_breaks())
}

/// Sample divided by the attribute's reference maximum.
pub fn normalize(attribute: SoilAttribute, value: f32) -> f32 {
    value / attribute.reference_max() as f32
}

/// Which scoring algorithm a definition uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreMode {
    #[default]
    Tiered,
    Normalized,
}

/// A named point on the score scale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreBand {
    pub value: f64,
    pub name: String,
}

/// Range and labelling needed to interpret a composite raster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreScale {
    pub min: f64,
    pub max: f64,
    pub unit: String,
    /// Named bands in ascending order of value.
    pub bands: Vec<ScoreBand>,
}

impl ScoreScale {
    /// Name of the band whose value is closest to `value`.
    pub fn band_name(&self, value: f64) -> Option<&str> {
        self.bands
            .iter()
            .min_by(|a, b| (a.value - value).abs().total_cmp(&(b.value - value).abs()))
            .map(|b| b.name.as_str())
    }
}

impl ScoreMode {
    pub fn scale(self) -> ScoreScale {
        let band = |value: f64, name: &str| ScoreBand { value, name: name.to_string() };
        match self {
            Self::Tiered => ScoreScale {
                min: 1.0,
                max: 3.0,
                unit: "Rating (1-3)".to_string(),
                bands: vec![band(1.0, "Low"), band(2.0, "Medium"), band(3.0, "High")],
            },
            Self::Normalized => ScoreScale {
                min: 0.0,
                max: 100.0,
                unit: "Index (0-100)".to_string(),
                bands: vec![band(0.0, "Low"), band(50.0, "Medium"), band(100.0, "High")],
            },
        }
    }
}

/// Recipe for the composite layer: weighted inputs plus the scoring mode.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreDefinition {
    mode: ScoreMode,
    terms: Vec<(SoilAttribute, f64)>,
}

impl ScoreDefinition {
    /// Validate and build a definition.
    ///
    /// Every attribute in [`SoilAttribute::ALL`] must appear exactly once with a
    /// finite, non-negative weight, and the weights must sum to 1.0.
    pub fn new(mode: ScoreMode, terms: Vec<(SoilAttribute, f64)>) -> Result<Self, ConfigurationError> {
        for (i, &(attribute, weight)) in terms.iter().enumerate() {
            if !weight.is_finite() || weight < 0.0 {
                return Err(ConfigurationError::InvalidWeight { attribute, weight });
            }
            if terms[..i].iter().any(|&(a, _)| a == attribute) {
                return Err(ConfigurationError::DuplicateInput(attribute));
            }
        }
        if let Some(&missing) = SoilAttribute::ALL.iter().find(|&&a| !terms.iter().any(|&(t, _)| t == a)) {
            return Err(ConfigurationError::MissingInput(missing));
        }
        let sum: f64 = terms.iter().map(|&(_, w)| w).sum();
        if (sum - 1.0).abs() > WEIGHT_TOLERANCE {
            return Err(ConfigurationError::WeightSum { sum });
        }
        Ok(Self { mode, terms })
    }

    /// Clay 0.4, available water capacity 0.4, depth 0.2.
    pub fn with_default_weights(mode: ScoreMode) -> Self {
        Self {
            mode,
            terms: vec![
                (SoilAttribute::Clay, 0.4),
                (SoilAttribute::AvailableWaterCapacity, 0.4),
                (SoilAttribute::Depth, 0.2),
            ],
        }
    }

    pub fn mode(&self) -> ScoreMode {
        self.mode
    }

    pub fn terms(&self) -> &[(SoilAttribute, f64)] {
        &self.terms
    }

    pub fn weight(&self, attribute: SoilAttribute) -> f64 {
        self.terms.iter().find(|&&(a, _)| a == attribute).map_or(0.0, |&(_, w)| w)
    }

    /// Score a single cell from raw attribute values.
    pub fn score_point(&self, clay: f32, awc: f32, depth: f32) -> f32 {
        let value_of = |attribute| match attribute {
            SoilAttribute::Clay => clay,
            SoilAttribute::AvailableWaterCapacity => awc,
            SoilAttribute::Depth => depth,
        };
        let sum: f32 = self
            .terms
            .iter()
            .map(|&(attribute, weight)| {
                let v = match self.mode {
                    ScoreMode::Tiered => tier(attribute, value_of(attribute)),
                    ScoreMode::Normalized => normalize(attribute, value_of(attribute)),
                };
                v * weight as f32
            })
            .sum();
        match self.mode {
            ScoreMode::Tiered => sum,
            ScoreMode::Normalized => sum * 100.0,
        }
    }
}

impl Default for ScoreDefinition {
    fn default() -> Self {
        Self::with_default_weights(ScoreMode::default())
    }
}

/// The composite raster together with its interpretation metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct CompositeScore {
    pub raster: Raster,
    pub scale: ScoreScale,
}

impl CompositeScore {
    /// Build the composite from the attribute source's default bands.
    pub fn from_source(source: &dyn AttributeSource, definition: &ScoreDefinition) -> Self {
        let fetch = |attribute: SoilAttribute| {
            let spec = attribute.source_spec();
            source.raster(&spec.code, &spec.band)
        };
        compute_composite_score(
            fetch(SoilAttribute::Clay),
            fetch(SoilAttribute::AvailableWaterCapacity),
            fetch(SoilAttribute::Depth),
            definition,
        )
    }
}

/// Combine the three attribute rasters into the composite score expression.
///
/// The definition was validated on construction, so this cannot fail; the
/// returned raster is deferred and only computed on evaluation.
pub fn compute_composite_score(
    clay: Raster,
    awc: Raster,
    depth: Raster,
    definition: &ScoreDefinition,
) -> CompositeScore {
    let mut inputs = [Some(clay), Some(awc), Some(depth)];

    let terms: Vec<(Raster, f64)> = definition
        .terms
        .iter()
        .filter_map(|&(attribute, weight)| {
            let slot = match attribute {
                SoilAttribute::Clay => 0,
                SoilAttribute::AvailableWaterCapacity => 1,
                SoilAttribute::Depth => 2,
            };
            let input = inputs[slot].take()?;
            let term = match definition.mode {
                ScoreMode::Tiered => input.classify(&attribute.tier_breaks()),
                ScoreMode::Normalized => input.normalize(attribute.reference_max()),
            };
            Some((term, weight))
        })
        .collect();

    let raster = match definition.mode {
        ScoreMode::Tiered => Raster::weighted_sum(terms),
        ScoreMode::Normalized => Raster::weighted_sum(terms).scale(100.0),
    };
    debug!(mode = ?definition.mode, expression = %raster, "built composite score");

    CompositeScore { raster, scale: definition.mode.scale() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::{Extent, Grid};
    use crate::raster::EvalContext;
    use crate::source::InMemorySource;
    use approx::assert_relative_eq;

    fn single(value: f32) -> Raster {
        Raster::from_grid(Grid::new(vec![value], 1, 1, Extent::default()).unwrap())
    }

    fn score(mode: ScoreMode, clay: f32, awc: f32, depth: f32) -> f32 {
        let def = ScoreDefinition::with_default_weights(mode);
        let composite = compute_composite_score(single(clay), single(awc), single(depth), &def);
        let source = InMemorySource::new();
        composite.raster.evaluate(&EvalContext::new(&source)).unwrap().data[0]
    }

    // ── Tier boundaries ──────────────────────────────────────────────────────

    #[test]
    fn tier_boundaries_are_lower_inclusive() {
        assert_eq!(tier(SoilAttribute::Clay, 15.0), 2.0);
        assert_eq!(tier(SoilAttribute::Clay, 25.0), 3.0);
        assert_eq!(tier(SoilAttribute::Depth, 1.0), 3.0);
        assert_eq!(tier(SoilAttribute::AvailableWaterCapacity, 8.0), 2.0);
        assert_eq!(tier(SoilAttribute::Clay, 14.99), 1.0);
        assert_eq!(tier(SoilAttribute::Depth, 0.5), 2.0);
    }

    // ── Scenarios ────────────────────────────────────────────────────────────

    #[test]
    fn tiered_all_low_scores_one() {
        let s = score(ScoreMode::Tiered, 10.0, 5.0, 0.3);
        assert_relative_eq!(s, 1.0, epsilon = 1e-5);
        assert_eq!(ScoreMode::Tiered.scale().band_name(f64::from(s)), Some("Low"));
    }

    #[test]
    fn tiered_all_medium_scores_two() {
        let s = score(ScoreMode::Tiered, 18.0, 10.0, 0.7);
        assert_relative_eq!(s, 2.0, epsilon = 1e-5);
        assert_eq!(ScoreMode::Tiered.scale().band_name(f64::from(s)), Some("Medium"));
    }

    #[test]
    fn tiered_all_high_scores_three() {
        let s = score(ScoreMode::Tiered, 30.0, 20.0, 1.5);
        assert_relative_eq!(s, 3.0, epsilon = 1e-5);
        assert_eq!(ScoreMode::Tiered.scale().band_name(f64::from(s)), Some("High"));
    }

    #[test]
    fn normalized_reference_maxima_score_one_hundred() {
        let s = score(ScoreMode::Normalized, 60.0, 0.15, 2.0);
        assert_relative_eq!(s, 100.0, epsilon = 1e-3);
    }

    #[test]
    fn normalized_out_of_domain_input_exceeds_range() {
        let s = score(ScoreMode::Normalized, 90.0, 0.15, 2.0);
        assert!(s > 100.0, "clay above its reference max should lift the index past 100, got {s}");
    }

    #[test]
    fn scores_stay_within_scale_for_in_domain_inputs() {
        let clays = [0.0f32, 10.0, 15.0, 20.0, 25.0, 45.0, 60.0];
        let awcs = [0.0f32, 0.05, 0.1, 0.15];
        let depths = [0.0f32, 0.4, 0.5, 0.9, 1.0, 2.0];
        for &c in &clays {
            for &a in &awcs {
                for &d in &depths {
                    let t = score(ScoreMode::Tiered, c, a, d);
                    assert!((1.0 - 1e-5..=3.0 + 1e-5).contains(&t), "tiered {t} out of range for ({c}, {a}, {d})");
                    let n = score(ScoreMode::Normalized, c, a, d);
                    assert!((-1e-5..=100.0 + 1e-3).contains(&n), "normalized {n} out of range for ({c}, {a}, {d})");
                }
            }
        }
    }

    #[test]
    fn undefined_input_cell_yields_undefined_score() {
        for mode in [ScoreMode::Tiered, ScoreMode::Normalized] {
            let s = score(mode, f32::NAN, 10.0, 0.7);
            assert!(s.is_nan(), "{mode:?}: missing clay must not be scored, got {s}");
        }
    }

    #[test]
    fn evaluation_is_repeatable() {
        let extent = Extent::default();
        let grid = |v: Vec<f32>| Grid::new(v, 2, 2, extent).unwrap();
        let source = InMemorySource::new()
            .with("CLY", "CLY_000_005_EV", grid(vec![10.0, 18.0, 30.0, f32::NAN]))
            .with("AWC", "AWC_000_005_EV", grid(vec![5.0, 10.0, 20.0, 12.0]))
            .with("DES", "DES_000_200_EV", grid(vec![0.3, 0.7, 1.5, 0.2]));
        let composite = CompositeScore::from_source(&source, &ScoreDefinition::default());

        let ctx = EvalContext::new(&source);
        let first = composite.raster.evaluate(&ctx).unwrap();
        let second = composite.raster.evaluate(&ctx).unwrap();
        for (a, b) in first.data.iter().zip(&second.data) {
            assert!(a.to_bits() == b.to_bits(), "{a} != {b}");
        }
        assert_relative_eq!(first.data[0], 1.0, epsilon = 1e-5);
        assert_relative_eq!(first.data[1], 2.0, epsilon = 1e-5);
        assert_relative_eq!(first.data[2], 3.0, epsilon = 1e-5);
    }

    #[test]
    fn point_score_matches_raster_score() {
        let def = ScoreDefinition::with_default_weights(ScoreMode::Tiered);
        assert_relative_eq!(def.score_point(18.0, 10.0, 1.2), score(ScoreMode::Tiered, 18.0, 10.0, 1.2), epsilon = 1e-5);
        let def = ScoreDefinition::with_default_weights(ScoreMode::Normalized);
        assert_relative_eq!(def.score_point(30.0, 0.1, 1.0), score(ScoreMode::Normalized, 30.0, 0.1, 1.0), epsilon = 1e-3);
    }

    // ── Definition validation ────────────────────────────────────────────────

    #[test]
    fn weights_must_sum_to_one() {
        let err = ScoreDefinition::new(
            ScoreMode::Tiered,
            vec![(SoilAttribute::Clay, 0.5), (SoilAttribute::AvailableWaterCapacity, 0.4), (SoilAttribute::Depth, 0.2)],
        )
        .unwrap_err();
        assert!(matches!(err, ConfigurationError::WeightSum { sum } if (sum - 1.1).abs() < 1e-9));
    }

    #[test]
    fn weights_within_tolerance_are_accepted() {
        let def = ScoreDefinition::new(
            ScoreMode::Normalized,
            vec![(SoilAttribute::Depth, 0.2), (SoilAttribute::Clay, 0.1 + 0.2 + 0.1), (SoilAttribute::AvailableWaterCapacity, 0.4)],
        )
        .unwrap();
        assert_relative_eq!(def.weight(SoilAttribute::Clay), 0.4, epsilon = 1e-12);
    }

    #[test]
    fn missing_input_is_rejected() {
        let err = ScoreDefinition::new(
            ScoreMode::Tiered,
            vec![(SoilAttribute::Clay, 0.5), (SoilAttribute::AvailableWaterCapacity, 0.5)],
        )
        .unwrap_err();
        assert_eq!(err, ConfigurationError::MissingInput(SoilAttribute::Depth));
    }

    #[test]
    fn duplicate_and_negative_weights_are_rejected() {
        let dup = ScoreDefinition::new(
            ScoreMode::Tiered,
            vec![(SoilAttribute::Clay, 0.4), (SoilAttribute::Clay, 0.4), (SoilAttribute::Depth, 0.2)],
        )
        .unwrap_err();
        assert_eq!(dup, ConfigurationError::DuplicateInput(SoilAttribute::Clay));

        let neg = ScoreDefinition::new(
            ScoreMode::Tiered,
            vec![(SoilAttribute::Clay, 1.2), (SoilAttribute::AvailableWaterCapacity, -0.4), (SoilAttribute::Depth, 0.2)],
        )
        .unwrap_err();
        assert!(matches!(neg, ConfigurationError::InvalidWeight { attribute: SoilAttribute::AvailableWaterCapacity, .. }));
    }

    #[test]
    fn default_weights_validate() {
        for mode in [ScoreMode::Tiered, ScoreMode::Normalized] {
            let d = ScoreDefinition::with_default_weights(mode);
            assert_eq!(ScoreDefinition::new(mode, d.terms().to_vec()).unwrap(), d);
        }
    }

    #[test]
    fn band_name_picks_nearest_band() {
        let scale = ScoreMode::Tiered.scale();
        assert_eq!(scale.band_name(1.4), Some("Low"));
        assert_eq!(scale.band_name(1.8), Some("Medium"));
        assert_eq!(scale.band_name(2.6), Some("High"));
    }
}
