//! Error taxonomy shared by every stage of the pipeline.
//!
//! `ConfigurationError` is fatal at startup. `NotFound`, `RasterError` and
//! `SelectError` are recoverable: the caller reports them and the previous
//! presentation stays on screen.

use thiserror::Error;

use crate::grid::Extent;
use crate::scoring::SoilAttribute;

/// Malformed score definition, layer catalogue or session configuration.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigurationError {
    #[error("score weights sum to {sum}, expected 1.0")]
    WeightSum { sum: f64 },

    #[error("weight for {attribute} must be finite and non-negative, got {weight}")]
    InvalidWeight { attribute: SoilAttribute, weight: f64 },

    #[error("score definition has no weight for required input {0}")]
    MissingInput(SoilAttribute),

    #[error("score definition lists {0} more than once")]
    DuplicateInput(SoilAttribute),

    #[error("layer label {0:?} is registered more than once")]
    DuplicateLabel(String),

    #[error("layer label must not be empty")]
    EmptyLabel,

    #[error("registry must contain exactly one composite layer, found {0}")]
    CompositeCount(usize),

    #[error("layer {label:?}: visualization min {min} must be below max {max}")]
    InvalidRange { label: String, min: f64, max: f64 },

    #[error("layer {0:?}: palette is empty")]
    EmptyPalette(String),

    #[error("unrecognised colour {0:?}")]
    InvalidColor(String),

    #[error("cannot parse configuration: {0}")]
    Parse(String),

    #[error("cannot read configuration {path}: {message}")]
    Read { path: String, message: String },
}

/// No layer with the queried label exists in the registry.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("no layer labelled {label:?}")]
pub struct NotFound {
    pub label: String,
}

/// Failure while realising a deferred raster expression.
#[derive(Debug, Error)]
pub enum RasterError {
    #[error("no data for attribute {code} band {band}")]
    DataUnavailable { code: String, band: String },

    #[error("grid {found_width}x{found_height} does not match {expected_width}x{expected_height}")]
    ShapeMismatch {
        expected_width: usize,
        expected_height: usize,
        found_width: usize,
        found_height: usize,
    },

    #[error("grid extent {found:?} does not match {expected:?}")]
    ExtentMismatch { expected: Extent, found: Extent },

    #[error("grid has {found} samples, expected {expected}")]
    SampleCount { expected: usize, found: usize },

    #[error("weighted sum has no terms")]
    EmptySum,

    #[error("evaluation cancelled")]
    Cancelled,

    #[error("cannot read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot decode grid {path}: {source}")]
    Decode {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Failure of a layer selection. The presentation state is unchanged.
#[derive(Debug, Error)]
pub enum SelectError {
    #[error("selection error: {0}")]
    Selection(#[from] NotFound),

    #[error("data unavailable for {code} band {band}")]
    DataUnavailable { code: String, band: String },

    #[error("cannot resolve layer raster: {0}")]
    Raster(RasterError),

    #[error("selection superseded by a newer request")]
    Superseded,
}

/// Failure to bring a session up. Nothing is displayed.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("invalid configuration: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("initial layer could not be displayed: {0}")]
    InitialSelection(#[from] SelectError),
}

impl From<RasterError> for SelectError {
    fn from(err: RasterError) -> Self {
        match err {
            RasterError::DataUnavailable { code, band } => Self::DataUnavailable { code, band },
            RasterError::Cancelled => Self::Superseded,
            other => Self::Raster(other),
        }
    }
}
