//! Deferred raster expressions.
//!
//! A [`Raster`] describes a computation: a source reference, an inline grid,
//! or a combinator over other rasters. Nothing is fetched or computed until
//! [`Raster::evaluate`] realises the expression into a [`Grid`].
//!
//! Every per-cell kernel is pure, so cells are independent and may be
//! processed in any order (in parallel with the `threading` feature).
//! Undefined cells (`NaN`) stay undefined through every combinator.

use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::error::RasterError;
use crate::grid::Grid;
use crate::source::AttributeSource;

/// Inputs needed to realise a raster expression.
pub struct EvalContext<'a> {
    pub source: &'a dyn AttributeSource,
    /// Polled before every fetch and combinator; `true` aborts evaluation.
    pub is_cancelled: &'a dyn Fn() -> bool,
}

fn never_cancelled() -> bool {
    false
}

impl<'a> EvalContext<'a> {
    pub fn new(source: &'a dyn AttributeSource) -> Self {
        Self { source, is_cancelled: &never_cancelled }
    }

    pub fn with_cancel(source: &'a dyn AttributeSource, is_cancelled: &'a dyn Fn() -> bool) -> Self {
        Self { source, is_cancelled }
    }
}

/// A raster expression node.
#[derive(Debug, Clone, PartialEq)]
pub enum Raster {
    /// Gridded data resolved through the attribute source.
    Source { code: String, band: String },
    /// Already realised samples.
    Grid(Arc<Grid>),
    /// Ordinal remap: `1 + number of breaks <= cell`. Breaks are lower-inclusive.
    Classify { input: Box<Raster>, breaks: Vec<f64> },
    /// Linear rescale: `cell / reference`.
    Normalize { input: Box<Raster>, reference: f64 },
    /// `cell * factor`.
    Scale { input: Box<Raster>, factor: f64 },
    /// `sum(weight_i * raster_i)`; all operands must share dimensions.
    WeightedSum { terms: Vec<(Raster, f64)> },
}

impl Raster {
    pub fn source(code: impl Into<String>, band: impl Into<String>) -> Self {
        Self::Source { code: code.into(), band: band.into() }
    }

    pub fn from_grid(grid: Grid) -> Self {
        Self::Grid(Arc::new(grid))
    }

    pub fn classify(self, breaks: &[f64]) -> Self {
        Self::Classify { input: Box::new(self), breaks: breaks.to_vec() }
    }

    pub fn normalize(self, reference: f64) -> Self {
        Self::Normalize { input: Box::new(self), reference }
    }

    pub fn scale(self, factor: f64) -> Self {
        Self::Scale { input: Box::new(self), factor }
    }

    pub fn weighted_sum(terms: Vec<(Raster, f64)>) -> Self {
        Self::WeightedSum { terms }
    }

    /// Every `(code, band)` pair the expression reads, in evaluation order.
    pub fn sources(&self) -> Vec<(&str, &str)> {
        match self {
            Self::Source { code, band } => vec![(code.as_str(), band.as_str())],
            Self::Grid(_) => Vec::new(),
            Self::Classify { input, .. } | Self::Normalize { input, .. } | Self::Scale { input, .. } => {
                input.sources()
            }
            Self::WeightedSum { terms } => terms.iter().flat_map(|(r, _)| r.sources()).collect(),
        }
    }

    /// Realise the expression. Sources are fetched fresh on every call.
    pub fn evaluate(&self, ctx: &EvalContext<'_>) -> Result<Grid, RasterError> {
        if (ctx.is_cancelled)() {
            return Err(RasterError::Cancelled);
        }

        match self {
            Self::Source { code, band } => {
                debug!(code = %code, band = %band, "fetching source raster");
                ctx.source.fetch(code, band)
            }
            Self::Grid(grid) => Ok(Grid::clone(grid)),
            Self::Classify { input, breaks } => {
                let mut grid = input.evaluate(ctx)?;
                map_cells(&mut grid.data, |v| classify_value(v, breaks));
                Ok(grid)
            }
            Self::Normalize { input, reference } => {
                let mut grid = input.evaluate(ctx)?;
                let reference = *reference as f32;
                map_cells(&mut grid.data, |v| v / reference);
                Ok(grid)
            }
            Self::Scale { input, factor } => {
                let mut grid = input.evaluate(ctx)?;
                let factor = *factor as f32;
                map_cells(&mut grid.data, |v| v * factor);
                Ok(grid)
            }
            Self::WeightedSum { terms } => {
                let mut terms = terms.iter();
                let (first, weight) = terms.next().ok_or(RasterError::EmptySum)?;
                let mut acc = first.evaluate(ctx)?;
                let weight = *weight as f32;
                map_cells(&mut acc.data, |v| v * weight);

                for (raster, weight) in terms {
                    let grid = raster.evaluate(ctx)?;
                    if !acc.same_shape(&grid) {
                        return Err(RasterError::ShapeMismatch {
                            expected_width: acc.width,
                            expected_height: acc.height,
                            found_width: grid.width,
                            found_height: grid.height,
                        });
                    }
                    if !acc.aligned_with(&grid) {
                        return Err(RasterError::ExtentMismatch { expected: acc.extent, found: grid.extent });
                    }
                    accumulate(&mut acc.data, &grid.data, *weight as f32);
                }
                Ok(acc)
            }
        }
    }
}

impl fmt::Display for Raster {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Source { code, band } => write!(f, "{code}:{band}"),
            Self::Grid(grid) => write!(f, "grid[{}x{}]", grid.width, grid.height),
            Self::Classify { input, breaks } => write!(f, "classify({input}, {breaks:?})"),
            Self::Normalize { input, reference } => write!(f, "({input} / {reference})"),
            Self::Scale { input, factor } => write!(f, "({input} * {factor})"),
            Self::WeightedSum { terms } => {
                write!(f, "(")?;
                for (i, (raster, weight)) in terms.iter().enumerate() {
                    if i > 0 {
                        write!(f, " + ")?;
                    }
                    write!(f, "{weight} * {raster}")?;
                }
                write!(f, ")")
            }
        }
    }
}

/// Tier of a single cell. NaN stays NaN.
pub fn classify_value(v: f32, breaks: &[f64]) -> f32 {
    if v.is_nan() {
        return f32::NAN;
    }
    let v = f64::from(v);
    1.0 + breaks.iter().filter(|&&b| v >= b).count() as f32
}

#[cfg(feature = "threading")]
fn map_cells<F>(data: &mut [f32], f: F)
where
    F: Fn(f32) -> f32 + Sync + Send,
{
    use rayon::prelude::*;
    data.par_iter_mut().for_each(|v| *v = f(*v));
}

#[cfg(not(feature = "threading"))]
fn map_cells<F>(data: &mut [f32], f: F)
where
    F: Fn(f32) -> f32,
{
    for v in data.iter_mut() {
        *v = f(*v);
    }
}

#[cfg(feature = "threading")]
fn accumulate(acc: &mut [f32], other: &[f32], weight: f32) {
    use rayon::prelude::*;
    acc.par_iter_mut().zip(other.par_iter()).for_each(|(a, &b)| *a += b * weight);
}

#[cfg(not(feature = "threading"))]
fn accumulate(acc: &mut [f32], other: &[f32], weight: f32) {
    for (a, &b) in acc.iter_mut().zip(other) {
        *a += b * weight;
    }
}
