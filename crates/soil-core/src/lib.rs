//! Soil carbon-sequestration suitability analysis.
//!
//! Pipeline:
//!   attribute source → scoring engine → layer registry →
//!   presentation controller → {render surface, legend panel}.
//!
//! Rasters are deferred expressions ([`raster::Raster`]) realised only when a
//! layer is selected for display.

pub mod config;
pub mod controller;
pub mod error;
pub mod grid;
pub mod legend;
pub mod raster;
pub mod registry;
pub mod scoring;
pub mod session;
pub mod source;
pub mod surface;

pub use config::{SessionConfig, Weights};
pub use controller::{Displayed, PresentationController, PresentationState};
pub use error::{ConfigurationError, NotFound, RasterError, SelectError, StartupError};
pub use grid::{Extent, Grid};
pub use legend::{render as render_legend, LegendDescription};
pub use raster::{EvalContext, Raster};
pub use registry::{Color, LayerConfig, LayerKind, LayerRegistry, Visualization};
pub use scoring::{compute_composite_score, CompositeScore, ScoreDefinition, ScoreMode, ScoreScale, SoilAttribute, SourceSpec};
pub use session::Session;
pub use source::{AttributeSource, InMemorySource, JsonDirSource};
pub use surface::{LegendPanel, Presentation, PresentationStore, RenderSurface, ViewCenter};
