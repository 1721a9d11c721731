//! Presentation state machine.
//!
//! ```text
//!   Uninitialized ──initialize()──▶ Displaying(first label)
//!   Displaying(a) ───select(b)────▶ Displaying(b)   on success
//!   Displaying(a) ───select(b)────▶ Displaying(a)   on any error
//! ```
//!
//! All fallible work (lookup, raster evaluation) happens before anything is
//! written to the surface or legend panel, and both are then written in the
//! same `&mut self` call, so nobody observes a new raster with an old legend.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::SessionConfig;
use crate::error::{SelectError, StartupError};
use crate::grid::Grid;
use crate::legend::{self, LegendDescription};
use crate::raster::{EvalContext, Raster};
use crate::registry::{LayerConfig, LayerKind, LayerRegistry};
use crate::scoring::{CompositeScore, ScoreScale};
use crate::source::AttributeSource;
use crate::surface::{LegendPanel, RenderSurface, ViewCenter};

/// What is on screen right now.
#[derive(Debug, Clone, PartialEq)]
pub struct Displayed {
    pub label: String,
    pub grid: Arc<Grid>,
    pub legend: LegendDescription,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum PresentationState {
    #[default]
    Uninitialized,
    Displaying(Displayed),
}

/// Owns the presentation state and drives the surface and legend panel.
pub struct PresentationController {
    registry: Arc<LayerRegistry>,
    composite: CompositeScore,
    source: Arc<dyn AttributeSource>,
    surface: Box<dyn RenderSurface>,
    legend_panel: Box<dyn LegendPanel>,
    state: PresentationState,
}

impl PresentationController {
    /// A controller in the `Uninitialized` state. Nothing is drawn yet.
    pub fn new(
        registry: Arc<LayerRegistry>,
        composite: CompositeScore,
        source: Arc<dyn AttributeSource>,
        surface: Box<dyn RenderSurface>,
        legend_panel: Box<dyn LegendPanel>,
    ) -> Self {
        Self { registry, composite, source, surface, legend_panel, state: PresentationState::Uninitialized }
    }

    /// Centre the view and display the first registered layer.
    pub fn start(
        registry: Arc<LayerRegistry>,
        composite: CompositeScore,
        source: Arc<dyn AttributeSource>,
        surface: Box<dyn RenderSurface>,
        legend_panel: Box<dyn LegendPanel>,
        view: ViewCenter,
    ) -> Result<Self, SelectError> {
        let mut controller = Self::new(registry, composite, source, surface, legend_panel);
        controller.surface.center_view(view.lon, view.lat, view.zoom);
        controller.initialize()?;
        Ok(controller)
    }

    /// Build the score definition and standard catalogue from `config`, then
    /// [`start`](Self::start). Configuration errors abort startup.
    pub fn from_config(
        config: &SessionConfig,
        source: Arc<dyn AttributeSource>,
        surface: Box<dyn RenderSurface>,
        legend_panel: Box<dyn LegendPanel>,
    ) -> Result<Self, StartupError> {
        let definition = config.score_definition()?;
        let composite = CompositeScore::from_source(source.as_ref(), &definition);
        let registry = Arc::new(LayerRegistry::standard(&composite.scale)?);
        info!(mode = ?definition.mode(), layers = registry.len(), "starting presentation");
        Ok(Self::start(registry, composite, source, surface, legend_panel, config.view)?)
    }

    /// Leave `Uninitialized` by selecting the first registered layer.
    /// No-op once something is displayed.
    pub fn initialize(&mut self) -> Result<(), SelectError> {
        if let PresentationState::Displaying(_) = self.state {
            return Ok(());
        }
        let first = self.registry.first().label.clone();
        self.select(&first)
    }

    /// Display the layer labelled `label`.
    pub fn select(&mut self, label: &str) -> Result<(), SelectError> {
        self.select_with(label, &|| false)
    }

    /// [`select`](Self::select) with a cancellation probe. A cancelled
    /// selection fails with `Superseded` and leaves the state untouched.
    pub fn select_with(&mut self, label: &str, is_cancelled: &dyn Fn() -> bool) -> Result<(), SelectError> {
        let config = self.registry.find_by_label(label).inspect_err(|e| warn!("rejected selection: {e}"))?;

        let raster = self.resolve(config);
        debug!(label, expression = %raster, "resolving layer");
        let grid = raster
            .evaluate(&EvalContext::with_cancel(self.source.as_ref(), is_cancelled))
            .inspect_err(|e| warn!(label, "layer unavailable: {e}"))?;
        if is_cancelled() {
            return Err(SelectError::Superseded);
        }

        let grid = Arc::new(grid);
        let legend = legend::render(config);

        self.surface.set_single_layer(Arc::clone(&grid), &config.visualization, &config.label);
        self.legend_panel.show(&legend);
        self.state = PresentationState::Displaying(Displayed { label: config.label.clone(), grid, legend });

        info!(label, "displaying layer");
        Ok(())
    }

    /// The deferred raster behind `config`.
    pub fn resolve(&self, config: &LayerConfig) -> Raster {
        match &config.kind {
            LayerKind::Composite { .. } => self.composite.raster.clone(),
            LayerKind::RawAttribute { source } => self.source.raster(&source.code, &source.band),
        }
    }

    /// Value of the displayed layer at (lon, lat).
    pub fn inspect(&self, lon: f64, lat: f64) -> Option<f32> {
        match &self.state {
            PresentationState::Displaying(d) => d.grid.sample(lon, lat),
            PresentationState::Uninitialized => None,
        }
    }

    pub fn state(&self) -> &PresentationState {
        &self.state
    }

    pub fn current_label(&self) -> Option<&str> {
        match &self.state {
            PresentationState::Displaying(d) => Some(&d.label),
            PresentationState::Uninitialized => None,
        }
    }

    pub fn current_legend(&self) -> Option<&LegendDescription> {
        match &self.state {
            PresentationState::Displaying(d) => Some(&d.legend),
            PresentationState::Uninitialized => None,
        }
    }

    pub fn registry(&self) -> &Arc<LayerRegistry> {
        &self.registry
    }

    pub fn score_scale(&self) -> &ScoreScale {
        &self.composite.scale
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ConfigurationError;
    use crate::grid::Extent;
    use crate::scoring::{ScoreDefinition, ScoreMode};
    use crate::source::InMemorySource;
    use crate::surface::PresentationStore;
    use approx::assert_relative_eq;
    use std::cell::Cell;

    fn grid(values: Vec<f32>) -> Grid {
        Grid::new(values, 2, 1, Extent::default()).unwrap()
    }

    /// Composite inputs plus organic carbon; bulk density deliberately absent.
    fn source() -> InMemorySource {
        InMemorySource::new()
            .with("CLY", "CLY_000_005_EV", grid(vec![10.0, 30.0]))
            .with("AWC", "AWC_000_005_EV", grid(vec![5.0, 20.0]))
            .with("DES", "DES_000_200_EV", grid(vec![0.3, 1.5]))
            .with("SOC", "SOC_000_005_EV", grid(vec![1.2, 3.4]))
    }

    fn controller(source: InMemorySource) -> (PresentationController, PresentationStore) {
        let definition = ScoreDefinition::with_default_weights(ScoreMode::Tiered);
        let composite = CompositeScore::from_source(&source, &definition);
        let registry = Arc::new(LayerRegistry::standard(&composite.scale).unwrap());
        let store = PresentationStore::new();
        let c = PresentationController::new(
            registry,
            composite,
            Arc::new(source),
            Box::new(store.clone()),
            Box::new(store.clone()),
        );
        (c, store)
    }

    #[test]
    fn initialize_displays_first_layer() {
        let (mut c, store) = controller(source());
        assert_eq!(c.state(), &PresentationState::Uninitialized);
        assert!(c.inspect(115.0, -30.0).is_none());

        c.initialize().unwrap();
        assert_eq!(c.current_label(), Some("Carbon Sequestration Potential"));
        let frame = store.frame().unwrap();
        assert_eq!(frame.title, "Carbon Sequestration Potential");
        assert_relative_eq!(frame.grid.data[0], 1.0, epsilon = 1e-5);
        assert_relative_eq!(frame.grid.data[1], 3.0, epsilon = 1e-5);
        assert_eq!(store.legend().unwrap().title, "Carbon Sequestration Potential");
    }

    #[test]
    fn raw_layer_selection_fetches_and_updates_both_facets() {
        let (mut c, store) = controller(source());
        c.initialize().unwrap();
        c.select("Organic Carbon").unwrap();

        assert_eq!(c.current_label(), Some("Organic Carbon"));
        assert_eq!(store.frame().unwrap().grid.data, vec![1.2, 3.4]);
        let legend = store.legend().unwrap();
        assert_eq!(legend.title, "Organic Carbon");
        assert!(legend.band_labels.is_none());
        assert_eq!(c.current_legend(), Some(&legend));
    }

    #[test]
    fn unknown_label_keeps_previous_display() {
        let (mut c, store) = controller(source());
        c.initialize().unwrap();
        let before_state = c.state().clone();
        let before_frame = store.frame().unwrap();
        let before_legend = store.legend().unwrap();

        let err = c.select("unknown-label").unwrap_err();
        assert!(matches!(err, SelectError::Selection(ref nf) if nf.label == "unknown-label"));
        assert_eq!(c.state(), &before_state);
        assert_eq!(store.frame().unwrap(), before_frame);
        assert_eq!(store.legend().unwrap(), before_legend);
    }

    #[test]
    fn missing_source_data_propagates_and_keeps_display() {
        let (mut c, store) = controller(source());
        c.initialize().unwrap();
        let err = c.select("Bulk Density").unwrap_err();
        assert!(matches!(err, SelectError::DataUnavailable { ref code, .. } if code == "BDW"));
        assert_eq!(c.current_label(), Some("Carbon Sequestration Potential"));
        assert_eq!(store.frame().unwrap().title, "Carbon Sequestration Potential");
    }

    #[test]
    fn failed_initial_selection_stays_uninitialized() {
        let empty = InMemorySource::new();
        let (mut c, store) = controller(empty);
        assert!(matches!(c.initialize().unwrap_err(), SelectError::DataUnavailable { .. }));
        assert_eq!(c.state(), &PresentationState::Uninitialized);
        assert!(store.frame().is_none());
        assert!(store.legend().is_none());
    }

    #[test]
    fn cancelled_selection_commits_nothing() {
        let (mut c, store) = controller(source());
        c.initialize().unwrap();
        let polls = Cell::new(0);
        let cancel_late = || {
            polls.set(polls.get() + 1);
            polls.get() > 1
        };
        let err = c.select_with("Organic Carbon", &cancel_late).unwrap_err();
        assert!(matches!(err, SelectError::Superseded));
        assert_eq!(c.current_label(), Some("Carbon Sequestration Potential"));
        assert_eq!(store.frame().unwrap().title, "Carbon Sequestration Potential");
    }

    #[test]
    fn inspect_reads_displayed_layer() {
        let (mut c, _) = controller(source());
        c.select("Organic Carbon").unwrap();
        let e = Extent::default();
        assert_eq!(c.inspect(e.min_lon + 0.1, e.max_lat - 0.1), Some(1.2));
        assert_eq!(c.inspect(e.max_lon - 0.1, e.max_lat - 0.1), Some(3.4));
        assert_eq!(c.inspect(0.0, 0.0), None);
    }

    #[test]
    fn start_centres_view_once_and_displays_first_layer() {
        let source = source();
        let definition = ScoreDefinition::default();
        let composite = CompositeScore::from_source(&source, &definition);
        let registry = Arc::new(LayerRegistry::standard(&composite.scale).unwrap());
        let store = PresentationStore::new();
        let c = PresentationController::start(
            registry,
            composite,
            Arc::new(source),
            Box::new(store.clone()),
            Box::new(store.clone()),
            ViewCenter::default(),
        )
        .unwrap();
        assert_eq!(store.view(), Some(ViewCenter { lon: 115.86, lat: -31.95, zoom: 6 }));
        assert_eq!(c.current_label(), Some("Carbon Sequestration Potential"));
    }

    #[test]
    fn from_config_rejects_bad_weights() {
        let config = SessionConfig::from_json_str(r#"{"weights": {"clay": 0.5, "available_water_capacity": 0.5, "depth": 0.5}}"#)
            .unwrap();
        let err = PresentationController::from_config(
            &config,
            Arc::new(source()),
            Box::new(PresentationStore::new()),
            Box::new(PresentationStore::new()),
        )
        .err()
        .unwrap();
        assert!(matches!(err, StartupError::Configuration(ConfigurationError::WeightSum { .. })));
    }
}
