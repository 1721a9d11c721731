//! Display-side collaborators driven by the presentation controller.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};

use crate::grid::Grid;
use crate::legend::LegendDescription;
use crate::registry::Visualization;

/// Map canvas showing exactly one raster layer at a time.
pub trait RenderSurface: Send {
    /// Replace whatever is displayed with `grid` styled by `visualization`.
    fn set_single_layer(&mut self, grid: Arc<Grid>, visualization: &Visualization, title: &str);

    /// Pan/zoom the view. Called once at startup.
    fn center_view(&mut self, lon: f64, lat: f64, zoom: u8);
}

/// Panel receiving the legend of the displayed layer.
pub trait LegendPanel: Send {
    fn show(&mut self, legend: &LegendDescription);
}

/// Initial map view.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ViewCenter {
    pub lon: f64,
    pub lat: f64,
    pub zoom: u8,
}

impl Default for ViewCenter {
    /// Perth, Western Australia.
    fn default() -> Self {
        Self { lon: 115.86, lat: -31.95, zoom: 6 }
    }
}

/// The layer currently on a surface.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub title: String,
    pub grid: Arc<Grid>,
    pub visualization: Visualization,
}

impl Frame {
    /// RGBA pixels, row-major; undefined cells are fully transparent.
    pub fn to_rgba(&self) -> Vec<u8> {
        paint_rgba(&self.grid, &self.visualization)
    }
}

/// Colour every cell of `grid` through `visualization`.
pub fn paint_rgba(grid: &Grid, visualization: &Visualization) -> Vec<u8> {
    let mut out = Vec::with_capacity(grid.data.len() * 4);
    for &v in &grid.data {
        match visualization.color_for(v) {
            Some([r, g, b]) => out.extend_from_slice(&[r, g, b, 255]),
            None => out.extend_from_slice(&[0, 0, 0, 0]),
        }
    }
    out
}

/// A frame and the legend that describes it.
#[derive(Debug, Clone, PartialEq)]
pub struct Presentation {
    pub frame: Frame,
    pub legend: LegendDescription,
}

#[derive(Debug, Default)]
struct Slot {
    staged: Option<Frame>,
    shown: Option<Presentation>,
    view: Option<ViewCenter>,
}

/// Surface and legend panel in one, keeping the displayed presentation where
/// a host can read it back. Clones share the same slot.
///
/// A frame handed to [`RenderSurface::set_single_layer`] stays staged until
/// the next [`LegendPanel::show`], which publishes frame and legend together.
/// Readers never see a frame next to a legend from another layer.
#[derive(Debug, Clone, Default)]
pub struct PresentationStore {
    slot: Arc<Mutex<Slot>>,
}

impl PresentationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The displayed frame and its legend, read under one lock.
    pub fn snapshot(&self) -> Option<Presentation> {
        self.lock().shown.clone()
    }

    pub fn frame(&self) -> Option<Frame> {
        self.lock().shown.as_ref().map(|p| p.frame.clone())
    }

    pub fn legend(&self) -> Option<LegendDescription> {
        self.lock().shown.as_ref().map(|p| p.legend.clone())
    }

    pub fn view(&self) -> Option<ViewCenter> {
        self.lock().view
    }

    fn lock(&self) -> MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl RenderSurface for PresentationStore {
    fn set_single_layer(&mut self, grid: Arc<Grid>, visualization: &Visualization, title: &str) {
        let frame = Frame { title: title.to_string(), grid, visualization: visualization.clone() };
        self.lock().staged = Some(frame);
    }

    fn center_view(&mut self, lon: f64, lat: f64, zoom: u8) {
        self.lock().view = Some(ViewCenter { lon, lat, zoom });
    }
}

impl LegendPanel for PresentationStore {
    fn show(&mut self, legend: &LegendDescription) {
        let mut slot = self.lock();
        let frame = match slot.staged.take() {
            Some(frame) => frame,
            None => match slot.shown.take() {
                Some(shown) => shown.frame,
                None => return,
            },
        };
        slot.shown = Some(Presentation { frame, legend: legend.clone() });
    }
}
