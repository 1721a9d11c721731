//! Browser bindings: a presentation session whose surface and legend panel
//! are read back by JavaScript after each selection.
//!
//! Construct with a bundle of grids and an optional session config:
//!
//! ```json
//! {
//!   "config": { "mode": "tiered" },
//!   "grids": [ { "code": "CLY", "band": "CLY_000_005_EV", "grid": { ... } } ]
//! }
//! ```

use std::sync::Arc;

use anyhow::Context;
use serde::Deserialize;
use wasm_bindgen::prelude::*;

use soil_core::{
    AttributeSource, Grid, InMemorySource, PresentationController, PresentationStore, Session, SessionConfig,
};

#[derive(Debug, Deserialize)]
struct GridEntry {
    code: String,
    band: String,
    grid: Grid,
}

#[derive(Debug, Deserialize)]
struct Bundle {
    #[serde(default)]
    config: SessionConfig,
    grids: Vec<GridEntry>,
}

fn parse_bundle(json: &str) -> anyhow::Result<(SessionConfig, InMemorySource)> {
    let bundle: Bundle = serde_json::from_str(json).context("invalid session bundle")?;
    let mut source = InMemorySource::new();
    for entry in bundle.grids {
        source.insert(entry.code, entry.band, entry.grid);
    }
    Ok((bundle.config, source))
}

fn js_err(err: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&err.to_string())
}

#[wasm_bindgen]
pub struct SoilSession {
    session: Session,
    store: PresentationStore,
}

#[wasm_bindgen]
impl SoilSession {
    /// Start a session from a JSON bundle; the composite layer is displayed.
    #[wasm_bindgen(constructor)]
    pub fn new(bundle_json: &str) -> Result<SoilSession, JsValue> {
        let (config, source) = parse_bundle(bundle_json).map_err(|e| js_err(format!("{e:#}")))?;
        let store = PresentationStore::new();
        let controller = PresentationController::from_config(
            &config,
            Arc::new(source) as Arc<dyn AttributeSource>,
            Box::new(store.clone()),
            Box::new(store.clone()),
        )
        .map_err(js_err)?;
        Ok(Self { session: Session::new(controller), store })
    }

    /// Layer labels in display order, for the selection control.
    pub fn labels(&self) -> Vec<String> {
        self.session.labels()
    }

    /// Display `label`. On error the previous layer stays on screen.
    pub fn select(&self, label: &str) -> Result<(), JsValue> {
        self.session.select(label).map_err(js_err)
    }

    #[wasm_bindgen(js_name = currentLabel)]
    pub fn current_label(&self) -> Option<String> {
        self.session.current_label()
    }

    /// The legend for the displayed layer as a plain JS object.
    pub fn legend(&self) -> Result<JsValue, JsValue> {
        let legend = self.store.legend().ok_or_else(|| js_err("no legend shown"))?;
        serde_wasm_bindgen::to_value(&legend).map_err(js_err)
    }

    /// RGBA pixels of the displayed layer, row-major from the north edge.
    #[wasm_bindgen(js_name = frameRgba)]
    pub fn frame_rgba(&self) -> Vec<u8> {
        self.store.frame().map(|f| f.to_rgba()).unwrap_or_default()
    }

    #[wasm_bindgen(js_name = frameWidth)]
    pub fn frame_width(&self) -> usize {
        self.store.frame().map_or(0, |f| f.grid.width)
    }

    #[wasm_bindgen(js_name = frameHeight)]
    pub fn frame_height(&self) -> usize {
        self.store.frame().map_or(0, |f| f.grid.height)
    }

    /// `[lon, lat, zoom]` of the initial view.
    pub fn view(&self) -> Vec<f64> {
        self.store.view().map_or_else(Vec::new, |v| vec![v.lon, v.lat, f64::from(v.zoom)])
    }

    /// Displayed value at a point, `undefined` where the cell is undefined.
    pub fn inspect(&self, lon: f64, lat: f64) -> Option<f32> {
        self.session.inspect(lon, lat)
    }
}
