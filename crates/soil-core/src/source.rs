//! Attribute sources: resolve `(attribute code, band)` to gridded data.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::PathBuf;

use tracing::debug;

use crate::error::RasterError;
use crate::grid::Grid;
use crate::raster::Raster;

/// External raster host. Implementations resolve a soil attribute code and
/// band identifier to samples over the area of interest.
pub trait AttributeSource: Send + Sync {
    /// Fetch the samples for `code`/`band`, or `DataUnavailable`.
    fn fetch(&self, code: &str, band: &str) -> Result<Grid, RasterError>;

    /// Deferred reference to `code`/`band`; nothing is fetched yet.
    fn raster(&self, code: &str, band: &str) -> Raster {
        Raster::source(code, band)
    }
}

/// Grids held in memory, keyed by `(code, band)`.
#[derive(Debug, Default, Clone)]
pub struct InMemorySource {
    grids: HashMap<(String, String), Grid>,
}

impl InMemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, code: impl Into<String>, band: impl Into<String>, grid: Grid) {
        self.grids.insert((code.into(), band.into()), grid);
    }

    pub fn with(mut self, code: impl Into<String>, band: impl Into<String>, grid: Grid) -> Self {
        self.insert(code, band, grid);
        self
    }

    pub fn len(&self) -> usize {
        self.grids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.grids.is_empty()
    }
}

impl AttributeSource for InMemorySource {
    fn fetch(&self, code: &str, band: &str) -> Result<Grid, RasterError> {
        self.grids
            .get(&(code.to_string(), band.to_string()))
            .cloned()
            .ok_or_else(|| RasterError::DataUnavailable { code: code.to_string(), band: band.to_string() })
    }
}

/// Grids stored as JSON files laid out as `<root>/<CODE>/<BAND>.json`.
/// Files are read on every fetch; there is no caching.
#[derive(Debug, Clone)]
pub struct JsonDirSource {
    root: PathBuf,
}

impl JsonDirSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn path_for(&self, code: &str, band: &str) -> PathBuf {
        self.root.join(code).join(format!("{band}.json"))
    }

    /// Write `grid` where `fetch(code, band)` will find it.
    pub fn store(&self, code: &str, band: &str, grid: &Grid) -> Result<(), RasterError> {
        let path = self.path_for(code, band);
        let path_text = path.display().to_string();
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).map_err(|source| RasterError::Io { path: path_text.clone(), source })?;
        }
        let json = serde_json::to_string(grid).map_err(|source| RasterError::Decode { path: path_text.clone(), source })?;
        fs::write(&path, json).map_err(|source| RasterError::Io { path: path_text, source })
    }
}

impl AttributeSource for JsonDirSource {
    fn fetch(&self, code: &str, band: &str) -> Result<Grid, RasterError> {
        let path = self.path_for(code, band);
        let path_text = path.display().to_string();
        debug!(path = %path_text, "reading grid");

        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(RasterError::DataUnavailable { code: code.to_string(), band: band.to_string() });
            }
            Err(source) => return Err(RasterError::Io { path: path_text, source }),
        };

        serde_json::from_str(&text).map_err(|source| RasterError::Decode { path: path_text, source })
    }
}
