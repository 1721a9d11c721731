use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::RasterError;

/// Geographic bounds of a grid in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Extent {
    pub min_lon: f64,
    pub max_lon: f64,
    pub min_lat: f64,
    pub max_lat: f64,
}

impl Extent {
    pub fn new(min_lon: f64, max_lon: f64, min_lat: f64, max_lat: f64) -> Self {
        Self { min_lon, max_lon, min_lat, max_lat }
    }

    pub fn contains(&self, lon: f64, lat: f64) -> bool {
        lon >= self.min_lon && lon <= self.max_lon && lat >= self.min_lat && lat <= self.max_lat
    }
}

impl Default for Extent {
    /// Western Australia, the area the default layers were tuned for.
    fn default() -> Self {
        Self::new(112.0, 129.0, -35.5, -13.5)
    }
}

/// A realised raster: row-major f32 samples, row 0 at `max_lat`.
/// Undefined (no-data) cells hold `NaN`.
///
/// Deserialisation goes through [`Grid::new`], so a decoded grid always
/// holds `width * height` samples.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawGrid")]
pub struct Grid {
    #[serde(serialize_with = "nan_as_null_vec")]
    pub data: Vec<f32>,
    pub width: usize,
    pub height: usize,
    pub extent: Extent,
}

impl Grid {
    /// Wrap existing samples, checking the sample count against the shape.
    pub fn new(data: Vec<f32>, width: usize, height: usize, extent: Extent) -> Result<Self, RasterError> {
        if data.len() != width * height {
            return Err(RasterError::SampleCount { expected: width * height, found: data.len() });
        }
        Ok(Self { data, width, height, extent })
    }

    /// Create a grid filled with the given value.
    pub fn filled(width: usize, height: usize, extent: Extent, fill: f32) -> Self {
        Self { data: vec![fill; width * height], width, height, extent }
    }

    /// Build a grid from nested rows. Rows must all have the same length.
    pub fn from_rows(rows: &[Vec<f32>], extent: Extent) -> Result<Self, RasterError> {
        let width = rows.first().map_or(0, Vec::len);
        let data: Vec<f32> = rows.iter().flatten().copied().collect();
        Self::new(data, width, rows.len(), extent)
    }

    #[inline]
    pub fn get(&self, row: usize, col: usize) -> f32 {
        self.data[row * self.width + col]
    }

    #[inline]
    pub fn set(&mut self, row: usize, col: usize, val: f32) {
        self.data[row * self.width + col] = val;
    }

    pub fn same_shape(&self, other: &Grid) -> bool {
        self.width == other.width && self.height == other.height
    }

    /// Same shape over the same bounds, so cells correspond one to one.
    pub fn aligned_with(&self, other: &Grid) -> bool {
        self.same_shape(other) && self.extent == other.extent
    }

    /// Value of the cell containing (lon, lat).
    /// Returns None outside the extent or on an undefined cell.
    pub fn sample(&self, lon: f64, lat: f64) -> Option<f32> {
        if self.width == 0 || self.height == 0 || !self.extent.contains(lon, lat) {
            return None;
        }
        let e = &self.extent;
        let fx = (lon - e.min_lon) / (e.max_lon - e.min_lon) * self.width as f64;
        let fy = (e.max_lat - lat) / (e.max_lat - e.min_lat) * self.height as f64;
        let col = (fx.floor() as usize).min(self.width - 1);
        let row = (fy.floor() as usize).min(self.height - 1);

        let v = self.get(row, col);
        (!v.is_nan()).then_some(v)
    }

    /// Number of defined (non-NaN) cells.
    pub fn valid_count(&self) -> usize {
        self.data.iter().filter(|v| !v.is_nan()).count()
    }

    /// (min, max) over defined cells, None when every cell is undefined.
    pub fn valid_range(&self) -> Option<(f32, f32)> {
        self.data
            .iter()
            .copied()
            .filter(|v| !v.is_nan())
            .fold(None, |acc, v| match acc {
                None => Some((v, v)),
                Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
            })
    }
}

// ── Serde helpers ─────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct RawGrid {
    #[serde(deserialize_with = "null_as_nan_vec")]
    data: Vec<f32>,
    width: usize,
    height: usize,
    extent: Extent,
}

impl TryFrom<RawGrid> for Grid {
    type Error = RasterError;

    fn try_from(raw: RawGrid) -> Result<Self, Self::Error> {
        Grid::new(raw.data, raw.width, raw.height, raw.extent)
    }
}

// JSON has no NaN; undefined cells travel as null.
fn nan_as_null_vec<S: Serializer>(data: &[f32], s: S) -> Result<S::Ok, S::Error> {
    s.collect_seq(data.iter().map(|v| (!v.is_nan()).then_some(*v)))
}

fn null_as_nan_vec<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<f32>, D::Error> {
    let v: Vec<Option<f32>> = Vec::deserialize(d)?;
    Ok(v.into_iter().map(|x| x.unwrap_or(f32::NAN)).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_extent() -> Extent {
        Extent::new(0.0, 4.0, 0.0, 4.0)
    }

    #[test]
    fn new_rejects_wrong_sample_count() {
        let err = Grid::new(vec![0.0; 5], 2, 2, unit_extent()).unwrap_err();
        assert!(matches!(err, RasterError::SampleCount { expected: 4, found: 5 }));
    }

    #[test]
    fn sample_picks_containing_cell_row_zero_north() {
        let mut g = Grid::filled(4, 4, unit_extent(), 0.0);
        g.set(0, 0, 10.0); // north-west corner cell
        g.set(3, 3, 40.0); // south-east corner cell

        assert_eq!(g.sample(0.5, 3.5), Some(10.0));
        assert_eq!(g.sample(3.5, 0.5), Some(40.0));
        assert_eq!(g.sample(4.0, 0.0), Some(40.0));
    }

    #[test]
    fn sample_out_of_bounds_or_undefined_returns_none() {
        let mut g = Grid::filled(4, 4, unit_extent(), 1.0);
        g.set(1, 1, f32::NAN);
        assert!(g.sample(-1.0, 2.0).is_none());
        assert!(g.sample(2.0, 5.0).is_none());
        assert!(g.sample(1.5, 2.5).is_none());
    }

    #[test]
    fn valid_range_skips_undefined_cells() {
        let g = Grid::from_rows(&[vec![3.0, f32::NAN], vec![-1.0, 7.5]], unit_extent()).unwrap();
        assert_eq!(g.valid_count(), 3);
        assert_eq!(g.valid_range(), Some((-1.0, 7.5)));

        let empty = Grid::filled(2, 2, unit_extent(), f32::NAN);
        assert_eq!(empty.valid_range(), None);
    }

    #[test]
    fn undefined_cells_serialise_as_null() {
        let g = Grid::from_rows(&[vec![1.5, f32::NAN]], unit_extent()).unwrap();
        let json = serde_json::to_string(&g).unwrap();
        assert!(json.starts_with("{\"data\":[1.5,null]"), "got {json}");

        let back: Grid = serde_json::from_str(&json).unwrap();
        assert_eq!(back.data[0], 1.5);
        assert!(back.data[1].is_nan());
    }

    #[test]
    fn decoding_rejects_wrong_sample_count() {
        let json = r#"{"data": [1.0], "width": 2, "height": 2,
            "extent": {"min_lon": 112.0, "max_lon": 129.0, "min_lat": -35.5, "max_lat": -13.5}}"#;
        let err = serde_json::from_str::<Grid>(json).unwrap_err();
        assert!(err.to_string().contains("expected 4"), "got {err}");
    }

    #[test]
    fn aligned_requires_matching_extent() {
        let a = Grid::filled(2, 2, unit_extent(), 0.0);
        let b = Grid::filled(2, 2, Extent::new(0.0, 8.0, 0.0, 4.0), 0.0);
        assert!(a.same_shape(&b));
        assert!(!a.aligned_with(&b));
        assert!(a.aligned_with(&a.clone()));
    }
}
