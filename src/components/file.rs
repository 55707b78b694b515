use geo::AffineTransform;
use ndarray::Array2;
use std::fmt::Debug;

use crate::{
    components::{ArrayBox, DataType},
    errors::Result,
};

/// Source of georeferenced raster bands.
///
/// Band indexes are 0 based.
pub trait RasterSource: Debug {
    fn description(&self) -> Result<String>;
    /// (rows, cols)
    fn shape(&self) -> (usize, usize);
    fn crs(&self) -> Result<String>;
    fn transform(&self) -> Result<AffineTransform>;
    fn num_bands(&self) -> usize;
    fn nodata(&self) -> Option<f64>;
    fn band_description(&self, index: usize) -> Result<String>;
    /// Reads `window` of band `index` as a (rows, cols) array.
    fn read_window<T: DataType>(&self, index: usize, window: &ArrayBox) -> Result<Array2<T>>;

    fn read_band<T: DataType>(&self, index: usize) -> Result<Array2<T>> {
        let (rows, cols) = self.shape();
        self.read_window(index, &ArrayBox::new(0, rows, 0, cols)?)
    }

    fn band_descriptions(&self) -> Result<Vec<String>> {
        (0..self.num_bands())
            .map(|idx| self.band_description(idx))
            .collect()
    }
}
