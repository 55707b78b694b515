use geo::AffineTransform;
use ndarray::Array2;
use std::path::Path;

use crate::{
    components::{ArrayBox, DataType, Raster, RasterSource},
    errors::{DeltasatError, Result},
};

/// Implementations for gdal
pub mod gdal_backend {
    use super::*;
    use crate::components::metadata::{affine_from_gdal, affine_to_gdal};
    use gdal::{
        raster::Buffer, spatial_ref::SpatialRef, Dataset as GdalDataset, DriverManager,
        Metadata as GdalMetadata,
    };
    use log::info;
    use ndarray::Axis;
    use std::path::PathBuf;

    #[derive(Debug)]
    pub struct GdalFile {
        path: PathBuf,
        dataset: GdalDataset,
    }

    impl GdalFile {
        pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
            Ok(GdalFile {
                path: path.as_ref().to_path_buf(),
                dataset: GdalDataset::open(&path)?,
            })
        }

        pub fn path(&self) -> &Path {
            &self.path
        }
    }

    impl RasterSource for GdalFile {
        fn description(&self) -> Result<String> {
            Ok(GdalMetadata::description(&self.dataset)?)
        }
        fn shape(&self) -> (usize, usize) {
            let (cols, rows) = self.dataset.raster_size();
            (rows, cols)
        }
        /// `AUTHORITY:CODE` when known, WKT otherwise.
        fn crs(&self) -> Result<String> {
            let authority = self.dataset.spatial_ref().and_then(|srs| {
                Ok(format!("{}:{}", srs.auth_name().ok_or_else(|| gdal::errors::GdalError::BadArgument("no authority name".into()))?, srs.auth_code()?))
            });
            Ok(authority.unwrap_or_else(|_| self.dataset.projection()))
        }
        fn transform(&self) -> Result<AffineTransform> {
            Ok(affine_from_gdal(self.dataset.geo_transform()?))
        }
        fn num_bands(&self) -> usize {
            self.dataset.raster_count()
        }
        fn nodata(&self) -> Option<f64> {
            self.dataset
                .rasterband(1)
                .ok()
                .and_then(|band| band.no_data_value())
        }
        fn band_description(&self, index: usize) -> Result<String> {
            Ok(self.dataset.rasterband(index + 1)?.description()?)
        }
        fn read_window<T: DataType>(&self, index: usize, window: &ArrayBox) -> Result<Array2<T>> {
            window.validate()?;
            let rasterband = self.dataset.rasterband(index + 1)?;
            let size = (window.width(), window.height());
            let buffer = rasterband.read_as::<T>(
                (window.min_col as isize, window.min_row as isize),
                size,
                size,
                None,
            )?;
            let (_, data) = buffer.into_shape_and_vec();
            Array2::from_shape_vec((window.height(), window.width()), data)
                .map_err(DeltasatError::NdarrayError)
        }
    }

    /// Writes `raster` as a GeoTIFF, one band at a time with its label as description.
    pub fn write_geotiff<T: DataType, P: AsRef<Path>>(raster: &Raster<T>, path: P) -> Result<()> {
        let driver = DriverManager::get_driver_by_name("GTiff")?;
        let meta = raster.meta();
        let (rows, cols) = raster.shape();
        let mut dataset =
            driver.create_with_band_type::<T, _>(path.as_ref(), cols, rows, raster.num_bands())?;
        dataset.set_geo_transform(&affine_to_gdal(&meta.transform))?;
        if !meta.crs.is_empty() {
            dataset.set_spatial_ref(&SpatialRef::from_definition(&meta.crs)?)?;
        }
        for (idx, (plane, name)) in raster
            .pixels()
            .axis_iter(Axis(2))
            .zip(raster.band_names())
            .enumerate()
        {
            let mut band = dataset.rasterband(idx + 1)?;
            let mut buffer = Buffer::new((cols, rows), plane.iter().copied().collect());
            band.write((0, 0), (cols, rows), &mut buffer)?;
            band.set_description(name)?;
            if let Some(nodata) = meta.nodata {
                band.set_no_data_value(Some(nodata))?;
            }
        }
        info!(
            "wrote {} band(s) of {} to {:?}",
            raster.num_bands(),
            meta.dtype,
            path.as_ref()
        );
        Ok(())
    }
}

/// In memory raster source, for rasters that never touched a file.
pub mod memory_backend {
    use super::*;
    use crate::components::SpatialMeta;
    use ndarray::{Array3, Axis};
    use num::traits::AsPrimitive;

    #[derive(Debug, Clone)]
    pub struct MemorySource {
        description: String,
        pixels: Array3<f64>,
        meta: SpatialMeta,
        band_names: Vec<String>,
    }

    impl MemorySource {
        /// `pixels` is (row, col, band).
        pub fn new(
            description: impl Into<String>,
            pixels: Array3<f64>,
            meta: SpatialMeta,
            band_names: Vec<String>,
        ) -> Result<Self> {
            let num_bands = pixels.dim().2;
            if band_names.len() != num_bands {
                return Err(DeltasatError::BandMismatch {
                    expected: num_bands,
                    found: band_names.len(),
                });
            }
            Ok(Self {
                description: description.into(),
                pixels,
                meta,
                band_names,
            })
        }

        pub fn from_raster<T: DataType>(description: impl Into<String>, raster: &Raster<T>) -> Self {
            Self {
                description: description.into(),
                pixels: raster.pixels().mapv(|value| value.as_()),
                meta: raster.meta().clone(),
                band_names: raster.band_names().to_vec(),
            }
        }
    }

    impl RasterSource for MemorySource {
        fn description(&self) -> Result<String> {
            Ok(self.description.clone())
        }
        fn shape(&self) -> (usize, usize) {
            let (rows, cols, _) = self.pixels.dim();
            (rows, cols)
        }
        fn crs(&self) -> Result<String> {
            Ok(self.meta.crs.clone())
        }
        fn transform(&self) -> Result<AffineTransform> {
            Ok(self.meta.transform)
        }
        fn num_bands(&self) -> usize {
            self.band_names.len()
        }
        fn nodata(&self) -> Option<f64> {
            self.meta.nodata
        }
        fn band_description(&self, index: usize) -> Result<String> {
            self.band_names
                .get(index)
                .cloned()
                .ok_or(DeltasatError::BandMismatch {
                    expected: index + 1,
                    found: self.band_names.len(),
                })
        }
        fn read_window<T: DataType>(&self, index: usize, window: &ArrayBox) -> Result<Array2<T>> {
            if index >= self.num_bands() {
                return Err(DeltasatError::BandMismatch {
                    expected: index + 1,
                    found: self.num_bands(),
                });
            }
            let plane = self.pixels.index_axis(Axis(2), index);
            Ok(window.slice_array(plane)?.mapv(T::saturate_from))
        }
    }
}
