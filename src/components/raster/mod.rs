mod algebra;
mod resample;

use geo::Polygon;
use log::{debug, info};
use ndarray::{stack, Array2, Array3, ArrayD, ArrayView2, Axis, Ix3, Zip};
use std::{fmt::Debug, path::Path};

use crate::{
    components::{
        backends::gdal_backend::{write_geotiff, GdalFile},
        bounds::ClipWindow,
        DataType, MetaOverrides, RasterSource, SpatialMeta,
    },
    crs_geo::CrsGeometry,
    errors::{DeltasatError, Result},
};

/// Georeferenced multi band grid.
///
/// Pixels are laid out as (row, col, band) and every band carries a label.
/// Geometric transforms and band algebra return fresh rasters,
/// the only in place operation is [Raster::binarize].
#[derive(Clone)]
pub struct Raster<T: DataType> {
    pixels: Array3<T>,
    meta: SpatialMeta,
    band_names: Vec<String>,
}

impl<T: DataType> Debug for Raster<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let f = &mut f.debug_struct("Raster");
        f.field("shape", &self.pixels.dim())
            .field("crs", &self.meta.crs)
            .field("dtype", &self.meta.dtype)
            .field("resolution", &self.meta.resolution())
            .field("bands", &self.band_names)
            .finish()
    }
}

impl<T: DataType> Raster<T> {
    fn init(pixels: Array3<T>, meta: SpatialMeta, band_names: Vec<String>) -> Self {
        let (rows, cols, count) = pixels.dim();
        let meta = meta.with_overrides(
            MetaOverrides::default()
                .dtype(T::PIXEL_TYPE)
                .shape((rows, cols))
                .count(count),
        );
        let raster = Self {
            pixels,
            meta,
            band_names,
        };
        debug!("new {raster:?}");
        raster
    }

    /// Fails when the number of labels differs from the band axis length.
    pub fn new(pixels: Array3<T>, meta: SpatialMeta, band_names: Vec<String>) -> Result<Self> {
        let num_bands = pixels.dim().2;
        if band_names.len() != num_bands {
            return Err(DeltasatError::BandMismatch {
                expected: num_bands,
                found: band_names.len(),
            });
        }
        Ok(Self::init(pixels, meta, band_names))
    }

    /// Labels bands "Band 1", "Band 2", ...
    pub fn unlabeled(pixels: Array3<T>, meta: SpatialMeta) -> Self {
        let band_names = (1..=pixels.dim().2)
            .map(|idx| format!("Band {idx}"))
            .collect();
        Self::init(pixels, meta, band_names)
    }

    pub fn from_band(band: Array2<T>, meta: SpatialMeta, band_name: impl Into<String>) -> Self {
        Self::init(band.insert_axis(Axis(2)), meta, vec![band_name.into()])
    }

    /// A 2 dimensional buffer is a single band.
    pub fn from_dyn(pixels: ArrayD<T>, meta: SpatialMeta, band_names: Vec<String>) -> Result<Self> {
        let pixels = match pixels.ndim() {
            2 => pixels.insert_axis(Axis(2)).into_dimensionality::<Ix3>()?,
            3 => pixels.into_dimensionality::<Ix3>()?,
            ndim => return Err(DeltasatError::Shape(ndim)),
        };
        Self::new(pixels, meta, band_names)
    }

    /// Opens `path` with GDAL and reads every band.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let raster = Self::from_source(&GdalFile::open(&path)?)?;
        info!("loaded {:?} from {:?}", raster, path.as_ref());
        Ok(raster)
    }

    pub fn from_source<S: RasterSource>(source: &S) -> Result<Self> {
        let (rows, cols) = source.shape();
        let meta = Self::source_meta(source)?;
        let band_names = source.band_descriptions()?;
        let bands = (0..source.num_bands())
            .map(|idx| source.read_band::<T>(idx))
            .collect::<Result<Vec<_>>>()?;
        let pixels = Self::stack_bands(&bands, (rows, cols))?;
        Self::new(pixels, meta, band_names)
    }

    /// Reads only the window covering `clip`, pixels whose centre falls
    /// outside of it are set to nodata (0 when unset).
    pub fn load_clipped<S: RasterSource>(source: &S, clip: &CrsGeometry<Polygon>) -> Result<Self> {
        let meta = Self::source_meta(source)?;
        let geometry = clip.projected_geometry(&meta.crs)?;
        let window = ClipWindow::new(&meta, &geometry)?;
        let band_names = source.band_descriptions()?;
        let bands = (0..source.num_bands())
            .map(|idx| source.read_window::<T>(idx, &window.bounds))
            .collect::<Result<Vec<_>>>()?;
        let mut pixels =
            Self::stack_bands(&bands, (window.bounds.height(), window.bounds.width()))?;
        Self::mask_outside(&mut pixels, &window, &geometry, meta.nodata);
        Self::new(
            pixels,
            meta.with_overrides(MetaOverrides::default().transform(window.transform)),
            band_names,
        )
    }

    fn source_meta<S: RasterSource>(source: &S) -> Result<SpatialMeta> {
        if source.num_bands() == 0 {
            return Err(DeltasatError::NoBands(source.description()?));
        }
        let (rows, cols) = source.shape();
        Ok(SpatialMeta::new(source.crs()?, source.transform()?).with_overrides(
            MetaOverrides::default()
                .nodata(source.nodata())
                .shape((rows, cols)),
        ))
    }

    fn stack_bands(bands: &[Array2<T>], shape: (usize, usize)) -> Result<Array3<T>> {
        if bands.is_empty() {
            return Ok(Array3::zeros((shape.0, shape.1, 0)));
        }
        let views: Vec<ArrayView2<T>> = bands.iter().map(|band| band.view()).collect();
        Ok(stack(Axis(2), &views)?)
    }

    fn mask_outside(
        pixels: &mut Array3<T>,
        window: &ClipWindow,
        geometry: &Polygon,
        nodata: Option<f64>,
    ) {
        let fill = nodata.map(T::saturate_from).unwrap_or_else(T::zero);
        let (rows, cols, _) = pixels.dim();
        let inside = Array2::from_shape_fn((rows, cols), |(row, col)| {
            window.pixel_in(geometry, row, col)
        });
        Zip::from(pixels.lanes_mut(Axis(2)))
            .and(&inside)
            .for_each(|mut lane, &inside| {
                if !inside {
                    lane.fill(fill)
                }
            });
    }

    /// Crops to the envelope of `clip` (reprojected to the raster crs
    /// when needed) and masks pixels outside of it.
    pub fn clip(&self, clip: &CrsGeometry<Polygon>) -> Result<Self> {
        let geometry = clip.projected_geometry(&self.meta.crs)?;
        let window = ClipWindow::new(&self.meta, &geometry)?;
        let mut pixels = window
            .bounds
            .slice_array(self.pixels.view())?
            .to_owned();
        Self::mask_outside(&mut pixels, &window, &geometry, self.meta.nodata);
        Self::new(
            pixels,
            self.meta
                .with_overrides(MetaOverrides::default().transform(window.transform)),
            self.band_names.clone(),
        )
    }

    /// Values above zero become one, everything else zero.
    pub fn binarize(&mut self) {
        self.pixels
            .mapv_inplace(|value| if value > T::zero() { T::one() } else { T::zero() });
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        write_geotiff(self, path)
    }

    pub fn with_band_names(self, band_names: Vec<String>) -> Result<Self> {
        Self::new(self.pixels, self.meta, band_names)
    }

    pub fn pixels(&self) -> &Array3<T> {
        &self.pixels
    }

    pub fn band(&self, index: usize) -> ArrayView2<T> {
        self.pixels.index_axis(Axis(2), index)
    }

    pub fn meta(&self) -> &SpatialMeta {
        &self.meta
    }

    pub fn band_names(&self) -> &[String] {
        &self.band_names
    }

    pub fn num_bands(&self) -> usize {
        self.band_names.len()
    }

    /// (rows, cols)
    pub fn shape(&self) -> (usize, usize) {
        let (rows, cols, _) = self.pixels.dim();
        (rows, cols)
    }

    pub fn into_parts(self) -> (Array3<T>, SpatialMeta, Vec<String>) {
        (self.pixels, self.meta, self.band_names)
    }
}
