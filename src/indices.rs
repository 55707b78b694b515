use log::{debug, info};
use ndarray::{stack, Axis, Zip};
use num::traits::AsPrimitive;
use std::collections::HashMap;

use crate::{
    components::{DataType, MetaOverrides, Raster},
    errors::{DeltasatError, Result},
    sensors::{Sentinel2Band, SCL_CLOUD_CODES},
};

/// Soil brightness correction factor of SAVI.
pub const SAVI_L: f64 = 0.5;

/// Bands of one acquisition at their native resolution.
///
/// This is the loaded state of an item, indices are derived from it with
/// [BandSet::compute_indices] or, for screening, [BandSet::rgb_composite].
#[derive(Debug, Clone)]
pub struct BandSet<T: DataType> {
    bands: HashMap<Sentinel2Band, Raster<T>>,
}

impl<T: DataType> Default for BandSet<T> {
    fn default() -> Self {
        Self {
            bands: HashMap::new(),
        }
    }
}

impl<T: DataType> FromIterator<(Sentinel2Band, Raster<T>)> for BandSet<T> {
    fn from_iter<I: IntoIterator<Item = (Sentinel2Band, Raster<T>)>>(iter: I) -> Self {
        Self {
            bands: iter.into_iter().collect(),
        }
    }
}

impl<T: DataType> BandSet<T> {
    pub fn new(bands: HashMap<Sentinel2Band, Raster<T>>) -> Self {
        Self { bands }
    }

    /// Returns the raster previously stored for `band`, if any.
    pub fn insert(&mut self, band: Sentinel2Band, raster: Raster<T>) -> Option<Raster<T>> {
        self.bands.insert(band, raster)
    }

    pub fn band(&self, band: Sentinel2Band) -> Result<&Raster<T>> {
        self.bands.get(&band).ok_or(DeltasatError::MissingBand(band))
    }

    pub fn contains(&self, band: Sentinel2Band) -> bool {
        self.bands.contains_key(&band)
    }

    pub fn len(&self) -> usize {
        self.bands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bands.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Sentinel2Band, &Raster<T>)> {
        self.bands.iter()
    }

    /// True colour composite only, no index is computed.
    pub fn rgb_composite(&self) -> Result<RgbComposite<T>> {
        Ok(RgbComposite {
            rgb_image: compute_rgb_image(
                self.band(Sentinel2Band::Red)?,
                self.band(Sentinel2Band::Green)?,
                self.band(Sentinel2Band::Blue)?,
            )?,
        })
    }

    /// Derives the full index bundle. Every member shares the grid of the red band.
    pub fn compute_indices(self) -> Result<SpectralIndices<T>> {
        let red = self.band(Sentinel2Band::Red)?;
        let nir = self.band(Sentinel2Band::Nir)?;
        let blue = self.band(Sentinel2Band::Blue)?;
        let swir = self.band(Sentinel2Band::Swir1)?;
        let scl = self.band(Sentinel2Band::SceneClassification)?;

        let rgb_image = self.rgb_composite()?.rgb_image;
        let cloud_mask_native = compute_cloud_mask(scl)?;
        let cloud_mask = cloud_mask_on_grid(&cloud_mask_native, red)?;
        let ndvi = compute_ndvi(nir, red)?;
        let savi = compute_savi(nir, red)?;
        let bsi = compute_bsi(nir, red, blue, swir)?;
        let ndmi = compute_ndmi(nir, swir)?;
        info!(
            "computed spectral indices on a {:?} grid",
            rgb_image.shape()
        );

        Ok(SpectralIndices {
            rgb_image,
            cloud_mask_native,
            cloud_mask,
            ndvi,
            savi,
            bsi,
            ndmi,
            bands: self,
        })
    }
}

/// Red, Green, Blue stack of an acquisition.
#[derive(Debug, Clone)]
pub struct RgbComposite<T: DataType> {
    pub rgb_image: Raster<T>,
}

/// Derived rasters of one acquisition.
#[derive(Debug, Clone)]
pub struct SpectralIndices<T: DataType> {
    pub bands: BandSet<T>,
    pub rgb_image: Raster<T>,
    /// Cloud mask at the resolution of the classification layer.
    pub cloud_mask_native: Raster<u8>,
    /// Cloud mask on the 10 m grid.
    pub cloud_mask: Raster<u8>,
    pub ndvi: Raster<f64>,
    pub savi: Raster<f64>,
    pub bsi: Raster<f64>,
    pub ndmi: Raster<f64>,
}

impl<T: DataType> SpectralIndices<T> {
    /// Percentage of pixels of the 10 m cloud mask that are clear.
    pub fn usable_pct(&self) -> f64 {
        usable_percentage(&self.cloud_mask)
    }
}

/// Percentage of zero (clear) pixels in a cloud mask, 0 for an empty mask.
pub fn usable_percentage(mask: &Raster<u8>) -> f64 {
    let total = mask.pixels().len();
    if total == 0 {
        return 0.;
    }
    let usable = mask.pixels().iter().filter(|&&value| value == 0).count();
    usable as f64 / total as f64 * 100.
}

fn check_grid<T: DataType, U: DataType>(lhs: &Raster<T>, rhs: &Raster<U>) -> Result<()> {
    if lhs.shape() != rhs.shape() {
        return Err(DeltasatError::GridMismatch {
            left: lhs.shape(),
            right: rhs.shape(),
        });
    }
    Ok(())
}

/// Per pixel index kernels read band 0 only, so anything else is rejected.
pub(crate) fn check_single_band<T: DataType>(raster: &Raster<T>) -> Result<()> {
    if raster.num_bands() != 1 {
        return Err(DeltasatError::BandMismatch {
            expected: 1,
            found: raster.num_bands(),
        });
    }
    Ok(())
}

pub fn compute_rgb_image<T: DataType>(
    red: &Raster<T>,
    green: &Raster<T>,
    blue: &Raster<T>,
) -> Result<Raster<T>> {
    for band in [red, green, blue] {
        check_single_band(band)?;
    }
    check_grid(red, green)?;
    check_grid(red, blue)?;
    let pixels = stack(Axis(2), &[red.band(0), green.band(0), blue.band(0)])?;
    Raster::new(
        pixels,
        red.meta().clone(),
        vec!["Red".into(), "Green".into(), "Blue".into()],
    )
}

/// 1 where the classification code flags cloud, shadow or missing data.
pub fn compute_cloud_mask<T: DataType>(scl: &Raster<T>) -> Result<Raster<u8>> {
    check_single_band(scl)?;
    let mask = scl.band(0).mapv(|code| {
        let code: f64 = code.as_();
        SCL_CLOUD_CODES.iter().any(|&cloud| f64::from(cloud) == code) as u8
    });
    Ok(Raster::from_band(
        mask,
        scl.meta().with_overrides(MetaOverrides::default().nodata(None)),
        "CloudMask (SCL)",
    ))
}

/// Moves a native resolution cloud mask onto the grid of `reference`,
/// thresholding interpolated values back to {0, 1}.
pub fn cloud_mask_on_grid<U: DataType>(mask: &Raster<u8>, reference: &Raster<U>) -> Result<Raster<u8>> {
    let mut upsampled = mask.resample_like(Some(reference))?;
    upsampled.binarize();
    Ok(upsampled)
}

/// `(a - b) / (a + b)` in 64 bit floats through band algebra.
fn normalized_difference<T: DataType>(
    a: &Raster<T>,
    b: &Raster<T>,
    band_name: &str,
) -> Result<Raster<f64>> {
    let numerator = Raster::subtract_as::<f64>(a, b, None)?;
    let divisor = Raster::add_as::<f64>(a, b, None)?;
    Raster::divide(&numerator, &divisor, Some(vec![band_name.to_string()]))
}

pub fn compute_ndvi<T: DataType>(nir: &Raster<T>, red: &Raster<T>) -> Result<Raster<f64>> {
    normalized_difference(nir, red, "NDVI")
}

/// `(nir - red) * (1 + L) / (nir + red + L)`
pub fn compute_savi<T: DataType>(nir: &Raster<T>, red: &Raster<T>) -> Result<Raster<f64>> {
    check_single_band(nir)?;
    check_single_band(red)?;
    check_grid(nir, red)?;
    let savi = Zip::from(nir.band(0))
        .and(red.band(0))
        .par_map_collect(|&nir, &red| {
            let (nir, red): (f64, f64) = (nir.as_(), red.as_());
            (nir - red) * (1. + SAVI_L) / (nir + red + SAVI_L)
        });
    Ok(Raster::from_band(savi, nir.meta().clone(), "SAVI"))
}

/// SWIR1 is resampled to the NIR grid first.
pub fn compute_bsi<T: DataType>(
    nir: &Raster<T>,
    red: &Raster<T>,
    blue: &Raster<T>,
    swir: &Raster<T>,
) -> Result<Raster<f64>> {
    check_grid(nir, red)?;
    check_grid(nir, blue)?;
    let swir = swir.resample_like(Some(nir))?;
    debug!("swir aligned to nir grid {:?}", nir.shape());
    let soil = Raster::add_as::<f64>(&swir, red, None)?;
    let vegetation = Raster::add_as::<f64>(nir, blue, None)?;
    normalized_difference(&soil, &vegetation, "Bare Soil Index")
}

/// SWIR1 is resampled to the NIR grid first.
pub fn compute_ndmi<T: DataType>(nir: &Raster<T>, swir: &Raster<T>) -> Result<Raster<f64>> {
    let swir = swir.resample_like(Some(nir))?;
    normalized_difference(nir, &swir, "NDMI")
}
