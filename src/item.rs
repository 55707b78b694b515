use geo::Polygon;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, fmt::Debug, path::Path};

use crate::{
    components::{backends::gdal_backend::GdalFile, Raster, RasterSource},
    crs_geo::CrsGeometry,
    errors::{DeltasatError, Result},
    indices::{compute_cloud_mask, usable_percentage, BandSet, SpectralIndices},
    sensors::{Sentinel2Band, REQUIRED_BANDS},
};

/// One acquisition of a catalog, with an asset per band.
pub trait CatalogItem: Debug + Send + Sync {
    type Source: RasterSource;

    fn id(&self) -> &str;
    /// Acquisition date, `YYYY-MM-DD`.
    fn acquired(&self) -> &str;
    /// Cloud cover percentage reported by the provider.
    fn cloud_cover(&self) -> Option<f64>;
    fn asset_href(&self, band: Sentinel2Band) -> Option<&str>;
    fn open_asset(&self, band: Sentinel2Band) -> Result<Self::Source>;
}

/// Item whose assets are paths or GDAL connection strings.
///
/// Deserializes from a trimmed down STAC item:
/// `{"id": .., "datetime": .., "cloud_cover": .., "assets": {"B04": "..."}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalItem {
    pub id: String,
    pub datetime: String,
    #[serde(default)]
    pub cloud_cover: Option<f64>,
    pub assets: HashMap<Sentinel2Band, String>,
}

impl LocalItem {
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from_json_str(&std::fs::read_to_string(path)?)
    }
}

impl CatalogItem for LocalItem {
    type Source = GdalFile;

    fn id(&self) -> &str {
        &self.id
    }

    fn acquired(&self) -> &str {
        self.datetime.get(..10).unwrap_or(&self.datetime)
    }

    fn cloud_cover(&self) -> Option<f64> {
        self.cloud_cover
    }

    fn asset_href(&self, band: Sentinel2Band) -> Option<&str> {
        self.assets.get(&band).map(String::as_str)
    }

    fn open_asset(&self, band: Sentinel2Band) -> Result<GdalFile> {
        let href = self
            .asset_href(band)
            .ok_or_else(|| DeltasatError::MissingAsset {
                item: self.id.clone(),
                band,
            })?;
        GdalFile::open(href)
    }
}

/// Loads the assets of an item clipped to an area of interest.
#[derive(Debug)]
pub struct ItemProcessor<'a, I: CatalogItem> {
    item: &'a I,
    aoi: &'a CrsGeometry<Polygon>,
}

impl<'a, I: CatalogItem> ItemProcessor<'a, I> {
    pub fn new(item: &'a I, aoi: &'a CrsGeometry<Polygon>) -> Self {
        Self { item, aoi }
    }

    pub fn item(&self) -> &I {
        self.item
    }

    /// Single band of `band`, labeled with its asset name.
    pub fn load_band(&self, band: Sentinel2Band) -> Result<Raster<u16>> {
        let source = self.item.open_asset(band)?;
        let raster = Raster::<u16>::load_clipped(&source, self.aoi)?;
        debug!("{} {}: {:?}", self.item.id(), band, raster);
        raster.with_band_names(vec![band.asset_name().to_string()])
    }

    /// Every band needed for the index bundle, at native resolution.
    pub fn load_bands(&self) -> Result<BandSet<u16>> {
        let bands = REQUIRED_BANDS
            .iter()
            .map(|&band| Ok((band, self.load_band(band)?)))
            .collect::<Result<BandSet<u16>>>()?;
        info!("loaded {} band(s) of {}", bands.len(), self.item.id());
        Ok(bands)
    }

    pub fn load_and_compute(&self) -> Result<SpectralIndices<u16>> {
        self.load_bands()?.compute_indices()
    }

    /// Clear pixel percentage from the classification layer alone,
    /// at its native resolution.
    pub fn usable_pixel_percentage(&self) -> Result<f64> {
        let scl = self.load_band(Sentinel2Band::SceneClassification)?;
        Ok(usable_percentage(&compute_cloud_mask(&scl)?))
    }
}
