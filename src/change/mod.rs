mod chips;
mod regions;

pub use chips::{adjust_contrast_brightness, extract_before_after_chips, normalize_rgb, ChipPair};
pub use regions::{dilate, erode, extract_regions, label_components, opening, Component};

use log::info;
use ndarray::{Array2, Zip};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{
    components::{ArrayBox, DataType, Raster},
    config::{ChangeThresholds, PipelineConfig, RegionParams},
    errors::{DeltasatError, Result},
    indices::{check_single_band, SpectralIndices},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpectralIndexKind {
    Ndvi,
    Savi,
    Bsi,
    Ndmi,
}

impl SpectralIndexKind {
    pub const ALL: [SpectralIndexKind; 4] = [Self::Ndvi, Self::Savi, Self::Bsi, Self::Ndmi];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Ndvi => "NDVI",
            Self::Savi => "SAVI",
            Self::Bsi => "BSI",
            Self::Ndmi => "NDMI",
        }
    }
}

impl fmt::Display for SpectralIndexKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// `after - before` of every index, on the grid of the later acquisition.
#[derive(Debug, Clone)]
pub struct IndexDiffs {
    pub ndvi: Raster<f64>,
    pub savi: Raster<f64>,
    pub bsi: Raster<f64>,
    pub ndmi: Raster<f64>,
}

impl IndexDiffs {
    pub fn get(&self, kind: SpectralIndexKind) -> &Raster<f64> {
        match kind {
            SpectralIndexKind::Ndvi => &self.ndvi,
            SpectralIndexKind::Savi => &self.savi,
            SpectralIndexKind::Bsi => &self.bsi,
            SpectralIndexKind::Ndmi => &self.ndmi,
        }
    }
}

/// Index deltas between two acquisitions and the union of their cloud masks.
pub fn compute_diffs<T: DataType, U: DataType>(
    before: &SpectralIndices<T>,
    after: &SpectralIndices<U>,
) -> Result<(IndexDiffs, Raster<u8>)> {
    let delta = |kind: SpectralIndexKind, after: &Raster<f64>, before: &Raster<f64>| {
        Raster::subtract(after, before, Some(vec![format!("Delta {kind}")]))
    };
    let diffs = IndexDiffs {
        ndvi: delta(SpectralIndexKind::Ndvi, &after.ndvi, &before.ndvi)?,
        savi: delta(SpectralIndexKind::Savi, &after.savi, &before.savi)?,
        bsi: delta(SpectralIndexKind::Bsi, &after.bsi, &before.bsi)?,
        ndmi: delta(SpectralIndexKind::Ndmi, &after.ndmi, &before.ndmi)?,
    };

    let (after_cloud, before_cloud) = (&after.cloud_mask, &before.cloud_mask);
    check_single_band(after_cloud)?;
    check_single_band(before_cloud)?;
    if after_cloud.shape() != before_cloud.shape() {
        return Err(DeltasatError::GridMismatch {
            left: after_cloud.shape(),
            right: before_cloud.shape(),
        });
    }
    let combined = Zip::from(after_cloud.band(0))
        .and(before_cloud.band(0))
        .map_collect(|&a, &b| (a == 1 || b == 1) as u8);
    let combined = Raster::from_band(combined, after_cloud.meta().clone(), "Combined CloudMask");
    Ok((diffs, combined))
}

/// Pixels whose `kind` delta reaches `threshold` in absolute value, clear in
/// both acquisitions. Non finite deltas never count as change.
pub fn change_mask(
    diffs: &IndexDiffs,
    combined_cloud: &Raster<u8>,
    kind: SpectralIndexKind,
    threshold: f64,
) -> Result<Array2<bool>> {
    let delta = diffs.get(kind);
    check_single_band(delta)?;
    check_single_band(combined_cloud)?;
    if delta.shape() != combined_cloud.shape() {
        return Err(DeltasatError::GridMismatch {
            left: delta.shape(),
            right: combined_cloud.shape(),
        });
    }
    Ok(Zip::from(delta.band(0))
        .and(combined_cloud.band(0))
        .par_map_collect(|&delta, &cloud| {
            cloud == 0 && delta.is_finite() && delta.abs() >= threshold
        }))
}

/// Everything derived when comparing two acquisitions.
#[derive(Debug, Clone)]
pub struct ChangeReport {
    pub kind: SpectralIndexKind,
    pub diffs: IndexDiffs,
    pub combined_cloud_mask: Raster<u8>,
    pub change_mask: Array2<bool>,
    pub boxes: Vec<ArrayBox>,
    pub chips: Vec<ChipPair>,
}

/// Runs diffs, thresholding, region extraction and chip cutting in one go.
#[derive(Debug, Clone, Default)]
pub struct ChangeExtractor {
    params: RegionParams,
    thresholds: ChangeThresholds,
}

impl ChangeExtractor {
    pub fn new(params: RegionParams, thresholds: ChangeThresholds) -> Self {
        Self { params, thresholds }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(config.regions, config.thresholds)
    }

    pub fn params(&self) -> &RegionParams {
        &self.params
    }

    pub fn detect<T: DataType, U: DataType>(
        &self,
        before: &SpectralIndices<T>,
        after: &SpectralIndices<U>,
        kind: SpectralIndexKind,
    ) -> Result<ChangeReport> {
        let (diffs, combined_cloud_mask) = compute_diffs(before, after)?;
        let change_mask = change_mask(
            &diffs,
            &combined_cloud_mask,
            kind,
            self.thresholds.get(kind),
        )?;
        let boxes = extract_regions(change_mask.view(), &self.params);
        let chips = extract_before_after_chips(&boxes, before, after)?;
        info!(
            "{} changed region(s) on {}, {} pixel(s) above threshold",
            boxes.len(),
            kind,
            change_mask.iter().filter(|&&changed| changed).count()
        );
        Ok(ChangeReport {
            kind,
            diffs,
            combined_cloud_mask,
            change_mask,
            boxes,
            chips,
        })
    }
}
