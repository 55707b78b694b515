use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::{
    change::SpectralIndexKind,
    errors::{DeltasatError, Result},
};

/// Tunables of the screening and change extraction steps.
///
/// Every section and field is optional in JSON, missing values take their defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub screening: ScreeningConfig,
    pub regions: RegionParams,
    pub thresholds: ChangeThresholds,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScreeningConfig {
    /// Items whose clear pixel percentage is below this are rejected.
    pub min_usable_pct: f64,
    /// Worker threads of the batch pool, rayon's default when unset.
    pub num_workers: Option<usize>,
}

impl Default for ScreeningConfig {
    fn default() -> Self {
        Self {
            min_usable_pct: 85.,
            num_workers: None,
        }
    }
}

/// Parameters of region extraction from a binary change mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegionParams {
    /// Margin added around each change, the dilation element side is `2 * buffer_px + 1`.
    pub buffer_px: usize,
    /// Run a 3x3 opening before dilation.
    pub denoise: bool,
    /// Regions with fewer pixels are dropped.
    pub min_region_px: usize,
}

impl Default for RegionParams {
    fn default() -> Self {
        Self {
            buffer_px: 2,
            denoise: false,
            min_region_px: 2,
        }
    }
}

/// Absolute index delta from which a pixel counts as changed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChangeThresholds {
    pub ndvi: f64,
    pub savi: f64,
    pub bsi: f64,
    pub ndmi: f64,
}

impl Default for ChangeThresholds {
    fn default() -> Self {
        Self {
            ndvi: 0.2,
            savi: 0.2,
            bsi: 0.1,
            ndmi: 0.2,
        }
    }
}

impl ChangeThresholds {
    pub fn get(&self, kind: SpectralIndexKind) -> f64 {
        match kind {
            SpectralIndexKind::Ndvi => self.ndvi,
            SpectralIndexKind::Savi => self.savi,
            SpectralIndexKind::Bsi => self.bsi,
            SpectralIndexKind::Ndmi => self.ndmi,
        }
    }
}

impl PipelineConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from_json_str(&std::fs::read_to_string(path)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<()> {
        let pct = self.screening.min_usable_pct;
        if !(0. ..=100.).contains(&pct) {
            return Err(DeltasatError::Config(format!(
                "min_usable_pct must be within [0, 100], got {pct}"
            )));
        }
        if self.screening.num_workers == Some(0) {
            return Err(DeltasatError::Config(
                "num_workers must be at least 1".to_string(),
            ));
        }
        for kind in SpectralIndexKind::ALL {
            let threshold = self.thresholds.get(kind);
            if !threshold.is_finite() || threshold < 0. {
                return Err(DeltasatError::Config(format!(
                    "{kind} threshold must be finite and non negative, got {threshold}"
                )));
            }
        }
        Ok(())
    }
}
