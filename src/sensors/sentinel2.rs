use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// Scene Classification Layer codes treated as unusable:
/// no data, cloud shadow, cloud medium and high probability.
pub const SCL_CLOUD_CODES: [u8; 4] = [0, 3, 8, 9];

/// Assets fetched per item to build the index bundle.
pub const REQUIRED_BANDS: [Sentinel2Band; 6] = [
    Sentinel2Band::Blue,
    Sentinel2Band::Green,
    Sentinel2Band::Red,
    Sentinel2Band::Nir,
    Sentinel2Band::Swir1,
    Sentinel2Band::SceneClassification,
];

/// Sentinel-2 L2A bands, keyed by their asset name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Sentinel2Band {
    Blue,
    Green,
    Red,
    Nir,
    RedEdge1,
    RedEdge2,
    RedEdge3,
    Swir1,
    Swir2,
    Coastal,
    WaterVapor,
    Cirrus,
    SceneClassification,
}

impl Sentinel2Band {
    pub const ALL: [Sentinel2Band; 13] = [
        Self::Blue,
        Self::Green,
        Self::Red,
        Self::Nir,
        Self::RedEdge1,
        Self::RedEdge2,
        Self::RedEdge3,
        Self::Swir1,
        Self::Swir2,
        Self::Coastal,
        Self::WaterVapor,
        Self::Cirrus,
        Self::SceneClassification,
    ];

    pub fn asset_name(&self) -> &'static str {
        match self {
            Self::Blue => "B02",
            Self::Green => "B03",
            Self::Red => "B04",
            Self::Nir => "B08",
            Self::RedEdge1 => "B05",
            Self::RedEdge2 => "B06",
            Self::RedEdge3 => "B07",
            Self::Swir1 => "B11",
            Self::Swir2 => "B12",
            Self::Coastal => "B01",
            Self::WaterVapor => "B09",
            Self::Cirrus => "B10",
            Self::SceneClassification => "SCL",
        }
    }

    /// Ground sampling distance in meters.
    pub fn native_resolution_m(&self) -> u32 {
        match self {
            Self::Blue | Self::Green | Self::Red | Self::Nir => 10,
            Self::RedEdge1
            | Self::RedEdge2
            | Self::RedEdge3
            | Self::Swir1
            | Self::Swir2
            | Self::SceneClassification => 20,
            Self::Coastal | Self::WaterVapor | Self::Cirrus => 60,
        }
    }
}

impl fmt::Display for Sentinel2Band {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.asset_name())
    }
}

impl FromStr for Sentinel2Band {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|band| band.asset_name().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown Sentinel-2 asset {s}"))
    }
}

impl TryFrom<String> for Sentinel2Band {
    type Error = String;
    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Sentinel2Band> for String {
    fn from(value: Sentinel2Band) -> Self {
        value.asset_name().to_string()
    }
}
