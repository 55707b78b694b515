use geo::AffineTransform;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PixelType {
    UInt8,
    UInt16,
    Int16,
    UInt32,
    Int32,
    Float32,
    Float64,
}

impl PixelType {
    pub fn name(&self) -> &'static str {
        match self {
            Self::UInt8 => "uint8",
            Self::UInt16 => "uint16",
            Self::Int16 => "int16",
            Self::UInt32 => "uint32",
            Self::Int32 => "int32",
            Self::Float32 => "float32",
            Self::Float64 => "float64",
        }
    }
}

impl fmt::Display for PixelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Affine transform from a GDAL geotransform array.
pub fn affine_from_gdal(gdal_transform: [f64; 6]) -> AffineTransform {
    AffineTransform::new(
        gdal_transform[1],
        gdal_transform[2],
        gdal_transform[0],
        gdal_transform[4],
        gdal_transform[5],
        gdal_transform[3],
    )
}

pub fn affine_to_gdal(transform: &AffineTransform) -> [f64; 6] {
    [
        transform.xoff(),
        transform.a(),
        transform.b(),
        transform.yoff(),
        transform.d(),
        transform.e(),
    ]
}

/// Spatial metadata of a [crate::Raster].
///
/// `transform` maps pixel `(col, row)` to world `(x, y)` in `crs`.
/// Values are never mutated in place, derive new ones through
/// [SpatialMeta::with_overrides].
#[derive(Debug, Clone, PartialEq)]
pub struct SpatialMeta {
    pub crs: String,
    pub transform: AffineTransform,
    pub dtype: PixelType,
    pub nodata: Option<f64>,
    pub width: usize,
    pub height: usize,
    pub count: usize,
}

impl SpatialMeta {
    pub fn new(crs: impl Into<String>, transform: AffineTransform) -> Self {
        Self {
            crs: crs.into(),
            transform,
            dtype: PixelType::Float64,
            nodata: None,
            width: 0,
            height: 0,
            count: 0,
        }
    }

    pub fn with_overrides(&self, overrides: MetaOverrides) -> Self {
        let MetaOverrides {
            crs,
            transform,
            dtype,
            nodata,
            width,
            height,
            count,
        } = overrides;
        Self {
            crs: crs.unwrap_or_else(|| self.crs.clone()),
            transform: transform.unwrap_or(self.transform),
            dtype: dtype.unwrap_or(self.dtype),
            nodata: nodata.unwrap_or(self.nodata),
            width: width.unwrap_or(self.width),
            height: height.unwrap_or(self.height),
            count: count.unwrap_or(self.count),
        }
    }

    /// Pixel size along x and y (absolute).
    pub fn resolution(&self) -> (f64, f64) {
        (self.transform.a().abs(), self.transform.e().abs())
    }
}

/// Optional replacements for [SpatialMeta] fields.
#[derive(Debug, Clone, Default)]
pub struct MetaOverrides {
    crs: Option<String>,
    transform: Option<AffineTransform>,
    dtype: Option<PixelType>,
    nodata: Option<Option<f64>>,
    width: Option<usize>,
    height: Option<usize>,
    count: Option<usize>,
}

impl MetaOverrides {
    pub fn crs(mut self, crs: impl Into<String>) -> Self {
        self.crs = Some(crs.into());
        self
    }

    pub fn transform(mut self, transform: AffineTransform) -> Self {
        self.transform = Some(transform);
        self
    }

    pub fn dtype(mut self, dtype: PixelType) -> Self {
        self.dtype = Some(dtype);
        self
    }

    pub fn nodata(mut self, nodata: Option<f64>) -> Self {
        self.nodata = Some(nodata);
        self
    }

    /// (rows, cols)
    pub fn shape(mut self, shape: (usize, usize)) -> Self {
        self.height = Some(shape.0);
        self.width = Some(shape.1);
        self
    }

    pub fn count(mut self, count: usize) -> Self {
        self.count = Some(count);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn gdal_transform_round_trip() {
        let gdal = [300000.0, 10.0, 0.0, 5200020.0, 0.0, -10.0];
        let transform = affine_from_gdal(gdal);
        assert_eq!(transform.a(), 10.0);
        assert_eq!(transform.e(), -10.0);
        assert_eq!(transform.xoff(), 300000.0);
        assert_eq!(affine_to_gdal(&transform), gdal);
    }

    #[rstest]
    fn overrides_leave_source_untouched() {
        let meta = SpatialMeta::new("EPSG:32633", AffineTransform::new(10., 0., 0., 0., -10., 0.));
        let derived = meta.with_overrides(
            MetaOverrides::default()
                .dtype(PixelType::UInt8)
                .nodata(Some(0.))
                .shape((4, 5)),
        );
        assert_eq!(meta.dtype, PixelType::Float64);
        assert_eq!(meta.nodata, None);
        assert_eq!(derived.dtype, PixelType::UInt8);
        assert_eq!(derived.nodata, Some(0.));
        assert_eq!((derived.height, derived.width), (4, 5));
        assert_eq!(derived.crs, meta.crs);
        assert_eq!(derived.resolution(), (10., 10.));
    }
}
