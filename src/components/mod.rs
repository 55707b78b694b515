pub mod backends;
pub mod bounds;
pub mod file;
pub mod metadata;
pub mod raster;

pub use bounds::ArrayBox;
pub use file::RasterSource;
pub use metadata::{MetaOverrides, PixelType, SpatialMeta};
pub use raster::Raster;

use gdal::raster::GdalType;
use num_traits::{AsPrimitive, Num, NumCast};
use std::fmt::Debug;

/// Element type of a [Raster] buffer.
pub trait DataType:
    Num + NumCast + AsPrimitive<f64> + PartialOrd + Copy + Send + Sync + Debug + GdalType + 'static
{
    const PIXEL_TYPE: PixelType;

    /// Integer types round to nearest and saturate, float types cast.
    fn saturate_from(value: f64) -> Self;
}

macro_rules! impl_integer_data_type {
    ($($t:ty => $pixel:ident),*) => {
        $(impl DataType for $t {
            const PIXEL_TYPE: PixelType = PixelType::$pixel;
            fn saturate_from(value: f64) -> Self {
                value.round() as $t
            }
        })*
    };
}

macro_rules! impl_float_data_type {
    ($($t:ty => $pixel:ident),*) => {
        $(impl DataType for $t {
            const PIXEL_TYPE: PixelType = PixelType::$pixel;
            fn saturate_from(value: f64) -> Self {
                value as $t
            }
        })*
    };
}

impl_integer_data_type!(u8 => UInt8, u16 => UInt16, i16 => Int16, u32 => UInt32, i32 => Int32);
impl_float_data_type!(f32 => Float32, f64 => Float64);

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(0.49, 0)]
    #[case(0.5, 1)]
    #[case(300.0, 255)]
    #[case(-4.0, 0)]
    #[case(f64::NAN, 0)]
    fn integer_conversion_rounds_and_saturates(#[case] value: f64, #[case] expected: u8) {
        assert_eq!(u8::saturate_from(value), expected);
    }

    #[rstest]
    fn float_conversion_keeps_non_finite() {
        assert!(f32::saturate_from(f64::NAN).is_nan());
        assert_eq!(f64::saturate_from(f64::INFINITY), f64::INFINITY);
        assert_eq!(i16::PIXEL_TYPE, PixelType::Int16);
    }
}
