use itertools::izip;
use ndarray::Zip;
use num::{traits::AsPrimitive, Float};

use crate::{
    components::{DataType, MetaOverrides, Raster},
    errors::{DeltasatError, Result},
};

/// Element wise band algebra between rasters with the same band count and grid.
///
/// Operands are cast to the output type before the operation. Integer outputs
/// round and saturate instead of wrapping, so `40u16 - 50` is 0 and not the
/// modular 65526. Division never guards the divisor: `x / 0` is ±inf and
/// `0 / 0` is NaN, left to the consumer to mask.
impl<T: DataType> Raster<T> {
    fn check_operands<U: DataType>(lhs: &Raster<T>, rhs: &Raster<U>) -> Result<()> {
        if lhs.num_bands() != rhs.num_bands() {
            return Err(DeltasatError::BandMismatch {
                expected: lhs.num_bands(),
                found: rhs.num_bands(),
            });
        }
        if lhs.shape() != rhs.shape() {
            return Err(DeltasatError::GridMismatch {
                left: lhs.shape(),
                right: rhs.shape(),
            });
        }
        Ok(())
    }

    fn combine<U>(
        lhs: &Self,
        rhs: &Self,
        band_names: Option<Vec<String>>,
        label: impl Fn(&str, &str) -> String,
        op: impl Fn(f64, f64) -> f64 + Sync + Send,
    ) -> Result<Raster<U>>
    where
        U: DataType,
        T: AsPrimitive<U>,
    {
        Self::check_operands(lhs, rhs)?;
        let pixels = Zip::from(&lhs.pixels).and(&rhs.pixels).par_map_collect(|&l, &r| {
            let (l, r): (U, U) = (l.as_(), r.as_());
            U::saturate_from(op(l.as_(), r.as_()))
        });
        let band_names = band_names.unwrap_or_else(|| {
            izip!(lhs.band_names(), rhs.band_names())
                .map(|(l, r)| label(l, r))
                .collect()
        });
        let meta = lhs
            .meta
            .with_overrides(MetaOverrides::default().dtype(U::PIXEL_TYPE));
        Raster::new(pixels, meta, band_names)
    }

    pub fn add(lhs: &Self, rhs: &Self, band_names: Option<Vec<String>>) -> Result<Self>
    where
        T: AsPrimitive<T>,
    {
        Self::add_as::<T>(lhs, rhs, band_names)
    }

    pub fn add_as<U>(lhs: &Self, rhs: &Self, band_names: Option<Vec<String>>) -> Result<Raster<U>>
    where
        U: DataType,
        T: AsPrimitive<U>,
    {
        Self::combine(lhs, rhs, band_names, |l, r| format!("{l} plus {r}"), |l, r| l + r)
    }

    pub fn subtract(lhs: &Self, rhs: &Self, band_names: Option<Vec<String>>) -> Result<Self>
    where
        T: AsPrimitive<T>,
    {
        Self::subtract_as::<T>(lhs, rhs, band_names)
    }

    pub fn subtract_as<U>(
        lhs: &Self,
        rhs: &Self,
        band_names: Option<Vec<String>>,
    ) -> Result<Raster<U>>
    where
        U: DataType,
        T: AsPrimitive<U>,
    {
        Self::combine(lhs, rhs, band_names, |l, r| format!("{l} minus {r}"), |l, r| l - r)
    }

    /// Divides as 64 bit floats.
    pub fn divide(
        numerator: &Self,
        divisor: &Self,
        band_names: Option<Vec<String>>,
    ) -> Result<Raster<f64>>
    where
        T: AsPrimitive<f64>,
    {
        Self::divide_as::<f64>(numerator, divisor, band_names)
    }

    pub fn divide_as<U>(
        numerator: &Self,
        divisor: &Self,
        band_names: Option<Vec<String>>,
    ) -> Result<Raster<U>>
    where
        U: DataType + Float,
        T: AsPrimitive<U>,
    {
        Self::combine(
            numerator,
            divisor,
            band_names,
            |l, r| format!("Division of {l} by {r}"),
            |l, r| l / r,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{raster::tests::utm_meta, PixelType};
    use ndarray::{array, Array3};
    use rstest::rstest;

    fn band<T: DataType>(values: ndarray::Array2<T>, name: &str) -> Raster<T> {
        Raster::from_band(values, utm_meta(10.), name)
    }

    #[rstest]
    fn add_and_subtract_keep_operand_type() {
        let nir = band(array![[10u16, 20], [30, 40]], "B08");
        let red = band(array![[1u16, 2], [3, 50]], "B04");
        let sum = Raster::add(&nir, &red, None).unwrap();
        assert_eq!(sum.band(0), array![[11u16, 22], [33, 90]]);
        assert_eq!(sum.band_names(), ["B08 plus B04"]);
        assert_eq!(sum.meta().dtype, PixelType::UInt16);

        let difference = Raster::subtract(&nir, &red, None).unwrap();
        assert_eq!(difference.band(0), array![[9u16, 18], [27, 0]]);
        assert_eq!(difference.band_names(), ["B08 minus B04"]);
    }

    #[rstest]
    fn integer_results_saturate_at_both_ends() {
        let high = band(array![[65000u16, 40]], "a");
        let low = band(array![[1000u16, 50]], "b");
        assert_eq!(Raster::add(&high, &low, None).unwrap().band(0), array![[u16::MAX, 90]]);
        assert_eq!(Raster::subtract(&high, &low, None).unwrap().band(0), array![[64000u16, 0]]);
    }

    #[rstest]
    fn target_type_casts_before_operation() {
        let nir = band(array![[10u16, 20]], "B08");
        let red = band(array![[30u16, 5]], "B04");
        let difference: Raster<f64> =
            Raster::subtract_as(&nir, &red, Some(vec!["delta".into()])).unwrap();
        assert_eq!(difference.band(0), array![[-20.0, 15.0]]);
        assert_eq!(difference.meta().dtype, PixelType::Float64);
        assert_eq!(difference.band_names(), ["delta"]);
    }

    #[rstest]
    fn divide_follows_ieee_semantics() {
        let numerator = band(array![[1.0, -1.0, 0.0, 3.0]], "n");
        let divisor = band(array![[0.0, 0.0, 0.0, 4.0]], "d");
        let ratio = Raster::divide(&numerator, &divisor, None).unwrap();
        let values = ratio.band(0);
        assert_eq!(values[[0, 0]], f64::INFINITY);
        assert_eq!(values[[0, 1]], f64::NEG_INFINITY);
        assert!(values[[0, 2]].is_nan());
        assert_eq!(values[[0, 3]], 0.75);
        assert_eq!(ratio.band_names(), ["Division of n by d"]);
    }

    #[rstest]
    fn divide_as_single_precision() {
        let numerator = band(array![[1u8, 2]], "n");
        let divisor = band(array![[4u8, 8]], "d");
        let ratio: Raster<f32> = Raster::divide_as(&numerator, &divisor, None).unwrap();
        assert_eq!(ratio.band(0), array![[0.25f32, 0.25]]);
        assert_eq!(ratio.meta().dtype, PixelType::Float32);
    }

    #[rstest]
    fn band_count_mismatch_never_truncates() {
        let two = Raster::unlabeled(Array3::<f64>::ones((2, 2, 2)), utm_meta(10.));
        let one = Raster::unlabeled(Array3::<f64>::ones((2, 2, 1)), utm_meta(10.));
        for result in [
            Raster::add(&two, &one, None),
            Raster::subtract(&two, &one, None),
            Raster::divide(&two, &one, None),
        ] {
            assert!(matches!(
                result,
                Err(DeltasatError::BandMismatch {
                    expected: 2,
                    found: 1
                })
            ));
        }
    }

    #[rstest]
    fn grid_mismatch_fails() {
        let lhs = Raster::unlabeled(Array3::<f64>::ones((2, 2, 1)), utm_meta(10.));
        let rhs = Raster::unlabeled(Array3::<f64>::ones((4, 4, 1)), utm_meta(10.));
        assert!(matches!(
            Raster::add(&lhs, &rhs, None),
            Err(DeltasatError::GridMismatch { .. })
        ));
    }
}
