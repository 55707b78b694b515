use image::{Rgb, RgbImage};
use ndarray::{Array3, ArrayView3, Axis};
use num::traits::AsPrimitive;

use crate::{
    components::{ArrayBox, DataType, Raster},
    errors::{DeltasatError, Result},
    indices::SpectralIndices,
};

/// Per channel min/max stretch to [0, 1].
///
/// Non finite values are ignored when looking for the range and map to 0,
/// as do constant channels.
pub fn normalize_rgb<T: DataType>(raster: &Raster<T>) -> Array3<f32> {
    let mut normalized = raster.pixels().mapv(|value| {
        let value: f64 = value.as_();
        value as f32
    });
    for mut channel in normalized.axis_iter_mut(Axis(2)) {
        let (min, max) = channel
            .iter()
            .filter(|value| value.is_finite())
            .fold((f32::INFINITY, f32::NEG_INFINITY), |(min, max), &v| {
                (min.min(v), max.max(v))
            });
        let range = max - min;
        channel.mapv_inplace(|value| {
            if range > 0. && value.is_finite() {
                (value - min) / range
            } else {
                0.
            }
        });
    }
    normalized
}

/// `contrast * chip + brightness`, clamped to [0, 1].
pub fn adjust_contrast_brightness(chip: ArrayView3<f32>, contrast: f32, brightness: f32) -> Array3<f32> {
    chip.mapv(|value| (contrast * value + brightness).clamp(0., 1.))
}

/// Normalized RGB cut of both acquisitions over the same box.
#[derive(Debug, Clone, PartialEq)]
pub struct ChipPair {
    pub bounds: ArrayBox,
    pub before: Array3<f32>,
    pub after: Array3<f32>,
}

fn to_rgb8(chip: &Array3<f32>) -> Result<RgbImage> {
    let (rows, cols, channels) = chip.dim();
    if channels != 3 {
        return Err(DeltasatError::BandMismatch {
            expected: 3,
            found: channels,
        });
    }
    let quantized = chip.mapv(|value| (value.clamp(0., 1.) * 255.).round() as u8);
    Ok(RgbImage::from_fn(cols as u32, rows as u32, |x, y| {
        let (row, col) = (y as usize, x as usize);
        Rgb([
            quantized[[row, col, 0]],
            quantized[[row, col, 1]],
            quantized[[row, col, 2]],
        ])
    }))
}

impl ChipPair {
    /// 8 bit (before, after) images.
    pub fn to_rgb8(&self) -> Result<(RgbImage, RgbImage)> {
        Ok((to_rgb8(&self.before)?, to_rgb8(&self.after)?))
    }

    pub fn adjusted(&self, contrast: f32, brightness: f32) -> Self {
        Self {
            bounds: self.bounds,
            before: adjust_contrast_brightness(self.before.view(), contrast, brightness),
            after: adjust_contrast_brightness(self.after.view(), contrast, brightness),
        }
    }
}

/// Cuts the normalized RGB composites of both acquisitions to each box,
/// in the order of `boxes`.
pub fn extract_before_after_chips<T: DataType, U: DataType>(
    boxes: &[ArrayBox],
    before: &SpectralIndices<T>,
    after: &SpectralIndices<U>,
) -> Result<Vec<ChipPair>> {
    let rgb_before = normalize_rgb(&before.rgb_image);
    let rgb_after = normalize_rgb(&after.rgb_image);
    boxes
        .iter()
        .map(|bounds| {
            Ok(ChipPair {
                bounds: *bounds,
                before: bounds.slice_array(rgb_before.view())?.to_owned(),
                after: bounds.slice_array(rgb_after.view())?.to_owned(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        components::raster::tests::utm_meta,
        indices::tests::band_set,
    };
    use ndarray::{array, Array3};
    use rstest::rstest;

    #[rstest]
    fn channels_are_stretched_independently() {
        let pixels = Array3::from_shape_fn((2, 2, 3), |(r, c, b)| match b {
            0 => (r * 2 + c) as u16 * 100,
            1 => 7,
            _ => 1000 - (r * 2 + c) as u16,
        });
        let raster = Raster::unlabeled(pixels, utm_meta(10.));
        let normalized = normalize_rgb(&raster);
        assert_eq!(normalized.index_axis(Axis(2), 0), array![[0f32, 1. / 3.], [2. / 3., 1.]]);
        assert!(normalized.index_axis(Axis(2), 1).iter().all(|&v| v == 0.));
        assert_eq!(normalized[[0, 0, 2]], 1.);
        assert_eq!(normalized[[1, 1, 2]], 0.);
    }

    #[rstest]
    fn non_finite_pixels_map_to_zero() {
        let pixels = Array3::from_shape_fn((2, 2, 3), |(r, c, _)| match (r, c) {
            (0, 0) => f64::NAN,
            (0, 1) => f64::INFINITY,
            _ => (r + c) as f64,
        });
        let normalized = normalize_rgb(&Raster::unlabeled(pixels, utm_meta(10.)));
        assert!(normalized.iter().all(|&v| (0. ..=1.).contains(&v)));
        assert_eq!(normalized.index_axis(Axis(2), 0), array![[0f32, 0.], [0., 1.]]);
    }

    #[rstest]
    #[case(1.0, 0.0, 0.5)]
    #[case(3.0, 0.0, 1.0)]
    #[case(1.0, -0.8, 0.0)]
    #[case(0.5, 0.1, 0.35)]
    fn contrast_and_brightness_clamp(
        #[case] contrast: f32,
        #[case] brightness: f32,
        #[case] expected: f32,
    ) {
        let chip = Array3::from_elem((1, 1, 3), 0.5f32);
        let adjusted = adjust_contrast_brightness(chip.view(), contrast, brightness);
        assert!((adjusted[[0, 0, 1]] - expected).abs() < 1e-6);
    }

    #[rstest]
    fn chips_follow_box_order() {
        let before = band_set(8, 200, 600, 4).compute_indices().unwrap();
        let after = band_set(8, 600, 200, 4).compute_indices().unwrap();
        let boxes = [
            ArrayBox::new(4, 8, 0, 2).unwrap(),
            ArrayBox::new(0, 2, 0, 3).unwrap(),
        ];
        let chips = extract_before_after_chips(&boxes, &before, &after).unwrap();
        assert_eq!(chips.len(), 2);
        assert_eq!(chips[0].bounds, boxes[0]);
        assert_eq!(chips[0].before.dim(), (4, 2, 3));
        assert_eq!(chips[1].after.dim(), (2, 3, 3));
        assert_eq!(chips[0].adjusted(1., 0.), chips[0]);

        let (before_image, after_image) = chips[1].to_rgb8().unwrap();
        assert_eq!(before_image.dimensions(), (3, 2));
        assert_eq!(after_image.get_pixel(2, 1), &Rgb([0, 0, 0]));
    }

    #[rstest]
    fn chips_outside_the_composite_fail() {
        let indices = band_set(4, 200, 600, 4).compute_indices().unwrap();
        let boxes = [ArrayBox::new(2, 6, 0, 2).unwrap()];
        assert!(matches!(
            extract_before_after_chips(&boxes, &indices, &indices),
            Err(DeltasatError::BoxOutOfBounds { .. })
        ));
    }

    #[rstest]
    fn rgb8_export_quantizes() {
        let chip = ChipPair {
            bounds: ArrayBox::new(0, 1, 0, 2).unwrap(),
            before: array![[[0f32, 0.5, 1.], [1., 1., 1.]]],
            after: Array3::zeros((1, 2, 2)),
        };
        assert!(matches!(
            chip.to_rgb8(),
            Err(DeltasatError::BandMismatch { expected: 3, found: 2 })
        ));
        let image = to_rgb8(&chip.before).unwrap();
        assert_eq!(image.get_pixel(0, 0), &Rgb([0, 128, 255]));
    }
}
