use log::debug;
use ndarray::{s, Array2, ArrayView2, Axis, Zip};
use std::collections::VecDeque;

use crate::{components::ArrayBox, config::RegionParams};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Morphology {
    Dilate,
    Erode,
}

/// One pass of a square structuring element along `axis`.
/// Pixels beyond the border count as unset.
fn sweep(mask: ArrayView2<bool>, radius: usize, axis: Axis, op: Morphology) -> Array2<bool> {
    let mut out = Array2::from_elem(mask.raw_dim(), false);
    Zip::from(out.lanes_mut(axis))
        .and(mask.lanes(axis))
        .par_for_each(|mut out, lane| {
            let len = lane.len();
            for (idx, value) in out.iter_mut().enumerate() {
                let lo = idx.saturating_sub(radius);
                let hi = (idx + radius).min(len - 1);
                let window = lane.slice(s![lo..=hi]);
                *value = match op {
                    Morphology::Dilate => window.iter().any(|&v| v),
                    Morphology::Erode => {
                        idx >= radius && idx + radius < len && window.iter().all(|&v| v)
                    }
                };
            }
        });
    out
}

fn square(mask: ArrayView2<bool>, radius: usize, op: Morphology) -> Array2<bool> {
    if radius == 0 || mask.is_empty() {
        return mask.to_owned();
    }
    let rows = sweep(mask, radius, Axis(1), op);
    sweep(rows.view(), radius, Axis(0), op)
}

/// Dilation with a `(2 * radius + 1)` square.
pub fn dilate(mask: ArrayView2<bool>, radius: usize) -> Array2<bool> {
    square(mask, radius, Morphology::Dilate)
}

/// Erosion with a `(2 * radius + 1)` square, the border erodes.
pub fn erode(mask: ArrayView2<bool>, radius: usize) -> Array2<bool> {
    square(mask, radius, Morphology::Erode)
}

/// Erosion followed by dilation, removes features narrower than the element.
pub fn opening(mask: ArrayView2<bool>, radius: usize) -> Array2<bool> {
    dilate(erode(mask, radius).view(), radius)
}

/// 8-connected component of a binary mask.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Component {
    /// 1 based, in row major order of each component's first pixel.
    pub label: usize,
    pub pixel_count: usize,
    pub bounds: ArrayBox,
}

/// Breadth first 8-connected labeling.
pub fn label_components(mask: ArrayView2<bool>) -> Vec<Component> {
    let (rows, cols) = mask.dim();
    let mut visited = Array2::from_elem((rows, cols), false);
    let mut components = Vec::new();
    let mut queue = VecDeque::new();

    for ((r, c), &set) in mask.indexed_iter() {
        if !set || visited[[r, c]] {
            continue;
        }
        visited[[r, c]] = true;
        queue.push_back((r, c));
        let mut pixel_count = 0;
        let (mut min_row, mut max_row, mut min_col, mut max_col) = (r, r, c, c);

        while let Some((cr, cc)) = queue.pop_front() {
            pixel_count += 1;
            min_row = min_row.min(cr);
            max_row = max_row.max(cr);
            min_col = min_col.min(cc);
            max_col = max_col.max(cc);

            for nr in cr.saturating_sub(1)..=(cr + 1).min(rows - 1) {
                for nc in cc.saturating_sub(1)..=(cc + 1).min(cols - 1) {
                    if mask[[nr, nc]] && !visited[[nr, nc]] {
                        visited[[nr, nc]] = true;
                        queue.push_back((nr, nc));
                    }
                }
            }
        }

        components.push(Component {
            label: components.len() + 1,
            pixel_count,
            bounds: ArrayBox {
                min_row,
                max_row: max_row + 1,
                min_col,
                max_col: max_col + 1,
            },
        });
    }
    components
}

/// Bounding boxes of the changed regions of `mask`.
///
/// The mask is optionally opened with a 3x3 square, dilated by
/// `buffer_px` and labeled. Components with fewer than `min_region_px`
/// pixels (after dilation) are dropped.
pub fn extract_regions(mask: ArrayView2<bool>, params: &RegionParams) -> Vec<ArrayBox> {
    let denoised = if params.denoise {
        opening(mask, 1)
    } else {
        mask.to_owned()
    };
    let dilated = dilate(denoised.view(), params.buffer_px);
    let components = label_components(dilated.view());
    let found = components.len();
    let boxes: Vec<ArrayBox> = components
        .into_iter()
        .filter(|component| component.pixel_count >= params.min_region_px)
        .map(|component| component.bounds)
        .collect();
    debug!(
        "{} of {} components kept with {:?}",
        boxes.len(),
        found,
        params
    );
    boxes
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn params(buffer_px: usize, denoise: bool, min_region_px: usize) -> RegionParams {
        RegionParams {
            buffer_px,
            denoise,
            min_region_px,
        }
    }

    fn mask_with(shape: (usize, usize), on: &[(usize, usize)]) -> Array2<bool> {
        let mut mask = Array2::from_elem(shape, false);
        for &idx in on {
            mask[idx] = true;
        }
        mask
    }

    #[rstest]
    fn all_zero_mask_has_no_region() {
        let mask = Array2::from_elem((16, 16), false);
        assert!(extract_regions(mask.view(), &RegionParams::default()).is_empty());
    }

    #[rstest]
    fn single_block_is_one_region() {
        let mut mask = Array2::from_elem((10, 10), false);
        mask.slice_mut(s![2..5, 4..7]).fill(true);
        let boxes = extract_regions(mask.view(), &params(0, false, 2));
        assert_eq!(boxes.len(), 1);
        assert!(boxes[0].area() >= 9);
        assert_eq!(boxes[0].as_tuple(), (2, 5, 4, 7));
    }

    #[rstest]
    fn isolated_pixel_is_below_minimum() {
        let mask = mask_with((6, 6), &[(3, 3)]);
        assert!(extract_regions(mask.view(), &params(0, false, 2)).is_empty());
        assert_eq!(extract_regions(mask.view(), &params(0, false, 1)).len(), 1);
    }

    #[rstest]
    fn buffer_merges_nearby_changes_and_clips_at_border() {
        let mask = mask_with((12, 12), &[(1, 1), (1, 5)]);
        let boxes = extract_regions(mask.view(), &params(2, false, 2));
        assert_eq!(boxes, vec![ArrayBox::new(0, 4, 0, 8).unwrap()]);

        let apart = extract_regions(mask.view(), &params(1, false, 2));
        assert_eq!(apart.len(), 2);
    }

    #[rstest]
    fn denoise_drops_isolated_pixels() {
        let mut mask = mask_with((12, 12), &[(0, 11), (10, 1)]);
        mask.slice_mut(s![3..7, 3..7]).fill(true);
        let noisy = extract_regions(mask.view(), &params(0, false, 1));
        assert_eq!(noisy.len(), 3);
        let clean = extract_regions(mask.view(), &params(0, true, 1));
        assert_eq!(clean, vec![ArrayBox::new(3, 7, 3, 7).unwrap()]);
    }

    #[rstest]
    fn labeling_is_eight_connected_in_row_major_order() {
        let mask = mask_with((6, 6), &[(4, 0), (0, 4), (1, 3), (2, 2)]);
        let components = label_components(mask.view());
        assert_eq!(components.len(), 2);
        assert_eq!(components[0].label, 1);
        assert_eq!(components[0].pixel_count, 3);
        assert_eq!(components[0].bounds.as_tuple(), (0, 3, 2, 5));
        assert_eq!(components[1].bounds.as_tuple(), (4, 5, 0, 1));
    }

    #[rstest]
    fn erosion_treats_border_as_unset() {
        let mask = Array2::from_elem((5, 5), true);
        let eroded = erode(mask.view(), 1);
        assert_eq!(eroded.iter().filter(|&&v| v).count(), 9);
        assert!(!eroded[[0, 2]]);
        assert!(eroded[[2, 2]]);
        let dilated = dilate(mask_with((5, 5), &[(0, 0)]).view(), 1);
        assert_eq!(dilated.iter().filter(|&&v| v).count(), 4);
    }
}
