use geo::{AffineTransform, Coord};
use log::{debug, warn};
use ndarray::{parallel::prelude::*, Array3, Axis};
use num::traits::AsPrimitive;

use crate::{
    components::{DataType, MetaOverrides, Raster},
    errors::{DeltasatError, Result},
};

impl<T: DataType> Raster<T> {
    /// Bilinear resampling onto the grid described by `target_shape` (rows, cols)
    /// and `target_transform`, keeping the crs.
    ///
    /// Target pixel centres outside the source extent are 0. Near the edges the
    /// interpolation clamps to the outermost source row/column.
    pub fn resample(
        &self,
        target_shape: (usize, usize),
        target_transform: AffineTransform,
        band_names: Option<Vec<String>>,
    ) -> Result<Self> {
        let inverse = self
            .meta
            .transform
            .inverse()
            .ok_or(DeltasatError::NonInvertibleTransform)?;
        let (rows, cols) = target_shape;
        let (src_rows, src_cols, bands) = self.pixels.dim();
        debug!(
            "resampling {}x{} onto {}x{}, resolution {:?} -> {:?}",
            src_rows,
            src_cols,
            rows,
            cols,
            self.meta.resolution(),
            (target_transform.a(), target_transform.e().abs())
        );

        let mut pixels = Array3::<T>::zeros((rows, cols, bands));
        if src_rows > 0 && src_cols > 0 {
            let (max_row, max_col) = ((src_rows - 1) as f64, (src_cols - 1) as f64);
            pixels
                .axis_iter_mut(Axis(0))
                .into_par_iter()
                .enumerate()
                .for_each(|(row, mut line)| {
                    for col in 0..cols {
                        let world = target_transform.apply(Coord {
                            x: col as f64 + 0.5,
                            y: row as f64 + 0.5,
                        });
                        let source = inverse.apply(world);
                        if source.x < 0.
                            || source.y < 0.
                            || source.x > src_cols as f64
                            || source.y > src_rows as f64
                        {
                            continue;
                        }
                        let x = (source.x - 0.5).clamp(0., max_col);
                        let y = (source.y - 0.5).clamp(0., max_row);
                        let (c0, r0) = (x.floor() as usize, y.floor() as usize);
                        let (c1, r1) = ((c0 + 1).min(src_cols - 1), (r0 + 1).min(src_rows - 1));
                        let (fx, fy) = (x - c0 as f64, y - r0 as f64);
                        for band in 0..bands {
                            let at = |r: usize, c: usize| -> f64 { self.pixels[[r, c, band]].as_() };
                            let top = at(r0, c0) * (1. - fx) + at(r0, c1) * fx;
                            let bottom = at(r1, c0) * (1. - fx) + at(r1, c1) * fx;
                            line[[col, band]] = T::saturate_from(top * (1. - fy) + bottom * fy);
                        }
                    }
                });
        }

        Self::new(
            pixels,
            self.meta
                .with_overrides(MetaOverrides::default().transform(target_transform)),
            band_names.unwrap_or_else(|| self.band_names.clone()),
        )
    }

    /// Resamples onto the grid of `reference`.
    pub fn resample_like<U: DataType>(&self, reference: Option<&Raster<U>>) -> Result<Self> {
        let reference = reference.ok_or(DeltasatError::MissingReference)?;
        if reference.meta().crs != self.meta.crs {
            warn!(
                "resampling {} onto a grid in {}, crs is kept",
                self.meta.crs,
                reference.meta().crs
            );
        }
        self.resample(reference.shape(), reference.meta().transform, None)
    }
}
