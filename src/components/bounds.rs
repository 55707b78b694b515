use geo::{AffineTransform, BoundingRect, Coord, Intersects, Point, Polygon, Rect};
use log::debug;
use ndarray::{ArrayView, Dimension, Slice};
use serde::{Deserialize, Serialize};

use crate::{
    components::SpatialMeta,
    errors::{DeltasatError, Result},
    intersection::Intersection,
};

/// Pixel bounds of a region, half open: rows `min_row..max_row`,
/// cols `min_col..max_col`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArrayBox {
    pub min_row: usize,
    pub max_row: usize,
    pub min_col: usize,
    pub max_col: usize,
}

impl ArrayBox {
    pub fn new(min_row: usize, max_row: usize, min_col: usize, max_col: usize) -> Result<Self> {
        let array_box = Self {
            min_row,
            max_row,
            min_col,
            max_col,
        };
        array_box.validate()?;
        Ok(array_box)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_row <= self.min_row || self.max_col <= self.min_col {
            return Err(DeltasatError::DegenerateBox {
                min_row: self.min_row,
                max_row: self.max_row,
                min_col: self.min_col,
                max_col: self.max_col,
            });
        }
        Ok(())
    }

    pub fn height(&self) -> usize {
        self.max_row.saturating_sub(self.min_row)
    }

    pub fn width(&self) -> usize {
        self.max_col.saturating_sub(self.min_col)
    }

    /// Pixel area of the box.
    pub fn area(&self) -> usize {
        self.height() * self.width()
    }

    /// `(min_row, max_row, min_col, max_col)`
    pub fn as_tuple(&self) -> (usize, usize, usize, usize) {
        (self.min_row, self.max_row, self.min_col, self.max_col)
    }

    /// View of the box over the first two axes of a `(row, col)` or
    /// `(row, col, band)` array.
    pub fn slice_array<'a, T, D: Dimension>(
        &self,
        array: ArrayView<'a, T, D>,
    ) -> Result<ArrayView<'a, T, D>> {
        let ndim = array.ndim();
        if !(2..=3).contains(&ndim) {
            return Err(DeltasatError::Shape(ndim));
        }
        self.validate()?;
        let (rows, cols) = (array.shape()[0], array.shape()[1]);
        if self.max_row > rows || self.max_col > cols {
            return Err(DeltasatError::BoxOutOfBounds {
                max_row: self.max_row,
                max_col: self.max_col,
                rows,
                cols,
            });
        }
        let mut view = array;
        view.slice_each_axis_inplace(|axis| match axis.axis.index() {
            0 => Slice::from(self.min_row..self.max_row),
            1 => Slice::from(self.min_col..self.max_col),
            _ => Slice::from(..),
        });
        Ok(view)
    }
}

/// Pixel window and transform of a raster cropped to a polygon.
#[derive(Debug, Clone, PartialEq)]
pub struct ClipWindow {
    pub bounds: ArrayBox,
    pub transform: AffineTransform,
}

impl ClipWindow {
    /// `geometry` must already be expressed in the raster crs.
    /// The window is the outward rounded pixel envelope of the geometry,
    /// limited to the raster extent.
    pub fn new(meta: &SpatialMeta, geometry: &Polygon) -> Result<Self> {
        let inverse = meta
            .transform
            .inverse()
            .ok_or(DeltasatError::NonInvertibleTransform)?;
        let envelope = geometry.bounding_rect().ok_or(DeltasatError::EmptyResult)?;
        let corners = [
            envelope.min(),
            envelope.max(),
            Coord {
                x: envelope.min().x,
                y: envelope.max().y,
            },
            Coord {
                x: envelope.max().x,
                y: envelope.min().y,
            },
        ]
        .map(|corner| inverse.apply(corner));
        let (min, max) = corners.iter().fold(
            (
                Coord {
                    x: f64::INFINITY,
                    y: f64::INFINITY,
                },
                Coord {
                    x: f64::NEG_INFINITY,
                    y: f64::NEG_INFINITY,
                },
            ),
            |(min, max), c| {
                (
                    Coord {
                        x: min.x.min(c.x),
                        y: min.y.min(c.y),
                    },
                    Coord {
                        x: max.x.max(c.x),
                        y: max.y.max(c.y),
                    },
                )
            },
        );
        let pixel_envelope = Rect::new(
            (min.x.floor(), min.y.floor()),
            (max.x.ceil(), max.y.ceil()),
        );
        let extent = Rect::new((0., 0.), (meta.width as f64, meta.height as f64));
        let window = extent.intersection(&pixel_envelope)?;
        let bounds = ArrayBox::new(
            window.min().y as usize,
            window.max().y as usize,
            window.min().x as usize,
            window.max().x as usize,
        )
        .map_err(|_| DeltasatError::EmptyResult)?;
        debug!("clip window {:?} of raster {}x{}", bounds, meta.height, meta.width);

        let t = &meta.transform;
        let (col_off, row_off) = (bounds.min_col as f64, bounds.min_row as f64);
        let transform = AffineTransform::new(
            t.a(),
            t.b(),
            t.a() * col_off + t.b() * row_off + t.xoff(),
            t.d(),
            t.e(),
            t.d() * col_off + t.e() * row_off + t.yoff(),
        );
        Ok(Self { bounds, transform })
    }

    /// Whether the centre of window pixel `(row, col)` lies in `geometry`.
    pub fn pixel_in(&self, geometry: &Polygon, row: usize, col: usize) -> bool {
        let centre = self.transform.apply(Coord {
            x: col as f64 + 0.5,
            y: row as f64 + 0.5,
        });
        geometry.intersects(&Point::from(centre))
    }
}
