use geo::{BoundingRect, Polygon, Rect};
use log::debug;
use proj::{Proj, Transform};
use shrinkwraprs::Shrinkwrap;

use crate::errors::{DeltasatError, Result};

pub const WGS84: &str = "EPSG:4326";

/// Geometry tagged with the CRS its coordinates are expressed in.
#[derive(Shrinkwrap, Debug, Clone, PartialEq)]
pub struct CrsGeometry<G> {
    crs: String,
    #[shrinkwrap(main_field)]
    geometry: G,
}

impl<G> CrsGeometry<G> {
    pub fn new(crs: impl Into<String>, geometry: G) -> Self {
        Self {
            crs: crs.into(),
            geometry,
        }
    }

    pub fn crs(&self) -> &str {
        self.crs.as_ref()
    }

    pub fn geometry(&self) -> &G {
        &self.geometry
    }
}

impl CrsGeometry<Polygon> {
    /// Axis aligned box `(min_x, min_y, max_x, max_y)`, lon/lat order for geographic CRSs.
    pub fn from_bbox(bbox: [f64; 4], crs: impl Into<String>) -> Self {
        let rect = Rect::new((bbox[0], bbox[1]), (bbox[2], bbox[3]));
        Self::new(crs, rect.to_polygon())
    }
}

impl<G: Transform<f64, Output = G> + Clone> CrsGeometry<G> {
    pub fn with_crs(mut self, crs: &str) -> Result<Self> {
        if self.crs().ne(crs) {
            let proj = Proj::new_known_crs(self.crs(), crs, None)?;
            self.crs = crs.to_string();
            self.geometry.transform(&proj)?;
        }
        Ok(self)
    }

    /// Clones if crs is same.
    pub fn projected_geometry(&self, crs: &str) -> Result<G> {
        if self.crs().ne(crs) {
            debug!("projecting geometry from {} to {}", self.crs(), crs);
            let proj = Proj::new_known_crs(self.crs(), crs, None)?;
            self.geometry
                .transformed(&proj)
                .map_err(DeltasatError::ProjError)
        } else {
            Ok(self.geometry.clone())
        }
    }
}

impl<G: BoundingRect<f64>> CrsGeometry<G> {
    pub fn bounding_rect(&self) -> Option<CrsGeometry<Rect>> {
        let geometry: Option<Rect> = self.geometry.bounding_rect().into();
        Some(CrsGeometry {
            crs: self.crs.clone(),
            geometry: geometry?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn same_crs_projection_is_a_clone() {
        let aoi = CrsGeometry::from_bbox([103.6, 1.2, 104.0, 1.5], WGS84);
        let projected = aoi.projected_geometry(WGS84).unwrap();
        assert_eq!(&projected, aoi.geometry());
        let rect = aoi.bounding_rect().unwrap();
        assert_eq!(rect.crs(), WGS84);
        assert_eq!(rect.min().x, 103.6);
        assert_eq!(rect.max().y, 1.5);
    }

    #[rstest]
    fn reprojects_to_utm() {
        let aoi = CrsGeometry::from_bbox([15.0, 45.0, 15.01, 45.01], WGS84)
            .with_crs("EPSG:32633")
            .unwrap();
        assert_eq!(aoi.crs(), "EPSG:32633");
        let rect = aoi.bounding_rect().unwrap();
        // 15°E is the central meridian of UTM zone 33.
        assert!((rect.min().x - 500_000.0).abs() < 1.0);
        assert!(rect.width() > 700.0 && rect.width() < 850.0);
    }
}
