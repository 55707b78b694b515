pub mod batch;
pub mod change;
pub mod components;
pub mod config;
pub mod crs_geo;
pub mod errors;
pub mod indices;
pub mod intersection;
pub mod item;
pub mod sensors;

pub use batch::{compute_indices_batch, screen_items, ItemOutcome, PipelinePhase, ScreeningReport};
pub use change::{ChangeExtractor, ChangeReport, IndexDiffs, SpectralIndexKind};
pub use components::{ArrayBox, DataType, Raster, RasterSource, SpatialMeta};
pub use config::PipelineConfig;
pub use crs_geo::CrsGeometry;
pub use errors::{DeltasatError, Result};
pub use indices::{BandSet, SpectralIndices};
pub use item::{CatalogItem, ItemProcessor, LocalItem};
pub use sensors::Sentinel2Band;
