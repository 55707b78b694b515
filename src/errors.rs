use crate::sensors::Sentinel2Band;

pub type Result<T> = std::result::Result<T, DeltasatError>;

#[derive(thiserror::Error, Debug)]
pub enum DeltasatError {
    #[error(transparent)]
    ProjError(#[from] proj::ProjError),
    #[error(transparent)]
    ProjCreateError(#[from] proj::ProjCreateError),
    #[error(transparent)]
    GdalError(#[from] gdal::errors::GdalError),
    #[error(transparent)]
    NdarrayError(#[from] ndarray::ShapeError),
    #[error(transparent)]
    JsonError(#[from] serde_json::Error),
    #[error(transparent)]
    IoError(#[from] std::io::Error),
    #[error(transparent)]
    ThreadPoolError(#[from] rayon::ThreadPoolBuildError),
    #[error("Buffer must have 2 or 3 dimensions, got {0}")]
    Shape(usize),
    #[error("Source {0} has no bands")]
    NoBands(String),
    #[error("Band count mismatch: expected {expected}, got {found}")]
    BandMismatch { expected: usize, found: usize },
    #[error("Pixel grids differ: {left:?} vs {right:?}")]
    GridMismatch {
        left: (usize, usize),
        right: (usize, usize),
    },
    #[error("Resampling to a reference grid requires a reference raster")]
    MissingReference,
    #[error("Box rows {min_row}..{max_row}, cols {min_col}..{max_col} has no area")]
    DegenerateBox {
        min_row: usize,
        max_row: usize,
        min_col: usize,
        max_col: usize,
    },
    #[error("Box ending at ({max_row}, {max_col}) exceeds buffer of shape ({rows}, {cols})")]
    BoxOutOfBounds {
        max_row: usize,
        max_col: usize,
        rows: usize,
        cols: usize,
    },
    #[error("There is no intersection between clip geometry and raster extent")]
    EmptyResult,
    #[error("Band {0} is not loaded")]
    MissingBand(Sentinel2Band),
    #[error("Item {item} has no asset for band {band}")]
    MissingAsset { item: String, band: Sentinel2Band },
    #[error("Affine transform is not invertible")]
    NonInvertibleTransform,
    #[error("Invalid configuration: {0}")]
    Config(String),
}
