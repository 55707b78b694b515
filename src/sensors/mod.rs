mod sentinel2;
pub use sentinel2::{Sentinel2Band, REQUIRED_BANDS, SCL_CLOUD_CODES};
