//! Core raster operations

pub mod stack;
pub mod bit_plane;
pub mod resample;
pub mod radiometric;

// Re-export main types
pub use stack::{BandStacker, StackParams, stack_sentinel2_safe};
pub use bit_plane::{BitSample, bit_plane, bit_planes, extract_bit_planes};
pub use resample::{ResampleParams, resampled_metadata, resample_spatial_resolution};
pub use radiometric::{RadiometricParams, scale_to_u8, reduce_radiometric_resolution};
