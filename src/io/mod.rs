//! I/O modules for locating Sentinel-2 band files and reading/writing rasters

pub mod safe;
pub mod raster;

pub use safe::{band_folder, find_band_files, parse_band_name, SafeLayout};
pub use raster::{
    create_output, open_raster, read_band, read_band_resampled, write_band, OutputGuard,
    OutputOptions, ResampleMethod,
};
