#![allow(dead_code)]

use gdal::raster::{Buffer, GdalType};
use gdal::spatial_ref::SpatialRef;
use gdal::DriverManager;
use ndarray::Array2;
use std::fs;
use std::path::{Path, PathBuf};

/// WGS 84 / UTM zone 33N, the zone of tile T33TTG
pub const UTM_33N: u32 = 32633;

pub const ORIGIN_X: f64 = 300000.0;
pub const ORIGIN_Y: f64 = 5000040.0;

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn transform_for(pixel_size: f64) -> [f64; 6] {
    [ORIGIN_X, pixel_size, 0.0, ORIGIN_Y, 0.0, -pixel_size]
}

/// Deterministic band contents, distinct per `seed`
pub fn band_data(seed: u16, rows: usize, cols: usize) -> Array2<u16> {
    Array2::from_shape_fn((rows, cols), |(r, c)| seed * 1000 + (r * cols + c) as u16)
}

/// Write a single-band georeferenced GeoTIFF
pub fn write_single_band<T: GdalType + Copy>(path: &Path, data: &Array2<T>, pixel_size: f64) {
    write_raster(path, &[data.clone()], pixel_size);
}

/// Write a multi-band georeferenced GeoTIFF
pub fn write_raster<T: GdalType + Copy>(path: &Path, bands: &[Array2<T>], pixel_size: f64) {
    let (rows, cols) = bands[0].dim();
    let driver = DriverManager::get_driver_by_name("GTiff").expect("GTiff driver missing");
    let mut dataset = driver
        .create_with_band_type::<T, _>(path, cols as isize, rows as isize, bands.len() as isize)
        .expect("Failed to create test raster");
    dataset
        .set_geo_transform(&transform_for(pixel_size))
        .expect("Failed to set geotransform");
    dataset
        .set_spatial_ref(&SpatialRef::from_epsg(UTM_33N).expect("Unknown EPSG code"))
        .expect("Failed to set CRS");

    for (i, data) in bands.iter().enumerate() {
        let mut band = dataset.rasterband(i as isize + 1).expect("Missing band");
        let buffer = Buffer::new((cols, rows), data.iter().copied().collect());
        band.write((0, 0), (cols, rows), &buffer).expect("Failed to write band");
    }
}

/// Lay out `<root>/GRANULE/<granule>/IMG_DATA/R{resolution}m/` and return the band folder
pub fn band_dir(root: &Path, granule: &str, resolution: u32) -> PathBuf {
    let folder = root
        .join("GRANULE")
        .join(granule)
        .join("IMG_DATA")
        .join(format!("R{}m", resolution));
    fs::create_dir_all(&folder).expect("Failed to create band folder");
    folder
}

/// Populate a band folder with one file per name, band `i` filled with seed `i + 1`
pub fn write_bands(folder: &Path, names: &[&str], rows: usize, cols: usize, pixel_size: f64) {
    for (i, name) in names.iter().enumerate() {
        let data = band_data(i as u16 + 1, rows, cols);
        write_single_band(&folder.join(name), &data, pixel_size);
    }
}

/// Entries of `dir` left behind by an output staging directory
pub fn staging_leftovers(dir: &Path) -> Vec<PathBuf> {
    fs::read_dir(dir)
        .expect("Failed to list directory")
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().starts_with(".s2stack-"))
        .map(|e| e.path())
        .collect()
}
