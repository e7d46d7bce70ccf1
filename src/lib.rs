//! s2stack: Sentinel-2 band stacking and raster degradation utilities
//!
//! Locates the per-band JPEG2000 files of a Sentinel-2 `.SAFE` product,
//! stacks them into one multi-band GeoTIFF, and provides the degradations
//! used in remote-sensing coursework: spatial resampling, 8-bit radiometric
//! reduction and bit-plane extraction. Raster I/O goes through GDAL.

pub mod types;
pub mod io;
pub mod core;

// Re-export main types and functions for easier access
pub use types::{
    BandFile, BandImage, BitPlane, GeoTransform, PixelType, RasterMetadata, StackError,
    StackResult, StackSummary,
};

pub use io::{OutputOptions, ResampleMethod, SafeLayout};
pub use crate::core::{
    extract_bit_planes, reduce_radiometric_resolution, resample_spatial_resolution,
    stack_sentinel2_safe, BandStacker, RadiometricParams, ResampleParams, StackParams,
};

#[cfg(feature = "python")]
mod bindings {
    use crate::types::{RasterMetadata, StackError};
    use pyo3::exceptions::{PyFileNotFoundError, PyRuntimeError, PyValueError};
    use pyo3::prelude::*;
    use pyo3::types::PyDict;
    use std::path::Path;

    fn to_py_err(err: StackError) -> PyErr {
        match err {
            StackError::MissingInput { .. } => PyFileNotFoundError::new_err(err.to_string()),
            StackError::InvalidParameter(_) | StackError::UnsupportedDataType(_) => {
                PyValueError::new_err(err.to_string())
            }
            _ => PyRuntimeError::new_err(err.to_string()),
        }
    }

    /// Stack the bands of a `.SAFE` folder at one resolution; returns the band count
    #[pyfunction]
    #[pyo3(signature = (safe_folder, resolution=10, output_file="sentinel2_stack.tif"))]
    fn stack_sentinel2_safe(safe_folder: &str, resolution: u32, output_file: &str) -> PyResult<usize> {
        let summary = crate::core::stack_sentinel2_safe(safe_folder, resolution, output_file)
            .map_err(to_py_err)?;
        Ok(summary.bands.len())
    }

    /// Extract the bit planes of one band; returns the bit depth
    #[pyfunction]
    #[pyo3(signature = (tif_path, band_index, output_file=None))]
    fn extract_bit_plane(tif_path: &str, band_index: usize, output_file: Option<&str>) -> PyResult<usize> {
        let planes = crate::core::extract_bit_planes(tif_path, band_index, output_file.map(Path::new))
            .map_err(to_py_err)?;
        Ok(planes.len())
    }

    #[pyfunction]
    fn resample_spatial_resolution(input_file: &str, target_resolution: f64, output_file: &str) -> PyResult<()> {
        crate::core::resample_spatial_resolution(
            input_file,
            target_resolution,
            output_file,
            &crate::core::ResampleParams::default(),
        )
        .map_err(to_py_err)?;
        Ok(())
    }

    #[pyfunction]
    fn reduce_radiometric_resolution(input_file: &str, output_file: &str) -> PyResult<()> {
        crate::core::reduce_radiometric_resolution(
            input_file,
            output_file,
            &crate::core::RadiometricParams::default(),
        )
        .map_err(to_py_err)?;
        Ok(())
    }

    /// Metadata record of a raster as a dict
    #[pyfunction]
    fn get_properties(py: Python<'_>, file: &str) -> PyResult<PyObject> {
        let metadata = RasterMetadata::from_path(file).map_err(to_py_err)?;
        let (res_x, res_y) = metadata.geo_transform.pixel_size();

        let dict = PyDict::new(py);
        dict.set_item("count", metadata.band_count)?;
        dict.set_item("crs", metadata.projection.as_str())?;
        dict.set_item("dtype", metadata.pixel_type.to_string())?;
        dict.set_item("width", metadata.width)?;
        dict.set_item("height", metadata.height)?;
        dict.set_item("res", (res_x, res_y))?;
        dict.set_item("transform", metadata.geo_transform.to_gdal().to_vec())?;
        dict.set_item("nodata", metadata.nodata)?;
        Ok(dict.into())
    }

    /// Python module definition
    #[pymodule]
    fn _core(_py: Python, m: &PyModule) -> PyResult<()> {
        m.add_function(wrap_pyfunction!(stack_sentinel2_safe, m)?)?;
        m.add_function(wrap_pyfunction!(extract_bit_plane, m)?)?;
        m.add_function(wrap_pyfunction!(resample_spatial_resolution, m)?)?;
        m.add_function(wrap_pyfunction!(reduce_radiometric_resolution, m)?)?;
        m.add_function(wrap_pyfunction!(get_properties, m)?)?;
        Ok(())
    }
}
