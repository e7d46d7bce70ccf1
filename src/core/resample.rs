use crate::io::raster::{
    band_description, create_output, open_raster, read_band_resampled, with_pixel_type,
    write_band, OutputGuard, OutputOptions, ResampleMethod,
};
use crate::types::{RasterMetadata, StackError, StackResult};
use gdal::raster::GdalType;
use gdal::Dataset;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Parameters for spatial resampling
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResampleParams {
    /// Kernel used by GDAL when reading at the new size
    pub method: ResampleMethod,
    pub output: OutputOptions,
}

impl Default for ResampleParams {
    fn default() -> Self {
        Self {
            method: ResampleMethod::Bilinear, // Use Nearest for categorical layers
            output: OutputOptions::default(),
        }
    }
}

/// Layout of `metadata` resampled to `target_resolution` ground units per pixel.
///
/// Dimensions are truncated, and the pixel size is then stretched so the
/// output still covers the input footprint.
pub fn resampled_metadata(
    metadata: &RasterMetadata,
    target_resolution: f64,
) -> StackResult<RasterMetadata> {
    if !target_resolution.is_finite() || target_resolution <= 0.0 {
        return Err(StackError::InvalidParameter(format!(
            "target resolution must be positive, got {}",
            target_resolution
        )));
    }

    let (res_x, res_y) = metadata.geo_transform.pixel_size();
    let new_width = (metadata.width as f64 * (res_x / target_resolution)) as usize;
    let new_height = (metadata.height as f64 * (res_y / target_resolution)) as usize;
    if new_width == 0 || new_height == 0 {
        return Err(StackError::InvalidParameter(format!(
            "resampling {}x{} pixels of {}x{} to {} leaves an empty raster",
            metadata.width, metadata.height, res_x, res_y, target_resolution
        )));
    }

    let geo_transform = metadata.geo_transform.scaled(
        metadata.width as f64 / new_width as f64,
        metadata.height as f64 / new_height as f64,
    );

    Ok(RasterMetadata {
        width: new_width,
        height: new_height,
        geo_transform,
        ..metadata.clone()
    })
}

fn resample_bands<T: GdalType + Copy>(
    source: &Dataset,
    output: &Path,
    metadata: &RasterMetadata,
    params: &ResampleParams,
) -> StackResult<()> {
    let dataset = create_output::<T, _>(output, metadata, &params.output)?;

    for band_index in 1..=metadata.band_count {
        log::debug!("Resampling band {} of {}", band_index, metadata.band_count);
        let band = read_band_resampled::<T>(source, band_index, metadata.shape(), params.method)?;
        let description = band_description(source, band_index);
        write_band(
            &dataset,
            band_index,
            &band,
            description.as_deref(),
            metadata.nodata,
        )?;
    }

    Ok(())
}

/// Resample every band of `input` to `target_resolution` ground units per pixel.
///
/// Returns the metadata record of the written raster.
pub fn resample_spatial_resolution<P: AsRef<Path>, Q: AsRef<Path>>(
    input: P,
    target_resolution: f64,
    output: Q,
    params: &ResampleParams,
) -> StackResult<RasterMetadata> {
    let input = input.as_ref();
    log::info!(
        "Resampling {} to {} m using {:?}",
        input.display(),
        target_resolution,
        params.method
    );

    let source = open_raster(input)?;
    let metadata = RasterMetadata::from_dataset(&source)?;
    let out_metadata = resampled_metadata(&metadata, target_resolution)?;
    log::debug!(
        "Output size {}x{} (was {}x{})",
        out_metadata.width,
        out_metadata.height,
        metadata.width,
        metadata.height
    );

    let guard = OutputGuard::new(output)?;
    with_pixel_type!(out_metadata.pixel_type, T => {
        resample_bands::<T>(&source, guard.path(), &out_metadata, params)?
    });
    let output_path = guard.commit()?;

    log::info!(
        "Resampled raster saved to {} with resolution: {} m",
        output_path.display(),
        target_resolution
    );
    Ok(out_metadata)
}
