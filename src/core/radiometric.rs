use crate::io::raster::{
    band_description, create_output, open_raster, read_band, write_band, OutputGuard, OutputOptions,
};
use crate::types::{BandImage, PixelType, RasterMetadata, StackError, StackResult};
use ndarray::Zip;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Parameters for 8-bit radiometric reduction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RadiometricParams {
    /// Input value mapped to 255; Sentinel-2 L2A reflectance is scaled by 10000
    pub max_value: f64,
    pub output: OutputOptions,
}

impl Default for RadiometricParams {
    fn default() -> Self {
        Self {
            max_value: 10000.0,
            output: OutputOptions::default(),
        }
    }
}

#[inline]
fn scale_value(value: f32, max_value: f32) -> u8 {
    // Truncating cast after clipping; NaN maps to 0
    (value / max_value * 255.0).clamp(0.0, 255.0) as u8
}

/// Rescale `band` from `0..=max_value` to `0..=255`, clipping outside values
pub fn scale_to_u8(band: &BandImage<f32>, max_value: f32) -> BandImage<u8> {
    #[cfg(feature = "parallel")]
    {
        Zip::from(band).par_map_collect(|&value| scale_value(value, max_value))
    }
    #[cfg(not(feature = "parallel"))]
    {
        Zip::from(band).map_collect(|&value| scale_value(value, max_value))
    }
}

/// Reduce every band of `input` to 8 bits per sample.
///
/// Returns the metadata record of the written raster.
pub fn reduce_radiometric_resolution<P: AsRef<Path>, Q: AsRef<Path>>(
    input: P,
    output: Q,
    params: &RadiometricParams,
) -> StackResult<RasterMetadata> {
    if !params.max_value.is_finite() || params.max_value <= 0.0 {
        return Err(StackError::InvalidParameter(format!(
            "max value must be positive, got {}",
            params.max_value
        )));
    }
    let max_value = params.max_value as f32;

    let input = input.as_ref();
    log::info!("Reducing {} to 8-bit (max value {})", input.display(), max_value);

    let source = open_raster(input)?;
    let metadata = RasterMetadata::from_dataset(&source)?;
    let out_metadata = RasterMetadata {
        // Nodata pixels go through the same scaling as every other sample
        nodata: metadata
            .nodata
            .map(|value| scale_value(value as f32, max_value) as f64),
        ..metadata.with_pixel_type(PixelType::UInt8)
    };
    log::debug!(
        "Input dtype {}, {} bands, {}x{}",
        metadata.pixel_type,
        metadata.band_count,
        metadata.width,
        metadata.height
    );

    let guard = OutputGuard::new(output)?;
    {
        let dataset = create_output::<u8, _>(guard.path(), &out_metadata, &params.output)?;
        for band_index in 1..=metadata.band_count {
            let band = read_band::<f32>(&source, band_index)?;
            let scaled = scale_to_u8(&band, max_value);
            let description = band_description(&source, band_index);
            write_band(
                &dataset,
                band_index,
                &scaled,
                description.as_deref(),
                out_metadata.nodata,
            )?;
        }
    }
    let output_path = guard.commit()?;

    log::info!(
        "Saved raster with 8-bit radiometric resolution: {}",
        output_path.display()
    );
    Ok(out_metadata)
}
