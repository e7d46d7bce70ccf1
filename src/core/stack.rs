use crate::io::raster::{
    create_output, open_raster, read_band, with_pixel_type, write_band, OutputGuard, OutputOptions,
};
use crate::io::safe::{find_band_files, SafeLayout};
use crate::types::{
    BandFile, RasterMetadata, StackError, StackResult, StackSummary, SUPPORTED_RESOLUTIONS,
};
use gdal::raster::GdalType;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Parameters for band stacking
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StackParams {
    /// Extension of the band image files, matched case-insensitively
    pub extension: String,
    /// How the stacked raster is written
    pub output: OutputOptions,
}

impl Default for StackParams {
    fn default() -> Self {
        Self {
            extension: "jp2".to_string(), // Sentinel-2 tiles ship as JPEG2000
            output: OutputOptions::default(),
        }
    }
}

/// Merges single-band files into one multi-band raster
pub struct BandStacker {
    params: StackParams,
}

impl BandStacker {
    pub fn new(params: StackParams) -> Self {
        Self { params }
    }

    /// Stacker for `.jp2` bands written to an uncompressed GeoTIFF
    pub fn standard() -> Self {
        Self::new(StackParams::default())
    }

    pub fn params(&self) -> &StackParams {
        &self.params
    }

    /// Stack every band of a `.SAFE` product at `resolution` meters.
    ///
    /// Bands come from `<safe>/GRANULE/<granule>/IMG_DATA/R{resolution}m` and
    /// are written in file-name order, band 1 being the first file.
    pub fn stack_safe<P: AsRef<Path>, Q: AsRef<Path>>(
        &self,
        safe_folder: P,
        resolution: u32,
        output_path: Q,
    ) -> StackResult<StackSummary> {
        log::info!(
            "Stacking {}m bands from: {}",
            resolution,
            safe_folder.as_ref().display()
        );
        if !SUPPORTED_RESOLUTIONS.contains(&resolution) {
            log::warn!(
                "Resolution {}m is not one of the Sentinel-2 resolutions {:?}",
                resolution,
                SUPPORTED_RESOLUTIONS
            );
        }

        let folder = SafeLayout::new(safe_folder).band_folder(resolution)?;
        let bands = find_band_files(&folder, &self.params.extension)?;
        if bands.is_empty() {
            return Err(StackError::MissingInput {
                folder,
                resolution,
                extension: self.params.extension.clone(),
            });
        }

        log::info!("Found {} bands at {}m resolution", bands.len(), resolution);
        self.stack_files(&bands, output_path)
    }

    /// Stack `bands` in the given order into `output_path`.
    ///
    /// Every band must share the first band's grid, coordinate system and
    /// sample type; this is checked before the output is created.
    pub fn stack_files<Q: AsRef<Path>>(
        &self,
        bands: &[BandFile],
        output_path: Q,
    ) -> StackResult<StackSummary> {
        let first = bands.first().ok_or_else(|| {
            StackError::InvalidParameter("no band files to stack".to_string())
        })?;

        let template = RasterMetadata::from_path(&first.path)?;
        log::debug!(
            "Reference band {}: {}x{} {} transform {:?}",
            first.path.display(),
            template.width,
            template.height,
            template.pixel_type,
            template.geo_transform.to_gdal()
        );
        if template.band_count > 1 {
            log::warn!(
                "{} has {} bands, only band 1 is stacked",
                first.path.display(),
                template.band_count
            );
        }

        for band in &bands[1..] {
            let metadata = RasterMetadata::from_path(&band.path)?;
            template.check_compatible(&metadata, &band.path.display().to_string())?;
        }

        let metadata = template.with_band_count(bands.len());
        let guard = OutputGuard::new(output_path)?;
        with_pixel_type!(metadata.pixel_type, T => {
            write_stack::<T>(guard.path(), bands, &metadata, &self.params.output)?
        });
        let output_path = guard.commit()?;

        log::info!("Stacked image saved as {}", output_path.display());
        Ok(StackSummary {
            output_path,
            bands: bands.to_vec(),
            metadata,
        })
    }
}

fn write_stack<T: GdalType + Copy>(
    path: &Path,
    bands: &[BandFile],
    metadata: &RasterMetadata,
    options: &OutputOptions,
) -> StackResult<()> {
    let dataset = create_output::<T, _>(path, metadata, options)?;

    for (i, band) in bands.iter().enumerate() {
        let band_index = i + 1;
        log::debug!(
            "Writing band {} ({}) from {}",
            band_index,
            band.band_name.as_deref().unwrap_or("unnamed"),
            band.path.display()
        );

        let data = {
            let source = open_raster(&band.path)?;
            read_band::<T>(&source, 1)?
        };
        write_band(
            &dataset,
            band_index,
            &data,
            band.band_name.as_deref(),
            metadata.nodata,
        )?;
    }

    Ok(())
}

/// Stack a `.SAFE` product's `.jp2` bands into a GeoTIFF
pub fn stack_sentinel2_safe<P: AsRef<Path>, Q: AsRef<Path>>(
    safe_folder: P,
    resolution: u32,
    output_path: Q,
) -> StackResult<StackSummary> {
    BandStacker::standard().stack_safe(safe_folder, resolution, output_path)
}
