use crate::types::{BandImage, GeoTransform, PixelType, RasterMetadata, StackError, StackResult};
use gdal::raster::{Buffer, GdalType, RasterCreationOption, ResampleAlg};
use gdal::{Dataset, DriverManager, Metadata};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Run `$body` with `$t` bound to the Rust sample type of a [`PixelType`]
macro_rules! with_pixel_type {
    ($pixel_type:expr, $t:ident => $body:expr) => {
        match $pixel_type {
            $crate::types::PixelType::UInt8 => {
                type $t = u8;
                $body
            }
            $crate::types::PixelType::UInt16 => {
                type $t = u16;
                $body
            }
            $crate::types::PixelType::Int16 => {
                type $t = i16;
                $body
            }
            $crate::types::PixelType::UInt32 => {
                type $t = u32;
                $body
            }
            $crate::types::PixelType::Int32 => {
                type $t = i32;
                $body
            }
            $crate::types::PixelType::Float32 => {
                type $t = f32;
                $body
            }
            $crate::types::PixelType::Float64 => {
                type $t = f64;
                $body
            }
        }
    };
}
pub(crate) use with_pixel_type;

/// How an output raster is created
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputOptions {
    /// GDAL driver short name
    pub driver: String,
    /// Value of the COMPRESS creation option (e.g. "DEFLATE", "LZW")
    pub compression: Option<String>,
}

impl Default for OutputOptions {
    fn default() -> Self {
        Self {
            driver: "GTiff".to_string(),
            compression: None,
        }
    }
}

/// Resampling kernels exposed to callers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResampleMethod {
    Nearest,
    Bilinear,
    Cubic,
    Average,
}

impl ResampleMethod {
    pub fn to_gdal(self) -> ResampleAlg {
        match self {
            ResampleMethod::Nearest => ResampleAlg::NearestNeighbour,
            ResampleMethod::Bilinear => ResampleAlg::Bilinear,
            ResampleMethod::Cubic => ResampleAlg::Cubic,
            ResampleMethod::Average => ResampleAlg::Average,
        }
    }
}

impl RasterMetadata {
    /// Read the metadata record of an open dataset
    pub fn from_dataset(dataset: &Dataset) -> StackResult<Self> {
        let (width, height) = dataset.raster_size();
        let band_count = usize::try_from(dataset.raster_count()).unwrap_or(0);
        if band_count == 0 {
            return Err(StackError::InvalidParameter(
                "raster has no bands".to_string(),
            ));
        }

        let band = dataset.rasterband(1)?;
        let pixel_type = PixelType::from_gdal(band.band_type())?;
        let nodata = band.no_data_value();

        // Rasters without georeferencing fall back to GDAL's identity transform
        let geo_transform = dataset
            .geo_transform()
            .map(GeoTransform::from_gdal)
            .unwrap_or_default();

        Ok(Self {
            width,
            height,
            band_count,
            pixel_type,
            geo_transform,
            projection: dataset.projection(),
            nodata,
        })
    }

    /// Open `path` just long enough to read its metadata record
    pub fn from_path<P: AsRef<Path>>(path: P) -> StackResult<Self> {
        let dataset = open_raster(path)?;
        Self::from_dataset(&dataset)
    }
}

pub fn open_raster<P: AsRef<Path>>(path: P) -> StackResult<Dataset> {
    log::debug!("Opening raster: {}", path.as_ref().display());
    Ok(Dataset::open(path.as_ref())?)
}

fn check_band_index(dataset: &Dataset, band_index: usize) -> StackResult<()> {
    let band_count = usize::try_from(dataset.raster_count()).unwrap_or(0);
    if band_index == 0 || band_index > band_count {
        return Err(StackError::InvalidParameter(format!(
            "band index {} out of range 1..={}",
            band_index, band_count
        )));
    }
    Ok(())
}

fn band_handle(dataset: &Dataset, band_index: usize) -> StackResult<gdal::raster::RasterBand<'_>> {
    check_band_index(dataset, band_index)?;
    let index = band_index
        .try_into()
        .map_err(|_| StackError::InvalidParameter(format!("band index {} too large", band_index)))?;
    Ok(dataset.rasterband(index)?)
}

/// Read band `band_index` (1-based) at full resolution
pub fn read_band<T: GdalType + Copy>(dataset: &Dataset, band_index: usize) -> StackResult<BandImage<T>> {
    let (width, height) = dataset.raster_size();
    read_into_shape(dataset, band_index, (height, width), None)
}

/// Read band `band_index` (1-based), letting GDAL resample it to `shape` (rows, cols)
pub fn read_band_resampled<T: GdalType + Copy>(
    dataset: &Dataset,
    band_index: usize,
    shape: (usize, usize),
    method: ResampleMethod,
) -> StackResult<BandImage<T>> {
    read_into_shape(dataset, band_index, shape, Some(method.to_gdal()))
}

fn read_into_shape<T: GdalType + Copy>(
    dataset: &Dataset,
    band_index: usize,
    shape: (usize, usize),
    resample: Option<ResampleAlg>,
) -> StackResult<BandImage<T>> {
    let (width, height) = dataset.raster_size();
    let (rows, cols) = shape;
    let band = band_handle(dataset, band_index)?;

    let buffer = band.read_as::<T>((0, 0), (width, height), (cols, rows), resample)?;
    Ok(Array2::from_shape_vec((rows, cols), buffer.data)?)
}

/// Description of band `band_index`, if one is set
pub fn band_description(dataset: &Dataset, band_index: usize) -> Option<String> {
    band_handle(dataset, band_index)
        .ok()
        .and_then(|band| band.description().ok())
        .filter(|description| !description.is_empty())
}

/// Create a dataset of sample type `T` laid out like `metadata`
pub fn create_output<T: GdalType, P: AsRef<Path>>(
    path: P,
    metadata: &RasterMetadata,
    options: &OutputOptions,
) -> StackResult<Dataset> {
    let path = path.as_ref();
    log::debug!(
        "Creating {} raster {}x{}x{} ({}) at {}",
        options.driver,
        metadata.width,
        metadata.height,
        metadata.band_count,
        metadata.pixel_type,
        path.display()
    );

    let too_large = |what: &str| StackError::InvalidParameter(format!("{} too large", what));
    let driver = DriverManager::get_driver_by_name(&options.driver)?;

    let creation_options: Vec<RasterCreationOption> = options
        .compression
        .as_deref()
        .map(|value| RasterCreationOption {
            key: "COMPRESS",
            value,
        })
        .into_iter()
        .collect();

    let mut dataset = driver.create_with_band_type_with_options::<T, _>(
        path,
        metadata.width.try_into().map_err(|_| too_large("width"))?,
        metadata.height.try_into().map_err(|_| too_large("height"))?,
        metadata.band_count.try_into().map_err(|_| too_large("band count"))?,
        &creation_options,
    )?;

    dataset.set_geo_transform(&metadata.geo_transform.to_gdal())?;
    if !metadata.projection.is_empty() {
        dataset.set_projection(&metadata.projection)?;
    }

    Ok(dataset)
}

/// Write one band into an output created by [`create_output`]
pub fn write_band<T: GdalType + Copy>(
    dataset: &Dataset,
    band_index: usize,
    data: &BandImage<T>,
    description: Option<&str>,
    nodata: Option<f64>,
) -> StackResult<()> {
    let (width, height) = dataset.raster_size();
    let (rows, cols) = data.dim();
    if (rows, cols) != (height, width) {
        return Err(StackError::Consistency(format!(
            "band {} is {}x{}, output is {}x{}",
            band_index, cols, rows, width, height
        )));
    }

    let mut band = band_handle(dataset, band_index)?;
    let flat_data: Vec<T> = data.iter().copied().collect();
    let buffer = Buffer::new((width, height), flat_data);
    band.write((0, 0), (width, height), &buffer)?;

    if let Some(name) = description {
        band.set_description(name)?;
    }
    if nodata.is_some() {
        band.set_no_data_value(nodata)?;
    }

    Ok(())
}

/// Staging location for an output that only becomes visible at `target` on commit.
///
/// GDAL writes into a hidden directory next to `target`, under the target's own
/// file name, so sidecars a driver adds (`.hdr`, `.aux.xml`, ...) are named for
/// the final output. Dropping the guard without committing deletes the directory
/// and everything written to it.
#[derive(Debug)]
pub struct OutputGuard {
    target: PathBuf,
    staged: PathBuf,
    staging: TempDir,
}

impl OutputGuard {
    pub fn new<P: AsRef<Path>>(target: P) -> StackResult<Self> {
        let target = target.as_ref().to_path_buf();
        let file_name = target.file_name().ok_or_else(|| {
            StackError::InvalidParameter(format!(
                "output path {} has no file name",
                target.display()
            ))
        })?;

        let staging = tempfile::Builder::new()
            .prefix(".s2stack-")
            .tempdir_in(output_dir(&target))?;
        let staged = staging.path().join(file_name);

        Ok(Self {
            target,
            staged,
            staging,
        })
    }

    /// Where the output is being written until commit
    pub fn path(&self) -> &Path {
        &self.staged
    }

    pub fn target(&self) -> &Path {
        &self.target
    }

    /// Move the finished output and its sidecars next to the final path.
    ///
    /// The output dataset must be closed first. The main file is moved last.
    pub fn commit(self) -> StackResult<PathBuf> {
        if !self.staged.is_file() {
            return Err(StackError::Processing(format!(
                "no output was written for {}",
                self.target.display()
            )));
        }

        let dir = output_dir(&self.target);
        for entry in fs::read_dir(self.staging.path())? {
            let path = entry?.path();
            if path == self.staged {
                continue;
            }
            if let Some(name) = path.file_name() {
                log::debug!("Moving sidecar {}", name.to_string_lossy());
                fs::rename(&path, dir.join(name))?;
            }
        }
        fs::rename(&self.staged, &self.target)?;
        self.staging.close()?;

        log::debug!("Committed output: {}", self.target.display());
        Ok(self.target)
    }
}

fn output_dir(target: &Path) -> PathBuf {
    match target.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
        _ => PathBuf::from("."),
    }
}
