use gdal::raster::GdalDataType;
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Single band of samples (rows x cols)
pub type BandImage<T> = Array2<T>;

/// Single bit plane, one 0/1 sample per pixel
pub type BitPlane = Array2<u8>;

/// Sentinel-2 product resolutions in meters
pub const SUPPORTED_RESOLUTIONS: [u32; 3] = [10, 20, 60];

/// Pixel sample types the raster operations understand
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PixelType {
    UInt8,
    UInt16,
    Int16,
    UInt32,
    Int32,
    Float32,
    Float64,
}

impl PixelType {
    /// Map a GDAL band type onto a supported pixel type
    pub fn from_gdal(data_type: GdalDataType) -> StackResult<Self> {
        match data_type {
            GdalDataType::UInt8 => Ok(PixelType::UInt8),
            GdalDataType::UInt16 => Ok(PixelType::UInt16),
            GdalDataType::Int16 => Ok(PixelType::Int16),
            GdalDataType::UInt32 => Ok(PixelType::UInt32),
            GdalDataType::Int32 => Ok(PixelType::Int32),
            GdalDataType::Float32 => Ok(PixelType::Float32),
            GdalDataType::Float64 => Ok(PixelType::Float64),
            other => Err(StackError::UnsupportedDataType(format!("{:?}", other))),
        }
    }

    /// Width of one sample in bits
    pub fn bit_depth(&self) -> u32 {
        match self {
            PixelType::UInt8 => 8,
            PixelType::UInt16 | PixelType::Int16 => 16,
            PixelType::UInt32 | PixelType::Int32 | PixelType::Float32 => 32,
            PixelType::Float64 => 64,
        }
    }

    pub fn is_integer(&self) -> bool {
        !matches!(self, PixelType::Float32 | PixelType::Float64)
    }
}

impl std::fmt::Display for PixelType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            PixelType::UInt8 => "uint8",
            PixelType::UInt16 => "uint16",
            PixelType::Int16 => "int16",
            PixelType::UInt32 => "uint32",
            PixelType::Int32 => "int32",
            PixelType::Float32 => "float32",
            PixelType::Float64 => "float64",
        };
        write!(f, "{}", name)
    }
}

/// Affine pixel-to-world transform, in GDAL coefficient order
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoTransform {
    pub top_left_x: f64,
    pub pixel_width: f64,
    pub rotation_x: f64,
    pub top_left_y: f64,
    pub rotation_y: f64,
    pub pixel_height: f64,
}

impl GeoTransform {
    pub fn from_gdal(gt: [f64; 6]) -> Self {
        Self {
            top_left_x: gt[0],
            pixel_width: gt[1],
            rotation_x: gt[2],
            top_left_y: gt[3],
            rotation_y: gt[4],
            pixel_height: gt[5],
        }
    }

    pub fn to_gdal(&self) -> [f64; 6] {
        [
            self.top_left_x,
            self.pixel_width,
            self.rotation_x,
            self.top_left_y,
            self.rotation_y,
            self.pixel_height,
        ]
    }

    /// Ground size of one pixel as (x, y), both positive for north-up rasters
    pub fn pixel_size(&self) -> (f64, f64) {
        (self.pixel_width, -self.pixel_height)
    }

    /// Compose with a pixel-space scale: each output pixel covers
    /// `scale_x` by `scale_y` input pixels. The origin is unchanged.
    pub fn scaled(&self, scale_x: f64, scale_y: f64) -> Self {
        Self {
            top_left_x: self.top_left_x,
            pixel_width: self.pixel_width * scale_x,
            rotation_x: self.rotation_x * scale_y,
            top_left_y: self.top_left_y,
            rotation_y: self.rotation_y * scale_x,
            pixel_height: self.pixel_height * scale_y,
        }
    }

    /// Coefficient-wise comparison with a small relative tolerance
    pub fn approx_eq(&self, other: &GeoTransform) -> bool {
        self.to_gdal()
            .iter()
            .zip(other.to_gdal().iter())
            .all(|(a, b)| (a - b).abs() <= 1e-9 * a.abs().max(b.abs()).max(1.0))
    }
}

impl Default for GeoTransform {
    /// GDAL's default for rasters without georeferencing
    fn default() -> Self {
        Self::from_gdal([0.0, 1.0, 0.0, 0.0, 0.0, 1.0])
    }
}

/// Driver-independent raster descriptor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RasterMetadata {
    pub width: usize,
    pub height: usize,
    pub band_count: usize,
    pub pixel_type: PixelType,
    pub geo_transform: GeoTransform,
    /// Coordinate system as WKT, empty when the source has none
    pub projection: String,
    /// Nodata value of band 1, if any
    pub nodata: Option<f64>,
}

impl RasterMetadata {
    pub fn with_band_count(&self, band_count: usize) -> Self {
        Self {
            band_count,
            ..self.clone()
        }
    }

    pub fn with_pixel_type(&self, pixel_type: PixelType) -> Self {
        Self {
            pixel_type,
            ..self.clone()
        }
    }

    /// (rows, cols), matching ndarray's shape convention
    pub fn shape(&self) -> (usize, usize) {
        (self.height, self.width)
    }

    /// Check that `other` lies on the same pixel grid with the same sample type
    pub fn check_compatible(&self, other: &RasterMetadata, label: &str) -> StackResult<()> {
        if self.width != other.width || self.height != other.height {
            return Err(StackError::Consistency(format!(
                "{}: dimension mismatch, expected {}x{}, found {}x{}",
                label, self.width, self.height, other.width, other.height
            )));
        }
        if !self.geo_transform.approx_eq(&other.geo_transform) {
            return Err(StackError::Consistency(format!(
                "{}: transform mismatch, expected {:?}, found {:?}",
                label,
                self.geo_transform.to_gdal(),
                other.geo_transform.to_gdal()
            )));
        }
        if self.projection != other.projection {
            return Err(StackError::Consistency(format!(
                "{}: coordinate system differs from the reference band",
                label
            )));
        }
        if self.pixel_type != other.pixel_type {
            return Err(StackError::Consistency(format!(
                "{}: data type mismatch, expected {}, found {}",
                label, self.pixel_type, other.pixel_type
            )));
        }
        Ok(())
    }
}

/// One single-band source file of a stack
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BandFile {
    pub path: PathBuf,
    /// Sentinel-2 band token parsed from the file name (e.g. "B02")
    pub band_name: Option<String>,
}

/// Result of a completed stacking run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StackSummary {
    pub output_path: PathBuf,
    /// Input files in output band order (index 0 is band 1)
    pub bands: Vec<BandFile>,
    pub metadata: RasterMetadata,
}

/// Error types for raster operations
#[derive(Debug, thiserror::Error)]
pub enum StackError {
    #[error("No .{} files found at resolution {}m in {}", .extension, .resolution, .folder.display())]
    MissingInput {
        folder: PathBuf,
        resolution: u32,
        extension: String,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("GDAL error: {0}")]
    Gdal(#[from] gdal::errors::GdalError),

    #[error("Array shape error: {0}")]
    Shape(#[from] ndarray::ShapeError),

    #[error("Granule layout error: {0}")]
    GranuleLayout(String),

    #[error("Consistency error: {0}")]
    Consistency(String),

    #[error("Unsupported data type: {0}")]
    UnsupportedDataType(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Processing error: {0}")]
    Processing(String),
}

/// Result type for raster operations
pub type StackResult<T> = Result<T, StackError>;
