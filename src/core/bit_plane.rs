use crate::io::raster::{create_output, open_raster, read_band, write_band, OutputGuard, OutputOptions};
use crate::types::{BandImage, BitPlane, PixelType, RasterMetadata, StackError, StackResult};
use gdal::raster::GdalType;
use ndarray::Zip;
use std::path::Path;

/// Integer sample whose bits can be split into planes.
///
/// Signed samples expose their two's complement bit pattern.
pub trait BitSample: Copy + Send + Sync {
    const BITS: u32;

    /// Value of bit `bit` (0 = least significant) as 0 or 1
    fn bit(self, bit: u32) -> u8;
}

macro_rules! impl_bit_sample {
    ($($t:ty => $unsigned:ty),* $(,)?) => {
        $(
            impl BitSample for $t {
                const BITS: u32 = <$t>::BITS;

                #[inline]
                fn bit(self, bit: u32) -> u8 {
                    (((self as $unsigned) >> bit) & 1) as u8
                }
            }
        )*
    };
}

impl_bit_sample!(u8 => u8, u16 => u16, i16 => u16, u32 => u32, i32 => u32);

/// Extract bit plane `bit` of `band`
pub fn bit_plane<T: BitSample>(band: &BandImage<T>, bit: u32) -> BitPlane {
    #[cfg(feature = "parallel")]
    {
        Zip::from(band).par_map_collect(|&value| value.bit(bit))
    }
    #[cfg(not(feature = "parallel"))]
    {
        Zip::from(band).map_collect(|&value| value.bit(bit))
    }
}

/// All bit planes of `band`, least significant first
pub fn bit_planes<T: BitSample>(band: &BandImage<T>) -> Vec<BitPlane> {
    (0..T::BITS).map(|bit| bit_plane(band, bit)).collect()
}

fn planes_of<T: BitSample + GdalType>(
    dataset: &gdal::Dataset,
    band_index: usize,
) -> StackResult<Vec<BitPlane>> {
    let band = read_band::<T>(dataset, band_index)?;
    Ok(bit_planes(&band))
}

/// Split band `band_index` (1-based) of `input` into its bit planes.
///
/// The bit depth is the width of the band's integer type. When `output` is
/// given the planes are also written there as a UInt8 raster, plane `k`
/// becoming band `k + 1`.
pub fn extract_bit_planes<P: AsRef<Path>>(
    input: P,
    band_index: usize,
    output: Option<&Path>,
) -> StackResult<Vec<BitPlane>> {
    let input = input.as_ref();
    log::info!("Extracting bit planes of band {} from: {}", band_index, input.display());

    let (metadata, planes) = {
        let dataset = open_raster(input)?;
        let metadata = RasterMetadata::from_dataset(&dataset)?;
        log::debug!(
            "Input dtype: {}, bit depth: {}",
            metadata.pixel_type,
            metadata.pixel_type.bit_depth()
        );

        let planes = match metadata.pixel_type {
            PixelType::UInt8 => planes_of::<u8>(&dataset, band_index)?,
            PixelType::UInt16 => planes_of::<u16>(&dataset, band_index)?,
            PixelType::Int16 => planes_of::<i16>(&dataset, band_index)?,
            PixelType::UInt32 => planes_of::<u32>(&dataset, band_index)?,
            PixelType::Int32 => planes_of::<i32>(&dataset, band_index)?,
            other => {
                return Err(StackError::UnsupportedDataType(format!(
                    "bit planes need an integer band, found {}",
                    other
                )))
            }
        };
        (metadata, planes)
    };

    if let Some(output) = output {
        let out_metadata = RasterMetadata {
            nodata: None,
            ..metadata
                .with_pixel_type(PixelType::UInt8)
                .with_band_count(planes.len())
        };

        let guard = OutputGuard::new(output)?;
        {
            let options = OutputOptions::default();
            let dataset = create_output::<u8, _>(guard.path(), &out_metadata, &options)?;
            for (bit, plane) in planes.iter().enumerate() {
                let description = format!("bit {}", bit);
                write_band(&dataset, bit + 1, plane, Some(description.as_str()), None)?;
            }
        }
        let output_path = guard.commit()?;
        log::info!("Saved {} bit planes to {}", planes.len(), output_path.display());
    }

    Ok(planes)
}
