mod common;

use approx::assert_relative_eq;
use common::{band_data, init_logging, write_raster, write_single_band, ORIGIN_X, ORIGIN_Y};
use ndarray::Array2;
use s2stack::io::raster::{create_output, open_raster, read_band, write_band};
use s2stack::{
    extract_bit_planes, reduce_radiometric_resolution, resample_spatial_resolution, PixelType,
    OutputOptions, RadiometricParams, RasterMetadata, ResampleMethod, ResampleParams, StackError,
};
use tempfile::TempDir;

#[test]
fn test_bit_planes_written_as_uint8_bands() {
    init_logging();
    let dir = TempDir::new().expect("Failed to create temp directory");
    let input = dir.path().join("stack.tif");
    let data = band_data(3, 8, 8);
    write_raster(&input, &[band_data(1, 8, 8), data.clone()], 10.0);

    let output = dir.path().join("bit_planes.tif");
    let planes = extract_bit_planes(&input, 2, Some(output.as_path()))
        .expect("Failed to extract bit planes");
    assert_eq!(planes.len(), 16);

    let written = RasterMetadata::from_path(&output).expect("Failed to read output metadata");
    assert_eq!(written.band_count, 16);
    assert_eq!(written.pixel_type, PixelType::UInt8);
    assert_eq!(written.shape(), (8, 8));
    let source = RasterMetadata::from_path(&input).expect("Failed to read input metadata");
    assert_eq!(written.geo_transform, source.geo_transform);

    let dataset = open_raster(&output).expect("Failed to open output");
    let mut rebuilt = Array2::<u16>::zeros((8, 8));
    for bit in 0..16 {
        let plane = read_band::<u8>(&dataset, bit + 1).expect("Failed to read plane");
        assert_eq!(plane, planes[bit]);
        assert!(plane.iter().all(|&v| v <= 1));
        rebuilt.zip_mut_with(&plane, |acc, &b| *acc |= (b as u16) << bit);
    }
    assert_eq!(rebuilt, data);
}

#[test]
fn test_bit_planes_without_output() {
    let dir = TempDir::new().expect("Failed to create temp directory");
    let input = dir.path().join("band.tif");
    write_single_band(&input, &Array2::from_elem((4, 4), 0b101u8), 10.0);

    let planes = extract_bit_planes(&input, 1, None).expect("Failed to extract bit planes");
    assert_eq!(planes.len(), 8);
    assert!(planes[0].iter().all(|&v| v == 1));
    assert!(planes[1].iter().all(|&v| v == 0));
    assert!(planes[2].iter().all(|&v| v == 1));
}

#[test]
fn test_bit_planes_reject_float_and_bad_index() {
    let dir = TempDir::new().expect("Failed to create temp directory");
    let float_input = dir.path().join("reflectance.tif");
    write_single_band(&float_input, &Array2::from_elem((4, 4), 0.25f32), 10.0);

    let output = dir.path().join("planes.tif");
    let err = extract_bit_planes(&float_input, 1, Some(output.as_path()))
        .expect_err("Float bands have no bit planes");
    assert!(matches!(err, StackError::UnsupportedDataType(_)));
    assert!(!output.exists());

    let int_input = dir.path().join("band.tif");
    write_single_band(&int_input, &band_data(1, 4, 4), 10.0);
    let err = extract_bit_planes(&int_input, 3, None).expect_err("Band 3 does not exist");
    assert!(matches!(err, StackError::InvalidParameter(_)));
}

#[test]
fn test_resample_ten_to_twenty_meters() {
    init_logging();
    let dir = TempDir::new().expect("Failed to create temp directory");
    let input = dir.path().join("stack_10m.tif");
    let constant = Array2::from_elem((20, 30), 1200u16);
    write_raster(&input, &[constant.clone(), band_data(2, 20, 30)], 10.0);

    let output = dir.path().join("stack_20m.tif");
    let metadata = resample_spatial_resolution(&input, 20.0, &output, &ResampleParams::default())
        .expect("Failed to resample");

    assert_eq!(metadata.shape(), (10, 15));
    let written = RasterMetadata::from_path(&output).expect("Failed to read output metadata");
    assert_eq!(written.shape(), (10, 15));
    assert_eq!(written.band_count, 2);
    assert_eq!(written.pixel_type, PixelType::UInt16);
    assert_relative_eq!(written.geo_transform.pixel_width, 20.0);
    assert_relative_eq!(written.geo_transform.pixel_height, -20.0);
    assert_relative_eq!(written.geo_transform.top_left_x, ORIGIN_X);
    assert_relative_eq!(written.geo_transform.top_left_y, ORIGIN_Y);

    // A constant field stays constant under bilinear resampling
    let dataset = open_raster(&output).expect("Failed to open output");
    let band = read_band::<u16>(&dataset, 1).expect("Failed to read band 1");
    assert!(band.iter().all(|&v| v == 1200));
}

#[test]
fn test_resample_honours_requested_resolution() {
    let dir = TempDir::new().expect("Failed to create temp directory");
    let input = dir.path().join("band_10m.tif");
    write_single_band(&input, &band_data(1, 12, 12), 10.0);

    let params = ResampleParams {
        method: ResampleMethod::Nearest,
        ..ResampleParams::default()
    };
    let output = dir.path().join("band_60m.tif");
    let metadata =
        resample_spatial_resolution(&input, 60.0, &output, &params).expect("Failed to resample");

    assert_eq!(metadata.shape(), (2, 2));
    assert_relative_eq!(metadata.geo_transform.pixel_width, 60.0);

    let err = resample_spatial_resolution(&input, -20.0, dir.path().join("bad.tif"), &params)
        .expect_err("Negative resolution is invalid");
    assert!(matches!(err, StackError::InvalidParameter(_)));
    assert!(!dir.path().join("bad.tif").exists());
}

#[test]
fn test_radiometric_reduction_to_eight_bits() {
    init_logging();
    let dir = TempDir::new().expect("Failed to create temp directory");
    let input = dir.path().join("reflectance.tif");
    let band = Array2::from_shape_vec((2, 3), vec![0u16, 5000, 10000, 12000, 40, 2000])
        .expect("Failed to build band");
    write_raster(&input, &[band.clone(), band], 10.0);

    let output = dir.path().join("reflectance_8bit.tif");
    let metadata = reduce_radiometric_resolution(&input, &output, &RadiometricParams::default())
        .expect("Failed to reduce radiometric resolution");
    assert_eq!(metadata.pixel_type, PixelType::UInt8);
    assert_eq!(metadata.band_count, 2);

    let written = RasterMetadata::from_path(&output).expect("Failed to read output metadata");
    assert_eq!(written.pixel_type, PixelType::UInt8);
    assert_eq!(written.band_count, 2);

    let dataset = open_raster(&output).expect("Failed to open output");
    let scaled = read_band::<u8>(&dataset, 2).expect("Failed to read band 2");
    let expected = Array2::from_shape_vec((2, 3), vec![0u8, 127, 255, 255, 1, 51])
        .expect("Failed to build expected band");
    assert_eq!(scaled, expected);
}

#[test]
fn test_radiometric_reduction_scales_nodata() {
    let dir = TempDir::new().expect("Failed to create temp directory");
    let band = Array2::from_shape_vec((1, 3), vec![10000u16, 0, 5000])
        .expect("Failed to build band");

    let cases = [(10000.0, 255.0), (0.0, 0.0)];
    for (i, (nodata, expected)) in cases.into_iter().enumerate() {
        let input = dir.path().join(format!("masked_{}.tif", i));
        write_single_band(&input, &band, 10.0);
        let metadata = RasterMetadata::from_path(&input).expect("Failed to read input metadata");
        let masked = dir.path().join(format!("masked_nodata_{}.tif", i));
        {
            let dataset = create_output::<u16, _>(&masked, &metadata, &OutputOptions::default())
                .expect("Failed to create masked input");
            write_band(&dataset, 1, &band, None, Some(nodata)).expect("Failed to write band");
        }

        let output = dir.path().join(format!("masked_8bit_{}.tif", i));
        let reduced = reduce_radiometric_resolution(&masked, &output, &RadiometricParams::default())
            .expect("Failed to reduce radiometric resolution");
        assert_eq!(reduced.nodata, Some(expected));

        let written = RasterMetadata::from_path(&output).expect("Failed to read output metadata");
        assert_eq!(written.nodata, Some(expected));
    }
}

#[test]
fn test_missing_input_is_gdal_error() {
    let dir = TempDir::new().expect("Failed to create temp directory");
    let output = dir.path().join("out.tif");

    let err = reduce_radiometric_resolution(
        dir.path().join("missing.tif"),
        &output,
        &RadiometricParams::default(),
    )
    .expect_err("Missing input should fail");
    assert!(matches!(err, StackError::Gdal(_)));
    assert!(!output.exists());
}
