use std::path::{Path, PathBuf};

use gdal_frmts::errors::GdalError;
use gdal_frmts::raster::{ColorInterpretation, GdalDataType};
use gdal_frmts::{config, Dataset, DriverManager, Metadata};

fn fixture(filename: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("fixtures")
        .join(filename)
}

#[test]
fn test_float_source_needs_conversion() {
    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("converted.png");
    let source = Dataset::open(fixture("envi_bip_float32.img")).unwrap();
    let png = DriverManager::get_driver_by_name("PNG").unwrap();

    config::set_error_handler(|_, _, _| {});
    let strict = png.create_copy(&target, &source, true, &Default::default());
    assert!(matches!(strict, Err(GdalError::NotSupported(_))));

    let copy = png
        .create_copy(&target, &source, false, &Default::default())
        .unwrap();
    config::remove_error_handler();

    assert_eq!(copy.raster_size(), (3, 2));
    assert_eq!(copy.raster_count(), 3);
    let interps: Vec<_> = copy
        .rasterbands()
        .map(|band| band.color_interpretation())
        .collect();
    assert_eq!(
        interps,
        [
            ColorInterpretation::RedBand,
            ColorInterpretation::GreenBand,
            ColorInterpretation::BlueBand
        ]
    );
    let green = copy.rasterband(2).unwrap();
    assert_eq!(green.band_type(), GdalDataType::UInt8);
    // 1 + 0.5 * x + 10 * y, rounded half away from zero
    assert_eq!(
        green.read_band_as::<u8>().unwrap().data,
        vec![1, 2, 2, 11, 12, 12]
    );
}

#[test]
fn test_png_to_envi_and_back() {
    let dir = tempfile::tempdir().unwrap();
    let envi_path = dir.path().join("palette.img");
    let png_path = dir.path().join("palette.png");

    let source = Dataset::open(fixture("palette4.png")).unwrap();
    let envi = DriverManager::get_driver_by_name("ENVI").unwrap();
    let copy = source
        .create_copy(&envi, &envi_path, &Default::default())
        .unwrap();
    copy.close().unwrap();
    assert!(dir.path().join("palette.hdr").exists());

    let reopened = Dataset::open(&envi_path).unwrap();
    assert_eq!(reopened.driver().short_name(), "ENVI");
    assert_eq!(
        reopened.metadata_item("interleave", "ENVI"),
        Some("bsq".to_string())
    );

    let png = DriverManager::get_driver_by_name("PNG").unwrap();
    let back = reopened
        .create_copy(&png, &png_path, &[("NBITS", "4")].into())
        .unwrap();
    let band = back.rasterband(1).unwrap();
    assert_eq!(band.color_interpretation(), ColorInterpretation::GrayIndex);
    assert_eq!(
        band.metadata_item("NBITS", "IMAGE_STRUCTURE"),
        Some("4".to_string())
    );
    assert_eq!(
        band.read_band_as::<u8>().unwrap(),
        source.rasterband(1).unwrap().read_band_as::<u8>().unwrap()
    );
}
