use gdal_frmts::{DriverCapabilities, DriverManager};

#[test]
fn test_get_driver() {
    let driver = DriverManager::get_driver_by_name("PNG").unwrap();
    assert_eq!(driver.short_name(), "PNG");
    assert_eq!(driver.long_name(), "Portable Network Graphics");
    assert!(driver
        .capabilities()
        .contains(DriverCapabilities::RASTER | DriverCapabilities::VIRTUAL_IO));

    let driver = DriverManager::get_driver_by_name("ENVI").unwrap();
    assert_eq!(driver.short_name(), "ENVI");
    assert_eq!(driver.long_name(), "ENVI .hdr Labelled");

    assert!(DriverManager::count() > 0);
    assert!(DriverManager::get_driver(0).is_ok());
    assert!(DriverManager::get_driver(DriverManager::count()).is_err());
}

#[test]
fn test_get_driver_for_file() {
    let fixtures = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("fixtures");

    let driver = DriverManager::get_driver_for_file(fixtures.join("gray1.png")).unwrap();
    assert_eq!(driver.short_name(), "PNG");

    let driver = DriverManager::get_driver_for_file(fixtures.join("envi_bsq_byte.dat")).unwrap();
    assert_eq!(driver.short_name(), "ENVI");

    assert!(DriverManager::get_driver_for_file(fixtures.join("no_such_file.tif")).is_none());
}
