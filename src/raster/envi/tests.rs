use std::path::Path;

use crate::cpl::CslStringList;
use crate::dataset::OpenInfo;
use crate::errors::GdalError;
use crate::metadata::Metadata;
use crate::options::{Access, GdalOpenFlags};
use crate::raster::envi::header::{data_type_code, data_type_from_code, leading_float, leading_int};
use crate::raster::envi::mapinfo::esri_to_usgs_zone;
use crate::raster::envi::raw::swap_components;
use crate::raster::envi::{split_list, EnviDataset, EnviHeader, Interleave, MapInfo, MapProjection};
use crate::raster::{Buffer, GdalDataType};
use crate::test_utils::{fixture, InMemoryFixture, SuppressGDALErrorLog, TempFixture};
use crate::{assert_near, vsi};
use crate::{Dataset, DatasetOptions, DriverManager};

fn open_update<P: AsRef<Path>>(path: P) -> Dataset {
    Dataset::open_ex(
        path,
        DatasetOptions {
            open_flags: GdalOpenFlags::GDAL_OF_UPDATE,
            ..DatasetOptions::default()
        },
    )
    .unwrap()
}

/// Copies a fixture and its header into a scratch directory.
fn staged(data: &str, header: &str) -> TempFixture {
    let staging = TempFixture::fixture(data);
    std::fs::copy(fixture(header), staging.sibling(header)).unwrap();
    staging
}

#[test]
fn test_split_list() {
    assert_eq!(
        split_list("{a, b , c}"),
        Some(vec!["a".to_string(), "b".to_string(), "c".to_string()])
    );
    assert_eq!(split_list("{ single }"), Some(vec!["single".to_string()]));
    // The unterminated last field is dropped.
    assert_eq!(split_list("{a, b"), Some(vec!["a".to_string()]));
    assert_eq!(split_list("a, b"), None);
}

#[test]
fn test_leading_numbers() {
    assert_eq!(leading_int(" 12 bytes"), 12);
    assert_eq!(leading_int("-3"), -3);
    assert_eq!(leading_int("bsq"), 0);
    assert_near!(leading_float("60.5"), 60.5);
    assert_near!(leading_float("1.5e3m"), 1500.0);
    assert_near!(leading_float("North"), 0.0);
}

#[test]
fn test_parse_header() {
    let header = EnviHeader::parse(
        "ENVI\n\
         Samples = 10\n\
         this line is ignored\n\
         band names = {\n\
           first,\n\
           second}\n\
         Header Offset =  128\n",
    )
    .unwrap();
    assert_eq!(header.get_int("samples"), 10);
    assert_eq!(header.get_int("header_offset"), 128);
    assert_eq!(header.get("band_names"), Some("{first,second}"));
    assert_eq!(header.entries().len(), 3);

    let text = header.to_text();
    assert!(text.starts_with("ENVI\n"));
    assert!(text.contains("header offset = 128\n"));
    assert_eq!(EnviHeader::parse(&text).unwrap(), header);
}

#[test]
fn test_parse_header_requires_magic() {
    let result = EnviHeader::parse("samples = 4\nlines = 4\n");
    assert!(matches!(result, Err(GdalError::FormatError(_))));
}

#[test]
fn test_interleave_offsets() {
    assert_eq!(Interleave::from_name(" BIL "), Some(Interleave::Bil));
    assert_eq!(Interleave::from_name("tiled"), None);
    assert_eq!(Interleave::Bsq.offsets(2, 4, 3, 2), (2, 8, 24));
    assert_eq!(Interleave::Bil.offsets(2, 4, 3, 2), (2, 16, 8));
    assert_eq!(Interleave::Bip.offsets(2, 4, 3, 2), (4, 16, 2));
}

#[test]
fn test_data_type_codes() {
    for &data_type in GdalDataType::available_types() {
        let code = data_type_code(data_type);
        assert_eq!(data_type_from_code(code.into()).unwrap(), data_type);
    }
    assert!(matches!(
        data_type_from_code(7),
        Err(GdalError::FormatError(_))
    ));
}

#[test]
fn test_swap_components() {
    let mut complex = [1, 2, 3, 4, 5, 6, 7, 8];
    swap_components(&mut complex, 4);
    assert_eq!(complex, [4, 3, 2, 1, 8, 7, 6, 5]);

    let mut bytes = [1, 2, 3];
    swap_components(&mut bytes, 1);
    assert_eq!(bytes, [1, 2, 3]);
}

#[test]
fn test_esri_to_usgs_zone() {
    assert_eq!(esri_to_usgs_zone(3101), 101);
    assert_eq!(esri_to_usgs_zone(4001), 1602);
    assert_eq!(esri_to_usgs_zone(6051), 5201);
    assert_eq!(esri_to_usgs_zone(0), 0);
    assert_eq!(esri_to_usgs_zone(1234), 0);
}

#[test]
fn test_map_info_utm_south() {
    let info = MapInfo::parse("{UTM, 1, 1, 500000, 7000000, 30, 30, 33, South, WGS-84}").unwrap();
    assert_eq!(info.geo_transform, [500000.0, 30.0, 0.0, 7000000.0, 0.0, -30.0]);
    assert_eq!(
        info.projection,
        MapProjection::Utm {
            zone: 33,
            north: false
        }
    );
    let wkt = info.to_wkt();
    assert!(wkt.starts_with("PROJCS[\"UTM Zone 33, Southern Hemisphere\""));
    assert!(wkt.contains("PARAMETER[\"central_meridian\",15]"));
    assert!(wkt.contains("PARAMETER[\"false_northing\",10000000]"));

    assert_eq!(MapInfo::parse(&info.to_header_value()), Some(info));
}

#[test]
fn test_map_info_local_and_short() {
    let info = MapInfo::parse("{Arbitrary, 1, 1, 0, 0, 1, 1, units=Feet}").unwrap();
    assert!(info.units_feet);
    assert_eq!(
        info.to_wkt(),
        "LOCAL_CS[\"Arbitrary\",UNIT[\"US survey foot\",0.3048006096012192]]"
    );

    let unknown_zone = MapInfo::parse("{State Plane (NAD 27), 1, 1, 0, 0, 1, 1, 9}").unwrap();
    assert_eq!(
        unknown_zone.projection,
        MapProjection::StatePlane {
            usgs_zone: 0,
            nad83: false
        }
    );
    assert_eq!(unknown_zone.to_wkt(), "LOCAL_CS[\"State Plane (NAD 27)\"]");

    assert_eq!(MapInfo::parse("{UTM, 1, 1, 0, 0, 1}"), None);
    assert_eq!(MapInfo::parse("UTM, 1, 1, 0, 0, 1, 1"), None);
}

#[test]
fn test_open_bil_big_endian() {
    let dataset = Dataset::open(fixture("envi_bil_int16")).unwrap();
    assert_eq!(dataset.driver().short_name(), "ENVI");
    assert_eq!(dataset.raster_size(), (4, 3));
    assert_eq!(dataset.raster_count(), 2);
    assert_eq!(
        dataset.metadata_item("file_type", "ENVI"),
        Some("ENVI Standard".to_string())
    );

    let red = dataset.rasterband(1).unwrap();
    let nir = dataset.rasterband(2).unwrap();
    assert_eq!(red.band_type(), GdalDataType::Int16);
    assert_eq!(red.block_size(), (4, 1));
    assert_eq!(red.description().unwrap(), "Red band");
    assert_eq!(nir.description().unwrap(), "NIR band");
    assert_eq!(nir.no_data_value(), Some(-9999.0));

    let pixels = nir.read_band_as::<i16>().unwrap();
    assert_eq!(pixels.row(0), &[-9999, 201, 202, 203]);
    assert_eq!(pixels.row(2), &[220, 221, 222, 223]);
    let window = red.read_as::<i16>((1, 1), (2, 2), (2, 2)).unwrap();
    assert_eq!(window.data, vec![111, 112, 121, 122]);

    assert_eq!(
        dataset.geo_transform().unwrap(),
        [440720.0, 60.0, 0.0, 3751320.0, 0.0, -60.0]
    );
    let projection = dataset.projection();
    assert!(projection.starts_with("PROJCS[\"UTM Zone 11, Northern Hemisphere\""));
    assert!(projection.contains("PARAMETER[\"central_meridian\",-117]"));
}

#[test]
fn test_open_bip_with_header_offset() {
    let dataset = Dataset::open(fixture("envi_bip_float32.img")).unwrap();
    assert_eq!(dataset.raster_size(), (3, 2));
    for band in dataset.rasterbands() {
        let b = (band.band_index() - 1) as f32;
        let pixels = band.read_band_as::<f32>().unwrap();
        let expected: Vec<f32> = (0..2)
            .flat_map(|y| (0..3).map(move |x| b + 0.5 * x as f32 + 10.0 * y as f32))
            .collect();
        assert_eq!(pixels.data, expected);
    }
    assert_eq!(
        dataset.geo_transform().unwrap(),
        [1000.0, 2.5, 0.0, 2000.0, 0.0, -2.5]
    );
    let projection = dataset.projection();
    assert!(projection.starts_with("PROJCS[\"NAD83 / State Plane zone 1602\""));
    assert!(projection.contains("US survey foot"));
}

#[test]
fn test_open_bsq_with_upper_case_header() {
    let dataset = Dataset::open(fixture("envi_bsq_byte.dat")).unwrap();
    let band = dataset.rasterband(1).unwrap();
    assert_eq!(band.band_type(), GdalDataType::UInt8);
    let pixels = band.read_band_as::<u8>().unwrap();
    assert_eq!(pixels.data, (0..20).collect::<Vec<u8>>());
    assert!(dataset.geo_transform().is_err());
    assert_eq!(dataset.projection(), "");
}

#[test]
fn test_backend_accessors() {
    let info = OpenInfo::new(
        &fixture("envi_bil_int16"),
        Access::ReadOnly,
        CslStringList::new(),
    );
    let dataset = EnviDataset::open(&info).unwrap();
    assert_eq!(dataset.header().get("interleave"), Some("bil"));
    let layout = dataset.layout();
    assert_eq!(
        (layout.pixel_offset, layout.line_offset, layout.band_offset),
        (2, 16, 8)
    );
    assert_eq!(layout.native_order, cfg!(target_endian = "big"));
    assert!(matches!(
        dataset.map_info().map(|info| &info.projection),
        Some(MapProjection::Utm {
            zone: 11,
            north: true
        })
    ));
}

#[test]
fn test_selecting_the_header_names_the_data_file() {
    let _nolog = SuppressGDALErrorLog::new();
    let result = Dataset::open(fixture("envi_bil_int16.hdr"));
    match result {
        Err(GdalError::OpenFailed { msg, .. }) => {
            assert!(msg.contains("ENVI header file"));
            let data = fixture("envi_bil_int16");
            assert!(msg.contains(&format!("({})", data.display())));
        }
        other => panic!("unexpected result: {other:?}"),
    }
}

#[test]
fn test_missing_keywords() {
    let _nolog = SuppressGDALErrorLog::new();
    let result = Dataset::open(fixture("envi_missing.raw"));
    match result {
        Err(GdalError::FormatError(msg)) => assert!(msg.contains("appears to be missing")),
        other => panic!("unexpected result: {other:?}"),
    }
}

#[test]
fn test_read_only_dataset_rejects_writes() {
    let _nolog = SuppressGDALErrorLog::new();
    let dataset = Dataset::open(fixture("envi_bsq_byte.dat")).unwrap();
    let mut band = dataset.rasterband(1).unwrap();
    let result = band.write((0, 0), (5, 1), &Buffer::new((5, 1), vec![1u8; 5]));
    assert!(matches!(result, Err(GdalError::CplError { .. })));
}

#[test]
fn test_create_write_and_reopen() {
    let fixture = TempFixture::empty("created.img");
    let driver = DriverManager::get_driver_by_name("ENVI").unwrap();
    let mut dataset = driver
        .create_with_band_type::<f32, _>(fixture.path(), 3, 2, 2)
        .unwrap();
    assert_eq!(dataset.access(), Access::Update);

    // Bands may be written in any order.
    let second = Buffer::new((3, 2), vec![-1.5f32, 0.0, 1.5, 3.0, 4.5, 6.0]);
    dataset
        .rasterband(2)
        .unwrap()
        .write((0, 0), (3, 2), &second)
        .unwrap();
    dataset
        .rasterband(1)
        .unwrap()
        .write((1, 1), (1, 1), &Buffer::new((1, 1), vec![42.0f32]))
        .unwrap();
    dataset
        .rasterband(1)
        .unwrap()
        .set_description("first")
        .unwrap();
    dataset
        .rasterband(2)
        .unwrap()
        .set_description("second")
        .unwrap();
    dataset
        .set_geo_transform(&[10.0, 0.5, 0.0, 20.0, 0.0, -0.5])
        .unwrap();
    dataset.close().unwrap();

    let header = std::fs::read_to_string(fixture.sibling("created.hdr")).unwrap();
    assert!(header.starts_with("ENVI\n"));
    assert!(header.contains("data type = 4\n"));
    assert!(header.contains("interleave = bsq\n"));
    assert!(header.contains("band names = {\nfirst,\nsecond}\n"));
    assert!(header.contains("map info = {Arbitrary, 1, 1, 10, 20, 0.5, 0.5}\n"));

    let dataset = Dataset::open(fixture.path()).unwrap();
    assert_eq!(dataset.raster_size(), (3, 2));
    let first = dataset.rasterband(1).unwrap();
    assert_eq!(first.description().unwrap(), "first");
    assert_eq!(
        first.read_band_as::<f32>().unwrap().data,
        vec![0.0, 0.0, 0.0, 0.0, 42.0, 0.0]
    );
    assert_eq!(dataset.rasterband(2).unwrap().read_band_as::<f32>().unwrap(), second);
    assert_eq!(
        dataset.geo_transform().unwrap(),
        [10.0, 0.5, 0.0, 20.0, 0.0, -0.5]
    );
    assert_eq!(dataset.projection(), "LOCAL_CS[\"Arbitrary\"]");
}

#[test]
fn test_create_in_memory() {
    let fixture = InMemoryFixture::new("envi_tests/created");
    let driver = DriverManager::get_driver_by_name("ENVI").unwrap();
    let dataset = driver
        .create_with_band_type::<u16, _>(fixture.path(), 4, 4, 1)
        .unwrap();
    let mut band = dataset.rasterband(1).unwrap();
    band.write((0, 3), (4, 1), &Buffer::new((4, 1), vec![1u16, 2, 3, 65535]))
        .unwrap();
    dataset.close().unwrap();

    let header_path = fixture.path().with_extension("hdr");
    let header = vsi::call_on_mem_file_bytes(&header_path, |bytes| {
        EnviHeader::parse(&String::from_utf8_lossy(bytes))
    })
    .unwrap()
    .unwrap();
    assert_eq!(header.get_int("data_type"), 12);
    assert_eq!(header.get("byte_order"), Some(if cfg!(target_endian = "big") { "1" } else { "0" }));

    assert!(vsi::exists(&header_path));

    let dataset = Dataset::open(fixture.path()).unwrap();
    let pixels = dataset.rasterband(1).unwrap().read_band_as::<u16>().unwrap();
    assert_eq!(pixels.row(0), &[0, 0, 0, 0]);
    assert_eq!(pixels.row(3), &[1, 2, 3, 65535]);
    drop(dataset);
    vsi::unlink_mem_file(&header_path).unwrap();
}

#[test]
fn test_update_swaps_byte_order() {
    let staging = staged("envi_bil_int16", "envi_bil_int16.hdr");
    let dataset = open_update(staging.path());
    dataset
        .rasterband(2)
        .unwrap()
        .write((0, 1), (4, 1), &Buffer::new((4, 1), vec![-1i16, 0, 1, 2]))
        .unwrap();
    dataset.close().unwrap();

    // Line 1 of band 2 starts at 16 + 8 bytes, stored big endian.
    let bytes = std::fs::read(staging.path()).unwrap();
    assert_eq!(i16::from_be_bytes([bytes[24], bytes[25]]), -1);
    assert_eq!(i16::from_be_bytes([bytes[30], bytes[31]]), 2);

    let dataset = Dataset::open(staging.path()).unwrap();
    let nir = dataset.rasterband(2).unwrap().read_band_as::<i16>().unwrap();
    assert_eq!(nir.row(1), &[-1, 0, 1, 2]);
    let red = dataset.rasterband(1).unwrap().read_band_as::<i16>().unwrap();
    assert_eq!(red.row(1), &[110, 111, 112, 113]);
}

#[test]
fn test_update_pixel_interleaved_keeps_other_bands() {
    let staging = staged("envi_bip_float32.img", "envi_bip_float32.img.hdr");
    let dataset = open_update(staging.path());
    dataset
        .rasterband(2)
        .unwrap()
        .write((0, 0), (3, 1), &Buffer::new((3, 1), vec![7.0f32, 8.0, 9.0]))
        .unwrap();
    dataset.close().unwrap();

    let dataset = Dataset::open(staging.path()).unwrap();
    let read_row0 = |band: usize| {
        dataset
            .rasterband(band)
            .unwrap()
            .read_as::<f32>((0, 0), (3, 1), (3, 1))
            .unwrap()
            .data
    };
    assert_eq!(read_row0(1), vec![0.0, 0.5, 1.0]);
    assert_eq!(read_row0(2), vec![7.0, 8.0, 9.0]);
    assert_eq!(read_row0(3), vec![2.0, 2.5, 3.0]);
}

#[test]
fn test_new_geo_transform_keeps_coordinate_system() {
    let staging = staged("envi_bil_int16", "envi_bil_int16.hdr");
    let mut dataset = open_update(staging.path());
    dataset
        .set_geo_transform(&[441000.0, 30.0, 0.0, 3752000.0, 0.0, -30.0])
        .unwrap();
    dataset.close().unwrap();

    let header = std::fs::read_to_string(staging.sibling("envi_bil_int16.hdr")).unwrap();
    assert!(header.contains("map info = {UTM, 1, 1, 441000, 3752000, 30, 30, 11, North, WGS-84}"));
    assert!(header.contains("data ignore value = -9999"));

    let dataset = Dataset::open(staging.path()).unwrap();
    assert_eq!(
        dataset.geo_transform().unwrap(),
        [441000.0, 30.0, 0.0, 3752000.0, 0.0, -30.0]
    );
    assert!(dataset.projection().contains("UTM Zone 11"));
    assert_eq!(
        dataset.rasterband(1).unwrap().description().unwrap(),
        "Red band"
    );
}
