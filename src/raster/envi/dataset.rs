use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use super::header::{
    data_type_code, data_type_from_code, find_header, format_list, leading_float,
    native_byte_order, split_list, EnviHeader, Interleave,
};
use super::mapinfo::MapInfo;
use super::raw::RawLayout;
use crate::cpl::CslStringList;
use crate::dataset::{DatasetBackend, DatasetCommon, OpenInfo};
use crate::errors::{CplErrType, CplErrorNum, GdalError, Result};
use crate::options::Access;
use crate::raster::{BandInfo, GdalDataType};
use crate::vsi::{self, VsiFile};

/// Metadata domain holding the raw header entries.
pub(crate) const ENVI_DOMAIN: &str = "ENVI";

/// Data file extensions looked for next to a selected header.
const DATA_EXTENSIONS: &[&str] = &["", "img", "dat", "bil", "bsq", "bip", "raw"];

fn read_header(path: &Path) -> Result<EnviHeader> {
    let mut bytes = Vec::new();
    vsi::open(path)?.read_to_end(&mut bytes)?;
    EnviHeader::parse(&String::from_utf8_lossy(&bytes))
}

fn is_header_path(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("hdr"))
}

fn header_selected_error(path: &Path) -> GdalError {
    let data = DATA_EXTENSIONS
        .iter()
        .map(|ext| path.with_extension(ext))
        .find(|candidate| vsi::exists(candidate))
        .unwrap_or_else(|| path.with_extension(""));
    GdalError::OpenFailed {
        path: path.display().to_string(),
        msg: format!(
            "The selected file is an ENVI header file, but to open ENVI datasets, \
             the data file should be selected instead of the .hdr file. Please try \
             again selecting the data file ({}) corresponding to the header file: {}",
            data.display(),
            path.display()
        ),
    }
}

fn required_dimension(header: &EnviHeader, key: &str) -> Result<usize> {
    match header.get_int(key) {
        n if n > 0 => Ok(n as usize),
        n => Err(GdalError::FormatError(format!(
            "ENVI header value {key} = {n} is not a valid dimension"
        ))),
    }
}

/// A raw raster described by an ENVI `.hdr` label.
#[derive(Debug)]
pub struct EnviDataset {
    common: DatasetCommon,
    file: VsiFile,
    layout: RawLayout,
    header: EnviHeader,
    header_path: PathBuf,
    map_info: Option<MapInfo>,
}

impl EnviDataset {
    pub(crate) fn open(info: &OpenInfo) -> Result<EnviDataset> {
        let header_path = find_header(&info.path).ok_or_else(|| GdalError::OpenFailed {
            path: info.path.display().to_string(),
            msg: "no ENVI header found".to_string(),
        })?;
        let header = read_header(&header_path)?;
        if is_header_path(&info.path) {
            return Err(header_selected_error(&info.path));
        }

        let missing = ["samples", "lines", "bands", "interleave"]
            .iter()
            .any(|key| header.get(key).is_none());
        if missing {
            return Err(GdalError::FormatError(
                "The file appears to have an associated ENVI header, but one or more of \
                 the samples, lines, bands and interleave keywords appears to be missing."
                    .to_string(),
            ));
        }
        let width = required_dimension(&header, "samples")?;
        let height = required_dimension(&header, "lines")?;
        let band_count = required_dimension(&header, "bands")?;

        let interleave_name = header.get("interleave").unwrap_or_default();
        let interleave = Interleave::from_name(interleave_name).ok_or_else(|| {
            GdalError::FormatError(format!(
                "The interleaving type of the file ({interleave_name}) is not supported."
            ))
        })?;
        let band_type = match header.get("data_type") {
            Some(_) => data_type_from_code(header.get_int("data_type"))?,
            None => GdalDataType::UInt8,
        };
        let byte_order = match header.get("byte_order") {
            Some(_) => header.get_int("byte_order"),
            None => i64::from(native_byte_order()),
        };
        let image_offset = header.get_int("header_offset").max(0) as u64;
        let layout = RawLayout::new(
            interleave,
            band_type,
            (width, height),
            band_count,
            image_offset,
            byte_order == i64::from(native_byte_order()),
        );

        let file = match info.access {
            Access::ReadOnly => vsi::open(&info.path)?,
            Access::Update => vsi::open_update(&info.path)?,
        };

        let names = header
            .get("band_names")
            .and_then(split_list)
            .unwrap_or_default();
        let no_data = header.get("data_ignore_value").map(leading_float);
        let bands = (0..band_count)
            .map(|i| {
                let mut band = BandInfo::new(band_type, (width, 1));
                band.description = names.get(i).cloned().unwrap_or_default();
                band.no_data_value = no_data;
                band
            })
            .collect();

        let mut common = DatasetCommon {
            description: info.path.display().to_string(),
            raster_size: (width, height),
            bands,
            access: info.access,
            ..Default::default()
        };
        for (key, value) in header.entries().iter() {
            common.metadata.set_item(&key, &value, ENVI_DOMAIN);
        }
        let map_info = header.get("map_info").and_then(MapInfo::parse);
        if let Some(map_info) = &map_info {
            common.geo_transform = Some(map_info.geo_transform);
            common.projection = map_info.to_wkt();
        }

        Ok(EnviDataset {
            common,
            file,
            layout,
            header,
            header_path,
            map_info,
        })
    }

    /// Parsed header entries.
    pub fn header(&self) -> &EnviHeader {
        &self.header
    }

    /// The `map info` record, if the dataset is georeferenced.
    pub fn map_info(&self) -> Option<&MapInfo> {
        self.map_info.as_ref()
    }

    pub fn layout(&self) -> &RawLayout {
        &self.layout
    }

    fn check_line(&self, band: usize, block_index: (usize, usize)) -> Result<()> {
        if block_index.0 != 0
            || block_index.1 >= self.common.raster_size.1
            || band == 0
            || band > self.common.bands.len()
        {
            return Err(GdalError::BadArgument(format!(
                "block {block_index:?} of band {band} is out of range"
            )));
        }
        Ok(())
    }

    /// Folds band names, georeferencing and nodata back into the header and
    /// rewrites the header file.
    fn write_header(&mut self) -> Result<()> {
        let names: Vec<&str> = self
            .common
            .bands
            .iter()
            .map(|band| band.description.as_str())
            .collect();
        if names.iter().any(|name| !name.is_empty()) {
            self.header.set("band_names", &format_list(&names));
        }
        if let Some(gt) = self.common.geo_transform {
            let map_info = match &self.map_info {
                Some(existing) => existing.with_geo_transform(gt),
                None => MapInfo::arbitrary(gt),
            };
            self.header.set("map_info", &map_info.to_header_value());
            self.map_info = Some(map_info);
        }
        match self.common.bands.first().and_then(|band| band.no_data_value) {
            Some(value) => self.header.set("data_ignore_value", &value.to_string()),
            None => self.header.remove("data_ignore_value"),
        }

        let mut out = vsi::create(&self.header_path)?;
        out.write_all(self.header.to_text().as_bytes())?;
        out.flush()?;
        Ok(())
    }
}

impl DatasetBackend for EnviDataset {
    fn common(&self) -> &DatasetCommon {
        &self.common
    }

    fn common_mut(&mut self) -> &mut DatasetCommon {
        &mut self.common
    }

    fn read_block(&mut self, band: usize, block_index: (usize, usize), out: &mut [u8]) -> Result<()> {
        self.check_line(band, block_index)?;
        self.layout
            .read_line(&mut self.file, band, block_index.1, out)
            .map_err(GdalError::report)
    }

    fn write_block(&mut self, band: usize, block_index: (usize, usize), data: &[u8]) -> Result<()> {
        if self.common.access == Access::ReadOnly {
            return Err(GdalError::CplError {
                class: CplErrType::Failure,
                number: CplErrorNum::NoWriteAccess,
                msg: "ENVI dataset is opened in read-only mode".to_string(),
            }
            .report());
        }
        self.check_line(band, block_index)?;
        self.layout
            .write_line(&mut self.file, band, block_index.1, data)
            .map_err(GdalError::report)
    }

    fn flush_cache(&mut self) -> Result<()> {
        if self.common.access == Access::Update {
            self.file.flush()?;
            if self.common.dirty {
                self.write_header().map_err(GdalError::report)?;
                self.common.dirty = false;
            }
        }
        Ok(())
    }
}

/// Header text of a freshly created dataset.
fn initial_header(
    size: (usize, usize),
    bands: usize,
    type_code: u32,
) -> String {
    format!(
        "ENVI\n\
         samples = {}\n\
         lines   = {}\n\
         bands   = {bands}\n\
         header offset = 0\n\
         file type = ENVI Standard\n\
         data type = {type_code}\n\
         interleave = bsq\n\
         byte order = {}\n",
        size.0,
        size.1,
        native_byte_order()
    )
}

/// Creates a band sequential dataset and opens it for update.
///
/// The data file starts out two bytes long; samples never written read as zero.
pub(crate) fn create(
    path: &Path,
    size: (usize, usize),
    bands: usize,
    band_type: GdalDataType,
    _options: &CslStringList,
) -> Result<Box<dyn DatasetBackend>> {
    let type_code = data_type_code(band_type);
    if is_header_path(path) {
        return Err(GdalError::BadArgument(format!(
            "{} would be overwritten by its own header",
            path.display()
        ))
        .report());
    }

    let open_failed = |e: GdalError| {
        GdalError::OpenFailed {
            path: path.display().to_string(),
            msg: format!("Attempt to create file failed: {e}"),
        }
        .report()
    };
    let mut data = vsi::create(path).map_err(open_failed)?;
    data.write_all(&[0, 0])?;
    drop(data);

    let header_path = path.with_extension("hdr");
    let mut header = vsi::create(&header_path).map_err(open_failed)?;
    header.write_all(initial_header(size, bands, type_code).as_bytes())?;
    drop(header);

    let info = OpenInfo::new(path, Access::Update, CslStringList::new());
    Ok(Box::new(EnviDataset::open(&info)?))
}
