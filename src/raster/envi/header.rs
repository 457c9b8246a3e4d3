//! `.hdr` label parsing and writing.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use crate::cpl::CslStringList;
use crate::errors::{GdalError, Result};
use crate::raster::GdalDataType;
use crate::vsi;

/// Files tried, in order, as the header of the data file `path`.
pub(crate) fn header_candidates(path: &Path) -> Vec<PathBuf> {
    let appended = |ext: &str| {
        let mut name = path.as_os_str().to_owned();
        name.push(".");
        name.push(ext);
        PathBuf::from(name)
    };
    vec![
        path.with_extension("hdr"),
        path.with_extension("HDR"),
        appended("hdr"),
        appended("HDR"),
    ]
}

/// Locates the header of `path`.
pub(crate) fn find_header(path: &Path) -> Option<PathBuf> {
    header_candidates(path)
        .into_iter()
        .find(|candidate| vsi::exists(candidate))
}

/// Leading integer of `value`, like C's `atoi`: `"12 bytes"` is 12, garbage is 0.
pub(crate) fn leading_int(value: &str) -> i64 {
    let value = value.trim_start();
    let end = value
        .char_indices()
        .find(|&(i, c)| !(c.is_ascii_digit() || (i == 0 && (c == '-' || c == '+'))))
        .map_or(value.len(), |(i, _)| i);
    value[..end].parse().unwrap_or(0)
}

/// Leading number of `value`, like C's `atof`.
pub(crate) fn leading_float(value: &str) -> f64 {
    let value = value.trim();
    (1..=value.len())
        .rev()
        .filter(|&end| value.is_char_boundary(end))
        .find_map(|end| value[..end].parse().ok())
        .unwrap_or(0.0)
}

/// Splits a `{a, b, c}` list into its trimmed fields.
///
/// Returns `None` if `value` does not start with `{`. An unterminated last
/// field is dropped.
pub fn split_list(value: &str) -> Option<Vec<String>> {
    let inner = value.strip_prefix('{')?;
    let mut fields = Vec::new();
    let mut rest = inner;
    loop {
        let Some(end) = rest.find([',', '}']) else {
            break;
        };
        fields.push(rest[..end].trim().to_string());
        let closing = rest[end..].starts_with('}');
        rest = &rest[end + 1..];
        if closing {
            break;
        }
    }
    Some(fields)
}

/// Sample layout of the data file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interleave {
    /// Band sequential.
    Bsq,
    /// Band interleaved by line.
    Bil,
    /// Band interleaved by pixel.
    Bip,
}

impl Interleave {
    pub fn from_name(name: &str) -> Option<Interleave> {
        match name.trim().to_ascii_lowercase().as_str() {
            "bsq" => Some(Interleave::Bsq),
            "bil" => Some(Interleave::Bil),
            "bip" => Some(Interleave::Bip),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Interleave::Bsq => "bsq",
            Interleave::Bil => "bil",
            Interleave::Bip => "bip",
        }
    }

    /// `(pixel_offset, line_offset, band_offset)` in bytes.
    pub fn offsets(
        &self,
        data_size: usize,
        samples: usize,
        lines: usize,
        bands: usize,
    ) -> (usize, usize, u64) {
        match self {
            Interleave::Bsq => {
                let line = data_size * samples;
                (data_size, line, line as u64 * lines as u64)
            }
            Interleave::Bil => (
                data_size,
                data_size * samples * bands,
                (data_size * samples) as u64,
            ),
            Interleave::Bip => (
                data_size * bands,
                data_size * samples * bands,
                data_size as u64,
            ),
        }
    }
}

/// ENVI `data type` code of `data_type`.
pub fn data_type_code(data_type: GdalDataType) -> u32 {
    match data_type {
        GdalDataType::UInt8 => 1,
        GdalDataType::Int16 => 2,
        GdalDataType::Int32 => 3,
        GdalDataType::Float32 => 4,
        GdalDataType::Float64 => 5,
        GdalDataType::CFloat32 => 6,
        GdalDataType::CFloat64 => 9,
        GdalDataType::UInt16 => 12,
        GdalDataType::UInt32 => 13,
    }
}

pub fn data_type_from_code(code: i64) -> Result<GdalDataType> {
    match code {
        1 => Ok(GdalDataType::UInt8),
        2 => Ok(GdalDataType::Int16),
        3 => Ok(GdalDataType::Int32),
        4 => Ok(GdalDataType::Float32),
        5 => Ok(GdalDataType::Float64),
        6 => Ok(GdalDataType::CFloat32),
        9 => Ok(GdalDataType::CFloat64),
        12 => Ok(GdalDataType::UInt16),
        13 => Ok(GdalDataType::UInt32),
        _ => Err(GdalError::FormatError(format!(
            "The file has a 'data type' value of '{code}'. \
             This value isn't recognised by the ENVI driver."
        ))),
    }
}

/// `byte order` value for the byte order of this machine.
pub(crate) fn native_byte_order() -> u8 {
    if cfg!(target_endian = "big") {
        1
    } else {
        0
    }
}

/// Parsed `key = value` entries of an ENVI header.
///
/// Keys are lower-cased with spaces replaced by `_` (`map info` is `map_info`).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnviHeader {
    entries: CslStringList,
}

impl EnviHeader {
    /// Parses header text. The text must start with `ENVI`.
    pub fn parse(text: &str) -> Result<EnviHeader> {
        if !text.starts_with("ENVI") {
            return Err(GdalError::FormatError(
                "not an ENVI header".to_string(),
            ));
        }
        let mut entries = CslStringList::new();
        let mut lines = text.lines().skip(1);
        while let Some(line) = lines.next() {
            if !line.contains('=') {
                continue;
            }
            let mut working = line.to_string();
            if working.contains('{') && !working.contains('}') {
                for next in lines.by_ref() {
                    working.push_str(next);
                    if next.contains('}') {
                        break;
                    }
                }
            }
            let Some((name, value)) = working.split_once('=') else {
                continue;
            };
            let name = name.trim().to_ascii_lowercase().replace(' ', "_");
            if name.is_empty() {
                continue;
            }
            entries.set_unchecked(&name, value.trim());
        }
        Ok(EnviHeader { entries })
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.fetch_name_value(key)
    }

    pub(crate) fn set(&mut self, key: &str, value: &str) {
        self.entries.set_unchecked(key, value);
    }

    pub(crate) fn remove(&mut self, key: &str) {
        self.entries.remove(key);
    }

    pub fn entries(&self) -> &CslStringList {
        &self.entries
    }

    /// Integer value of `key`, 0 when missing or unparsable.
    pub fn get_int(&self, key: &str) -> i64 {
        self.get(key).map_or(0, leading_int)
    }

    /// Header text, entries in their original order.
    pub fn to_text(&self) -> String {
        let mut text = String::from("ENVI\n");
        for (key, value) in self.entries.iter() {
            let _ = writeln!(text, "{} = {}", key.replace('_', " "), value);
        }
        text
    }
}

/// `{a, b, c}` list of `values`, one per line past the first.
pub(crate) fn format_list<S: AsRef<str>>(values: &[S]) -> String {
    let joined = values
        .iter()
        .map(|v| v.as_ref())
        .collect::<Vec<_>>()
        .join(",\n");
    format!("{{\n{joined}}}")
}
