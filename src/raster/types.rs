use std::fmt::{Display, Formatter};

use crate::errors::{GdalError, Result};

/// Pixel data types understood by the drivers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GdalDataType {
    UInt8,
    UInt16,
    Int16,
    UInt32,
    Int32,
    Float32,
    Float64,
    /// Complex pair of `f32` (real, imaginary).
    CFloat32,
    /// Complex pair of `f64` (real, imaginary).
    CFloat64,
}

impl GdalDataType {
    /// Get the type size in **bytes**.
    pub fn bytes(&self) -> usize {
        match self {
            GdalDataType::UInt8 => 1,
            GdalDataType::UInt16 | GdalDataType::Int16 => 2,
            GdalDataType::UInt32 | GdalDataType::Int32 | GdalDataType::Float32 => 4,
            GdalDataType::Float64 | GdalDataType::CFloat32 => 8,
            GdalDataType::CFloat64 => 16,
        }
    }

    /// Get the type size in **bits**.
    pub fn bits(&self) -> usize {
        self.bytes() * 8
    }

    /// Size of one scalar component; complex types hold two.
    pub fn component_bytes(&self) -> usize {
        if self.is_complex() {
            self.bytes() / 2
        } else {
            self.bytes()
        }
    }

    /// Returns `true` if data type is integral (non-floating point)
    pub fn is_integer(&self) -> bool {
        matches!(
            self,
            GdalDataType::UInt8
                | GdalDataType::UInt16
                | GdalDataType::Int16
                | GdalDataType::UInt32
                | GdalDataType::Int32
        )
    }

    /// Returns `true` if data type is floating point (non-integral)
    pub fn is_floating(&self) -> bool {
        !self.is_integer()
    }

    /// Returns `true` if data type supports negative values.
    pub fn is_signed(&self) -> bool {
        !matches!(
            self,
            GdalDataType::UInt8 | GdalDataType::UInt16 | GdalDataType::UInt32
        )
    }

    pub fn is_complex(&self) -> bool {
        matches!(self, GdalDataType::CFloat32 | GdalDataType::CFloat64)
    }

    /// The GDAL name of the type.
    pub fn name(&self) -> &'static str {
        match self {
            GdalDataType::UInt8 => "Byte",
            GdalDataType::UInt16 => "UInt16",
            GdalDataType::Int16 => "Int16",
            GdalDataType::UInt32 => "UInt32",
            GdalDataType::Int32 => "Int32",
            GdalDataType::Float32 => "Float32",
            GdalDataType::Float64 => "Float64",
            GdalDataType::CFloat32 => "CFloat32",
            GdalDataType::CFloat64 => "CFloat64",
        }
    }

    /// Looks a type up by its GDAL name (case-insensitive).
    pub fn from_name(name: &str) -> Result<Self> {
        Self::available_types()
            .iter()
            .copied()
            .find(|t| t.name().eq_ignore_ascii_case(name))
            .ok_or_else(|| GdalError::BadArgument(format!("unknown data type name '{name}'")))
    }

    pub fn available_types() -> &'static [GdalDataType] {
        use GdalDataType::*;
        &[
            UInt8, UInt16, Int16, UInt32, Int32, Float32, Float64, CFloat32, CFloat64,
        ]
    }

    /// Decodes one native-endian sample at the start of `bytes` as `f64`.
    ///
    /// For complex types the real part is returned.
    pub(crate) fn read_f64(&self, bytes: &[u8]) -> f64 {
        match self {
            GdalDataType::UInt8 => bytes[0] as f64,
            GdalDataType::UInt16 => u16::from_ne_bytes([bytes[0], bytes[1]]) as f64,
            GdalDataType::Int16 => i16::from_ne_bytes([bytes[0], bytes[1]]) as f64,
            GdalDataType::UInt32 => u32::from_ne_bytes(array(bytes)) as f64,
            GdalDataType::Int32 => i32::from_ne_bytes(array(bytes)) as f64,
            GdalDataType::Float32 | GdalDataType::CFloat32 => {
                f32::from_ne_bytes(array(bytes)) as f64
            }
            GdalDataType::Float64 | GdalDataType::CFloat64 => f64::from_ne_bytes(array(bytes)),
        }
    }

    /// Encodes `value` as one native-endian sample at the start of `out`,
    /// rounding and saturating for integer types.
    pub(crate) fn write_f64(&self, value: f64, out: &mut [u8]) {
        match self {
            GdalDataType::UInt8 => out[0] = u8::from_f64(value),
            GdalDataType::UInt16 => out[..2].copy_from_slice(&u16::from_f64(value).to_ne_bytes()),
            GdalDataType::Int16 => out[..2].copy_from_slice(&i16::from_f64(value).to_ne_bytes()),
            GdalDataType::UInt32 => out[..4].copy_from_slice(&u32::from_f64(value).to_ne_bytes()),
            GdalDataType::Int32 => out[..4].copy_from_slice(&i32::from_f64(value).to_ne_bytes()),
            GdalDataType::Float32 => out[..4].copy_from_slice(&(value as f32).to_ne_bytes()),
            GdalDataType::Float64 => out[..8].copy_from_slice(&value.to_ne_bytes()),
            GdalDataType::CFloat32 => {
                out[..4].copy_from_slice(&(value as f32).to_ne_bytes());
                out[4..8].fill(0);
            }
            GdalDataType::CFloat64 => {
                out[..8].copy_from_slice(&value.to_ne_bytes());
                out[8..16].fill(0);
            }
        }
    }
}

fn array<const N: usize>(bytes: &[u8]) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(&bytes[..N]);
    out
}

impl Display for GdalDataType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Type-level constraint for limiting which primitive numeric values can be passed
/// to functions needing target data type.
pub trait GdalType: Copy + Default + 'static {
    fn gdal_type() -> GdalDataType;

    /// Convert from `f64`, rounding and saturating for integer types.
    fn from_f64(value: f64) -> Self;

    fn to_f64(self) -> f64;
}

macro_rules! impl_gdal_type_int {
    ($t:ty, $variant:ident) => {
        impl GdalType for $t {
            fn gdal_type() -> GdalDataType {
                GdalDataType::$variant
            }

            fn from_f64(value: f64) -> Self {
                // `as` saturates at the type bounds and maps NaN to zero.
                value.round() as $t
            }

            fn to_f64(self) -> f64 {
                self as f64
            }
        }
    };
}

impl_gdal_type_int!(u8, UInt8);
impl_gdal_type_int!(u16, UInt16);
impl_gdal_type_int!(i16, Int16);
impl_gdal_type_int!(u32, UInt32);
impl_gdal_type_int!(i32, Int32);

impl GdalType for f32 {
    fn gdal_type() -> GdalDataType {
        GdalDataType::Float32
    }

    fn from_f64(value: f64) -> Self {
        value as f32
    }

    fn to_f64(self) -> f64 {
        self as f64
    }
}

impl GdalType for f64 {
    fn gdal_type() -> GdalDataType {
        GdalDataType::Float64
    }

    fn from_f64(value: f64) -> Self {
        value
    }

    fn to_f64(self) -> f64 {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sizes() {
        assert_eq!(GdalDataType::UInt8.bytes(), 1);
        assert_eq!(GdalDataType::Int16.bits(), 16);
        assert_eq!(GdalDataType::CFloat32.bytes(), 8);
        assert_eq!(GdalDataType::CFloat32.component_bytes(), 4);
        assert!(GdalDataType::Int32.is_signed());
        assert!(!GdalDataType::UInt32.is_signed());
        assert!(GdalDataType::CFloat64.is_complex());
    }

    #[test]
    fn names() {
        assert_eq!(GdalDataType::UInt8.to_string(), "Byte");
        assert_eq!(GdalDataType::from_name("float32").unwrap(), GdalDataType::Float32);
        assert!(GdalDataType::from_name("Int64").is_err());
    }

    #[test]
    fn saturating_conversion() {
        assert_eq!(u8::from_f64(300.0), 255);
        assert_eq!(u8::from_f64(-3.0), 0);
        assert_eq!(i16::from_f64(2.5), 3);
        assert_eq!(u16::from_f64(f64::NAN), 0);

        let mut sample = [0u8; 2];
        GdalDataType::Int16.write_f64(-1234.4, &mut sample);
        assert_eq!(GdalDataType::Int16.read_f64(&sample), -1234.0);
    }
}
