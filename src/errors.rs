use thiserror::Error;

use crate::config;

/// Severity of a message sent to the error sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CplErrType {
    None = 0,
    Debug = 1,
    Warning = 2,
    Failure = 3,
    Fatal = 4,
}

/// Category of a message sent to the error sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CplErrorNum {
    None = 0,
    AppDefined = 1,
    OutOfMemory = 2,
    FileIO = 3,
    OpenFailed = 4,
    IllegalArg = 5,
    NotSupported = 6,
    AssertionFailed = 7,
    NoWriteAccess = 8,
    UserInterrupt = 9,
    ObjectNull = 10,
}

#[derive(Debug, Error)]
pub enum GdalError {
    #[error("CPL error class: '{class:?}', error number: '{number:?}', error msg: '{msg}'")]
    CplError {
        class: CplErrType,
        number: CplErrorNum,
        msg: String,
    },
    #[error("Unrecognized or malformed format: {0}")]
    FormatError(String),
    #[error("Decoding failed: {msg}")]
    DecodeError { msg: String },
    #[error("Row {row} of band {band} cannot be written: {msg}")]
    OrderViolation {
        row: usize,
        band: usize,
        msg: String,
    },
    #[error("Unable to allocate resources: {0}")]
    ResourceError(String),
    #[error("Bad argument: {0}")]
    BadArgument(String),
    #[error("Not supported: {0}")]
    NotSupported(String),
    #[error("Failed to open '{path}': {msg}")]
    OpenFailed { path: String, msg: String },
    #[error("Unable to unlink mem file: {file_name}")]
    UnlinkMemFile { file_name: String },
    #[error("Invalid field name '{field_name}' used on method {method_name}")]
    InvalidFieldName {
        field_name: String,
        method_name: &'static str,
    },
    #[error("Invalid field index {index} used on method {method_name}")]
    InvalidFieldIndex {
        index: usize,
        method_name: &'static str,
    },
    #[error("Invalid geometry blob: {0}")]
    InvalidWkb(String),
    #[error("Unsupported GDAL geometry type")]
    UnsupportedGdalGeometryType(u32),
    #[error("Unhandled type '{field_type}' on method {method_name}")]
    UnhandledFieldType {
        field_type: String,
        method_name: &'static str,
    },
    #[error(transparent)]
    IoError(#[from] std::io::Error),
    #[cfg(feature = "ndarray")]
    #[cfg_attr(docsrs, doc(cfg(feature = "array")))]
    #[error(transparent)]
    NdarrayShapeError(#[from] ndarray::ShapeError),
}

impl GdalError {
    /// Category under which this error is reported to the error sink.
    pub fn category(&self) -> CplErrorNum {
        match self {
            GdalError::CplError { number, .. } => *number,
            GdalError::ResourceError(_) => CplErrorNum::OutOfMemory,
            GdalError::BadArgument(_)
            | GdalError::InvalidFieldName { .. }
            | GdalError::InvalidFieldIndex { .. } => CplErrorNum::IllegalArg,
            GdalError::NotSupported(_)
            | GdalError::OrderViolation { .. }
            | GdalError::UnsupportedGdalGeometryType(_)
            | GdalError::UnhandledFieldType { .. } => CplErrorNum::NotSupported,
            GdalError::OpenFailed { .. } => CplErrorNum::OpenFailed,
            GdalError::IoError(_) | GdalError::UnlinkMemFile { .. } => CplErrorNum::FileIO,
            _ => CplErrorNum::AppDefined,
        }
    }

    /// Sends this error to the installed error sink as a failure and hands it back,
    /// so drivers can write `return Err(err.report())`.
    pub(crate) fn report(self) -> Self {
        config::emit(CplErrType::Failure, self.category(), &self.to_string());
        self
    }
}

/// A convenience `Result` alias for this crate.
pub type Result<T> = std::result::Result<T, GdalError>;
