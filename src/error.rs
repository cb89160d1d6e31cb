use std::fmt;

/// Error produced while constructing buffers and converters
#[derive(Debug)]
pub enum MaskError {
    /// Buffer or converter requested with zero width or height
    InvalidSize { width: usize, height: usize },
    /// Oversampling factor must be at least one
    InvalidAntialias(usize),
    /// Number of provided values does not match the target region
    DataSize { expected: usize, actual: usize },
    /// JSON error
    #[cfg(feature = "serde")]
    Json(serde_json::Error),
    /// PNG encoder error
    #[cfg(feature = "png")]
    Png(png::EncodingError),
    /// IO error propagated while reading or writing streams
    IoError(std::io::Error),
}

impl fmt::Display for MaskError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MaskError::{:?}", self)
    }
}

impl From<std::io::Error> for MaskError {
    fn from(error: std::io::Error) -> Self {
        Self::IoError(error)
    }
}

#[cfg(feature = "serde")]
impl From<serde_json::Error> for MaskError {
    fn from(error: serde_json::Error) -> Self {
        Self::Json(error)
    }
}

#[cfg(feature = "png")]
impl From<png::EncodingError> for MaskError {
    fn from(error: png::EncodingError) -> Self {
        Self::Png(error)
    }
}

impl From<MaskError> for std::io::Error {
    fn from(error: MaskError) -> Self {
        match error {
            MaskError::IoError(error) => error,
            _ => Self::new(std::io::ErrorKind::InvalidData, error),
        }
    }
}

impl std::error::Error for MaskError {}
