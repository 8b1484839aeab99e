use quick_xml::events::attributes::AttrError;
use thiserror::Error;

/// The error type for every fallible operation in the core. The variants are
/// the error kinds the HTTP adapter maps onto status codes; the payload is a
/// short human-readable description.
#[derive(Debug, Error)]
pub enum TrackfixError {
    /// The filename suffix is not one of .gpx/.fit/.tcx.
    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),
    /// A codec could not parse the structure it requires.
    #[error("invalid file: {0}")]
    InvalidFormat(String),
    /// No live session exists for the given id.
    #[error("session not found: {0}")]
    NotFound(String),
    /// Inputs are structurally valid but semantically wrong.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// A segment or point index is outside the current track's bounds.
    #[error("index out of range: {0}")]
    OutOfRange(String),
    /// Export was requested in a format that has no encoder.
    #[error("no encoder for format: {0}")]
    UnsupportedExportFormat(String),
    /// Invariant breach or unexpected codec error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<quick_xml::Error> for TrackfixError {
    fn from(value: quick_xml::Error) -> Self {
        Self::InvalidFormat(value.to_string())
    }
}

impl From<AttrError> for TrackfixError {
    fn from(value: AttrError) -> Self {
        Self::InvalidFormat(value.to_string())
    }
}

impl From<quick_xml::encoding::EncodingError> for TrackfixError {
    fn from(value: quick_xml::encoding::EncodingError) -> Self {
        Self::InvalidFormat(value.to_string())
    }
}

impl From<fitparser::Error> for TrackfixError {
    fn from(value: fitparser::Error) -> Self {
        Self::InvalidFormat(value.to_string())
    }
}

impl From<std::io::Error> for TrackfixError {
    fn from(value: std::io::Error) -> Self {
        Self::Internal(value.to_string())
    }
}
