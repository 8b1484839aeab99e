use std::str::FromStr;

use crate::{error::TrackfixError, gpx_writer, model::Track};

/// The formats a session can be exported to. Only GPX has an encoder in this
/// version; FIT and TCX are recognized so the caller gets a precise error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Gpx,
    Fit,
    Tcx,
}

impl ExportFormat {
    /// The media type served on export.
    pub fn media_type(&self) -> &'static str {
        match self {
            ExportFormat::Gpx => "application/gpx+xml",
            ExportFormat::Fit => "application/vnd.ant.fit",
            ExportFormat::Tcx => "application/vnd.garmin.tcx+xml",
        }
    }

    /// The filename suffix for this format.
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Gpx => "gpx",
            ExportFormat::Fit => "fit",
            ExportFormat::Tcx => "tcx",
        }
    }
}

impl FromStr for ExportFormat {
    type Err = TrackfixError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "gpx" => Ok(ExportFormat::Gpx),
            "fit" => Ok(ExportFormat::Fit),
            "tcx" => Ok(ExportFormat::Tcx),
            other => Err(TrackfixError::UnsupportedExportFormat(other.to_string())),
        }
    }
}

/// Encodes `track` in the requested format.
pub fn export_track(track: &Track, format: ExportFormat) -> Result<Vec<u8>, TrackfixError> {
    match format {
        ExportFormat::Gpx => gpx_writer::write_gpx_to_vec(track),
        ExportFormat::Fit | ExportFormat::Tcx => Err(TrackfixError::UnsupportedExportFormat(
            format.extension().to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{TrackMetadata, TrackSegment};

    fn empty_track() -> Track {
        Track::new(vec![TrackSegment::default()], TrackMetadata::with_format("gpx"))
    }

    #[test]
    fn format_parses_case_insensitively() {
        assert_eq!("GPX".parse::<ExportFormat>().unwrap(), ExportFormat::Gpx);
        assert_eq!("fit".parse::<ExportFormat>().unwrap(), ExportFormat::Fit);
        assert!(matches!(
            "kml".parse::<ExportFormat>(),
            Err(TrackfixError::UnsupportedExportFormat(_))
        ));
    }

    #[test]
    fn gpx_export_produces_a_document() {
        let bytes = export_track(&empty_track(), ExportFormat::Gpx).unwrap();
        let xml = String::from_utf8(bytes).unwrap();
        assert!(xml.starts_with("<?xml"));
        assert!(xml.contains("<gpx"));
    }

    #[test]
    fn fit_and_tcx_have_no_encoder() {
        assert!(matches!(
            export_track(&empty_track(), ExportFormat::Fit),
            Err(TrackfixError::UnsupportedExportFormat(_))
        ));
        assert!(matches!(
            export_track(&empty_track(), ExportFormat::Tcx),
            Err(TrackfixError::UnsupportedExportFormat(_))
        ));
    }

    #[test]
    fn media_types_match_the_contract() {
        assert_eq!(ExportFormat::Gpx.media_type(), "application/gpx+xml");
        assert_eq!(ExportFormat::Fit.media_type(), "application/vnd.ant.fit");
        assert_eq!(
            ExportFormat::Tcx.media_type(),
            "application/vnd.garmin.tcx+xml"
        );
    }
}
