use std::{borrow::Cow, str::FromStr};

use chrono::{DateTime, Utc};
use log::info;
use quick_xml::{events::Event, Reader};

use crate::{error::TrackfixError, model::Track};

mod attributes;
mod fit;
mod gpx;
mod tcx;

pub use fit::semicircles_to_degrees;

/// Decodes an uploaded file into a [`Track`]. The format is detected from the
/// case-insensitive filename suffix; the byte buffer must already be fully
/// read from the request body.
pub fn decode_upload(filename: &str, data: &[u8]) -> Result<Track, TrackfixError> {
    match filename.rsplit('.').next().map(|ext| ext.to_ascii_lowercase()) {
        Some(ext) if ext == "gpx" => {
            info!("Decoding {filename} as GPX ({} bytes)", data.len());
            gpx::decode_gpx(data)
        }
        Some(ext) if ext == "fit" => {
            info!("Decoding {filename} as FIT ({} bytes)", data.len());
            fit::decode_fit(data)
        }
        Some(ext) if ext == "tcx" => {
            info!("Decoding {filename} as TCX ({} bytes)", data.len());
            tcx::decode_tcx(data)
        }
        _ => Err(TrackfixError::UnsupportedFormat(filename.to_string())),
    }
}

/// An extension trait for quick_xml::Reader that converts the underlying
/// bytes into usable str and String values.
pub(crate) trait XmlReaderConversions {
    fn bytes_to_cow<'a>(&self, bytes: &'a [u8]) -> Result<Cow<'a, str>, TrackfixError>;
    fn bytes_to_string(&self, bytes: &[u8]) -> Result<String, TrackfixError>;
    fn cow_to_string(&self, bytes: Cow<'_, [u8]>) -> Result<String, TrackfixError>;
}

impl<R> XmlReaderConversions for Reader<R> {
    #[inline]
    fn bytes_to_cow<'a>(&self, bytes: &'a [u8]) -> Result<Cow<'a, str>, TrackfixError> {
        // It is important to pass the bytes through decode() in order to do a
        // proper conversion.
        Ok(self.decoder().decode(bytes)?)
    }

    #[inline]
    fn bytes_to_string(&self, bytes: &[u8]) -> Result<String, TrackfixError> {
        Ok(self.bytes_to_cow(bytes)?.into())
    }

    #[inline]
    fn cow_to_string(&self, bytes: Cow<'_, [u8]>) -> Result<String, TrackfixError> {
        match bytes {
            Cow::Borrowed(slice) => Ok(self.bytes_to_string(slice)?),
            Cow::Owned(vec) => Ok(self.bytes_to_string(&vec)?),
        }
    }
}

/// An extension trait for quick_xml::Reader that makes it convenient to read
/// inner text and convert it to a specific type.
pub(crate) trait XmlReaderExtensions {
    fn read_inner_as_string(&mut self) -> Result<String, TrackfixError>;
    fn read_inner_as_time(&mut self) -> Result<DateTime<Utc>, TrackfixError>;
    fn read_inner_as<T: FromStr>(&mut self) -> Result<T, TrackfixError>;
}

impl XmlReaderExtensions for Reader<&[u8]> {
    #[inline]
    fn read_inner_as_string(&mut self) -> Result<String, TrackfixError> {
        match self.read_event() {
            Ok(Event::Text(text)) => Ok(self.bytes_to_string(&text)?),
            event => Err(TrackfixError::InvalidFormat(format!(
                "expected text at position {}, got {:?}",
                self.buffer_position(),
                event
            ))),
        }
    }

    #[inline]
    fn read_inner_as_time(&mut self) -> Result<DateTime<Utc>, TrackfixError> {
        let t = self.read_inner_as_string()?;
        crate::dates::parse_utc_date(&t)
    }

    #[inline]
    fn read_inner_as<T: FromStr>(&mut self) -> Result<T, TrackfixError> {
        let value = self.read_inner_as_string()?;

        value
            .parse::<T>()
            .map_err(|_| TrackfixError::InvalidFormat(format!(
                "could not parse {:?} into type {}",
                value,
                std::any::type_name::<T>()
            )))
    }
}

/// Skips over an element and everything inside it.
pub(crate) fn skip_element(
    start_element: &quick_xml::events::BytesStart<'_>,
    xml_reader: &mut Reader<&[u8]>,
) -> Result<(), TrackfixError> {
    let end = start_element.to_end().into_owned();
    xml_reader.read_to_end(end.name())?;
    Ok(())
}

pub(crate) fn unexpected_eof() -> TrackfixError {
    TrackfixError::InvalidFormat("unexpected EOF, check file for corruption".to_string())
}

/// Gates coordinates as they come off a codec. A float parser happily
/// accepts "nan" and "inf", and corrupt FIT records can carry out-of-range
/// semicircles; any of those is a malformed file, not a bad request.
pub(crate) fn check_decoded_coords(lat: f64, lon: f64) -> Result<(), TrackfixError> {
    match crate::geo::coord_error(lat, lon) {
        Some(msg) => Err(TrackfixError::InvalidFormat(msg)),
        None => Ok(()),
    }
}

/// Parses a biometric integer, tolerating the trailing ".0" some devices
/// write (e.g. "87.0" for a cadence).
pub(crate) fn parse_int_lenient(value: &str) -> Option<u32> {
    let value = value.trim();
    if let Ok(n) = value.parse::<u32>() {
        return Some(n);
    }
    match value.parse::<f64>() {
        Ok(f) if f >= 0.0 => Some(f.round() as u32),
        _ => None,
    }
}

/// A helper method to simplify tests. Often we need to get the contents of an
/// 'Event::Start' event type.
#[cfg(test)]
pub(crate) fn start_parse<'a>(xml_reader: &mut Reader<&'a [u8]>) -> quick_xml::events::BytesStart<'a> {
    match xml_reader.read_event().unwrap() {
        Event::Start(start) => start,
        _ => panic!("Failed to parse Event::Start(_) element"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dispatches_on_case_insensitive_suffix() {
        let gpx = br#"<gpx version="1.1" creator="t"><trk><trkseg/></trk></gpx>"#;
        assert!(decode_upload("ride.GPX", gpx).is_ok());
        assert!(decode_upload("ride.gpx", gpx).is_ok());
    }

    #[test]
    fn unknown_suffix_is_unsupported() {
        match decode_upload("ride.kml", b"whatever") {
            Err(TrackfixError::UnsupportedFormat(name)) => assert_eq!(name, "ride.kml"),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn missing_suffix_is_unsupported() {
        assert!(matches!(
            decode_upload("README", b""),
            Err(TrackfixError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn parse_int_lenient_tolerates_trailing_decimal() {
        assert_eq!(parse_int_lenient("87"), Some(87));
        assert_eq!(parse_int_lenient("87.0"), Some(87));
        assert_eq!(parse_int_lenient(" 150 "), Some(150));
        assert_eq!(parse_int_lenient("abc"), None);
        assert_eq!(parse_int_lenient("-3"), None);
    }
}
