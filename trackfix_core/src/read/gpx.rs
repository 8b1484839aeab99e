use logging_timer::time;
use quick_xml::{
    events::{BytesStart, Event},
    Reader,
};

use crate::{
    error::TrackfixError,
    model::{Track, TrackMetadata, TrackPoint, TrackSegment},
};

use super::{
    attributes::Attributes, check_decoded_coords, parse_int_lenient, skip_element,
    unexpected_eof, XmlReaderConversions, XmlReaderExtensions,
};

/// Decodes a GPX 1.1 document. Unlike a validating reader this one is
/// deliberately lenient: uploads come from arbitrary devices, so unknown
/// elements and attributes are skipped rather than rejected. Per-point
/// biometrics are recovered from any extension namespace whose leaf names end
/// in hr/cad/power.
#[time]
pub(crate) fn decode_gpx(data: &[u8]) -> Result<Track, TrackfixError> {
    let mut xml_reader = Reader::from_reader(data);

    let mut metadata = TrackMetadata::with_format("gpx");
    let mut segments: Vec<TrackSegment> = Vec::new();
    let mut saw_gpx = false;

    loop {
        match xml_reader.read_event() {
            Ok(Event::Start(start)) => match start.name().as_ref() {
                b"gpx" => {
                    saw_gpx = true;
                }
                b"metadata" => {
                    parse_metadata(&mut xml_reader, &mut metadata)?;
                }
                b"trk" => {
                    parse_track(&mut xml_reader, &mut metadata, &mut segments)?;
                }
                _ => skip_element(&start, &mut xml_reader)?,
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(e.into()),
            _ => (),
        }
    }

    if !saw_gpx {
        return Err(TrackfixError::InvalidFormat(
            "no gpx element found".to_string(),
        ));
    }

    // A file with tracks but no points still materializes as an editable
    // track with one empty segment.
    if segments.is_empty() {
        segments.push(TrackSegment::default());
    }

    Ok(Track::new(segments, metadata))
}

/// Parses the 'metadata' element. Only the description and the activity start
/// time are carried over.
fn parse_metadata(
    xml_reader: &mut Reader<&[u8]>,
    metadata: &mut TrackMetadata,
) -> Result<(), TrackfixError> {
    loop {
        match xml_reader.read_event() {
            Ok(Event::Start(start)) => match start.name().as_ref() {
                b"desc" => {
                    if let Some(desc) = read_opt_text(xml_reader)? {
                        metadata.description = Some(desc);
                    }
                }
                b"time" => {
                    metadata.start_time = Some(xml_reader.read_inner_as_time()?);
                }
                _ => skip_element(&start, xml_reader)?,
            },
            Ok(Event::End(e)) if e.name().as_ref() == b"metadata" => return Ok(()),
            Ok(Event::End(_)) => {}
            Ok(Event::Text(_)) | Ok(Event::Empty(_)) => {}
            Ok(Event::Eof) => return Err(unexpected_eof()),
            Err(e) => return Err(e.into()),
            _ => (),
        }
    }
}

/// Parses one 'trk' element, appending a segment per 'trkseg'. The first
/// track's name and type become the track-level metadata.
fn parse_track(
    xml_reader: &mut Reader<&[u8]>,
    metadata: &mut TrackMetadata,
    segments: &mut Vec<TrackSegment>,
) -> Result<(), TrackfixError> {
    loop {
        match xml_reader.read_event() {
            Ok(Event::Start(start)) => match start.name().as_ref() {
                b"name" => {
                    if let Some(name) = read_opt_text(xml_reader)? {
                        metadata.name.get_or_insert(name);
                    }
                }
                b"type" => {
                    if let Some(sport) = read_opt_text(xml_reader)? {
                        metadata.sport.get_or_insert(sport);
                    }
                }
                b"trkseg" => {
                    segments.push(parse_track_segment(xml_reader)?);
                }
                _ => skip_element(&start, xml_reader)?,
            },
            Ok(Event::Empty(start)) if start.name().as_ref() == b"trkseg" => {
                segments.push(TrackSegment::default());
            }
            Ok(Event::End(e)) if e.name().as_ref() == b"trk" => return Ok(()),
            Ok(Event::End(_)) => {}
            Ok(Event::Text(_)) | Ok(Event::Empty(_)) => {}
            Ok(Event::Eof) => return Err(unexpected_eof()),
            Err(e) => return Err(e.into()),
            _ => (),
        }
    }
}

fn parse_track_segment(xml_reader: &mut Reader<&[u8]>) -> Result<TrackSegment, TrackfixError> {
    let mut segment = TrackSegment::default();

    loop {
        match xml_reader.read_event() {
            Ok(Event::Start(start)) => match start.name().as_ref() {
                b"trkpt" => {
                    segment.points.push(parse_trackpoint(&start, xml_reader)?);
                }
                _ => skip_element(&start, xml_reader)?,
            },
            Ok(Event::Empty(start)) if start.name().as_ref() == b"trkpt" => {
                // A point with attributes only, e.g. <trkpt lat=".." lon=".."/>.
                let mut attributes = Attributes::new(&start, xml_reader)?;
                let lat: f64 = attributes.get("lat")?;
                let lon: f64 = attributes.get("lon")?;
                check_decoded_coords(lat, lon)?;
                segment.points.push(TrackPoint::new(lat, lon));
            }
            Ok(Event::End(e)) if e.name().as_ref() == b"trkseg" => return Ok(segment),
            Ok(Event::End(_)) => {}
            Ok(Event::Text(_)) | Ok(Event::Empty(_)) => {}
            Ok(Event::Eof) => return Err(unexpected_eof()),
            Err(e) => return Err(e.into()),
            _ => (),
        }
    }
}

fn parse_trackpoint(
    start_element: &BytesStart<'_>,
    xml_reader: &mut Reader<&[u8]>,
) -> Result<TrackPoint, TrackfixError> {
    let mut attributes = Attributes::new(start_element, xml_reader)?;
    let lat: f64 = attributes.get("lat")?;
    let lon: f64 = attributes.get("lon")?;
    check_decoded_coords(lat, lon)?;

    let mut point = TrackPoint::new(lat, lon);

    loop {
        match xml_reader.read_event() {
            Ok(Event::Start(start)) => match start.name().as_ref() {
                b"ele" => {
                    point.ele = Some(xml_reader.read_inner_as()?);
                }
                b"time" => {
                    point.time = Some(xml_reader.read_inner_as_time()?);
                }
                b"extensions" => {
                    parse_point_extensions(xml_reader, &mut point)?;
                }
                _ => skip_element(&start, xml_reader)?,
            },
            Ok(Event::End(e)) if e.name().as_ref() == b"trkpt" => return Ok(point),
            Ok(Event::End(_)) => {}
            Ok(Event::Text(_)) | Ok(Event::Empty(_)) => {}
            Ok(Event::Eof) => return Err(unexpected_eof()),
            Err(e) => return Err(e.into()),
            _ => (),
        }
    }
}

/// Scans an 'extensions' subtree for biometric leaves. Container elements
/// such as gpxtpx:TrackPointExtension are descended into; a leaf matches when
/// its local name ends in hr, cad or power, case-insensitive, regardless of
/// namespace.
fn parse_point_extensions(
    xml_reader: &mut Reader<&[u8]>,
    point: &mut TrackPoint,
) -> Result<(), TrackfixError> {
    loop {
        match xml_reader.read_event() {
            Ok(Event::Start(start)) => {
                let local = start.local_name();
                let name = xml_reader
                    .bytes_to_string(local.as_ref())?
                    .to_ascii_lowercase();

                if name.ends_with("hr") {
                    point.hr = read_opt_text(xml_reader)?.as_deref().and_then(parse_int_lenient);
                } else if name.ends_with("cad") {
                    point.cadence =
                        read_opt_text(xml_reader)?.as_deref().and_then(parse_int_lenient);
                } else if name.ends_with("power") {
                    point.power =
                        read_opt_text(xml_reader)?.as_deref().and_then(parse_int_lenient);
                }
                // Anything else is a container or an unrecognized leaf; keep
                // walking so values nested under TrackPointExtension are found.
            }
            Ok(Event::End(e)) if e.local_name().as_ref() == b"extensions" => return Ok(()),
            Ok(Event::End(_)) => {}
            Ok(Event::Text(_)) | Ok(Event::Empty(_)) => {}
            Ok(Event::Eof) => return Err(unexpected_eof()),
            Err(e) => return Err(e.into()),
            _ => (),
        }
    }
}

/// Reads the text content of a leaf element, returning None for an empty one.
fn read_opt_text(xml_reader: &mut Reader<&[u8]>) -> Result<Option<String>, TrackfixError> {
    match xml_reader.read_event() {
        Ok(Event::Text(text)) => Ok(Some(xml_reader.bytes_to_string(&text)?)),
        Ok(Event::End(_)) => Ok(None),
        Ok(event) => Err(TrackfixError::InvalidFormat(format!(
            "expected text, got {event:?}"
        ))),
        Err(e) => Err(e.into()),
    }
}
