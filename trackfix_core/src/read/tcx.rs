use logging_timer::time;
use quick_xml::{events::Event, Reader};

use crate::{
    error::TrackfixError,
    model::{mint_point_id, Track, TrackMetadata, TrackPoint, TrackSegment},
};

use super::{
    attributes::Attributes, check_decoded_coords, parse_int_lenient, skip_element,
    unexpected_eof, XmlReaderExtensions,
};

/// Decodes a Garmin TCX document. The tree is
/// TrainingCenterDatabase/Activities/Activity/Lap/Track/Trackpoint; each lap
/// becomes one segment. Trackpoints without a Position are kept with null
/// coordinates so indices stay aligned with the source file.
#[time]
pub(crate) fn decode_tcx(data: &[u8]) -> Result<Track, TrackfixError> {
    let mut xml_reader = Reader::from_reader(data);

    let mut metadata = TrackMetadata::with_format("tcx");
    let mut segments: Vec<TrackSegment> = Vec::new();
    let mut saw_activity = false;

    loop {
        match xml_reader.read_event() {
            Ok(Event::Start(start)) => match start.local_name().as_ref() {
                b"TrainingCenterDatabase" | b"Activities" => {}
                b"Activity" => {
                    saw_activity = true;
                    let mut attributes = Attributes::new(&start, &xml_reader)?;
                    if let Some(sport) = attributes.get_opt::<_, String>("Sport")? {
                        metadata.sport = Some(sport.to_lowercase());
                    }
                    parse_activity(&mut xml_reader, &mut metadata, &mut segments)?;
                }
                _ => skip_element(&start, &mut xml_reader)?,
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(e.into()),
            _ => (),
        }
    }

    if !saw_activity {
        return Err(TrackfixError::InvalidFormat(
            "no Activity element found".to_string(),
        ));
    }

    if segments.is_empty() {
        segments.push(TrackSegment::default());
    }

    Ok(Track::new(segments, metadata))
}

fn parse_activity(
    xml_reader: &mut Reader<&[u8]>,
    metadata: &mut TrackMetadata,
    segments: &mut Vec<TrackSegment>,
) -> Result<(), TrackfixError> {
    loop {
        match xml_reader.read_event() {
            Ok(Event::Start(start)) => match start.local_name().as_ref() {
                b"Id" => {
                    // The activity id is its start instant.
                    metadata.start_time = Some(xml_reader.read_inner_as_time()?);
                }
                b"Lap" => {
                    let segment = parse_lap(xml_reader)?;
                    if !segment.points.is_empty() {
                        segments.push(segment);
                    }
                }
                _ => skip_element(&start, xml_reader)?,
            },
            Ok(Event::End(e)) if e.local_name().as_ref() == b"Activity" => return Ok(()),
            Ok(Event::End(_)) => {}
            Ok(Event::Text(_)) | Ok(Event::Empty(_)) => {}
            Ok(Event::Eof) => return Err(unexpected_eof()),
            Err(e) => return Err(e.into()),
            _ => (),
        }
    }
}

/// Parses one Lap. A lap may carry several Track blocks; their trackpoints
/// coalesce into the lap's segment.
fn parse_lap(xml_reader: &mut Reader<&[u8]>) -> Result<TrackSegment, TrackfixError> {
    let mut segment = TrackSegment::default();

    loop {
        match xml_reader.read_event() {
            Ok(Event::Start(start)) => match start.local_name().as_ref() {
                b"Track" => {
                    parse_tcx_track(xml_reader, &mut segment.points)?;
                }
                _ => skip_element(&start, xml_reader)?,
            },
            Ok(Event::End(e)) if e.local_name().as_ref() == b"Lap" => return Ok(segment),
            Ok(Event::End(_)) => {}
            Ok(Event::Text(_)) | Ok(Event::Empty(_)) => {}
            Ok(Event::Eof) => return Err(unexpected_eof()),
            Err(e) => return Err(e.into()),
            _ => (),
        }
    }
}

fn parse_tcx_track(
    xml_reader: &mut Reader<&[u8]>,
    points: &mut Vec<TrackPoint>,
) -> Result<(), TrackfixError> {
    loop {
        match xml_reader.read_event() {
            Ok(Event::Start(start)) => match start.local_name().as_ref() {
                b"Trackpoint" => {
                    points.push(parse_trackpoint(xml_reader)?);
                }
                _ => skip_element(&start, xml_reader)?,
            },
            Ok(Event::End(e)) if e.local_name().as_ref() == b"Track" => return Ok(()),
            Ok(Event::End(_)) => {}
            Ok(Event::Text(_)) | Ok(Event::Empty(_)) => {}
            Ok(Event::Eof) => return Err(unexpected_eof()),
            Err(e) => return Err(e.into()),
            _ => (),
        }
    }
}

fn parse_trackpoint(xml_reader: &mut Reader<&[u8]>) -> Result<TrackPoint, TrackfixError> {
    let mut point = TrackPoint {
        id: mint_point_id(),
        lat: None,
        lon: None,
        ele: None,
        time: None,
        hr: None,
        cadence: None,
        power: None,
    };

    loop {
        match xml_reader.read_event() {
            Ok(Event::Start(start)) => match start.local_name().as_ref() {
                b"Position" => parse_position(xml_reader, &mut point)?,
                b"AltitudeMeters" => {
                    point.ele = Some(xml_reader.read_inner_as()?);
                }
                b"Time" => {
                    point.time = Some(xml_reader.read_inner_as_time()?);
                }
                b"HeartRateBpm" => {
                    point.hr = parse_heart_rate(xml_reader)?;
                }
                b"Cadence" => {
                    let raw = xml_reader.read_inner_as_string()?;
                    point.cadence = parse_int_lenient(&raw);
                }
                b"Extensions" => {
                    parse_trackpoint_extensions(xml_reader, &mut point)?;
                }
                _ => skip_element(&start, xml_reader)?,
            },
            Ok(Event::End(e)) if e.local_name().as_ref() == b"Trackpoint" => {
                // Absent coordinate halves stay None; present ones must be
                // finite and in range.
                check_decoded_coords(point.lat.unwrap_or(0.0), point.lon.unwrap_or(0.0))?;
                return Ok(point);
            }
            Ok(Event::End(_)) => {}
            Ok(Event::Text(_)) | Ok(Event::Empty(_)) => {}
            Ok(Event::Eof) => return Err(unexpected_eof()),
            Err(e) => return Err(e.into()),
            _ => (),
        }
    }
}

fn parse_position(
    xml_reader: &mut Reader<&[u8]>,
    point: &mut TrackPoint,
) -> Result<(), TrackfixError> {
    loop {
        match xml_reader.read_event() {
            Ok(Event::Start(start)) => match start.local_name().as_ref() {
                b"LatitudeDegrees" => {
                    point.lat = Some(xml_reader.read_inner_as()?);
                }
                b"LongitudeDegrees" => {
                    point.lon = Some(xml_reader.read_inner_as()?);
                }
                _ => skip_element(&start, xml_reader)?,
            },
            Ok(Event::End(e)) if e.local_name().as_ref() == b"Position" => return Ok(()),
            Ok(Event::End(_)) => {}
            Ok(Event::Text(_)) | Ok(Event::Empty(_)) => {}
            Ok(Event::Eof) => return Err(unexpected_eof()),
            Err(e) => return Err(e.into()),
            _ => (),
        }
    }
}

fn parse_heart_rate(xml_reader: &mut Reader<&[u8]>) -> Result<Option<u32>, TrackfixError> {
    let mut hr = None;

    loop {
        match xml_reader.read_event() {
            Ok(Event::Start(start)) => match start.local_name().as_ref() {
                b"Value" => {
                    let raw = xml_reader.read_inner_as_string()?;
                    hr = parse_int_lenient(&raw);
                }
                _ => skip_element(&start, xml_reader)?,
            },
            Ok(Event::End(e)) if e.local_name().as_ref() == b"HeartRateBpm" => return Ok(hr),
            Ok(Event::End(_)) => {}
            Ok(Event::Text(_)) | Ok(Event::Empty(_)) => {}
            Ok(Event::Eof) => return Err(unexpected_eof()),
            Err(e) => return Err(e.into()),
            _ => (),
        }
    }
}

/// Scans the Trackpoint Extensions subtree for the Garmin TPX watts leaf.
fn parse_trackpoint_extensions(
    xml_reader: &mut Reader<&[u8]>,
    point: &mut TrackPoint,
) -> Result<(), TrackfixError> {
    loop {
        match xml_reader.read_event() {
            Ok(Event::Start(start)) => {
                if start.local_name().as_ref() == b"Watts" {
                    let raw = xml_reader.read_inner_as_string()?;
                    point.power = parse_int_lenient(&raw);
                }
                // Containers such as TPX are descended into.
            }
            Ok(Event::End(e)) if e.local_name().as_ref() == b"Extensions" => return Ok(()),
            Ok(Event::End(_)) => {}
            Ok(Event::Text(_)) | Ok(Event::Empty(_)) => {}
            Ok(Event::Eof) => return Err(unexpected_eof()),
            Err(e) => return Err(e.into()),
            _ => (),
        }
    }
}
