use std::io::Write;

use logging_timer::time;
use quick_xml::escape::escape;

use crate::{
    dates::format_utc_date,
    error::TrackfixError,
    model::{Track, TrackPoint, TrackSegment},
};

/// Encodes a track as a GPX 1.1 document and returns the bytes.
pub fn write_gpx_to_vec(track: &Track) -> Result<Vec<u8>, TrackfixError> {
    let mut buffer = Vec::new();
    write_gpx(&mut buffer, track)?;
    Ok(buffer)
}

/// Writes a GPX 1.1 document to the specified writer. Editor-only point ids
/// are not written; biometrics go into the gpxtpx TrackPointExtension
/// namespace.
#[time]
pub fn write_gpx<W: Write>(w: &mut W, track: &Track) -> Result<(), TrackfixError> {
    writeln!(w, "<?xml version=\"1.0\" encoding=\"UTF-8\"?>")?;
    writeln!(
        w,
        "<gpx creator=\"{}\" version=\"1.1\"",
        env!("CARGO_PKG_NAME")
    )?;
    writeln!(w, "  xmlns=\"http://www.topografix.com/GPX/1/1\"")?;
    writeln!(
        w,
        "  xmlns:gpxtpx=\"http://www.garmin.com/xmlschemas/TrackPointExtension/v1\">"
    )?;

    write_metadata_element(w, track)?;
    write_track_element(w, track)?;

    writeln!(w, "</gpx>")?;
    w.flush()?;
    Ok(())
}

fn write_metadata_element<W: Write>(w: &mut W, track: &Track) -> Result<(), TrackfixError> {
    let md = &track.metadata;
    if md.start_time.is_none() && md.description.is_none() {
        return Ok(());
    }

    writeln!(w, "  <metadata>")?;
    if let Some(time) = &md.start_time {
        writeln!(w, "    <time>{}</time>", format_utc_date(time))?;
    }
    if let Some(desc) = &md.description {
        writeln!(w, "    <desc>{}</desc>", escape(desc.as_str()))?;
    }
    writeln!(w, "  </metadata>")?;
    Ok(())
}

fn write_track_element<W: Write>(w: &mut W, track: &Track) -> Result<(), TrackfixError> {
    let md = &track.metadata;

    writeln!(w, "  <trk>")?;
    if let Some(name) = &md.name {
        writeln!(w, "    <name>{}</name>", escape(name.as_str()))?;
    }
    if let Some(sport) = &md.sport {
        writeln!(w, "    <type>{}</type>", escape(sport.as_str()))?;
    }
    if let Some(desc) = &md.description {
        writeln!(w, "    <desc>{}</desc>", escape(desc.as_str()))?;
    }

    for segment in &track.segments {
        write_track_segment(w, segment)?;
    }

    writeln!(w, "  </trk>")?;
    Ok(())
}

fn write_track_segment<W: Write>(w: &mut W, segment: &TrackSegment) -> Result<(), TrackfixError> {
    writeln!(w, "    <trkseg>")?;
    for point in &segment.points {
        write_trackpoint(w, point)?;
    }
    writeln!(w, "    </trkseg>")?;
    Ok(())
}

fn write_trackpoint<W: Write>(w: &mut W, point: &TrackPoint) -> Result<(), TrackfixError> {
    // A coordinate-less point (possible in TCX sources) cannot be expressed
    // as a trkpt.
    let Some((lat, lon)) = point.coords() else {
        return Ok(());
    };

    // Full-precision coordinates so a decode of the output reproduces the
    // input exactly.
    writeln!(w, "      <trkpt lat=\"{lat}\" lon=\"{lon}\">")?;

    if let Some(ele) = point.ele {
        writeln!(w, "        <ele>{ele}</ele>")?;
    }
    if let Some(time) = &point.time {
        writeln!(w, "        <time>{}</time>", format_utc_date(time))?;
    }

    if point.hr.is_some() || point.cadence.is_some() || point.power.is_some() {
        writeln!(w, "        <extensions>")?;
        writeln!(w, "          <gpxtpx:TrackPointExtension>")?;
        if let Some(hr) = point.hr {
            writeln!(w, "            <gpxtpx:hr>{hr}</gpxtpx:hr>")?;
        }
        if let Some(cadence) = point.cadence {
            writeln!(w, "            <gpxtpx:cad>{cadence}</gpxtpx:cad>")?;
        }
        if let Some(power) = point.power {
            writeln!(w, "            <gpxtpx:power>{power}</gpxtpx:power>")?;
        }
        writeln!(w, "          </gpxtpx:TrackPointExtension>")?;
        writeln!(w, "        </extensions>")?;
    }

    writeln!(w, "      </trkpt>")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        model::{TrackMetadata, TrackPoint, TrackSegment},
        read::decode_upload,
    };
    use chrono::{Duration, TimeZone, Utc};

    fn sample_track() -> Track {
        let mut a = TrackPoint::new(51.4721, -0.292);
        a.ele = Some(12.2);
        a.time = Some(Utc.with_ymd_and_hms(2024, 6, 1, 8, 0, 0).unwrap());
        a.hr = Some(141);
        a.cadence = Some(87);
        a.power = Some(243);

        let mut b = TrackPoint::new(51.4722, -0.2921);
        b.ele = Some(12.4);
        b.time = Some(Utc.with_ymd_and_hms(2024, 6, 1, 8, 0, 1).unwrap());

        let mut metadata = TrackMetadata::with_format("gpx");
        metadata.name = Some("Richmond Loop".to_string());
        metadata.sport = Some("cycling".to_string());
        metadata.description = Some("Morning ride".to_string());
        metadata.start_time = Some(Utc.with_ymd_and_hms(2024, 6, 1, 8, 0, 0).unwrap());

        Track::new(
            vec![
                TrackSegment::new(vec![a]),
                TrackSegment::new(vec![b]),
            ],
            metadata,
        )
    }

    #[test]
    fn encode_decode_round_trips_field_by_field() {
        let original = sample_track();
        let bytes = write_gpx_to_vec(&original).unwrap();
        let decoded = decode_upload("out.gpx", &bytes).unwrap();

        assert_eq!(decoded.segments.len(), original.segments.len());
        assert_eq!(decoded.metadata.name, original.metadata.name);
        assert_eq!(decoded.metadata.sport, original.metadata.sport);
        assert_eq!(decoded.metadata.description, original.metadata.description);
        assert_eq!(decoded.metadata.start_time, original.metadata.start_time);

        for (seg_out, seg_in) in decoded.segments.iter().zip(&original.segments) {
            assert_eq!(seg_out.points.len(), seg_in.points.len());
            for (out, inp) in seg_out.points.iter().zip(&seg_in.points) {
                // Ids are editor-only and freshly minted on decode.
                assert_ne!(out.id, inp.id);
                assert_eq!(out.lat, inp.lat);
                assert_eq!(out.lon, inp.lon);
                assert_eq!(out.ele, inp.ele);
                assert_eq!(out.time, inp.time);
                assert_eq!(out.hr, inp.hr);
                assert_eq!(out.cadence, inp.cadence);
                assert_eq!(out.power, inp.power);
            }
        }
    }

    #[test]
    fn round_trip_preserves_subsecond_times() {
        let mut p = TrackPoint::new(10.0, 20.0);
        p.time = Some(
            Utc.with_ymd_and_hms(2024, 6, 1, 8, 0, 0).unwrap() + Duration::milliseconds(437),
        );

        let track = Track::new(
            vec![TrackSegment::new(vec![p.clone()])],
            TrackMetadata::with_format("gpx"),
        );
        let bytes = write_gpx_to_vec(&track).unwrap();
        let decoded = decode_upload("out.gpx", &bytes).unwrap();

        assert_eq!(decoded.segments[0].points[0].time, p.time);
    }

    #[test]
    fn only_present_biometrics_are_written() {
        let mut p = TrackPoint::new(1.0, 2.0);
        p.hr = Some(100);
        let track = Track::new(
            vec![TrackSegment::new(vec![p])],
            TrackMetadata::with_format("gpx"),
        );

        let xml = String::from_utf8(write_gpx_to_vec(&track).unwrap()).unwrap();
        assert!(xml.contains("<gpxtpx:hr>100</gpxtpx:hr>"));
        assert!(!xml.contains("gpxtpx:cad"));
        assert!(!xml.contains("gpxtpx:power"));
    }

    #[test]
    fn points_without_coordinates_are_skipped() {
        let mut p = TrackPoint::new(1.0, 2.0);
        p.lat = None;
        let track = Track::new(
            vec![TrackSegment::new(vec![p, TrackPoint::new(3.0, 4.0)])],
            TrackMetadata::with_format("tcx"),
        );

        let xml = String::from_utf8(write_gpx_to_vec(&track).unwrap()).unwrap();
        assert_eq!(xml.matches("<trkpt").count(), 1);
    }

    #[test]
    fn text_content_is_escaped() {
        let mut metadata = TrackMetadata::with_format("gpx");
        metadata.name = Some("Out & back <loop>".to_string());
        let track = Track::new(vec![TrackSegment::default()], metadata);

        let xml = String::from_utf8(write_gpx_to_vec(&track).unwrap()).unwrap();
        assert!(xml.contains("<name>Out &amp; back &lt;loop&gt;</name>"));
    }

    #[test]
    fn ids_are_never_written() {
        let track = sample_track();
        let id = track.segments[0].points[0].id.clone();
        let xml = String::from_utf8(write_gpx_to_vec(&track).unwrap()).unwrap();
        assert!(!xml.contains(&id));
    }
}
