use chrono::{DateTime, Utc};
use fitparser::{profile::MesgNum, FitDataField, Value};
use logging_timer::time;

use crate::{
    error::TrackfixError,
    model::{Track, TrackMetadata, TrackPoint, TrackSegment},
};

use super::check_decoded_coords;

/// One semicircle is 180/2^31 degrees; FIT stores coordinates in this unit.
const SEMICIRCLE_DEGREES: f64 = 180.0 / (1u64 << 31) as f64;

pub fn semicircles_to_degrees(semicircles: f64) -> f64 {
    semicircles * SEMICIRCLE_DEGREES
}

/// Decodes a FIT activity file. All record frames are collected into a single
/// segment; file_id, sport and session frames contribute metadata only.
#[time]
pub(crate) fn decode_fit(data: &[u8]) -> Result<Track, TrackfixError> {
    let fit_data = fitparser::from_bytes(data)?;

    let mut metadata = TrackMetadata::with_format("fit");
    let mut points: Vec<TrackPoint> = Vec::new();

    for record in fit_data {
        match record.kind() {
            MesgNum::FileId => {
                if let Some(value) = get_field_value(record.fields(), "manufacturer") {
                    metadata.manufacturer = Some(value.to_string());
                }
                // The product field is resolved to a named subfield for known
                // manufacturers (e.g. garmin_product).
                if let Some(value) = get_field_value(record.fields(), "garmin_product")
                    .or_else(|| get_field_value(record.fields(), "product"))
                {
                    metadata.product = Some(value.to_string());
                }
            }
            MesgNum::Sport => {
                if let Some(value) = get_field_value(record.fields(), "sport") {
                    metadata.sport = Some(value.to_string());
                }
            }
            MesgNum::Session => {
                if let Some(ts) = get_field_timestamp(record.fields(), "start_time") {
                    metadata.start_time = Some(ts);
                }
                if let Some(secs) = get_field_f64(record.fields(), "total_elapsed_time") {
                    metadata.duration = Some(secs);
                }
                if let Some(metres) = get_field_f64(record.fields(), "total_distance") {
                    metadata.distance = Some(metres);
                }
            }
            MesgNum::Record => {
                if let Some(point) = parse_record(record.fields())? {
                    points.push(point);
                }
            }
            _ => {}
        }
    }

    Ok(Track::new(
        vec![TrackSegment::new(points)],
        metadata,
    ))
}

/// Parses one record frame into a point. Records missing either coordinate
/// are skipped; there tend to be a lot of these at the start of an activity
/// while the device acquires a fix, so nothing is logged. A coordinate that
/// decodes outside WGS84 means the file is corrupt.
fn parse_record(fields: &[FitDataField]) -> Result<Option<TrackPoint>, TrackfixError> {
    let (Some(lat_semi), Some(lon_semi)) = (
        get_field_f64(fields, "position_lat"),
        get_field_f64(fields, "position_long"),
    ) else {
        return Ok(None);
    };

    let lat = semicircles_to_degrees(lat_semi);
    let lon = semicircles_to_degrees(lon_semi);
    check_decoded_coords(lat, lon)?;

    let mut point = TrackPoint::new(lat, lon);

    point.ele = get_field_f64(fields, "enhanced_altitude")
        .or_else(|| get_field_f64(fields, "altitude"));
    point.time = get_field_timestamp(fields, "timestamp");
    point.hr = get_field_u32(fields, "heart_rate");
    point.cadence = get_field_u32(fields, "cadence");
    point.power = get_field_u32(fields, "power");

    Ok(Some(point))
}

fn get_field_value<'a>(fields: &'a [FitDataField], name: &str) -> Option<&'a Value> {
    fields.iter().find(|f| f.name() == name).map(|f| f.value())
}

fn get_field_timestamp(fields: &[FitDataField], name: &str) -> Option<DateTime<Utc>> {
    match get_field_value(fields, name) {
        Some(Value::Timestamp(ts)) => Some(ts.with_timezone(&Utc)),
        _ => None,
    }
}

/// Gets a field value as an f64, converting the numeric Value variants.
fn get_field_f64(fields: &[FitDataField], name: &str) -> Option<f64> {
    match get_field_value(fields, name)? {
        Value::Byte(v) => Some(f64::from(*v)),
        Value::SInt8(v) => Some(f64::from(*v)),
        Value::UInt8(v) => Some(f64::from(*v)),
        Value::SInt16(v) => Some(f64::from(*v)),
        Value::UInt16(v) => Some(f64::from(*v)),
        Value::SInt32(v) => Some(f64::from(*v)),
        Value::UInt32(v) => Some(f64::from(*v)),
        Value::SInt64(v) => Some(*v as f64),
        Value::UInt64(v) => Some(*v as f64),
        Value::UInt8z(v) => Some(f64::from(*v)),
        Value::UInt16z(v) => Some(f64::from(*v)),
        Value::UInt32z(v) => Some(f64::from(*v)),
        Value::UInt64z(v) => Some(*v as f64),
        Value::Float32(v) => Some(f64::from(*v)),
        Value::Float64(v) => Some(*v),
        _ => None,
    }
}

fn get_field_u32(fields: &[FitDataField], name: &str) -> Option<u32> {
    let v = get_field_f64(fields, name)?;
    if v < 0.0 {
        return None;
    }
    Some(v.round() as u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn semicircle_conversion_matches_the_fit_unit() {
        // 2^31 semicircles is half a turn.
        assert!((semicircles_to_degrees((1u64 << 31) as f64) - 180.0).abs() < 1e-9);
        assert!((semicircles_to_degrees((1u64 << 30) as f64) - 90.0).abs() < 1e-9);
        assert!((semicircles_to_degrees(536_870_912.0) - 45.0).abs() < 1e-9);
        assert!((semicircles_to_degrees(-536_870_912.0) + 45.0).abs() < 1e-9);
        assert_eq!(semicircles_to_degrees(0.0), 0.0);
    }

    #[test]
    fn garbage_bytes_are_invalid() {
        assert!(matches!(
            decode_fit(b"definitely not a fit file"),
            Err(TrackfixError::InvalidFormat(_))
        ));
    }
}
