use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Mints an editor-only point identifier. Ids are assigned on decode and on
/// insertion, survive edits, and are stripped when encoding back to a file
/// format.
pub fn mint_point_id() -> String {
    Uuid::new_v4().simple().to_string()
}

/// A single GPS sample. `lat`/`lon` are WGS84 decimal degrees; they are
/// optional because the TCX decoder keeps coordinate-less trackpoints so that
/// indices stay aligned with the source file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackPoint {
    #[serde(default = "mint_point_id")]
    pub id: String,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub ele: Option<f64>,
    pub time: Option<DateTime<Utc>>,
    pub hr: Option<u32>,
    pub cadence: Option<u32>,
    pub power: Option<u32>,
}

impl TrackPoint {
    /// Creates a point at the given coordinates with a freshly minted id and
    /// no auxiliary fields.
    pub fn new(lat: f64, lon: f64) -> Self {
        Self {
            id: mint_point_id(),
            lat: Some(lat),
            lon: Some(lon),
            ele: None,
            time: None,
            hr: None,
            cadence: None,
            power: None,
        }
    }

    /// The coordinate pair, when both halves are present.
    pub fn coords(&self) -> Option<(f64, f64)> {
        match (self.lat, self.lon) {
            (Some(lat), Some(lon)) => Some((lat, lon)),
            _ => None,
        }
    }
}

/// An ordered run of points. Within a segment, timestamps (where present) are
/// monotonically non-decreasing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrackSegment {
    pub points: Vec<TrackPoint>,
}

impl TrackSegment {
    pub fn new(points: Vec<TrackPoint>) -> Self {
        Self { points }
    }
}

/// Format-originated attributes describing the activity as a whole. The
/// record is open: decoders fill what the source provides and absent keys are
/// omitted from the serialized form.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrackMetadata {
    pub format: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sport: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manufacturer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,
    /// Total elapsed time in seconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    /// Total distance in metres.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance: Option<f64>,
}

impl TrackMetadata {
    pub fn with_format(format: &str) -> Self {
        Self {
            format: format.to_string(),
            ..Default::default()
        }
    }
}

/// The three-level geometric model: a recorded activity, its contiguous runs,
/// its samples. Deep copies (for the undo history) are plain `clone()` calls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    pub segments: Vec<TrackSegment>,
    pub metadata: TrackMetadata,
}

impl Track {
    pub fn new(segments: Vec<TrackSegment>, metadata: TrackMetadata) -> Self {
        Self { segments, metadata }
    }

    /// Total number of points across all segments.
    pub fn num_points(&self) -> usize {
        self.segments.iter().map(|s| s.points.len()).sum()
    }

    /// The canonical dictionary projection used by the external JSON
    /// contract: segments as ordered point lists, metadata flat, instants as
    /// ISO-8601.
    pub fn to_dict(&self) -> serde_json::Value {
        // Serialization of this model cannot fail: no maps with non-string
        // keys, no non-finite float formatting in serde_json's default mode
        // for Option<f64> values read from codecs.
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }

    /// True when every point id is distinct. The editor relies on this to
    /// address points from the front end.
    pub fn ids_are_unique(&self) -> bool {
        let mut seen = HashSet::new();
        for segment in &self.segments {
            for point in &segment.points {
                if !seen.insert(point.id.as_str()) {
                    return false;
                }
            }
        }
        true
    }
}

/// A detected anomaly region: a contiguous run of points that sit on top of
/// each other, terminated by an anomalous jump. `start_idx` is the last good
/// point before the run, `end_idx` the first good point after it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GpsStuck {
    pub segment_idx: usize,
    pub start_idx: usize,
    pub end_idx: usize,
    pub stuck_indices: Vec<usize>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn point_ids_are_minted_unique() {
        let a = TrackPoint::new(1.0, 2.0);
        let b = TrackPoint::new(1.0, 2.0);
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn coords_requires_both_halves() {
        let mut p = TrackPoint::new(1.0, 2.0);
        assert_eq!(p.coords(), Some((1.0, 2.0)));
        p.lon = None;
        assert_eq!(p.coords(), None);
    }

    #[test]
    fn to_dict_has_the_contract_shape() {
        let mut p = TrackPoint::new(10.5, -3.25);
        p.time = Some(Utc.with_ymd_and_hms(2024, 6, 1, 8, 0, 0).unwrap());
        p.hr = Some(140);
        let track = Track::new(
            vec![TrackSegment::new(vec![p])],
            TrackMetadata::with_format("gpx"),
        );

        let dict = track.to_dict();
        let point = &dict["segments"][0]["points"][0];
        assert_eq!(point["lat"], 10.5);
        assert_eq!(point["lon"], -3.25);
        assert_eq!(point["time"], "2024-06-01T08:00:00Z");
        assert_eq!(point["hr"], 140);
        assert!(point["ele"].is_null());
        assert_eq!(dict["metadata"]["format"], "gpx");
        // Absent metadata keys are omitted, not null.
        assert!(dict["metadata"].get("name").is_none());
    }

    #[test]
    fn deep_clone_is_independent() {
        let track = Track::new(
            vec![TrackSegment::new(vec![TrackPoint::new(1.0, 2.0)])],
            TrackMetadata::with_format("gpx"),
        );
        let mut copy = track.clone();
        copy.segments[0].points[0].lat = Some(99.0);
        assert_eq!(track.segments[0].points[0].lat, Some(1.0));
    }

    #[test]
    fn ids_are_unique_detects_duplicates() {
        let p = TrackPoint::new(1.0, 2.0);
        let dup = p.clone();
        let track = Track::new(
            vec![TrackSegment::new(vec![p, dup])],
            TrackMetadata::with_format("gpx"),
        );
        assert!(!track.ids_are_unique());
    }
}
