use serde::{Deserialize, Serialize};
use trackfix_core::model::{GpsStuck, Track};

#[derive(Debug, Deserialize)]
pub(crate) struct SessionRequest {
    pub session_id: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct InsertPointRequest {
    pub session_id: String,
    pub segment_idx: usize,
    /// −1 prepends; the last index appends; anything between interpolates.
    pub prev_point_idx: isize,
    pub lat: f64,
    pub lon: f64,
}

#[derive(Debug, Deserialize)]
pub(crate) struct UpdateTimeRequest {
    pub session_id: String,
    pub segment_idx: usize,
    pub point_idx: usize,
    /// ISO-8601; parsed in the handler so a bad instant surfaces as a 400.
    pub new_time: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RerouteRequest {
    pub session_id: String,
    pub segment_idx: usize,
    pub point_idx: usize,
    pub new_lat: f64,
    pub new_lon: f64,
    #[serde(default = "default_reroute_mode")]
    pub mode: String,
    pub radius_m: f64,
}

fn default_reroute_mode() -> String {
    "straight".to_string()
}

#[derive(Debug, Deserialize)]
pub(crate) struct TrimRequest {
    pub session_id: String,
    pub start_idx: usize,
    pub end_idx: usize,
}

#[derive(Debug, Deserialize)]
pub(crate) struct NormalizePreviewRequest {
    pub session_id: String,
    pub max_speed: f64,
    pub min_points: usize,
}

#[derive(Debug, Deserialize)]
pub(crate) struct NormalizeApplyRequest {
    pub session_id: String,
    pub stucks: Vec<GpsStuck>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SessionQuery {
    pub session_id: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ExportQuery {
    pub session_id: String,
    pub fmt: String,
    pub name: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct UploadResponse {
    pub session_id: String,
    pub track: Track,
}

#[derive(Debug, Serialize)]
pub(crate) struct TrackResponse {
    pub track: Track,
}

#[derive(Debug, Serialize)]
pub(crate) struct StucksResponse {
    pub stucks: Vec<GpsStuck>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reroute_mode_defaults_to_straight() {
        let req: RerouteRequest = serde_json::from_str(
            r#"{"session_id":"s","segment_idx":0,"point_idx":1,
                "new_lat":1.0,"new_lon":2.0,"radius_m":15.0}"#,
        )
        .unwrap();
        assert_eq!(req.mode, "straight");
    }

    #[test]
    fn insert_accepts_a_prepend_index() {
        let req: InsertPointRequest = serde_json::from_str(
            r#"{"session_id":"s","segment_idx":0,"prev_point_idx":-1,"lat":0.0,"lon":0.0}"#,
        )
        .unwrap();
        assert_eq!(req.prev_point_idx, -1);
    }
}
