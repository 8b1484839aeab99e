use chrono::{DateTime, Duration, Utc};

use crate::{
    error::TrackfixError,
    geo::{haversine, interp, interp_int, validate_coords},
    model::{GpsStuck, Track, TrackPoint, TrackSegment},
};

/// Maximum number of snapshots retained in the undo history.
pub const MAX_HISTORY: usize = 10;

/// Average speed fallback (m/s) when the metadata carries no usable
/// distance/duration pair.
const DEFAULT_SPEED_MS: f64 = 5.0;

/// Points within this distance of a run's origin count as stuck.
const STUCK_RADIUS_M: f64 = 1.0;

/// Half-width of the index window an elastic reroute may touch.
const REROUTE_WINDOW: usize = 100;

/// The stateful editing context for one uploaded track.
///
/// The history is a bounded ring of whole-track snapshots. The first snapshot
/// is the original; every successful edit pushes the resulting state, so undo
/// walks backward through realized states. Every operation follows the same
/// discipline: validate, mutate, snapshot — a failed precondition leaves both
/// the track and the history untouched.
#[derive(Debug)]
pub struct EditingSession {
    original_track: Track,
    current_track: Track,
    history: Vec<Track>,
    history_idx: usize,
}

impl EditingSession {
    pub fn new(track: Track) -> Self {
        Self {
            original_track: track.clone(),
            history: vec![track.clone()],
            history_idx: 0,
            current_track: track,
        }
    }

    /// The live state of the track.
    pub fn current_track(&self) -> &Track {
        &self.current_track
    }

    /// The track as it was decoded, untouched by any edit.
    pub fn original_track(&self) -> &Track {
        &self.original_track
    }

    /// Appends a deep copy of the post-edit state. Redo states beyond the
    /// live snapshot are discarded, and the ring is bounded by dropping the
    /// oldest snapshot.
    fn snapshot(&mut self) {
        if self.history_idx < self.history.len() - 1 {
            self.history.truncate(self.history_idx + 1);
        }
        self.history.push(self.current_track.clone());
        self.history_idx += 1;
        if self.history.len() > MAX_HISTORY {
            self.history.remove(0);
            self.history_idx -= 1;
        }
    }

    /// Steps back one snapshot. Returns false (and leaves the track alone)
    /// when there is nothing to undo.
    pub fn undo(&mut self) -> bool {
        if self.history_idx == 0 {
            return false;
        }
        self.history_idx -= 1;
        self.current_track = self.history[self.history_idx].clone();
        true
    }

    /// Steps forward one snapshot. Returns false when there is nothing to
    /// redo.
    pub fn redo(&mut self) -> bool {
        if self.history_idx + 1 >= self.history.len() {
            return false;
        }
        self.history_idx += 1;
        self.current_track = self.history[self.history_idx].clone();
        true
    }

    /// Drops all but the first snapshot and restores the original state.
    pub fn reset(&mut self) {
        self.history.truncate(1);
        self.history_idx = 0;
        self.current_track = self.original_track.clone();
    }

    /// Average speed over the whole activity, used to synthesize timestamps
    /// for inserted points.
    fn average_speed(&self) -> f64 {
        let md = &self.current_track.metadata;
        match (md.distance, md.duration) {
            (Some(distance), Some(duration)) if duration > 0.0 && distance > 0.0 => {
                distance / duration
            }
            _ => DEFAULT_SPEED_MS,
        }
    }

    /// Inserts a new point after `prev_point_idx` (−1 prepends) and
    /// synthesizes its time and biometrics from its neighbors.
    pub fn insert_point(
        &mut self,
        segment_idx: usize,
        prev_point_idx: isize,
        lat: f64,
        lon: f64,
    ) -> Result<(), TrackfixError> {
        validate_coords(lat, lon)?;
        let speed = self.average_speed();

        let segment = self
            .current_track
            .segments
            .get_mut(segment_idx)
            .ok_or_else(|| TrackfixError::OutOfRange(format!("segment index {segment_idx}")))?;
        let len = segment.points.len();
        if len == 0 {
            return Err(TrackfixError::OutOfRange(
                "cannot insert into an empty segment".to_string(),
            ));
        }
        if prev_point_idx < -1 || prev_point_idx >= len as isize {
            return Err(TrackfixError::OutOfRange(format!(
                "point index {prev_point_idx}"
            )));
        }

        let mut point = TrackPoint::new(lat, lon);

        if prev_point_idx == -1 {
            let first = &segment.points[0];
            let anchor = first
                .coords()
                .ok_or_else(|| no_coordinates(segment_idx, 0))?;
            let d = haversine((lat, lon), anchor);
            point.time = first.time.map(|t| t - seconds(d / speed));
            point.ele = first.ele;
            point.hr = first.hr;
            point.cadence = first.cadence;
            point.power = first.power;
            segment.points.insert(0, point);
        } else if prev_point_idx as usize == len - 1 {
            let last = &segment.points[len - 1];
            let anchor = last
                .coords()
                .ok_or_else(|| no_coordinates(segment_idx, len - 1))?;
            let d = haversine(anchor, (lat, lon));
            point.time = last.time.map(|t| t + seconds(d / speed));
            point.ele = last.ele;
            point.hr = last.hr;
            point.cadence = last.cadence;
            point.power = last.power;
            segment.points.push(point);
        } else {
            let idx = prev_point_idx as usize;
            let prev = &segment.points[idx];
            let next = &segment.points[idx + 1];
            let prev_coords = prev
                .coords()
                .ok_or_else(|| no_coordinates(segment_idx, idx))?;
            let next_coords = next
                .coords()
                .ok_or_else(|| no_coordinates(segment_idx, idx + 1))?;

            let d0 = haversine(prev_coords, (lat, lon));
            let d1 = haversine((lat, lon), next_coords);
            let total = d0 + d1;
            let t = if total > 0.0 { d0 / total } else { 0.0 };

            point.time = match (prev.time, next.time) {
                (Some(a), Some(b)) => {
                    let span = (b - a).num_milliseconds() as f64 / 1000.0;
                    Some(a + seconds(span * t))
                }
                _ => None,
            };
            point.ele = interp(prev.ele, next.ele, t);
            point.hr = interp_int(prev.hr, next.hr, t);
            point.cadence = interp_int(prev.cadence, next.cadence, t);
            point.power = interp_int(prev.power, next.power, t);
            segment.points.insert(idx + 1, point);
        }

        self.snapshot();
        Ok(())
    }

    /// Replaces a point's timestamp, keeping segment times non-decreasing.
    pub fn update_time(
        &mut self,
        segment_idx: usize,
        point_idx: usize,
        new_time: DateTime<Utc>,
    ) -> Result<(), TrackfixError> {
        let segment = self
            .current_track
            .segments
            .get(segment_idx)
            .ok_or_else(|| TrackfixError::OutOfRange(format!("segment index {segment_idx}")))?;
        if point_idx >= segment.points.len() {
            return Err(TrackfixError::OutOfRange(format!("point index {point_idx}")));
        }

        let prev_time = segment.points[..point_idx].iter().rev().find_map(|p| p.time);
        let next_time = segment.points[point_idx + 1..].iter().find_map(|p| p.time);

        if prev_time.is_some_and(|t| new_time < t) || next_time.is_some_and(|t| new_time > t) {
            return Err(TrackfixError::InvalidArgument("time out of order".to_string()));
        }

        self.current_track.segments[segment_idx].points[point_idx].time = Some(new_time);
        self.snapshot();
        Ok(())
    }

    /// Moves a point and elastically drags its neighborhood along. Every
    /// point within `radius_m` of the old position (and within ±100 indices)
    /// shifts by the displacement scaled with `1 − d/radius`; the target
    /// itself lands exactly on the requested coordinates.
    ///
    /// `mode` is reserved for a future map-snapped reroute; every value
    /// currently behaves as "straight".
    pub fn reroute(
        &mut self,
        segment_idx: usize,
        point_idx: usize,
        new_lat: f64,
        new_lon: f64,
        _mode: &str,
        radius_m: f64,
    ) -> Result<(), TrackfixError> {
        validate_coords(new_lat, new_lon)?;

        let segment = self
            .current_track
            .segments
            .get_mut(segment_idx)
            .ok_or_else(|| TrackfixError::OutOfRange(format!("segment index {segment_idx}")))?;
        let len = segment.points.len();
        if point_idx >= len {
            return Err(TrackfixError::OutOfRange(format!("point index {point_idx}")));
        }
        let origin = segment.points[point_idx]
            .coords()
            .ok_or_else(|| no_coordinates(segment_idx, point_idx))?;

        let dlat = new_lat - origin.0;
        let dlon = new_lon - origin.1;

        let lo = point_idx.saturating_sub(REROUTE_WINDOW);
        let hi = (point_idx + REROUTE_WINDOW).min(len);

        if radius_m > 0.0 {
            for point in &mut segment.points[lo..hi] {
                let Some(coords) = point.coords() else { continue };
                let d = haversine(origin, coords);
                if d > radius_m {
                    continue;
                }
                let weight = 1.0 - d / radius_m;
                point.lat = Some(coords.0 + weight * dlat);
                point.lon = Some(coords.1 + weight * dlon);
            }
        }

        let target = &mut segment.points[point_idx];
        target.lat = Some(new_lat);
        target.lon = Some(new_lon);

        self.snapshot();
        Ok(())
    }

    /// Finds runs of points that sit on top of each other (within 1 m of the
    /// run's origin) terminated by an implausibly fast jump. Pure: neither
    /// the track nor the history is touched.
    pub fn detect_gps_stucks(&self, max_speed: f64, min_points: usize) -> Vec<GpsStuck> {
        let mut stucks = Vec::new();

        for (segment_idx, segment) in self.current_track.segments.iter().enumerate() {
            let points = &segment.points;
            let mut i = 1;
            while i < points.len() {
                let start = i - 1;
                let Some(origin) = points[start].coords() else {
                    i += 1;
                    continue;
                };

                let mut j = i;
                while j < points.len()
                    && points[j]
                        .coords()
                        .is_some_and(|c| haversine(origin, c) <= STUCK_RADIUS_M)
                {
                    j += 1;
                }

                if j - i >= min_points && j < points.len() {
                    let confirmed = exit_speed(&points[j - 1], &points[j])
                        .is_some_and(|speed| speed > max_speed);
                    if confirmed {
                        stucks.push(GpsStuck {
                            segment_idx,
                            start_idx: start,
                            end_idx: j,
                            stuck_indices: (i..j).collect(),
                        });
                        i = j;
                        continue;
                    }
                }

                // An unconfirmed run advances the cursor by one, not past
                // the run.
                i += 1;
            }
        }

        stucks
    }

    /// Spreads each stuck run evenly along the chord between its bracketing
    /// good points. All runs are validated before anything moves.
    pub fn normalize_gps_stucks(&mut self, stucks: &[GpsStuck]) -> Result<(), TrackfixError> {
        for stuck in stucks {
            let segment = self
                .current_track
                .segments
                .get(stuck.segment_idx)
                .ok_or_else(|| {
                    TrackfixError::OutOfRange(format!("segment index {}", stuck.segment_idx))
                })?;
            let len = segment.points.len();
            if stuck.end_idx >= len || stuck.start_idx >= stuck.end_idx {
                return Err(TrackfixError::OutOfRange(format!(
                    "stuck run {}..{} in a segment of {} points",
                    stuck.start_idx, stuck.end_idx, len
                )));
            }
            if stuck
                .stuck_indices
                .iter()
                .any(|&k| k <= stuck.start_idx || k >= stuck.end_idx)
            {
                return Err(TrackfixError::OutOfRange(
                    "stuck index outside its run".to_string(),
                ));
            }
            if segment.points[stuck.start_idx].coords().is_none()
                || segment.points[stuck.end_idx].coords().is_none()
            {
                return Err(TrackfixError::InvalidArgument(
                    "bracketing point has no coordinates".to_string(),
                ));
            }
        }

        for stuck in stucks {
            let segment = &mut self.current_track.segments[stuck.segment_idx];
            let (Some(p0), Some(p1)) = (
                segment.points[stuck.start_idx].coords(),
                segment.points[stuck.end_idx].coords(),
            ) else {
                continue;
            };

            let n = stuck.stuck_indices.len() + 1;
            for (ordinal, &k) in stuck.stuck_indices.iter().enumerate() {
                let t = (ordinal + 1) as f64 / n as f64;
                let point = &mut segment.points[k];
                point.lat = Some(p0.0 + t * (p1.0 - p0.0));
                point.lon = Some(p0.1 + t * (p1.1 - p0.1));
            }
        }

        self.snapshot();
        Ok(())
    }

    /// Keeps only the points whose global index (counted across all
    /// segments) lies in `start_idx..=end_idx`. Segments emptied by the
    /// filter are dropped.
    pub fn trim(&mut self, start_idx: usize, end_idx: usize) -> Result<(), TrackfixError> {
        let mut new_segments = Vec::new();
        let mut global_idx = 0usize;

        for segment in &self.current_track.segments {
            let mut kept = Vec::new();
            for point in &segment.points {
                if (start_idx..=end_idx).contains(&global_idx) {
                    kept.push(point.clone());
                }
                global_idx += 1;
            }
            if !kept.is_empty() {
                new_segments.push(TrackSegment::new(kept));
            }
        }

        if new_segments.is_empty() {
            return Err(TrackfixError::InvalidArgument("empty trim".to_string()));
        }

        self.current_track.segments = new_segments;
        self.snapshot();
        Ok(())
    }

    /// Appends deep copies of another track's segments. Metadata is not
    /// altered.
    pub fn merge_with(&mut self, other: &Track) {
        self.current_track
            .segments
            .extend(other.segments.iter().cloned());
        self.snapshot();
    }
}

fn seconds(secs: f64) -> Duration {
    Duration::milliseconds((secs * 1000.0).round() as i64)
}

fn no_coordinates(segment_idx: usize, point_idx: usize) -> TrackfixError {
    TrackfixError::InvalidArgument(format!(
        "point {point_idx} in segment {segment_idx} has no coordinates"
    ))
}

/// Speed of the jump between two consecutive points in m/s. A non-positive
/// time delta counts as infinitely fast.
fn exit_speed(a: &TrackPoint, b: &TrackPoint) -> Option<f64> {
    let jump = haversine(a.coords()?, b.coords()?);
    let dt = (b.time? - a.time?).num_milliseconds() as f64 / 1000.0;
    if dt <= 0.0 {
        return Some(f64::INFINITY);
    }
    Some(jump / dt)
}
