use std::{
    str::FromStr,
    sync::{Arc, Mutex, MutexGuard},
};

use axum::{
    extract::{Multipart, Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use tracing::info;

use trackfix_core::{
    dates::parse_utc_date,
    export::{export_track, ExportFormat},
    read::decode_upload,
    registry::SessionRegistry,
    session::EditingSession,
    TrackfixError,
};

use crate::{
    error::{ApiError, ApiResult},
    AppState,
};

use super::models::{
    ExportQuery, InsertPointRequest, NormalizeApplyRequest, NormalizePreviewRequest,
    RerouteRequest, SessionQuery, SessionRequest, StucksResponse, TrackResponse, TrimRequest,
    UpdateTimeRequest, UploadResponse,
};

pub(crate) async fn upload(
    State(state): State<AppState>,
    multipart: Multipart,
) -> ApiResult<Json<UploadResponse>> {
    // The whole body is read before the dispatcher runs; a failed decode
    // never creates a session.
    let (filename, bytes) = read_file_field(multipart).await?;
    let track = decode_upload(&filename, &bytes)?;
    info!(
        "Uploaded {filename}: {} points in {} segments",
        track.num_points(),
        track.segments.len()
    );

    let session_id = state.registry.create(track.clone());
    Ok(Json(UploadResponse { session_id, track }))
}

pub(crate) async fn undo(
    State(state): State<AppState>,
    Json(req): Json<SessionRequest>,
) -> ApiResult<Json<TrackResponse>> {
    let session = session_for(&state.registry, &req.session_id)?;
    let mut session = lock(&session);
    // Nothing to undo is a success no-op.
    session.undo();
    Ok(Json(track_response(&session)))
}

pub(crate) async fn redo(
    State(state): State<AppState>,
    Json(req): Json<SessionRequest>,
) -> ApiResult<Json<TrackResponse>> {
    let session = session_for(&state.registry, &req.session_id)?;
    let mut session = lock(&session);
    session.redo();
    Ok(Json(track_response(&session)))
}

pub(crate) async fn reset(
    State(state): State<AppState>,
    Json(req): Json<SessionRequest>,
) -> ApiResult<Json<TrackResponse>> {
    let session = session_for(&state.registry, &req.session_id)?;
    let mut session = lock(&session);
    session.reset();
    Ok(Json(track_response(&session)))
}

pub(crate) async fn normalize_preview(
    State(state): State<AppState>,
    Json(req): Json<NormalizePreviewRequest>,
) -> ApiResult<Json<StucksResponse>> {
    let session = session_for(&state.registry, &req.session_id)?;
    let session = lock(&session);
    let stucks = session.detect_gps_stucks(req.max_speed, req.min_points);
    Ok(Json(StucksResponse { stucks }))
}

pub(crate) async fn normalize_apply(
    State(state): State<AppState>,
    Json(req): Json<NormalizeApplyRequest>,
) -> ApiResult<Json<TrackResponse>> {
    let session = session_for(&state.registry, &req.session_id)?;
    let mut session = lock(&session);
    session.normalize_gps_stucks(&req.stucks)?;
    Ok(Json(track_response(&session)))
}

pub(crate) async fn add_point(
    State(state): State<AppState>,
    Json(req): Json<InsertPointRequest>,
) -> ApiResult<Json<TrackResponse>> {
    let session = session_for(&state.registry, &req.session_id)?;
    let mut session = lock(&session);
    session.insert_point(req.segment_idx, req.prev_point_idx, req.lat, req.lon)?;
    Ok(Json(track_response(&session)))
}

pub(crate) async fn update_time(
    State(state): State<AppState>,
    Json(req): Json<UpdateTimeRequest>,
) -> ApiResult<Json<TrackResponse>> {
    let new_time = parse_utc_date(&req.new_time).map_err(|_| {
        ApiError::from(TrackfixError::InvalidArgument(format!(
            "invalid time: {}",
            req.new_time
        )))
    })?;

    let session = session_for(&state.registry, &req.session_id)?;
    let mut session = lock(&session);
    session.update_time(req.segment_idx, req.point_idx, new_time)?;
    Ok(Json(track_response(&session)))
}

pub(crate) async fn reroute(
    State(state): State<AppState>,
    Json(req): Json<RerouteRequest>,
) -> ApiResult<Json<TrackResponse>> {
    let session = session_for(&state.registry, &req.session_id)?;
    let mut session = lock(&session);
    session.reroute(
        req.segment_idx,
        req.point_idx,
        req.new_lat,
        req.new_lon,
        &req.mode,
        req.radius_m,
    )?;
    Ok(Json(track_response(&session)))
}

pub(crate) async fn trim(
    State(state): State<AppState>,
    Json(req): Json<TrimRequest>,
) -> ApiResult<Json<TrackResponse>> {
    let session = session_for(&state.registry, &req.session_id)?;
    let mut session = lock(&session);
    session.trim(req.start_idx, req.end_idx)?;
    Ok(Json(track_response(&session)))
}

pub(crate) async fn merge(
    State(state): State<AppState>,
    Query(query): Query<SessionQuery>,
    multipart: Multipart,
) -> ApiResult<Json<TrackResponse>> {
    // Decode the incoming file before taking the session lock.
    let (filename, bytes) = read_file_field(multipart).await?;
    let other = decode_upload(&filename, &bytes)?;

    let session = session_for(&state.registry, &query.session_id)?;
    let mut session = lock(&session);
    session.merge_with(&other);
    Ok(Json(track_response(&session)))
}

pub(crate) async fn export(
    State(state): State<AppState>,
    Query(query): Query<ExportQuery>,
) -> ApiResult<impl IntoResponse> {
    let format = ExportFormat::from_str(&query.fmt)?;

    let session = session_for(&state.registry, &query.session_id)?;
    let bytes = {
        let session = lock(&session);
        export_track(session.current_track(), format)?
    };

    let filename = format!("{}.{}", query.name, format.extension());
    Ok((
        [
            (header::CONTENT_TYPE, format.media_type().to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{filename}\""),
            ),
        ],
        bytes,
    ))
}

pub(crate) async fn delete_session(
    State(state): State<AppState>,
    Query(query): Query<SessionQuery>,
) -> ApiResult<StatusCode> {
    match state.registry.delete(&query.session_id) {
        Some(_) => Ok(StatusCode::NO_CONTENT),
        None => Err(TrackfixError::NotFound(query.session_id).into()),
    }
}

fn session_for(
    registry: &SessionRegistry,
    session_id: &str,
) -> Result<Arc<Mutex<EditingSession>>, ApiError> {
    registry
        .get(session_id)
        .ok_or_else(|| TrackfixError::NotFound(session_id.to_string()).into())
}

/// Locks a session for the duration of one request. The guard is never held
/// across an await; a poisoned lock is recovered since edits leave the track
/// consistent at every return.
fn lock(session: &Arc<Mutex<EditingSession>>) -> MutexGuard<'_, EditingSession> {
    session.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn track_response(session: &EditingSession) -> TrackResponse {
    TrackResponse {
        track: session.current_track().clone(),
    }
}

/// Pulls the "file" part out of a multipart body: its filename and bytes.
async fn read_file_field(mut multipart: Multipart) -> Result<(String, Vec<u8>), ApiError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("malformed multipart body: {e}")))?
    {
        if field.name() == Some("file") {
            let filename = field.file_name().unwrap_or("upload").to_string();
            let bytes = field
                .bytes()
                .await
                .map_err(|e| ApiError::bad_request(format!("could not read file part: {e}")))?;
            return Ok((filename, bytes.to_vec()));
        }
    }

    Err(ApiError::bad_request("no file field in request"))
}
