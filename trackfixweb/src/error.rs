use axum::{http::StatusCode, response::IntoResponse};
use trackfix_core::TrackfixError;

/// An error ready to leave the API: a status code plus an optional message
/// for the response body.
pub struct ApiError {
    code: StatusCode,
    message: Option<String>,
}

pub type ApiResult<T> = Result<T, ApiError>;

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        if let Some(msg) = self.message {
            (self.code, msg).into_response()
        } else {
            self.code.into_response()
        }
    }
}

impl From<TrackfixError> for ApiError {
    fn from(err: TrackfixError) -> Self {
        let code = match &err {
            TrackfixError::NotFound(_) => StatusCode::NOT_FOUND,
            TrackfixError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            TrackfixError::UnsupportedFormat(_)
            | TrackfixError::InvalidFormat(_)
            | TrackfixError::InvalidArgument(_)
            | TrackfixError::OutOfRange(_)
            | TrackfixError::UnsupportedExportFormat(_) => StatusCode::BAD_REQUEST,
        };
        Self {
            code,
            message: Some(err.to_string()),
        }
    }
}

impl ApiError {
    pub fn bad_request<S: Into<String>>(msg: S) -> Self {
        Self {
            code: StatusCode::BAD_REQUEST,
            message: Some(msg.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_of(err: TrackfixError) -> StatusCode {
        ApiError::from(err).code
    }

    #[test]
    fn error_kinds_map_to_the_contract_status_codes() {
        assert_eq!(
            status_of(TrackfixError::UnsupportedFormat("x.kml".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(TrackfixError::InvalidFormat("bad xml".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(TrackfixError::NotFound("abc".into())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(TrackfixError::InvalidArgument("time out of order".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(TrackfixError::OutOfRange("segment 9".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(TrackfixError::UnsupportedExportFormat("fit".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(TrackfixError::Internal("broken invariant".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
