use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

/// Failure taxonomy for the whole API surface.
///
/// Each variant carries the caller-safe message; anything internal goes to
/// tracing at the point of failure, not into the response body.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    InvalidInput(String),
    #[error("{0} not found")]
    NotFound(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0} service unavailable")]
    UpstreamUnavailable(&'static str),
    #[error("{0} request timed out")]
    UpstreamTimeout(&'static str),
    #[error("{service} request failed")]
    UpstreamFailure {
        service: &'static str,
        status: Option<u16>,
    },
    #[error("database error")]
    Database(#[source] sqlx::Error),
    #[error("internal error")]
    Internal(#[from] anyhow::Error),
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        // Losing a uniqueness race (email upsert, phone number) is the
        // caller's conflict, not a server fault.
        if let sqlx::Error::Database(ref db) = err {
            if db.is_unique_violation() {
                return ApiError::Conflict("resource already exists".into());
            }
        }
        ApiError::Database(err)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::UpstreamUnavailable(_) | ApiError::UpstreamTimeout(_) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            ApiError::UpstreamFailure { .. } | ApiError::Database(_) | ApiError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        match &self {
            ApiError::Database(e) => {
                tracing::error!(error = %e, "database failure");
            }
            ApiError::Internal(e) => {
                tracing::error!(error = %e, "unhandled failure");
            }
            ApiError::UpstreamFailure {
                service,
                status: upstream,
            } => {
                tracing::error!(service, upstream = ?upstream, "upstream failure");
            }
            _ => {}
        }
        let body = Json(json!({
            "status": "error",
            "message": self.to_string(),
        }));
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_match_taxonomy() {
        assert_eq!(
            ApiError::InvalidInput("x".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::NotFound("record".into()).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::Forbidden("x".into()).status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(ApiError::Conflict("x".into()).status(), StatusCode::CONFLICT);
        assert_eq!(
            ApiError::UpstreamUnavailable("inference").status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            ApiError::UpstreamTimeout("inference").status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            ApiError::UpstreamFailure {
                service: "storage",
                status: None
            }
            .status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn messages_stay_caller_safe() {
        let err = ApiError::UpstreamFailure {
            service: "inference",
            status: Some(500),
        };
        assert_eq!(err.to_string(), "inference request failed");

        let err = ApiError::UpstreamTimeout("inference");
        assert_eq!(err.to_string(), "inference request timed out");
    }
}
