use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use crate::clients::ExternalError;

/// Error surface for every service operation. Maps onto HTTP statuses at
/// the router boundary; `Busy` is the only variant callers should retry.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("must sign in")]
    Unauthenticated,
    #[error("not allowed")]
    Forbidden,
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("{0}")]
    Invalid(String),
    #[error("store contention, safe to retry")]
    Busy,
    #[error("store error: {0}")]
    Store(diesel::result::Error),
    #[error("upstream service failed: {0}")]
    Upstream(#[from] ExternalError),
    #[error("{0}")]
    Internal(String),
}

impl From<diesel::result::Error> for ServiceError {
    fn from(err: diesel::result::Error) -> Self {
        use diesel::result::Error as DieselError;
        match err {
            DieselError::NotFound => ServiceError::NotFound("record"),
            DieselError::DatabaseError(_, ref info)
                if info.message().contains("database is locked") =>
            {
                ServiceError::Busy
            }
            other => ServiceError::Store(other),
        }
    }
}

impl From<diesel::r2d2::PoolError> for ServiceError {
    fn from(err: diesel::r2d2::PoolError) -> Self {
        ServiceError::Internal(format!("connection pool: {err}"))
    }
}

impl ServiceError {
    pub fn status(&self) -> StatusCode {
        match self {
            ServiceError::Unauthenticated => StatusCode::UNAUTHORIZED,
            ServiceError::Forbidden => StatusCode::FORBIDDEN,
            ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
            ServiceError::Invalid(_) => StatusCode::BAD_REQUEST,
            ServiceError::Busy => StatusCode::SERVICE_UNAVAILABLE,
            ServiceError::Upstream(_) => StatusCode::BAD_GATEWAY,
            ServiceError::Store(_) | ServiceError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status();
        // Opaque oracle failures reach the client as a generic message.
        let message = match &self {
            ServiceError::Upstream(_) => "upstream service failed".to_string(),
            ServiceError::Store(_) => "store error".to_string(),
            other => other.to_string(),
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use diesel::result::Error as DieselError;

    #[test]
    fn test_not_found_maps_from_diesel() {
        let err: ServiceError = DieselError::NotFound.into();
        assert!(matches!(err, ServiceError::NotFound(_)));
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_busy_is_retryable_status() {
        assert_eq!(ServiceError::Busy.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
