use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

pub type Result<T> = core::result::Result<T, Error>;

pub type StoreResult<T> = core::result::Result<T, StoreError>;

/// Which of the two round-trips of a terminal call failed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, strum_macros::Display)]
pub enum Phase {
    #[strum(serialize = "count")]
    Count,
    #[strum(serialize = "fetch")]
    Fetch,
}

#[derive(Clone, Debug, Serialize, strum_macros::AsRefStr)]
#[serde(tag = "type", content = "data")]
pub enum Error {
    // -- Configuration errors, raised before any I/O.
    MissingPagingParams { missing: Vec<&'static str> },
    MissingFilter,
    ConflictingMode,

    // -- Store errors.
    Upstream { phase: Phase, source: StoreError },
    DbError(String),

    Decode(String),
    Config(String),
}

impl core::fmt::Display for Error {
    fn fmt(&self, fmt: &mut core::fmt::Formatter) -> core::result::Result<(), core::fmt::Error> {
        match self {
            Self::Upstream { phase, source } => write!(fmt, "{phase} failed: {source}"),
            _ => write!(fmt, "{self:?}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Upstream { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let (status_code, client_error) = self.client_status_and_error();

        let response_body = serde_json::json!({
            "error": client_error.as_ref(),
            "details": self.to_string()
        });

        (status_code, Json(response_body)).into_response()
    }
}

impl Error {
    pub fn client_status_and_error(&self) -> (StatusCode, ClientError) {
        match self {
            Self::MissingPagingParams { .. } | Self::MissingFilter | Self::ConflictingMode => {
                (StatusCode::BAD_REQUEST, ClientError::INVALID_PARAMS)
            }

            Self::Upstream { source, .. } => match source {
                StoreError::Timeout => (StatusCode::GATEWAY_TIMEOUT, ClientError::SERVICE_TIMEOUT),
                StoreError::Db(_) | StoreError::MalformedResult(_) => (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ClientError::SERVICE_ERROR,
                ),
                _ => (StatusCode::BAD_REQUEST, ClientError::INVALID_QUERY),
            },

            Self::DbError(_) | Self::Decode(_) | Self::Config(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ClientError::SERVICE_ERROR,
            ),
        }
    }
}

#[derive(Debug, strum_macros::AsRefStr)]
#[allow(non_camel_case_types)]
pub enum ClientError {
    INVALID_PARAMS,
    INVALID_QUERY,
    SERVICE_ERROR,
    SERVICE_TIMEOUT,
}

impl From<surrealdb::Error> for Error {
    fn from(err: surrealdb::Error) -> Self {
        Error::DbError(err.to_string())
    }
}

impl From<std::env::VarError> for Error {
    fn from(err: std::env::VarError) -> Self {
        Error::Config(err.to_string())
    }
}

/// Failure reported by a [`Store`](crate::store::Store) implementation.
#[derive(Clone, Debug, PartialEq, Serialize, strum_macros::AsRefStr)]
#[serde(tag = "type", content = "data")]
pub enum StoreError {
    Db(String),
    UnknownStage(String),
    MalformedStage(String),
    UnknownOperator(String),
    InvalidField(String),
    InvalidProjection(String),
    InvalidFilter(String),
    InvalidDocument(String),
    MalformedResult(String),
    Timeout,
}

impl core::fmt::Display for StoreError {
    fn fmt(&self, fmt: &mut core::fmt::Formatter) -> core::result::Result<(), core::fmt::Error> {
        write!(fmt, "{self:?}")
    }
}

impl std::error::Error for StoreError {}

impl From<surrealdb::Error> for StoreError {
    fn from(err: surrealdb::Error) -> Self {
        StoreError::Db(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_client_status_mapping() {
        let (status, client) = Error::MissingFilter.client_status_and_error();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(client.as_ref(), "INVALID_PARAMS");

        let timeout = Error::Upstream {
            phase: Phase::Fetch,
            source: StoreError::Timeout,
        };
        assert_eq!(
            timeout.client_status_and_error().0,
            StatusCode::GATEWAY_TIMEOUT
        );

        let bad_stage = Error::Upstream {
            phase: Phase::Count,
            source: StoreError::UnknownStage("$matches".to_string()),
        };
        let (status, client) = bad_stage.client_status_and_error();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(client.as_ref(), "INVALID_QUERY");

        let db = Error::Upstream {
            phase: Phase::Count,
            source: StoreError::Db("connection reset".to_string()),
        };
        assert_eq!(
            db.client_status_and_error().0,
            StatusCode::INTERNAL_SERVER_ERROR
        );

        let bad_count = Error::Upstream {
            phase: Phase::Count,
            source: StoreError::MalformedResult("{\"total\":\"x\"}".to_string()),
        };
        assert_eq!(
            bad_count.client_status_and_error().0,
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_upstream_display_names_phase() {
        let err = Error::Upstream {
            phase: Phase::Count,
            source: StoreError::UnknownStage("$matches".to_string()),
        };
        let msg = err.to_string();
        assert!(msg.starts_with("count failed"), "got: {msg}");
        assert!(msg.contains("$matches"));
        assert!(err.source().is_some());
        assert_eq!(err.as_ref(), "Upstream");
    }

    #[test]
    fn test_into_response_status() {
        let response = Error::ConflictingMode.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
