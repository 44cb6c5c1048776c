use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::fmt;
use thiserror::Error;

/// Message returned for every authorization failure.
pub const UNAUTHORIZED_MESSAGE: &str = "you may not perform that action";

#[derive(Debug, Error)]
pub enum BucketError {
    #[error("bucket `{0}` already exists")]
    AlreadyExists(String),
    #[error("a description must be provided for the bucket")]
    MissingDescription,
    #[error("bucket `{0}` does not exist")]
    NotFound(String),
    #[error("`{0}` is not a valid character")]
    PrincipalNotFound(String),
    #[error("cannot delete bucket `{0}`, jobs are associated with it")]
    NotEmpty(String),
    #[error("a bucket named `{0}` already exists")]
    NameCollision(String),
    #[error("`{0}` is not a valid bucket action")]
    InvalidAction(String),
    #[error("`{0}` is not a valid bucket setting")]
    UnknownSetting(String),
    #[error("invalid value for `{setting}`: {expected}")]
    InvalidValue { setting: String, expected: String },
    #[error("{}", UNAUTHORIZED_MESSAGE)]
    Unauthorized,
    #[error("job {job} is already tagged to bucket `{bucket}`")]
    JobAlreadyTagged { job: i64, bucket: String },
    #[error("job {job} is not tagged to bucket `{bucket}`")]
    JobNotFound { job: i64, bucket: String },
    #[error(transparent)]
    Store(#[from] sqlx::Error),
}

impl BucketError {
    pub fn invalid_value(setting: impl Into<String>, expected: impl Into<String>) -> Self {
        BucketError::InvalidValue {
            setting: setting.into(),
            expected: expected.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            BucketError::AlreadyExists(_)
            | BucketError::NameCollision(_)
            | BucketError::NotEmpty(_)
            | BucketError::JobAlreadyTagged { .. } => StatusCode::CONFLICT,
            BucketError::MissingDescription
            | BucketError::InvalidAction(_)
            | BucketError::UnknownSetting(_)
            | BucketError::InvalidValue { .. } => StatusCode::BAD_REQUEST,
            BucketError::NotFound(_)
            | BucketError::PrincipalNotFound(_)
            | BucketError::JobNotFound { .. } => StatusCode::NOT_FOUND,
            BucketError::Unauthorized => StatusCode::FORBIDDEN,
            BucketError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

pub type BucketResult<T> = Result<T, BucketError>;

/// A lightweight wrapper for general errors that keeps the message local.
#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
}

impl AppError {
    /// Create a new AppError with a specific status and message.
    pub fn new(status: StatusCode, msg: impl Into<String>) -> Self {
        Self {
            status,
            message: msg.into(),
        }
    }

    /// Shortcut for a 500 Internal Server Error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, msg)
    }

    /// Shortcut for 401 when no caller identity was supplied.
    pub fn unauthenticated(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, msg)
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": self.message,
            "status": self.status.as_u16()
        }));

        (self.status, body).into_response()
    }
}

impl From<BucketError> for AppError {
    fn from(err: BucketError) -> Self {
        match err {
            BucketError::Store(inner) => {
                tracing::error!("store failure: {}", inner);
                AppError::internal("internal storage error")
            }
            other => AppError::new(other.status(), other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unauthorized_is_generic() {
        let app: AppError = BucketError::Unauthorized.into();
        assert_eq!(app.status, StatusCode::FORBIDDEN);
        assert_eq!(app.message, UNAUTHORIZED_MESSAGE);
        assert_eq!(BucketError::Unauthorized.to_string(), UNAUTHORIZED_MESSAGE);
    }

    #[test]
    fn domain_errors_map_to_statuses() {
        assert_eq!(
            BucketError::NotEmpty("Plots".into()).status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            BucketError::invalid_value("timeout", "<amount> <unit>").status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            BucketError::NotFound("Plots".into()).status(),
            StatusCode::NOT_FOUND
        );
    }
}
