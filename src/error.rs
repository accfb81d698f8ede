use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Serialize, Serializer};
use thiserror::Error;

use crate::engine::BackendError;
use crate::types::ClassificationMode;

#[derive(Debug, Error)]
pub enum ApiError {
    /// The request was rejected by extraction, before any handler ran.
    #[error("{message}")]
    Validation {
        field: Option<&'static str>,
        message: String,
    },

    /// The handler was reached but no classification backend is attached.
    #[error("{} classification is not implemented", .0.description())]
    NotImplemented(ClassificationMode),

    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// Serialized through [`ErrorKind::as_str`], so the JSON `kind` and the
/// metric label are the same string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    ValidationError,
    NotImplemented,
    BackendError,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ValidationError => "validation_error",
            Self::NotImplemented => "not_implemented",
            Self::BackendError => "backend_error",
        }
    }
}

impl Serialize for ErrorKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub kind: ErrorKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<&'static str>,
}

impl ApiError {
    pub fn missing_field(field: &'static str) -> Self {
        ApiError::Validation {
            field: Some(field),
            message: format!("missing required query parameter `{field}`"),
        }
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        ApiError::Validation {
            field: None,
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ApiError::Validation { .. } => ErrorKind::ValidationError,
            ApiError::NotImplemented(_) => ErrorKind::NotImplemented,
            ApiError::Backend(_) => ErrorKind::BackendError,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::NotImplemented(_) => StatusCode::NOT_IMPLEMENTED,
            ApiError::Backend(BackendError::Failed(_)) => StatusCode::BAD_GATEWAY,
            ApiError::Backend(BackendError::Timeout(_)) => StatusCode::GATEWAY_TIMEOUT,
        }
    }

    fn field(&self) -> Option<&'static str> {
        match self {
            ApiError::Validation { field, .. } => *field,
            _ => None,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                kind: self.kind(),
                message: self.to_string(),
                field: self.field(),
            },
        };
        (self.status(), Json(body)).into_response()
    }
}
