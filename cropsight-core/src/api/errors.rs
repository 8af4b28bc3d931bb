use std::{collections::HashMap, fmt};

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use tracing::{error, warn};

use crate::error::CropsightError;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorResponse {
    pub error_type: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<HashMap<String, serde_json::Value>>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ApiError {
    InvalidRequest(String),
    ValidationError { field: String, message: String },
    DatasetUnavailable(String),
    ServiceUnavailable(String),
    InternalError(String),
}

impl ApiError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        ApiError::ValidationError {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn to_response(&self) -> ErrorResponse {
        let (error_type, message, details) = match self {
            ApiError::InvalidRequest(msg) => ("invalid_request", msg.clone(), None),
            ApiError::ValidationError { field, message } => {
                let mut details = HashMap::new();
                details.insert(
                    "field".to_string(),
                    serde_json::Value::String(field.clone()),
                );
                ("validation_error", message.clone(), Some(details))
            }
            ApiError::DatasetUnavailable(msg) => ("dataset_unavailable", msg.clone(), None),
            ApiError::ServiceUnavailable(msg) => ("service_unavailable", msg.clone(), None),
            ApiError::InternalError(msg) => ("internal_error", msg.clone(), None),
        };

        ErrorResponse {
            error_type: error_type.to_string(),
            message,
            details,
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::InvalidRequest(_) | ApiError::ValidationError { .. } => {
                StatusCode::BAD_REQUEST
            }
            ApiError::DatasetUnavailable(_) => StatusCode::NOT_FOUND,
            ApiError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::InvalidRequest(msg) => write!(f, "Invalid request: {}", msg),
            ApiError::ValidationError { field, message } => {
                write!(f, "Validation error for {}: {}", field, message)
            }
            ApiError::DatasetUnavailable(msg) => write!(f, "Dataset unavailable: {}", msg),
            ApiError::ServiceUnavailable(msg) => write!(f, "Service unavailable: {}", msg),
            ApiError::InternalError(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for ApiError {}

impl From<CropsightError> for ApiError {
    fn from(err: CropsightError) -> Self {
        match err {
            CropsightError::DatasetUnavailable { .. } => {
                warn!("{}", err);
                ApiError::DatasetUnavailable(err.to_string())
            }
            _ => {
                error!("{}", err);
                ApiError::InternalError(err.to_string())
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status_code(), Json(self.to_response())).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_carries_field() {
        let err = ApiError::validation("camDet", "expected a boolean");
        let body = err.to_response();

        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(body.error_type, "validation_error");
        assert_eq!(body.message, "expected a boolean");
        assert_eq!(
            body.details.unwrap()["field"],
            serde_json::Value::String("camDet".to_string())
        );
    }

    #[test]
    fn test_library_errors_map_to_status() {
        let missing = CropsightError::DatasetUnavailable {
            source: std::io::Error::from(std::io::ErrorKind::NotFound),
            path: "/data/alice/plants".to_string(),
        };
        let err = ApiError::from(missing);
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(err.to_response().error_type, "dataset_unavailable");

        let err = ApiError::from(CropsightError::EmptyScores);
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.to_response().error_type, "internal_error");
    }

    #[test]
    fn test_details_omitted_when_absent() {
        let value = serde_json::to_value(ApiError::InternalError("boom".into()).to_response())
            .unwrap();
        assert!(value.get("details").is_none());
    }
}
