use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::error::AppError;

/// API error with HTTP status code
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
    pub code: String,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
            code: "BAD_REQUEST".to_string(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
            code: "NOT_FOUND".to_string(),
        }
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
            code: "INTERNAL_SERVER_ERROR".to_string(),
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::CONFLICT,
            message: message.into(),
            code: "CONFLICT".to_string(),
        }
    }

    pub fn bad_gateway(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_GATEWAY,
            message: message.into(),
            code: "BAD_GATEWAY".to_string(),
        }
    }

    /// Non-standard 499, matching the convention of treating a client
    /// mid-stream disconnect as distinct from a server-side failure (§7).
    pub fn cancelled(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::from_u16(499).expect("499 is a valid status code"),
            message: message.into(),
            code: "CANCELLED".to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": {
                "message": self.message,
                "code": self.code,
            }
        }));

        (self.status, body).into_response()
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError::internal_error(err.to_string())
    }
}

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        match &err {
            AppError::InvalidArgument(msg) => ApiError::bad_request(msg.clone()),
            AppError::NotFound(msg) => ApiError::not_found(msg.clone()),
            AppError::Backend(msg) => ApiError::bad_gateway(msg.clone()),
            AppError::Conflict(msg) => ApiError::conflict(msg.clone()),
            AppError::Cancelled => ApiError::cancelled("request cancelled"),
            AppError::Internal(msg) => ApiError::internal_error(msg.clone()),
        }
    }
}
