use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use flowcall_core::{ConfigError, GenerateScriptError, ValidationError};
use serde::Serialize;

pub const INVALID_JSON_MESSAGE: &str = "Invalid JSON payload.";

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Every failure a handler can answer with; serialized as `{"error": "..."}`.
#[derive(Debug)]
pub enum ApiError {
    Validation(ValidationError),
    NotFound(String),
    BadRequest(String),
    Config(ConfigError),
    GenerateScript(GenerateScriptError),
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        Self::Validation(err)
    }
}

impl From<ConfigError> for ApiError {
    fn from(err: ConfigError) -> Self {
        Self::Config(err)
    }
}

impl From<GenerateScriptError> for ApiError {
    fn from(err: GenerateScriptError) -> Self {
        Self::GenerateScript(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::Validation(err) => (StatusCode::UNPROCESSABLE_ENTITY, err.to_string()),
            Self::NotFound(message) => (StatusCode::NOT_FOUND, message),
            Self::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            Self::Config(err) => {
                tracing::error!(error = %err, "configuration error");
                (StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
            }
            Self::GenerateScript(err) => {
                let status = StatusCode::from_u16(err.status_code())
                    .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
                if status.is_server_error() {
                    tracing::error!(error = %err, "generate-script failed");
                }
                (status, err.public_message())
            }
        };

        (status, Json(ErrorResponse { error: message })).into_response()
    }
}
