use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

/// OAuth2-style error body.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_description: Option<String>,
}

/// Request-level failure of one flow transition. None of these leave partial
/// state behind.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FlowError {
    #[error("Unsupported response_type: {}", .0.as_deref().unwrap_or("<missing>"))]
    UnsupportedResponseType(Option<String>),
    #[error("No authorization request in progress for this session")]
    MissingFlowContext,
    #[error("Invalid code")]
    InvalidCode,
    #[error("Code is bound to unknown role `{0}`")]
    UnknownRole(String),
    #[error("Unsupported grant_type: {}", .0.as_deref().unwrap_or("<missing>"))]
    UnsupportedGrantType(Option<String>),
    #[error("Invalid access token")]
    InvalidToken,
}

impl FlowError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            FlowError::InvalidToken => StatusCode::UNAUTHORIZED,
            _ => StatusCode::BAD_REQUEST,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            FlowError::UnsupportedResponseType(_) => "unsupported_response_type",
            FlowError::MissingFlowContext => "invalid_request",
            FlowError::InvalidCode | FlowError::UnknownRole(_) => "invalid_grant",
            FlowError::UnsupportedGrantType(_) => "unsupported_grant_type",
            FlowError::InvalidToken => "invalid_token",
        }
    }

    /// Malformed or disallowed parameters, as opposed to a well-formed request
    /// naming a code, role or token the registry does not know.
    pub fn is_client_input(&self) -> bool {
        matches!(
            self,
            FlowError::UnsupportedResponseType(_)
                | FlowError::MissingFlowContext
                | FlowError::UnsupportedGrantType(_)
        )
    }
}

impl IntoResponse for FlowError {
    fn into_response(self) -> Response {
        (
            self.status_code(),
            Json(ErrorResponse {
                error: self.error_code().to_string(),
                error_description: Some(self.to_string()),
            }),
        )
            .into_response()
    }
}
