use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Authentication failed")]
    AuthenticationFailed,
    #[error("Conversation not found")]
    ConversationNotFound,
    #[error("Invalid message: {0}")]
    InvalidMessage(String),
    #[error("Not authorized")]
    NotAuthorized,
    #[error("Persistence error: {0}")]
    Persistence(#[from] sqlx::Error),
    #[error("Internal server error")]
    Internal,
}

pub type Result<T> = std::result::Result<T, AppError>;

impl AppError {
    /// Stable machine-readable code sent to gateway clients.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::AuthenticationFailed => "authentication_failed",
            Self::ConversationNotFound => "conversation_not_found",
            Self::InvalidMessage(_) => "invalid_message",
            Self::NotAuthorized => "not_authorized",
            Self::Persistence(_) => "persistence_error",
            Self::Internal => "internal_error",
        }
    }

    /// Message safe to show to the client that caused the error.
    #[must_use]
    pub fn public_message(&self) -> String {
        match self {
            Self::Persistence(_) => "Failed to send message".to_string(),
            Self::InvalidMessage(msg) => msg.clone(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::Persistence(e) => {
                tracing::error!(error = %e, "Database error");
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Self::AuthenticationFailed => {
                tracing::debug!("Authentication failed");
                StatusCode::UNAUTHORIZED
            }
            Self::ConversationNotFound => {
                tracing::debug!("Conversation not found");
                StatusCode::NOT_FOUND
            }
            Self::InvalidMessage(msg) => {
                tracing::debug!(message = %msg, "Invalid message");
                StatusCode::BAD_REQUEST
            }
            Self::NotAuthorized => {
                tracing::debug!("Caller is not a participant");
                StatusCode::FORBIDDEN
            }
            Self::Internal => {
                tracing::error!("Internal server error occurred");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let message = match &self {
            Self::Persistence(_) | Self::Internal => "Internal server error".to_string(),
            other => other.public_message(),
        };

        let body = Json(json!({
            "error": message,
            "code": self.code(),
        }));

        (status, body).into_response()
    }
}
