use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

pub const PLAYER_NOT_FOUND: &str = "Player not found. Please check the username.";
pub const RATE_LIMITED: &str = "Rate limit exceeded. Please try again in a few minutes.";
pub const UNEXPECTED: &str = "An unexpected error occurred. Please try again.";

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),

    #[error("Player not found")]
    PlayerNotFound,

    #[error("Rate limited by Chess.com")]
    RateLimited,

    #[error("Upstream error: {0}")]
    Upstream(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::PlayerNotFound => StatusCode::NOT_FOUND,
            AppError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            AppError::Upstream(_) => StatusCode::BAD_GATEWAY,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// The message shown to the user. Details of unexpected failures stay in the logs.
    pub fn detail(&self) -> String {
        match self {
            AppError::BadRequest(msg) => msg.clone(),
            AppError::PlayerNotFound => PLAYER_NOT_FOUND.to_string(),
            AppError::RateLimited => RATE_LIMITED.to_string(),
            AppError::Upstream(_) | AppError::Internal(_) => UNEXPECTED.to_string(),
        }
    }
}

impl From<reqwest::Error> for AppError {
    fn from(e: reqwest::Error) -> Self {
        match e.status() {
            Some(reqwest::StatusCode::NOT_FOUND) => AppError::PlayerNotFound,
            Some(reqwest::StatusCode::TOO_MANY_REQUESTS) => AppError::RateLimited,
            _ => AppError::Upstream(e.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match &self {
            AppError::Upstream(e) => tracing::warn!("Chess.com request failed: {e}"),
            AppError::Internal(msg) => tracing::error!("Internal error: {msg}"),
            _ => {}
        }

        // Match FastAPI error format: {"detail": "message"}
        (self.status(), Json(json!({ "detail": self.detail() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_facing_messages() {
        assert_eq!(AppError::PlayerNotFound.status(), StatusCode::NOT_FOUND);
        assert_eq!(AppError::PlayerNotFound.detail(), PLAYER_NOT_FOUND);
        assert_eq!(AppError::RateLimited.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(AppError::RateLimited.detail(), RATE_LIMITED);
    }

    #[test]
    fn test_unexpected_errors_hide_details() {
        let err = AppError::Upstream("connection reset by peer".into());
        assert_eq!(err.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(err.detail(), UNEXPECTED);
        assert_eq!(AppError::Internal("boom".into()).detail(), UNEXPECTED);
    }

    #[test]
    fn test_bad_request_keeps_message() {
        let err = AppError::BadRequest("Unknown result filter: wins".into());
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.detail(), "Unknown result filter: wins");
    }
}
