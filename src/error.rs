// ⚠️ Error Types - typed failures for storage, input, and external services
//
// Library code returns `AppError` (or `ForecastError` for the forecaster) so the
// HTTP layer can tell "no data" apart from "transient failure" and "bad input".
// Binaries and CSV import stay on anyhow.

use thiserror::Error;

/// Convenience alias used across the query modules
pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("{service} error: {message}")]
    ExternalService { service: String, message: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn not_found(what: impl Into<String>) -> Self {
        AppError::NotFound(what.into())
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        AppError::InvalidInput(message.into())
    }

    pub fn external_service(service: impl Into<String>, message: impl Into<String>) -> Self {
        AppError::ExternalService {
            service: service.into(),
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        AppError::Config(message.into())
    }

    /// HTTP status code for this error
    pub fn status_code(&self) -> u16 {
        match self {
            AppError::NotFound(_) => 404,
            AppError::InvalidInput(_) => 400,
            AppError::ExternalService { .. } => 502,
            AppError::Database(_)
            | AppError::Config(_)
            | AppError::Serialization(_)
            | AppError::Internal(_) => 500,
        }
    }
}

/// Failures of the cash-flow forecaster.
///
/// `InsufficientHistory` is a recoverable sentinel: callers substitute a
/// degraded forecast instead of surfacing a server error.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ForecastError {
    #[error("Insufficient historical data for prediction: {available} period(s), need {required}")]
    InsufficientHistory { available: usize, required: usize },

    #[error("Malformed historical data: {0}")]
    MalformedInput(String),
}

#[cfg(feature = "server")]
mod http {
    use super::AppError;
    use axum::http::StatusCode;
    use axum::response::{IntoResponse, Json, Response};
    use serde_json::json;

    impl IntoResponse for AppError {
        fn into_response(self) -> Response {
            let status = StatusCode::from_u16(self.status_code())
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

            if status.is_server_error() {
                tracing::error!(error = %self, "request failed");
            } else {
                tracing::debug!(error = %self, "request rejected");
            }

            let body = Json(json!({
                "success": false,
                "error": self.to_string(),
            }));

            (status, body).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(AppError::not_found("trainer 9").status_code(), 404);
        assert_eq!(AppError::invalid_input("months_ahead").status_code(), 400);
        assert_eq!(AppError::external_service("Groq", "timeout").status_code(), 502);
        assert_eq!(AppError::config("GROQ_API_KEY").status_code(), 500);
        assert_eq!(
            AppError::from(rusqlite::Error::QueryReturnedNoRows).status_code(),
            500
        );
    }

    #[test]
    fn test_forecast_error_message() {
        let err = ForecastError::InsufficientHistory {
            available: 2,
            required: 3,
        };
        assert!(err.to_string().contains("2 period(s)"));
        assert!(err.to_string().contains("need 3"));
    }
}
