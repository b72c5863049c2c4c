use std::time::Duration;

use thiserror::Error;

/// Crate-wide error: a user-facing message plus the process exit code used by
/// the CLI front-end.
///
/// Exit codes:
/// - `2` input/config problems (bad path, bad flag value, missing column)
/// - `3` data problems (nothing usable after ingest/filtering)
/// - `4` runtime/service problems (terminal, network, external models)
#[derive(Clone)]
pub struct AppError {
    exit_code: u8,
    message: String,
}

impl AppError {
    pub fn new(exit_code: u8, message: impl Into<String>) -> Self {
        Self {
            exit_code,
            message: message.into(),
        }
    }

    pub fn exit_code(&self) -> u8 {
        self.exit_code
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::fmt::Debug for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppError")
            .field("exit_code", &self.exit_code)
            .field("message", &self.message)
            .finish()
    }
}

impl std::error::Error for AppError {}

/// Failures at the boundary with an external collaborator (forecast model,
/// text-completion API).
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Missing {0} in environment (.env).")]
    MissingCredential(&'static str),

    #[error("Request timed out after {}s.", .0.as_secs())]
    Timeout(Duration),

    #[error("Request failed: {0}")]
    Transport(String),

    #[error("Service returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Unexpected service response: {0}")]
    Decode(String),

    #[error("Forecast model error: {0}")]
    Model(String),
}

impl ServiceError {
    /// Timeouts, connection failures, rate limiting and server errors get one
    /// more attempt; everything else is final.
    pub fn is_retryable(&self) -> bool {
        match self {
            ServiceError::Timeout(_) | ServiceError::Transport(_) => true,
            ServiceError::Status { status, .. } => *status == 429 || *status >= 500,
            ServiceError::MissingCredential(_) | ServiceError::Decode(_) | ServiceError::Model(_) => false,
        }
    }
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        let exit_code = match err {
            ServiceError::MissingCredential(_) => 2,
            _ => 4,
        };
        AppError::new(exit_code, err.to_string())
    }
}

impl From<polars::error::PolarsError> for AppError {
    fn from(err: polars::error::PolarsError) -> Self {
        AppError::new(3, format!("Data frame error: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_classification() {
        assert!(ServiceError::Timeout(Duration::from_secs(5)).is_retryable());
        assert!(ServiceError::Transport("connection reset".into()).is_retryable());
        assert!(ServiceError::Status { status: 503, body: String::new() }.is_retryable());
        assert!(ServiceError::Status { status: 429, body: String::new() }.is_retryable());
        assert!(!ServiceError::Status { status: 401, body: String::new() }.is_retryable());
        assert!(!ServiceError::Decode("bad json".into()).is_retryable());
        assert!(!ServiceError::MissingCredential("OPENAI_API_KEY").is_retryable());
    }

    #[test]
    fn service_errors_map_to_exit_codes() {
        let err: AppError = ServiceError::MissingCredential("OPENAI_API_KEY").into();
        assert_eq!(err.exit_code(), 2);
        assert_eq!(err.message(), "Missing OPENAI_API_KEY in environment (.env).");

        let err: AppError = ServiceError::Timeout(Duration::from_secs(30)).into();
        assert_eq!(err.exit_code(), 4);
        assert_eq!(err.to_string(), "Request timed out after 30s.");
    }
}
