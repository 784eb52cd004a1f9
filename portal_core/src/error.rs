//! Application error types and handling

use thiserror::Error;

use crate::auth::ProviderError;

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("File rejected: {0}")]
    FileRejected(String),

    #[error("{0}")]
    Operation(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut messages: Vec<String> = errors
            .field_errors()
            .into_iter()
            .flat_map(|(field, field_errors)| {
                field_errors.iter().map(move |error| match &error.message {
                    Some(message) => message.to_string(),
                    None => format!("Validation failed for field '{}'", field),
                })
            })
            .collect();
        messages.sort();

        AppError::InvalidRequest(messages.join("; "))
    }
}

impl AppError {
    /// Whether running the same call again could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            AppError::Provider(ProviderError::Unknown(_)) => true,
            AppError::Provider(err) => err.is_transient(),
            AppError::IoError(_)
            | AppError::Operation(_)
            | AppError::JsonError(_)
            | AppError::Other(_) => true,
            AppError::Config(_) | AppError::InvalidRequest(_) | AppError::FileRejected(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use validator::Validate;

    #[derive(Validate)]
    struct Upload {
        #[validate(length(min = 1, message = "Title is required"))]
        title: String,
        #[validate(range(min = 1, message = "Size must be positive"))]
        size: i64,
    }

    #[test]
    fn test_validation_errors_are_joined() {
        let upload = Upload {
            title: String::new(),
            size: 0,
        };
        let err = AppError::from(upload.validate().unwrap_err());

        assert_eq!(
            err.to_string(),
            "Invalid request: Size must be positive; Title is required"
        );
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_retryable_classification() {
        assert!(AppError::Operation("timeout".to_string()).is_retryable());
        assert!(AppError::Provider(ProviderError::Network("reset".to_string())).is_retryable());
        assert!(!AppError::Provider(ProviderError::NotAuthorized).is_retryable());
        assert!(!AppError::FileRejected("too big".to_string()).is_retryable());
        assert!(AppError::Provider(ProviderError::Unknown("Internal server error".to_string())).is_retryable());
        let truncated = serde_json::from_str::<serde_json::Value>("[1, 2").unwrap_err();
        assert!(AppError::JsonError(truncated).is_retryable());
    }
}
