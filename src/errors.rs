use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum AppError {
    #[error("LOAD_FAILED: {0}")]
    Load(String),
    #[error("UPDATE_FAILED: {0}")]
    Update(String),
    #[error("CONVERSION_FAILED: {0}")]
    Conversion(String),
    #[error("NOT_FOUND: {0}")]
    NotFound(String),
    #[error("VALIDATION: {0}")]
    Validation(String),
    #[error("INVALID_STATE: {0}")]
    InvalidState(String),
    #[error("IO_FAILURE: {0}")]
    Io(String),
    #[error("INTERNAL: {0}")]
    Internal(String),
}

impl AppError {
    /// The message without the code prefix, suitable for showing next to a form.
    pub fn message(&self) -> &str {
        match self {
            Self::Load(message)
            | Self::Update(message)
            | Self::Conversion(message)
            | Self::NotFound(message)
            | Self::Validation(message)
            | Self::InvalidState(message)
            | Self::Io(message)
            | Self::Internal(message) => message,
        }
    }
}

impl From<std::io::Error> for AppError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value.to_string())
    }
}

impl From<rusqlite::Error> for AppError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Internal(value.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(value: serde_json::Error) -> Self {
        Self::Internal(value.to_string())
    }
}

impl From<serde_yaml::Error> for AppError {
    fn from(value: serde_yaml::Error) -> Self {
        Self::Validation(value.to_string())
    }
}

impl From<anyhow::Error> for AppError {
    fn from(value: anyhow::Error) -> Self {
        Self::Internal(format!("{:#}", value))
    }
}

pub type AppResult<T> = Result<T, AppError>;

pub fn to_client_error(error: impl std::fmt::Display) -> String {
    error.to_string()
}

#[cfg(test)]
mod tests {
    use super::{to_client_error, AppError};

    #[test]
    fn display_carries_code_prefix() {
        let error = AppError::Conversion("Failed to convert lead to opportunity".to_string());
        assert_eq!(
            to_client_error(&error),
            "CONVERSION_FAILED: Failed to convert lead to opportunity"
        );
        assert_eq!(error.message(), "Failed to convert lead to opportunity");
    }

    #[test]
    fn io_errors_map_to_io_failure() {
        let error: AppError = std::io::Error::new(std::io::ErrorKind::NotFound, "missing").into();
        assert!(matches!(error, AppError::Io(_)));
    }
}
