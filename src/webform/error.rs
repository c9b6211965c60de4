use thiserror::Error;

use crate::database::StoreError;
use crate::files::FileError;

/// Failures surfaced by the web form operations
#[derive(Debug, Error)]
pub enum WebFormError {
    #[error("{message}")]
    Validation { message: String, field: Option<String> },

    #[error("{0}")]
    AuthenticationRequired(String),

    #[error("{0}")]
    Permission(String),

    #[error("{0}")]
    NotFound(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    File(#[from] FileError),
}

impl WebFormError {
    pub fn validation(message: impl Into<String>) -> Self {
        WebFormError::Validation { message: message.into(), field: None }
    }

    pub fn field_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        WebFormError::Validation { message: message.into(), field: Some(field.into()) }
    }

    pub fn not_allowed() -> Self {
        WebFormError::Permission("Not Allowed".to_string())
    }
}
