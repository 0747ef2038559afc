use shared::error::{ApiError, ErrorCode};
use thiserror::Error;

/// Failures of store operations. `Display` is the user-facing message.
#[derive(Debug, Error)]
pub enum LmsError {
    #[error("No account found with that email address.")]
    UnknownEmail,
    #[error("Incorrect password. Please try again.")]
    WrongPassword,
    #[error("Your account is deactivated. Please contact support.")]
    AccountInactive,
    #[error("An account with this email already exists. Please sign in.")]
    DuplicateEmail,
    #[error("You have already submitted this assignment.")]
    AlreadySubmitted,
    #[error("This quiz can only be taken once.")]
    RetakeNotAllowed,
    #[error("You must be signed in to do that.")]
    Unauthorized,
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    Validation(String),
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },
    #[error("storage failure: {0:#}")]
    Storage(#[from] anyhow::Error),
}

impl LmsError {
    pub fn not_found(entity: &'static str, id: i64) -> Self {
        Self::NotFound { entity, id }
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden(message.into())
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            LmsError::UnknownEmail
            | LmsError::WrongPassword
            | LmsError::AccountInactive
            | LmsError::Unauthorized => ErrorCode::Unauthorized,
            LmsError::DuplicateEmail | LmsError::AlreadySubmitted | LmsError::RetakeNotAllowed => {
                ErrorCode::Conflict
            }
            LmsError::Forbidden(_) => ErrorCode::Forbidden,
            LmsError::Validation(_) => ErrorCode::Validation,
            LmsError::NotFound { .. } => ErrorCode::NotFound,
            LmsError::Storage(_) => ErrorCode::Internal,
        }
    }
}

impl From<LmsError> for ApiError {
    fn from(value: LmsError) -> Self {
        ApiError::new(value.code(), value.to_string())
    }
}
