use crate::services::{AuthServiceError, ContactError, RecoveryError, UserServiceError};
use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use thiserror::Error;

// Type alias for Result with our AppError
pub type Result<T> = std::result::Result<T, AppError>;

/// Errors surfaced by the HTTP layer. Bodies are plain text meant for the
/// storefront to show as-is.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),

    #[error("Email not registered")]
    UnknownEmail,

    #[error("Please wait {seconds_remaining} seconds before requesting another link")]
    RateLimited { seconds_remaining: u64 },

    #[error("Invalid or already used link")]
    InvalidToken,

    #[error("The link has expired, please request a new one")]
    ExpiredToken,

    #[error("Authentication failed")]
    AuthenticationFailed,

    #[error("Not logged in")]
    Unauthorized,

    #[error("Internal server error")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::Validation(_) | AppError::InvalidToken | AppError::ExpiredToken => {
                StatusCode::BAD_REQUEST
            }
            AppError::UnknownEmail => StatusCode::NOT_FOUND,
            AppError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            AppError::AuthenticationFailed | AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Internal(detail) => {
                tracing::error!(error = %detail, "request failed");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let mut response = (status, self.to_string()).into_response();
        if let AppError::RateLimited { seconds_remaining } = self {
            if let Ok(value) = HeaderValue::from_str(&seconds_remaining.to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }
        response
    }
}

impl From<RecoveryError> for AppError {
    fn from(err: RecoveryError) -> Self {
        match err {
            RecoveryError::UnknownUser => AppError::UnknownEmail,
            RecoveryError::RateLimited { seconds_remaining } => {
                AppError::RateLimited { seconds_remaining }
            }
            RecoveryError::InvalidToken => AppError::InvalidToken,
            RecoveryError::ExpiredToken => AppError::ExpiredToken,
            RecoveryError::WeakPassword => AppError::Validation(err.to_string()),
            RecoveryError::HashingError(_) | RecoveryError::RepositoryError(_) => {
                AppError::Internal(err.to_string())
            }
        }
    }
}

impl From<UserServiceError> for AppError {
    fn from(err: UserServiceError) -> Self {
        match err {
            UserServiceError::InvalidEmail
            | UserServiceError::MissingName
            | UserServiceError::WeakPassword
            | UserServiceError::PasswordMismatch
            | UserServiceError::EmailTaken => AppError::Validation(err.to_string()),
            UserServiceError::InvalidToken => AppError::InvalidToken,
            UserServiceError::UserNotFound => AppError::Unauthorized,
            UserServiceError::HashingError(_) | UserServiceError::RepositoryError(_) => {
                AppError::Internal(err.to_string())
            }
        }
    }
}

impl From<AuthServiceError> for AppError {
    fn from(err: AuthServiceError) -> Self {
        match err {
            AuthServiceError::InvalidCredentials => AppError::AuthenticationFailed,
            AuthServiceError::UserNotFound => AppError::Unauthorized,
            AuthServiceError::RepositoryError(e) => AppError::Internal(e.to_string()),
        }
    }
}

impl From<ContactError> for AppError {
    fn from(err: ContactError) -> Self {
        match err {
            ContactError::MissingFields | ContactError::InvalidEmail => {
                AppError::Validation(err.to_string())
            }
            ContactError::Email(e) => AppError::Internal(e.to_string()),
        }
    }
}
