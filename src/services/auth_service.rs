use crate::auth::password;
use crate::models::user::User;
use crate::repositories::user_repository::{RepositoryError, UserRepository};
use crate::services::user_service::normalize_email;
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum AuthServiceError {
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error("User not found")]
    UserNotFound,
    #[error("Repository error: {0}")]
    RepositoryError(#[from] RepositoryError),
}

pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

pub struct AuthService {
    user_repository: Arc<dyn UserRepository>,
}

impl AuthService {
    pub fn new(user_repository: Arc<dyn UserRepository>) -> Self {
        Self { user_repository }
    }

    /// Checks the credentials and counts the login. The returned user carries
    /// the updated login counter.
    pub async fn authenticate(&self, request: LoginRequest) -> Result<User, AuthServiceError> {
        let email = normalize_email(&request.email);

        let mut user = self
            .user_repository
            .find_by_email(&email)
            .await?
            .ok_or(AuthServiceError::InvalidCredentials)?;

        if !password::verify_password(&request.password, &user.password_hash) {
            tracing::warn!(user_id = user.id, "login with wrong password");
            return Err(AuthServiceError::InvalidCredentials);
        }

        user.login_count = match self.user_repository.record_login(user.id).await {
            Ok(count) => count,
            Err(RepositoryError::NotFound) => return Err(AuthServiceError::InvalidCredentials),
            Err(e) => return Err(e.into()),
        };

        tracing::info!(user_id = user.id, logins = user.login_count, "user logged in");
        Ok(user)
    }

    pub async fn get_user_by_id(&self, user_id: i64) -> Result<User, AuthServiceError> {
        self.user_repository
            .find_by_id(user_id)
            .await?
            .ok_or(AuthServiceError::UserNotFound)
    }
}
