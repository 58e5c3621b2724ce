use crate::auth::password;
use crate::models::user::{NewUser, User};
use crate::recovery::generate_token;
use crate::repositories::user_repository::{RepositoryError, UserRepository};
use crate::services::email_service::{templates, EmailService};
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email pattern is a valid regex")
});

#[derive(Debug, thiserror::Error)]
pub enum UserServiceError {
    #[error("Invalid email address")]
    InvalidEmail,
    #[error("Name is required")]
    MissingName,
    #[error("Password too weak (minimum 8 characters)")]
    WeakPassword,
    #[error("Passwords do not match")]
    PasswordMismatch,
    #[error("User not found")]
    UserNotFound,
    #[error("Email already registered")]
    EmailTaken,
    #[error("Invalid verification token")]
    InvalidToken,
    #[error("Password hashing failed: {0}")]
    HashingError(String),
    #[error("Repository error: {0}")]
    RepositoryError(#[from] RepositoryError),
}

pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    pub age: Option<i64>,
}

#[derive(Debug)]
pub struct Registration {
    pub user: User,
    pub delivered: bool,
}

pub struct UpdatePasswordRequest {
    pub user_id: i64,
    pub new_password: String,
    pub new_password_confirm: Option<String>,
}

/// Emails are matched case-insensitively and without surrounding whitespace.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub fn is_valid_email(email: &str) -> bool {
    email.len() <= 255 && EMAIL_RE.is_match(email)
}

pub struct UserService {
    repository: Arc<dyn UserRepository>,
    email_service: Arc<dyn EmailService>,
    base_url: String,
}

impl UserService {
    pub fn new(
        repository: Arc<dyn UserRepository>,
        email_service: Arc<dyn EmailService>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            repository,
            email_service,
            base_url: base_url.into(),
        }
    }

    /// Creates an unverified account and mails the verification link. A
    /// delivery failure keeps the account and is reported through
    /// [`Registration::delivered`].
    pub async fn register(&self, request: RegisterRequest) -> Result<Registration, UserServiceError> {
        let email = normalize_email(&request.email);
        let name = request.name.trim().to_string();

        if !is_valid_email(&email) {
            return Err(UserServiceError::InvalidEmail);
        }
        if name.is_empty() {
            return Err(UserServiceError::MissingName);
        }
        if !password::is_strong_enough(&request.password) {
            return Err(UserServiceError::WeakPassword);
        }

        let password_hash = self.hash_password(&request.password)?;
        let verification_token = generate_token();

        let user = match self
            .repository
            .create_user(NewUser {
                name,
                email,
                password_hash,
                age: request.age,
                verification_token: Some(verification_token.clone()),
            })
            .await
        {
            Ok(user) => user,
            Err(RepositoryError::AlreadyExists) => return Err(UserServiceError::EmailTaken),
            Err(e) => return Err(UserServiceError::RepositoryError(e)),
        };

        tracing::info!(user_id = user.id, "user registered");

        let message =
            templates::verification_email(&self.base_url, &user.email, &user.name, &verification_token);
        let delivered = match self.email_service.send_email(message).await {
            Ok(()) => {
                tracing::info!(user_id = user.id, "✅ verification email sent");
                true
            }
            Err(e) => {
                tracing::error!(user_id = user.id, error = %e, "❌ failed to send verification email");
                false
            }
        };

        Ok(Registration { user, delivered })
    }

    pub async fn verify_email(&self, token: &str) -> Result<User, UserServiceError> {
        let token = token.trim();
        if token.is_empty() {
            return Err(UserServiceError::InvalidToken);
        }

        let mut user = self
            .repository
            .find_by_verification_token(token)
            .await?
            .ok_or(UserServiceError::InvalidToken)?;

        self.verify_user_email(user.id).await?;
        user.verified = true;
        user.verification_token = None;

        tracing::info!(user_id = user.id, "email verified");
        Ok(user)
    }

    pub async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, UserServiceError> {
        Ok(self.repository.find_by_email(&normalize_email(email)).await?)
    }

    pub async fn find_user_by_id(&self, id: i64) -> Result<Option<User>, UserServiceError> {
        Ok(self.repository.find_by_id(id).await?)
    }

    pub async fn list_users(
        &self,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> Result<Vec<User>, UserServiceError> {
        Ok(self.repository.list_users(limit, offset).await?)
    }

    pub async fn delete_user(&self, id: i64) -> Result<(), UserServiceError> {
        match self.repository.delete_user(id).await {
            Ok(()) => Ok(()),
            Err(RepositoryError::NotFound) => Err(UserServiceError::UserNotFound),
            Err(e) => Err(UserServiceError::RepositoryError(e)),
        }
    }

    pub async fn verify_user_email(&self, id: i64) -> Result<(), UserServiceError> {
        match self.repository.verify_email(id).await {
            Ok(()) => Ok(()),
            Err(RepositoryError::NotFound) => Err(UserServiceError::UserNotFound),
            Err(e) => Err(UserServiceError::RepositoryError(e)),
        }
    }

    pub async fn clear_recovery_token(&self, id: i64) -> Result<(), UserServiceError> {
        match self.repository.clear_recovery_token(id).await {
            Ok(()) => Ok(()),
            Err(RepositoryError::NotFound) => Err(UserServiceError::UserNotFound),
            Err(e) => Err(UserServiceError::RepositoryError(e)),
        }
    }

    pub async fn update_password(
        &self,
        request: UpdatePasswordRequest,
    ) -> Result<(), UserServiceError> {
        if let Some(ref confirm) = request.new_password_confirm {
            if request.new_password != *confirm {
                return Err(UserServiceError::PasswordMismatch);
            }
        }

        if !password::is_strong_enough(&request.new_password) {
            return Err(UserServiceError::WeakPassword);
        }

        let password_hash = self.hash_password(&request.new_password)?;

        match self
            .repository
            .update_password(request.user_id, &password_hash)
            .await
        {
            Ok(()) => Ok(()),
            Err(RepositoryError::NotFound) => Err(UserServiceError::UserNotFound),
            Err(e) => Err(UserServiceError::RepositoryError(e)),
        }
    }

    fn hash_password(&self, password: &str) -> Result<String, UserServiceError> {
        password::hash_password(password).map_err(|e| UserServiceError::HashingError(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repositories::user_repository::MockUserRepository;
    use crate::services::email_service::MockEmailService;
    use mockall::predicate::*;

    fn service(repo: MockUserRepository) -> UserService {
        UserService::new(
            Arc::new(repo),
            Arc::new(MockEmailService::new()),
            "http://localhost:3000",
        )
    }

    fn sample_user() -> User {
        User {
            id: 1,
            name: "Ana".to_string(),
            email: "ana@example.com".to_string(),
            password_hash: "hash".to_string(),
            age: Some(30),
            verified: false,
            verification_token: Some("tok".to_string()),
            recovery_token: None,
            recovery_issued_at: None,
            recovery_expires_at: None,
            login_count: 0,
            created_at: None,
        }
    }

    #[tokio::test]
    async fn test_register_success_normalizes_email() {
        let mut mock_repo = MockUserRepository::new();

        let user = sample_user();
        mock_repo
            .expect_create_user()
            .withf(|new_user| {
                new_user.email == "ana@example.com"
                    && new_user.name == "Ana"
                    && new_user.verification_token.is_some()
            })
            .times(1)
            .returning(move |_| {
                let user = user.clone();
                Box::pin(async move { Ok(user) })
            });

        let request = RegisterRequest {
            name: " Ana ".to_string(),
            email: "  Ana@Example.COM ".to_string(),
            password: "password123".to_string(),
            age: Some(30),
        };

        let registration = service(mock_repo)
            .register(request)
            .await
            .expect("registration should succeed");
        assert_eq!(registration.user.email, "ana@example.com");
        assert!(registration.delivered);
    }

    #[tokio::test]
    async fn test_register_weak_password() {
        let request = RegisterRequest {
            name: "Ana".to_string(),
            email: "ana@example.com".to_string(),
            password: "short".to_string(),
            age: None,
        };

        let result = service(MockUserRepository::new()).register(request).await;
        assert!(matches!(result, Err(UserServiceError::WeakPassword)));
    }

    #[tokio::test]
    async fn test_register_invalid_email() {
        let request = RegisterRequest {
            name: "Ana".to_string(),
            email: "invalid-email".to_string(),
            password: "password123".to_string(),
            age: None,
        };

        let result = service(MockUserRepository::new()).register(request).await;
        assert!(matches!(result, Err(UserServiceError::InvalidEmail)));
    }

    #[tokio::test]
    async fn test_register_requires_name() {
        let request = RegisterRequest {
            name: "   ".to_string(),
            email: "ana@example.com".to_string(),
            password: "password123".to_string(),
            age: None,
        };

        let result = service(MockUserRepository::new()).register(request).await;
        assert!(matches!(result, Err(UserServiceError::MissingName)));
    }

    #[tokio::test]
    async fn test_verify_email_unknown_token() {
        let mut mock_repo = MockUserRepository::new();
        mock_repo
            .expect_find_by_verification_token()
            .with(eq("nope"))
            .times(1)
            .returning(|_| Box::pin(async move { Ok(None) }));

        let result = service(mock_repo).verify_email("nope").await;
        assert!(matches!(result, Err(UserServiceError::InvalidToken)));
    }

    #[test]
    fn test_email_validation() {
        assert!(is_valid_email("ana@example.com"));
        assert!(is_valid_email("ana+shop@mail.example.com"));
        assert!(!is_valid_email("ana@example"));
        assert!(!is_valid_email("ana example@x.com"));
        assert!(!is_valid_email(""));
    }
}
