pub mod auth;
pub mod clock;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod models;
pub mod recovery;
pub mod repositories;
pub mod routes;
pub mod services;

// Make test_utils available for both unit tests and integration tests
pub mod test_utils;

use clock::Clock;
use repositories::{SqliteUserRepository, UserRepository};
use services::{AuthService, ContactService, EmailService, RecoveryService, UserService};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub user_service: Arc<UserService>,
    pub auth_service: Arc<AuthService>,
    pub recovery_service: Arc<RecoveryService>,
    pub contact_service: Arc<ContactService>,
    pub pool: sqlx::SqlitePool,
}

impl AppState {
    /// Wires every service over one SQLite-backed user repository.
    pub fn new(
        pool: sqlx::SqlitePool,
        email_service: Arc<dyn EmailService>,
        clock: Arc<dyn Clock>,
        base_url: &str,
        support_email: &str,
    ) -> Self {
        let user_repository: Arc<dyn UserRepository> =
            Arc::new(SqliteUserRepository::new(pool.clone()));

        Self {
            user_service: Arc::new(UserService::new(
                user_repository.clone(),
                email_service.clone(),
                base_url,
            )),
            auth_service: Arc::new(AuthService::new(user_repository.clone())),
            recovery_service: Arc::new(RecoveryService::new(
                user_repository,
                email_service.clone(),
                clock,
                base_url,
            )),
            contact_service: Arc::new(ContactService::new(email_service, support_email)),
            pool,
        }
    }
}
