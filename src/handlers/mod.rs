pub mod account_handlers;
pub mod contact_handlers;
pub mod recovery_handlers;

pub use account_handlers::{register_handler, verify_handler};
pub use contact_handlers::contact_handler;
pub use recovery_handlers::{request_recovery_handler, reset_password_handler};

pub async fn health_handler() -> &'static str {
    "ok"
}
