pub mod auth_service;
pub mod contact_service;
pub mod email_service;
pub mod recovery_service;
pub mod user_service;

pub use auth_service::{AuthService, AuthServiceError, LoginRequest};
pub use contact_service::{ContactError, ContactRequest, ContactService};
pub use email_service::{
    create_email_service, EmailError, EmailService, MockEmailService, OutgoingEmail,
    SmtpEmailService,
};
pub use recovery_service::{spawn_purge_task, RecoveryError, RecoveryIssued, RecoveryService};
pub use user_service::{RegisterRequest, Registration, UserService, UserServiceError};
