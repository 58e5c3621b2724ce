use crate::services::email_service::{templates, EmailError, EmailService};
use crate::services::user_service::is_valid_email;
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;

static LINK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)https?://").expect("link pattern is a valid regex"));
static WWW_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)www\.").expect("www pattern is a valid regex"));

const DEFAULT_SUBJECT: &str = "No subject";

#[derive(Debug, thiserror::Error)]
pub enum ContactError {
    #[error("Name, email and message are required")]
    MissingFields,
    #[error("Invalid email address")]
    InvalidEmail,
    #[error(transparent)]
    Email(#[from] EmailError),
}

#[derive(Debug, Clone)]
pub struct ContactRequest {
    pub name: String,
    pub email: String,
    pub subject: Option<String>,
    pub message: String,
}

/// Escapes angle brackets and defangs links in customer-supplied text.
pub fn sanitize_message(message: &str) -> String {
    let escaped = message.replace('<', "&lt;").replace('>', "&gt;");
    let without_links = LINK_RE.replace_all(&escaped, " [LINK REMOVED] ");
    WWW_RE.replace_all(&without_links, " www . ").into_owned()
}

pub struct ContactService {
    email_service: Arc<dyn EmailService>,
    support_address: String,
}

impl ContactService {
    pub fn new(email_service: Arc<dyn EmailService>, support_address: impl Into<String>) -> Self {
        Self {
            email_service,
            support_address: support_address.into(),
        }
    }

    pub fn support_address(&self) -> &str {
        &self.support_address
    }

    pub async fn submit(&self, request: ContactRequest) -> Result<(), ContactError> {
        let name = request.name.trim();
        let email = request.email.trim();
        let message = request.message.trim();

        if name.is_empty() || email.is_empty() || message.is_empty() {
            return Err(ContactError::MissingFields);
        }
        if !is_valid_email(email) {
            return Err(ContactError::InvalidEmail);
        }

        let subject = request
            .subject
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(sanitize_message)
            .unwrap_or_else(|| DEFAULT_SUBJECT.to_string());

        let outgoing = templates::contact_email(
            &self.support_address,
            email,
            name,
            &subject,
            &sanitize_message(message),
        );

        self.email_service.send_email(outgoing).await?;
        tracing::info!("📨 contact message forwarded to support");
        Ok(())
    }
}
