use async_trait::async_trait;
use lettre::{
    message::header::ContentType, transport::smtp::authentication::Credentials, AsyncSmtpTransport,
    AsyncTransport, Message, Tokio1Executor,
};
use std::{env, sync::Arc};

#[derive(Debug, thiserror::Error)]
pub enum EmailError {
    #[error("Failed to build email message: {0}")]
    MessageBuild(String),
    #[error("Failed to send email: {0}")]
    SendFailed(String),
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// A rendered message ready to hand to a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingEmail {
    pub to: String,
    pub reply_to: Option<String>,
    pub subject: String,
    pub html_body: String,
}

#[async_trait]
pub trait EmailService: Send + Sync {
    async fn send_email(&self, email: OutgoingEmail) -> Result<(), EmailError>;
}

pub struct MockEmailService;

impl MockEmailService {
    pub fn new() -> Self {
        Self
    }
}

impl Default for MockEmailService {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EmailService for MockEmailService {
    async fn send_email(&self, email: OutgoingEmail) -> Result<(), EmailError> {
        tracing::info!("📧 [MOCK EMAIL] To: {}", email.to);
        if let Some(reply_to) = &email.reply_to {
            tracing::info!("   Reply-To: {}", reply_to);
        }
        tracing::info!("   Subject: {}", email.subject);
        tracing::debug!("   Body: {}", email.html_body);
        tracing::info!("   ---");
        Ok(())
    }
}

pub struct SmtpEmailService {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from_email: String,
    from_name: String,
}

impl SmtpEmailService {
    pub fn new() -> Result<Self, EmailError> {
        let smtp_host = env::var("SMTP_HOST")
            .map_err(|_| EmailError::ConfigError("SMTP_HOST not set".to_string()))?;
        let smtp_port = env::var("SMTP_PORT")
            .unwrap_or_else(|_| "587".to_string())
            .parse::<u16>()
            .map_err(|_| EmailError::ConfigError("Invalid SMTP_PORT".to_string()))?;
        let smtp_username = env::var("SMTP_USERNAME")
            .map_err(|_| EmailError::ConfigError("SMTP_USERNAME not set".to_string()))?;
        let smtp_password = env::var("SMTP_PASSWORD")
            .map_err(|_| EmailError::ConfigError("SMTP_PASSWORD not set".to_string()))?;
        let from_email = env::var("SMTP_FROM_EMAIL").unwrap_or_else(|_| smtp_username.clone());
        let from_name = env::var("SMTP_FROM_NAME").unwrap_or_else(|_| "Totalis Shop".to_string());

        let encryption = env::var("SMTP_ENCRYPTION").unwrap_or_else(|_| "starttls".to_string());

        let credentials = Credentials::new(smtp_username, smtp_password);

        let mailer = match encryption.to_lowercase().as_str() {
            "tls" => AsyncSmtpTransport::<Tokio1Executor>::relay(&smtp_host)
                .map_err(|e| EmailError::ConfigError(format!("SMTP relay error: {}", e)))?
                .port(smtp_port)
                .credentials(credentials)
                .build(),
            "starttls" => AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&smtp_host)
                .map_err(|e| EmailError::ConfigError(format!("SMTP starttls error: {}", e)))?
                .port(smtp_port)
                .credentials(credentials)
                .build(),
            "none" => AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&smtp_host)
                .port(smtp_port)
                .credentials(credentials)
                .build(),
            _ => {
                return Err(EmailError::ConfigError(format!(
                    "Invalid SMTP_ENCRYPTION value: {}. Use 'tls', 'starttls', or 'none'",
                    encryption
                )))
            }
        };

        Ok(Self {
            mailer,
            from_email,
            from_name,
        })
    }
}

#[async_trait]
impl EmailService for SmtpEmailService {
    async fn send_email(&self, email: OutgoingEmail) -> Result<(), EmailError> {
        let mut builder = Message::builder()
            .from(
                format!("{} <{}>", self.from_name, self.from_email)
                    .parse()
                    .map_err(|e| {
                        EmailError::MessageBuild(format!("Invalid from address: {}", e))
                    })?,
            )
            .to(email
                .to
                .parse()
                .map_err(|e| EmailError::MessageBuild(format!("Invalid to address: {}", e)))?);

        if let Some(reply_to) = &email.reply_to {
            builder = builder.reply_to(reply_to.parse().map_err(|e| {
                EmailError::MessageBuild(format!("Invalid reply-to address: {}", e))
            })?);
        }

        let message = builder
            .subject(email.subject)
            .header(ContentType::TEXT_HTML)
            .body(email.html_body)
            .map_err(|e| EmailError::MessageBuild(e.to_string()))?;

        self.mailer
            .send(message)
            .await
            .map_err(|e| EmailError::SendFailed(e.to_string()))?;

        Ok(())
    }
}

pub fn create_email_service() -> Arc<dyn EmailService> {
    if env::var("SMTP_HOST").is_ok() {
        match SmtpEmailService::new() {
            Ok(service) => {
                tracing::info!("Using SMTP email service");
                Arc::new(service)
            }
            Err(e) => {
                tracing::warn!(
                    "Failed to initialize SMTP email service: {}. Falling back to mock service",
                    e
                );
                Arc::new(MockEmailService::new())
            }
        }
    } else {
        tracing::info!(
            "SMTP not configured. Using mock email service (emails will be logged to console)"
        );
        Arc::new(MockEmailService::new())
    }
}

/// Message bodies for the account and contact flows.
pub mod templates {
    use super::OutgoingEmail;

    pub fn escape_html(input: &str) -> String {
        let mut out = String::with_capacity(input.len());
        for c in input.chars() {
            match c {
                '&' => out.push_str("&amp;"),
                '<' => out.push_str("&lt;"),
                '>' => out.push_str("&gt;"),
                '"' => out.push_str("&quot;"),
                '\'' => out.push_str("&#39;"),
                _ => out.push(c),
            }
        }
        out
    }

    pub fn verification_link(base_url: &str, token: &str) -> String {
        format!("{}/verificar.html?token={}", base_url.trim_end_matches('/'), token)
    }

    pub fn recovery_link(base_url: &str, token: &str) -> String {
        format!("{}/restablecer.html?token={}", base_url.trim_end_matches('/'), token)
    }

    pub fn verification_email(base_url: &str, to: &str, name: &str, token: &str) -> OutgoingEmail {
        let link = verification_link(base_url, token);
        let html_body = format!(
            r#"
<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8">
</head>
<body style="font-family: Arial, sans-serif; max-width: 600px; margin: 0 auto; padding: 20px;">
    <h2 style="color: #FF6600;">Hello, {name}!</h2>
    <p>Thanks for signing up to Totalis Shop. One more step and your account is active.</p>
    <p style="text-align: center; margin: 30px 0;">
        <a href="{link}" style="background-color: #FF6600; color: white; padding: 12px 24px; text-decoration: none; border-radius: 5px; font-weight: bold;">Verify my account</a>
    </p>
    <p style="color: #777; font-size: 14px;">If the button does not work, copy this link into your browser:</p>
    <p style="color: #777; font-size: 14px; word-break: break-all;">{link}</p>
</body>
</html>
"#,
            name = escape_html(name),
            link = link,
        );

        OutgoingEmail {
            to: to.to_string(),
            reply_to: None,
            subject: "Welcome to Totalis Shop! Confirm your account".to_string(),
            html_body,
        }
    }

    pub fn recovery_email(base_url: &str, to: &str, token: &str) -> OutgoingEmail {
        let link = recovery_link(base_url, token);
        let html_body = format!(
            r#"
<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8">
</head>
<body style="font-family: Arial, sans-serif; max-width: 600px; margin: 0 auto; padding: 20px;">
    <h2 style="color: #007bff;">Reset your password</h2>
    <p>We received a request to change your password.</p>
    <p>Click the button below to continue. The link expires in 1 hour.</p>
    <p style="text-align: center; margin: 30px 0;">
        <a href="{link}" style="background-color: #007bff; color: white; padding: 12px 24px; text-decoration: none; border-radius: 5px; font-weight: bold;">Reset password</a>
    </p>
    <p style="color: #777; font-size: 12px;">If you did not ask for this change, you can ignore this email.</p>
</body>
</html>
"#,
            link = link,
        );

        OutgoingEmail {
            to: to.to_string(),
            reply_to: None,
            subject: "Reset your password".to_string(),
            html_body,
        }
    }

    /// `message` is expected to be sanitized already.
    pub fn contact_email(
        support_address: &str,
        from_email: &str,
        from_name: &str,
        subject: &str,
        message: &str,
    ) -> OutgoingEmail {
        let html_body = format!(
            r#"
<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8">
</head>
<body style="font-family: Arial, sans-serif; max-width: 600px; margin: 0 auto; padding: 20px;">
    <h3>Message from the website</h3>
    <p><strong>From:</strong> {name} ({email})</p>
    <p style="white-space: pre-wrap;"><strong>Message:</strong> {message}</p>
</body>
</html>
"#,
            name = escape_html(from_name),
            email = escape_html(from_email),
            message = message,
        );

        OutgoingEmail {
            to: support_address.to_string(),
            reply_to: Some(from_email.to_string()),
            subject: format!("Web: {}", subject),
            html_body,
        }
    }

}
