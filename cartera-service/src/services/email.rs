use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Attachment as MailAttachment, Mailbox, MultiPart},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use secrecy::ExposeSecret;
use service_core::error::AppError;
use std::sync::Arc;
use std::time::Duration;

use crate::config::SmtpConfig;

#[derive(Debug, Clone)]
pub struct Attachment {
    pub file_name: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

/// A fully composed email with a plain and an HTML body.
#[derive(Debug, Clone)]
pub struct OutgoingEmail {
    pub to: String,
    pub subject: String,
    pub text: String,
    pub html: String,
    pub attachment: Option<Attachment>,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: &OutgoingEmail) -> Result<(), AppError>;
}

pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn new(config: &SmtpConfig) -> Result<Self, AppError> {
        let creds = Credentials::new(
            config.user.clone(),
            config.password.expose_secret().clone(),
        );

        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
            .map_err(|e| AppError::EmailError(format!("Failed to create SMTP relay: {}", e)))?
            .port(config.port)
            .credentials(creds)
            .timeout(Some(Duration::from_secs(15)))
            .build();

        let from: Mailbox = format!("{} <{}>", config.from_name, config.from_email)
            .parse()
            .map_err(|e| AppError::EmailError(format!("Invalid from address: {}", e)))?;

        tracing::info!(host = %config.host, port = config.port, "SMTP mailer initialized");

        Ok(Self { transport, from })
    }

    fn build_message(&self, email: &OutgoingEmail) -> Result<Message, AppError> {
        let to: Mailbox = email
            .to
            .parse()
            .map_err(|e| AppError::EmailError(format!("Invalid recipient: {}", e)))?;

        let bodies = MultiPart::alternative_plain_html(email.text.clone(), email.html.clone());
        let body = match &email.attachment {
            Some(attachment) => {
                let content_type = ContentType::parse(&attachment.content_type)
                    .or_else(|_| ContentType::parse("application/octet-stream"))
                    .map_err(|e| AppError::EmailError(format!("Invalid content type: {}", e)))?;
                MultiPart::mixed().multipart(bodies).singlepart(
                    MailAttachment::new(attachment.file_name.clone())
                        .body(attachment.data.clone(), content_type),
                )
            }
            None => bodies,
        };

        Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(&email.subject)
            .multipart(body)
            .map_err(AppError::from)
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, email: &OutgoingEmail) -> Result<(), AppError> {
        let message = self.build_message(email)?;

        match self.transport.send(message).await {
            Ok(_) => {
                tracing::info!(to = %email.to, subject = %email.subject, "Email sent successfully");
                Ok(())
            }
            Err(e) => {
                tracing::error!(error = %e, to = %email.to, "Failed to send email");
                Err(AppError::EmailError(e.to_string()))
            }
        }
    }
}

/// Mailer used when SMTP is not configured; every send fails.
pub struct DisabledMailer;

#[async_trait]
impl Mailer for DisabledMailer {
    async fn send(&self, email: &OutgoingEmail) -> Result<(), AppError> {
        tracing::warn!(to = %email.to, subject = %email.subject, "Email delivery disabled");
        Err(AppError::EmailError("email delivery disabled".to_string()))
    }
}

pub fn mailer_from_config(config: &SmtpConfig) -> Result<Arc<dyn Mailer>, AppError> {
    if !config.enabled {
        tracing::warn!("SMTP disabled, receipts will not be delivered");
        return Ok(Arc::new(DisabledMailer));
    }
    Ok(Arc::new(SmtpMailer::new(config)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::Secret;

    fn config() -> SmtpConfig {
        SmtpConfig {
            enabled: true,
            host: "smtp.example.com".to_string(),
            port: 587,
            user: "cartera".to_string(),
            password: Secret::new("secret".to_string()),
            from_email: "cartera@example.com".to_string(),
            from_name: "Cartera".to_string(),
        }
    }

    fn email(attachment: Option<Attachment>) -> OutgoingEmail {
        OutgoingEmail {
            to: "proveedor@example.com".to_string(),
            subject: "Recibo de pago".to_string(),
            text: "Hola".to_string(),
            html: "<p>Hola</p>".to_string(),
            attachment,
        }
    }

    #[tokio::test]
    async fn message_carries_attachment() {
        let mailer = SmtpMailer::new(&config()).unwrap();
        let message = mailer
            .build_message(&email(Some(Attachment {
                file_name: "comprobante.pdf".to_string(),
                content_type: "application/pdf".to_string(),
                data: b"%PDF-1.4".to_vec(),
            })))
            .unwrap();
        let raw = String::from_utf8_lossy(&message.formatted()).to_string();
        assert!(raw.contains("comprobante.pdf"));
        assert!(raw.contains("application/pdf"));
        assert!(raw.contains("text/html"));
    }

    #[tokio::test]
    async fn invalid_recipient_is_an_email_error() {
        let mailer = SmtpMailer::new(&config()).unwrap();
        let mut bad = email(None);
        bad.to = "not an address".to_string();
        assert!(matches!(
            mailer.build_message(&bad),
            Err(AppError::EmailError(_))
        ));
    }

    #[tokio::test]
    async fn disabled_mailer_refuses() {
        let err = DisabledMailer.send(&email(None)).await.unwrap_err();
        assert!(err.to_string().contains("email delivery disabled"));
    }
}
