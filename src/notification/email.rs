//! SMTP delivery via lettre.

use crate::config::{SmtpConfig, SmtpSecurity};
use crate::core::{Alert, Output};
use crate::formatting::EmailFormatter;
use anyhow::{Context, Result};
use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use std::sync::Arc;
use tokio::task;
use tracing::{error, info, instrument};

/// Sends a plain-text message to a list of recipients.
#[async_trait]
pub trait MailTransport: Send + Sync {
    async fn send(&self, subject: &str, body: &str, recipients: &[String]) -> Result<()>;
}

/// A [`MailTransport`] that talks to an SMTP relay.
pub struct SmtpMailer {
    config: SmtpConfig,
}

impl SmtpMailer {
    pub fn new(config: SmtpConfig) -> Self {
        Self { config }
    }

    fn build_message(&self, subject: &str, body: &str, recipients: &[String]) -> Result<Message> {
        let sender: Mailbox = self
            .config
            .sender
            .parse()
            .with_context(|| format!("Invalid sender address '{}'", self.config.sender))?;

        let mut builder = Message::builder().from(sender).subject(subject);
        for recipient in recipients {
            let mailbox: Mailbox = recipient
                .parse()
                .with_context(|| format!("Invalid recipient address '{}'", recipient))?;
            builder = builder.to(mailbox);
        }

        builder
            .header(ContentType::TEXT_PLAIN)
            .body(body.to_string())
            .context("Failed to build email message")
    }

    fn transport(&self) -> Result<SmtpTransport> {
        let server = self.config.server.as_str();
        let builder = match self.config.security {
            SmtpSecurity::Tls => SmtpTransport::relay(server)
                .with_context(|| format!("Failed to set up TLS relay {}", server))?,
            SmtpSecurity::Starttls => SmtpTransport::starttls_relay(server)
                .with_context(|| format!("Failed to set up STARTTLS relay {}", server))?,
            SmtpSecurity::None => SmtpTransport::builder_dangerous(server),
        };

        let builder = builder.port(self.config.port);
        let builder = if self.config.use_auth {
            builder.credentials(Credentials::new(
                self.config.username.clone(),
                self.config.password.clone(),
            ))
        } else {
            builder
        };
        Ok(builder.build())
    }
}

#[async_trait]
impl MailTransport for SmtpMailer {
    #[instrument(skip_all, fields(server = %self.config.server, recipients = recipients.len()))]
    async fn send(&self, subject: &str, body: &str, recipients: &[String]) -> Result<()> {
        let message = self.build_message(subject, body, recipients)?;
        let transport = self.transport()?;

        let result = task::spawn_blocking(move || transport.send(&message)).await;
        match result {
            Ok(Ok(_)) => {
                info!("Email sent.");
                Ok(())
            }
            Ok(Err(e)) => Err(e).context("SMTP delivery failed"),
            Err(e) => {
                error!(error = %e, "Email task failed");
                Err(e.into())
            }
        }
    }
}

/// Emails every HIGH alert.
pub struct EmailOutput {
    mailer: Arc<dyn MailTransport>,
    formatter: EmailFormatter,
    recipients: Vec<String>,
}

impl EmailOutput {
    pub fn new(mailer: Arc<dyn MailTransport>, formatter: EmailFormatter, recipients: Vec<String>) -> Self {
        Self {
            mailer,
            formatter,
            recipients,
        }
    }

    /// Builds an output backed by [`SmtpMailer`] from the SMTP settings.
    pub fn from_config(config: &SmtpConfig) -> Self {
        Self::new(
            Arc::new(SmtpMailer::new(config.clone())),
            EmailFormatter::new(config.subject_template.clone()),
            config.recipients.clone(),
        )
    }
}

#[async_trait]
impl Output for EmailOutput {
    fn name(&self) -> &str {
        "email"
    }

    async fn send_alert(&self, alert: &Alert) -> Result<()> {
        let subject = self.formatter.subject(alert);
        let body = self.formatter.body(alert);
        self.mailer
            .send(&subject, &body, &self.recipients)
            .await
            .with_context(|| format!("Failed to email alert for {}", alert.domain))
    }
}
