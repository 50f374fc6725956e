//! SMTP email delivery via `lettre`.
//!
//! `use_ssl: true` connects with implicit TLS (typically port 465);
//! otherwise the connection is upgraded with STARTTLS.

use super::{Notification, Notifier};
use crate::config::EmailConfig;
use crate::error::{AlertError, Result};
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use std::time::Duration;

const SMTP_TIMEOUT: Duration = Duration::from_secs(10);

pub struct EmailNotifier {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    to: Vec<Mailbox>,
}

impl EmailNotifier {
    pub fn from_config(config: &EmailConfig) -> Result<Self> {
        let from: Mailbox = config.from_address.parse().map_err(|e| {
            AlertError::Config(format!("invalid from_address '{}': {}", config.from_address, e))
        })?;

        let to = config
            .to_addresses
            .iter()
            .map(|addr| {
                addr.parse::<Mailbox>().map_err(|e| {
                    AlertError::Config(format!("invalid recipient '{}': {}", addr, e))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        if to.is_empty() {
            return Err(AlertError::Config(
                "at least one recipient is required".into(),
            ));
        }

        let builder = if config.use_ssl {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&config.smtp_host)
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)
        }
        .map_err(|e| AlertError::Config(format!("SMTP host '{}': {}", config.smtp_host, e)))?;

        let transport = builder
            .port(config.smtp_port)
            .credentials(Credentials::new(
                config.username.clone(),
                config.password.clone(),
            ))
            .timeout(Some(SMTP_TIMEOUT))
            .build();

        Ok(Self { transport, from, to })
    }

    fn build_message(&self, notification: &Notification) -> Result<Message> {
        let mut builder = Message::builder().from(self.from.clone());
        for recipient in &self.to {
            builder = builder.to(recipient.clone());
        }

        builder
            .subject(&notification.subject)
            .header(ContentType::TEXT_PLAIN)
            .body(notification.body.clone())
            .map_err(|e| AlertError::Action(format!("failed to build email: {}", e)))
    }
}

#[async_trait::async_trait]
impl Notifier for EmailNotifier {
    async fn send(&self, notification: &Notification) -> Result<()> {
        let message = self.build_message(notification)?;

        self.transport
            .send(message)
            .await
            .map_err(|e| AlertError::Action(format!("SMTP delivery failed: {}", e)))?;

        tracing::info!(
            subject = %notification.subject,
            recipients = self.to.len(),
            "Email sent"
        );
        Ok(())
    }

    fn channel_name(&self) -> &str {
        "email"
    }
}
