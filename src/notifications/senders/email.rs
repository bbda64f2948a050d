use async_trait::async_trait;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use super::{AlertContent, NotificationSender, SenderError};
use crate::config::SmtpConfig;

/// Sends alert emails over SMTP to a fixed recipient list.
pub struct EmailSender {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    recipients: Vec<Mailbox>,
}

impl EmailSender {
    pub fn new(config: &SmtpConfig) -> Result<Self, SenderError> {
        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)?
            .port(config.port)
            .credentials(Credentials::new(
                config.username.clone(),
                config.password.clone(),
            ))
            .build();

        let from: Mailbox = config.from_address.parse()?;
        let recipients = config
            .recipients
            .iter()
            .map(|r| r.parse::<Mailbox>())
            .collect::<Result<Vec<_>, _>>()?;
        if recipients.is_empty() {
            return Err(SenderError::InvalidConfiguration(
                "email sender needs at least one recipient".to_string(),
            ));
        }

        Ok(Self {
            transport,
            from,
            recipients,
        })
    }
}

#[async_trait]
impl NotificationSender for EmailSender {
    fn channel(&self) -> &'static str {
        "email"
    }

    async fn send(&self, content: &AlertContent) -> Result<(), SenderError> {
        let mut builder = Message::builder()
            .from(self.from.clone())
            .subject(&content.subject);
        for recipient in &self.recipients {
            builder = builder.to(recipient.clone());
        }
        let message = builder.body(content.body.clone())?;

        self.transport.send(message).await?;
        Ok(())
    }
}
