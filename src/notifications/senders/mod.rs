use async_trait::async_trait;
use thiserror::Error;

use super::AlertContent;

pub mod email;
pub mod sms;

#[derive(Error, Debug)]
pub enum SenderError {
    #[error("failed to send notification: {0}")]
    SendFailed(String),
    #[error("invalid configuration for sender: {0}")]
    InvalidConfiguration(String),
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("mail transport error: {0}")]
    MailTransport(#[from] lettre::transport::smtp::Error),
    #[error("invalid mail address: {0}")]
    MailAddress(#[from] lettre::address::AddressError),
    #[error("failed to build mail message: {0}")]
    MailMessage(#[from] lettre::error::Error),
}

/// A trait for sending alert notifications over a specific channel.
/// All concrete sender implementations (email, SMS) must implement this
/// trait. Each send is independent and best-effort; a failure is reported
/// to the caller and never aborts the other channels.
#[async_trait]
pub trait NotificationSender: Send + Sync {
    /// Short channel name used in logs ("email", "sms").
    fn channel(&self) -> &'static str;

    async fn send(&self, content: &AlertContent) -> Result<(), SenderError>;
}
