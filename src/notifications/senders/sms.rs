use async_trait::async_trait;
use reqwest::Client;

use super::{AlertContent, NotificationSender, SenderError};
use crate::config::TwilioConfig;

const TWILIO_API_BASE: &str = "https://api.twilio.com/2010-04-01";

/// Sends alert SMS messages via the Twilio REST API.
pub struct SmsSender {
    client: Client,
    config: TwilioConfig,
}

impl SmsSender {
    pub fn new(config: TwilioConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }
}

#[async_trait]
impl NotificationSender for SmsSender {
    fn channel(&self) -> &'static str {
        "sms"
    }

    // The subject is folded into the SMS body; SMS has no subject line.
    async fn send(&self, content: &AlertContent) -> Result<(), SenderError> {
        let api_url = format!(
            "{TWILIO_API_BASE}/Accounts/{}/Messages.json",
            self.config.account_sid
        );
        let text = format!("{}\n{}", content.subject, content.sms_body);
        let params = [
            ("To", self.config.admin_number.as_str()),
            ("From", self.config.from_number.as_str()),
            ("Body", text.as_str()),
        ];

        let response = self
            .client
            .post(&api_url)
            .basic_auth(&self.config.account_sid, Some(&self.config.auth_token))
            .form(&params)
            .send()
            .await?;
        let status = response.status();

        if !status.is_success() {
            let error_body = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read error body".to_string());
            return Err(SenderError::SendFailed(format!(
                "Twilio API returned non-success status: {status}. Body: {error_body}"
            )));
        }

        Ok(())
    }
}
