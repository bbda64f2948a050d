//! Alert dispatch: turns alert decisions into channel notifications.

use tracing::{error, info, warn};

use crate::config::Config;
use crate::db::models::{AlertKind, Website};

pub mod senders;

use senders::NotificationSender;
use senders::email::EmailSender;
use senders::sms::SmsSender;

/// Subject and per-channel bodies for one alert. The email body carries the
/// full `down_since` timestamp; the SMS body keeps only the time of day.
#[derive(Debug, Clone)]
pub struct AlertContent {
    pub subject: String,
    pub body: String,
    pub sms_body: String,
}

/// Renders the notification text for a decided alert.
pub fn alert_content(site: &Website, kind: AlertKind) -> AlertContent {
    let full = site
        .down_since
        .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string());
    let time_only = site.down_since.map(|t| t.format("%H:%M:%S").to_string());

    let subject = match kind {
        AlertKind::Down => format!("Website Down: {}", site.name),
        AlertKind::RecurringDown => format!("Website Still Down: {}", site.name),
        AlertKind::Up => format!("Website Recovered: {}", site.name),
        AlertKind::Degraded => format!("Website Degraded: {}", site.name),
    };

    AlertContent {
        subject,
        body: render_body(site, kind, full.as_deref()),
        sms_body: render_body(site, kind, time_only.as_deref()),
    }
}

fn render_body(site: &Website, kind: AlertKind, down_since: Option<&str>) -> String {
    let headline = match kind {
        AlertKind::Down => format!("{} is DOWN!", site.name),
        AlertKind::RecurringDown => format!("{} is still DOWN!", site.name),
        AlertKind::Up => format!("{} is back UP!", site.name),
        AlertKind::Degraded => format!("{} is DEGRADED!", site.name),
    };
    match (kind, down_since) {
        (AlertKind::Down | AlertKind::RecurringDown, Some(ts)) => {
            format!("{headline}\nURL: {}\nDown since: {ts}", site.url)
        }
        _ => format!("{headline}\nURL: {}", site.url),
    }
}

/// Dispatches one alert to every configured channel, best-effort. A channel
/// failure is logged and never blocks the other channels or the caller.
pub struct AlertNotifier {
    senders: Vec<Box<dyn NotificationSender>>,
}

impl AlertNotifier {
    /// Builds the notifier from the runtime configuration. A channel with
    /// missing settings is skipped and logged once, here at startup.
    pub fn from_config(config: &Config) -> Self {
        let mut senders: Vec<Box<dyn NotificationSender>> = Vec::new();

        match &config.smtp {
            Some(smtp) => match EmailSender::new(smtp) {
                Ok(sender) => senders.push(Box::new(sender)),
                Err(e) => error!(error = %e, "Email channel misconfigured, disabling it."),
            },
            None => warn!("Email channel unavailable: SMTP settings not configured."),
        }

        match &config.twilio {
            Some(twilio) => senders.push(Box::new(SmsSender::new(twilio.clone()))),
            None => warn!("SMS channel unavailable: Twilio credentials not configured."),
        }

        Self { senders }
    }

    pub fn with_senders(senders: Vec<Box<dyn NotificationSender>>) -> Self {
        Self { senders }
    }

    pub fn is_empty(&self) -> bool {
        self.senders.is_empty()
    }

    /// Returns true when at least one channel accepted the notification.
    pub async fn dispatch(&self, content: &AlertContent) -> bool {
        let mut any_success = false;
        for sender in &self.senders {
            match sender.send(content).await {
                Ok(()) => {
                    info!(channel = sender.channel(), subject = %content.subject, "Alert notification sent.");
                    any_success = true;
                }
                Err(e) => {
                    error!(channel = sender.channel(), error = %e, "Failed to send alert notification.");
                }
            }
        }
        any_success
    }
}
