use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;

/// Monitoring status of a website. Stored as lowercase text in the
/// `current_status` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "text", rename_all = "lowercase")]
pub enum SiteStatus {
    Up,
    Down,
    Degraded,
    Unknown,
}

impl SiteStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SiteStatus::Up => "up",
            SiteStatus::Down => "down",
            SiteStatus::Degraded => "degraded",
            SiteStatus::Unknown => "unknown",
        }
    }

    /// Down and degraded both count as a downtime period for alerting.
    pub fn is_downtime(&self) -> bool {
        matches!(self, SiteStatus::Down | SiteStatus::Degraded)
    }
}

impl fmt::Display for SiteStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The kind of alert produced by the alert policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "kebab-case")]
#[sqlx(type_name = "text", rename_all = "kebab-case")]
pub enum AlertKind {
    Down,
    Up,
    Degraded,
    RecurringDown,
}

impl AlertKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertKind::Down => "down",
            AlertKind::Up => "up",
            AlertKind::Degraded => "degraded",
            AlertKind::RecurringDown => "recurring-down",
        }
    }
}

impl fmt::Display for AlertKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A monitored website target with its configuration and mutable
/// monitoring state. Corresponds to the `websites` table.
///
/// Invariant: `down_since` is set iff `current_status` is down or degraded
/// and marks the start of the continuous downtime period; `alert_sent` is
/// reset to false whenever the site transitions back to up.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Website {
    pub id: i32,
    pub name: String,
    pub url: String,
    pub check_interval: i32, // Seconds between checks for this site.
    pub timeout: i32,        // Request timeout in seconds.
    pub expected_status_code: i32,
    pub is_active: bool,
    pub current_status: SiteStatus,
    pub last_check_time: Option<DateTime<Utc>>,
    pub last_response_time: Option<f64>, // Milliseconds.
    pub down_since: Option<DateTime<Utc>>,
    pub alert_sent: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One immutable health-check sample. Corresponds to the `health_checks`
/// table; append-only, ordered by `checked_at`.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct HealthCheckRecord {
    pub id: i32,
    pub website_id: i32,
    pub checked_at: DateTime<Utc>,
    pub status_code: Option<i32>,
    pub response_time: Option<f64>, // Milliseconds; null on failure/timeout.
    pub is_up: bool,
    pub error_message: Option<String>,
}

/// Payload for inserting a new health-check sample.
#[derive(Debug, Clone)]
pub struct NewHealthSample {
    pub website_id: i32,
    pub checked_at: DateTime<Utc>,
    pub status_code: Option<i32>,
    pub response_time: Option<f64>,
    pub is_up: bool,
    pub error_message: Option<String>,
}

/// A persisted alert audit record. Corresponds to the `alerts` table.
/// `is_read` is only ever flipped by the presentation layer.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AlertRecord {
    pub id: i32,
    pub website_id: i32,
    pub alert_kind: AlertKind,
    pub message: String,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

/// Payload for inserting a new alert record.
#[derive(Debug, Clone)]
pub struct NewAlert {
    pub website_id: i32,
    pub kind: AlertKind,
    pub message: String,
}
