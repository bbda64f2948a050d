//! Single-shot HTTP health checks and their classification.

use async_trait::async_trait;
use serde::Serialize;
use std::time::{Duration, Instant};
use tracing::debug;

use crate::db::models::{SiteStatus, Website};
use crate::version::VERSION;

/// Normalized outcome of one probe attempt.
#[derive(Debug, Clone, Serialize)]
pub struct ProbeResult {
    pub is_up: bool,
    pub status: SiteStatus,
    pub status_code: Option<i32>,
    pub response_time: Option<f64>, // Milliseconds, rounded to 2 decimals.
    pub error_message: Option<String>,
}

/// A health-check implementation. The scheduler is generic over this so
/// tests can script probe outcomes.
#[async_trait]
pub trait Probe: Send + Sync {
    async fn probe(&self, site: &Website) -> ProbeResult;
}

/// Probes a site with a single HTTP GET, following redirects, bounded by
/// the site's configured timeout. Exactly one attempt per invocation; any
/// retry cadence is the scheduler's concern.
pub struct HttpProber;

impl Default for HttpProber {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpProber {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Probe for HttpProber {
    async fn probe(&self, site: &Website) -> ProbeResult {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(site.timeout.max(1) as u64))
            .user_agent(format!("sitewatch/{VERSION}"))
            .build()
            .unwrap(); // Should not fail with default settings

        let start = Instant::now();
        match client.get(&site.url).send().await {
            Ok(response) => {
                let elapsed_ms = round2(start.elapsed().as_secs_f64() * 1000.0);
                let result = classify_response(
                    response.status().as_u16(),
                    site.expected_status_code,
                    elapsed_ms,
                );
                debug!(
                    site = %site.name,
                    status = %result.status,
                    status_code = ?result.status_code,
                    response_time_ms = ?result.response_time,
                    "Probe completed."
                );
                result
            }
            Err(e) => {
                let result = classify_failure(&e, site.timeout);
                debug!(site = %site.name, error = ?result.error_message, "Probe failed.");
                result
            }
        }
    }
}

/// Classifies a received HTTP response. A code equal to the expected one,
/// or any 2xx/3xx, counts as up; anything else is degraded (reachable but
/// wrong answer), with the response time still recorded.
pub fn classify_response(status_code: u16, expected_status_code: i32, elapsed_ms: f64) -> ProbeResult {
    let code = status_code as i32;
    if code == expected_status_code || (200..400).contains(&code) {
        ProbeResult {
            is_up: true,
            status: SiteStatus::Up,
            status_code: Some(code),
            response_time: Some(elapsed_ms),
            error_message: None,
        }
    } else {
        ProbeResult {
            is_up: false,
            status: SiteStatus::Degraded,
            status_code: Some(code),
            response_time: Some(elapsed_ms),
            error_message: Some(format!("Unexpected status code: {code}")),
        }
    }
}

/// Maps a transport failure to a down result. No status code and no
/// response time are recorded for failed attempts.
fn classify_failure(error: &reqwest::Error, timeout_seconds: i32) -> ProbeResult {
    let error_message = if error.is_timeout() {
        format!("Request timeout after {timeout_seconds} seconds")
    } else if error.is_connect() {
        format!("Connection error: {error}")
    } else {
        format!("Request error: {error}")
    };
    ProbeResult {
        is_up: false,
        status: SiteStatus::Down,
        status_code: None,
        response_time: None,
        error_message: Some(error_message),
    }
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
