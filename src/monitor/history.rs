//! Read-side aggregation over stored health-check samples, consumed by the
//! presentation layer.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::prober::round2;
use crate::db::models::HealthCheckRecord;
use crate::db::store::{MonitorStore, StoreError};

/// Samples for one site with `checked_at >= since`, ascending by time.
pub async fn window_samples(
    store: &dyn MonitorStore,
    site_id: i32,
    since: DateTime<Utc>,
) -> Result<Vec<HealthCheckRecord>, StoreError> {
    store.samples_since(site_id, since).await
}

/// Share of up samples, as a percentage rounded to 2 decimals. Zero when
/// there are no samples.
pub fn uptime_percentage(samples: &[HealthCheckRecord]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    let up = samples.iter().filter(|s| s.is_up).count();
    round2(up as f64 * 100.0 / samples.len() as f64)
}

/// Arithmetic mean of the non-null response times, rounded to 2 decimals.
/// `None` when no sample carries a response time.
pub fn average_response_time(samples: &[HealthCheckRecord]) -> Option<f64> {
    let times: Vec<f64> = samples.iter().filter_map(|s| s.response_time).collect();
    if times.is_empty() {
        return None;
    }
    Some(round2(times.iter().sum::<f64>() / times.len() as f64))
}

#[derive(Debug, Clone, Serialize)]
pub struct HistorySummary {
    pub total_checks: usize,
    pub up_checks: usize,
    pub uptime_percentage: f64,
    pub average_response_time: Option<f64>,
}

pub fn summarize(samples: &[HealthCheckRecord]) -> HistorySummary {
    HistorySummary {
        total_checks: samples.len(),
        up_checks: samples.iter().filter(|s| s.is_up).count(),
        uptime_percentage: uptime_percentage(samples),
        average_response_time: average_response_time(samples),
    }
}
