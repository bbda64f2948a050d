//! Pure transition rules for per-site monitoring state.

use chrono::{DateTime, Utc};

use super::prober::ProbeResult;
use crate::db::models::{SiteStatus, Website};

/// The status edge observed on one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusTransition {
    pub previous: SiteStatus,
    pub current: SiteStatus,
}

impl StatusTransition {
    pub fn changed(&self) -> bool {
        self.previous != self.current
    }
}

/// Applies a probe result to a site, producing the updated state and the
/// observed transition. The caller persists the returned site.
///
/// Transition rules for `down_since` / `alert_sent`:
/// - up result: `down_since` cleared, `alert_sent` reset unconditionally;
/// - first non-up result: `down_since = now`, `alert_sent = false`;
/// - continued non-up result: `down_since` untouched.
pub fn apply_probe_result(
    site: &Website,
    result: &ProbeResult,
    now: DateTime<Utc>,
) -> (Website, StatusTransition) {
    let transition = StatusTransition {
        previous: site.current_status,
        current: result.status,
    };

    let mut updated = site.clone();
    updated.current_status = result.status;
    updated.last_check_time = Some(now);
    updated.last_response_time = result.response_time;

    if result.is_up {
        updated.down_since = None;
        updated.alert_sent = false;
    } else if updated.down_since.is_none() {
        updated.down_since = Some(now);
        updated.alert_sent = false;
    }

    (updated, transition)
}
