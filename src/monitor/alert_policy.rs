//! The single alert-decision function. Every entry point (scheduled tick,
//! on-demand check) goes through [`decide`] so alert behavior cannot
//! diverge between code paths.

use chrono::{DateTime, Utc};

use crate::db::models::{AlertKind, SiteStatus};

/// Continuous downtime required before the threshold alert fires.
pub const ALERT_THRESHOLD_SECONDS: i64 = 120;

/// Width of the re-arm window after each threshold boundary. While a site
/// stays down, a recurring alert fires when the downtime modulo the
/// threshold falls inside this window, i.e. roughly once per boundary
/// rather than on every tick.
pub const REARM_WINDOW_SECONDS: i64 = 30;

/// The outcome of one policy evaluation. `mark_alert_sent` tells the caller
/// to flip the site's `alert_sent` flag once the notification was actually
/// delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlertDecision {
    pub kind: AlertKind,
    pub mark_alert_sent: bool,
}

/// Decides whether an alert is due for one site on one tick. At most one
/// decision is produced: a status-change alert supersedes the downtime
/// threshold, which only applies while the status is unchanged and still
/// non-up.
///
/// A site whose previous status is unknown goes silent into its first down
/// period; the threshold alert covers it once the downtime is confirmed.
pub fn decide(
    previous: SiteStatus,
    current: SiteStatus,
    down_since: Option<DateTime<Utc>>,
    alert_sent: bool,
    now: DateTime<Utc>,
) -> Option<AlertDecision> {
    if previous != current {
        return match current {
            SiteStatus::Down if matches!(previous, SiteStatus::Up | SiteStatus::Degraded) => {
                Some(AlertDecision {
                    kind: AlertKind::Down,
                    mark_alert_sent: false,
                })
            }
            SiteStatus::Up
                if matches!(
                    previous,
                    SiteStatus::Down | SiteStatus::Degraded | SiteStatus::Unknown
                ) =>
            {
                Some(AlertDecision {
                    kind: AlertKind::Up,
                    mark_alert_sent: false,
                })
            }
            SiteStatus::Degraded if previous == SiteStatus::Up => Some(AlertDecision {
                kind: AlertKind::Degraded,
                mark_alert_sent: false,
            }),
            _ => None,
        };
    }

    if current.is_downtime() {
        if let Some(since) = down_since {
            let downtime = (now - since).num_seconds();
            if downtime >= ALERT_THRESHOLD_SECONDS {
                if !alert_sent {
                    return Some(AlertDecision {
                        kind: AlertKind::Down,
                        mark_alert_sent: true,
                    });
                }
                if downtime % ALERT_THRESHOLD_SECONDS < REARM_WINDOW_SECONDS {
                    return Some(AlertDecision {
                        kind: AlertKind::RecurringDown,
                        mark_alert_sent: true,
                    });
                }
            }
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_up_to_down_fires_immediately() {
        let now = Utc::now();
        let decision = decide(SiteStatus::Up, SiteStatus::Down, Some(now), false, now);
        assert_eq!(
            decision,
            Some(AlertDecision {
                kind: AlertKind::Down,
                mark_alert_sent: false,
            })
        );
    }

    #[test]
    fn test_unknown_to_down_stays_silent_until_threshold() {
        let now = Utc::now();
        assert_eq!(
            decide(SiteStatus::Unknown, SiteStatus::Down, Some(now), false, now),
            None
        );
    }

    #[test]
    fn test_recovery_fires_from_down_degraded_and_unknown() {
        let now = Utc::now();
        for previous in [SiteStatus::Down, SiteStatus::Degraded, SiteStatus::Unknown] {
            let decision = decide(previous, SiteStatus::Up, None, false, now);
            assert_eq!(
                decision.map(|d| d.kind),
                Some(AlertKind::Up),
                "recovery from {previous}"
            );
        }
    }

    #[test]
    fn test_up_to_degraded_fires_degraded() {
        let now = Utc::now();
        let decision = decide(SiteStatus::Up, SiteStatus::Degraded, Some(now), false, now);
        assert_eq!(decision.map(|d| d.kind), Some(AlertKind::Degraded));
    }

    #[test]
    fn test_down_to_degraded_produces_nothing() {
        let now = Utc::now();
        let since = now - Duration::seconds(300);
        assert_eq!(
            decide(SiteStatus::Down, SiteStatus::Degraded, Some(since), true, now),
            None
        );
    }

    #[test]
    fn test_no_decision_below_threshold() {
        let now = Utc::now();
        let since = now - Duration::seconds(119);
        assert_eq!(
            decide(SiteStatus::Down, SiteStatus::Down, Some(since), false, now),
            None
        );
    }

    #[test]
    fn test_first_threshold_alert_marks_sent() {
        let since = Utc::now();
        let now = since + Duration::seconds(125);
        let decision = decide(SiteStatus::Down, SiteStatus::Down, Some(since), false, now);
        assert_eq!(
            decision,
            Some(AlertDecision {
                kind: AlertKind::Down,
                mark_alert_sent: true,
            })
        );
    }

    #[test]
    fn test_recurring_alert_inside_rearm_window() {
        let since = Utc::now();
        // 130 mod 120 = 10 < 30: inside the re-arm window.
        let now = since + Duration::seconds(130);
        let decision = decide(SiteStatus::Down, SiteStatus::Down, Some(since), true, now);
        assert_eq!(decision.map(|d| d.kind), Some(AlertKind::RecurringDown));
    }

    #[test]
    fn test_no_recurring_alert_outside_rearm_window() {
        let since = Utc::now();
        // 200 mod 120 = 80, outside the window.
        let now = since + Duration::seconds(200);
        assert_eq!(
            decide(SiteStatus::Down, SiteStatus::Down, Some(since), true, now),
            None
        );
    }

    #[test]
    fn test_status_change_supersedes_threshold() {
        let since = Utc::now();
        let now = since + Duration::seconds(500);
        // Degraded -> down transition with a long-running downtime period:
        // only the status-change alert fires on this tick.
        let decision = decide(SiteStatus::Degraded, SiteStatus::Down, Some(since), false, now);
        assert_eq!(
            decision,
            Some(AlertDecision {
                kind: AlertKind::Down,
                mark_alert_sent: false,
            })
        );
    }

    #[test]
    fn test_degraded_downtime_reaches_threshold() {
        let since = Utc::now();
        let now = since + Duration::seconds(121);
        let decision = decide(
            SiteStatus::Degraded,
            SiteStatus::Degraded,
            Some(since),
            false,
            now,
        );
        assert_eq!(decision.map(|d| d.kind), Some(AlertKind::Down));
    }

    #[test]
    fn test_steady_up_produces_nothing() {
        let now = Utc::now();
        assert_eq!(decide(SiteStatus::Up, SiteStatus::Up, None, false, now), None);
    }
}
