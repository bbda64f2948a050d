//! The monitoring control loop. One tick probes every active site that is
//! due, appends a health sample, applies the state transition, evaluates
//! the alert policy and dispatches notifications. On-demand checks reuse
//! the exact same pipeline.

use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use super::alert_policy;
use super::prober::{Probe, ProbeResult};
use super::state::apply_probe_result;
use crate::db::models::{AlertKind, NewAlert, NewHealthSample, SiteStatus, Website};
use crate::db::store::{MonitorStore, StoreError};
use crate::notifications::{AlertNotifier, alert_content};

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

/// Result of checking one site, shaped for the presentation layer.
#[derive(Debug, Clone, Serialize)]
pub struct CheckOutcome {
    pub id: i32,
    pub name: String,
    pub url: String,
    pub status: SiteStatus,
    pub is_up: bool,
    pub status_code: Option<i32>,
    pub response_time: Option<f64>,
    pub error_message: Option<String>,
    pub last_check_time: Option<DateTime<Utc>>,
    pub alert: Option<AlertKind>,
}

/// Drives monitoring for all active sites. Generic over the store and the
/// probe implementation so the whole pipeline is testable without a
/// database or network.
pub struct MonitorEngine<S, P> {
    store: Arc<S>,
    prober: Arc<P>,
    notifier: Arc<AlertNotifier>,
}

impl<S, P> MonitorEngine<S, P>
where
    S: MonitorStore,
    P: Probe,
{
    pub fn new(store: Arc<S>, prober: Arc<P>, notifier: Arc<AlertNotifier>) -> Self {
        Self {
            store,
            prober,
            notifier,
        }
    }

    /// Runs the tick/sleep loop. The sleep is the configured interval minus
    /// the elapsed tick time, floored at zero. In run-once mode exactly one
    /// tick executes; in continuous mode the loop stops on Ctrl-C.
    pub async fn run(&self, interval: Duration, run_once: bool) -> Result<(), EngineError> {
        info!(
            interval_seconds = interval.as_secs(),
            run_once, "Starting website monitoring."
        );
        loop {
            let started = Instant::now();
            let result = self.run_tick(Utc::now()).await;
            match &result {
                Ok(outcomes) => {
                    let up = outcomes.iter().filter(|o| o.is_up).count();
                    info!(
                        checked = outcomes.len(),
                        up,
                        down = outcomes.len() - up,
                        "Tick complete."
                    );
                }
                Err(e) => error!(error = %e, "Tick failed."),
            }

            if run_once {
                result?;
                info!("Monitoring completed (single run).");
                return Ok(());
            }

            let sleep_for = interval.saturating_sub(started.elapsed());
            debug!(seconds = sleep_for.as_secs(), "Sleeping until next tick.");
            tokio::select! {
                _ = tokio::time::sleep(sleep_for) => {}
                _ = tokio::signal::ctrl_c() => {
                    info!("Shutdown signal received, stopping monitoring loop.");
                    return Ok(());
                }
            }
        }
    }

    /// One full pass over the active sites that are due for a check. Probes
    /// run concurrently; a slow or timed-out site does not extend the wait
    /// for unrelated sites. A failed site iteration is logged and skipped.
    pub async fn run_tick(&self, now: DateTime<Utc>) -> Result<Vec<CheckOutcome>, EngineError> {
        let sites = self.store.list_active_sites().await?;
        if sites.is_empty() {
            warn!("No active websites to monitor.");
            return Ok(Vec::new());
        }

        let due: Vec<Website> = sites
            .into_iter()
            .filter(|site| Self::is_due(site, now))
            .collect();

        Ok(self.check_sites(due).await)
    }

    /// Checks a single site by id, bypassing the per-site interval gate.
    /// This is the entry point for manually triggered checks.
    pub async fn check_site_now(&self, site_id: i32) -> Result<CheckOutcome, EngineError> {
        let site = self.store.get_site(site_id).await?;
        self.check_site(site).await
    }

    /// Checks every active site immediately, regardless of due time.
    pub async fn check_all_now(&self) -> Result<Vec<CheckOutcome>, EngineError> {
        let sites = self.store.list_active_sites().await?;
        Ok(self.check_sites(sites).await)
    }

    /// Checks the given sites concurrently. A failed site iteration is
    /// logged and skipped; it never discards the other sites' outcomes.
    async fn check_sites(&self, sites: Vec<Website>) -> Vec<CheckOutcome> {
        let checks = sites.into_iter().map(|site| self.check_site(site));
        let mut outcomes = Vec::new();
        for result in join_all(checks).await {
            match result {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => {
                    error!(error = %e, "Site check failed; continuing with remaining sites.")
                }
            }
        }
        outcomes
    }

    fn is_due(site: &Website, now: DateTime<Utc>) -> bool {
        site.last_check_time
            .map_or(true, |t| (now - t).num_seconds() >= site.check_interval as i64)
    }

    async fn check_site(&self, site: Website) -> Result<CheckOutcome, EngineError> {
        debug!(site = %site.name, url = %site.url, "Checking website.");
        let result = self.prober.probe(&site).await;
        self.process_result(site, result, Utc::now()).await
    }

    /// The probe-to-decision sequence for one site: append the sample,
    /// apply the state transition, evaluate the policy, dispatch, persist.
    /// The site row is only saved after the full sequence completes.
    async fn process_result(
        &self,
        site: Website,
        result: ProbeResult,
        now: DateTime<Utc>,
    ) -> Result<CheckOutcome, EngineError> {
        let sample = NewHealthSample {
            website_id: site.id,
            checked_at: now,
            status_code: result.status_code,
            response_time: result.response_time,
            is_up: result.is_up,
            error_message: result.error_message.clone(),
        };
        self.store.append_health_sample(&sample).await?;

        let (mut updated, transition) = apply_probe_result(&site, &result, now);
        let decision = alert_policy::decide(
            transition.previous,
            transition.current,
            updated.down_since,
            updated.alert_sent,
            now,
        );

        let mut fired = None;
        if let Some(decision) = decision {
            let content = alert_content(&updated, decision.kind);
            info!(site = %updated.name, kind = %decision.kind, "Alert decision fired.");

            if let Err(e) = self
                .store
                .create_alert_record(&NewAlert {
                    website_id: updated.id,
                    kind: decision.kind,
                    message: content.body.clone(),
                })
                .await
            {
                error!(site = %updated.name, error = %e, "Failed to persist alert record.");
            }

            let delivered = self.notifier.dispatch(&content).await;
            if decision.mark_alert_sent {
                if delivered {
                    updated.alert_sent = true;
                } else {
                    warn!(
                        site = %updated.name,
                        "No channel delivered the alert; it stays eligible for the next window."
                    );
                }
            }
            fired = Some(decision.kind);
        }

        self.store.save_site(&updated).await?;

        Ok(CheckOutcome {
            id: updated.id,
            name: updated.name.clone(),
            url: updated.url.clone(),
            status: updated.current_status,
            is_up: result.is_up,
            status_code: result.status_code,
            response_time: result.response_time,
            error_message: result.error_message,
            last_check_time: updated.last_check_time,
            alert: fired,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory::MemoryStore;
    use crate::db::models::{AlertRecord, HealthCheckRecord};
    use crate::notifications::AlertContent;
    use crate::notifications::senders::{NotificationSender, SenderError};
    use async_trait::async_trait;
    use chrono::Duration as ChronoDuration;
    use std::sync::Mutex;

    struct FixedProber(ProbeResult);

    #[async_trait]
    impl Probe for FixedProber {
        async fn probe(&self, _site: &Website) -> ProbeResult {
            self.0.clone()
        }
    }

    struct RecordingSender {
        sent: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl NotificationSender for RecordingSender {
        fn channel(&self) -> &'static str {
            "recording"
        }

        async fn send(&self, content: &AlertContent) -> Result<(), SenderError> {
            self.sent.lock().unwrap().push(content.subject.clone());
            Ok(())
        }
    }

    struct FailingSender;

    #[async_trait]
    impl NotificationSender for FailingSender {
        fn channel(&self) -> &'static str {
            "failing"
        }

        async fn send(&self, _content: &AlertContent) -> Result<(), SenderError> {
            Err(SenderError::SendFailed("provider rejected".to_string()))
        }
    }

    /// Delegates to a [`MemoryStore`] but rejects the row update for one
    /// site, standing in for a per-site persistence failure.
    struct FailingSaveStore {
        inner: MemoryStore,
        fail_site: i32,
    }

    #[async_trait]
    impl MonitorStore for FailingSaveStore {
        async fn list_active_sites(&self) -> Result<Vec<Website>, StoreError> {
            self.inner.list_active_sites().await
        }

        async fn get_site(&self, site_id: i32) -> Result<Website, StoreError> {
            self.inner.get_site(site_id).await
        }

        async fn save_site(&self, site: &Website) -> Result<(), StoreError> {
            if site.id == self.fail_site {
                return Err(StoreError::SiteNotFound(site.id));
            }
            self.inner.save_site(site).await
        }

        async fn append_health_sample(&self, sample: &NewHealthSample) -> Result<(), StoreError> {
            self.inner.append_health_sample(sample).await
        }

        async fn create_alert_record(&self, alert: &NewAlert) -> Result<(), StoreError> {
            self.inner.create_alert_record(alert).await
        }

        async fn samples_since(
            &self,
            site_id: i32,
            since: DateTime<Utc>,
        ) -> Result<Vec<HealthCheckRecord>, StoreError> {
            self.inner.samples_since(site_id, since).await
        }

        async fn unread_alerts(&self, limit: i64) -> Result<Vec<AlertRecord>, StoreError> {
            self.inner.unread_alerts(limit).await
        }

        async fn mark_alerts_read(&self) -> Result<(), StoreError> {
            self.inner.mark_alerts_read().await
        }
    }

    fn test_site(status: SiteStatus) -> Website {
        let now = Utc::now();
        Website {
            id: 0,
            name: "example".to_string(),
            url: "https://example.com".to_string(),
            check_interval: 0,
            timeout: 10,
            expected_status_code: 200,
            is_active: true,
            current_status: status,
            last_check_time: None,
            last_response_time: None,
            down_since: None,
            alert_sent: false,
            created_at: now,
            updated_at: now,
        }
    }

    fn timeout_result() -> ProbeResult {
        ProbeResult {
            is_up: false,
            status: SiteStatus::Down,
            status_code: None,
            response_time: None,
            error_message: Some("Request timeout after 10 seconds".to_string()),
        }
    }

    fn up_result() -> ProbeResult {
        ProbeResult {
            is_up: true,
            status: SiteStatus::Up,
            status_code: Some(200),
            response_time: Some(12.34),
            error_message: None,
        }
    }

    fn engine_with_sender(
        store: Arc<MemoryStore>,
        result: ProbeResult,
        sender: Box<dyn NotificationSender>,
    ) -> MonitorEngine<MemoryStore, FixedProber> {
        MonitorEngine::new(
            store,
            Arc::new(FixedProber(result)),
            Arc::new(AlertNotifier::with_senders(vec![sender])),
        )
    }

    fn recording_engine(
        store: Arc<MemoryStore>,
        result: ProbeResult,
    ) -> (MonitorEngine<MemoryStore, FixedProber>, Arc<Mutex<Vec<String>>>) {
        let sent = Arc::new(Mutex::new(Vec::new()));
        let sender = RecordingSender { sent: sent.clone() };
        (engine_with_sender(store, result, Box::new(sender)), sent)
    }

    #[tokio::test]
    async fn test_transport_failure_marks_site_down_without_alert() {
        let store = Arc::new(MemoryStore::new());
        let id = store.add_site(test_site(SiteStatus::Unknown));
        let (engine, sent) = recording_engine(store.clone(), timeout_result());

        let outcomes = engine.run_tick(Utc::now()).await.unwrap();
        assert_eq!(outcomes.len(), 1);
        assert!(!outcomes[0].is_up);
        assert_eq!(outcomes[0].status, SiteStatus::Down);
        assert_eq!(outcomes[0].alert, None);

        let site = store.get_site(id).await.unwrap();
        assert_eq!(site.current_status, SiteStatus::Down);
        assert!(site.down_since.is_some());
        assert!(!site.alert_sent);

        let samples = store.samples();
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].status_code, None);
        assert_eq!(samples[0].response_time, None);
        assert_eq!(
            samples[0].error_message.as_deref(),
            Some("Request timeout after 10 seconds")
        );

        assert!(store.alerts().is_empty());
        assert!(sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_threshold_alert_dispatched_once_and_marked_sent() {
        let store = Arc::new(MemoryStore::new());
        let down_since = Utc::now() - ChronoDuration::seconds(125);
        let mut site = test_site(SiteStatus::Down);
        site.down_since = Some(down_since);
        let id = store.add_site(site);
        let (engine, sent) = recording_engine(store.clone(), timeout_result());

        let site = store.get_site(id).await.unwrap();
        let outcome = engine
            .process_result(site, timeout_result(), Utc::now())
            .await
            .unwrap();
        assert_eq!(outcome.alert, Some(AlertKind::Down));

        let site = store.get_site(id).await.unwrap();
        assert!(site.alert_sent);
        assert_eq!(site.down_since, Some(down_since));

        let alerts = store.alerts();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].alert_kind, AlertKind::Down);
        assert_eq!(sent.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_channel_leaves_alert_unsent() {
        let store = Arc::new(MemoryStore::new());
        let mut site = test_site(SiteStatus::Down);
        site.down_since = Some(Utc::now() - ChronoDuration::seconds(125));
        let id = store.add_site(site);
        let engine = engine_with_sender(store.clone(), timeout_result(), Box::new(FailingSender));

        let site = store.get_site(id).await.unwrap();
        let outcome = engine
            .process_result(site, timeout_result(), Utc::now())
            .await
            .unwrap();
        assert_eq!(outcome.alert, Some(AlertKind::Down));

        // The alert record exists for the audit trail, but the flag stays
        // clear so the next eligible window retries delivery.
        let site = store.get_site(id).await.unwrap();
        assert!(!site.alert_sent);
        assert_eq!(store.alerts().len(), 1);
    }

    #[tokio::test]
    async fn test_recurring_alert_fires_only_inside_rearm_window() {
        let store = Arc::new(MemoryStore::new());
        let down_since = Utc::now() - ChronoDuration::seconds(500);
        let mut site = test_site(SiteStatus::Down);
        site.down_since = Some(down_since);
        site.alert_sent = true;
        let id = store.add_site(site);
        let (engine, sent) = recording_engine(store.clone(), timeout_result());

        // 130s of downtime: 130 mod 120 = 10, inside the window.
        let site = store.get_site(id).await.unwrap();
        let outcome = engine
            .process_result(site, timeout_result(), down_since + ChronoDuration::seconds(130))
            .await
            .unwrap();
        assert_eq!(outcome.alert, Some(AlertKind::RecurringDown));

        // 200s of downtime: 200 mod 120 = 80, outside the window.
        let site = store.get_site(id).await.unwrap();
        let outcome = engine
            .process_result(site, timeout_result(), down_since + ChronoDuration::seconds(200))
            .await
            .unwrap();
        assert_eq!(outcome.alert, None);

        assert_eq!(store.alerts().len(), 1);
        assert_eq!(sent.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_recovery_resets_bookkeeping_and_fires_up_alert() {
        let store = Arc::new(MemoryStore::new());
        let mut site = test_site(SiteStatus::Down);
        site.down_since = Some(Utc::now() - ChronoDuration::seconds(600));
        site.alert_sent = true;
        let id = store.add_site(site);
        let (engine, sent) = recording_engine(store.clone(), up_result());

        let outcomes = engine.run_tick(Utc::now()).await.unwrap();
        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0].alert, Some(AlertKind::Up));

        let site = store.get_site(id).await.unwrap();
        assert_eq!(site.current_status, SiteStatus::Up);
        assert_eq!(site.down_since, None);
        assert!(!site.alert_sent);
        assert_eq!(site.last_response_time, Some(12.34));

        let alerts = store.alerts();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].alert_kind, AlertKind::Up);
        let sent = sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].contains("Recovered"));
    }

    #[tokio::test]
    async fn test_tick_respects_per_site_interval() {
        let store = Arc::new(MemoryStore::new());
        let mut site = test_site(SiteStatus::Up);
        site.check_interval = 300;
        site.last_check_time = Some(Utc::now());
        store.add_site(site);
        let (engine, _) = recording_engine(store.clone(), up_result());

        let outcomes = engine.run_tick(Utc::now()).await.unwrap();
        assert!(outcomes.is_empty());

        // The same site is due again once its interval has elapsed.
        let later = Utc::now() + ChronoDuration::seconds(301);
        let outcomes = engine.run_tick(later).await.unwrap();
        assert_eq!(outcomes.len(), 1);
    }

    #[tokio::test]
    async fn test_check_all_now_continues_past_failed_site() {
        let inner = MemoryStore::new();
        let healthy = inner.add_site(test_site(SiteStatus::Up));
        let failing = inner.add_site(test_site(SiteStatus::Up));
        let store = Arc::new(FailingSaveStore {
            inner,
            fail_site: failing,
        });
        let engine = MonitorEngine::new(
            store.clone(),
            Arc::new(FixedProber(up_result())),
            Arc::new(AlertNotifier::with_senders(Vec::new())),
        );

        let outcomes = engine.check_all_now().await.unwrap();
        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0].id, healthy);

        // Both probes ran; only the failing site's row update was lost.
        assert_eq!(store.inner.samples().len(), 2);
    }

    #[tokio::test]
    async fn test_on_demand_check_bypasses_interval_gate() {
        let store = Arc::new(MemoryStore::new());
        let mut site = test_site(SiteStatus::Up);
        site.check_interval = 300;
        site.last_check_time = Some(Utc::now());
        let id = store.add_site(site);
        let (engine, _) = recording_engine(store.clone(), up_result());

        let outcome = engine.check_site_now(id).await.unwrap();
        assert!(outcome.is_up);
        assert_eq!(store.samples().len(), 1);
    }

    #[tokio::test]
    async fn test_run_once_executes_single_tick() {
        let store = Arc::new(MemoryStore::new());
        store.add_site(test_site(SiteStatus::Unknown));
        let (engine, _) = recording_engine(store.clone(), up_result());

        engine.run(Duration::from_secs(60), true).await.unwrap();
        assert_eq!(store.samples().len(), 1);
    }
}
