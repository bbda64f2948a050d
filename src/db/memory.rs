//! In-process implementation of [`MonitorStore`], used by the engine tests
//! and for running the scheduler without a database at hand.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::Mutex;

use super::models::{AlertRecord, HealthCheckRecord, NewAlert, NewHealthSample, Website};
use super::store::{MonitorStore, StoreError};

#[derive(Default)]
struct Inner {
    sites: BTreeMap<i32, Website>,
    samples: Vec<HealthCheckRecord>,
    alerts: Vec<AlertRecord>,
    next_site_id: i32,
    next_sample_id: i32,
    next_alert_id: i32,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a site and returns its assigned id. The `id` field of the
    /// passed value is ignored.
    pub fn add_site(&self, mut site: Website) -> i32 {
        let mut inner = self.inner.lock().unwrap();
        inner.next_site_id += 1;
        site.id = inner.next_site_id;
        let id = site.id;
        inner.sites.insert(id, site);
        id
    }

    pub fn samples(&self) -> Vec<HealthCheckRecord> {
        self.inner.lock().unwrap().samples.clone()
    }

    pub fn alerts(&self) -> Vec<AlertRecord> {
        self.inner.lock().unwrap().alerts.clone()
    }
}

#[async_trait]
impl MonitorStore for MemoryStore {
    async fn list_active_sites(&self) -> Result<Vec<Website>, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .sites
            .values()
            .filter(|s| s.is_active)
            .cloned()
            .collect())
    }

    async fn get_site(&self, site_id: i32) -> Result<Website, StoreError> {
        let inner = self.inner.lock().unwrap();
        inner
            .sites
            .get(&site_id)
            .cloned()
            .ok_or(StoreError::SiteNotFound(site_id))
    }

    async fn save_site(&self, site: &Website) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        if !inner.sites.contains_key(&site.id) {
            return Err(StoreError::SiteNotFound(site.id));
        }
        inner.sites.insert(site.id, site.clone());
        Ok(())
    }

    async fn append_health_sample(&self, sample: &NewHealthSample) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        inner.next_sample_id += 1;
        let record = HealthCheckRecord {
            id: inner.next_sample_id,
            website_id: sample.website_id,
            checked_at: sample.checked_at,
            status_code: sample.status_code,
            response_time: sample.response_time,
            is_up: sample.is_up,
            error_message: sample.error_message.clone(),
        };
        inner.samples.push(record);
        Ok(())
    }

    async fn create_alert_record(&self, alert: &NewAlert) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        inner.next_alert_id += 1;
        let record = AlertRecord {
            id: inner.next_alert_id,
            website_id: alert.website_id,
            alert_kind: alert.kind,
            message: alert.message.clone(),
            is_read: false,
            created_at: Utc::now(),
        };
        inner.alerts.push(record);
        Ok(())
    }

    async fn samples_since(
        &self,
        site_id: i32,
        since: DateTime<Utc>,
    ) -> Result<Vec<HealthCheckRecord>, StoreError> {
        let inner = self.inner.lock().unwrap();
        let mut samples: Vec<HealthCheckRecord> = inner
            .samples
            .iter()
            .filter(|s| s.website_id == site_id && s.checked_at >= since)
            .cloned()
            .collect();
        samples.sort_by_key(|s| s.checked_at);
        Ok(samples)
    }

    async fn unread_alerts(&self, limit: i64) -> Result<Vec<AlertRecord>, StoreError> {
        let inner = self.inner.lock().unwrap();
        let mut alerts: Vec<AlertRecord> = inner
            .alerts
            .iter()
            .filter(|a| !a.is_read)
            .cloned()
            .collect();
        alerts.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        alerts.truncate(limit as usize);
        Ok(alerts)
    }

    async fn mark_alerts_read(&self) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        for alert in &mut inner.alerts {
            alert.is_read = true;
        }
        Ok(())
    }
}
