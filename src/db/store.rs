use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

use super::models::{AlertRecord, HealthCheckRecord, NewAlert, NewHealthSample, Website};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("website not found: {0}")]
    SiteNotFound(i32),
}

/// Persistence contract consumed by the monitoring engine. The engine owns
/// the write path into `Website` and `HealthCheckRecord`; everything else
/// (CRUD forms, dashboards) lives outside this crate and talks to the same
/// storage directly.
#[async_trait]
pub trait MonitorStore: Send + Sync {
    /// All sites with `is_active = true`, in insertion order.
    async fn list_active_sites(&self) -> Result<Vec<Website>, StoreError>;

    async fn get_site(&self, site_id: i32) -> Result<Website, StoreError>;

    /// Persists the mutable monitoring state of a site.
    async fn save_site(&self, site: &Website) -> Result<(), StoreError>;

    async fn append_health_sample(&self, sample: &NewHealthSample) -> Result<(), StoreError>;

    async fn create_alert_record(&self, alert: &NewAlert) -> Result<(), StoreError>;

    /// Samples for one site with `checked_at >= since`, ascending by time.
    async fn samples_since(
        &self,
        site_id: i32,
        since: DateTime<Utc>,
    ) -> Result<Vec<HealthCheckRecord>, StoreError>;

    async fn unread_alerts(&self, limit: i64) -> Result<Vec<AlertRecord>, StoreError>;

    async fn mark_alerts_read(&self) -> Result<(), StoreError>;
}

/// Postgres-backed store.
pub struct PgMonitorStore {
    pool: PgPool,
}

impl PgMonitorStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;
        Ok(Self::new(pool))
    }
}

#[async_trait]
impl MonitorStore for PgMonitorStore {
    async fn list_active_sites(&self) -> Result<Vec<Website>, StoreError> {
        let sites = sqlx::query_as::<_, Website>(
            "SELECT * FROM websites WHERE is_active = TRUE ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(sites)
    }

    async fn get_site(&self, site_id: i32) -> Result<Website, StoreError> {
        sqlx::query_as::<_, Website>("SELECT * FROM websites WHERE id = $1")
            .bind(site_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StoreError::SiteNotFound(site_id))
    }

    async fn save_site(&self, site: &Website) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE websites
             SET current_status = $1, last_check_time = $2, last_response_time = $3,
                 down_since = $4, alert_sent = $5, updated_at = NOW()
             WHERE id = $6",
        )
        .bind(site.current_status)
        .bind(site.last_check_time)
        .bind(site.last_response_time)
        .bind(site.down_since)
        .bind(site.alert_sent)
        .bind(site.id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::SiteNotFound(site.id));
        }
        Ok(())
    }

    async fn append_health_sample(&self, sample: &NewHealthSample) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO health_checks
                 (website_id, checked_at, status_code, response_time, is_up, error_message)
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(sample.website_id)
        .bind(sample.checked_at)
        .bind(sample.status_code)
        .bind(sample.response_time)
        .bind(sample.is_up)
        .bind(sample.error_message.as_deref())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn create_alert_record(&self, alert: &NewAlert) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO alerts (website_id, alert_kind, message, is_read, created_at)
             VALUES ($1, $2, $3, FALSE, NOW())",
        )
        .bind(alert.website_id)
        .bind(alert.kind)
        .bind(&alert.message)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn samples_since(
        &self,
        site_id: i32,
        since: DateTime<Utc>,
    ) -> Result<Vec<HealthCheckRecord>, StoreError> {
        let samples = sqlx::query_as::<_, HealthCheckRecord>(
            "SELECT * FROM health_checks
             WHERE website_id = $1 AND checked_at >= $2
             ORDER BY checked_at ASC",
        )
        .bind(site_id)
        .bind(since)
        .fetch_all(&self.pool)
        .await?;
        Ok(samples)
    }

    async fn unread_alerts(&self, limit: i64) -> Result<Vec<AlertRecord>, StoreError> {
        let alerts = sqlx::query_as::<_, AlertRecord>(
            "SELECT * FROM alerts WHERE is_read = FALSE ORDER BY created_at DESC LIMIT $1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(alerts)
    }

    async fn mark_alerts_read(&self) -> Result<(), StoreError> {
        sqlx::query("UPDATE alerts SET is_read = TRUE WHERE is_read = FALSE")
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
