use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;

use ripple_log::EventLog;
use ripple_store::{Database, StoreError};

const PROBE_TIMEOUT: Duration = Duration::from_secs(2);

/// Structured health status. Probes never throw; a failed dependency shows
/// up as an "unhealthy: <reason>" string, and the report is produced even
/// when everything is down.
#[derive(Clone, Debug, Serialize)]
pub struct HealthReport {
    pub status: String,
    pub timestamp_ms: i64,
    pub components: ComponentHealth,
}

#[derive(Clone, Debug, Serialize)]
pub struct ComponentHealth {
    pub log: String,
    pub store: String,
    pub upstream: String,
}

pub struct HealthReporter {
    log: Arc<dyn EventLog>,
    db: Database,
    upstream_url: Option<String>,
    http: reqwest::Client,
}

impl HealthReporter {
    pub fn new(log: Arc<dyn EventLog>, db: Database, upstream_url: Option<String>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(PROBE_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self {
            log,
            db,
            upstream_url,
            http,
        }
    }

    pub async fn check(&self) -> HealthReport {
        let log = self.probe_log().await;
        let store = self.probe_store().await;
        let upstream = self.probe_upstream().await;

        let all_healthy = [&log, &store].iter().all(|s| *s == "healthy")
            && (upstream == "healthy" || upstream == "not configured");

        HealthReport {
            status: if all_healthy { "healthy" } else { "degraded" }.into(),
            timestamp_ms: Utc::now().timestamp_millis(),
            components: ComponentHealth {
                log,
                store,
                upstream,
            },
        }
    }

    async fn probe_log(&self) -> String {
        match tokio::time::timeout(PROBE_TIMEOUT, self.log.ping()).await {
            Ok(Ok(())) => "healthy".into(),
            Ok(Err(e)) => format!("unhealthy: {e}"),
            Err(_) => "unhealthy: probe timed out".into(),
        }
    }

    async fn probe_store(&self) -> String {
        let db = self.db.clone();
        let probe = tokio::task::spawn_blocking(move || {
            db.with_conn(|conn| {
                conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))
                    .map_err(StoreError::from)
            })
        });

        match tokio::time::timeout(PROBE_TIMEOUT, probe).await {
            Ok(Ok(Ok(_))) => "healthy".into(),
            Ok(Ok(Err(e))) => format!("unhealthy: {e}"),
            Ok(Err(e)) => format!("unhealthy: {e}"),
            Err(_) => "unhealthy: probe timed out".into(),
        }
    }

    async fn probe_upstream(&self) -> String {
        let Some(url) = &self.upstream_url else {
            return "not configured".into();
        };
        match self.http.get(url).send().await {
            Ok(resp) if resp.status().is_success() => "healthy".into(),
            Ok(resp) => format!("unhealthy: status {}", resp.status()),
            Err(e) => format!("unhealthy: {e}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ripple_log::MemoryLog;

    fn reporter(upstream: Option<String>) -> HealthReporter {
        HealthReporter::new(
            Arc::new(MemoryLog::new(2)),
            Database::in_memory().unwrap(),
            upstream,
        )
    }

    #[tokio::test]
    async fn healthy_when_dependencies_up() {
        let report = reporter(None).check().await;
        assert_eq!(report.status, "healthy");
        assert_eq!(report.components.log, "healthy");
        assert_eq!(report.components.store, "healthy");
        assert_eq!(report.components.upstream, "not configured");
        assert!(report.timestamp_ms > 0);
    }

    #[tokio::test]
    async fn closed_log_degrades_but_still_reports() {
        let log = Arc::new(MemoryLog::new(2));
        log.close().await;
        let reporter =
            HealthReporter::new(log, Database::in_memory().unwrap(), None);

        let report = reporter.check().await;
        assert_eq!(report.status, "degraded");
        assert!(report.components.log.starts_with("unhealthy:"));
        assert_eq!(report.components.store, "healthy");
    }

    #[tokio::test]
    async fn unreachable_upstream_degrades() {
        // Port 9 (discard) refuses connections on any sane test host.
        let report = reporter(Some("http://127.0.0.1:9/health".into()))
            .check()
            .await;
        assert_eq!(report.status, "degraded");
        assert!(report.components.upstream.starts_with("unhealthy:"));
    }

    #[tokio::test]
    async fn report_serializes() {
        let report = reporter(None).check().await;
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["status"], "healthy");
        assert!(json["components"]["log"].is_string());
    }
}
