use anyhow::Result;
use chrono::Utc;
use std::time::Duration;

use crate::metrics::EXPIRY_SWEEPS_TOTAL;

use super::session_service::SessionService;

/// Server-side timeout enforcement.
///
/// The countdown itself runs on the client via the SSE stream, but a
/// client that never reports back would leave its session `active`
/// forever. This worker sweeps overdue active sessions on an interval
/// and expires them with whatever the ledger holds.
pub struct ExpiryWorker {
    session_service: SessionService,
    interval: Duration,
}

impl ExpiryWorker {
    pub fn new(session_service: SessionService) -> Self {
        let interval_seconds = std::env::var("SESSION_SWEEP_INTERVAL_SECONDS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .filter(|v| *v > 0)
            .unwrap_or(30);

        Self {
            session_service,
            interval: Duration::from_secs(interval_seconds),
        }
    }

    pub async fn run(&self) -> Result<()> {
        tracing::info!(
            "Session expiry worker started (interval {}s)",
            self.interval.as_secs()
        );

        loop {
            match self.session_service.expire_overdue(Utc::now()).await {
                Ok(expired) => {
                    EXPIRY_SWEEPS_TOTAL.with_label_values(&["ok"]).inc();
                    if expired > 0 {
                        tracing::info!("Expired {} overdue sessions", expired);
                    }
                }
                Err(e) => {
                    EXPIRY_SWEEPS_TOTAL.with_label_values(&["error"]).inc();
                    tracing::error!("Expiry sweep failed: {}", e);
                }
            }

            tokio::time::sleep(self.interval).await;
        }
    }
}
