//! Periodic provider health monitoring.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::task::JoinHandle;

use crate::router::LlmRouter;

/// Default probe period.
pub const DEFAULT_PROBE_INTERVAL: Duration = Duration::from_secs(30);

/// Most recently published health of one provider.
///
/// Written only by the monitor task; the request path reads the latest
/// published state and never probes inline.
#[derive(Debug, Clone, Serialize)]
pub struct HealthState {
    pub healthy: bool,
    pub last_checked: DateTime<Utc>,
}

impl HealthState {
    pub fn new(healthy: bool) -> Self {
        Self {
            healthy,
            last_checked: Utc::now(),
        }
    }
}

/// Recurring task that probes every adapter and publishes transitions.
#[derive(Debug, Clone, Copy)]
pub struct HealthMonitor {
    interval: Duration,
}

impl Default for HealthMonitor {
    fn default() -> Self {
        Self {
            interval: DEFAULT_PROBE_INTERVAL,
        }
    }
}

impl HealthMonitor {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }

    /// Spawn the monitor loop for a router.
    ///
    /// The task holds only a `Weak` reference: when the router is replaced
    /// on a config refresh and the last request drains, the loop exits on
    /// its next tick.
    pub fn spawn(self, router: &Arc<LlmRouter>) -> JoinHandle<()> {
        let weak = Arc::downgrade(router);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // The first tick fires immediately; skip it, the router starts
            // from the credential-derived initial state.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(router) = weak.upgrade() else {
                    tracing::debug!("router replaced, stopping health monitor");
                    break;
                };
                router.probe_health().await;
            }
        })
    }
}
