use crate::{
    api::ApiClient,
    models::{Health, HealthStatus},
};
use std::{sync::Arc, time::Duration};
use tokio::{
    sync::watch,
    task::JoinHandle,
    time::MissedTickBehavior,
};

/// Periodic and on-demand liveness probing of the backend.
///
/// The status is tri-state (unknown until the first probe resolves) plus a
/// `probing` flag that is set for the duration of every probe, whatever its
/// outcome.
pub struct HealthMonitor {
    api: ApiClient,
    interval: Duration,
    status: watch::Sender<HealthStatus>,
}

impl HealthMonitor {
    pub fn new(api: ApiClient, interval: Duration) -> Self {
        let (status, _) = watch::channel(HealthStatus::default());
        Self {
            api,
            interval,
            status,
        }
    }

    pub fn status(&self) -> HealthStatus {
        *self.status.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<HealthStatus> {
        self.status.subscribe()
    }

    /// Probe once. Timeouts, connection failures and non-success statuses
    /// all count as unhealthy.
    ///
    /// Nothing stops two probes from overlapping (say a manual check during
    /// a scheduled one); whichever resolves last sets the status.
    pub async fn check_health(&self) -> Health {
        let probe = ProbeGuard::start(&self.status);

        let health = match self.api.probe_health().await {
            Ok(()) => Health::Healthy,
            Err(e) => {
                tracing::error!("Health check failed: {}", e);
                Health::Unhealthy
            }
        };

        probe.finish(health);
        tracing::debug!("Backend health: {:?}", health);
        health
    }

    /// Manual re-check. Ignored (returns `None`) while a probe is in flight.
    pub async fn try_check(&self) -> Option<Health> {
        if self.status.borrow().probing {
            tracing::debug!("Probe already in flight, ignoring manual check");
            return None;
        }
        Some(self.check_health().await)
    }

    /// Probe immediately, then once per interval until the returned handle
    /// is shut down or dropped.
    pub fn spawn(self: &Arc<Self>) -> HealthHandle {
        let monitor = Arc::clone(self);
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(monitor.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                // First tick completes immediately.
                ticker.tick().await;
                monitor.check_health().await;
            }
        });

        tracing::info!("Health checks every {}s", self.interval.as_secs());
        HealthHandle { task }
    }
}

/// Holds `probing` up for one probe. Dropping it unfinished (the probe's
/// future was cancelled) clears the flag without touching `health`.
struct ProbeGuard<'a> {
    status: &'a watch::Sender<HealthStatus>,
    finished: bool,
}

impl<'a> ProbeGuard<'a> {
    fn start(status: &'a watch::Sender<HealthStatus>) -> Self {
        status.send_modify(|status| status.probing = true);
        Self {
            status,
            finished: false,
        }
    }

    fn finish(mut self, health: Health) {
        self.finished = true;
        self.status.send_modify(|status| {
            status.health = health;
            status.probing = false;
        });
    }
}

impl Drop for ProbeGuard<'_> {
    fn drop(&mut self) {
        if !self.finished {
            tracing::debug!("Probe cancelled");
            self.status.send_modify(|status| status.probing = false);
        }
    }
}

/// Owns the recurring probe schedule; dropping it cancels the schedule.
pub struct HealthHandle {
    task: JoinHandle<()>,
}

impl HealthHandle {
    pub fn shutdown(self) {
        // Drop does the work.
    }
}

impl Drop for HealthHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}
