//! Background convergence loop.
//!
//! # Responsibilities
//! - Periodically re-apply when the store is ahead of HAProxy
//! - Back off after failed applies, reset after a success

use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time;

use crate::config::ReconcileConfig;
use crate::coordinator::Coordinator;
use crate::driver::LoadBalancerDriver;
use crate::resilience::BackoffPolicy;

pub struct Reconciler<D> {
    coordinator: Coordinator<D>,
    interval: Duration,
    backoff: BackoffPolicy,
}

impl<D: LoadBalancerDriver> Reconciler<D> {
    pub fn new(coordinator: Coordinator<D>, interval: Duration, backoff: BackoffPolicy) -> Self {
        Self {
            coordinator,
            interval,
            backoff,
        }
    }

    pub fn from_config(coordinator: Coordinator<D>, config: &ReconcileConfig) -> Self {
        Self::new(
            coordinator,
            Duration::from_secs(config.interval_secs),
            BackoffPolicy::new(
                Duration::from_millis(config.base_delay_ms),
                Duration::from_millis(config.max_delay_ms),
            ),
        )
    }

    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(
            interval_secs = self.interval.as_secs_f64(),
            "Reconciler starting"
        );

        let mut failures: u32 = 0;
        loop {
            let wait = if failures == 0 {
                self.interval
            } else {
                self.backoff.delay(failures)
            };

            tokio::select! {
                _ = time::sleep(wait) => {}
                _ = shutdown.recv() => {
                    tracing::info!("Reconciler received shutdown signal, exiting loop");
                    break;
                }
            }

            match self.coordinator.reconcile().await {
                Ok(Some(result)) => {
                    if failures > 0 {
                        tracing::info!(revision = result.revision, failures, "Reconciled after failures");
                    }
                    failures = 0;
                }
                Ok(None) => failures = 0,
                Err(e) => {
                    failures = failures.saturating_add(1);
                    tracing::warn!(
                        error = %e,
                        attempt = failures,
                        retry_in_ms = self.backoff.delay(failures).as_millis() as u64,
                        "Reconcile failed"
                    );
                }
            }
        }
    }
}
